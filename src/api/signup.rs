// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-up: referral check and registration.
//!
//! Registration is only sent once the referral id has been verified, and
//! the verified id must still be the one in the form.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::{ApiClient, RequestOptions};
use super::endpoints;
use crate::error::{ClientError, ValidationErrors};
use crate::models::PostOffice;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern"));
static MOBILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("mobile pattern"));
static PINCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("pincode pattern"));

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationForm {
    /// Referrer's MLM id.
    pub referred_by: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub pincode: String,
    #[serde(rename = "postOfficeName")]
    pub post_office_name: String,
    pub circle: String,
    pub district: String,
    pub division: String,
    pub region: String,
    pub dob: String,
    pub state: String,
    pub city: String,
    pub address: String,
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("referred_by", &self.referred_by)
            .field("username", &self.username)
            .field("mobile", &self.mobile)
            .finish_non_exhaustive()
    }
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = ValidationErrors::new();

        if self.first_name.trim().is_empty() {
            errors.add("first_name", "First name is required");
        }
        if self.last_name.trim().is_empty() {
            errors.add("last_name", "Last name is required");
        }
        if self.username.trim().is_empty() {
            errors.add("username", "Username is required");
        }

        if self.email.is_empty() {
            errors.add("email", "Email is required");
        } else if !EMAIL.is_match(&self.email) {
            errors.add("email", "Enter a valid email");
        }

        if self.mobile.is_empty() {
            errors.add("mobile", "Mobile number is required");
        } else if !MOBILE.is_match(&self.mobile) {
            errors.add("mobile", "Enter a valid 10-digit mobile number");
        }

        if self.password.is_empty() {
            errors.add("password", "Password is required");
        } else if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add("password", "Password must be at least 6 characters");
        }

        if self.pincode.is_empty() {
            errors.add("pincode", "Pincode is required");
        } else if !PINCODE.is_match(&self.pincode) {
            errors.add("pincode", "Enter a valid 6-digit pincode");
        }

        if self.state.is_empty() {
            errors.add("state", "State is required");
        }
        if self.city.is_empty() {
            errors.add("city", "City is required");
        }
        if self.address.is_empty() {
            errors.add("address", "Address is required");
        }
        if self.dob.trim().is_empty() {
            errors.add("dob", "Date of Birth is required");
        }

        errors.into_result()
    }

    /// Fill the address block from the first office of a pincode lookup.
    pub fn apply_post_office(&mut self, office: &PostOffice) {
        self.post_office_name = office.office_name.trim().to_string();
        self.circle = office.circle.trim().to_string();
        self.district = office.district.trim().to_string();
        self.division = office.division.trim().to_string();
        self.region = office.region.trim().to_string();
        self.state = office.state.trim().to_string();
        self.city = office.district.trim().to_string();
        self.address = format!(
            "{}, {}, {} - {}",
            office.office_name, office.district, office.state, office.pincode
        )
        .trim()
        .to_string();
    }
}

/// A referral id the backend confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedReferral {
    pub mlm_id: String,
    pub name: String,
}

#[derive(Serialize)]
struct ReferralQuery<'a> {
    mlm_id: &'a str,
}

#[derive(Deserialize)]
struct ReferrerData {
    #[serde(default, deserialize_with = "crate::serde_util::string")]
    name: String,
}

impl ApiClient {
    pub async fn verify_referral(&self, mlm_id: &str) -> Result<VerifiedReferral, ClientError> {
        let mlm_id = mlm_id.trim();
        if mlm_id.is_empty() {
            return Err(ClientError::validation(
                "referred_by",
                "Referral ID is required",
            ));
        }

        let response = self
            .post_json(
                endpoints::VERIFY_REFERRAL,
                &ReferralQuery { mlm_id },
                RequestOptions::anonymous(),
            )
            .await?;

        let name = if response.is_success() {
            response.data_as::<ReferrerData>().map(|d| d.name).unwrap_or_default()
        } else {
            String::new()
        };
        if name.trim().is_empty() {
            let message = response
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Invalid referral ID".to_string());
            return Err(ClientError::request_failed(
                response.status.unwrap_or_default(),
                message,
            ));
        }

        Ok(VerifiedReferral {
            mlm_id: mlm_id.to_string(),
            name: name.trim().to_string(),
        })
    }

    /// Create an account. The form must pass validation and its referral id
    /// must match `referral`.
    pub async fn register(
        &self,
        form: &RegistrationForm,
        referral: Option<&VerifiedReferral>,
    ) -> Result<String, ClientError> {
        form.validate()?;
        if referral.is_none_or(|r| r.mlm_id != form.referred_by.trim()) {
            return Err(ClientError::validation(
                "referred_by",
                "Please verify a valid referral ID before registering.",
            ));
        }

        let response = self
            .post_json(endpoints::REGISTER, form, RequestOptions::anonymous())
            .await?
            .ensure_success()?;
        info!(username = %form.username, "User registered");
        Ok(response
            .message
            .unwrap_or_else(|| "User registered successfully!".to_string()))
    }
}
