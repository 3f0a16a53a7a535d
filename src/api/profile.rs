// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile page: fetch, pincode lookup and update.
//!
//! A profile update without a picture is a sealed JSON body; with a picture
//! it is a plain multipart form carrying the same fields plus `img`.
//! Either way a successful update is merged into the session.

use chrono::NaiveDate;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::client::{ApiClient, FilePart, MultipartForm, RequestBody, RequestOptions};
use super::endpoints;
use crate::error::{ClientError, ValidationErrors};
use crate::models::{PostOffice, UserProfile, WalletSummary};
use crate::session::ProfileSnapshot;

pub const PINCODE_LENGTH: usize = 6;

/// Genders offered by the profile form.
pub const GENDERS: [&str; 3] = ["Male", "Female", "Other"];

/// Multipart field carrying a new profile picture.
pub const PICTURE_FIELD: &str = "img";

fn is_pincode(value: &str) -> bool {
    value.len() == PINCODE_LENGTH && value.chars().all(|c| c.is_ascii_digit())
}

/// Everything the profile page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileOverview {
    pub profile: UserProfile,
    pub wallet: WalletSummary,
    /// First post office for the profile's pincode, when it resolved.
    pub post_office: Option<PostOffice>,
}

impl ProfileOverview {
    /// Rank from the wallet, falling back to the profile.
    pub fn rank(&self) -> Option<&str> {
        self.wallet
            .rank
            .as_deref()
            .or(self.profile.rank.as_deref())
            .filter(|r| !r.is_empty())
    }
}

/// Editable address and personal fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub pincode: String,
    #[serde(rename = "postOfficeName")]
    pub post_office_name: String,
    pub circle: String,
    pub district: String,
    pub division: String,
    pub region: String,
    #[serde(serialize_with = "serialize_date")]
    pub dob: Option<NaiveDate>,
    pub address: String,
    #[serde(rename = "aniversary_date", serialize_with = "serialize_date")]
    pub anniversary_date: Option<NaiveDate>,
    pub gender: String,
    #[serde(skip)]
    pub picture: Option<FilePart>,
}

fn serialize_date<S: serde::Serializer>(
    date: &Option<NaiveDate>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        None => serializer.serialize_none(),
    }
}

impl ProfileUpdate {
    /// Pre-fill from the stored profile.
    pub fn from_profile(profile: &UserProfile) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let date = |v: &Option<String>| {
            v.as_deref()
                .and_then(|s| s.get(..10))
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        Self {
            pincode: text(&profile.pincode),
            post_office_name: text(&profile.post_office_name),
            circle: text(&profile.circle),
            district: text(&profile.district),
            division: text(&profile.division),
            region: text(&profile.region),
            dob: date(&profile.dob),
            address: text(&profile.address),
            anniversary_date: date(&profile.anniversary_date),
            gender: text(&profile.gender),
            picture: None,
        }
    }

    /// Fill the address fields from a pincode lookup result.
    pub fn apply_post_office(&mut self, office: &PostOffice) {
        if !office.pincode.is_empty() {
            self.pincode = office.pincode.clone();
        }
        self.post_office_name = office.office_name.clone();
        self.circle = office.circle.clone();
        self.district = office.district.clone();
        self.division = office.division.clone();
        self.region = office.region.clone();
        self.address = office.full_address();
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = ValidationErrors::new();
        let pincode = self.pincode.trim();
        if !pincode.is_empty() && !is_pincode(pincode) {
            errors.add("pincode", "Pincode must be 6 digits.");
        }
        if !self.gender.is_empty() && !GENDERS.contains(&self.gender.as_str()) {
            errors.add("gender", "Please select a valid gender.");
        }
        errors.into_result()
    }

    /// Fields to cache in the session once the backend accepted them.
    fn snapshot(&self) -> ProfileSnapshot {
        let some = |v: &str| Some(v.trim().to_string()).filter(|s| !s.is_empty());
        ProfileSnapshot {
            pincode: some(&self.pincode),
            district: some(&self.district),
            address: some(&self.address),
            gender: some(&self.gender),
            dob: self.dob.map(|d| d.format("%Y-%m-%d").to_string()),
            anniversary_date: self.anniversary_date.map(|d| d.format("%Y-%m-%d").to_string()),
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
struct ProfileQuery<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct PincodeQuery<'a> {
    pincode: &'a str,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    update: &'a ProfileUpdate,
}

impl ApiClient {
    pub async fn fetch_profile(&self) -> Result<UserProfile, ClientError> {
        let user_id = self.session().require_user_id()?;
        let response = self
            .post_json(
                endpoints::USER_PROFILE,
                &ProfileQuery { id: &user_id },
                RequestOptions::bearer(),
            )
            .await?;

        let status = response.status.unwrap_or(404);
        let message = response.message.clone();
        let profiles: Vec<UserProfile> = response.rows()?;
        profiles.into_iter().next().ok_or_else(|| {
            ClientError::request_failed(
                status,
                message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Profile not found.".to_string()),
            )
        })
    }

    /// Profile, balances and resolved address, cached into the session.
    pub async fn load_profile(&self) -> Result<ProfileOverview, ClientError> {
        let profile = self.fetch_profile().await?;
        let wallet = self.wallet_summary().await?;

        let post_office = match profile.pincode.as_deref().map(str::trim) {
            Some(pincode) if is_pincode(pincode) => match self.pincode_lookup(pincode).await {
                Ok(offices) => offices.into_iter().next(),
                Err(e) => {
                    warn!(error = %e, "Pincode lookup failed; showing stored address");
                    None
                }
            },
            _ => None,
        };

        let overview = ProfileOverview {
            profile,
            wallet,
            post_office,
        };
        let mut snapshot = overview.profile.snapshot();
        snapshot.rank = overview.rank().map(str::to_string);
        self.session().update_profile(snapshot)?;
        Ok(overview)
    }

    /// Post offices for a pincode. Available before login.
    pub async fn pincode_lookup(&self, pincode: &str) -> Result<Vec<PostOffice>, ClientError> {
        let pincode = pincode.trim();
        if !is_pincode(pincode) {
            return Err(ClientError::validation("pincode", "Pincode must be 6 digits."));
        }
        let response = self
            .post_json(
                endpoints::PINCODE_LOOKUP,
                &PincodeQuery { pincode },
                RequestOptions::anonymous(),
            )
            .await?;
        response.rows()
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<String, ClientError> {
        update.validate()?;
        let user_id = self.session().require_user_id()?;
        let request = UpdateRequest {
            user_id: &user_id,
            update,
        };

        let body = match &update.picture {
            None => RequestBody::json(&request)?,
            Some(picture) => {
                let mut form = MultipartForm::new().file(FilePart {
                    field: PICTURE_FIELD.to_string(),
                    ..picture.clone()
                });
                if let Value::Object(fields) = serde_json::to_value(&request).map_err(|e| {
                    ClientError::Configuration(format!("profile update is not serialisable: {e}"))
                })? {
                    for (name, value) in fields {
                        form = form.text(name, form_value(value));
                    }
                }
                RequestBody::Multipart(form)
            }
        };

        let response = self
            .request(
                Method::POST,
                endpoints::UPDATE_PROFILE,
                body,
                RequestOptions::bearer(),
            )
            .await?
            .ensure_success()?;

        self.session().update_profile(update.snapshot())?;
        info!(%user_id, with_picture = update.picture.is_some(), "Profile updated");
        Ok(response
            .message
            .unwrap_or_else(|| "Profile updated successfully!".to_string()))
    }
}

/// Multipart text for a JSON field; null becomes empty.
fn form_value(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}
