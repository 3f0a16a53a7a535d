// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transport records returned by the backend.
//!
//! All of these are read-only display records. Field names follow the wire
//! format; numeric fields that arrive as either strings or numbers go
//! through [`crate::serde_util`].

use serde::{Deserialize, Deserializer, Serialize};

use crate::serde_util;
use crate::session::ProfileSnapshot;

// =============================================================================
// Login
// =============================================================================

/// `data` of a successful password login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginUser {
    #[serde(default, deserialize_with = "serde_util::string")]
    pub id: String,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "serde_util::string")]
    pub mobile: String,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub role_name: Option<String>,
}

impl LoginUser {
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            employee_role: self.role_name.clone(),
            ..Default::default()
        }
    }
}

// =============================================================================
// Add Money
// =============================================================================

/// Review state of an add-money request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddMoneyStatus {
    Approved,
    Pending,
    Rejected,
    #[default]
    Unknown,
}

impl AddMoneyStatus {
    /// Case-insensitive; the backend mixes `Approved` and `pending`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" | "approve" | "success" => AddMoneyStatus::Approved,
            "pending" => AddMoneyStatus::Pending,
            "rejected" | "reject" | "declined" => AddMoneyStatus::Rejected,
            _ => AddMoneyStatus::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for AddMoneyStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_util::string(deserializer)?;
        Ok(AddMoneyStatus::parse(&raw))
    }
}

/// One row of the add-money request history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMoneyRecord {
    #[serde(default, deserialize_with = "serde_util::string")]
    pub id: String,
    #[serde(default, deserialize_with = "serde_util::string")]
    pub date: String,
    #[serde(default, deserialize_with = "serde_util::string")]
    pub time: String,
    #[serde(default, deserialize_with = "serde_util::string")]
    pub utr: String,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub amount: f64,
    #[serde(default)]
    pub status: AddMoneyStatus,
}

// =============================================================================
// Wallet
// =============================================================================

/// Balances reported at the top level of the wallet response. Missing
/// balances read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    #[serde(default, deserialize_with = "serde_util::number")]
    pub wallet_balance: f64,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub cashback_balance: f64,
    #[serde(default, rename = "total_earning", deserialize_with = "serde_util::number")]
    pub total_earning: f64,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub affiliate_balance: f64,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub affiliate_income: f64,
    #[serde(default, rename = "today_income", deserialize_with = "serde_util::number")]
    pub today_income: f64,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub prime_balance: f64,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub epin_wallet_balance: f64,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub voucher: f64,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub rank: Option<String>,
}

// =============================================================================
// Income Passbook
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassbookEntry {
    #[serde(default, deserialize_with = "serde_util::string")]
    pub transaction_id: String,
    #[serde(default, rename = "type", deserialize_with = "serde_util::string")]
    pub kind: String,
    #[serde(default, deserialize_with = "serde_util::string")]
    pub details: String,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub credit: f64,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub debit: f64,
    #[serde(default, deserialize_with = "serde_util::number")]
    pub closing_balance: f64,
    #[serde(default, deserialize_with = "serde_util::string")]
    pub income_date: String,
}

impl PassbookEntry {
    /// Case-insensitive match on id, details or type.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        [&self.transaction_id, &self.details, &self.kind]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }
}

/// `totalAmount` block of the passbook response. Missing totals are `"0"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassbookTotals {
    #[serde(default = "zero", deserialize_with = "zero_if_missing")]
    pub total_credit: String,
    #[serde(default = "zero", deserialize_with = "zero_if_missing")]
    pub total_debit: String,
    #[serde(default = "zero", deserialize_with = "zero_if_missing")]
    pub opening_balance: String,
    #[serde(default = "zero", deserialize_with = "zero_if_missing")]
    pub closing_balance: String,
}

impl Default for PassbookTotals {
    fn default() -> Self {
        Self {
            total_credit: zero(),
            total_debit: zero(),
            opening_balance: zero(),
            closing_balance: zero(),
        }
    }
}

fn zero() -> String {
    "0".to_string()
}

fn zero_if_missing<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(serde_util::opt_string(deserializer)?.unwrap_or_else(zero))
}

/// Transaction types the passbook can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassbookFilter {
    #[default]
    All,
    DailySelfBonus,
    DailyProfitBonus,
    ReferralBonus,
}

impl PassbookFilter {
    /// Value sent in `filter: [..]`; `None` for all types.
    pub fn wire_value(&self) -> Option<&'static str> {
        match self {
            PassbookFilter::All => None,
            PassbookFilter::DailySelfBonus => Some("Daily Bonus Income"),
            PassbookFilter::DailyProfitBonus => Some("Daily Repurchase Bonus"),
            PassbookFilter::ReferralBonus => Some("Bonus"),
        }
    }
}

impl std::str::FromStr for PassbookFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(PassbookFilter::All),
            "self" | "daily bonus income" => Ok(PassbookFilter::DailySelfBonus),
            "profit" | "daily repurchase bonus" => Ok(PassbookFilter::DailyProfitBonus),
            "referral" | "bonus" => Ok(PassbookFilter::ReferralBonus),
            other => Err(format!("unknown passbook filter {other:?}")),
        }
    }
}

// =============================================================================
// Profile
// =============================================================================

/// `data[0]` of the profile route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub mlm_id: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub referred_by: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub ref_first_name: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub ref_last_name: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub ref_mobile: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub rank: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub profile_pic: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub pincode: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub city: Option<String>,
    #[serde(default, rename = "postOfficeName", deserialize_with = "serde_util::opt_string")]
    pub post_office_name: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub circle: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub division: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub dob: Option<String>,
    #[serde(default, rename = "aniversary_date", deserialize_with = "serde_util::opt_string")]
    pub anniversary_date: Option<String>,
    #[serde(default, deserialize_with = "serde_util::opt_string")]
    pub gender: Option<String>,
}

impl UserProfile {
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            employee_role: None,
            mlm_id: self.mlm_id.clone(),
            rank: self.rank.clone(),
            pincode: self.pincode.clone(),
            state: self.state.clone(),
            city: self.city.clone(),
            district: self.district.clone(),
            address: self.address.clone(),
            dob: self.dob.clone(),
            anniversary_date: self.anniversary_date.clone(),
            gender: self.gender.clone(),
            profile_image: self.profile_pic.clone(),
        }
    }

    /// Referrer's name, if the profile carries one.
    pub fn referrer_name(&self) -> Option<String> {
        ProfileSnapshot {
            first_name: self.ref_first_name.clone(),
            last_name: self.ref_last_name.clone(),
            ..Default::default()
        }
        .display_name()
    }
}

/// One post office returned by the pincode lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostOffice {
    #[serde(rename = "Office_name", default, deserialize_with = "serde_util::string")]
    pub office_name: String,
    #[serde(rename = "Circle", default, deserialize_with = "serde_util::string")]
    pub circle: String,
    #[serde(rename = "District", default, deserialize_with = "serde_util::string")]
    pub district: String,
    #[serde(rename = "Division", default, deserialize_with = "serde_util::string")]
    pub division: String,
    #[serde(rename = "Region", default, deserialize_with = "serde_util::string")]
    pub region: String,
    #[serde(rename = "State", default, deserialize_with = "serde_util::string")]
    pub state: String,
    #[serde(rename = "Pincode", default, deserialize_with = "serde_util::string")]
    pub pincode: String,
}

impl PostOffice {
    /// "Office, Division, District, State, Pincode", skipping blanks.
    pub fn full_address(&self) -> String {
        [
            &self.office_name,
            &self.division,
            &self.district,
            &self.state,
            &self.pincode,
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .map(|part| part.as_str())
        .collect::<Vec<_>>()
        .join(", ")
    }
}
