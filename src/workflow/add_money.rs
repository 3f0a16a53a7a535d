// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Add Money
//!
//! `Amount → Method → Details → Confirm → Success`.
//!
//! The user picks an amount and a payment method, is shown the deposit
//! account, pays outside the app, then confirms with the bank reference
//! (UTR) and a proof of payment. The request is reviewed by the backend;
//! the receipt only acknowledges that it was received.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::Workflow;
use crate::api::client::{ApiClient, FilePart};
use crate::api::wallet::AddMoneyRequest;
use crate::clock::Clock;
use crate::error::{ClientError, ValidationErrors};
use crate::serde_util::format_amount;

/// Preset amounts offered on the first step.
pub const QUICK_AMOUNTS: [u32; 6] = [500, 1000, 2500, 5000, 10000, 20000];

/// Where users send the money before confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepositAccount {
    pub bank_name: &'static str,
    pub account_number: &'static str,
    pub account_holder: &'static str,
    pub ifsc: &'static str,
    pub account_type: &'static str,
    pub upi_id: &'static str,
}

pub const DEPOSIT_ACCOUNT: DepositAccount = DepositAccount {
    bank_name: "IndusInd Bank",
    account_number: "259112421742",
    account_holder: "Mirrorinfo tech Pvt Ltd",
    ifsc: "INDB0000173",
    account_type: "Saving Account",
    upi_id: "mirrorhub@hdfcbank",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddMoneyStep {
    Amount,
    Method,
    Details,
    Confirm,
}

const STEPS: [AddMoneyStep; 4] = [
    AddMoneyStep::Amount,
    AddMoneyStep::Method,
    AddMoneyStep::Details,
    AddMoneyStep::Confirm,
];

impl fmt::Display for AddMoneyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AddMoneyStep::Amount => "Amount",
            AddMoneyStep::Method => "Method",
            AddMoneyStep::Details => "Details",
            AddMoneyStep::Confirm => "Confirm",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PaymentMethod {
    #[serde(rename = "UPI Transfer")]
    UpiTransfer,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    #[serde(rename = "Credit Card")]
    CreditCard,
    #[serde(rename = "Debit Card")]
    DebitCard,
    #[serde(rename = "Net Banking")]
    NetBanking,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::UpiTransfer,
        PaymentMethod::BankTransfer,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::NetBanking,
    ];

    /// Label shown to the user and sent as `category`.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::UpiTransfer => "UPI Transfer",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::DebitCard => "Debit Card",
            PaymentMethod::NetBanking => "Net Banking",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let labels: Vec<&str> = PaymentMethod::ALL.iter().map(|m| m.label()).collect();
                format!("unknown payment method {wanted:?}; expected one of {}", labels.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMode {
    #[default]
    Upi,
    Imps,
    Neft,
}

impl PaymentMode {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMode::Upi => "UPI",
            PaymentMode::Imps => "IMPS",
            PaymentMode::Neft => "NEFT",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UPI" => Ok(PaymentMode::Upi),
            "IMPS" => Ok(PaymentMode::Imps),
            "NEFT" => Ok(PaymentMode::Neft),
            other => Err(format!("unknown payment mode {other:?}; expected UPI, IMPS or NEFT")),
        }
    }
}

/// Everything the user enters across the steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddMoneyInput {
    pub amount: String,
    pub method: Option<PaymentMethod>,
    pub utr: String,
    pub payment_mode: Option<PaymentMode>,
    pub proof: Option<FilePart>,
}

impl Default for AddMoneyInput {
    fn default() -> Self {
        Self {
            amount: String::new(),
            method: None,
            utr: String::new(),
            payment_mode: Some(PaymentMode::default()),
            proof: None,
        }
    }
}

/// Acknowledgement shown on the success step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddMoneyReceipt {
    pub reference: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub utr: String,
    pub payment_mode: PaymentMode,
    pub submitted_at: DateTime<Utc>,
}

impl AddMoneyReceipt {
    pub fn display_amount(&self) -> String {
        format!("₹{}", format_amount(self.amount))
    }
}

/// `TXN` followed by the last eight digits of the epoch milliseconds.
fn receipt_reference(at: DateTime<Utc>) -> String {
    let millis = at.timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(8)..];
    format!("TXN{tail}")
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn is_accepted_proof(proof: &FilePart) -> bool {
    let content_type = proof.content_type.to_ascii_lowercase();
    content_type.starts_with("image/")
        || matches!(
            content_type.as_str(),
            "application/pdf"
                | "application/msword"
                | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        )
}

pub struct AddMoneyWorkflow {
    client: ApiClient,
    clock: Arc<dyn Clock>,
}

impl AddMoneyWorkflow {
    pub fn new(client: ApiClient, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    /// Account details shown on the `Details` step.
    pub fn deposit_account(&self) -> &'static DepositAccount {
        &DEPOSIT_ACCOUNT
    }
}

impl Workflow for AddMoneyWorkflow {
    type Step = AddMoneyStep;
    type Input = AddMoneyInput;
    type Output = AddMoneyReceipt;

    fn steps(&self) -> &[AddMoneyStep] {
        &STEPS
    }

    fn validate(&self, step: AddMoneyStep, input: &AddMoneyInput) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        match step {
            AddMoneyStep::Amount => {
                if input.amount.trim().is_empty() {
                    errors.add("amount", "Please enter an amount.");
                } else if parse_amount(&input.amount).is_none() {
                    errors.add("amount", "Please enter a valid amount.");
                }
            }
            AddMoneyStep::Method => {
                if input.method.is_none() {
                    errors.add("method", "Please select a payment method.");
                }
            }
            AddMoneyStep::Details => {}
            AddMoneyStep::Confirm => {
                if input.utr.trim().is_empty() {
                    errors.add("utr", "Please enter the UTR / reference number.");
                }
                if input.payment_mode.is_none() {
                    errors.add("payment_mode", "Please select a payment mode.");
                }
                match &input.proof {
                    None => errors.add("proof", "Please upload a payment proof."),
                    Some(proof) if !is_accepted_proof(proof) => errors.add(
                        "proof",
                        "Payment proof must be an image, PDF or Word document.",
                    ),
                    Some(_) => {}
                }
            }
        }
        errors
    }

    async fn submit(
        &self,
        input: AddMoneyInput,
        cancel: CancellationToken,
    ) -> Result<AddMoneyReceipt, ClientError> {
        // Re-checked so a caller driving `submit` directly cannot skip steps.
        let amount = parse_amount(&input.amount)
            .ok_or_else(|| ClientError::validation("amount", "Please enter a valid amount."))?;
        let method = input.method.ok_or_else(|| {
            ClientError::validation("method", "Please select a payment method.")
        })?;
        let payment_mode = input.payment_mode.ok_or_else(|| {
            ClientError::validation("payment_mode", "Please select a payment mode.")
        })?;
        let proof = input
            .proof
            .ok_or_else(|| ClientError::validation("proof", "Please upload a payment proof."))?;
        let utr = input.utr.trim().to_string();

        self.client
            .submit_add_money(
                AddMoneyRequest {
                    amount: input.amount.trim().to_string(),
                    category: method.label().to_string(),
                    trans_no: utr.clone(),
                    payment_mode: payment_mode.label().to_string(),
                    proof,
                },
                Some(cancel),
            )
            .await?;

        let submitted_at = self.clock.now();
        Ok(AddMoneyReceipt {
            reference: receipt_reference(submitted_at),
            amount,
            method,
            utr,
            payment_mode,
            submitted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::endpoints;
    use crate::clock::ManualClock;
    use crate::session::{test_grant, SessionManager};
    use crate::test_support::{FakeBackend, Reply};
    use crate::workflow::{Advance, Position, StepWizard};
    use chrono::TimeZone;
    use serde_json::json;

    fn workflow_for(backend: &FakeBackend) -> (AddMoneyWorkflow, ManualClock) {
        let session = SessionManager::in_memory();
        session.begin_login(test_grant("42"), Utc::now()).unwrap();
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_735_689_612_345).unwrap());
        let workflow = AddMoneyWorkflow::new(backend.client(session), Arc::new(clock.clone()));
        (workflow, clock)
    }

    fn complete_input() -> AddMoneyInput {
        AddMoneyInput {
            amount: "1000".into(),
            method: Some(PaymentMethod::UpiTransfer),
            utr: "UTR123".into(),
            payment_mode: Some(PaymentMode::Upi),
            proof: Some(FilePart::new("proof", "file.jpg", vec![0xFF, 0xD8])),
        }
    }

    #[test]
    fn method_labels_parse_case_insensitively() {
        assert_eq!(
            "upi transfer".parse::<PaymentMethod>(),
            Ok(PaymentMethod::UpiTransfer)
        );
        assert_eq!("Net Banking".parse::<PaymentMethod>(), Ok(PaymentMethod::NetBanking));
        assert!("Cash".parse::<PaymentMethod>().is_err());
        assert_eq!("neft".parse::<PaymentMode>(), Ok(PaymentMode::Neft));
    }

    #[test]
    fn reference_uses_last_eight_digits() {
        let at = Utc.timestamp_millis_opt(1_735_689_612_345).unwrap();
        assert_eq!(receipt_reference(at), "TXN89612345");
    }

    #[tokio::test]
    async fn amount_step_rules() {
        let backend = FakeBackend::start().await;
        let (workflow, _) = workflow_for(&backend);
        let mut input = AddMoneyInput::default();

        let errors = workflow.validate(AddMoneyStep::Amount, &input);
        assert_eq!(errors.get("amount"), Some("Please enter an amount."));

        for bad in ["abc", "0", "-5"] {
            input.amount = bad.into();
            assert!(!workflow.validate(AddMoneyStep::Amount, &input).is_empty());
        }
        input.amount = "250.50".into();
        assert!(workflow.validate(AddMoneyStep::Amount, &input).is_empty());
    }

    #[tokio::test]
    async fn confirm_step_needs_reference_mode_and_proof() {
        let backend = FakeBackend::start().await;
        let (workflow, _) = workflow_for(&backend);
        let input = AddMoneyInput {
            payment_mode: None,
            ..AddMoneyInput::default()
        };

        let errors = workflow.validate(AddMoneyStep::Confirm, &input);
        assert_eq!(errors.len(), 3);
        assert!(errors.get("utr").is_some());
        assert!(errors.get("payment_mode").is_some());
        assert!(errors.get("proof").is_some());

        let zipped = AddMoneyInput {
            proof: Some(FilePart::new("proof", "proof.zip", vec![1])),
            ..complete_input()
        };
        assert_eq!(
            workflow.validate(AddMoneyStep::Confirm, &zipped).get("proof"),
            Some("Payment proof must be an image, PDF or Word document.")
        );

        let pdf = AddMoneyInput {
            proof: Some(FilePart::new("proof", "receipt.PDF", vec![1])),
            ..complete_input()
        };
        assert!(workflow.validate(AddMoneyStep::Confirm, &pdf).is_empty());
        assert!(workflow
            .validate(AddMoneyStep::Details, &AddMoneyInput::default())
            .is_empty());
    }

    #[tokio::test]
    async fn empty_amount_keeps_wizard_on_first_step() {
        let backend = FakeBackend::start().await;
        let (workflow, _) = workflow_for(&backend);
        let wizard = StepWizard::new(workflow).unwrap();

        assert!(matches!(wizard.advance().await, Advance::Rejected(_)));
        assert_eq!(wizard.step_number(), 1);
        assert_eq!(wizard.position(), Position::Step(AddMoneyStep::Amount));
    }

    #[tokio::test]
    async fn upi_deposit_reaches_success() {
        let backend = FakeBackend::start().await;
        backend.on(endpoints::ADD_MONEY, Reply::sealed(json!({"status": 200})));
        let (workflow, _) = workflow_for(&backend);
        let wizard = StepWizard::new(workflow).unwrap();

        wizard.update(|i| i.amount = "1000".into());
        assert_eq!(wizard.advance().await, Advance::Moved(AddMoneyStep::Method));
        wizard.update(|i| i.method = Some(PaymentMethod::UpiTransfer));
        assert_eq!(wizard.advance().await, Advance::Moved(AddMoneyStep::Details));
        assert_eq!(wizard.workflow().deposit_account().upi_id, "mirrorhub@hdfcbank");
        assert_eq!(wizard.advance().await, Advance::Moved(AddMoneyStep::Confirm));
        wizard.update(|i| {
            i.utr = "UTR123".into();
            i.proof = Some(FilePart::new("proof", "file.jpg", vec![0xFF, 0xD8]));
        });
        assert_eq!(wizard.advance().await, Advance::Completed);

        let Position::Success(receipt) = wizard.position() else {
            panic!("expected success");
        };
        assert_eq!(receipt.display_amount(), "₹1000");
        assert_eq!(receipt.reference, "TXN89612345");
        assert_eq!(receipt.method, PaymentMethod::UpiTransfer);
        assert_eq!(wizard.step_number(), 5);

        let sent = backend.last_request(endpoints::ADD_MONEY).unwrap();
        assert_eq!(sent.fields["category"], "UPI Transfer");
        assert_eq!(sent.fields["trans_no"], "UTR123");
        assert_eq!(sent.files[0].file_name, "file.jpg");
    }

    #[tokio::test]
    async fn server_rejection_keeps_confirm_step() {
        let backend = FakeBackend::start().await;
        backend.on(
            endpoints::ADD_MONEY,
            Reply::sealed(json!({"status": 400, "message": "Invalid UTR"})),
        );
        let (workflow, _) = workflow_for(&backend);
        let wizard = StepWizard::new(workflow).unwrap();
        wizard.update(|i| *i = complete_input());
        for _ in 0..3 {
            wizard.advance().await;
        }

        let outcome = wizard.advance().await;
        assert!(matches!(outcome, Advance::Failed(ClientError::RequestFailed { .. })));
        assert_eq!(wizard.position(), Position::Step(AddMoneyStep::Confirm));
        assert_eq!(wizard.input().utr, "UTR123");
        assert_eq!(
            wizard.last_error().map(|e| e.user_message()),
            Some("Invalid UTR".to_string())
        );
    }

    #[tokio::test]
    async fn double_confirm_uploads_once() {
        let backend = FakeBackend::start().await;
        backend.on(
            endpoints::ADD_MONEY,
            Reply::sealed(json!({"status": 200})).delayed(std::time::Duration::from_millis(100)),
        );
        let (workflow, _) = workflow_for(&backend);
        let wizard = Arc::new(StepWizard::new(workflow).unwrap());
        wizard.update(|i| *i = complete_input());
        for _ in 0..3 {
            wizard.advance().await;
        }

        let (first, second) = tokio::join!(wizard.advance(), wizard.advance());
        assert_eq!(first, Advance::Completed);
        assert_eq!(second, Advance::Ignored);
        assert_eq!(backend.hits(endpoints::ADD_MONEY), 1);
    }
}
