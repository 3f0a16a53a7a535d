// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `mirrorhub` - command-line client for the Mirror Hub backend.
//!
//! The session lives in a JSON file (`MIRRORHUB_SESSION_FILE`) so a login,
//! its OTP verification and later commands can be separate invocations.
//! Results go to stdout as JSON; errors go to stderr as the message a user
//! would see, with exit status 1.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use mirrorhub_client::api::{ApiClient, FilePart, IncomePassbook, LoginForm, PassbookQuery};
use mirrorhub_client::clock::SystemClock;
use mirrorhub_client::config::ClientConfig;
use mirrorhub_client::error::ClientError;
use mirrorhub_client::logging::{self, LogFormat};
use mirrorhub_client::models::PassbookFilter;
use mirrorhub_client::navigation::{self, RecordingNavigator, Route};
use mirrorhub_client::otp::{OtpChallenge, OtpFlow, ResendOutcome, VerifyOutcome};
use mirrorhub_client::session::{FileSessionStore, Session, SessionManager};
use mirrorhub_client::workflow::{
    AddMoneyWorkflow, Advance, PaymentMethod, PaymentMode, Position, StepWizard,
};

#[derive(Parser)]
#[command(name = "mirrorhub")]
#[command(about = "Mirror Hub wallet portal client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check mobile and password; an OTP is sent to the mobile
    Login {
        #[arg(long)]
        mobile: String,
        #[arg(long, env = "MIRRORHUB_PASSWORD", hide_env_values = true)]
        password: String,
        /// Token from the CAPTCHA widget
        #[arg(long)]
        captcha_token: String,
    },
    /// Complete a pending login with the 6-digit OTP
    VerifyOtp { otp: String },
    /// Send a fresh OTP for the pending login
    ResendOtp,
    /// Drop the pending login to start over with another number
    ChangeNumber,
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Wallet balances
    Wallet,
    /// Profile, balances and resolved address
    Profile,
    /// Look up post offices for a pincode
    Pincode { code: String },
    /// Lift a login lockout
    Unblock { username: String },
    /// Request a wallet top-up for a payment already made
    AddMoney {
        #[arg(long)]
        amount: String,
        /// UPI Transfer, Bank Transfer, Credit Card, Debit Card or Net Banking
        #[arg(long)]
        method: PaymentMethod,
        /// Bank reference (UTR) of the payment
        #[arg(long)]
        utr: String,
        #[arg(long, default_value = "UPI")]
        mode: PaymentMode,
        /// Screenshot or document proving the payment
        #[arg(long)]
        proof: PathBuf,
    },
    /// Earlier add-money requests and their review state
    AddMoneyHistory,
    /// Income passbook
    Passbook {
        /// First day, yyyy-mm-dd
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day, yyyy-mm-dd
        #[arg(long)]
        to: Option<NaiveDate>,
        /// all, self, profit or referral
        #[arg(long, default_value = "all")]
        filter: PassbookFilter,
        /// Pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Only show rows whose id, details or type contain this
        #[arg(long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(LogFormat::from_env());
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = %e, "Command failed");
            eprintln!("{}", e.user_message());
            if e.requires_login() {
                eprintln!("Run `mirrorhub login` to sign in again.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), ClientError> {
    let config = ClientConfig::from_env()?;
    let session = SessionManager::new(FileSessionStore::new(config.session_file.clone()));
    let client = ApiClient::new(&config, config.codec(), session.clone())?;

    match command {
        Command::Login {
            mobile,
            password,
            captcha_token,
        } => {
            let opened = client
                .login(&LoginForm {
                    mobile,
                    password,
                    captcha_token,
                })
                .await?;
            print_json(&json!({
                "user_id": opened.user_id,
                "mobile": opened.mobile,
                "next": "verify-otp",
            }))
        }
        Command::VerifyOtp { otp } => {
            let (flow, navigator) = otp_flow(&client, &config)?;
            match flow.verify(&otp).await? {
                VerifyOutcome::Verified => print_json(&json!({
                    "verified": true,
                    "route": last_route(&navigator),
                })),
                VerifyOutcome::Rejected { message } => {
                    Err(ClientError::request_failed(400, message))
                }
                VerifyOutcome::Ignored => print_json(&json!({ "verified": false })),
            }
        }
        Command::ResendOtp => {
            let (flow, _) = otp_flow(&client, &config)?;
            let sent = flow.resend().await? == ResendOutcome::Sent;
            print_json(&json!({ "sent": sent, "mobile": flow.mobile() }))
        }
        Command::ChangeNumber => {
            let (flow, navigator) = otp_flow(&client, &config)?;
            flow.change_number()?;
            print_json(&json!({ "route": last_route(&navigator) }))
        }
        Command::Logout => {
            client.logout()?;
            print_json(&json!({ "logged_out": true }))
        }
        Command::Whoami => {
            let current = require_login(&session)?;
            print_json(&json!({
                "user_id": current.user_id,
                "role": current.role.to_string(),
                "mobile": current.mobile,
                "name": current.profile.display_name(),
                "profile": current.profile,
                "signed_in_at": current.created_at,
                "otp_verified_at": current.otp_verified_at,
            }))
        }
        Command::Wallet => {
            require_login(&session)?;
            print_json(&client.wallet_summary().await?)
        }
        Command::Profile => {
            require_login(&session)?;
            print_json(&client.load_profile().await?)
        }
        Command::Pincode { code } => print_json(&client.pincode_lookup(&code).await?),
        Command::Unblock { username } => {
            let message = client.unblock_user(&username).await?;
            print_json(&json!({ "message": message }))
        }
        Command::AddMoney {
            amount,
            method,
            utr,
            mode,
            proof,
        } => {
            require_login(&session)?;
            let proof = FilePart::from_path("proof", &proof).await?;
            let wizard = StepWizard::new(AddMoneyWorkflow::new(client, Arc::new(SystemClock)))?;
            wizard.update(|input| {
                input.amount = amount;
                input.method = Some(method);
                input.utr = utr;
                input.payment_mode = Some(mode);
                input.proof = Some(proof);
            });

            loop {
                match wizard.advance().await {
                    Advance::Moved(step) => debug!(%step, "Add money step complete"),
                    Advance::Completed | Advance::Ignored => break,
                    Advance::Rejected(errors) => return Err(ClientError::Validation(errors)),
                    Advance::Failed(e) => return Err(e),
                }
            }
            match wizard.position() {
                Position::Success(receipt) => print_json(&json!({
                    "reference": receipt.reference,
                    "amount": receipt.display_amount(),
                    "method": receipt.method,
                    "utr": receipt.utr,
                    "payment_mode": receipt.payment_mode,
                    "submitted_at": receipt.submitted_at,
                })),
                Position::Step(step) => Err(ClientError::Configuration(format!(
                    "add money stopped at the {step} step"
                ))),
            }
        }
        Command::AddMoneyHistory => {
            require_login(&session)?;
            print_json(&client.add_money_history().await?)
        }
        Command::Passbook {
            from,
            to,
            filter,
            pages,
            search,
        } => {
            require_login(&session)?;
            let mut passbook = IncomePassbook::new(client, PassbookQuery { from, to, filter });
            passbook.load_first().await?;
            for _ in 1..pages.max(1) {
                if passbook.load_more().await? == 0 {
                    break;
                }
            }
            let entries = passbook.search(search.as_deref().unwrap_or_default());
            print_json(&json!({
                "entries": entries,
                "totals": passbook.totals(),
                "pages_loaded": passbook.page(),
                "has_more": passbook.has_more(),
            }))
        }
    }
}

/// The authenticated-area guard: a verified session or `NotAuthenticated`.
fn require_login(session: &SessionManager) -> Result<Session, ClientError> {
    let current = session.current()?;
    match navigation::guard(current.as_ref()) {
        None => current.ok_or(ClientError::NotAuthenticated),
        Some(_) => Err(ClientError::NotAuthenticated),
    }
}

/// OTP flow for the login waiting in the session file. The resend cooldown
/// runs from the last send recorded there (the login itself, until a resend).
fn otp_flow(
    client: &ApiClient,
    config: &ClientConfig,
) -> Result<(OtpFlow<ApiClient>, Arc<RecordingNavigator>), ClientError> {
    let pending = client
        .session()
        .current()?
        .filter(Session::is_pending_otp)
        .ok_or_else(|| {
            ClientError::validation("otp", "No login is waiting for an OTP. Log in first.")
        })?;

    let issued_at = pending.otp_issued_at();
    let navigator = Arc::new(RecordingNavigator::new());
    let flow = OtpFlow::new(
        client.clone(),
        client.session().clone(),
        navigator.clone(),
        Arc::new(SystemClock),
        OtpChallenge::login(pending.mobile, issued_at),
        config.otp_cooldown,
    );
    Ok((flow, navigator))
}

fn last_route(navigator: &RecordingNavigator) -> Option<&'static str> {
    navigator.routes().last().map(Route::path)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), ClientError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::Decode(format!("could not render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}
