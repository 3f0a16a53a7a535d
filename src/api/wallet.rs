// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Main wallet: add-money requests, their history, and balances.

use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::{ApiClient, FilePart, MultipartForm, RequestBody, RequestOptions};
use super::endpoints;
use crate::envelope::ApiResponse;
use crate::error::ClientError;
use crate::models::{AddMoneyRecord, WalletSummary};

/// Wallet name sent with an add-money request.
pub const ADD_MONEY_WALLET: &str = "main";
/// Wallet name the history route filters on.
pub const HISTORY_WALLET: &str = "Main";

/// Multipart field carrying the payment proof.
pub const PROOF_FIELD: &str = "img";

/// A deposit the user has already made, to be credited after review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddMoneyRequest {
    pub amount: String,
    /// Payment method label, e.g. `UPI Transfer`.
    pub category: String,
    /// Bank reference (UTR) of the transfer.
    pub trans_no: String,
    pub payment_mode: String,
    pub proof: FilePart,
}

#[derive(Serialize)]
struct HistoryQuery<'a> {
    user_id: &'a str,
    wallet: &'a str,
}

#[derive(Serialize)]
struct WalletQuery<'a> {
    user_id: &'a str,
}

impl ApiClient {
    /// Upload an add-money request. Multipart bodies bypass the envelope.
    pub async fn submit_add_money(
        &self,
        request: AddMoneyRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<ApiResponse, ClientError> {
        let user_id = self.session().require_user_id()?;

        let proof = FilePart {
            field: PROOF_FIELD.to_string(),
            ..request.proof
        };
        let form = MultipartForm::new()
            .text("user_id", user_id.as_str())
            .text("amount", request.amount.as_str())
            .text("category", request.category.as_str())
            .text("trans_no", request.trans_no.as_str())
            .text("payment_mode", request.payment_mode.as_str())
            .text("wallet", ADD_MONEY_WALLET)
            .file(proof);

        let mut options = RequestOptions::bearer();
        if let Some(token) = cancel {
            options = options.with_cancel(token);
        }

        let response = self
            .request(
                Method::POST,
                endpoints::ADD_MONEY,
                RequestBody::Multipart(form),
                options,
            )
            .await?
            .ensure_success()?;
        info!(%user_id, amount = %request.amount, "Add-money request submitted");
        Ok(response)
    }

    /// Earlier add-money requests for the signed-in user, newest first as
    /// returned by the backend.
    pub async fn add_money_history(&self) -> Result<Vec<AddMoneyRecord>, ClientError> {
        let user_id = self.session().require_user_id()?;
        let response = self
            .post_json(
                endpoints::ADD_MONEY_HISTORY,
                &HistoryQuery {
                    user_id: &user_id,
                    wallet: HISTORY_WALLET,
                },
                RequestOptions::bearer(),
            )
            .await?;
        let records: Vec<AddMoneyRecord> = response.rows()?;
        debug!(count = records.len(), "Add-money history loaded");
        Ok(records)
    }

    pub async fn wallet_summary(&self) -> Result<WalletSummary, ClientError> {
        let user_id = self.session().require_user_id()?;
        let response = self
            .post_json(
                endpoints::WALLET_SUMMARY,
                &WalletQuery { user_id: &user_id },
                RequestOptions::bearer(),
            )
            .await?;

        // Balances sit at the top level; a status, when present, must be 200.
        if response.status.is_some() && !response.is_success() {
            debug!(status = ?response.status, "Wallet summary unavailable");
            return Ok(WalletSummary::default());
        }
        response.extra_as()
    }
}
