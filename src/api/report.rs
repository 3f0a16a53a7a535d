// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Income passbook: paged, filterable ledger of credited income.
//!
//! The backend pages by number and does not report a total count, so a
//! page with fewer than [`PAGE_SIZE`] rows is taken as the last one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::client::{ApiClient, RequestOptions};
use super::endpoints;
use crate::error::ClientError;
use crate::models::{PassbookEntry, PassbookFilter, PassbookTotals};

/// Rows per backend page.
pub const PAGE_SIZE: usize = 10;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date range and type filter. Missing dates are open-ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassbookQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub filter: PassbookFilter,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassbookPage {
    pub entries: Vec<PassbookEntry>,
    pub totals: PassbookTotals,
}

#[derive(Serialize)]
struct PassbookRequest<'a> {
    user_id: &'a str,
    page: u32,
    startdate: Option<String>,
    enddate: Option<String>,
    filter: Option<[&'static str; 1]>,
}

#[derive(Deserialize)]
struct TotalsField {
    #[serde(rename = "totalAmount", default)]
    total_amount: Option<PassbookTotals>,
}

impl ApiClient {
    /// Fetch one page (1-based). Empty results come back as an empty page
    /// with zeroed totals.
    pub async fn income_passbook_page(
        &self,
        query: &PassbookQuery,
        page: u32,
    ) -> Result<PassbookPage, ClientError> {
        let user_id = self.session().require_user_id()?;
        let request = PassbookRequest {
            user_id: &user_id,
            page: page.max(1),
            startdate: query.from.map(|d| d.format(DATE_FORMAT).to_string()),
            enddate: query.to.map(|d| d.format(DATE_FORMAT).to_string()),
            filter: query.filter.wire_value().map(|f| [f]),
        };

        let response = self
            .post_json(endpoints::INCOME_PASSBOOK, &request, RequestOptions::bearer())
            .await?;
        if response.is_empty_result() {
            debug!(page, "No passbook entries");
            return Ok(PassbookPage::default());
        }

        let entries: Vec<PassbookEntry> = response.rows()?;
        let totals = response
            .extra_as::<TotalsField>()?
            .total_amount
            .unwrap_or_default();
        debug!(page, count = entries.len(), "Passbook page loaded");
        Ok(PassbookPage { entries, totals })
    }
}

/// Accumulates passbook pages for one query.
#[derive(Debug)]
pub struct IncomePassbook {
    client: ApiClient,
    query: PassbookQuery,
    entries: Vec<PassbookEntry>,
    totals: PassbookTotals,
    page: u32,
    has_more: bool,
}

impl IncomePassbook {
    pub fn new(client: ApiClient, query: PassbookQuery) -> Self {
        Self {
            client,
            query,
            entries: Vec::new(),
            totals: PassbookTotals::default(),
            page: 0,
            has_more: false,
        }
    }

    pub fn query(&self) -> &PassbookQuery {
        &self.query
    }

    /// Change the range or filter. Loaded rows are dropped; call
    /// [`load_first`](Self::load_first) again.
    pub fn set_query(&mut self, query: PassbookQuery) {
        self.query = query;
        self.clear();
    }

    pub fn entries(&self) -> &[PassbookEntry] {
        &self.entries
    }

    pub fn totals(&self) -> &PassbookTotals {
        &self.totals
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Last page loaded, 0 before the first load.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Reload from page 1, replacing whatever was loaded.
    pub async fn load_first(&mut self) -> Result<usize, ClientError> {
        match self.client.income_passbook_page(&self.query, 1).await {
            Ok(page) => {
                self.page = 1;
                self.has_more = page.entries.len() >= PAGE_SIZE;
                self.totals = page.totals;
                self.entries = page.entries;
                Ok(self.entries.len())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load passbook");
                self.clear();
                Err(e)
            }
        }
    }

    /// Append the next page. Returns how many rows were added; does nothing
    /// once the last page has been seen.
    pub async fn load_more(&mut self) -> Result<usize, ClientError> {
        if !self.has_more {
            return Ok(0);
        }
        let next = self.page + 1;
        let page = self.client.income_passbook_page(&self.query, next).await?;
        let added = page.entries.len();
        self.page = next;
        self.has_more = added >= PAGE_SIZE;
        if added == 0 {
            self.totals = PassbookTotals::default();
        } else {
            self.totals = page.totals;
        }
        self.entries.extend(page.entries);
        Ok(added)
    }

    /// Loaded rows whose id, details or type contain `term`.
    pub fn search(&self, term: &str) -> Vec<&PassbookEntry> {
        self.entries.iter().filter(|e| e.matches(term)).collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.totals = PassbookTotals::default();
        self.page = 0;
        self.has_more = false;
    }
}
