// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OTP send/verify routes.

use serde::Serialize;

use super::client::{ApiClient, RequestOptions};
use super::endpoints;
use crate::envelope::ApiResponse;
use crate::error::ClientError;
use crate::otp::OtpGateway;

const CHANNEL: &str = "Mobile";
const MODE: &str = "API";

#[derive(Serialize)]
struct SendOtpRequest<'a> {
    #[serde(rename = "type")]
    channel: &'a str,
    mode: &'a str,
    mobile: &'a str,
    email: &'a str,
    name: &'a str,
    category: &'a str,
}

#[derive(Serialize)]
struct VerifyOtpRequest<'a> {
    #[serde(rename = "type")]
    channel: &'a str,
    mode: &'a str,
    mobile: &'a str,
    category: &'a str,
    otp: &'a str,
}

impl OtpGateway for ApiClient {
    async fn send_otp(&self, mobile: &str, category: &str) -> Result<ApiResponse, ClientError> {
        let request = SendOtpRequest {
            channel: CHANNEL,
            mode: MODE,
            mobile,
            email: "",
            name: "",
            category,
        };
        self.post_json(endpoints::SEND_OTP, &request, RequestOptions::anonymous())
            .await
    }

    async fn verify_otp(
        &self,
        mobile: &str,
        category: &str,
        otp: &str,
    ) -> Result<ApiResponse, ClientError> {
        let request = VerifyOtpRequest {
            channel: CHANNEL,
            mode: MODE,
            mobile,
            category,
            otp,
        };
        self.post_json(endpoints::VERIFY_OTP, &request, RequestOptions::anonymous())
            .await
    }
}
