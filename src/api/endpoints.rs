// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Backend routes.
//!
//! Most routes are opaque hashes chosen by the backend; the constant names
//! say what each one does.

pub const LOGIN: &str = "/api/users/admin_login";
pub const UNBLOCK_USER: &str = "/api/users/unblock";

pub const SEND_OTP: &str = "/api/send-otp";
pub const VERIFY_OTP: &str = "/api/verify-otp";

pub const ADD_MONEY: &str = "/api/add_money/53aeb245864f03638400271b8a13ac38bad62be5";
pub const ADD_MONEY_HISTORY: &str = "/api/add_money/098263ebb9bde3adcfc7761f4072b46c9fc7e9eb";

pub const WALLET_SUMMARY: &str = "/api/wallet/e1af0d84d643e7c955bee1ee6d03a8b9a88a07fd";

pub const INCOME_PASSBOOK: &str = "/api/report/dbafcc3a978c44e1e6255bfda23d108c5463cf16";

pub const USER_PROFILE: &str = "/api/users/63c6ad33e3395d611c35ed9ef749fd8fe4ae2bb4";
pub const UPDATE_PROFILE: &str = "/api/users/978d91c8d62d882a00631e74fa6c6863616ebc13";
pub const PINCODE_LOOKUP: &str = "/api/pincode/916e4eb592f2058c43a3face75b0f9d49ef2bd17";

pub const VERIFY_REFERRAL: &str = "/api/users/9a82bc2234a56504434ce88e3ab2a11f34b0dcc8";
pub const REGISTER: &str = "/api/users/13a2828b3adecc1c32ea3888d08afa51e147b3f3";
