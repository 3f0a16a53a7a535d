// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password login, account unblock and logout.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::client::{ApiClient, RequestOptions};
use super::endpoints;
use crate::error::{ClientError, ValidationErrors};
use crate::models::LoginUser;
use crate::session::{LoginGrant, Session};

#[derive(Clone, Default)]
pub struct LoginForm {
    pub mobile: String,
    pub password: String,
    pub captcha_token: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("mobile", &self.mobile)
            .finish_non_exhaustive()
    }
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = ValidationErrors::new();
        if self.mobile.trim().is_empty() {
            errors.add("mobile", "Mobile number is required.");
        }
        if self.password.is_empty() {
            errors.add("password", "Password is required.");
        }
        if self.captcha_token.trim().is_empty() {
            errors.add("captcha", "Please complete the CAPTCHA.");
        }
        errors.into_result()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    is_admin: u8,
    #[serde(rename = "captchaToken")]
    captcha_token: &'a str,
}

#[derive(Serialize)]
struct UnblockRequest<'a> {
    username: &'a str,
}

impl ApiClient {
    /// Check the password and open a session that still needs OTP.
    pub async fn login(&self, form: &LoginForm) -> Result<Session, ClientError> {
        form.validate()?;
        let mobile = form.mobile.trim();

        let response = self
            .post_json(
                endpoints::LOGIN,
                &LoginRequest {
                    username: mobile,
                    password: &form.password,
                    is_admin: 1,
                    captcha_token: form.captcha_token.trim(),
                },
                RequestOptions::anonymous(),
            )
            .await?;

        if response.is_unauthorized() {
            let message = response
                .message
                .unwrap_or_else(|| "Invalid mobile number or password.".to_string());
            return Err(ClientError::request_failed(401, message));
        }
        let response = response.ensure_success()?;

        let user: LoginUser = response.data_as()?;
        if user.id.is_empty() {
            return Err(ClientError::Decode("login response has no user id".into()));
        }
        let access_token = response
            .extra_str("token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::Decode("login response has no token".into()))?
            .to_string();

        let grant = LoginGrant {
            user_id: user.id.clone(),
            access_token,
            refresh_token: response.extra_str("refreshToken").map(str::to_string),
            mobile: if user.mobile.is_empty() {
                mobile.to_string()
            } else {
                user.mobile.clone()
            },
            profile: user.snapshot(),
        };
        info!(user_id = %grant.user_id, "Password login accepted");
        self.session().begin_login(grant, Utc::now())
    }

    /// Lift a lockout after too many failed logins.
    pub async fn unblock_user(&self, username: &str) -> Result<String, ClientError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::validation("username", "Username is required."));
        }

        let response = self
            .post_json(
                endpoints::UNBLOCK_USER,
                &UnblockRequest { username },
                RequestOptions::anonymous(),
            )
            .await?
            .ensure_success()?;
        info!(username, "User unblocked");
        Ok(response
            .message
            .unwrap_or_else(|| "User unblocked successfully!".to_string()))
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.session().logout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{test_grant, SessionManager};
    use crate::test_support::{FakeBackend, Reply};
    use serde_json::json;

    fn form() -> LoginForm {
        LoginForm {
            mobile: "9876543210".into(),
            password: "secret1".into(),
            captcha_token: "captcha".into(),
        }
    }

    #[test]
    fn login_form_reports_every_missing_field() {
        let err = LoginForm::default().validate().unwrap_err();
        let ClientError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("mobile"), Some("Mobile number is required."));
        assert_eq!(errors.get("password"), Some("Password is required."));
        assert_eq!(errors.get("captcha"), Some("Please complete the CAPTCHA."));
    }

    #[tokio::test]
    async fn login_opens_pending_session() {
        let backend = FakeBackend::start().await;
        backend.on(
            endpoints::LOGIN,
            Reply::sealed(json!({
                "status": 200,
                "message": "Login successful",
                "token": "jwt-abc",
                "data": {
                    "id": 42,
                    "email": "asha@example.com",
                    "first_name": "Asha",
                    "last_name": "Rao",
                    "mobile": "9876543210",
                    "role_name": "member"
                }
            })),
        );
        let session = SessionManager::in_memory();
        let client = backend.client(session.clone());

        let opened = client.login(&form()).await.unwrap();
        assert_eq!(opened.user_id, "42");
        assert!(opened.is_pending_otp());
        assert!(!session.is_authenticated());
        assert_eq!(session.access_token().as_deref(), Some("jwt-abc"));

        let sent = backend.last_request(endpoints::LOGIN).unwrap();
        assert!(sent.authorization.is_none());
        assert_eq!(
            sent.body,
            json!({
                "username": "9876543210",
                "password": "secret1",
                "is_admin": 1,
                "captchaToken": "captcha"
            })
        );
    }

    #[tokio::test]
    async fn invalid_form_makes_no_request() {
        let backend = FakeBackend::start().await;
        let client = backend.client(SessionManager::in_memory());
        let bad = LoginForm {
            password: String::new(),
            ..form()
        };
        assert!(matches!(
            client.login(&bad).await,
            Err(ClientError::Validation(_))
        ));
        assert_eq!(backend.hits(endpoints::LOGIN), 0);
    }

    #[tokio::test]
    async fn rejected_password_surfaces_server_message() {
        let backend = FakeBackend::start().await;
        backend.on(
            endpoints::LOGIN,
            Reply::status(401, json!({"message": "Invalid password"})),
        );
        let session = SessionManager::in_memory();
        let client = backend.client(session.clone());

        let err = client.login(&form()).await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid password");
        assert!(session.current().unwrap().is_none());
    }

    #[tokio::test]
    async fn unblock_requires_username() {
        let backend = FakeBackend::start().await;
        backend.on(endpoints::UNBLOCK_USER, Reply::sealed(json!({"status": 200})));
        let client = backend.client(SessionManager::in_memory());

        assert!(client.unblock_user("  ").await.is_err());
        assert_eq!(
            client.unblock_user("9876543210").await.unwrap(),
            "User unblocked successfully!"
        );
        assert_eq!(
            backend.last_request(endpoints::UNBLOCK_USER).unwrap().body,
            json!({"username": "9876543210"})
        );
    }

    #[tokio::test]
    async fn unblock_refusal_is_not_a_session_expiry() {
        let backend = FakeBackend::start().await;
        backend.on(
            endpoints::UNBLOCK_USER,
            Reply::sealed(json!({"status": 401, "message": "Unblock not allowed yet"})),
        );
        let session = SessionManager::in_memory();
        session.begin_login(test_grant("42"), Utc::now()).unwrap();
        let client = backend.client(session.clone());

        let err = client.unblock_user("9876543210").await.unwrap_err();
        assert_eq!(err, ClientError::request_failed(401, "Unblock not allowed yet"));
        assert!(!err.requires_login());
        assert!(session.access_token().is_some());
    }
}
