//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Public view of an account: never includes secrets or OTP state.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AccountSummary {
    pub full_name: String,
    pub email: String,
    pub is_verified: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub data: AccountSummary,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub full_name: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Confirmation payload echoing the link parts so the frontend can carry
/// them into the new-password form.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetLinkResponse {
    pub success: bool,
    pub message: String,
    pub uidb64: String,
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct NewPasswordRequest {
    pub uidb64: String,
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

/// Partial profile update; absent fields are left untouched.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateAccountResponse {
    pub data: AccountSummary,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct DashboardResponse {
    pub message: String,
    pub data: AccountSummary,
}
