//! Authentication: registration, verification, sessions, and password reset.

pub(crate) mod login;
pub(crate) mod otp;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod reset;
mod reset_token;
pub(crate) mod session;
pub(crate) mod state;
pub(crate) mod storage;
mod tokens;
pub mod types;
pub(crate) mod utils;

pub use state::{AuthConfig, AuthState};
