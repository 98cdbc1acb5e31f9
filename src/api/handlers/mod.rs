//! Route handlers for the account service.

pub mod account;
pub mod auth;
pub mod health;
pub mod root;
