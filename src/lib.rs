//! Authgate - a minimal HTTP backend with delegated authentication
//!
//! Authgate exposes two endpoints:
//! - `GET /` liveness check
//! - `GET /userid` returning the caller's subject identifier
//!
//! Bearer tokens are verified by the external identity provider on every
//! request; the service performs no cryptography and keeps no sessions.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod provider;

pub use error::{Error, Result};
