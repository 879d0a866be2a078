//! Client for the remote identity-management API.
//!
//! Wraps `reqwest` with the four user operations the bulk loader needs
//! (lookup, deactivate, delete, create), an authentication header, a bounded
//! retry for connection failures, and parsing of the API's error bodies.
//!
//! Application-level statuses (including 429) are returned to the caller as an
//! [`client::ApiResponse`] rather than as errors: the caller owns the
//! rate-limit and rejection policy.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod retry;

pub use auth::{ApiAuth, ApiCredentials};
pub use client::{ApiResponse, ClientConfig, UsersClient, RATE_LIMIT_RESET_HEADER};
pub use error::{ClientError, ClientResult};
pub use models::{ErrorDetails, NewUser, PasswordHash};
pub use retry::TransportRetry;
