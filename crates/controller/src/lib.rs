//! Controller management API
//!
//! - `ControllerApi`: the remote calls recovery depends on
//! - `HttpControllerClient`: reqwest implementation over HTTPS
//! - `ControllerSession`: owns the session token and its expiry
//! - `reason`: classification of remote failure reasons into actions

pub mod api;
pub mod client;
pub mod error;
pub mod reason;
pub mod session;

pub use api::{AccountProfile, ApiResponse, ControllerApi, RestoreRequest};
pub use client::HttpControllerClient;
pub use error::ApiError;
pub use reason::{classify_reason, is_duplicate_account, PollAction, ReasonCode, WaitHint};
pub use session::{ControllerSession, Credentials, Session};
