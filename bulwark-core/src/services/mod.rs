//! Service layer for business logic
//!
//! This module contains the services that turn the attempt log into lockout
//! decisions and run login attempts through them.

pub mod login;
pub mod security_status;
pub mod status_watcher;

pub use login::{CredentialVerifier, LoginOrchestrator};
pub use security_status::SecurityStatusService;
pub use status_watcher::{StatusUpdate, StatusWatcher};
