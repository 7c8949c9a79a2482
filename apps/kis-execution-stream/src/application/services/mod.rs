//! Application Services
//!
//! - `ApprovalKeyManager`: cached approval key lifecycle

mod approval_key_manager;

pub use approval_key_manager::ApprovalKeyManager;
