//! Structured-log field conventions. Every subsystem logs with these field
//! names rather than interpolating them into the message string, so logs
//! remain greppable/queryable regardless of output format.

/// Standard field names used across subsystems, kept here so they don't
/// drift between crates.
pub mod fields {
    pub const CONTROLLER_ID: &str = "controller_id";
    pub const REGION: &str = "region";
    pub const REQUEST_ID: &str = "request_id";
    pub const TIER: &str = "tier";
    pub const MESSAGE_TYPE: &str = "message_type";
}
