//! Failure taxonomy for the approval engine (spec §4.6, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("request is in state {actual:?}, expected one of {expected:?}")]
    WrongState {
        expected: &'static [&'static str],
        actual: &'static str,
    },

    #[error("device {device_id} is degraded and refuses further configuration changes")]
    DeviceDegraded { device_id: String },

    #[error("execution token {token_id} has expired")]
    TokenExpired { token_id: String },

    #[error("execution token {token_id} has already been consumed")]
    TokenAlreadyConsumed { token_id: String },

    #[error("execution token {token_id} scope does not match the request's current target devices")]
    TokenScopeMismatch { token_id: String },

    #[error("execution token {token_id} signature does not verify")]
    TokenSignatureInvalid { token_id: String },

    #[error("execution token {token_id} was never issued")]
    TokenNotFound { token_id: String },

    #[error(transparent)]
    Nib(#[from] pdsno_c1_nib::NibError),
}
