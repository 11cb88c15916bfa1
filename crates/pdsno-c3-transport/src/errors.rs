//! Transport failure taxonomy (spec §5).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no route to recipient {0}")]
    UnknownRecipient(String),

    #[error("transport channel closed")]
    Closed,

    #[error("http transport failed after {attempts} attempts: {source}")]
    Http {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("http peer responded with status {status}")]
    HttpStatus { status: u16 },

    #[error("deadline of {0:?} exceeded before delivery succeeded")]
    DeadlineExceeded(std::time::Duration),

    #[error("envelope serialization failed: {0}")]
    Codec(String),
}
