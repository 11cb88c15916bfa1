use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// A probe's `execute`/`finalize` was called out of the
    /// initialize→execute→finalize order (spec §4.5: "a programming error").
    #[error("probe lifecycle called out of order: expected {expected:?}, was in {actual:?}")]
    OutOfOrder {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("a different MAC/IP pair was observed under the same key by another LC")]
    MacConflict { mac: String },
}
