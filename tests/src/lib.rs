//! # PDSNO Scenario Suite
//!
//! Cross-crate integration tests exercising C1-C6 together the way a
//! deployed controller process would: admission through the NIB, signed
//! envelopes over the authenticator, discovery reports landing at a
//! Regional tier, and the approval state machine escalating across tiers.
//!
//! ```text
//! tests/src/
//! └── integration/
//!     └── scenarios.rs   # one function per end-to-end scenario
//! tests/benches/
//!     └── subsystem_benchmarks.rs
//! ```
//!
//! ```bash
//! cargo test -p pdsno-tests
//! cargo bench -p pdsno-tests
//! ```

pub mod integration;
