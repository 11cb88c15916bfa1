//! Illustrative `Probe` implementations (spec §4.5 is architecture-only;
//! these two concrete strategies exist to exercise the lifecycle and
//! orchestrator end to end). Both are response-table driven rather than
//! doing real socket I/O, matching the teacher's `test-utils` philosophy
//! of deterministic, injectable fakes for domain-level tests
//! (`qc-01-peer-discovery`'s `FixedTimeSource` feature).

pub mod arp;
pub mod icmp;
