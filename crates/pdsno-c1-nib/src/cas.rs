//! Shared optimistic-concurrency arithmetic (spec §4.1 "upsert"): `None`
//! means create-if-absent, `Some(v)` means update-if-version-matches. Both
//! backends call through this so the semantics never drift between them.

use crate::error::NibError;
use crate::outcomes::UpsertOutcome;

pub fn check_and_bump(
    kind: &'static str,
    id: &str,
    existing_version: Option<u64>,
    expected_version: Option<u64>,
) -> Result<UpsertOutcome, NibError> {
    match (existing_version, expected_version) {
        (None, None) => Ok(UpsertOutcome {
            version: 1,
            created: true,
        }),
        (None, Some(_)) => Err(NibError::not_found(kind, id)),
        (Some(_), None) => {
            pdsno_telemetry::metrics::NIB_CONFLICTS.inc();
            Err(NibError::Conflict {
                kind,
                id: id.to_string(),
                expected: 0,
                actual: existing_version.unwrap(),
            })
        }
        (Some(actual), Some(expected)) if actual == expected => Ok(UpsertOutcome {
            version: actual + 1,
            created: false,
        }),
        (Some(actual), Some(expected)) => {
            pdsno_telemetry::metrics::NIB_CONFLICTS.inc();
            Err(NibError::Conflict {
                kind,
                id: id.to_string(),
                expected,
                actual,
            })
        }
    }
}
