//! On-disk schema version guard (spec §6 "the store refuses to open a
//! database written by an incompatible schema version"). Grounded on
//! `qc-02-block-storage::domain::snapshot::header::SnapshotInfo`'s
//! versioned-header precedent.

use crate::error::NibError;

/// Bumped whenever a column family's record layout changes in a way that is
/// not forward-compatible.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub const META_KEY_SCHEMA_VERSION_STR: &str = "schema_version";

pub fn check_compatible(on_disk: Option<u32>) -> Result<u32, NibError> {
    match on_disk {
        None => Ok(CURRENT_SCHEMA_VERSION),
        Some(v) if v == CURRENT_SCHEMA_VERSION => Ok(v),
        Some(v) => Err(NibError::Invalid {
            kind: "schema",
            reason: format!(
                "on-disk schema version {v} is incompatible with this binary's version {CURRENT_SCHEMA_VERSION}"
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_adopts_current_version() {
        assert_eq!(check_compatible(None).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn matching_version_is_accepted() {
        assert_eq!(
            check_compatible(Some(CURRENT_SCHEMA_VERSION)).unwrap(),
            CURRENT_SCHEMA_VERSION
        );
    }

    #[test]
    fn mismatched_version_is_rejected() {
        assert!(check_compatible(Some(CURRENT_SCHEMA_VERSION + 1)).is_err());
    }
}
