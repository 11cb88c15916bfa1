//! CRC32 record integrity for on-disk records (spec §6 "each stored record
//! carries a checksum verified on read"). Grounded on
//! `qc-02-block-storage::ports::outbound::DefaultChecksumProvider`.

pub fn compute(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

pub fn verify(data: &[u8], expected: u32) -> bool {
    compute(data) == expected
}

/// Envelope wrapping a bincode-serialized record with its checksum, written
/// as a single value so a torn write can never present a checksum that
/// matches corrupt bytes from two different writes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChecksummedRecord {
    pub checksum: u32,
    pub bytes: Vec<u8>,
}

impl ChecksummedRecord {
    pub fn wrap(bytes: Vec<u8>) -> Self {
        let checksum = compute(&bytes);
        Self { checksum, bytes }
    }

    pub fn unwrap_verified(self) -> Result<Vec<u8>, String> {
        if verify(&self.bytes, self.checksum) {
            Ok(self.bytes)
        } else {
            Err("checksum mismatch: record is corrupt".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_checksum_verifies() {
        let data = b"hello nib";
        let checksum = compute(data);
        assert!(verify(data, checksum));
        assert!(!verify(data, checksum + 1));
    }

    #[test]
    fn wrapped_record_round_trips_when_intact() {
        let record = ChecksummedRecord::wrap(b"payload".to_vec());
        let encoded = bincode::serialize(&record).unwrap();
        let decoded: ChecksummedRecord = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded.unwrap_verified().unwrap(), b"payload".to_vec());
    }

    #[test]
    fn tampered_record_fails_verification() {
        let mut record = ChecksummedRecord::wrap(b"payload".to_vec());
        record.bytes[0] ^= 0xFF;
        assert!(record.unwrap_verified().is_err());
    }
}
