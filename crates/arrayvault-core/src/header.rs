//! Fixed 1024-byte ArrayFile header
//!
//! The header is a fixed-size region so the body start offset is constant
//! across storage versions and stays aligned to common page sizes, letting a
//! memory-mapped body start on a page boundary.
//!
//! Layout (all integers little-endian):
//!   [0..8)     storage_version: u64
//!   [8..16)    lwm_scn:         u64
//!   [16..24)   hwm_scn:         u64
//!   [24..28)   array_length:    i32
//!   [28..32)   element_size:    i32
//!   [32..1024) reserved:        [u8; 992], preserved verbatim

use crate::error::{ArrayFileError, ArrayFileResult};
use std::path::Path;

/// Total header size in bytes.
pub const HEADER_SIZE: usize = 1024;

/// Reserved region size in bytes (bytes [32, 1024)).
pub const RESERVED_SIZE: usize = HEADER_SIZE - 32;

/// The only storage version this implementation understands.
pub const SUPPORTED_STORAGE_VERSION: u64 = 0;

const OFF_STORAGE_VERSION: usize = 0;
const OFF_LWM_SCN: usize = 8;
const OFF_HWM_SCN: usize = 16;
const OFF_ARRAY_LENGTH: usize = 24;
const OFF_ELEMENT_SIZE: usize = 28;
const OFF_RESERVED: usize = 32;

/// In-memory, validated copy of the 1024-byte on-disk header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub storage_version: u64,
    pub lwm_scn: u64,
    pub hwm_scn: u64,
    pub array_length: i32,
    pub element_size: i32,
    pub reserved: [u8; RESERVED_SIZE],
}

impl Header {
    /// A fresh header for a newly created file: version 0, lwm = hwm = 0.
    pub fn new(array_length: i32, element_size: i32) -> Self {
        Self {
            storage_version: SUPPORTED_STORAGE_VERSION,
            lwm_scn: 0,
            hwm_scn: 0,
            array_length,
            element_size,
            reserved: [0u8; RESERVED_SIZE],
        }
    }

    /// Serialize to the fixed 1024-byte on-disk representation.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[OFF_STORAGE_VERSION..OFF_STORAGE_VERSION + 8].copy_from_slice(&self.storage_version.to_le_bytes());
        buf[OFF_LWM_SCN..OFF_LWM_SCN + 8].copy_from_slice(&self.lwm_scn.to_le_bytes());
        buf[OFF_HWM_SCN..OFF_HWM_SCN + 8].copy_from_slice(&self.hwm_scn.to_le_bytes());
        buf[OFF_ARRAY_LENGTH..OFF_ARRAY_LENGTH + 4].copy_from_slice(&self.array_length.to_le_bytes());
        buf[OFF_ELEMENT_SIZE..OFF_ELEMENT_SIZE + 4].copy_from_slice(&self.element_size.to_le_bytes());
        buf[OFF_RESERVED..].copy_from_slice(&self.reserved);
        buf
    }

    /// Parse from a 1024-byte buffer. Does not validate — call `check()` after.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut reserved = [0u8; RESERVED_SIZE];
        reserved.copy_from_slice(&buf[OFF_RESERVED..]);
        Self {
            storage_version: u64::from_le_bytes(buf[OFF_STORAGE_VERSION..OFF_STORAGE_VERSION + 8].try_into().unwrap()),
            lwm_scn: u64::from_le_bytes(buf[OFF_LWM_SCN..OFF_LWM_SCN + 8].try_into().unwrap()),
            hwm_scn: u64::from_le_bytes(buf[OFF_HWM_SCN..OFF_HWM_SCN + 8].try_into().unwrap()),
            array_length: i32::from_le_bytes(buf[OFF_ARRAY_LENGTH..OFF_ARRAY_LENGTH + 4].try_into().unwrap()),
            element_size: i32::from_le_bytes(buf[OFF_ELEMENT_SIZE..OFF_ELEMENT_SIZE + 4].try_into().unwrap()),
            reserved,
        }
    }

    /// Validate invariants 1–4 from the data model: supported version,
    /// `lwm <= hwm`, non-negative length, element size in {2,4,8}.
    pub fn check(&self, path: &Path) -> ArrayFileResult<()> {
        if self.storage_version != SUPPORTED_STORAGE_VERSION {
            return Err(ArrayFileError::CorruptHeader {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported storage_version {} (expected {})",
                    self.storage_version, SUPPORTED_STORAGE_VERSION
                ),
            });
        }
        if self.hwm_scn < self.lwm_scn {
            return Err(ArrayFileError::CorruptHeader {
                path: path.to_path_buf(),
                reason: format!("hwm_scn {} < lwm_scn {}", self.hwm_scn, self.lwm_scn),
            });
        }
        if self.array_length < 0 {
            return Err(ArrayFileError::CorruptHeader {
                path: path.to_path_buf(),
                reason: format!("negative array_length {}", self.array_length),
            });
        }
        if !matches!(self.element_size, 2 | 4 | 8) {
            return Err(ArrayFileError::CorruptHeader {
                path: path.to_path_buf(),
                reason: format!("element_size {} not in {{2,4,8}}", self.element_size),
            });
        }
        Ok(())
    }

    /// Byte offset of the start of the body.
    pub const fn body_offset() -> u64 {
        HEADER_SIZE as u64
    }

    /// Total file size implied by this header's length and element size.
    pub fn expected_file_size(&self) -> u64 {
        HEADER_SIZE as u64 + (self.array_length as u64) * (self.element_size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_roundtrip() {
        let h = Header::new(4, 8);
        let bytes = h.to_bytes();
        let back = Header::from_bytes(&bytes);
        assert_eq!(back.storage_version, 0);
        assert_eq!(back.array_length, 4);
        assert_eq!(back.element_size, 8);
        assert_eq!(back.lwm_scn, 0);
        assert_eq!(back.hwm_scn, 0);
    }

    #[test]
    fn test_header_size_is_1024() {
        assert_eq!(HEADER_SIZE, 1024);
        assert_eq!(Header::new(0, 2).to_bytes().len(), 1024);
    }

    #[test]
    fn test_check_rejects_bad_version() {
        let mut h = Header::new(1, 4);
        h.storage_version = 7;
        assert!(matches!(
            h.check(&PathBuf::from("x")),
            Err(ArrayFileError::CorruptHeader { .. })
        ));
    }

    #[test]
    fn test_check_rejects_hwm_below_lwm() {
        let mut h = Header::new(1, 4);
        h.lwm_scn = 10;
        h.hwm_scn = 5;
        assert!(matches!(
            h.check(&PathBuf::from("x")),
            Err(ArrayFileError::CorruptHeader { .. })
        ));
    }

    #[test]
    fn test_check_accepts_hwm_ahead_of_lwm() {
        // S3: an in-flight batch (hwm > lwm) is not itself corruption.
        let mut h = Header::new(1, 4);
        h.lwm_scn = 0;
        h.hwm_scn = 99;
        assert!(h.check(&PathBuf::from("x")).is_ok());
    }

    #[test]
    fn test_check_rejects_bad_element_size() {
        let h = Header::new(1, 3);
        assert!(matches!(
            h.check(&PathBuf::from("x")),
            Err(ArrayFileError::CorruptHeader { .. })
        ));
    }

    #[test]
    fn test_reserved_bytes_preserved() {
        let mut h = Header::new(2, 4);
        h.reserved[0] = 0xAB;
        h.reserved[991] = 0xCD;
        let back = Header::from_bytes(&h.to_bytes());
        assert_eq!(back.reserved[0], 0xAB);
        assert_eq!(back.reserved[991], 0xCD);
    }

    #[test]
    fn test_expected_file_size() {
        let h = Header::new(4, 8);
        assert_eq!(h.expected_file_size(), 1024 + 32);
    }
}
