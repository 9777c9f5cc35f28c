//! Object Transmission Information header.
//!
//! Two historical OTI layouts exist upstream; this implementation fixes the
//! all-`u32`, no-`rem` 16-byte layout.

use crate::config::OTI_SIZE;
use crate::tools::crc::crc32;

/// The 16-byte header prepended to every LDPC frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oti {
    /// Encoding symbol index, unique within one encoded object.
    pub esi: u32,
    /// Total number of symbols (source + repair) in the object.
    pub n: u32,
    /// Number of source symbols in the object.
    pub k: u32,
    /// CRC-32 of the symbol body that follows this header.
    pub crc: u32,
}

const _: () = assert!(OTI_SIZE == 4 * 4);
const _: () = assert!(std::mem::size_of::<[u8; OTI_SIZE]>() == OTI_SIZE);

impl Oti {
    /// Build an OTI for `symbol`, computing its CRC.
    pub fn for_symbol(esi: u32, n: u32, k: u32, symbol: &[u8]) -> Self {
        Oti {
            esi,
            n,
            k,
            crc: crc32(symbol),
        }
    }

    /// Serialize to the big-endian wire form.
    pub fn to_bytes(self) -> [u8; OTI_SIZE] {
        let mut out = [0u8; OTI_SIZE];
        out[0..4].copy_from_slice(&self.esi.to_be_bytes());
        out[4..8].copy_from_slice(&self.n.to_be_bytes());
        out[8..12].copy_from_slice(&self.k.to_be_bytes());
        out[12..16].copy_from_slice(&self.crc.to_be_bytes());
        out
    }

    /// Parse from big-endian wire bytes. `bytes` must be at least [`OTI_SIZE`] long.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= OTI_SIZE);
        Oti {
            esi: u32::from_be_bytes(bytes[0..4].try_into().unwrap()),
            n: u32::from_be_bytes(bytes[4..8].try_into().unwrap()),
            k: u32::from_be_bytes(bytes[8..12].try_into().unwrap()),
            crc: u32::from_be_bytes(bytes[12..16].try_into().unwrap()),
        }
    }

    /// Whether `crc` matches the recomputed CRC-32 of `symbol`.
    pub fn crc_matches(&self, symbol: &[u8]) -> bool {
        self.crc == crc32(symbol)
    }
}
