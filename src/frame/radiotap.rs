//! Transmit-side radiotap header builder.
//!
//! The transmit engine only ever emits the fixed 12-byte header this module
//! describes; the variable-length, alignment-sensitive iteration protocol for
//! *parsing* an arbitrary radiotap header (receive side) lives in
//! [`crate::frame::radiotap_parser`].

/// Present-bitmap bit for the FLAGS field.
const IT_PRESENT_FLAGS: u32 = 1 << 1;
/// Present-bitmap bit for the RATE field.
const IT_PRESENT_RATE: u32 = 1 << 2;
/// Present-bitmap bit for the TX_FLAGS field.
const IT_PRESENT_TX_FLAGS: u32 = 1 << 15;

/// Length in bytes of the fixed transmit-side radiotap header this crate builds.
pub const RADIOTAP_HEADER_LEN: usize = 12;

/// FLAGS byte bit for "CFP" carrier-sense defer (radiotap FLAGS bit 0 is
/// reserved upstream; this crate uses the common subset of documented flags).
pub const FLAG_CARRIER_SENSE: u8 = 1 << 1;
/// FLAGS byte bit for short preamble.
pub const FLAG_SHORT_PREAMBLE: u8 = 1 << 2;
/// FLAGS byte bit for WEP encryption.
pub const FLAG_WEP: u8 = 1 << 3;
/// FLAGS byte bit for fragmentation.
pub const FLAG_FRAGMENTATION: u8 = 1 << 4;
/// FLAGS byte bit requesting the FCS be appended to the frame.
pub const FLAG_FCS_INCLUDED: u8 = 1 << 5;

/// TX_FLAGS bit suppressing link-layer ACK/retry.
pub const TX_FLAG_NOACK: u16 = 1 << 0;
/// TX_FLAGS bit suppressing sequence number assignment by the driver.
pub const TX_FLAG_NOSEQNO: u16 = 1 << 4;
/// TX_FLAGS bit requesting in-order delivery to the driver queue.
pub const TX_FLAG_ORDER: u16 = 1 << 5;

/// The fixed 12-byte radiotap header this crate builds for injection.
///
/// Wire layout (all multi-byte fields little-endian): `it_version(1) it_pad(1)
/// it_len(2) it_present(4) flags(1) rate(1) tx_flags(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadiotapHeader {
    /// FLAGS byte.
    pub flags: u8,
    /// RATE byte, in units of 500 kbps.
    pub rate: u8,
    /// TX_FLAGS word.
    pub tx_flags: u16,
}

impl RadiotapHeader {
    /// Build a header from the caller-configured flags, a rate in Mbps, and TX_FLAGS.
    pub fn new(flags: u8, rate_mbps: u8, tx_flags: u16) -> Self {
        RadiotapHeader {
            flags,
            rate: rate_mbps.saturating_mul(2),
            tx_flags,
        }
    }

    /// Serialize to the 12-byte little-endian wire form.
    pub fn to_bytes(self) -> [u8; RADIOTAP_HEADER_LEN] {
        let mut out = [0u8; RADIOTAP_HEADER_LEN];
        out[0] = 0; // it_version
        out[1] = 0; // it_pad
        out[2..4].copy_from_slice(&(RADIOTAP_HEADER_LEN as u16).to_le_bytes());
        let present = IT_PRESENT_FLAGS | IT_PRESENT_RATE | IT_PRESENT_TX_FLAGS;
        out[4..8].copy_from_slice(&present.to_le_bytes());
        out[8] = self.flags;
        out[9] = self.rate;
        out[10..12].copy_from_slice(&self.tx_flags.to_le_bytes());
        out
    }

    /// Parse a 12-byte header built by [`Self::to_bytes`]. Returns `None` if
    /// `bytes` is too short or the present bitmap doesn't match what this
    /// crate writes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RADIOTAP_HEADER_LEN {
            return None;
        }
        let it_len = u16::from_le_bytes([bytes[2], bytes[3]]);
        if it_len as usize != RADIOTAP_HEADER_LEN {
            return None;
        }
        Some(RadiotapHeader {
            flags: bytes[8],
            rate: bytes[9],
            tx_flags: u16::from_le_bytes([bytes[10], bytes[11]]),
        })
    }
}
