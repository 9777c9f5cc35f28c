//! IEEE 802.11 3-address data header builder/parser.

use crate::tools::bits::set_bits16;

/// Length in bytes of the 3-address 802.11 data header this crate builds.
pub const MAC_HEADER_LEN: usize = 24;

const FC_VERSION_MASK: u16 = 0b0000_0000_0000_0011;
const FC_TYPE_MASK: u16 = 0b0000_0000_0000_1100;
const FC_SUBTYPE_MASK: u16 = 0b0000_0000_1111_0000;
const FC_TO_DS_MASK: u16 = 0b0000_0001_0000_0000;
const FC_FROM_DS_MASK: u16 = 0b0000_0010_0000_0000;
const FC_MORE_FRAG_MASK: u16 = 0b0000_0100_0000_0000;
const FC_RETRY_MASK: u16 = 0b0000_1000_0000_0000;
const FC_PWR_MGMT_MASK: u16 = 0b0001_0000_0000_0000;
const FC_MORE_DATA_MASK: u16 = 0b0010_0000_0000_0000;
const FC_WEP_MASK: u16 = 0b0100_0000_0000_0000;
const FC_ORDER_MASK: u16 = 0b1000_0000_0000_0000;

/// 802.11 frame type "Data".
pub const FRAME_TYPE_DATA: u16 = 0b10;
/// 802.11 subtype "Data" (non-QoS).
pub const FRAME_SUBTYPE_DATA: u16 = 0b0000;

/// The logical fields of the 16-bit frame-control word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameControl {
    /// Protocol version, always `0` on this crate's wire format.
    pub version: u16,
    /// Frame type (DATA = `0b10`).
    pub frame_type: u16,
    /// Frame subtype.
    pub subtype: u16,
    /// To-DS bit.
    pub to_ds: bool,
    /// From-DS bit.
    pub from_ds: bool,
    /// More-fragments bit.
    pub more_frag: bool,
    /// Retry bit.
    pub retry: bool,
    /// Power-management bit.
    pub pwr_mgmt: bool,
    /// More-data bit.
    pub more_data: bool,
    /// WEP/"Protected Frame" bit.
    pub wep: bool,
    /// Strictly-ordered bit.
    pub order: bool,
}

fn bit(flag: bool) -> u16 {
    flag as u16
}

impl FrameControl {
    /// Assemble the 16-bit wire form field-by-field.
    pub fn to_u16(self) -> u16 {
        let mut word = 0u16;
        word = set_bits16(word, FC_VERSION_MASK, self.version);
        word = set_bits16(word, FC_TYPE_MASK, self.frame_type << 2);
        word = set_bits16(word, FC_SUBTYPE_MASK, self.subtype << 4);
        word = set_bits16(word, FC_TO_DS_MASK, bit(self.to_ds) << 8);
        word = set_bits16(word, FC_FROM_DS_MASK, bit(self.from_ds) << 9);
        word = set_bits16(word, FC_MORE_FRAG_MASK, bit(self.more_frag) << 10);
        word = set_bits16(word, FC_RETRY_MASK, bit(self.retry) << 11);
        word = set_bits16(word, FC_PWR_MGMT_MASK, bit(self.pwr_mgmt) << 12);
        word = set_bits16(word, FC_MORE_DATA_MASK, bit(self.more_data) << 13);
        word = set_bits16(word, FC_WEP_MASK, bit(self.wep) << 14);
        word = set_bits16(word, FC_ORDER_MASK, bit(self.order) << 15);
        word
    }

    /// Reverse the wire form back into the logical field record.
    pub fn from_u16(word: u16) -> Self {
        FrameControl {
            version: (word & FC_VERSION_MASK) >> 0,
            frame_type: (word & FC_TYPE_MASK) >> 2,
            subtype: (word & FC_SUBTYPE_MASK) >> 4,
            to_ds: word & FC_TO_DS_MASK != 0,
            from_ds: word & FC_FROM_DS_MASK != 0,
            more_frag: word & FC_MORE_FRAG_MASK != 0,
            retry: word & FC_RETRY_MASK != 0,
            pwr_mgmt: word & FC_PWR_MGMT_MASK != 0,
            more_data: word & FC_MORE_DATA_MASK != 0,
            wep: word & FC_WEP_MASK != 0,
            order: word & FC_ORDER_MASK != 0,
        }
    }

    /// The data-frame frame-control this crate stamps on every frame it builds.
    pub fn data_frame() -> Self {
        FrameControl {
            version: 0,
            frame_type: FRAME_TYPE_DATA,
            subtype: FRAME_SUBTYPE_DATA,
            ..Default::default()
        }
    }
}

/// The 24-byte 3-address 802.11 data header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mac80211Header {
    /// Frame-control field.
    pub frame_control: FrameControl,
    /// Duration/ID field; this crate always writes `0xFFFF`.
    pub duration_id: u16,
    /// Receiver address, always broadcast (`0xFF..FF`) for this crate.
    pub addr1: [u8; 6],
    /// Transmitter/sender address, the configured sender MAC.
    pub addr2: [u8; 6],
    /// BSSID, always broadcast (`0xFF..FF`) for this crate.
    pub addr3: [u8; 6],
    /// Sequence-control field; this crate always writes `0`.
    pub seq_ctrl: u16,
}

impl Mac80211Header {
    /// Build the header this crate stamps on every frame, with `sender_addr` as `addr2`.
    ///
    /// Debug builds assert `addr1[0]` and `addr1[1]` are non-zero: some drivers
    /// silently retransmit frames whose receiver address starts with two zero
    /// bytes.
    pub fn new(sender_addr: [u8; 6]) -> Self {
        let addr1 = [0xFFu8; 6];
        debug_assert!(addr1[0] != 0 && addr1[1] != 0);
        Mac80211Header {
            frame_control: FrameControl::data_frame(),
            duration_id: 0xFFFF,
            addr1,
            addr2: sender_addr,
            addr3: [0xFFu8; 6],
            seq_ctrl: 0,
        }
    }

    /// Serialize to the 24-byte wire form.
    pub fn to_bytes(&self) -> [u8; MAC_HEADER_LEN] {
        let mut out = [0u8; MAC_HEADER_LEN];
        out[0..2].copy_from_slice(&self.frame_control.to_u16().to_le_bytes());
        out[2..4].copy_from_slice(&self.duration_id.to_be_bytes());
        out[4..10].copy_from_slice(&self.addr1);
        out[10..16].copy_from_slice(&self.addr2);
        out[16..22].copy_from_slice(&self.addr3);
        out[22..24].copy_from_slice(&self.seq_ctrl.to_le_bytes());
        out
    }

    /// Parse a header from captured bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MAC_HEADER_LEN {
            return None;
        }
        Some(Mac80211Header {
            frame_control: FrameControl::from_u16(u16::from_le_bytes([bytes[0], bytes[1]])),
            duration_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            addr1: bytes[4..10].try_into().unwrap(),
            addr2: bytes[10..16].try_into().unwrap(),
            addr3: bytes[16..22].try_into().unwrap(),
            seq_ctrl: u16::from_le_bytes([bytes[22], bytes[23]]),
        })
    }

    /// Stamp a monotonically increasing frame number into `addr1[2..6]`, the
    /// built-in "frame-number stamping" transmit handler.
    pub fn stamp_frame_number(&mut self, frame_number: u32) {
        self.addr1[2..6].copy_from_slice(&frame_number.to_be_bytes());
    }

    /// Read back a frame number previously written by [`Self::stamp_frame_number`].
    pub fn read_frame_number(&self) -> u32 {
        u32::from_be_bytes(self.addr1[2..6].try_into().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_control_round_trips() {
        let fc = FrameControl {
            to_ds: true,
            retry: true,
            ..FrameControl::data_frame()
        };
        let word = fc.to_u16();
        assert_eq!(FrameControl::from_u16(word), fc);
    }

    #[test]
    fn header_round_trips_through_bytes() {
        let hdr = Mac80211Header::new([0xAA; 6]);
        let bytes = hdr.to_bytes();
        let parsed = Mac80211Header::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, hdr);
    }

    #[test]
    fn duration_id_is_broadcast_value() {
        let hdr = Mac80211Header::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(hdr.duration_id, 0xFFFF);
        assert_eq!(hdr.addr1, [0xFF; 6]);
        assert_eq!(hdr.addr3, [0xFF; 6]);
    }

    #[test]
    fn frame_number_stamping_round_trips() {
        let mut hdr = Mac80211Header::new([0xAA; 6]);
        hdr.stamp_frame_number(0x1234_5678);
        assert_eq!(hdr.read_frame_number(), 0x1234_5678);
        assert_eq!(&hdr.addr1[2..6], &[0x12, 0x34, 0x56, 0x78]);
    }
}
