//! Typed configuration surfaces for the transmit and receive engines.
//!
//! Every tunable the core consumes is gathered here instead of being threaded as
//! loose arguments: a plain struct implementing [`Default`], validated once
//! when an engine is built.

use crate::tools::error::{CoreError, ErrorKind, Result};

/// Maximum number of symbols (source + repair) a single encoded object may carry.
pub const OFEC_MAX: usize = 50_000;

/// Number of Reed-Solomon chunks packed into one LDPC frame.
pub const RS_BLOCKS_PER_FRAME: usize = 5;

/// Message bytes per Reed-Solomon chunk (the `(255, 223)` code's `k`).
pub const RS_MESSAGE_LEN: usize = 223;

/// Parity bytes appended per Reed-Solomon chunk.
pub const RS_PARITY_LEN: usize = 32;

/// Total bytes per Reed-Solomon chunk on the wire (`RS_MESSAGE_LEN + RS_PARITY_LEN`).
pub const RS_BLOCK_LEN: usize = RS_MESSAGE_LEN + RS_PARITY_LEN;

/// Length in bytes of one LDPC frame (`OTI ∥ symbol`), before RS encoding.
pub const L_LDPC: usize = RS_BLOCKS_PER_FRAME * RS_MESSAGE_LEN;

/// Length in bytes of one RS-LDPC frame as carried on the wire.
pub const L_RS_LDPC: usize = RS_BLOCKS_PER_FRAME * RS_BLOCK_LEN;

/// Size in bytes of the packed OTI header.
pub const OTI_SIZE: usize = 16;

/// Payload bytes carried by one symbol, `L_LDPC - OTI_SIZE`.
pub const SYMBOL_SIZE: usize = L_LDPC - OTI_SIZE;

/// Column weight bounds for the LDPC-Staircase `N1` parameter.
pub const LDPC_N1_MIN: usize = 3;
/// Column weight bounds for the LDPC-Staircase `N1` parameter.
pub const LDPC_N1_MAX: usize = 10;

/// Minimum length of a run of identical bytes required to call a payload a control frame.
pub const CONTROL_FRAME_MIN_LEN: usize = 256;

/// Fraction of payload bytes that must match a control value to classify a frame as control.
pub const CONTROL_FRAME_THRESHOLD: f64 = 0.66;

/// Byte value of a preamble control frame's payload.
pub const PREAMBLE_BYTE: u8 = 0xFF;
/// Byte value of an end-of-transmission control frame's payload.
pub const EOT_BYTE: u8 = 0xAA;

/// Default 802.11 sender address this crate's framer stamps and the receive engine matches.
pub const DEFAULT_SENDER_ADDR: [u8; 6] = [0xAA; 6];

/// Trailing frame check sequence length appended by the NIC driver.
pub const FCS_SIZE: usize = 4;

/// Upper bound on `payload_size` a transmit handler may request.
pub const PAYLOAD_MAX: usize = L_RS_LDPC;

const _: () = assert!(L_LDPC == RS_BLOCKS_PER_FRAME * RS_MESSAGE_LEN);

/// Configuration for the [`crate::transmit::Transmitter`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitterConfig {
    /// Bytes read per pass through the transmit loop, `[257, 2048]`.
    pub blocksize: usize,
    /// Seconds to wait on the input descriptor before declaring `TimedOut`; negative = infinite.
    pub transmit_timeout: i64,
    /// Extra preamble/EOT control frames sent alongside the mandatory one.
    pub redundant_ctrl_frames: u32,
    /// Radiotap FLAGS byte.
    pub rtap_flags: u8,
    /// Radiotap data rate in Mbps; stored on the wire as `2 * rate`.
    pub rtap_rate_mbps: u8,
    /// Radiotap TX_FLAGS word.
    pub rtap_tx_flags: u16,
    /// Sender MAC stamped into `addr2` of every data frame.
    pub sender_addr: [u8; 6],
    /// FEC code rate, `(0, 1]`.
    pub coderate: f32,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        TransmitterConfig {
            blocksize: L_RS_LDPC.min(2048),
            transmit_timeout: -1,
            redundant_ctrl_frames: 0,
            rtap_flags: 0,
            rtap_rate_mbps: 1,
            rtap_tx_flags: 0,
            sender_addr: DEFAULT_SENDER_ADDR,
            coderate: 0.8,
        }
    }
}

impl TransmitterConfig {
    /// Validate every field against its documented range, returning
    /// [`ErrorKind::CodecParams`] on the first violation rather than panicking
    /// or silently clamping.
    pub fn validate(&self) -> Result<()> {
        if !(257..=2048).contains(&self.blocksize) {
            return Err(CoreError::new(
                ErrorKind::CodecParams,
                format!("blocksize {} outside [257, 2048]", self.blocksize),
            ));
        }
        if !(self.coderate > 0.0 && self.coderate <= 1.0) {
            return Err(CoreError::new(
                ErrorKind::CodecParams,
                format!("coderate {} outside (0, 1]", self.coderate),
            ));
        }
        Ok(())
    }
}

/// Configuration for the [`crate::receive::Receiver`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverConfig {
    /// Capacity in bytes of the packet reassembly buffer, `[MTU_MAX, 5 MiB]`.
    pub packet_buffer_size: usize,
    /// Seconds to wait on the capture descriptor before declaring `TimedOut`; negative = infinite.
    pub capture_timeout: i64,
    /// Maximum packets processed per ready cycle before yielding back to poll.
    pub dispatch_count: u32,
    /// When true, `frame_number` is read from `addr1[2..6]`; otherwise a local counter is used.
    pub ordered: bool,
    /// When true, gaps detected during an ordered flush are filled with `noise_value` blocks.
    pub add_noise: bool,
    /// Byte value used to fill gaps when `add_noise` is set.
    pub noise_value: u8,
    /// Sender MAC the receiver matches captured addresses against.
    pub sender_addr: [u8; 6],
    /// Maximum tolerated Hamming distance between a captured address and `sender_addr`.
    pub max_hamming_dist: u32,
}

/// Largest 802.11 MTU this crate expects a capture backend to hand it (conservative upper bound).
pub const MTU_MAX: usize = 2312;

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            packet_buffer_size: MTU_MAX * 64,
            capture_timeout: -1,
            dispatch_count: 16,
            ordered: true,
            add_noise: false,
            noise_value: 0,
            sender_addr: DEFAULT_SENDER_ADDR,
            max_hamming_dist: 5,
        }
    }
}

impl ReceiverConfig {
    /// Validate every field against its documented range.
    pub fn validate(&self) -> Result<()> {
        if !(MTU_MAX..=(5 * 1024 * 1024)).contains(&self.packet_buffer_size) {
            return Err(CoreError::new(
                ErrorKind::CodecParams,
                format!(
                    "packet_buffer_size {} outside [{}, 5 MiB]",
                    self.packet_buffer_size, MTU_MAX
                ),
            ));
        }
        if self.dispatch_count == 0 {
            return Err(CoreError::new(
                ErrorKind::CodecParams,
                "dispatch_count must be >= 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sizes_match_spec_constants() {
        assert_eq!(L_LDPC, 1115);
        assert_eq!(SYMBOL_SIZE, 1099);
        assert_eq!(L_RS_LDPC, 1275);
    }

    #[test]
    fn default_configs_validate() {
        assert!(TransmitterConfig::default().validate().is_ok());
        assert!(ReceiverConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_blocksize_rejected() {
        let mut cfg = TransmitterConfig::default();
        cfg.blocksize = 1;
        assert_eq!(cfg.validate().unwrap_err().kind(), ErrorKind::CodecParams);
    }

    #[test]
    fn out_of_range_buffer_size_rejected() {
        let mut cfg = ReceiverConfig::default();
        cfg.packet_buffer_size = 1;
        assert_eq!(cfg.validate().unwrap_err().kind(), ErrorKind::CodecParams);
    }
}
