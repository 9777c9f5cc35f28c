//! Receive engine: monitor-mode capture, sender verification,
//! control/data classification, bounded-buffer min-heap reassembly, flush to a
//! sink in frame-number order.

use crate::config::{ReceiverConfig, FCS_SIZE, L_RS_LDPC};
use crate::frame::control::{self, ControlFrameType};
use crate::frame::mac80211::MAC_HEADER_LEN;
use crate::tools::bits::hamming_dist32;
use crate::tools::heap::MinHeap;
use crate::transport::FrameCapture;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Size in bytes of one payload block written to the sink on flush — one
/// RS-LDPC frame.
pub const PAYLOAD_SIZE: usize = L_RS_LDPC;

/// Terminal outcome of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxState {
    /// Ran to completion, stopped, or hit end-of-transmission.
    #[default]
    Normal,
    /// `capture_timeout` elapsed waiting for the next packet.
    TimedOut,
    /// The capture transport returned an I/O error.
    Error,
}

/// Accumulated statistics for one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveStats {
    /// Packets captured but dropped on sender-address mismatch.
    pub packets_dropped: u64,
    /// Packets accepted into the reassembly buffer (data frames only).
    pub num_packets_processed: u64,
    /// Total payload bytes written to the sink across all flushes.
    pub total_writelen: u64,
    /// Total noise bytes written to the sink to fill detected gaps.
    pub total_noise_added: u64,
    /// Total count of frame-number gaps treated as lost across all flushes.
    pub total_blocks_lost: u64,
    /// Whether an end-of-transmission control frame has been observed.
    pub eot_reached: bool,
    /// Whether a preamble was observed before any data was written (log-only signal).
    pub uplink_established: bool,
    /// Terminal state of the session, set once the capture loop exits.
    pub rx_state: RxState,
}

/// One pending reassembly entry: a frame number plus the byte span of its
/// payload inside the packet buffer. Slots are addressed by index/length,
/// never by raw pointer, so the heap never outlives the buffer it indexes.
#[derive(Debug, Clone, Copy)]
struct HeapNode {
    frame_number: i64,
    start: usize,
    len: usize,
}

fn node_cmp(a: &HeapNode, b: &HeapNode) -> std::cmp::Ordering {
    a.frame_number.cmp(&b.frame_number)
}

/// Split a captured packet into `(mac_header_bytes, payload_bytes)`, locating
/// the MAC header by the radiotap `it_len` field at bytes `[2..4]` (little-endian);
/// the caller is expected to have validated `it_len <= captured_len` already.
fn split_packet(packet: &[u8]) -> Option<(&[u8], &[u8])> {
    if packet.len() < 4 {
        return None;
    }
    let it_len = u16::from_le_bytes([packet[2], packet[3]]) as usize;
    if it_len > packet.len() || packet.len() < it_len + MAC_HEADER_LEN + FCS_SIZE {
        return None;
    }
    let mac = &packet[it_len..it_len + MAC_HEADER_LEN];
    let payload = &packet[it_len + MAC_HEADER_LEN..packet.len() - FCS_SIZE];
    Some((mac, payload))
}

/// Hamming distance between one captured 6-byte address and the configured
/// sender address, treating each as a 4-byte high half and a 2-byte low half
///.
fn addr_distance(addr: &[u8], sender: &[u8; 6]) -> u32 {
    let hi = u32::from_be_bytes([addr[0], addr[1], addr[2], addr[3]]);
    let sender_hi = u32::from_be_bytes([sender[0], sender[1], sender[2], sender[3]]);
    let lo = u32::from_be_bytes([0, 0, addr[4], addr[5]]);
    let sender_lo = u32::from_be_bytes([0, 0, sender[4], sender[5]]);
    hamming_dist32(hi, sender_hi) + hamming_dist32(lo, sender_lo)
}

/// Drives a single-threaded receive session: capture, verify, classify,
/// buffer, flush.
pub struct Receiver<C: FrameCapture> {
    capture: C,
    config: ReceiverConfig,
    buffer: Vec<u8>,
    write_offset: usize,
    heap: MinHeap<HeapNode, fn(&HeapNode, &HeapNode) -> std::cmp::Ordering>,
    sequence_counter: i64,
    any_data_written: bool,
    stop_flag: Arc<AtomicBool>,
}

impl<C: FrameCapture> fmt::Debug for Receiver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("capture", &self.capture)
            .field("config", &self.config)
            .field("write_offset", &self.write_offset)
            .finish_non_exhaustive()
    }
}

impl<C: FrameCapture> Receiver<C> {
    /// Open a capture session over `capture` with the given configuration
    ///. Validates `config` before returning.
    pub fn init(capture: C, config: ReceiverConfig) -> crate::tools::error::Result<Self> {
        config.validate()?;
        let heap_capacity = config.packet_buffer_size / crate::config::MTU_MAX.max(1) + 1;
        Ok(Receiver {
            capture,
            config,
            buffer: vec![0u8; 0],
            write_offset: 0,
            heap: MinHeap::with_capacity(heap_capacity, node_cmp),
            sequence_counter: 0,
            any_data_written: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Request cooperative shutdown. At most one more batch of packets may be
    /// processed after this call returns. Idempotent.
    pub fn stop_capture(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Whether this session has not yet been asked to stop.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Acquire)
    }

    /// Run the capture loop, writing reassembled payload to `sink`, until
    /// stopped, timed out, or end-of-transmission closes the capture
    ///. Flushes the buffer a final time on every exit path.
    pub fn activate_capture(&mut self, sink: &mut impl Write) -> crate::tools::error::Result<ReceiveStats> {
        let mut stats = ReceiveStats::default();
        let timeout = if self.config.capture_timeout < 0 {
            None
        } else {
            Some(Duration::from_secs(self.config.capture_timeout as u64))
        };

        'outer: loop {
            if !self.is_active() {
                break;
            }

            match self.capture.recv(timeout) {
                Ok(None) => {
                    stats.rx_state = RxState::TimedOut;
                    break;
                }
                Ok(Some(packet)) => {
                    let end_capture = self.process_packet(&packet, sink, &mut stats)?;
                    if end_capture {
                        break 'outer;
                    }
                }
                Err(e) => {
                    log::error!("receive: capture error: {e}");
                    stats.rx_state = RxState::Error;
                    break;
                }
            }

            for _ in 1..self.config.dispatch_count {
                if !self.is_active() {
                    break 'outer;
                }
                match self.capture.recv(Some(Duration::ZERO)) {
                    Ok(None) => break,
                    Ok(Some(packet)) => {
                        let end_capture = self.process_packet(&packet, sink, &mut stats)?;
                        if end_capture {
                            break 'outer;
                        }
                    }
                    Err(e) => {
                        log::error!("receive: capture error: {e}");
                        stats.rx_state = RxState::Error;
                        break 'outer;
                    }
                }
            }
        }

        self.flush(sink, &mut stats)?;
        Ok(stats)
    }

    /// Returns `true` if the capture loop should terminate: a preamble
    /// observed after data has already been written.
    fn process_packet(
        &mut self,
        packet: &[u8],
        sink: &mut impl Write,
        stats: &mut ReceiveStats,
    ) -> crate::tools::error::Result<bool> {
        let Some((mac, payload)) = split_packet(packet) else {
            log::warn!("receive: dropping truncated/malformed packet ({} bytes)", packet.len());
            stats.packets_dropped += 1;
            return Ok(false);
        };

        let Some(header) = crate::frame::mac80211::Mac80211Header::from_bytes(mac) else {
            log::warn!("receive: dropping packet with truncated MAC header");
            stats.packets_dropped += 1;
            return Ok(false);
        };
        let dist = [header.addr1, header.addr2, header.addr3]
            .iter()
            .map(|a| addr_distance(a, &self.config.sender_addr))
            .min()
            .unwrap_or(u32::MAX);
        if dist >= self.config.max_hamming_dist {
            log::debug!("receive: dropping packet, sender hamming distance {dist}");
            stats.packets_dropped += 1;
            return Ok(false);
        }

        match control::classify(payload) {
            ControlFrameType::Preamble => {
                if self.any_data_written || self.write_offset > 0 {
                    log::info!("receive: preamble observed after data, ending capture");
                    return Ok(true);
                }
                log::info!("receive: preamble observed, uplink established");
                stats.uplink_established = true;
                return Ok(false);
            }
            ControlFrameType::Eot => {
                log::info!("receive: end-of-transmission observed");
                stats.eot_reached = true;
                return Ok(false);
            }
            ControlFrameType::Data => {}
        }

        if self.write_offset + packet.len() > self.buffer_capacity() {
            self.flush(sink, stats)?;
        }

        let frame_number = if self.config.ordered {
            i64::from(header.read_frame_number())
        } else {
            let n = self.sequence_counter;
            self.sequence_counter += 1;
            n
        };

        if self.write_offset + packet.len() > self.buffer.len() {
            self.buffer.resize(self.write_offset + packet.len(), 0);
        }
        let packet_start = self.write_offset;
        self.buffer[packet_start..packet_start + packet.len()].copy_from_slice(packet);

        let it_len = u16::from_le_bytes([packet[2], packet[3]]) as usize;
        let payload_start = packet_start + it_len + MAC_HEADER_LEN;
        self.heap.push(HeapNode {
            frame_number,
            start: payload_start,
            len: payload.len(),
        });

        self.write_offset += packet.len();
        stats.num_packets_processed += 1;
        Ok(false)
    }

    fn buffer_capacity(&self) -> usize {
        self.config.packet_buffer_size
    }

    /// Drain the heap in frame-number order, writing one `PAYLOAD_SIZE` block
    /// per node to `sink`, filling gaps with noise if configured.
    fn flush(&mut self, sink: &mut impl Write, stats: &mut ReceiveStats) -> crate::tools::error::Result<()> {
        if self.heap.is_empty() {
            self.write_offset = 0;
            return Ok(());
        }

        let mut expected = self.heap.peek().map(|n| n.frame_number).unwrap_or(0);
        while let Some(node) = self.heap.pop() {
            if self.config.ordered && node.frame_number > expected {
                let gap = (node.frame_number - expected) as u64;
                if self.config.add_noise {
                    let noise_block = vec![self.config.noise_value; PAYLOAD_SIZE];
                    for _ in 0..gap {
                        let written = sink.write(&noise_block)?;
                        if written < noise_block.len() {
                            log::warn!("receive: partial noise write ({written}/{} bytes)", noise_block.len());
                        }
                        stats.total_noise_added += written as u64;
                    }
                }
                stats.total_blocks_lost += gap;
            }

            let mut block = vec![0u8; PAYLOAD_SIZE];
            let available = node.len.min(PAYLOAD_SIZE);
            block[..available].copy_from_slice(&self.buffer[node.start..node.start + available]);
            let written = sink.write(&block)?;
            if written < block.len() {
                log::warn!("receive: partial payload write ({written}/{} bytes)", block.len());
            }
            stats.total_writelen += written as u64;
            self.any_data_written = true;

            expected = node.frame_number + 1;
        }

        self.write_offset = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::control::build_payload;
    use crate::frame::mac80211::Mac80211Header;
    use crate::frame::radiotap::RadiotapHeader;
    use crate::transport::loopback;
    use std::io::Cursor;

    fn init() {
        crate::tests::init();
    }

    fn data_packet(sender: [u8; 6], frame_number: u32, payload: &[u8]) -> Vec<u8> {
        let radiotap = RadiotapHeader::new(0, 1, 0);
        let mut mac = Mac80211Header::new(sender);
        mac.stamp_frame_number(frame_number);
        let mut out = radiotap.to_bytes().to_vec();
        out.extend_from_slice(&mac.to_bytes());
        let mut body = payload.to_vec();
        body.resize(PAYLOAD_SIZE, 0);
        out.extend_from_slice(&body);
        out.extend_from_slice(&[0u8; FCS_SIZE]);
        out
    }

    fn control_packet(sender: [u8; 6], ty: ControlFrameType) -> Vec<u8> {
        let radiotap = RadiotapHeader::new(0, 1, 0);
        let mac = Mac80211Header::new(sender);
        let mut out = radiotap.to_bytes().to_vec();
        out.extend_from_slice(&mac.to_bytes());
        out.extend_from_slice(&build_payload(ty, crate::config::CONTROL_FRAME_MIN_LEN));
        out.extend_from_slice(&[0u8; FCS_SIZE]);
        out
    }

    #[test]
    fn ordering_flush_fills_gaps_with_noise() {
        init();
        let (mut inject, capture) = loopback::channel(16);
        let mut cfg = ReceiverConfig::default();
        cfg.add_noise = true;
        cfg.noise_value = 0x5A;
        let mut rx = Receiver::init(capture, cfg).unwrap();

        for fnum in [5u32, 3, 7] {
            inject.inject(&data_packet([0xAA; 6], fnum, &[fnum as u8; 4])).unwrap();
        }
        inject.inject(&control_packet([0xAA; 6], ControlFrameType::Eot)).unwrap();

        let mut sink = Cursor::new(Vec::new());
        let stats = rx.activate_capture(&mut sink).unwrap();

        // Frame numbers observed: 3, 5, 7 -> one missing slot before each of 5 and 7.
        assert_eq!(stats.total_blocks_lost, 2);
        assert!(stats.eot_reached);
        let out = sink.into_inner();
        // 3 data blocks + 2 noise blocks = 5 blocks of PAYLOAD_SIZE.
        assert_eq!(out.len(), 5 * PAYLOAD_SIZE);
        assert_eq!(out[0], 3);
        assert_eq!(out[PAYLOAD_SIZE], 0x5A); // noise filling the gap before frame 5
    }

    #[test]
    fn sender_mismatch_is_dropped() {
        init();
        let (mut inject, capture) = loopback::channel(16);
        let cfg = ReceiverConfig::default();
        let mut rx = Receiver::init(capture, cfg).unwrap();

        inject.inject(&data_packet([0x00; 6], 0, &[1u8; 4])).unwrap();
        inject.inject(&control_packet([0xAA; 6], ControlFrameType::Eot)).unwrap();

        let mut sink = Cursor::new(Vec::new());
        let stats = rx.activate_capture(&mut sink).unwrap();
        assert_eq!(stats.packets_dropped, 1);
        assert_eq!(stats.total_writelen, 0);
    }

    #[test]
    fn one_bit_sender_delta_is_accepted() {
        init();
        let (mut inject, capture) = loopback::channel(16);
        let cfg = ReceiverConfig::default();
        let mut rx = Receiver::init(capture, cfg).unwrap();

        // 0xAB differs from 0xAA by one bit.
        inject
            .inject(&data_packet([0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAB], 0, &[9u8; 4]))
            .unwrap();
        inject.inject(&control_packet([0xAA; 6], ControlFrameType::Eot)).unwrap();

        let mut sink = Cursor::new(Vec::new());
        let stats = rx.activate_capture(&mut sink).unwrap();
        assert_eq!(stats.packets_dropped, 0);
        assert_eq!(stats.total_writelen, PAYLOAD_SIZE as u64);
    }

    #[test]
    fn empty_capture_writes_nothing() {
        init();
        let (inject, capture) = loopback::channel(16);
        let cfg = ReceiverConfig::default();
        let mut rx = Receiver::init(capture, cfg).unwrap();
        drop(inject);

        let mut sink = Cursor::new(Vec::new());
        let stats = rx.activate_capture(&mut sink).unwrap();
        assert_eq!(stats.total_writelen, 0);
        assert_eq!(stats.total_noise_added, 0);
        assert_eq!(stats.rx_state, RxState::Error);
    }

    #[test]
    fn preamble_after_data_ends_capture() {
        init();
        let (mut inject, capture) = loopback::channel(16);
        let cfg = ReceiverConfig::default();
        let mut rx = Receiver::init(capture, cfg).unwrap();

        inject.inject(&data_packet([0xAA; 6], 0, &[1u8; 4])).unwrap();
        inject
            .inject(&control_packet([0xAA; 6], ControlFrameType::Preamble))
            .unwrap();
        // Second round would never be read since the loop ends on the preamble above.
        let mut sink = Cursor::new(Vec::new());
        let stats = rx.activate_capture(&mut sink).unwrap();
        assert_eq!(stats.total_writelen, PAYLOAD_SIZE as u64);
    }

    #[test]
    fn stop_capture_is_idempotent() {
        init();
        let (_inject, capture) = loopback::channel(16);
        let cfg = ReceiverConfig::default();
        let rx = Receiver::init(capture, cfg).unwrap();
        rx.stop_capture();
        rx.stop_capture();
        assert!(!rx.is_active());
    }
}
