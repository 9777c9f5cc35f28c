//! Transmit engine: drives input → injection with preamble/EOT control
//! frames and a pluggable pre/post-injection handler pipeline.

use crate::config::{
    TransmitterConfig, CONTROL_FRAME_MIN_LEN, FCS_SIZE, PAYLOAD_MAX,
};
use crate::frame::control::{self, ControlFrameType};
use crate::frame::mac80211::Mac80211Header;
use crate::frame::radiotap::RadiotapHeader;
use crate::tools::error::{CoreError, ErrorKind, Result};
use crate::transport::FrameInjector;
use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed capacity of the preinject/postinject handler pipelines.
pub const HANDLER_CAPACITY: usize = 8;

/// Terminal outcome of a transmit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    /// Ran to completion (EOF on the input, or `transmit_bytes` exhausted).
    #[default]
    Normal,
    /// `transmit_timeout` elapsed waiting for the next block of input.
    TimedOut,
    /// `stop_transmission()` was called.
    Deactivated,
    /// The input descriptor or the injector returned an I/O error.
    Error,
}

/// The kind of the last frame this session sent, for stats reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameKind {
    /// No frame sent yet.
    #[default]
    None,
    /// A data frame carrying an RS-LDPC symbol.
    Data,
    /// A preamble control frame.
    Preamble,
    /// An end-of-transmission control frame.
    Eot,
}

/// Accumulated statistics for one transmit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransmitStats {
    /// Number of data frames injected.
    pub data_frame_count: u64,
    /// Number of control (preamble/EOT) frames injected.
    pub ctrl_frame_count: u64,
    /// Total bytes read from the input source.
    pub total_bytes_read: u64,
    /// Total bytes written to the injector, across all frame kinds.
    pub total_bytes_sent: u64,
    /// Bytes read by the most recent input read.
    pub prev_bytes_read: u64,
    /// Bytes sent by the most recent injection.
    pub prev_bytes_sent: u64,
    /// Terminal state of the session, set once the read loop exits.
    pub tx_state: TxState,
    /// Kind of the most recently sent frame.
    pub frame_type: FrameKind,
}

/// The in-memory composite a handler mutates before injection.
#[derive(Debug, Clone)]
pub struct TransmitFrame {
    /// Radiotap header prepended to this frame.
    pub radiotap: RadiotapHeader,
    /// 802.11 3-address MAC header prepended to this frame.
    pub mac: Mac80211Header,
    /// Payload buffer; only the first `payload_size` bytes are meaningful.
    pub payload: Vec<u8>,
    /// Number of valid bytes in `payload`. Setting this to `0` suppresses
    /// injection of the frame.
    pub payload_size: usize,
}

impl TransmitFrame {
    fn new(radiotap: RadiotapHeader, mac: Mac80211Header, blocksize: usize) -> Self {
        TransmitFrame {
            radiotap,
            mac,
            payload: vec![0u8; blocksize.max(PAYLOAD_MAX)],
            payload_size: 0,
        }
    }

    fn wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            crate::frame::radiotap::RADIOTAP_HEADER_LEN
                + crate::frame::mac80211::MAC_HEADER_LEN
                + self.payload_size
                + FCS_SIZE,
        );
        out.extend_from_slice(&self.radiotap.to_bytes());
        out.extend_from_slice(&self.mac.to_bytes());
        out.extend_from_slice(&self.payload[..self.payload_size]);
        out.extend(std::iter::repeat(0u8).take(FCS_SIZE));
        out
    }
}

/// A handler invoked before a data frame is injected; may mutate the frame's
/// radiotap/MAC fields, payload bytes, or `payload_size`.
pub trait PreInjectHandler: std::fmt::Debug {
    /// Inspect or mutate `frame` before injection, given the stats accumulated
    /// so far this session.
    fn call(&mut self, frame: &mut TransmitFrame, stats: &TransmitStats);
}

/// A handler invoked after a data frame is injected, with the updated stats.
pub trait PostInjectHandler: std::fmt::Debug {
    /// Observe `stats` after a frame was injected (or suppressed).
    fn call(&mut self, stats: &TransmitStats);
}

/// A fixed-capacity, ordered slot array for handler registration.
#[derive(Debug)]
pub struct HandlerPipeline<H: ?Sized> {
    slots: Vec<Option<Box<H>>>,
}

impl<H: ?Sized> HandlerPipeline<H> {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        HandlerPipeline { slots }
    }

    /// Register `handler` in the first free slot, returning its slot id.
    pub fn attach(&mut self, handler: Box<H>) -> Result<usize> {
        for (id, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(handler);
                return Ok(id);
            }
        }
        Err(CoreError::new(
            ErrorKind::Io,
            "handler pipeline is at capacity",
        ))
    }

    /// Remove whatever handler occupies `slot_id`, if any. Idempotent.
    pub fn remove(&mut self, slot_id: usize) {
        if let Some(slot) = self.slots.get_mut(slot_id) {
            *slot = None;
        }
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<H>> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }
}

/// Drives a single-threaded transmit session: preamble, streamed data frames
/// through a handler pipeline, EOT.
pub struct Transmitter<I: FrameInjector> {
    injector: I,
    config: TransmitterConfig,
    preinject: HandlerPipeline<dyn PreInjectHandler>,
    postinject: HandlerPipeline<dyn PostInjectHandler>,
    stop_flag: Arc<AtomicBool>,
}

impl<I: FrameInjector> fmt::Debug for Transmitter<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transmitter")
            .field("injector", &self.injector)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<I: FrameInjector> Transmitter<I> {
    /// Acquire a transmit session over `injector` with the given configuration
    ///. Validates `config` before returning.
    pub fn init(injector: I, config: TransmitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Transmitter {
            injector,
            config,
            preinject: HandlerPipeline::new(HANDLER_CAPACITY),
            postinject: HandlerPipeline::new(HANDLER_CAPACITY),
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register a preinject handler, returning its slot id.
    pub fn attach_preinject_handler(&mut self, handler: Box<dyn PreInjectHandler>) -> Result<usize> {
        self.preinject.attach(handler)
    }

    /// Register a postinject handler, returning its slot id.
    pub fn attach_postinject_handler(&mut self, handler: Box<dyn PostInjectHandler>) -> Result<usize> {
        self.postinject.attach(handler)
    }

    /// Remove a previously attached preinject handler. Idempotent.
    pub fn remove_preinject_handler(&mut self, slot_id: usize) {
        self.preinject.remove(slot_id);
    }

    /// Remove a previously attached postinject handler. Idempotent.
    pub fn remove_postinject_handler(&mut self, slot_id: usize) {
        self.postinject.remove(slot_id);
    }

    /// Request cooperative shutdown. At most one more frame may be injected
    /// after this call returns. Idempotent.
    pub fn stop_transmission(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Whether this session has not yet been asked to stop.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Acquire)
    }

    fn send_control_burst(&mut self, ty: ControlFrameType, mac: &Mac80211Header, stats: &mut TransmitStats) -> Result<()> {
        let radiotap = RadiotapHeader::new(
            self.config.rtap_flags,
            self.config.rtap_rate_mbps,
            self.config.rtap_tx_flags,
        );
        let payload = control::build_payload(ty, CONTROL_FRAME_MIN_LEN);
        let frame = TransmitFrame {
            radiotap,
            mac: *mac,
            payload,
            payload_size: CONTROL_FRAME_MIN_LEN,
        };
        let wire = frame.wire_bytes();
        for _ in 0..(1 + self.config.redundant_ctrl_frames) {
            self.injector.inject(&wire)?;
            stats.ctrl_frame_count += 1;
            stats.total_bytes_sent += wire.len() as u64;
            stats.frame_type = match ty {
                ControlFrameType::Preamble => FrameKind::Preamble,
                ControlFrameType::Eot => FrameKind::Eot,
                ControlFrameType::Data => unreachable!("control burst only sends control types"),
            };
        }
        Ok(())
    }

    /// Stream `buf` as the message body of one transmission: preamble, data
    /// frames in blocks of `blocksize`, EOT.
    pub fn transmit_bytes(&mut self, buf: &[u8]) -> Result<TransmitStats> {
        self.run_session(&mut std::io::Cursor::new(buf), false)
    }

    /// Stream from `reader` until EOF, timeout, or `stop_transmission()`
    ///. `transmit_timeout` bounds each pass
    /// waiting for the next block to become available; a `WouldBlock` error
    /// from `reader` is treated as "not ready yet" and retried until the
    /// timeout elapses, since this crate carries no OS-poll dependency to
    /// multiplex an arbitrary descriptor.
    pub fn start_transmission(&mut self, reader: &mut impl Read) -> Result<TransmitStats> {
        self.run_session(reader, true)
    }

    fn run_session(&mut self, reader: &mut impl Read, honor_timeout: bool) -> Result<TransmitStats> {
        let mut stats = TransmitStats::default();
        let mac = Mac80211Header::new(self.config.sender_addr);

        log::info!("transmit: sending preamble");
        self.send_control_burst(ControlFrameType::Preamble, &mac, &mut stats)?;

        let mut frame = TransmitFrame::new(RadiotapHeader::new(
            self.config.rtap_flags,
            self.config.rtap_rate_mbps,
            self.config.rtap_tx_flags,
        ), mac, self.config.blocksize);

        let deadline = if honor_timeout && self.config.transmit_timeout >= 0 {
            Some(Duration::from_secs(self.config.transmit_timeout as u64))
        } else {
            None
        };
        let session_start = Instant::now();

        loop {
            if !self.is_active() {
                stats.tx_state = TxState::Deactivated;
                break;
            }

            let n = match read_one_block(reader, &mut frame.payload, self.config.blocksize, deadline, session_start) {
                ReadOutcome::Data(n) => n,
                ReadOutcome::Eof => {
                    stats.tx_state = TxState::Normal;
                    break;
                }
                ReadOutcome::TimedOut => {
                    stats.tx_state = TxState::TimedOut;
                    break;
                }
                ReadOutcome::Err(e) => {
                    log::error!("transmit: input read failed: {e}");
                    stats.tx_state = TxState::Error;
                    break;
                }
            };

            stats.prev_bytes_read = n as u64;
            stats.total_bytes_read += n as u64;
            frame.payload_size = n;

            for handler in self.preinject.iter_mut() {
                handler.call(&mut frame, &stats);
            }

            if frame.payload_size == 0 {
                log::debug!("transmit: handler suppressed injection of this frame");
                continue;
            }
            if frame.payload_size > PAYLOAD_MAX {
                log::error!(
                    "transmit: handler set payload_size {} above PAYLOAD_MAX {}, dropping frame",
                    frame.payload_size,
                    PAYLOAD_MAX
                );
                debug_assert!(false, "handler violated payload_size contract");
                continue;
            }

            let wire = frame.wire_bytes();
            if let Err(e) = self.injector.inject(&wire) {
                log::error!("transmit: injection failed: {e}");
                stats.tx_state = TxState::Error;
                break;
            }
            stats.data_frame_count += 1;
            stats.prev_bytes_sent = wire.len() as u64;
            stats.total_bytes_sent += wire.len() as u64;
            stats.frame_type = FrameKind::Data;

            for handler in self.postinject.iter_mut() {
                handler.call(&stats);
            }
        }

        log::info!("transmit: sending EOT, state={:?}", stats.tx_state);
        self.send_control_burst(ControlFrameType::Eot, &frame.mac, &mut stats)?;
        Ok(stats)
    }
}

enum ReadOutcome {
    Data(usize),
    Eof,
    TimedOut,
    Err(std::io::Error),
}

fn read_one_block(
    reader: &mut impl Read,
    buf: &mut [u8],
    blocksize: usize,
    deadline: Option<Duration>,
    started: Instant,
) -> ReadOutcome {
    loop {
        match reader.read(&mut buf[..blocksize]) {
            Ok(0) => return ReadOutcome::Eof,
            Ok(n) => return ReadOutcome::Data(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if let Some(d) = deadline {
                    if started.elapsed() >= d {
                        return ReadOutcome::TimedOut;
                    }
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => return ReadOutcome::Err(e),
        }
    }
}

/// Built-in per-frame handlers: delay, packet-loss simulation,
/// bit-error simulation, frame-number stamping.
pub mod handlers {
    use super::{Mac80211Header, PostInjectHandler, PreInjectHandler, TransmitFrame, TransmitStats};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use std::time::Duration;

    /// Sleeps `delay` between frames.
    ///
    /// `require_full_elapsed` is carried for profile fidelity with the
    /// original's early-wake-on-signal semantics; `std::thread::sleep` has no
    /// signal-interrupt behavior to opt out of in safe Rust, so this handler
    /// always sleeps the full duration regardless of the flag's value.
    #[derive(Debug, Clone, Copy)]
    pub struct DelayHandler {
        /// Delay applied after each frame.
        pub delay: Duration,
        /// Carried for profile fidelity (see struct docs); unused by this
        /// implementation's sleep behavior.
        pub require_full_elapsed: bool,
    }

    impl DelayHandler {
        /// Build a handler sleeping `delay` between frames.
        pub fn new(delay: Duration, require_full_elapsed: bool) -> Self {
            DelayHandler { delay, require_full_elapsed }
        }
    }

    impl PostInjectHandler for DelayHandler {
        fn call(&mut self, _stats: &TransmitStats) {
            std::thread::sleep(self.delay);
        }
    }

    /// With independent Bernoulli probability `p`, suppresses the frame and
    /// counts the drop.
    #[derive(Debug)]
    pub struct PacketLossHandler {
        probability: f64,
        rng: StdRng,
        /// Number of frames suppressed so far.
        pub dropped: u64,
    }

    impl PacketLossHandler {
        /// Build a handler dropping frames with probability `probability ∈ [0, 1]`.
        pub fn new(probability: f64, seed: u64) -> Self {
            PacketLossHandler {
                probability: probability.clamp(0.0, 1.0),
                rng: StdRng::seed_from_u64(seed),
                dropped: 0,
            }
        }
    }

    impl PreInjectHandler for PacketLossHandler {
        fn call(&mut self, frame: &mut TransmitFrame, _stats: &TransmitStats) {
            if self.rng.random_bool(self.probability) {
                frame.payload_size = 0;
                self.dropped += 1;
            }
        }
    }

    /// Flips exactly `⌊frame_size · 8 · e⌋` distinct bits, chosen uniformly from
    /// the non-radiotap portion of the frame (MAC header ∥ payload), via
    /// rejection sampling so no bit is flipped twice.
    #[derive(Debug)]
    pub struct BitErrorHandler {
        error_rate: f64,
        rng: StdRng,
    }

    impl BitErrorHandler {
        /// Build a handler flipping bits at rate `error_rate ∈ [0, 1]`.
        pub fn new(error_rate: f64, seed: u64) -> Self {
            BitErrorHandler {
                error_rate: error_rate.clamp(0.0, 1.0),
                rng: StdRng::seed_from_u64(seed),
            }
        }
    }

    impl PreInjectHandler for BitErrorHandler {
        fn call(&mut self, frame: &mut TransmitFrame, _stats: &TransmitStats) {
            if frame.payload_size == 0 {
                return;
            }
            let mut buf = frame.mac.to_bytes().to_vec();
            buf.extend_from_slice(&frame.payload[..frame.payload_size]);
            let total_bits = buf.len() * 8;
            let flips = ((total_bits as f64) * self.error_rate).floor() as usize;
            let flips = flips.min(total_bits);

            let mut flipped: HashSet<usize> = HashSet::with_capacity(flips);
            while flipped.len() < flips {
                let bit = self.rng.random_range(0..total_bits);
                if flipped.insert(bit) {
                    buf[bit / 8] ^= 1 << (bit % 8);
                }
            }

            let mac_len = crate::frame::mac80211::MAC_HEADER_LEN;
            if let Some(mac) = Mac80211Header::from_bytes(&buf[..mac_len]) {
                frame.mac = mac;
            }
            frame.payload[..frame.payload_size].copy_from_slice(&buf[mac_len..]);
        }
    }

    /// Writes `htonl(data_frame_count)` into `addr1[2..6]` of each data frame
    ///, read back on receive to order frames.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FrameNumberHandler;

    impl PreInjectHandler for FrameNumberHandler {
        fn call(&mut self, frame: &mut TransmitFrame, stats: &TransmitStats) {
            frame.mac.stamp_frame_number(stats.data_frame_count as u32);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::frame::mac80211::Mac80211Header;
        use crate::frame::radiotap::RadiotapHeader;

        fn frame() -> TransmitFrame {
            TransmitFrame {
                radiotap: RadiotapHeader::new(0, 1, 0),
                mac: Mac80211Header::new([0xAA; 6]),
                payload: vec![0x11; 512],
                payload_size: 512,
            }
        }

        #[test]
        fn packet_loss_always_drops_at_probability_one() {
            let mut h = PacketLossHandler::new(1.0, 1);
            let mut f = frame();
            let stats = TransmitStats::default();
            h.call(&mut f, &stats);
            assert_eq!(f.payload_size, 0);
            assert_eq!(h.dropped, 1);
        }

        #[test]
        fn packet_loss_never_drops_at_probability_zero() {
            let mut h = PacketLossHandler::new(0.0, 1);
            let mut f = frame();
            let stats = TransmitStats::default();
            h.call(&mut f, &stats);
            assert_eq!(f.payload_size, 512);
            assert_eq!(h.dropped, 0);
        }

        #[test]
        fn bit_error_flips_expected_bit_count() {
            let mut h = BitErrorHandler::new(0.01, 42);
            let mut f = frame();
            let before_mac = f.mac.to_bytes();
            let before_payload = f.payload.clone();
            let stats = TransmitStats::default();
            h.call(&mut f, &stats);

            let mut after = f.mac.to_bytes().to_vec();
            after.extend_from_slice(&f.payload);
            let mut before = before_mac.to_vec();
            before.extend_from_slice(&before_payload);
            let diff_bits: u32 = before
                .iter()
                .zip(after.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum();
            let expected = ((before.len() * 8) as f64 * 0.01).floor() as u32;
            assert_eq!(diff_bits, expected);
        }

        #[test]
        fn frame_number_handler_stamps_current_count() {
            let mut h = FrameNumberHandler;
            let mut f = frame();
            let mut stats = TransmitStats::default();
            stats.data_frame_count = 7;
            h.call(&mut f, &stats);
            assert_eq!(f.mac.read_frame_number(), 7);
        }
    }
}
