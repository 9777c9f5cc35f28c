//! Capture/injection transport seam.
//!
//! This crate's dependency stack doesn't link against a packet-capture library,
//! so the transmit and receive engines are generic over two small traits instead
//! of a concrete monitor-mode backend. A real implementation (e.g. one built on
//! a `pcap`-style crate) plugs in by implementing [`FrameInjector`] and
//! [`FrameCapture`]; this module also ships a channel-backed loopback pair the
//! engines' own tests use to drive each other over memory instead of a live NIC,
//! wrapping a concrete transport behind a small `Result`-returning interface.

use crate::tools::error::Result;
use std::time::Duration;

/// Sends complete wire frames (radiotap ∥ MAC header ∥ payload ∥ FCS) to a
/// monitor-mode NIC in injection mode, or to whatever backs this trait.
pub trait FrameInjector: std::fmt::Debug {
    /// Inject one already-assembled wire frame.
    fn inject(&mut self, frame: &[u8]) -> Result<()>;
}

/// Receives captured frames from a monitor-mode NIC, or whatever backs this trait.
pub trait FrameCapture: std::fmt::Debug {
    /// Wait up to `timeout` for the next captured frame. `None` blocks
    /// indefinitely, matching `capture_timeout < 0`. Returns `Ok(None)` on
    /// timeout, `Ok(Some(frame))` on a captured frame, `Err` on a transport
    /// failure.
    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>>;
}

/// An in-process, channel-backed [`FrameInjector`]/[`FrameCapture`] pair.
///
/// Used by this crate's own integration tests to drive a [`crate::transmit::Transmitter`]
/// against a [`crate::receive::Receiver`] without a live radio, and available to any
/// collaborator that wants to pipe bytes between the two engines directly without
/// a NIC.
pub mod loopback {
    use super::{FrameCapture, FrameInjector};
    use crate::tools::error::{CoreError, ErrorKind, Result};
    use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
    use std::time::Duration;

    /// The injecting half of a loopback pair.
    #[derive(Debug)]
    pub struct LoopbackInjector {
        tx: SyncSender<Vec<u8>>,
    }

    /// The capturing half of a loopback pair.
    #[derive(Debug)]
    pub struct LoopbackCapture {
        rx: Receiver<Vec<u8>>,
    }

    /// Build a connected loopback pair, buffering up to `capacity` in-flight frames
    /// before [`LoopbackInjector::inject`] blocks.
    pub fn channel(capacity: usize) -> (LoopbackInjector, LoopbackCapture) {
        let (tx, rx) = sync_channel(capacity.max(1));
        (LoopbackInjector { tx }, LoopbackCapture { rx })
    }

    impl FrameInjector for LoopbackInjector {
        fn inject(&mut self, frame: &[u8]) -> Result<()> {
            self.tx
                .send(frame.to_vec())
                .map_err(|e| CoreError::new(ErrorKind::Transmit, format!("loopback closed: {e}")))
        }
    }

    impl FrameCapture for LoopbackCapture {
        fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>> {
            let result = match timeout {
                Some(d) => self.rx.recv_timeout(d),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match result {
                Ok(frame) => Ok(Some(frame)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(CoreError::new(ErrorKind::Capture, "loopback sender dropped"))
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn delivers_injected_frames_in_order() {
            let (mut tx, mut rx) = channel(4);
            tx.inject(&[1, 2, 3]).unwrap();
            tx.inject(&[4, 5]).unwrap();
            assert_eq!(rx.recv(None).unwrap(), Some(vec![1, 2, 3]));
            assert_eq!(rx.recv(None).unwrap(), Some(vec![4, 5]));
        }

        #[test]
        fn recv_times_out_when_empty() {
            let (_tx, mut rx) = channel(1);
            assert_eq!(rx.recv(Some(Duration::from_millis(5))).unwrap(), None);
        }

        #[test]
        fn recv_errors_once_injector_dropped() {
            let (tx, mut rx) = channel(1);
            drop(tx);
            assert!(rx.recv(Some(Duration::from_millis(5))).is_err());
        }
    }
}
