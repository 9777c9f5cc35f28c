//! # skyfec - best-effort FEC file transport over raw 802.11 injection
//!
//! A one-way file transport built for lossy, uncoordinated WiFi links: an
//! LDPC-Staircase inner code carries source symbols across a run of frames, a
//! Reed-Solomon outer code corrects intra-frame byte errors, and a thin
//! radiotap/802.11 framer gets the result onto (or off of) a monitor-mode NIC.
//!
//! | Module | Role |
//! | ------------- | ------------- |
//! | [`codec`] | LDPC-Staircase + Reed-Solomon encode/decode |
//! | [`frame`] | radiotap/MAC framing and control-frame classification |
//! | [`transmit`] | drives input bytes through the handler pipeline to injection |
//! | [`receive`] | capture, verify, classify, reassemble |
//! | [`transport`] | the injection/capture seam engines are generic over |
//! | [`config`] | typed, validated configuration for both engines |
//! | [`pa`] | process-wide power-amplifier handle |

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(warnings))]

pub mod codec;
pub mod config;
pub mod frame;
pub mod pa;
pub mod receive;
mod tools;
pub mod transmit;
pub mod transport;

pub use crate::tools::error;

#[cfg(test)]
pub(crate) mod tests {
    pub fn init() {
        std::env::set_var("RUST_LOG", "debug");
        env_logger::builder().is_test(true).try_init().ok();
    }
}
