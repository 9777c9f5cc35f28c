//! Radiotap/MAC framer and control-frame classification.

pub mod control;
pub mod mac80211;
pub mod radiotap;
pub mod radiotap_parser;
