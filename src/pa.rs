//! Power-amplifier GPIO seam.
//!
//! GPIO control of a downstream power amplifier is explicitly out of scope as a
//! *feature* — this crate links no GPIO library. What is needed instead
//! is somewhere for the transmit engine to call into: a process-wide
//! `{enabled, chip, line}` record that is not reentrant, encapsulated in a handle
//! returned at init and released on `Drop` so a collaborator holds the only
//! handle and it cannot outlive its owner.

use crate::tools::error::{CoreError, ErrorKind, Result};
use std::sync::atomic::{AtomicBool, Ordering};

static PA_ACTIVE: AtomicBool = AtomicBool::new(false);

/// A handle to the (notionally) enabled power amplifier line.
///
/// Only one `PowerAmplifier` may be enabled at a time process-wide; a second
/// [`PowerAmplifier::enable`] call fails until the first is dropped.
#[derive(Debug)]
pub struct PowerAmplifier {
    chip: String,
    line: u32,
}

impl PowerAmplifier {
    /// Enable the PA on `chip`/`line`. Fails if a [`PowerAmplifier`] handle is
    /// already live anywhere in this process.
    pub fn enable(chip: impl Into<String>, line: u32) -> Result<Self> {
        if PA_ACTIVE.swap(true, Ordering::AcqRel) {
            return Err(CoreError::new(
                ErrorKind::Io,
                "power amplifier is already enabled elsewhere in this process",
            ));
        }
        let chip = chip.into();
        log::info!("pa: enabling {chip}:{line}");
        Ok(PowerAmplifier { chip, line })
    }

    /// The GPIO chip name this handle was enabled on.
    pub fn chip(&self) -> &str {
        &self.chip
    }

    /// The GPIO line number this handle was enabled on.
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl Drop for PowerAmplifier {
    fn drop(&mut self) {
        log::info!("pa: disabling {}:{}", self.chip, self.line);
        PA_ACTIVE.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize tests: PA_ACTIVE is a single process-wide flag.
    static LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn second_enable_fails_while_first_is_live() {
        let _guard = LOCK.lock().unwrap();
        let first = PowerAmplifier::enable("gpiochip0", 4).unwrap();
        assert!(PowerAmplifier::enable("gpiochip0", 5).is_err());
        drop(first);
        assert!(PowerAmplifier::enable("gpiochip0", 5).is_ok());
    }

    #[test]
    fn chip_and_line_are_reported() {
        let _guard = LOCK.lock().unwrap();
        let pa = PowerAmplifier::enable("gpiochip1", 7).unwrap();
        assert_eq!(pa.chip(), "gpiochip1");
        assert_eq!(pa.line(), 7);
    }
}
