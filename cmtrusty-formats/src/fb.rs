/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! **FB** duration-count encoded tape blocks.
//!
//! Each bit is a single square cycle: a short cycle of ~1917 Hz for `0` and a long cycle
//! of ~958 Hz for `1`. The bit value is recovered from the length of the high half-cycle.
//!
//! A block starts with a leader of `0` bits, followed by the tape mark of 20 `1` bits and
//! the kind mark: 20 `1` bits and 40 `0` bits for an info block or 20 `0` bits for a data block.
//! The payload consists of 9-bit groups, each a start bit `1` followed by a byte, MSB first.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

mod blocks;
mod demod;
mod encoding;

pub use blocks::*;
pub use demod::*;
pub use encoding::*;

/// The nominal frequency of a `0` bit cycle in Hz.
pub const FB_ZERO_HZ: u32 = 1917;
/// The nominal frequency of a `1` bit cycle in Hz.
pub const FB_ONE_HZ: u32 = 958;
/// The number of samples the detection thresholds are lowered by.
pub const FB_MARGIN: u32 = 2;

/// The timing parameters of the **FB** signal.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FbTiming {
    pub zero_hz: u32,
    pub one_hz: u32,
    pub margin: u32,
}

impl Default for FbTiming {
    fn default() -> Self {
        FbTiming { zero_hz: FB_ZERO_HZ, one_hz: FB_ONE_HZ, margin: FB_MARGIN }
    }
}

impl FbTiming {
    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }
    /// Returns the minimum high run lengths of a `0` and a `1` bit at `sample_rate`.
    pub fn thresholds(&self, sample_rate: u32) -> (u32, u32) {
        let min_run = |hz: u32| {
            cmtrusty_core::window::half_cycle_samples(sample_rate, hz).saturating_sub(self.margin)
        };
        (min_run(self.zero_hz), min_run(self.one_hz))
    }
}
