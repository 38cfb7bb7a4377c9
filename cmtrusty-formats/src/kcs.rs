/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! **KCS** and **MSX** frequency-class encoded byte streams.
//!
//! A `0` bit is a single cycle of the lower tone, a `1` bit is two cycles of the tone
//! of the doubled frequency. Bits are grouped in UART frames: a start bit `0`, 8 data bits
//! LSB first and two stop bits `1`. Data is preceded by a leader of `1` bits and a frame
//! of all `1` bits marks the end of a file.
use std::io;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use cmtrusty_core::audio::Gain;
use cmtrusty_core::error::{decode_error, DecodeErrorKind};
use cmtrusty_core::window::{half_cycle_samples, Window};

mod demod;
mod encoding;
mod stream;

pub use demod::*;
pub use encoding::*;
pub use stream::*;

/// How half-cycles are measured and classified.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HalfCycleVariant {
    /// Measures a low half-cycle from its first low sample to the next high sample and
    /// accepts spans within ±20% of the nominal lengths. A `0` interrupting a pending half
    /// of a `1` is preceded by a [Bit::Error][crate::Bit::Error] marker.
    Windowed,
    /// Measures runs of high samples. A run at least the nominal `0` length lowered by
    /// `margin` is a `0`, otherwise a run at least the nominal `1` length lowered by `margin`
    /// is a half of a `1`. A pending half of a `1` is silently dropped by a `0`.
    Legacy { margin: u32 },
}

/// What happens to a pending half of a `1` when a half-cycle matches neither window.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoisePolicy {
    /// The pending half is kept.
    KeepPending,
    /// The pending half is dropped.
    ResetPending,
}

impl Default for NoisePolicy {
    fn default() -> Self {
        NoisePolicy::KeepPending
    }
}

/// The configuration of a [HalfCycleDemodulator].
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HalfCycleConfig {
    /// The tone of a `0` bit in Hz.
    pub zero_hz: u32,
    /// The tone of a `1` bit in Hz.
    pub one_hz: u32,
    pub variant: HalfCycleVariant,
    pub noise: NoisePolicy,
    pub gain: Gain,
}

impl Default for HalfCycleConfig {
    fn default() -> Self {
        HalfCycleConfig::kcs()
    }
}

impl HalfCycleConfig {
    /// Kansas City Standard 2400/4800 Hz tones.
    pub fn kcs() -> Self {
        HalfCycleConfig {
            zero_hz: 2400,
            one_hz: 4800,
            variant: HalfCycleVariant::Windowed,
            noise: NoisePolicy::KeepPending,
            gain: Gain::KCS
        }
    }
    /// MSX 1200/2400 Hz tones.
    pub fn msx() -> Self {
        HalfCycleConfig { zero_hz: 1200, one_hz: 2400, ..HalfCycleConfig::kcs() }
    }
    /// Kansas City Standard tones measured by the run-length variant.
    pub fn kcs_legacy() -> Self {
        HalfCycleConfig {
            variant: HalfCycleVariant::Legacy { margin: 2 },
            gain: Gain::KCS_LEGACY,
            ..HalfCycleConfig::kcs()
        }
    }
    pub fn with_noise_policy(mut self, noise: NoisePolicy) -> Self {
        self.noise = noise;
        self
    }
    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }
    /// Returns the nominal half-cycle lengths of the `0` and `1` tones in samples.
    pub fn half_cycles(&self, sample_rate: u32) -> (u32, u32) {
        (half_cycle_samples(sample_rate, self.zero_hz), half_cycle_samples(sample_rate, self.one_hz))
    }
    /// Returns the acceptance windows of the `0` and `1` half-cycles at `sample_rate`.
    ///
    /// Returns an error with [DecodeErrorKind::UnsupportedInput] if the windows are empty
    /// or overlap, e.g. when the sample rate is too low for the tones.
    pub fn windows(&self, sample_rate: u32) -> io::Result<(Window, Window)> {
        let (zero_half, one_half) = self.half_cycles(sample_rate);
        let (zero, one) = match self.variant {
            HalfCycleVariant::Windowed => {
                (Window::from_tolerance(zero_half), Window::from_tolerance(one_half))
            }
            HalfCycleVariant::Legacy { margin } => {
                let zero_min = zero_half.saturating_sub(margin);
                let one_min = one_half.saturating_sub(margin).max(1);
                (Window::at_least(zero_min), Window::new(one_min, zero_min.saturating_sub(1)))
            }
        };
        if zero.is_empty() || one.is_empty() || zero.overlaps(&one) {
            return Err(decode_error(DecodeErrorKind::UnsupportedInput,
                format!("sample rate {} Hz is too low for {}/{} Hz tones",
                        sample_rate, self.zero_hz, self.one_hz)))
        }
        debug!("half-cycle windows: 0: {}, 1: {}", zero, one);
        Ok((zero, one))
    }
}
