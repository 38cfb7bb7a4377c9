/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! Acceptance windows for pulse durations and half-cycle intervals.
use core::fmt;
use core::ops::RangeInclusive;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// An inclusive `min..=max` range of sample or tick counts.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Window {
    pub min: u32,
    pub max: u32,
}

impl Window {
    pub const fn new(min: u32, max: u32) -> Self {
        Window { min, max }
    }
    /// Returns a window of `nominal * [0.8, 1.2]`, truncated to integers.
    pub const fn from_tolerance(nominal: u32) -> Self {
        Window {
            min: (nominal as u64 * 4 / 5) as u32,
            max: (nominal as u64 * 6 / 5) as u32
        }
    }
    /// Returns an unbounded window starting at `min`.
    pub const fn at_least(min: u32) -> Self {
        Window { min, max: u32::MAX }
    }
    /// Returns the window of a half-cycle of the tone `freq` sampled at `sample_rate`
    /// with the default tolerance.
    pub const fn half_cycle(sample_rate: u32, freq: u32) -> Self {
        Window::from_tolerance(half_cycle_samples(sample_rate, freq))
    }
    #[inline]
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }
    /// Returns `true` if no positive count can be accepted.
    pub fn is_empty(&self) -> bool {
        self.max == 0 || self.min > self.max
    }
    /// Returns `true` if any count is accepted by both windows.
    pub fn overlaps(&self, other: &Window) -> bool {
        !self.is_empty() && !other.is_empty() &&
        self.min <= other.max && other.min <= self.max
    }
    pub fn range(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.max == u32::MAX {
            write!(f, "{} <= n", self.min)
        }
        else {
            write!(f, "{} <= n <= {}", self.min, self.max)
        }
    }
}

/// Returns the number of samples in a half-cycle of the tone `freq` sampled at `sample_rate`.
///
/// The division is performed in the same order as `sample_rate / freq / 2` on integers.
pub const fn half_cycle_samples(sample_rate: u32, freq: u32) -> u32 {
    if freq == 0 {
        0
    }
    else {
        sample_rate / freq / 2
    }
}
