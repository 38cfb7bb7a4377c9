/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use core::num::NonZeroU16;
use std::io;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use super::check_bits_per_sample;

/// A symbolic amplitude level of a single sample.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    Mid,
    High,
}

/// A pre-amplification factor applied to samples before quantization.
///
/// The gain is a fraction `num / den` applied to the centered amplitude.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Gain {
    num: u16,
    den: NonZeroU16,
}

/// A stateless three level sample classifier.
///
/// The thresholds are derived from the sample bit depth: for `mid = 2^(bits - 1)`
/// `lo = mid * 3 / 5 - mid` and `hi = mid * 7 / 5 - mid`. A sample below `lo` is [Level::Low],
/// above `hi` is [Level::High], anything in between is [Level::Mid].
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Quantizer {
    lo: i32,
    hi: i32,
    gain: Gain,
}

/// Measures runs of consecutive [Level::High] samples.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HighRun {
    run: u32,
}

impl HighRun {
    /// Returns the length of the run ended by a `level` other than [Level::High].
    #[inline]
    pub fn push(&mut self, level: Level) -> Option<u32> {
        if level == Level::High {
            self.run = self.run.saturating_add(1);
            None
        }
        else if self.run != 0 {
            let run = self.run;
            self.run = 0;
            Some(run)
        }
        else {
            None
        }
    }
    /// Returns the length of the current, unfinished run.
    pub fn current(&self) -> u32 {
        self.run
    }
    pub fn reset(&mut self) {
        self.run = 0;
    }
}

impl Default for Gain {
    fn default() -> Self {
        Gain::UNITY
    }
}

impl Gain {
    pub const UNITY: Gain = Gain::integer(1);
    /// The gain used by the frequency-class demodulators.
    pub const KCS: Gain = Gain { num: 7, den: unsafe { NonZeroU16::new_unchecked(5) } };
    /// The gain used by the legacy run-length KCS demodulator.
    pub const KCS_LEGACY: Gain = Gain::integer(8);

    /// Returns a new gain of `num / den` or `None` if `den` is 0.
    pub fn new(num: u16, den: u16) -> Option<Self> {
        NonZeroU16::new(den).map(|den| Gain { num, den })
    }
    /// Returns an integer gain.
    pub const fn integer(num: u16) -> Self {
        Gain { num, den: unsafe { NonZeroU16::new_unchecked(1) } }
    }
    /// Returns the `(numerator, denominator)` tuple.
    pub fn ratio(self) -> (u16, u16) {
        (self.num, self.den.get())
    }
    /// Applies the gain to a centered `sample`.
    #[inline]
    pub fn apply(self, sample: i32) -> i32 {
        let amp = i64::from(sample) * i64::from(self.num) / i64::from(self.den.get());
        amp.max(i32::MIN as i64).min(i32::MAX as i64) as i32
    }
}

impl Quantizer {
    /// Returns a new quantizer for samples of the given bit depth.
    ///
    /// Returns an error if `bits_per_sample` is neither 8 nor 16.
    pub fn new(bits_per_sample: u16) -> io::Result<Self> {
        check_bits_per_sample(bits_per_sample)?;
        Ok(Quantizer::from_mid(1 << (bits_per_sample - 1)))
    }

    pub(crate) fn from_mid(mid: i32) -> Self {
        Quantizer {
            lo: mid * 3 / 5 - mid,
            hi: mid * 7 / 5 - mid,
            gain: Gain::UNITY
        }
    }
    /// Returns a copy of this quantizer with the given pre-amplification `gain`.
    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }
    /// Returns the pre-amplification gain.
    pub fn gain(&self) -> Gain {
        self.gain
    }
    /// Returns the `(lo, hi)` thresholds.
    pub fn thresholds(&self) -> (i32, i32) {
        (self.lo, self.hi)
    }
    /// Classifies a centered `sample` after applying the gain.
    #[inline]
    pub fn classify(&self, sample: i32) -> Level {
        let amp = self.gain.apply(sample);
        if amp < self.lo {
            Level::Low
        }
        else if amp > self.hi {
            Level::High
        }
        else {
            Level::Mid
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use super::*;

    #[test]
    fn quantizer_8bit_works() {
        let q = Quantizer::new(8).unwrap();
        assert_eq!((-52, 51), q.thresholds());
        // unsigned 75 and 76 sit on both sides of the low threshold
        assert_eq!(Level::Low, q.classify(75 - 128));
        assert_eq!(Level::Mid, q.classify(76 - 128));
        assert_eq!(Level::Mid, q.classify(0));
        assert_eq!(Level::Mid, q.classify(179 - 128));
        assert_eq!(Level::High, q.classify(180 - 128));
        assert_eq!(Level::Low, q.classify(-128));
        assert_eq!(Level::High, q.classify(127));
    }

    #[test]
    fn quantizer_16bit_works() {
        let q = Quantizer::new(16).unwrap();
        assert_eq!((-13108, 13107), q.thresholds());
        assert_eq!(Level::Low, q.classify(-13109));
        assert_eq!(Level::Mid, q.classify(-13108));
        assert_eq!(Level::Mid, q.classify(13107));
        assert_eq!(Level::High, q.classify(13108));
        assert_eq!(Level::Low, q.classify(i16::MIN.into()));
        assert_eq!(Level::High, q.classify(i16::MAX.into()));
    }

    #[test]
    fn quantizer_rejects_bit_depths() {
        for bits in [0u16, 1, 4, 12, 24, 32].iter() {
            assert_eq!(io::ErrorKind::InvalidInput, Quantizer::new(*bits).unwrap_err().kind());
        }
    }

    #[test]
    fn quantizer_gain_works() {
        let q = Quantizer::new(8).unwrap().with_gain(Gain::KCS);
        assert_eq!((7, 5), q.gain().ratio());
        // 40 * 7 / 5 = 56
        assert_eq!(Level::High, q.classify(40));
        assert_eq!(Level::Low, q.classify(-40));
        assert_eq!(Level::Mid, q.classify(35));
        let q = q.with_gain(Gain::KCS_LEGACY);
        assert_eq!(Level::High, q.classify(7));
        assert_eq!(Level::Mid, q.classify(6));
        assert_eq!(None, Gain::new(1, 0));
        assert_eq!(Some(Gain::UNITY), Gain::new(1, 1));
        assert_eq!(i32::MAX, Gain::integer(u16::MAX).apply(i32::MAX));
    }

    #[test]
    fn high_run_works() {
        let mut run = HighRun::default();
        assert_eq!(None, run.push(Level::Low));
        assert_eq!(None, run.push(Level::High));
        assert_eq!(None, run.push(Level::High));
        assert_eq!(2, run.current());
        assert_eq!(Some(2), run.push(Level::Mid));
        assert_eq!(None, run.push(Level::Low));
        assert_eq!(None, run.push(Level::High));
        run.reset();
        assert_eq!(None, run.push(Level::Low));
    }

    #[test]
    fn quantizer_is_pure() {
        let mut rng = thread_rng();
        for &bits in [8u16, 16].iter() {
            let q = Quantizer::new(bits).unwrap();
            let mid = 1i32 << (bits - 1);
            let samples: Vec<i32> = (0..1000).map(|_| rng.gen_range(-mid..mid)).collect();
            let first: Vec<Level> = samples.iter().map(|&s| q.classify(s)).collect();
            let second: Vec<Level> = samples.iter().rev().map(|&s| q.classify(s)).collect();
            assert!(first.iter().eq(second.iter().rev()));
            assert_eq!(q, Quantizer::new(bits).unwrap());
        }
    }
}
