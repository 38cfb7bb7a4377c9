/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use std::io;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use cmtrusty_core::audio::{HighRun, Level, PcmFormat, Quantizer, SampleDemodulator};
use cmtrusty_core::bits::{Bit, BitSink};
use cmtrusty_core::window::Window;

use super::{HalfCycleConfig, HalfCycleVariant, NoisePolicy};

/// The lookback state of a `1` bit which spans two half-cycles.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PendingOne {
    Idle,
    /// A single `1` half-cycle was received.
    Pending,
}

/// The classification of a measured half-cycle.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HalfCycle {
    Zero,
    One,
    Noise,
}

/// Demodulates frequency-class encoded samples by measuring half-cycles.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct HalfCycleDemodulator {
    quantizer: Quantizer,
    zero: Window,
    one: Window,
    variant: HalfCycleVariant,
    noise: NoisePolicy,
    interval: Option<u32>,
    run: HighRun,
    pending: PendingOne,
    errors: u64,
}

impl HalfCycleDemodulator {
    /// Creates a demodulator for the given audio `format`.
    ///
    /// Returns an error if the sample rate is too low for the configured tones.
    pub fn new(format: &PcmFormat, config: &HalfCycleConfig) -> io::Result<Self> {
        let (zero, one) = config.windows(format.sample_rate)?;
        Ok(HalfCycleDemodulator {
            quantizer: format.quantizer().with_gain(config.gain),
            zero, one,
            variant: config.variant,
            noise: config.noise,
            interval: None,
            run: HighRun::default(),
            pending: PendingOne::Idle,
            errors: 0
        })
    }
    /// Returns the `0` and `1` half-cycle windows.
    pub fn windows(&self) -> (Window, Window) {
        (self.zero, self.one)
    }
    pub fn pending(&self) -> PendingOne {
        self.pending
    }
    /// Returns the number of interrupted `1` bits so far.
    pub fn errors(&self) -> u64 {
        self.errors
    }
    /// Classifies a half-cycle `span` in samples.
    pub fn classify(&self, span: u32) -> HalfCycle {
        if self.zero.contains(span) {
            HalfCycle::Zero
        }
        else if self.one.contains(span) {
            HalfCycle::One
        }
        else {
            HalfCycle::Noise
        }
    }
    /// Processes a measured half-cycle `span`, writing any completed bits to the `sink`.
    pub fn push_half_cycle<S: BitSink>(&mut self, span: u32, mut sink: S) -> io::Result<()> {
        match (self.classify(span), self.pending) {
            (HalfCycle::Zero, PendingOne::Pending) => {
                self.pending = PendingOne::Idle;
                self.errors += 1;
                if self.variant == HalfCycleVariant::Windowed {
                    sink.write_bit(Bit::Error)?;
                }
                else {
                    trace!("dropping a half of 1");
                }
                sink.write_bit(Bit::Zero)
            }
            (HalfCycle::Zero, PendingOne::Idle) => sink.write_bit(Bit::Zero),
            (HalfCycle::One, PendingOne::Idle) => {
                self.pending = PendingOne::Pending;
                Ok(())
            }
            (HalfCycle::One, PendingOne::Pending) => {
                self.pending = PendingOne::Idle;
                sink.write_bit(Bit::One)
            }
            (HalfCycle::Noise, _) => {
                trace!("noise: {} samples", span);
                if self.noise == NoisePolicy::ResetPending {
                    self.pending = PendingOne::Idle;
                }
                Ok(())
            }
        }
    }

    fn push_level<S: BitSink>(&mut self, level: Level, sink: S) -> io::Result<()> {
        match level {
            Level::Low => {
                self.interval = Some(self.interval.map_or(0, |n| n.saturating_add(1)));
            }
            Level::Mid => {
                if let Some(n) = self.interval.as_mut() {
                    *n = n.saturating_add(1);
                }
            }
            Level::High => {
                if let Some(n) = self.interval.take() {
                    return self.push_half_cycle(n.saturating_add(1), sink)
                }
            }
        }
        Ok(())
    }
}

impl SampleDemodulator for HalfCycleDemodulator {
    fn push_sample<S: BitSink>(&mut self, sample: i32, sink: S) -> io::Result<()> {
        let level = self.quantizer.classify(sample);
        match self.variant {
            HalfCycleVariant::Windowed => self.push_level(level, sink),
            HalfCycleVariant::Legacy {..} => match self.run.push(level) {
                Some(run) => self.push_half_cycle(run, sink),
                None => Ok(())
            }
        }
    }

    fn finish<S: BitSink>(&mut self, _sink: S) -> io::Result<()> {
        if self.pending == PendingOne::Pending {
            debug!("dropping a pending half of 1 at the end of input");
            self.pending = PendingOne::Idle;
        }
        self.interval = None;
        self.run.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demod(config: HalfCycleConfig) -> HalfCycleDemodulator {
        let format = PcmFormat::mono(48000, 8).unwrap();
        HalfCycleDemodulator::new(&format, &config).unwrap()
    }

    fn spans(demod: &mut HalfCycleDemodulator, spans: &[u32]) -> Vec<Bit> {
        let mut bits = Vec::new();
        for &span in spans {
            demod.push_half_cycle(span, &mut bits).unwrap();
        }
        bits
    }

    #[test]
    fn pending_one_state_machine_works() {
        let mut kcs = demod(HalfCycleConfig::kcs());
        assert_eq!(PendingOne::Idle, kcs.pending());
        assert_eq!(vec![Bit::Zero], spans(&mut kcs, &[10]));
        assert_eq!(Vec::<Bit>::new(), spans(&mut kcs, &[5]));
        assert_eq!(PendingOne::Pending, kcs.pending());
        assert_eq!(vec![Bit::One], spans(&mut kcs, &[5]));
        assert_eq!(PendingOne::Idle, kcs.pending());
        assert_eq!(vec![Bit::Error, Bit::Zero], spans(&mut kcs, &[5, 10]));
        assert_eq!(1, kcs.errors());
        assert_eq!(vec![Bit::One, Bit::Zero], spans(&mut kcs, &[5, 5, 10]));
    }

    #[test]
    fn window_boundaries_work() {
        let mut kcs = demod(HalfCycleConfig::kcs());
        assert_eq!((Window::new(8, 12), Window::new(4, 6)), kcs.windows());
        assert_eq!(HalfCycle::Zero, kcs.classify(8));
        assert_eq!(HalfCycle::Zero, kcs.classify(12));
        assert_eq!(HalfCycle::Noise, kcs.classify(13));
        assert_eq!(HalfCycle::Noise, kcs.classify(7));
        assert_eq!(HalfCycle::One, kcs.classify(4));
        assert_eq!(HalfCycle::One, kcs.classify(6));
        assert_eq!(HalfCycle::Noise, kcs.classify(3));
        assert_eq!(vec![Bit::Zero, Bit::Zero, Bit::One, Bit::Zero],
                   spans(&mut kcs, &[8, 13, 12, 7, 3, 4, 6, 100, 10]));
    }

    #[test]
    fn noise_policy_works() {
        let mut keep = demod(HalfCycleConfig::msx());
        assert_eq!(vec![Bit::One], spans(&mut keep, &[10, 30, 10]));
        let mut reset = demod(HalfCycleConfig::msx().with_noise_policy(NoisePolicy::ResetPending));
        assert_eq!(Vec::<Bit>::new(), spans(&mut reset, &[10, 30, 10]));
        assert_eq!(PendingOne::Pending, reset.pending());
        assert_eq!(vec![Bit::Error, Bit::Zero], spans(&mut reset, &[20]));
    }

    #[test]
    fn legacy_variant_works() {
        let mut legacy = demod(HalfCycleConfig::kcs_legacy());
        assert_eq!(vec![Bit::Zero, Bit::One, Bit::Zero, Bit::Zero],
                   spans(&mut legacy, &[8, 3, 7, 2, 5, 1000, 10]));
    }

    #[test]
    fn sample_measurement_works() -> io::Result<()> {
        let mut kcs = demod(HalfCycleConfig::kcs());
        let mut samples = vec![0; 5];
        // 9 low and 1 mid samples up to the high edge: a span of 10
        samples.extend(vec![-100; 9]);
        samples.push(0);
        samples.extend(vec![100; 10]);
        // two spans of 5
        for _ in 0..2 {
            samples.extend(vec![-100; 5]);
            samples.extend(vec![100; 5]);
        }
        // a dangling half of 1
        samples.extend(vec![-100; 5]);
        samples.extend(vec![100; 5]);
        let mut bits = Vec::new();
        kcs.demodulate(samples, &mut bits)?;
        assert_eq!(vec![Bit::Zero, Bit::One], bits);
        assert_eq!(PendingOne::Idle, kcs.pending());
        Ok(())
    }
}
