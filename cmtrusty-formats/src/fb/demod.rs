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

use cmtrusty_core::audio::{HighRun, PcmFormat, Quantizer, SampleDemodulator};
use cmtrusty_core::bits::{Bit, BitSink};

use super::FbTiming;

/// Demodulates **FB** signal samples by measuring runs of high samples.
///
/// A run at least as long as the `1` threshold is a `1`, otherwise a run at least as long as
/// the `0` threshold is a `0`. Shorter runs are noise and are dropped. A threshold of 0
/// accepts every run.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DurationDemodulator {
    quantizer: Quantizer,
    zero_min: u32,
    one_min: u32,
    run: HighRun,
    dropped: u64,
}

impl DurationDemodulator {
    /// Creates a demodulator for the given audio `format` with the default timing.
    pub fn new(format: &PcmFormat) -> Self {
        DurationDemodulator::with_timing(format, &FbTiming::default())
    }

    pub fn with_timing(format: &PcmFormat, timing: &FbTiming) -> Self {
        let (zero_min, one_min) = timing.thresholds(format.sample_rate);
        debug!("FB thresholds: 0 >= {} samples, 1 >= {} samples", zero_min, one_min);
        DurationDemodulator {
            quantizer: format.quantizer(),
            zero_min,
            one_min,
            run: HighRun::default(),
            dropped: 0
        }
    }
    /// Returns the minimum run lengths of a `0` and a `1` bit.
    pub fn thresholds(&self) -> (u32, u32) {
        (self.zero_min, self.one_min)
    }
    /// Returns the number of runs dropped as noise so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
    /// Classifies a run of `run` high samples.
    pub fn classify(&self, run: u32) -> Option<Bit> {
        if run >= self.one_min {
            Some(Bit::One)
        }
        else if run >= self.zero_min {
            Some(Bit::Zero)
        }
        else {
            None
        }
    }
}

impl SampleDemodulator for DurationDemodulator {
    fn push_sample<S: BitSink>(&mut self, sample: i32, mut sink: S) -> io::Result<()> {
        if let Some(run) = self.run.push(self.quantizer.classify(sample)) {
            match self.classify(run) {
                Some(bit) => sink.write_bit(bit)?,
                None => {
                    trace!("dropping a run of {} samples", run);
                    self.dropped += 1;
                }
            }
        }
        Ok(())
    }

    fn finish<S: BitSink>(&mut self, _sink: S) -> io::Result<()> {
        if self.run.current() != 0 {
            debug!("dropping an unfinished run of {} samples", self.run.current());
            self.run.reset();
        }
        Ok(())
    }
}
