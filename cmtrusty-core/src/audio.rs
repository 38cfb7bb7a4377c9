/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! PCM audio input description and sample quantization.
use std::io;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use crate::bits::BitSink;
use crate::error::{decode_error, DecodeErrorKind};

mod sample;

pub use sample::*;

/// The format of a linear PCM audio stream.
///
/// Only integer samples of 8 or 16 bits are accepted. Samples are expected to be centered
/// around zero, e.g. an unsigned 8-bit sample `v` should be provided as `v - 128`.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PcmFormat {
    /// The number of sample frames per second.
    pub sample_rate: u32,
    /// The number of bits per sample, either 8 or 16.
    pub bits_per_sample: u16,
    /// The number of interleaved channels, only the first one is decoded.
    pub channels: u16,
}

impl PcmFormat {
    /// Validates the format parameters and returns a new `PcmFormat`.
    ///
    /// Returns an error with [DecodeErrorKind::UnsupportedInput] if any of the parameters
    /// is out of the supported range.
    pub fn new(sample_rate: u32, bits_per_sample: u16, channels: u16) -> io::Result<Self> {
        if sample_rate == 0 {
            return Err(decode_error(DecodeErrorKind::UnsupportedInput,
                                    "sample rate must not be 0"))
        }
        if channels == 0 {
            return Err(decode_error(DecodeErrorKind::UnsupportedInput,
                                    "no audio channels"))
        }
        check_bits_per_sample(bits_per_sample)?;
        Ok(PcmFormat { sample_rate, bits_per_sample, channels })
    }
    /// Creates a mono format.
    pub fn mono(sample_rate: u32, bits_per_sample: u16) -> io::Result<Self> {
        PcmFormat::new(sample_rate, bits_per_sample, 1)
    }
    /// Returns the quantizer for samples of this format.
    pub fn quantizer(&self) -> Quantizer {
        Quantizer::from_mid(self.amplitude_mid())
    }
    /// Returns the half of the amplitude range: `2^(bits - 1)`.
    pub fn amplitude_mid(&self) -> i32 {
        1 << (self.bits_per_sample - 1)
    }
    /// Returns the largest positive sample value.
    pub fn amplitude_max(&self) -> i32 {
        self.amplitude_mid() - 1
    }
    /// Returns the smallest negative sample value.
    pub fn amplitude_min(&self) -> i32 {
        -self.amplitude_mid()
    }
}

/// A demodulator turning a stream of centered audio samples into bits.
pub trait SampleDemodulator {
    /// Processes a single centered `sample`, writing any completed bits to the `sink`.
    fn push_sample<S: BitSink>(&mut self, sample: i32, sink: S) -> io::Result<()>;
    /// Flushes the terminal state at the end of input.
    fn finish<S: BitSink>(&mut self, _sink: S) -> io::Result<()> {
        Ok(())
    }
    /// Processes all `samples` and then calls [SampleDemodulator::finish].
    fn demodulate<I, S>(&mut self, samples: I, mut sink: S) -> io::Result<()>
        where Self: Sized,
              I: IntoIterator<Item=i32>,
              S: BitSink
    {
        for sample in samples {
            self.push_sample(sample, &mut sink)?;
        }
        self.finish(sink)
    }
}

pub(crate) fn check_bits_per_sample(bits: u16) -> io::Result<()> {
    match bits {
        8|16 => Ok(()),
        _ => Err(decode_error(DecodeErrorKind::UnsupportedInput,
                              format!("unsupported bits per sample: {}", bits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoErrorExt;

    #[test]
    fn pcm_format_works() {
        let fmt = PcmFormat::mono(48000, 8).unwrap();
        assert_eq!(128, fmt.amplitude_mid());
        assert_eq!(127, fmt.amplitude_max());
        assert_eq!(-128, fmt.amplitude_min());
        assert_eq!((-52, 51), fmt.quantizer().thresholds());
        let fmt = PcmFormat::new(44100, 16, 2).unwrap();
        assert_eq!(32768, fmt.amplitude_mid());
        assert_eq!((-13108, 13107), fmt.quantizer().thresholds());
        for (rate, bits, chans) in [(0, 8, 1), (48000, 24, 1), (48000, 32, 1), (48000, 16, 0)].iter() {
            let err = PcmFormat::new(*rate, *bits, *chans).unwrap_err();
            assert_eq!(io::ErrorKind::InvalidInput, err.kind());
            assert_eq!(Some(DecodeErrorKind::UnsupportedInput), err.decode_error_kind());
        }
    }
}
