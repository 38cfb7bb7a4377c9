/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use std::io;

use cmtrusty_core::audio::PcmFormat;
use cmtrusty_core::bits::{Bit, BitSink};
use cmtrusty_core::frame::FrameFormat;

use super::HalfCycleConfig;

/// The default number of leader bits written by [KcsEncoder].
pub const DEFAULT_LEADER_BITS: u32 = 200;

/// Renders byte streams as frequency-class encoded square waves.
///
/// A `0` is a single cycle of the `0` tone, a `1` two cycles of the `1` tone, each cycle
/// starting with the low half.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KcsEncoder {
    zero_half: u32,
    one_half: u32,
    leader: u32,
    amplitude: i32,
}

impl KcsEncoder {
    pub fn new(format: &PcmFormat, config: &HalfCycleConfig) -> Self {
        let (zero_half, one_half) = config.half_cycles(format.sample_rate);
        KcsEncoder {
            zero_half, one_half,
            leader: DEFAULT_LEADER_BITS,
            amplitude: format.amplitude_max() * 3 / 4
        }
    }
    pub fn with_leader(mut self, leader: u32) -> Self {
        self.leader = leader;
        self
    }
    /// Writes each file of `files` as a leader of `1` bits followed by data frames
    /// and an end of file frame.
    pub fn encode_files<'a, I, S>(&self, files: I, mut sink: S) -> io::Result<()>
        where I: IntoIterator<Item=&'a [u8]>,
              S: BitSink
    {
        for data in files {
            sink.write_bits(core::iter::repeat(Bit::One).take(self.leader as usize))?;
            for &byte in data {
                FrameFormat::UART.encode(byte, &mut sink)?;
            }
            sink.write_bits(core::iter::repeat(Bit::One).take(FrameFormat::UART.frame_len()))?;
        }
        Ok(())
    }
    /// Returns samples of the encoded `bits` surrounded by silence. [Bit::Error] markers are skipped.
    pub fn encode_bits<I: IntoIterator<Item=Bit>>(&self, bits: I) -> Vec<i32> {
        let silence = core::iter::repeat(0).take(4 * self.zero_half as usize);
        let mut samples: Vec<i32> = silence.clone().collect();
        for bit in bits {
            let (half, cycles) = match bit {
                Bit::Zero => (self.zero_half, 1),
                Bit::One => (self.one_half, 2),
                Bit::Error => continue
            };
            for _ in 0..cycles {
                samples.extend(core::iter::repeat(-self.amplitude).take(half as usize));
                samples.extend(core::iter::repeat(self.amplitude).take(half as usize));
            }
        }
        samples.extend(silence);
        samples
    }
}
