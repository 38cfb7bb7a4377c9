/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use std::io;

use cmtrusty_core::audio::PcmFormat;
use cmtrusty_core::bits::{Bit, BitSink};
use cmtrusty_core::frame::FrameFormat;

use super::{FB_ZERO_HZ, FB_ONE_HZ};
use super::blocks::*;

/// Writes the bits of a tape `block` preceded by `leader` zero bits to the `sink`.
///
/// The recorded checksum is computed from the block payload.
pub fn encode_block<S: BitSink>(block: &FbBlock, leader: u32, sink: S) -> io::Result<()> {
    let checksum = match block {
        FbBlock::Info(info) => cmtrusty_core::checksum::sum16(info.to_bytes().iter()),
        FbBlock::Data(data) => cmtrusty_core::checksum::sum16(&data.bytes),
    };
    encode_block_with_checksum(block, leader, checksum, sink)
}

/// Writes the bits of a tape `block` with the given recorded `checksum`.
pub fn encode_block_with_checksum<S: BitSink>(
        block: &FbBlock,
        leader: u32,
        checksum: u16,
        mut sink: S
    ) -> io::Result<()>
{
    let repeat = |bit: Bit, count: usize| core::iter::repeat(bit).take(count);
    sink.write_bits(repeat(Bit::Zero, leader as usize))?;
    sink.write_bits(repeat(Bit::One, TAPE_MARK_BITS))?;
    let info_bytes;
    let payload: &[u8] = match block {
        FbBlock::Info(info) => {
            sink.write_bits(repeat(Bit::One, KIND_MARK_BITS))?;
            sink.write_bits(repeat(Bit::Zero, INFO_GAP_BITS))?;
            info_bytes = info.to_bytes();
            &info_bytes
        }
        FbBlock::Data(data) => {
            sink.write_bits(repeat(Bit::Zero, KIND_MARK_BITS))?;
            &data.bytes
        }
    };
    sink.write_bit(Bit::One)?;
    for &byte in payload.iter().chain(checksum.to_le_bytes().iter()) {
        FrameFormat::GROUP9.encode(byte, &mut sink)?;
    }
    sink.write_bit(Bit::One)
}

/// Renders **FB** bits as square pulses: the high half-cycle first, then the low one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FbPulseEncoder {
    zero: (u32, u32),
    one: (u32, u32),
    amplitude: i32,
}

impl FbPulseEncoder {
    pub fn new(format: &PcmFormat) -> Self {
        let cycle = |hz: u32| {
            let samples = format.sample_rate / hz;
            ((samples + 1) / 2, samples / 2)
        };
        FbPulseEncoder {
            zero: cycle(FB_ZERO_HZ),
            one: cycle(FB_ONE_HZ),
            amplitude: format.amplitude_max() * 3 / 4
        }
    }
    /// Returns the `(high, low)` sample counts of a `0` bit.
    pub fn zero_cycle(&self) -> (u32, u32) {
        self.zero
    }
    /// Returns the `(high, low)` sample counts of a `1` bit.
    pub fn one_cycle(&self) -> (u32, u32) {
        self.one
    }
    /// Returns samples of the encoded `bits`. [Bit::Error] markers are skipped.
    pub fn encode_bits<I: IntoIterator<Item=Bit>>(&self, bits: I) -> Vec<i32> {
        let mut samples = Vec::new();
        for bit in bits {
            let (high, low) = match bit {
                Bit::Zero => self.zero,
                Bit::One => self.one,
                Bit::Error => continue
            };
            samples.extend(core::iter::repeat(self.amplitude).take(high as usize));
            samples.extend(core::iter::repeat(-self.amplitude).take(low as usize));
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use cmtrusty_core::audio::SampleDemodulator;
    use cmtrusty_core::bits::{bits_from_str, BitIter};
    use cmtrusty_core::frame::Frame;
    use crate::fb::DurationDemodulator;
    use super::*;

    #[test]
    fn fb_pulse_encoder_works() -> io::Result<()> {
        let format = PcmFormat::mono(48000, 8)?;
        let encoder = FbPulseEncoder::new(&format);
        assert_eq!((13, 12), encoder.zero_cycle());
        assert_eq!((25, 25), encoder.one_cycle());
        let samples = encoder.encode_bits(bits_from_str("01E"));
        assert_eq!(75, samples.len());
        assert_eq!(95, samples[0]);
        assert_eq!(-95, samples[13]);
        Ok(())
    }

    #[test]
    fn fb_single_group_decodes() -> io::Result<()> {
        let format = PcmFormat::mono(48000, 8)?;
        let bits = bits_from_str("1 01100101");
        let samples = FbPulseEncoder::new(&format).encode_bits(bits.clone());
        let mut decoded = Vec::new();
        DurationDemodulator::new(&format).demodulate(samples, &mut decoded)?;
        assert_eq!(bits, decoded);
        let frame = FrameFormat::GROUP9.decode(&decoded);
        assert_eq!(Frame::Byte(0x65), frame);
        Ok(())
    }

    #[test]
    fn fb_round_trip_works() -> io::Result<()> {
        for &(rate, depth) in [(48000, 8), (44100, 16), (22050, 8)].iter() {
            let format = PcmFormat::mono(rate, depth)?;
            let info = FbInfo::new(0x01, "GAME", 300, 0x2000, 0x2000);
            let data = FbData::new(0x01, (0..300u32).map(|n| (n * 7) as u8).collect::<Vec<_>>());
            let blocks = vec![FbBlock::Info(info), FbBlock::Data(data)];
            let mut bits = Vec::new();
            for block in blocks.iter() {
                encode_block(block, 64, &mut bits)?;
            }
            let samples = FbPulseEncoder::new(&format).encode_bits(bits.clone());
            let mut decoded = Vec::new();
            DurationDemodulator::new(&format).demodulate(samples, &mut decoded)?;
            assert_eq!(bits, decoded);
            let mut reader = FbBlockReader::new(BitIter::new(decoded));
            assert_eq!(blocks, reader.read_blocks()?);
        }
        Ok(())
    }
}
