/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use std::io::{self, Write};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use cmtrusty_core::bits::{Bit, BitSource};
use cmtrusty_core::error::{decode_error, DecodeErrorKind};
use cmtrusty_core::frame::{Frame, FrameFormat, FrameReader, FrameViolation};

/// The minimum number of leader bits of the lenient stream decoder.
pub const LENIENT_LEADER_MIN: u64 = 101;

/// What happens on a frame violating the start or stop bits.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FramingPolicy {
    /// The decoding fails.
    Fatal,
    /// The current segment ends and the search for the next leader begins.
    Restart,
}

/// The configuration of a [ByteStreamDecoder].
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamConfig {
    /// The number of bits to skip before a start bit ends the leader.
    pub leader_min: u64,
    pub framing: FramingPolicy,
}

/// How a segment of data ended.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentEnd {
    /// A frame of all `1` bits.
    Sentinel,
    /// A frame violating the start or stop bits under [FramingPolicy::Restart].
    Invalid(FrameViolation),
    /// The end of the bit stream.
    EndOfStream,
}

/// A continuous run of decoded bytes.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteSegment {
    /// The offset of the first byte in the output.
    pub offset: usize,
    pub length: usize,
    /// The number of leader bits preceding the segment.
    pub leader: u64,
    pub end: SegmentEnd,
}

/// Decodes UART framed bytes from a bit stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteStreamDecoder {
    config: StreamConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig::strict()
    }
}

impl StreamConfig {
    /// Any bit other than `1` ends the leader and framing errors are fatal.
    pub fn strict() -> Self {
        StreamConfig { leader_min: 0, framing: FramingPolicy::Fatal }
    }
    /// The leader must be longer than 100 bits and framing errors restart the leader search.
    ///
    /// Suitable for noisy recordings.
    pub fn lenient() -> Self {
        StreamConfig { leader_min: LENIENT_LEADER_MIN, framing: FramingPolicy::Restart }
    }
}

impl ByteStreamDecoder {
    pub fn new(config: StreamConfig) -> Self {
        ByteStreamDecoder { config }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
    /// Decodes bytes from `src` and writes them to `out` until the end of the stream.
    ///
    /// Returns the decoded segments.
    pub fn decode<S: BitSource, W: Write>(&self, src: S, mut out: W) -> io::Result<Vec<ByteSegment>> {
        let format = FrameFormat::UART;
        let mut reader = FrameReader::new(src, format);
        let mut segments = Vec::new();
        let mut offset = 0;
        let mut carried = 0;
        while let Some(leader) = reader.skip_leader(Bit::One, self.config.leader_min, carried)? {
            info!("start of data at {:04x}, leader: {} bits", offset, leader);
            let mut length = 0;
            let end = loop {
                match reader.next_frame()? {
                    Some(Frame::Byte(byte)) => {
                        out.write_all(&[byte])?;
                        length += 1;
                    }
                    Some(Frame::Sentinel) => break SegmentEnd::Sentinel,
                    Some(Frame::Invalid(violation)) => match self.config.framing {
                        FramingPolicy::Fatal => {
                            return Err(decode_error(DecodeErrorKind::Framing,
                                format!("{} at {:04x}", violation, offset + length)))
                        }
                        FramingPolicy::Restart => {
                            warn!("{} at {:04x}", violation, offset + length);
                            break SegmentEnd::Invalid(violation)
                        }
                    }
                    None => break SegmentEnd::EndOfStream
                }
            };
            info!("end of data at {:04x}, {:04x} bytes, {:?}", offset + length, length, end);
            segments.push(ByteSegment { offset, length, leader, end });
            offset += length;
            if end == SegmentEnd::EndOfStream {
                break
            }
            carried = format.frame_len() as u64;
        }
        info!("end of stream, {} segments, {} bytes", segments.len(), offset);
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use cmtrusty_core::bits::{bits_from_str, BitIter, BitSink};
    use cmtrusty_core::error::IoErrorExt;
    use super::*;

    fn framed(leader: usize, data: &[u8], bits: &mut Vec<Bit>) {
        bits.write_bits(core::iter::repeat(Bit::One).take(leader)).unwrap();
        for &byte in data {
            FrameFormat::UART.encode(byte, &mut *bits).unwrap();
        }
    }

    #[test]
    fn strict_stream_works() -> io::Result<()> {
        let mut bits = Vec::new();
        framed(20, b"AB", &mut bits);
        framed(30, b"xyz", &mut bits);
        bits.extend(bits_from_str("0101"));
        let mut out = Vec::new();
        let segments = ByteStreamDecoder::new(StreamConfig::strict()).decode(BitIter::new(bits), &mut out)?;
        assert_eq!(b"ABxyz", &out[..]);
        assert_eq!(vec![
            ByteSegment { offset: 0, length: 2, leader: 20, end: SegmentEnd::Sentinel },
            ByteSegment { offset: 2, length: 3, leader: 30, end: SegmentEnd::EndOfStream }
        ], segments);
        Ok(())
    }

    #[test]
    fn strict_stream_framing_is_fatal() {
        let mut bits = Vec::new();
        framed(20, b"AB", &mut bits);
        bits[20 + 11 + 9] = Bit::Zero;
        let mut out = Vec::new();
        let err = ByteStreamDecoder::new(StreamConfig::strict())
                  .decode(BitIter::new(bits.clone()), &mut out).unwrap_err();
        assert_eq!(Some(DecodeErrorKind::Framing), err.decode_error_kind());
        assert_eq!(b"A", &out[..]);

        bits[20 + 11 + 9] = Bit::Error;
        let err = ByteStreamDecoder::new(StreamConfig::strict())
                  .decode(BitIter::new(bits), io::sink()).unwrap_err();
        assert_eq!(Some(DecodeErrorKind::Framing), err.decode_error_kind());
    }

    #[test]
    fn lenient_stream_works() -> io::Result<()> {
        let mut bits = bits_from_str("0E00");
        framed(120, b"HELLO", &mut bits);
        // a corrupted start bit ends the segment
        bits.extend(bits_from_str("1 00000000 11"));
        framed(100, b"AGAIN", &mut bits);
        framed(11, b"", &mut bits);
        let mut out = Vec::new();
        let segments = ByteStreamDecoder::new(StreamConfig::lenient()).decode(BitIter::new(bits), &mut out)?;
        assert_eq!(b"HELLOAGAIN", &out[..]);
        assert_eq!(2, segments.len());
        assert_eq!(ByteSegment { offset: 0, length: 5, leader: 124,
                                 end: SegmentEnd::Invalid(FrameViolation::StartBit) }, segments[0]);
        assert_eq!(ByteSegment { offset: 5, length: 5, leader: 111, end: SegmentEnd::Sentinel }, segments[1]);
        Ok(())
    }

    #[test]
    fn empty_stream_works() -> io::Result<()> {
        let segments = ByteStreamDecoder::new(StreamConfig::default())
                       .decode(BitIter::new(bits_from_str("1111111")), io::sink())?;
        assert!(segments.is_empty());
        Ok(())
    }
}
