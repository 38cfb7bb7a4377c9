/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! UART-style bit framing.
//!
//! A frame consists of a start bit, 8 data bits and up to 2 stop bits. A [FrameFormat] describes
//! the expected marker values, the data bit order and the end of data sentinel.
//! A [FrameReader] groups bits from a [BitSource] into [Frame]s.
use core::fmt;
use std::io;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use crate::bits::{Bit, BitSink, BitSource};

/// The maximum number of bits in a frame.
pub const MAX_FRAME_BITS: usize = 1 + 8 + 2;

/// The order of data bits in a frame.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitOrder {
    LsbFirst,
    MsbFirst,
}

/// How stop bit violations are handled.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StopCheck {
    /// A stop bit violation invalidates the frame.
    Strict,
    /// A stop bit violation is logged and the data byte is accepted.
    Lenient,
}

/// The layout of a frame.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameFormat {
    start: Bit,
    stop: Bit,
    stop_bits: u8,
    order: BitOrder,
    sentinel: Option<Bit>,
    stop_check: StopCheck,
}

/// The reason a frame was rejected.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameViolation {
    StartBit,
    StopBit,
    /// The frame contains a [Bit::Error] marker.
    ErrorBit,
}

/// The result of decoding a single frame.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Frame {
    Byte(u8),
    /// A frame of uniform sentinel bits marking the end of data.
    Sentinel,
    Invalid(FrameViolation),
}

impl fmt::Display for FrameViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FrameViolation::StartBit => "invalid start bit",
            FrameViolation::StopBit => "invalid stop bits",
            FrameViolation::ErrorBit => "unsynchronized bit",
        })
    }
}

impl Frame {
    pub fn byte(self) -> Option<u8> {
        match self {
            Frame::Byte(byte) => Some(byte),
            _ => None
        }
    }
    pub fn is_sentinel(self) -> bool {
        self == Frame::Sentinel
    }
}

impl FrameFormat {
    /// Start bit 0, LSB first data, two stop bits 1, a frame of all 1s ends data.
    pub const UART: FrameFormat = FrameFormat {
        start: Bit::Zero,
        stop: Bit::One,
        stop_bits: 2,
        order: BitOrder::LsbFirst,
        sentinel: Some(Bit::One),
        stop_check: StopCheck::Strict
    };
    /// The UART layout without a sentinel, tolerating corrupted stop bits.
    pub const UART_LENIENT: FrameFormat = FrameFormat {
        sentinel: None,
        stop_check: StopCheck::Lenient,
        ..FrameFormat::UART
    };
    /// A 9-bit group: start bit 1, MSB first data, no stop bits.
    pub const GROUP9: FrameFormat = FrameFormat {
        start: Bit::One,
        stop: Bit::One,
        stop_bits: 0,
        order: BitOrder::MsbFirst,
        sentinel: None,
        stop_check: StopCheck::Strict
    };

    pub fn with_start(mut self, start: Bit) -> Self {
        self.start = start;
        self
    }
    /// # Panics
    /// Panics if `stop_bits` is larger than 2.
    pub fn with_stop_bits(mut self, stop: Bit, stop_bits: u8) -> Self {
        assert!(stop_bits <= 2, "at most 2 stop bits are supported");
        self.stop = stop;
        self.stop_bits = stop_bits;
        self
    }
    pub fn with_order(mut self, order: BitOrder) -> Self {
        self.order = order;
        self
    }
    pub fn with_sentinel(mut self, sentinel: Option<Bit>) -> Self {
        self.sentinel = sentinel;
        self
    }
    pub fn with_stop_check(mut self, stop_check: StopCheck) -> Self {
        self.stop_check = stop_check;
        self
    }
    pub fn start(&self) -> Bit {
        self.start
    }
    pub fn order(&self) -> BitOrder {
        self.order
    }
    pub fn sentinel(&self) -> Option<Bit> {
        self.sentinel
    }
    /// Returns the number of bits in a frame.
    pub fn frame_len(&self) -> usize {
        1 + 8 + self.stop_bits as usize
    }
    /// Decodes a single frame from the first [FrameFormat::frame_len] `bits`.
    ///
    /// # Panics
    /// Panics if `bits` is shorter than the frame.
    pub fn decode(&self, bits: &[Bit]) -> Frame {
        let bits = &bits[..self.frame_len()];
        if let Some(sentinel) = self.sentinel {
            if bits.iter().all(|&b| b == sentinel) {
                return Frame::Sentinel
            }
        }
        if bits.iter().any(|b| b.is_error()) {
            return Frame::Invalid(FrameViolation::ErrorBit)
        }
        if bits[0] != self.start {
            return Frame::Invalid(FrameViolation::StartBit)
        }
        let byte = self.data_byte(&bits[1..9]);
        if bits[9..].iter().any(|&b| b != self.stop) {
            match self.stop_check {
                StopCheck::Strict => return Frame::Invalid(FrameViolation::StopBit),
                StopCheck::Lenient => {
                    warn!("ignoring corrupted stop bits of: {:08b} ({:02X})", byte, byte);
                }
            }
        }
        Frame::Byte(byte)
    }
    /// Assembles a data byte from 8 data bits in this format's bit order.
    pub fn data_byte(&self, data: &[Bit]) -> u8 {
        data.iter().take(8).enumerate().fold(0u8, |acc, (i, bit)| {
            let shift = match self.order {
                BitOrder::LsbFirst => i,
                BitOrder::MsbFirst => 7 - i
            };
            acc | bit.data() << shift
        })
    }
    /// Writes a frame carrying `byte` to the `sink`.
    pub fn encode<S: BitSink>(&self, byte: u8, mut sink: S) -> io::Result<()> {
        sink.write_bit(self.start)?;
        for i in 0..8 {
            let shift = match self.order {
                BitOrder::LsbFirst => i,
                BitOrder::MsbFirst => 7 - i
            };
            sink.write_bit(Bit::from(byte & (1 << shift) != 0))?;
        }
        for _ in 0..self.stop_bits {
            sink.write_bit(self.stop)?;
        }
        Ok(())
    }
}

/// Groups bits from a [BitSource] into frames.
#[derive(Debug)]
pub struct FrameReader<S> {
    src: S,
    format: FrameFormat,
    pending: Option<Bit>,
    bits_read: u64,
}

impl<S> FrameReader<S> {
    pub fn new(src: S, format: FrameFormat) -> Self {
        FrameReader { src, format, pending: None, bits_read: 0 }
    }
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }
    /// Returns the number of bits consumed from the source so far.
    pub fn bits_read(&self) -> u64 {
        self.bits_read
    }
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.src
    }
    pub fn into_inner(self) -> S {
        self.src
    }
}

impl<S: BitSource> FrameReader<S> {
    fn read_bit(&mut self) -> io::Result<Option<Bit>> {
        if let Some(bit) = self.pending.take() {
            return Ok(Some(bit))
        }
        let bit = self.src.read_bit()?;
        if bit.is_some() {
            self.bits_read += 1;
        }
        Ok(bit)
    }
    /// Skips the leader of `lead` bits preceding the first frame.
    ///
    /// The leader ends at the first bit which is neither `lead` nor [Bit::Error], but only after
    /// at least `min` bits were counted. Before that every bit counts as a part of the leader.
    /// The count starts at `carried`, e.g. the length of a sentinel frame which
    /// begins the next leader.
    ///
    /// Returns the leader length or `None` if the stream ended. The bit which ended the leader
    /// becomes the first bit of the next frame.
    pub fn skip_leader(&mut self, lead: Bit, min: u64, carried: u64) -> io::Result<Option<u64>> {
        let mut count = carried;
        while let Some(bit) = self.read_bit()? {
            if bit != lead && !bit.is_error() && count >= min {
                self.pending = Some(bit);
                return Ok(Some(count))
            }
            count += 1;
        }
        Ok(None)
    }
    /// Reads and decodes the next frame.
    ///
    /// Returns `None` at the end of the stream. A partial frame at the end of the stream
    /// is discarded.
    pub fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        let mut bits = [Bit::Zero; MAX_FRAME_BITS];
        let len = self.format.frame_len();
        for n in 0..len {
            match self.read_bit()? {
                Some(bit) => bits[n] = bit,
                None => {
                    if n != 0 {
                        debug!("discarding a partial frame of {} bits", n);
                    }
                    return Ok(None)
                }
            }
        }
        Ok(Some(self.format.decode(&bits[..len])))
    }
}

#[cfg(test)]
mod tests {
    use crate::bits::{bits_from_str, BitIter};
    use super::*;

    #[test]
    fn frame_decode_works() {
        let uart = FrameFormat::UART;
        assert_eq!(11, uart.frame_len());
        // 0x65 LSB first: 1,0,1,0,0,1,1,0
        assert_eq!(Frame::Byte(0x65), uart.decode(&bits_from_str("0 10100110 11")));
        assert_eq!(Frame::Sentinel, uart.decode(&bits_from_str("1 11111111 11")));
        assert_eq!(Frame::Invalid(FrameViolation::StartBit), uart.decode(&bits_from_str("1 10100110 11")));
        assert_eq!(Frame::Invalid(FrameViolation::StopBit), uart.decode(&bits_from_str("0 10100110 10")));
        assert_eq!(Frame::Invalid(FrameViolation::ErrorBit), uart.decode(&bits_from_str("0 101E0110 11")));
        let lenient = FrameFormat::UART_LENIENT;
        assert_eq!(Frame::Byte(0x65), lenient.decode(&bits_from_str("0 10100110 01")));
        assert_eq!(Frame::Invalid(FrameViolation::StartBit), lenient.decode(&bits_from_str("1 11111111 11")));
        let group = FrameFormat::GROUP9;
        assert_eq!(9, group.frame_len());
        assert_eq!(Frame::Byte(0x65), group.decode(&bits_from_str("1 01100101")));
        assert_eq!(Frame::Invalid(FrameViolation::StartBit), group.decode(&bits_from_str("0 01100101")));
        let zeros = uart.with_sentinel(Some(Bit::Zero));
        assert_eq!(Frame::Sentinel, zeros.decode(&bits_from_str("0 00000000 00")));
        assert_eq!(Some(0x65), Frame::Byte(0x65).byte());
        assert_eq!(None, Frame::Sentinel.byte());
    }

    #[test]
    fn frame_encode_works() -> io::Result<()> {
        for format in [FrameFormat::UART, FrameFormat::GROUP9,
                       FrameFormat::UART.with_order(BitOrder::MsbFirst)].iter() {
            for byte in 0..=255u8 {
                let mut bits = Vec::new();
                format.encode(byte, &mut bits)?;
                assert_eq!(format.frame_len(), bits.len());
                assert_eq!(Frame::Byte(byte), format.decode(&bits));
            }
        }
        let mut bits = Vec::new();
        FrameFormat::GROUP9.encode(0x65, &mut bits)?;
        assert_eq!(bits_from_str("101100101"), bits);
        Ok(())
    }

    #[test]
    fn frame_reader_works() -> io::Result<()> {
        let bits = bits_from_str("1111E11 0 10100110 11 1 11111111 11 111 0 00000000 11 0101");
        let mut reader = FrameReader::new(BitIter::new(bits), FrameFormat::UART);
        assert_eq!(Some(7), reader.skip_leader(Bit::One, 0, 0)?);
        assert_eq!(Some(Frame::Byte(0x65)), reader.next_frame()?);
        assert_eq!(Some(Frame::Sentinel), reader.next_frame()?);
        assert_eq!(Some(14), reader.skip_leader(Bit::One, 0, 11)?);
        assert_eq!(Some(Frame::Byte(0)), reader.next_frame()?);
        assert_eq!(None, reader.next_frame()?);
        assert_eq!(None, reader.next_frame()?);
        assert_eq!(None, reader.skip_leader(Bit::One, 0, 0)?);
        assert_eq!(7 + 11 + 11 + 3 + 11 + 4, reader.bits_read());
        Ok(())
    }

    #[test]
    fn frame_reader_minimum_leader_works() -> io::Result<()> {
        let mut bits = bits_from_str("0000");
        bits.extend(core::iter::repeat(Bit::One).take(6));
        bits.extend(bits_from_str("0 10100110 11"));
        let mut reader = FrameReader::new(BitIter::new(bits.clone()), FrameFormat::UART);
        assert_eq!(Some(10), reader.skip_leader(Bit::One, 8, 0)?);
        assert_eq!(Some(Frame::Byte(0x65)), reader.next_frame()?);
        let mut reader = FrameReader::new(BitIter::new(bits), FrameFormat::UART);
        assert_eq!(Some(0), reader.skip_leader(Bit::One, 0, 0)?);
        assert_eq!(Some(Frame::Invalid(FrameViolation::StopBit)), reader.next_frame()?);
        Ok(())
    }
}
