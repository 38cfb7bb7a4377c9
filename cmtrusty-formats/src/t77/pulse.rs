/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use std::io::{self, Read};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use nom::{
    IResult,
    bytes::complete::tag,
    combinator::verify,
    error::{context, VerboseError, VerboseErrorKind},
    number::complete::be_u8,
    sequence::tuple
};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use cmtrusty_core::bits::{Bit, BitSink};
use cmtrusty_core::error::{decode_error, DecodeErrorKind};
use cmtrusty_core::frame::MAX_FRAME_BITS;

use crate::ReadWordsEx;

/// The image signature preceding the version character.
pub const T77_SIGNATURE: &[u8] = b"XM7 TAPE IMAGE ";
/// The only supported version character.
pub const T77_VERSION: u8 = b'0';
/// The marker following the version character.
pub const T77_MARKER: &[u8] = &[0, 0];
/// The length of the image header in bytes.
pub const T77_HEADER_LEN: usize = 18;
/// The polarity flag of a pulse duration.
pub const POLARITY: u16 = 0x8000;
/// The nominal duration of a long pulse in ticks.
pub const LONG_PULSE: u16 = 0x30;
/// The nominal duration of a short pulse in ticks.
pub const SHORT_PULSE: u16 = 0x16;
/// The number of durations in a frame of 11 bit cells.
pub const GROUP_VALUES: usize = MAX_FRAME_BITS * 2;

const LONG_PULSE_MIN: u16 = LONG_PULSE - 11;
const LONG_PULSE_MAX: u16 = LONG_PULSE + 17;
const SHORT_PULSE_MIN: u16 = SHORT_PULSE - 3;
const SHORT_PULSE_MAX: u16 = SHORT_PULSE + 15;

fn t77_header(input: &[u8]) -> IResult<&[u8], u8, VerboseError<&[u8]>> {
    let (input, (_, version, _)) = tuple((
        context("signature", tag(T77_SIGNATURE)),
        context("version", verify(be_u8, |&v: &u8| v == T77_VERSION)),
        context("marker", tag(T77_MARKER))
    ))(input)?;
    Ok((input, version))
}

/// Validates the **T77** image `header`.
///
/// Returns an error with [DecodeErrorKind::UnsupportedInput] if the header is invalid or
/// the version isn't supported.
pub fn parse_t77_header(header: &[u8]) -> io::Result<()> {
    match t77_header(header) {
        Ok(..) => Ok(()),
        Err(nom::Err::Error(e))|Err(nom::Err::Failure(e)) => {
            let what = e.errors.iter().find_map(|(_, kind)| match kind {
                VerboseErrorKind::Context(ctx) => Some(*ctx),
                _ => None
            }).unwrap_or("header");
            Err(decode_error(DecodeErrorKind::UnsupportedInput,
                             format!("not a supported T77 image: invalid {}", what)))
        }
        Err(nom::Err::Incomplete(..)) => Err(decode_error(DecodeErrorKind::UnsupportedInput,
                                                          "truncated T77 header"))
    }
}

/// An iterator of pulse durations from a **T77** image.
///
/// Iteration ends at the end of the stream or on the first error. Use [T77Values::take_err]
/// to distinguish between both cases.
#[derive(Debug)]
pub struct T77Values<R> {
    rd: R,
    err: Option<io::Error>,
}

/// Reads and validates the **T77** header from `rd` and returns an iterator of pulse durations.
pub fn read_t77<R: Read>(mut rd: R) -> io::Result<T77Values<R>> {
    let mut header = [0u8; T77_HEADER_LEN];
    let len = rd.read_to_fill(&mut header)?;
    parse_t77_header(&header[..len])?;
    Ok(T77Values { rd, err: None })
}

impl<R> T77Values<R> {
    /// Returns the error which ended the iteration, if any.
    pub fn take_err(&mut self) -> Option<io::Error> {
        self.err.take()
    }
    pub fn into_inner(self) -> R {
        self.rd
    }
}

impl<R: Read> Iterator for T77Values<R> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.err.is_some() {
            return None
        }
        match self.rd.read_be_u16_or_end() {
            Ok(value) => value,
            Err(e) => {
                self.err = Some(e);
                None
            }
        }
    }
}

/// Demodulates **T77** pulse durations into frames of 11 bits.
///
/// Durations are collected in a window of 11 bit cells. A window with any cell of an
/// unexpected polarity is moved by one duration. A window with an unrecognized pulse or
/// invalid start and stop bits is moved by a whole cell. A window of valid cells is written
/// to the sink as 11 bits.
///
/// In the forward mode the first duration of a cell carries the polarity flag, in the reverse
/// mode the second one.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct T77Demodulator {
    reverse: bool,
    window: Vec<u16>,
    frames: u64,
    half_slides: u64,
    full_slides: u64,
}

impl T77Demodulator {
    pub fn new(reverse: bool) -> Self {
        T77Demodulator {
            reverse,
            window: Vec::with_capacity(GROUP_VALUES),
            ..T77Demodulator::default()
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }
    /// Returns the number of frames decoded so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
    /// Returns the number of `(polarity, cell)` resynchronization slides so far.
    pub fn slides(&self) -> (u64, u64) {
        (self.half_slides, self.full_slides)
    }
    /// Returns `true` if every cell of the `window` has the expected polarity.
    pub fn polarity_matches(&self, window: &[u16]) -> bool {
        window.chunks_exact(2).all(|cell| {
            let (flagged, plain) = if self.reverse { (cell[1], cell[0]) } else { (cell[0], cell[1]) };
            flagged > POLARITY && plain < POLARITY
        })
    }
    /// Classifies a single bit cell of two durations.
    pub fn classify_cell(&self, first: u16, second: u16) -> Option<Bit> {
        let (first, second) = if self.reverse {
            (first, second ^ POLARITY)
        }
        else {
            (first ^ POLARITY, second)
        };
        match first {
            LONG_PULSE_MIN..=LONG_PULSE_MAX => return Some(Bit::One),
            _ => {}
        }
        match second {
            SHORT_PULSE_MIN..=SHORT_PULSE_MAX => Some(Bit::Zero),
            _ => None
        }
    }
    /// Decodes a `window` of 22 durations. Returns the 11 bits or the number of durations
    /// the window should be moved by.
    pub fn decode_window(&self, window: &[u16]) -> Result<[Bit; MAX_FRAME_BITS], usize> {
        if window.len() != GROUP_VALUES || !self.polarity_matches(window) {
            return Err(1)
        }
        let mut bits = [Bit::Zero; MAX_FRAME_BITS];
        for (bit, cell) in bits.iter_mut().zip(window.chunks_exact(2)) {
            *bit = self.classify_cell(cell[0], cell[1]).ok_or(2usize)?;
        }
        if bits[0] != Bit::Zero || bits[9] != Bit::One || bits[10] != Bit::One {
            return Err(2)
        }
        Ok(bits)
    }
    /// Processes a single duration, writing a completed frame to the `sink`.
    pub fn push_value<S: BitSink>(&mut self, value: u16, mut sink: S) -> io::Result<()> {
        self.window.push(value);
        if self.window.len() < GROUP_VALUES {
            return Ok(())
        }
        match self.decode_window(&self.window) {
            Ok(bits) => {
                self.window.clear();
                self.frames += 1;
                sink.write_bits(bits.iter().copied())
            }
            Err(slide) => {
                trace!("sliding by {}", slide);
                if slide == 1 {
                    self.half_slides += 1;
                }
                else {
                    self.full_slides += 1;
                }
                self.window.drain(..slide);
                Ok(())
            }
        }
    }
    /// Processes all `values` and discards any incomplete window left.
    pub fn write_decoded_values<I, S>(&mut self, values: I, mut sink: S) -> io::Result<()>
        where I: IntoIterator<Item=u16>,
              S: BitSink
    {
        for value in values {
            self.push_value(value, &mut sink)?;
        }
        self.finish();
        Ok(())
    }
    /// Discards any incomplete window.
    pub fn finish(&mut self) {
        if !self.window.is_empty() {
            debug!("discarding {} trailing durations", self.window.len());
            self.window.clear();
        }
        debug!("T77 frames: {}, slides: {} half, {} full", self.frames, self.half_slides, self.full_slides);
    }
}
