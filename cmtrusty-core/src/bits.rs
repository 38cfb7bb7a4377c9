/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! Demodulated bits and the plumbing between bit producers and consumers.
//!
//! Demodulators write [Bit]s to a [BitSink]. Framers and block parsers read them from a [BitSource].
//! A [bit_channel] connects both ends across threads with a bounded, blocking queue.
use core::fmt;
use std::io;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// A single demodulated bit.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Bit {
    Zero = 0,
    One = 1,
    /// An out of band marker emitted when a bit could not be completed,
    /// e.g. a single half of a "1" was followed by a "0".
    Error = 2,
}

impl Bit {
    #[inline]
    pub fn is_zero(self) -> bool {
        self == Bit::Zero
    }
    #[inline]
    pub fn is_one(self) -> bool {
        self == Bit::One
    }
    #[inline]
    pub fn is_error(self) -> bool {
        self == Bit::Error
    }
    /// Returns the numeric value of the bit.
    #[inline]
    pub fn value(self) -> u8 {
        self as u8
    }
    /// Returns `1` for [Bit::One] and `0` otherwise.
    #[inline]
    pub fn data(self) -> u8 {
        (self == Bit::One) as u8
    }
}

impl From<bool> for Bit {
    #[inline]
    fn from(one: bool) -> Self {
        if one { Bit::One } else { Bit::Zero }
    }
}

impl core::convert::TryFrom<u8> for Bit {
    type Error = u8;
    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Bit::Zero),
            1 => Ok(Bit::One),
            2 => Ok(Bit::Error),
            v => Err(v)
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Bit::Zero => "0",
            Bit::One => "1",
            Bit::Error => "E",
        })
    }
}

/// Parses a string of `0`, `1` and `E` characters, ignoring any other characters.
pub fn bits_from_str(s: &str) -> Vec<Bit> {
    s.chars().filter_map(|c| match c {
        '0' => Some(Bit::Zero),
        '1' => Some(Bit::One),
        'E' => Some(Bit::Error),
        _ => None
    }).collect()
}

/// An ordered, append only bit output.
pub trait BitSink {
    /// Appends a single bit.
    fn write_bit(&mut self, bit: Bit) -> io::Result<()>;
    /// Appends all bits from the iterator.
    fn write_bits<I: IntoIterator<Item=Bit>>(&mut self, bits: I) -> io::Result<()>
        where Self: Sized
    {
        for bit in bits {
            self.write_bit(bit)?;
        }
        Ok(())
    }
}

/// An ordered bit input.
///
/// `Ok(None)` from [BitSource::read_bit] signals a clean end of the stream.
pub trait BitSource {
    /// Reads the next bit.
    fn read_bit(&mut self) -> io::Result<Option<Bit>>;
    /// Reads bits to fill `buf` or until the end of the stream.
    /// Returns the number of bits read.
    fn read_bits_or_to_end(&mut self, buf: &mut [Bit]) -> io::Result<usize> {
        for (n, slot) in buf.iter_mut().enumerate() {
            match self.read_bit()? {
                Some(bit) => *slot = bit,
                None => return Ok(n)
            }
        }
        Ok(buf.len())
    }
    /// Reads the exact number of bits required to fill `buf` and returns `Ok(true)` or returns
    /// `Ok(false)` if the stream ended before any bit was read.
    ///
    /// If at least one bit was read, this function behaves exactly like [BitSource::read_bits_exact].
    fn read_bits_or_none(&mut self, buf: &mut [Bit]) -> io::Result<bool> {
        let read = self.read_bits_or_to_end(buf)?;
        if read == 0 {
            Ok(false)
        }
        else if read == buf.len() {
            Ok(true)
        }
        else {
            Err(truncated(buf.len(), read))
        }
    }
    /// Reads the exact number of bits required to fill `buf`.
    ///
    /// Returns an error with [io::ErrorKind::UnexpectedEof] if the stream ends too soon.
    fn read_bits_exact(&mut self, buf: &mut [Bit]) -> io::Result<()> {
        let read = self.read_bits_or_to_end(buf)?;
        if read == buf.len() {
            Ok(())
        }
        else {
            Err(truncated(buf.len(), read))
        }
    }
    /// Skips bits equal to `bit`. Returns the number of skipped bits and the first different
    /// bit or `None` if the stream ended.
    fn skip_while(&mut self, bit: Bit) -> io::Result<Option<(u64, Bit)>> {
        let mut count = 0;
        while let Some(next) = self.read_bit()? {
            if next != bit {
                return Ok(Some((count, next)))
            }
            count += 1;
        }
        Ok(None)
    }
}

fn truncated(expected: usize, read: usize) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof,
                   format!("bit stream ended after {} of {} bits", read, expected))
}

impl BitSink for Vec<Bit> {
    #[inline]
    fn write_bit(&mut self, bit: Bit) -> io::Result<()> {
        self.push(bit);
        Ok(())
    }
}

impl<S: BitSink + ?Sized> BitSink for &mut S {
    #[inline]
    fn write_bit(&mut self, bit: Bit) -> io::Result<()> {
        (**self).write_bit(bit)
    }
}

impl<S: BitSource + ?Sized> BitSource for &mut S {
    #[inline]
    fn read_bit(&mut self) -> io::Result<Option<Bit>> {
        (**self).read_bit()
    }
}

/// Wraps an iterator of bits as a [BitSource].
#[derive(Clone, Debug)]
pub struct BitIter<I>(I);

impl<I> BitIter<I> {
    pub fn new<T: IntoIterator<IntoIter=I>>(bits: T) -> Self {
        BitIter(bits.into_iter())
    }
    pub fn into_inner(self) -> I {
        self.0
    }
}

impl<I: Iterator<Item=Bit>> BitSource for BitIter<I> {
    #[inline]
    fn read_bit(&mut self) -> io::Result<Option<Bit>> {
        Ok(self.0.next())
    }
}

/// The sending half of a [bit_channel].
#[derive(Clone, Debug)]
pub struct BitSender {
    tx: SyncSender<Bit>,
}

/// The receiving half of a [bit_channel].
#[derive(Debug)]
pub struct BitReceiver {
    rx: Receiver<Bit>,
}

/// Creates a bounded bit channel holding at most `capacity` bits in flight.
///
/// The sender blocks while the channel is full. With `capacity` 0 every bit is handed over
/// directly to the receiver.
///
/// Dropping the [BitSender] closes the channel: the receiver drains the buffered bits and then
/// reports a clean end of the stream. Dropping the [BitReceiver] makes every following
/// write fail with [io::ErrorKind::BrokenPipe].
pub fn bit_channel(capacity: usize) -> (BitSender, BitReceiver) {
    let (tx, rx) = sync_channel(capacity);
    (BitSender { tx }, BitReceiver { rx })
}

impl BitSink for BitSender {
    fn write_bit(&mut self, bit: Bit) -> io::Result<()> {
        self.tx.send(bit).map_err(|_|
            io::Error::new(io::ErrorKind::BrokenPipe, "bit receiver hung up")
        )
    }
}

impl BitSource for BitReceiver {
    fn read_bit(&mut self) -> io::Result<Option<Bit>> {
        Ok(self.rx.recv().ok())
    }
}

impl Iterator for BitReceiver {
    type Item = Bit;
    fn next(&mut self) -> Option<Bit> {
        self.rx.recv().ok()
    }
}
