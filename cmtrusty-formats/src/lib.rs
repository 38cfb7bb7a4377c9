//! Cassette tape signal and image formats.
//!
//! * [wav] - PCM audio input and output.
//! * [fb] - the duration-count encoded tape blocks.
//! * [kcs] - the frequency-class encoded byte streams of Kansas City Standard and MSX tapes.
//! * [t77] - XM7 `T77` tape images.
//! * [trace] - emulator trace logs of tape writing routines.
//! * [oho] - complemented paged memory dumps.
use std::io::{self, Read};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

pub mod fb;
pub mod kcs;
pub mod oho;
pub mod t77;
pub mod trace;
pub mod wav;

pub use cmtrusty_core::bits::Bit;
pub use cmtrusty_core::checksum::ChecksumPolicy;

/// A trait that extends [Read] with methods reading big-endian words from streams
/// that may end at any byte.
pub trait ReadWordsEx: Read {
    /// Fills `buf` with as many bytes as available. Returns the number of bytes read,
    /// which is less than `buf.len()` only at the end of the stream.
    fn read_to_fill(&mut self, mut buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        while !buf.is_empty() {
            match self.read(buf) {
                Ok(0) => break,
                Ok(n) => buf = &mut buf[n..],
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e)
            }
        }
        Ok(len - buf.len())
    }
    /// Reads a big-endian `u16`. Returns `None` at the end of the stream.
    ///
    /// A single trailing byte is logged and treated as the end of the stream.
    fn read_be_u16_or_end(&mut self) -> io::Result<Option<u16>> {
        let mut word = [0u8; 2];
        match self.read_to_fill(&mut word)? {
            2 => Ok(Some(u16::from_be_bytes(word))),
            0 => Ok(None),
            _ => {
                warn!("ignoring a trailing byte: {:02x}", word[0]);
                Ok(None)
            }
        }
    }
}

impl<R: Read> ReadWordsEx for R {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_words_works() -> io::Result<()> {
        let mut rd = &[0x80u8, 0x30, 0x00, 0x16, 0xff][..];
        assert_eq!(Some(0x8030), rd.read_be_u16_or_end()?);
        assert_eq!(Some(0x0016), rd.read_be_u16_or_end()?);
        assert_eq!(None, rd.read_be_u16_or_end()?);
        assert_eq!(None, rd.read_be_u16_or_end()?);
        let mut buf = [0u8; 4];
        assert_eq!(2, (&[1u8, 2][..]).read_to_fill(&mut buf)?);
        assert_eq!([1, 2, 0, 0], buf);
        Ok(())
    }
}
