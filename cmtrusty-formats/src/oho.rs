/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! Complemented paged memory dumps.
//!
//! Each stored byte is the bitwise complement of a payload byte. Every page of 256 stored
//! bytes is followed by a check byte: the complement of the 8-bit sum of the stored page bytes.
//! The last page may be shorter and is not followed by a check byte.
use std::io::{self, Write};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use cmtrusty_core::checksum::{sum8, ChecksumPolicy};

/// The number of stored bytes in a page.
pub const PAGE_SIZE: usize = 0x100;

/// Decodes a complemented paged dump written to it, writing the payload to the inner writer.
#[derive(Debug)]
pub struct PagedDumpDecoder<W> {
    wr: W,
    page_pos: usize,
    sum: u8,
    pages: u32,
}

impl<W: Write> PagedDumpDecoder<W> {
    pub fn new(wr: W) -> Self {
        PagedDumpDecoder { wr, page_pos: 0, sum: 0, pages: 0 }
    }
    /// Returns the number of verified pages so far.
    pub fn pages(&self) -> u32 {
        self.pages
    }
    /// Ends decoding and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        debug!("paged dump: {} full pages, {} trailing bytes, sum: {:02x}", self.pages, self.page_pos, !self.sum);
        self.wr.flush()?;
        Ok(self.wr)
    }
}

impl<W: Write> Write for PagedDumpDecoder<W> {
    /// # Errors
    /// A check byte mismatch is an error of the [DecodeErrorKind::Checksum] kind.
    ///
    /// [DecodeErrorKind::Checksum]: cmtrusty_core::error::DecodeErrorKind::Checksum
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut decoded = Vec::with_capacity(buf.len());
        for &stored in buf {
            if self.page_pos == PAGE_SIZE {
                ChecksumPolicy::Strict.check("page", self.sum.into(), (!stored).into())?;
                self.pages += 1;
                self.page_pos = 0;
                self.sum = 0;
                continue
            }
            self.page_pos += 1;
            self.sum = sum8(self.sum, Some(stored));
            decoded.push(!stored);
        }
        self.wr.write_all(&decoded)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.wr.flush()
    }
}

/// Creates a complemented paged dump of `data`.
pub fn encode_paged_dump(data: &[u8]) -> Vec<u8> {
    let mut dump = Vec::with_capacity(data.len() + data.len() / PAGE_SIZE);
    for page in data.chunks(PAGE_SIZE) {
        let start = dump.len();
        dump.extend(page.iter().map(|b| !b));
        if page.len() == PAGE_SIZE {
            dump.push(!sum8(0, &dump[start..]));
        }
    }
    dump
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use cmtrusty_core::error::{DecodeErrorKind, IoErrorExt};
    use super::*;

    #[test]
    fn paged_dump_works() -> io::Result<()> {
        let mut rng = rand::thread_rng();
        for &len in [0usize, 1, 255, 256, 257, 1000].iter() {
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let dump = encode_paged_dump(&data);
            assert_eq!(len + len / PAGE_SIZE, dump.len());
            let mut decoder = PagedDumpDecoder::new(Vec::new());
            for chunk in dump.chunks(100) {
                decoder.write_all(chunk)?;
            }
            assert_eq!((len / PAGE_SIZE) as u32, decoder.pages());
            assert_eq!(data, decoder.finish()?);
        }
        Ok(())
    }

    #[test]
    fn paged_dump_checksum_fails() -> io::Result<()> {
        let data = vec![0x5a; 300];
        let mut dump = encode_paged_dump(&data);
        assert_eq!(!((0xa5u32 * 256) as u8), dump[256]);
        dump[256] ^= 1;
        let mut decoder = PagedDumpDecoder::new(Vec::new());
        let err = decoder.write_all(&dump).unwrap_err();
        assert_eq!(Some(DecodeErrorKind::Checksum), err.decode_error_kind());
        Ok(())
    }
}
