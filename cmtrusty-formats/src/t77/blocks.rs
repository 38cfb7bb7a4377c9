/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;
use std::borrow::Cow;
use std::io;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use cmtrusty_core::checksum::{sum8, ChecksumPolicy};
use cmtrusty_core::error::{decode_error, DecodeErrorKind};

/// The marker preceding each sub-block.
pub const BLOCK_MARKER: [u8; 2] = [0x01, 0x3C];
/// The sub-block type of a file header.
pub const BLOCK_HEADER: u8 = 0x00;
/// The sub-block type of file data.
pub const BLOCK_DATA: u8 = 0x01;
/// The sub-block type ending a file.
pub const BLOCK_END: u8 = 0xFF;
/// The expected length of a file header payload.
pub const HEADER_PAYLOAD_LEN: usize = 20;
/// The length of a file name in a file header.
pub const T77_NAME_LEN: usize = 8;
/// The file type of binary files wrapped with load and execution addresses.
pub const FILE_TYPE_MACHINE_CODE: u32 = 0x02_0000;
/// The length of the preamble of a machine code file.
pub const MACHINE_CODE_PREAMBLE_LEN: usize = 5;
/// The length of the postamble of a machine code file.
pub const MACHINE_CODE_POSTAMBLE_LEN: usize = 5;

/// A sub-block found in the decoded **T77** byte stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct T77Block<'a> {
    /// The offset of the block marker in the byte stream.
    pub offset: usize,
    pub block_type: u8,
    pub payload: &'a [u8],
    /// The recorded checksum.
    pub checksum: u8,
}

impl<'a> T77Block<'a> {
    /// Calculates the checksum of the block type, the payload length and the payload.
    pub fn computed_checksum(&self) -> u8 {
        sum8(self.block_type.wrapping_add(self.payload.len() as u8), self.payload)
    }

    pub fn checksum_ok(&self) -> bool {
        self.computed_checksum() == self.checksum
    }
}

impl fmt::Display for T77Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}: type {:02x} size {:3}", self.offset, self.block_type, self.payload.len())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    Seek,
    Marker,
    BlockType,
    Length,
    Payload(u8),
    Checksum,
}

impl Default for ScanState {
    fn default() -> Self {
        ScanState::Seek
    }
}

/// Finds sub-blocks in a decoded **T77** byte stream, one byte at a time.
///
/// Bytes between sub-blocks are skipped. A sub-block is returned as soon as its checksum
/// byte arrives.
#[derive(Clone, Debug, Default)]
pub struct T77BlockScanner {
    state: ScanState,
    position: usize,
    offset: usize,
    block_type: u8,
    payload: Vec<u8>,
}

impl T77BlockScanner {
    pub fn new() -> Self {
        T77BlockScanner::default()
    }
    /// Returns the number of bytes pushed so far.
    pub fn position(&self) -> usize {
        self.position
    }
    /// Returns `true` if the scanner is inside of a sub-block.
    pub fn is_in_block(&self) -> bool {
        !matches!(self.state, ScanState::Seek|ScanState::Marker)
    }
    /// Pushes the next `byte` of the stream. Returns a sub-block completed by this `byte`.
    pub fn push_byte(&mut self, byte: u8) -> Option<T77Block<'_>> {
        let position = self.position;
        self.position += 1;
        self.state = match self.state {
            ScanState::Seek|ScanState::Marker if byte == BLOCK_MARKER[0] => {
                self.offset = position;
                ScanState::Marker
            }
            ScanState::Marker if byte == BLOCK_MARKER[1] => ScanState::BlockType,
            ScanState::Seek|ScanState::Marker => ScanState::Seek,
            ScanState::BlockType => {
                self.block_type = byte;
                self.payload.clear();
                ScanState::Length
            }
            ScanState::Length if byte == 0 => ScanState::Checksum,
            ScanState::Length => ScanState::Payload(byte),
            ScanState::Payload(remaining) => {
                self.payload.push(byte);
                if remaining == 1 { ScanState::Checksum } else { ScanState::Payload(remaining - 1) }
            }
            ScanState::Checksum => {
                self.state = ScanState::Seek;
                return Some(T77Block {
                    offset: self.offset,
                    block_type: self.block_type,
                    payload: &self.payload,
                    checksum: byte
                })
            }
        };
        None
    }
    /// Ends the stream.
    ///
    /// A sub-block cut short by the end of the stream is reported as an error with
    /// [io::ErrorKind::UnexpectedEof].
    pub fn finish(&mut self) -> io::Result<()> {
        let in_block = self.is_in_block();
        self.state = ScanState::Seek;
        if in_block {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof,
                                      format!("truncated block at {:04x}", self.offset)))
        }
        Ok(())
    }
}

/// A file assembled from **T77** sub-blocks.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct T77File {
    /// The ordinal number of the file in the stream, starting from 0.
    pub index: u32,
    pub name: [u8; T77_NAME_LEN],
    /// A 24-bit file type.
    pub file_type: u32,
    /// The accumulated size of the file contents excluding the machine code wrapper.
    pub size: i64,
    /// The contents of all data blocks.
    pub data: Vec<u8>,
}

impl T77File {
    pub fn name_str(&self) -> Cow<'_, str> {
        let end = self.name.iter().rposition(|&c| c != b' ' && c != 0).map_or(0, |n| n + 1);
        String::from_utf8_lossy(&self.name[..end])
    }

    pub fn is_machine_code(&self) -> bool {
        self.file_type == FILE_TYPE_MACHINE_CODE
    }
    /// Returns the file contents without the machine code wrapper.
    pub fn payload(&self) -> &[u8] {
        if self.is_machine_code() &&
                self.data.len() >= MACHINE_CODE_PREAMBLE_LEN + MACHINE_CODE_POSTAMBLE_LEN {
            &self.data[MACHINE_CODE_PREAMBLE_LEN..self.data.len() - MACHINE_CODE_POSTAMBLE_LEN]
        }
        else {
            &self.data
        }
    }
    /// Returns the load address of a machine code file.
    pub fn load_address(&self) -> Option<u16> {
        if !self.is_machine_code() {
            return None
        }
        match self.data.get(3..5)? {
            &[hi, lo] => Some(u16::from_be_bytes([hi, lo])),
            _ => None
        }
    }
    /// Returns the execution address of a machine code file.
    pub fn exec_address(&self) -> Option<u16> {
        if !self.is_machine_code() || self.data.len() < MACHINE_CODE_POSTAMBLE_LEN {
            return None
        }
        match &self.data[self.data.len() - 2..] {
            &[hi, lo] => Some(u16::from_be_bytes([hi, lo])),
            _ => None
        }
    }
}

impl fmt::Display for T77File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {:8} type: {:06x} size: {}", self.index, self.name_str(), self.file_type, self.size)?;
        if let (Some(load), Some(exec)) = (self.load_address(), self.exec_address()) {
            write!(f, " load: {:04x} exec: {:04x}", load, exec)?;
        }
        Ok(())
    }
}

/// Assembles files from **T77** sub-blocks.
#[derive(Clone, Debug, Default)]
pub struct T77FileAssembler {
    policy: ChecksumPolicy,
    current: Option<T77File>,
    files: u32,
}

impl T77FileAssembler {
    /// Creates an assembler with the [ChecksumPolicy::Strict] policy.
    pub fn new() -> Self {
        T77FileAssembler::default().with_checksum_policy(ChecksumPolicy::Strict)
    }

    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.policy = policy;
        self
    }
    /// Returns the number of files completed so far.
    pub fn files(&self) -> u32 {
        self.files
    }

    fn current_or_anonymous(&mut self) -> &mut T77File {
        let index = self.files;
        self.current.get_or_insert_with(|| {
            warn!("data without a file header");
            T77File { index, ..T77File::default() }
        })
    }
    /// Processes a single `block`. Returns a file when the `block` ends it, or when the `block`
    /// is a file header interrupting a file which was never ended.
    ///
    /// A checksum mismatch and an unknown block type are errors of the
    /// [DecodeErrorKind::Checksum] and [DecodeErrorKind::Protocol] kinds respectively.
    pub fn push_block(&mut self, block: &T77Block<'_>) -> io::Result<Option<T77File>> {
        trace!("{}", block);
        self.policy.check("T77 block", block.computed_checksum().into(), block.checksum.into())?;
        match block.block_type {
            BLOCK_HEADER => {
                if block.payload.len() != HEADER_PAYLOAD_LEN {
                    warn!("skipping file header at {:04x} of size {}", block.offset, block.payload.len());
                    return Ok(None)
                }
                let interrupted = self.current.take();
                if let Some(file) = interrupted.as_ref() {
                    warn!("file #{} not terminated", file.index);
                    self.files += 1;
                }
                let mut name = [0u8; T77_NAME_LEN];
                name.copy_from_slice(&block.payload[..T77_NAME_LEN]);
                let file_type = u32::from_be_bytes([0, block.payload[8], block.payload[9], block.payload[10]]);
                let size = if file_type == FILE_TYPE_MACHINE_CODE {
                    -((MACHINE_CODE_PREAMBLE_LEN + MACHINE_CODE_POSTAMBLE_LEN) as i64)
                }
                else {
                    0
                };
                let file = T77File { index: self.files, name, file_type, size, data: Vec::new() };
                debug!("file header: {}", file);
                self.current = Some(file);
                Ok(interrupted)
            }
            BLOCK_DATA => {
                let file = self.current_or_anonymous();
                file.size += block.payload.len() as i64;
                file.data.extend_from_slice(block.payload);
                Ok(None)
            }
            BLOCK_END => {
                let file = self.current_or_anonymous();
                info!("{}", file);
                self.files += 1;
                Ok(self.current.take())
            }
            unknown => Err(decode_error(DecodeErrorKind::Protocol,
                                        format!("unknown block type {:02x} at {:04x}", unknown, block.offset)))
        }
    }
    /// Returns a file which was started but never ended.
    pub fn finish(&mut self) -> Option<T77File> {
        let file = self.current.take()?;
        warn!("file #{} not terminated", file.index);
        Some(file)
    }
}

/// Assembles files from a decoded **T77** byte stream as the bytes arrive.
#[derive(Clone, Debug, Default)]
pub struct T77FileDecoder {
    scanner: T77BlockScanner,
    assembler: T77FileAssembler,
}

impl T77FileDecoder {
    pub fn new(policy: ChecksumPolicy) -> Self {
        T77FileDecoder {
            scanner: T77BlockScanner::new(),
            assembler: T77FileAssembler::new().with_checksum_policy(policy)
        }
    }
    /// Returns the number of bytes pushed so far.
    pub fn position(&self) -> usize {
        self.scanner.position()
    }
    /// Pushes the next `byte` of the stream. Returns a file completed by this `byte`.
    ///
    /// # Errors
    /// The errors of [T77FileAssembler::push_block] are reported at the last byte of the
    /// offending sub-block.
    pub fn push_byte(&mut self, byte: u8) -> io::Result<Option<T77File>> {
        match self.scanner.push_byte(byte) {
            Some(block) => self.assembler.push_block(&block),
            None => Ok(None)
        }
    }
    /// Ends the stream. Returns a file which was started but never ended.
    pub fn finish(&mut self) -> io::Result<Option<T77File>> {
        self.scanner.finish()?;
        Ok(self.assembler.finish())
    }
}

/// Assembles all files from the decoded **T77** byte stream.
///
/// A file not terminated by the end block is included.
pub fn decode_t77_files(data: &[u8], policy: ChecksumPolicy) -> io::Result<Vec<T77File>> {
    let mut decoder = T77FileDecoder::new(policy);
    let mut files = Vec::new();
    for &byte in data {
        files.extend(decoder.push_byte(byte)?);
    }
    files.extend(decoder.finish()?);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use cmtrusty_core::error::IoErrorExt;
    use super::*;
    use crate::t77::{t77_sub_block, t77_file_blocks, machine_code_image};

    fn scan_blocks(data: &[u8]) -> io::Result<Vec<(usize, u8, Vec<u8>, u8)>> {
        let mut scanner = T77BlockScanner::new();
        let mut blocks = Vec::new();
        for &byte in data {
            if let Some(block) = scanner.push_byte(byte) {
                assert_eq!(block.checksum_ok(), block.computed_checksum() == block.checksum);
                blocks.push((block.offset, block.block_type, block.payload.to_vec(), block.checksum));
            }
        }
        scanner.finish()?;
        assert_eq!(data.len(), scanner.position());
        Ok(blocks)
    }

    #[test]
    fn block_scanner_works() -> io::Result<()> {
        let mut data = vec![0x55, 0x01, 0x01];
        data.extend(t77_sub_block(BLOCK_DATA, &[1, 2, 3]));
        data.extend_from_slice(&[0x01, 0x00, 0x3C]);
        data.extend(t77_sub_block(BLOCK_END, &[]));
        let blocks = scan_blocks(&data)?;
        assert_eq!(vec![(3, BLOCK_DATA, vec![1, 2, 3], 0x0a),
                        (14, BLOCK_END, vec![], 0xff)], blocks);

        let err = scan_blocks(&[0x01, 0x3C, 0x01, 0x05, 1, 2]).unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());
        assert!(scan_blocks(&[0, 0, 0x01])?.is_empty());
        let err = scan_blocks(&[0x01, 0x3C]).unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());
        Ok(())
    }

    #[test]
    fn block_scanner_reports_blocks_early() {
        let mut scanner = T77BlockScanner::new();
        let data = t77_sub_block(BLOCK_DATA, &[0x01, 0x3C, 0x00]);
        let (last, head) = data.split_last().unwrap();
        for (i, &byte) in head.iter().enumerate() {
            assert!(scanner.push_byte(byte).is_none());
            assert_eq!(i != 0, scanner.is_in_block());
        }
        let block = scanner.push_byte(*last).unwrap();
        assert_eq!(&[0x01, 0x3C, 0x00], block.payload);
        assert!(block.checksum_ok());
        assert!(!scanner.is_in_block());
    }

    #[test]
    fn file_assembly_works() -> io::Result<()> {
        let body: Vec<u8> = (0..=255u8).chain(0..100).collect();
        let image = machine_code_image(0x1000, 0x1008, &body);
        let mut data = vec![0xff; 10];
        data.extend(t77_file_blocks(b"GAME", FILE_TYPE_MACHINE_CODE, &image));
        data.extend(t77_file_blocks(b"LIST", 0x00_0000, b"10 PRINT"));
        let files = decode_t77_files(&data, ChecksumPolicy::Strict)?;
        assert_eq!(2, files.len());
        let file = &files[0];
        assert_eq!(0, file.index);
        assert_eq!("GAME", file.name_str());
        assert!(file.is_machine_code());
        assert_eq!(body.len() as i64, file.size);
        assert_eq!(image, file.data);
        assert_eq!(&body[..], file.payload());
        assert_eq!(Some(0x1000), file.load_address());
        assert_eq!(Some(0x1008), file.exec_address());
        let file = &files[1];
        assert_eq!(1, file.index);
        assert_eq!("LIST", file.name_str());
        assert_eq!(8, file.size);
        assert_eq!(b"10 PRINT", file.payload());
        assert_eq!(None, file.load_address());
        Ok(())
    }

    #[test]
    fn file_assembly_errors_work() -> io::Result<()> {
        let mut data = t77_file_blocks(b"BAD", 0x00_0000, &[1, 2, 3]);
        let blocks = scan_blocks(&data)?;
        let last_at = blocks[1].0 + 4 + blocks[1].2.len() - 1;
        data[last_at] ^= 0x80;
        let err = decode_t77_files(&data, ChecksumPolicy::Strict).unwrap_err();
        assert_eq!(Some(DecodeErrorKind::Checksum), err.decode_error_kind());
        let files = decode_t77_files(&data, ChecksumPolicy::Warn)?;
        assert_eq!(1, files.len());
        assert_eq!(&[1, 2, 0x83], &files[0].data[..]);

        let data = t77_sub_block(0x02, &[0]);
        let err = decode_t77_files(&data, ChecksumPolicy::Strict).unwrap_err();
        assert_eq!(Some(DecodeErrorKind::Protocol), err.decode_error_kind());

        let mut data = t77_file_blocks(b"FIRST", 0x00_0000, b"ONE");
        data[4] ^= 0x20;
        let header_len = 4 + HEADER_PAYLOAD_LEN + 1;
        data.extend(t77_file_blocks(b"SECOND", 0x00_0000, b"TWO"));
        let mut decoder = T77FileDecoder::new(ChecksumPolicy::Strict);
        let mut res = Ok(None);
        for &byte in data.iter() {
            res = decoder.push_byte(byte);
            if res.is_err() {
                break
            }
        }
        let err = res.unwrap_err();
        assert_eq!(Some(DecodeErrorKind::Checksum), err.decode_error_kind());
        assert_eq!(header_len, decoder.position());
        Ok(())
    }

    #[test]
    fn irregular_files_work() -> io::Result<()> {
        let mut data = t77_sub_block(BLOCK_HEADER, &[0x20; 19]);
        data.extend(t77_sub_block(BLOCK_DATA, &[7, 8]));
        data.extend(t77_sub_block(BLOCK_END, &[]));
        let mut header = [0x20u8; HEADER_PAYLOAD_LEN];
        header[..4].copy_from_slice(b"TAIL");
        data.extend(t77_sub_block(BLOCK_HEADER, &header));
        data.extend(t77_sub_block(BLOCK_DATA, &[9]));
        let files = decode_t77_files(&data, ChecksumPolicy::Strict)?;
        assert_eq!(2, files.len());
        assert_eq!("", files[0].name_str());
        assert_eq!(vec![7, 8], files[0].data);
        assert_eq!("TAIL", files[1].name_str());
        assert_eq!(0x20_2020, files[1].file_type);
        assert_eq!(vec![9], files[1].data);
        Ok(())
    }

    #[test]
    fn interrupted_file_is_kept() -> io::Result<()> {
        let mut data = t77_file_blocks(b"LOST", 0x00_0000, b"DATA");
        let end = t77_sub_block(BLOCK_END, &[]);
        data.truncate(data.len() - end.len());
        data.extend(t77_file_blocks(b"SECOND", 0x00_0000, b"KEPT"));
        let files = decode_t77_files(&data, ChecksumPolicy::Strict)?;
        assert_eq!(2, files.len());
        assert_eq!(0, files[0].index);
        assert_eq!("LOST", files[0].name_str());
        assert_eq!(b"DATA", &files[0].data[..]);
        assert_eq!(4, files[0].size);
        assert_eq!(1, files[1].index);
        assert_eq!("SECOND", files[1].name_str());
        assert_eq!(b"KEPT", &files[1].data[..]);

        let mut assembler = T77FileAssembler::new();
        let mut header = [0x20u8; HEADER_PAYLOAD_LEN];
        header[..3].copy_from_slice(b"ONE");
        let block = T77Block { offset: 0, block_type: BLOCK_HEADER, payload: &header, checksum: 0 };
        let block = T77Block { checksum: block.computed_checksum(), ..block };
        assert_eq!(None, assembler.push_block(&block)?);
        let file = assembler.push_block(&block)?.unwrap();
        assert_eq!("ONE", file.name_str());
        assert_eq!(1, assembler.files());
        assert_eq!(Some(1), assembler.finish().map(|file| file.index));
        Ok(())
    }
}
