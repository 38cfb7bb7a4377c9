/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use std::borrow::Cow;
use std::io;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use nom::{
    IResult, Finish,
    branch::alt,
    bytes::complete::{tag, take},
    combinator::{eof, value, verify},
    multi::many_till,
    number::complete::{be_u8, le_u16},
    sequence::terminated
};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use cmtrusty_core::bits::{Bit, BitSource};
use cmtrusty_core::checksum::{sum16, ChecksumPolicy};
use cmtrusty_core::error::{decode_error, DecodeErrorKind};
use cmtrusty_core::frame::{Frame, FrameFormat};

/// The number of bits in a payload group.
pub const GROUP_BITS: usize = 9;
/// The number of `1` bits in a tape mark.
pub const TAPE_MARK_BITS: usize = 20;
/// The number of bits in a block kind mark.
pub const KIND_MARK_BITS: usize = 20;
/// The number of `0` bits following the kind mark of an info block.
pub const INFO_GAP_BITS: usize = 40;
/// The number of bytes in an info block.
pub const INFO_BYTES: usize = 128;
/// The maximum length of a file name.
pub const NAME_LEN: usize = 16;
/// The number of bits in an info block payload.
pub const INFO_BLOCK_BITS: usize = 1 + INFO_BYTES * GROUP_BITS + 2 * GROUP_BITS + 1;
/// The attribute of a BASIC program.
pub const ATTRIB_BASIC: u8 = 0x02;

/// The header of a file.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FbInfo {
    pub attrib: u8,
    /// The file name up to the first NUL byte, at most 16 bytes.
    pub name: Vec<u8>,
    pub reserved: u8,
    /// The number of bytes in the following data block.
    pub data_len: u16,
    pub load_addr: u16,
    pub call_addr: u16,
    /// The recorded checksum.
    pub checksum: u16,
    /// `true` if the recorded checksum matches the data.
    pub checksum_ok: bool,
}

/// The body of a file.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FbData {
    /// The attribute of the preceding info block.
    pub attrib: u8,
    pub bytes: Vec<u8>,
    /// The recorded checksum.
    pub checksum: u16,
    /// `true` if the recorded checksum matches the data.
    pub checksum_ok: bool,
}

/// A decoded tape block.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FbBlock {
    Info(FbInfo),
    Data(FbData),
}

/// A line of a BASIC program listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BasicLine<'a> {
    pub number: u16,
    /// The tokenized line body.
    pub body: &'a [u8],
}

/// Parser state carried between consecutive blocks.
///
/// The most recent info block determines the length of the following data block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FbContext {
    info: Option<FbInfo>,
}

/// Reads **FB** tape blocks from a bit source.
#[derive(Debug)]
pub struct FbBlockReader<S> {
    src: S,
    policy: ChecksumPolicy,
    blocks: u32,
}

impl FbInfo {
    /// Creates an info block for a file with a valid checksum.
    pub fn new<N: AsRef<[u8]>>(attrib: u8, name: N, data_len: u16, load_addr: u16, call_addr: u16) -> Self {
        let name = name.as_ref();
        let name = name[..name.len().min(NAME_LEN)].to_vec();
        let mut info = FbInfo { attrib, name, data_len, load_addr, call_addr, ..FbInfo::default() };
        info.checksum = sum16(info.to_bytes().iter());
        info.checksum_ok = true;
        info
    }
    /// Returns the name as a string, replacing invalid characters.
    pub fn name_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
    pub fn is_basic(&self) -> bool {
        self.attrib == ATTRIB_BASIC
    }
    /// Returns the 128 bytes of the info block payload.
    pub fn to_bytes(&self) -> [u8; INFO_BYTES] {
        let mut bytes = [0u8; INFO_BYTES];
        bytes[0] = self.attrib;
        let name = &self.name[..self.name.len().min(NAME_LEN)];
        bytes[1..1 + name.len()].copy_from_slice(name);
        bytes[17] = self.reserved;
        bytes[18..20].copy_from_slice(&self.data_len.to_le_bytes());
        bytes[20..22].copy_from_slice(&self.load_addr.to_le_bytes());
        bytes[22..24].copy_from_slice(&self.call_addr.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let name = &bytes[1..1 + NAME_LEN];
        let name_len = memchr::memchr(0, name).unwrap_or(NAME_LEN);
        let word = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        FbInfo {
            attrib: bytes[0],
            name: name[..name_len].to_vec(),
            reserved: bytes[17],
            data_len: word(18),
            load_addr: word(20),
            call_addr: word(22),
            ..FbInfo::default()
        }
    }
}

impl FbData {
    /// Creates a data block with a valid checksum.
    pub fn new<B: Into<Vec<u8>>>(attrib: u8, bytes: B) -> Self {
        let bytes = bytes.into();
        let checksum = sum16(&bytes);
        FbData { attrib, bytes, checksum, checksum_ok: true }
    }
    pub fn is_basic(&self) -> bool {
        self.attrib == ATTRIB_BASIC
    }
    /// Parses the data as a BASIC program listing.
    pub fn basic_lines(&self) -> Result<Vec<BasicLine<'_>>, String> {
        parse_basic_listing(&self.bytes)
    }
}

impl FbBlock {
    pub fn info(&self) -> Option<&FbInfo> {
        match self {
            FbBlock::Info(info) => Some(info),
            _ => None
        }
    }
    pub fn data(&self) -> Option<&FbData> {
        match self {
            FbBlock::Data(data) => Some(data),
            _ => None
        }
    }
    pub fn checksum_ok(&self) -> bool {
        match self {
            FbBlock::Info(info) => info.checksum_ok,
            FbBlock::Data(data) => data.checksum_ok,
        }
    }
}

impl FbContext {
    pub fn new() -> Self {
        FbContext::default()
    }
    /// Returns the most recent info block.
    pub fn info(&self) -> Option<&FbInfo> {
        self.info.as_ref()
    }
    /// Clears the parser state.
    pub fn reset(&mut self) {
        self.info = None;
    }
}

/// Parses a BASIC program listing.
///
/// Each line is a length byte counting the whole line, a little-endian line number and
/// the line body. A length byte of 0 ends the listing and must be the last byte.
/// The listing may also end without it, exactly at the end of `data`.
pub fn parse_basic_listing(data: &[u8]) -> Result<Vec<BasicLine<'_>>, String> {
    fn line(input: &[u8]) -> IResult<&[u8], BasicLine<'_>> {
        let (input, len) = verify(be_u8, |&len: &u8| len >= 3)(input)?;
        let (input, number) = le_u16(input)?;
        let (input, body) = take(len - 3)(input)?;
        Ok((input, BasicLine { number, body }))
    }
    let end = alt((value((), tag(&[0u8][..])), value((), eof)));
    terminated(many_till(line, end), eof)(data)
        .finish()
        .map(|(_, (lines, _))| lines)
        .map_err(|e| format!("malformed BASIC listing at byte {} of {}",
                             data.len() - e.input.len(), data.len()))
}

/// Returns rows of hexadecimal byte values, 16 bytes per row.
pub fn hex_dump_rows(data: &[u8]) -> impl Iterator<Item=String> + '_ {
    data.chunks(16).map(|row| {
        row.iter().map(|b| format!(" {:02x}", b)).collect()
    })
}

fn protocol_error<S: Into<String>>(description: S) -> io::Error {
    decode_error(DecodeErrorKind::Protocol, description)
}

fn expect_uniform(bits: &[Bit], expected: Bit, what: &str) -> io::Result<()> {
    match bits.iter().position(|&b| b != expected) {
        Some(index) => Err(protocol_error(
            format!("invalid {} bit {}: {}", what, index, bits[index]))),
        None => Ok(())
    }
}

fn decode_groups(bits: &[Bit], out: &mut Vec<u8>) -> io::Result<()> {
    for (index, group) in bits.chunks_exact(GROUP_BITS).enumerate() {
        match FrameFormat::GROUP9.decode(group) {
            Frame::Byte(byte) => out.push(byte),
            frame => return Err(decode_error(DecodeErrorKind::Framing,
                format!("group {}: {:?}", index, frame)))
        }
    }
    Ok(())
}

fn decode_word(bits: &[Bit]) -> io::Result<u16> {
    let mut bytes = Vec::with_capacity(2);
    decode_groups(bits, &mut bytes)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

impl<S> FbBlockReader<S> {
    pub fn new(src: S) -> Self {
        FbBlockReader { src, policy: ChecksumPolicy::Warn, blocks: 0 }
    }
    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.policy = policy;
        self
    }
    /// Returns the number of blocks read so far.
    pub fn blocks(&self) -> u32 {
        self.blocks
    }
    pub fn into_inner(self) -> S {
        self.src
    }
}

impl<S: BitSource> FbBlockReader<S> {
    /// Reads all blocks until the end of the stream.
    pub fn read_blocks(&mut self) -> io::Result<Vec<FbBlock>> {
        let mut ctx = FbContext::new();
        let mut blocks = Vec::new();
        while let Some(block) = self.next_block(&mut ctx)? {
            blocks.push(block);
        }
        Ok(blocks)
    }
    /// Reads the next block.
    ///
    /// Returns `None` if the stream ends while searching for the next block.
    /// The stream ending inside of a block is an error of kind [io::ErrorKind::UnexpectedEof].
    ///
    /// An info block is stored in `ctx` to provide the length of the next data block.
    pub fn next_block(&mut self, ctx: &mut FbContext) -> io::Result<Option<FbBlock>> {
        let (zeros, first) = match self.src.skip_while(Bit::Zero)? {
            Some(found) => found,
            None => {
                info!("end of blocks: {}", self.blocks);
                return Ok(None)
            }
        };
        info!("block {} start, leader: {} bits", self.blocks, zeros);
        let mut mark = [first; TAPE_MARK_BITS];
        self.src.read_bits_exact(&mut mark[1..])?;
        expect_uniform(&mark, Bit::One, "tape mark")?;

        let mut kind = [Bit::Zero; KIND_MARK_BITS];
        self.src.read_bits_exact(&mut kind)?;
        let block = if kind[0] == Bit::One {
            expect_uniform(&kind, Bit::One, "info mark")?;
            let mut gap = [Bit::One; INFO_GAP_BITS];
            self.src.read_bits_exact(&mut gap)?;
            expect_uniform(&gap, Bit::Zero, "info mark")?;
            let info = self.read_info()?;
            ctx.info = Some(info.clone());
            FbBlock::Info(info)
        }
        else {
            expect_uniform(&kind, Bit::Zero, "data mark")?;
            let info = ctx.info.as_ref().ok_or_else(||
                protocol_error("a data block without a preceding info block")
            )?;
            FbBlock::Data(self.read_data(info)?)
        };
        self.blocks += 1;
        Ok(Some(block))
    }

    fn read_info(&mut self) -> io::Result<FbInfo> {
        let mut bits = vec![Bit::Zero; INFO_BLOCK_BITS];
        self.src.read_bits_exact(&mut bits)?;
        debug!("info block: {} bits", INFO_BLOCK_BITS);
        check_start_end(&bits)?;
        let mut bytes = Vec::with_capacity(INFO_BYTES);
        let groups_end = 1 + INFO_BYTES * GROUP_BITS;
        decode_groups(&bits[1..groups_end], &mut bytes)?;
        let mut info = FbInfo::from_bytes(&bytes);
        info.checksum = decode_word(&bits[groups_end..INFO_BLOCK_BITS - 1])?;
        info.checksum_ok = self.policy.check("info block", sum16(&bytes).into(), info.checksum.into())?;
        info!("attrib: {:02x}, name: {:?}, reserved: {:02x}", info.attrib, info.name_str(), info.reserved);
        info!("data length: {:04x}, load: {:04x}, call: {:04x}, checksum: {:04x}",
              info.data_len, info.load_addr, info.call_addr, info.checksum);
        Ok(info)
    }

    fn read_data(&mut self, info: &FbInfo) -> io::Result<FbData> {
        let data_len = usize::from(info.data_len);
        let len = 1 + data_len * GROUP_BITS + 2 * GROUP_BITS + 1;
        debug!("data block: {} bits", len);
        let mut bits = vec![Bit::Zero; len];
        self.src.read_bits_exact(&mut bits)?;
        check_start_end(&bits)?;
        let groups_end = 1 + data_len * GROUP_BITS;
        let mut bytes = Vec::with_capacity(data_len);
        decode_groups(&bits[1..groups_end], &mut bytes)?;
        let checksum = decode_word(&bits[groups_end..len - 1])?;
        let checksum_ok = self.policy.check("data block", sum16(&bytes).into(), checksum.into())?;
        let data = FbData { attrib: info.attrib, bytes, checksum, checksum_ok };
        log_data(&data);
        info!("data: {} bytes, checksum: {:04x}", data.bytes.len(), checksum);
        Ok(data)
    }
}

fn check_start_end(bits: &[Bit]) -> io::Result<()> {
    if bits[0] != Bit::One {
        return Err(protocol_error(format!("invalid start bit: {}", bits[0])))
    }
    let end = bits[bits.len() - 1];
    if end != Bit::One {
        return Err(protocol_error(format!("invalid end bit: {}", end)))
    }
    Ok(())
}

fn log_data(data: &FbData) {
    if data.is_basic() {
        match data.basic_lines() {
            Ok(lines) => {
                for line in lines.iter() {
                    debug!("{:5} {:3},{}", line.number, line.body.len(),
                           hex_dump_rows(line.body).collect::<String>());
                }
                debug!("end of BASIC listing: {} lines", lines.len());
            }
            Err(e) => warn!("{}", e)
        }
    }
    else {
        for row in hex_dump_rows(&data.bytes) {
            debug!("{}", row);
        }
    }
}
