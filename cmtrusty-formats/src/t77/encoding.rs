/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
use std::io::{self, Write};

use cmtrusty_core::bits::Bit;
use cmtrusty_core::checksum::sum8;
use cmtrusty_core::frame::FrameFormat;

use super::blocks::*;
use super::pulse::*;

/// The default number of 1 bit cells preceding and following the encoded data.
pub const DEFAULT_T77_LEADER: usize = 40;

/// Creates a sub-block with the marker, the block type, the payload length, the `payload`
/// and the checksum.
///
/// # Panics
/// Panics if the `payload` is longer than 255 bytes.
pub fn t77_sub_block(block_type: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= u8::max_value().into());
    let len = payload.len() as u8;
    let mut block = Vec::with_capacity(payload.len() + 5);
    block.extend_from_slice(&BLOCK_MARKER);
    block.push(block_type);
    block.push(len);
    block.extend_from_slice(payload);
    block.push(sum8(block_type.wrapping_add(len), payload));
    block
}

/// Creates the sub-blocks of a complete file: the header, the data split into sub-blocks of
/// at most 255 bytes and the end block.
///
/// The `name` is padded with spaces or truncated to 8 characters.
pub fn t77_file_blocks(name: &[u8], file_type: u32, data: &[u8]) -> Vec<u8> {
    let mut header = [0u8; HEADER_PAYLOAD_LEN];
    let (name_field, rest) = header.split_at_mut(T77_NAME_LEN);
    for (p, c) in name_field.iter_mut().zip(name.iter().chain(core::iter::repeat(&b' '))) {
        *p = *c;
    }
    rest[..3].copy_from_slice(&file_type.to_be_bytes()[1..]);
    let mut blocks = t77_sub_block(BLOCK_HEADER, &header);
    for chunk in data.chunks(u8::max_value().into()) {
        blocks.extend(t77_sub_block(BLOCK_DATA, chunk));
    }
    blocks.extend(t77_sub_block(BLOCK_END, &[]));
    blocks
}

/// Wraps the `body` of a machine code file with its length and the load and execution addresses.
///
/// # Panics
/// Panics if the `body` is longer than 65535 bytes.
pub fn machine_code_image(load: u16, exec: u16, body: &[u8]) -> Vec<u8> {
    assert!(body.len() <= u16::max_value().into());
    let mut image = Vec::with_capacity(body.len() + MACHINE_CODE_PREAMBLE_LEN + MACHINE_CODE_POSTAMBLE_LEN);
    image.push(0x00);
    image.extend_from_slice(&(body.len() as u16).to_be_bytes());
    image.extend_from_slice(&load.to_be_bytes());
    image.extend_from_slice(body);
    image.extend_from_slice(&[0xff, 0x00, 0x00]);
    image.extend_from_slice(&exec.to_be_bytes());
    image
}

/// Encodes bytes as a **T77** tape image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct T77Encoder {
    reverse: bool,
    leader: usize,
}

impl Default for T77Encoder {
    fn default() -> Self {
        T77Encoder { reverse: false, leader: DEFAULT_T77_LEADER }
    }
}

impl T77Encoder {
    pub fn new(reverse: bool) -> Self {
        T77Encoder { reverse, ..T77Encoder::default() }
    }

    pub fn with_leader(mut self, leader: usize) -> Self {
        self.leader = leader;
        self
    }
    /// Returns both durations of a bit cell.
    pub fn bit_values(&self, bit: Bit) -> Option<[u16; 2]> {
        let pulse = match bit {
            Bit::One => LONG_PULSE,
            Bit::Zero => SHORT_PULSE,
            Bit::Error => return None
        };
        Some(if self.reverse {
            [pulse, POLARITY | pulse]
        }
        else {
            [POLARITY | pulse, pulse]
        })
    }

    pub fn write_header<W: Write>(&self, mut wr: W) -> io::Result<()> {
        wr.write_all(T77_SIGNATURE)?;
        wr.write_all(&[T77_VERSION])?;
        wr.write_all(T77_MARKER)
    }
    /// Writes durations of `bits`, skipping [Bit::Error].
    pub fn write_bits<I, W>(&self, bits: I, mut wr: W) -> io::Result<()>
        where I: IntoIterator<Item=Bit>,
              W: Write
    {
        for bit in bits {
            if let Some([first, second]) = self.bit_values(bit) {
                wr.write_all(&first.to_be_bytes())?;
                wr.write_all(&second.to_be_bytes())?;
            }
        }
        Ok(())
    }
    /// Writes a complete image with `data` framed in UART frames between two leaders.
    pub fn write_image<W: Write>(&self, data: &[u8], mut wr: W) -> io::Result<()> {
        self.write_header(&mut wr)?;
        let mut bits = vec![Bit::One; self.leader];
        for &byte in data {
            FrameFormat::UART_LENIENT.encode(byte, &mut bits)?;
        }
        bits.extend(core::iter::repeat(Bit::One).take(self.leader));
        self.write_bits(bits, wr)
    }
}

#[cfg(test)]
mod tests {
    use cmtrusty_core::frame::{Frame, FrameReader};
    use cmtrusty_core::bits::BitIter;
    use super::*;

    fn decode_image(image: &[u8], reverse: bool) -> io::Result<Vec<u8>> {
        let values = read_t77(image)?;
        let mut bits = Vec::new();
        T77Demodulator::new(reverse).write_decoded_values(values, &mut bits)?;
        let mut frames = FrameReader::new(BitIter::new(bits), FrameFormat::UART_LENIENT);
        let mut data = Vec::new();
        while let Some(frame) = frames.next_frame()? {
            match frame {
                Frame::Byte(byte) => data.push(byte),
                frame => panic!("unexpected frame: {:?}", frame)
            }
        }
        Ok(data)
    }

    #[test]
    fn t77_encoder_works() -> io::Result<()> {
        let encoder = T77Encoder::new(false).with_leader(2);
        assert_eq!(Some([0x8030, 0x0030]), encoder.bit_values(Bit::One));
        assert_eq!(Some([0x8016, 0x0016]), encoder.bit_values(Bit::Zero));
        assert_eq!(None, encoder.bit_values(Bit::Error));
        assert_eq!(Some([0x0030, 0x8030]), T77Encoder::new(true).bit_values(Bit::One));
        let mut image = Vec::new();
        encoder.write_image(&[0x80], &mut image)?;
        assert_eq!(T77_HEADER_LEN + (2 + 11 + 2) * 4, image.len());
        assert_eq!(&b"XM7 TAPE IMAGE 0\x00\x00"[..], &image[..T77_HEADER_LEN]);
        // leader, start bit 0
        assert_eq!(&[0x80, 0x30, 0x00, 0x30, 0x80, 0x30, 0x00, 0x30, 0x80, 0x16, 0x00, 0x16][..],
                   &image[T77_HEADER_LEN..T77_HEADER_LEN + 12]);
        Ok(())
    }

    #[test]
    fn t77_image_round_trip_works() -> io::Result<()> {
        let body: Vec<u8> = (0..600u32).map(|n| (n * 7 + 1) as u8).collect();
        let mut data = t77_file_blocks(b"PROGRAM1", FILE_TYPE_MACHINE_CODE,
                                       &machine_code_image(0x2000, 0x2010, &body));
        data.extend(t77_file_blocks(b"DATA", 0x01_0000, b"\x01\x3c\x00"));
        for &reverse in [false, true].iter() {
            let mut image = Vec::new();
            T77Encoder::new(reverse).write_image(&data, &mut image)?;
            let decoded = decode_image(&image, reverse)?;
            assert_eq!(data, decoded);
            let files = decode_t77_files(&decoded, Default::default())?;
            assert_eq!(2, files.len());
            assert_eq!("PROGRAM1", files[0].name_str());
            assert_eq!(&body[..], files[0].payload());
            assert_eq!(600, files[0].size);
            assert_eq!(Some(0x2010), files[0].exec_address());
            assert_eq!("DATA", files[1].name_str());
            assert_eq!(0x01_0000, files[1].file_type);
            assert_eq!(b"\x01\x3c\x00", &files[1].data[..]);
        }
        Ok(())
    }
}
