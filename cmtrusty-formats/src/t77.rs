/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! **T77** tape images of the XM7 emulator.
//!
//! An image starts with the `"XM7 TAPE IMAGE 0"` signature and two zero bytes followed by
//! big-endian 16-bit pulse durations. The most significant bit of a duration carries the
//! polarity of the pulse.
//!
//! Each bit cell consists of two durations and 11 cells form a UART frame. Framed bytes carry
//! sub-blocks starting with the `0x01, 0x3C` marker, which in turn make up files.
mod blocks;
mod encoding;
mod pulse;

pub use blocks::*;
pub use encoding::*;
pub use pulse::*;
