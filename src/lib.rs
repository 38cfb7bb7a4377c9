/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    CMTRUSTY is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    CMTRUSTY is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! # CMTRUSTY
//!
//! A library for recovering data from cassette tape recordings of 8-bit home computers
//! and from tape images.
//!
//! The building blocks are re-exported from the `cmtrusty-core` crate. The signal and
//! image formats live in the [formats] module and the [pipeline] module combines them
//! into a decoder running the demodulator and the block parser on two threads.
//!
//! ```no_run
//! use std::fs::File;
//! use cmtrusty::pipeline::{TapeDecoder, TapeFormat, Decoded};
//!
//! # fn main() -> std::io::Result<()> {
//! let decoded = TapeDecoder::new(TapeFormat::Fb).decode(File::open("family_basic.wav")?)?;
//! if let Decoded::Blocks(blocks) = decoded {
//!     for block in blocks.iter().filter_map(|b| b.info()) {
//!         println!("{}", block.name_str());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
pub use cmtrusty_core::{audio, bits, checksum, error, frame, window};

#[cfg(feature = "formats")]
pub use cmtrusty_formats as formats;

#[cfg(feature = "formats")]
pub mod pipeline;
