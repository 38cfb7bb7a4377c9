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
//! The core components of the CMTRUSTY library.
//!
//! Format independent building blocks of a tape decoding pipeline:
//!
//! * [audio] - PCM format description and the three level sample [audio::Quantizer].
//! * [window] - inclusive acceptance windows for pulse and interval classification.
//! * [bits] - the [bits::Bit] symbol, bit sinks, bit sources and the back-pressured bit channel.
//! * [frame] - the UART-style framer.
//! * [checksum] - additive checksums.
//! * [error] - the [error::DecodeError] carried inside [std::io::Error].
pub mod audio;
pub mod bits;
pub mod checksum;
pub mod error;
pub mod frame;
pub mod window;
