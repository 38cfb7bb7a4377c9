/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! Additive checksums.
use core::borrow::Borrow;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use std::io;
use crate::error::{decode_error, DecodeErrorKind};

/// What to do when a computed checksum differs from the recorded one.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChecksumPolicy {
    /// Log a warning and keep the data.
    Warn,
    /// Fail with [DecodeErrorKind::Checksum].
    Strict,
}

impl Default for ChecksumPolicy {
    fn default() -> Self {
        ChecksumPolicy::Warn
    }
}

impl ChecksumPolicy {
    /// Checks the `computed` checksum against the `recorded` one.
    ///
    /// Returns `Ok(true)` if they match, `Ok(false)` on mismatch under [ChecksumPolicy::Warn].
    pub fn check(self, what: &str, computed: u32, recorded: u32) -> io::Result<bool> {
        if computed == recorded {
            return Ok(true)
        }
        match self {
            ChecksumPolicy::Warn => {
                warn!("{} checksum mismatch: computed {:04x}, recorded {:04x}", what, computed, recorded);
                Ok(false)
            }
            ChecksumPolicy::Strict => Err(decode_error(DecodeErrorKind::Checksum,
                format!("{}: computed {:04x}, recorded {:04x}", what, computed, recorded)))
        }
    }
}

/// Returns the sum of `data` bytes modulo 256, starting at `init`.
pub fn sum8<I: IntoIterator<Item=B>, B: Borrow<u8>>(init: u8, data: I) -> u8 {
    data.into_iter().fold(init, |acc, x| acc.wrapping_add(*x.borrow()))
}

/// Returns the sum of `data` bytes modulo 65536.
pub fn sum16<I: IntoIterator<Item=B>, B: Borrow<u8>>(data: I) -> u16 {
    data.into_iter().fold(0u16, |acc, x| acc.wrapping_add(u16::from(*x.borrow())))
}

#[cfg(test)]
mod tests {
    use rand::prelude::*;
    use super::*;
    use crate::error::IoErrorExt;

    #[test]
    fn checksum_works() {
        assert_eq!(0, sum8(0, &[0u8; 0]));
        assert_eq!(0x3c, sum8(0x01, [0x3bu8].iter()));
        assert_eq!(0x00, sum8(0, vec![0x80u8, 0x80]));
        assert_eq!(0x0100, sum16(&[0x80u8, 0x80]));
        assert_eq!((76500u32 % 65536) as u16, sum16(core::iter::repeat(255u8).take(300)));
    }

    #[test]
    fn checksum_policy_works() {
        assert!(ChecksumPolicy::Warn.check("data", 1, 1).unwrap());
        assert!(!ChecksumPolicy::Warn.check("data", 1, 2).unwrap());
        assert!(ChecksumPolicy::Strict.check("data", 7, 7).unwrap());
        let err = ChecksumPolicy::Strict.check("data", 1, 2).unwrap_err();
        assert_eq!(Some(DecodeErrorKind::Checksum), err.decode_error_kind());
        assert_eq!(ChecksumPolicy::Warn, ChecksumPolicy::default());
    }

    #[test]
    fn single_byte_corruption_is_detected() {
        let mut rng = thread_rng();
        for _ in 0..500 {
            let len = rng.gen_range(1..=300);
            let mut data = vec![0u8; len];
            rng.fill(&mut data[..]);
            let s8 = sum8(0, &data);
            let s16 = sum16(&data);
            let index = rng.gen_range(0..len);
            let delta = rng.gen_range(1..=255u8);
            data[index] = data[index].wrapping_add(delta);
            assert_ne!(s8, sum8(0, &data));
            assert_ne!(s16, sum16(&data));
        }
    }
}
