/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! Decoding errors.
//!
//! All stream facing functions of this library return [io::Result]. Failures detected by
//! the decoders themselves are wrapped [DecodeError]s. Use one of the [IoErrorExt] methods
//! to get to them.
use core::fmt;
use std::io;

/// The category of a [DecodeError].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    /// Input that can't be decoded at all: wrong audio encoding, bit depth, magic or version.
    UnsupportedInput,
    /// A start or stop bit violation inside of an already synchronized frame.
    Framing,
    /// A block structure violation: wrong tape marks, end bits or an unknown block type.
    Protocol,
    /// A checksum mismatch promoted to an error.
    Checksum,
}

/// The type of the error reported by the decoders.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeError {
    /// The error category.
    pub kind: DecodeErrorKind,
    /// A human readable description.
    pub description: String,
}

impl std::error::Error for DecodeError {}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DecodeErrorKind::UnsupportedInput => "unsupported input",
            DecodeErrorKind::Framing => "framing error",
            DecodeErrorKind::Protocol => "protocol violation",
            DecodeErrorKind::Checksum => "checksum mismatch",
        })
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl<S: Into<String>> From<(DecodeErrorKind, S)> for DecodeError {
    fn from((kind, description): (DecodeErrorKind, S)) -> Self {
        DecodeError { kind, description: description.into() }
    }
}

impl From<DecodeError> for io::Error {
    /// Input contract violations become [io::ErrorKind::InvalidInput], the rest
    /// [io::ErrorKind::InvalidData].
    fn from(err: DecodeError) -> Self {
        let kind = match err.kind {
            DecodeErrorKind::UnsupportedInput => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::InvalidData
        };
        io::Error::new(kind, err)
    }
}

impl DecodeError {
    /// Creates a new error.
    pub fn new<S: Into<String>>(kind: DecodeErrorKind, description: S) -> Self {
        DecodeError::from((kind, description))
    }
}

/// Returns an [io::Error] wrapping a new [DecodeError].
pub fn decode_error<S: Into<String>>(kind: DecodeErrorKind, description: S) -> io::Error {
    DecodeError::new(kind, description).into()
}

/// A trait with helpers for extracting [DecodeError] from [io::Error].
pub trait IoErrorExt: Sized {
    fn is_decode_error(&self) -> bool {
        self.decode_error_ref().is_some()
    }
    fn decode_error_kind(&self) -> Option<DecodeErrorKind> {
        self.decode_error_ref().map(|e| e.kind)
    }
    fn into_decode_error(self) -> Option<Box<DecodeError>>;
    fn decode_error_ref(&self) -> Option<&DecodeError>;
}

impl IoErrorExt for io::Error {
    fn into_decode_error(self) -> Option<Box<DecodeError>> {
        if let Some(inner) = self.into_inner() {
            if let Ok(err) = inner.downcast::<DecodeError>() {
                return Some(err)
            }
        }
        None
    }
    fn decode_error_ref(&self) -> Option<&DecodeError> {
        if let Some(inner) = self.get_ref() {
            if let Some(err) = inner.downcast_ref::<DecodeError>() {
                return Some(err)
            }
        }
        None
    }
}
