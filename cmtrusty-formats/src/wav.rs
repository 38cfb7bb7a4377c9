/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! **WAV** audio input and output.
//!
//! Only linear integer PCM of 8 or 16 bits per sample is accepted. Samples are provided centered
//! around zero regardless of the container's 8-bit unsigned representation.
use std::io::{self, Read, Seek, Write};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use cmtrusty_core::audio::PcmFormat;
use cmtrusty_core::error::{decode_error, DecodeErrorKind};

/// An iterator over the first channel's samples of a **WAV** stream.
///
/// Iteration ends at the end of the stream or on the first error. Use [WavSamples::take_err]
/// to distinguish between both cases.
pub struct WavSamples<R> {
    samples: hound::WavIntoSamples<R, i32>,
    format: PcmFormat,
    index: u32,
    err: Option<io::Error>,
}

/// Reads and validates a **WAV** header from `rd` and returns an iterator of samples.
///
/// Returns an error with [DecodeErrorKind::UnsupportedInput] if the audio isn't
/// 8 or 16-bit integer PCM.
pub fn read_wav<R: Read>(rd: R) -> io::Result<WavSamples<R>> {
    let reader = hound::WavReader::new(rd).map_err(hound_error)?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int {
        return Err(decode_error(DecodeErrorKind::UnsupportedInput,
                                "only linear integer PCM audio is supported"))
    }
    let format = PcmFormat::new(spec.sample_rate, spec.bits_per_sample, spec.channels)?;
    info!("sample rate: {} Hz, bits/sample: {}, channels: {}, duration: {} frames",
          format.sample_rate, format.bits_per_sample, format.channels, reader.duration());
    if format.channels > 1 {
        debug!("decoding channel 0 of {}", format.channels);
    }
    Ok(WavSamples {
        samples: reader.into_samples(),
        format,
        index: 0,
        err: None
    })
}

impl<R> WavSamples<R> {
    pub fn format(&self) -> PcmFormat {
        self.format
    }
    /// Returns the error which ended the iteration, if any.
    pub fn take_err(&mut self) -> Option<io::Error> {
        self.err.take()
    }
}

impl<R: Read> Iterator for WavSamples<R> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.err.is_some() {
            return None
        }
        let channels = u32::from(self.format.channels);
        loop {
            match self.samples.next()? {
                Ok(sample) => {
                    let channel = self.index % channels;
                    self.index = self.index.wrapping_add(1);
                    if channel == 0 {
                        return Some(sample)
                    }
                }
                Err(e) => {
                    self.err = Some(hound_error(e));
                    return None
                }
            }
        }
    }
}

/// Writes mono `samples` as a **WAV** stream in the given `format`.
///
/// Samples are clamped to the range of the format's bit depth.
pub fn write_wav<W, I>(format: PcmFormat, samples: I, wr: W) -> io::Result<()>
    where W: Write + Seek,
          I: IntoIterator<Item=i32>
{
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: hound::SampleFormat::Int
    };
    let (min, max) = (format.amplitude_min(), format.amplitude_max());
    let mut writer = hound::WavWriter::new(wr, spec).map_err(hound_error)?;
    for sample in samples {
        writer.write_sample(sample.max(min).min(max)).map_err(hound_error)?;
    }
    writer.finalize().map_err(hound_error)
}

fn hound_error(err: hound::Error) -> io::Error {
    match err {
        hound::Error::IoError(e) => e,
        hound::Error::UnfinishedSample => io::Error::new(io::ErrorKind::UnexpectedEof,
                                                         "the audio stream ends inside of a sample"),
        e => decode_error(DecodeErrorKind::UnsupportedInput, e.to_string())
    }
}
