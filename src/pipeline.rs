/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! A two stage tape decoding pipeline.
//!
//! The producer stage turns the input into bits: a PCM recording through a quantizer and
//! a demodulator, a **T77** image through the pulse demodulator, or a trace log.
//! The consumer stage frames bits and parses blocks. Both stages run concurrently,
//! connected by a bounded [bit_channel].
//!
//! The input contract (the WAV or **T77** header, tone windows valid for the sample rate)
//! is checked before any thread starts.
use core::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::thread;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use cmtrusty_core::audio::SampleDemodulator;
use cmtrusty_core::bits::{bit_channel, BitReceiver, BitSender};
use cmtrusty_core::checksum::ChecksumPolicy;
use cmtrusty_core::error::{decode_error, DecodeErrorKind};
use cmtrusty_core::frame::{Frame, FrameFormat, FrameReader};
use cmtrusty_formats::fb::{DurationDemodulator, FbBlock, FbBlockReader, FbTiming};
use cmtrusty_formats::kcs::{
    ByteSegment, ByteStreamDecoder, HalfCycleConfig, HalfCycleDemodulator, StreamConfig
};
use cmtrusty_formats::t77::{read_t77, T77Demodulator, T77File, T77FileDecoder, T77Values};
use cmtrusty_formats::trace::{TraceKind, TraceLogDemodulator};
use cmtrusty_formats::wav::{read_wav, WavSamples};

/// The default capacity of the bit channel between both stages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// The kind of the decoded input.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TapeFormat {
    /// A PCM recording of **FB** duration encoded blocks.
    Fb,
    /// A PCM recording of a Kansas City Standard byte stream.
    Kcs,
    /// A PCM recording of an MSX byte stream.
    Msx,
    /// A **T77** tape image.
    T77 { reverse: bool },
    /// An emulator trace log of the **FB** tape saving routine.
    TraceLog(TraceKind),
}

impl fmt::Display for TapeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeFormat::Fb => f.write_str("FB"),
            TapeFormat::Kcs => f.write_str("KCS"),
            TapeFormat::Msx => f.write_str("MSX"),
            TapeFormat::T77 { reverse: false } => f.write_str("T77"),
            TapeFormat::T77 { reverse: true } => f.write_str("T77 (reverse)"),
            TapeFormat::TraceLog(kind) => write!(f, "{} trace log", kind)
        }
    }
}

/// Pipeline options.
///
/// Unset configurations are resolved from the [TapeFormat]: Kansas City Standard streams are
/// decoded with [HalfCycleConfig::kcs] and [StreamConfig::strict], MSX streams with
/// [HalfCycleConfig::msx] and [StreamConfig::lenient].
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    pub channel_capacity: usize,
    pub fb_timing: FbTiming,
    pub fb_checksum: ChecksumPolicy,
    pub half_cycle: Option<HalfCycleConfig>,
    pub stream: Option<StreamConfig>,
    pub t77_checksum: ChecksumPolicy,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            fb_timing: FbTiming::default(),
            fb_checksum: ChecksumPolicy::Warn,
            half_cycle: None,
            stream: None,
            t77_checksum: ChecksumPolicy::Strict,
        }
    }
}

impl DecodeOptions {
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_fb_timing(mut self, timing: FbTiming) -> Self {
        self.fb_timing = timing;
        self
    }

    pub fn with_fb_checksum(mut self, policy: ChecksumPolicy) -> Self {
        self.fb_checksum = policy;
        self
    }

    pub fn with_half_cycle(mut self, config: HalfCycleConfig) -> Self {
        self.half_cycle = Some(config);
        self
    }

    pub fn with_stream(mut self, config: StreamConfig) -> Self {
        self.stream = Some(config);
        self
    }

    pub fn with_t77_checksum(mut self, policy: ChecksumPolicy) -> Self {
        self.t77_checksum = policy;
        self
    }

    fn half_cycle_for(&self, format: TapeFormat) -> HalfCycleConfig {
        self.half_cycle.unwrap_or_else(|| match format {
            TapeFormat::Msx => HalfCycleConfig::msx(),
            _ => HalfCycleConfig::kcs()
        })
    }

    fn stream_for(&self, format: TapeFormat) -> StreamConfig {
        self.stream.unwrap_or_else(|| match format {
            TapeFormat::Msx => StreamConfig::lenient(),
            _ => StreamConfig::strict()
        })
    }
}

/// The result of decoding.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// **FB** blocks from a recording or a trace log.
    Blocks(Vec<FbBlock>),
    /// Bytes of a Kansas City Standard or an MSX stream with the segments they were found in.
    Stream { data: Vec<u8>, segments: Vec<ByteSegment> },
    /// All framed bytes of a **T77** image and the files assembled from them.
    T77 { data: Vec<u8>, files: Vec<T77File> },
}

enum PcmDemodulator {
    Duration(DurationDemodulator),
    HalfCycle(HalfCycleDemodulator),
}

enum Producer<R> {
    Pcm(WavSamples<R>, PcmDemodulator),
    T77(T77Values<BufReader<R>>, T77Demodulator),
    Trace(BufReader<R>, TraceLogDemodulator),
}

fn demodulate_pcm<D, R>(mut demod: D, samples: &mut WavSamples<R>, sink: BitSender) -> io::Result<()>
    where D: SampleDemodulator,
          R: Read
{
    demod.demodulate(samples.by_ref(), sink)?;
    match samples.take_err() {
        Some(err) => Err(err),
        None => Ok(())
    }
}

impl<R: Read> Producer<R> {
    fn run(self, sink: BitSender) -> io::Result<()> {
        match self {
            Producer::Pcm(mut samples, PcmDemodulator::Duration(demod)) => {
                demodulate_pcm(demod, &mut samples, sink)
            }
            Producer::Pcm(mut samples, PcmDemodulator::HalfCycle(demod)) => {
                demodulate_pcm(demod, &mut samples, sink)
            }
            Producer::T77(mut values, mut demod) => {
                demod.write_decoded_values(values.by_ref(), sink)?;
                match values.take_err() {
                    Some(err) => Err(err),
                    None => Ok(())
                }
            }
            Producer::Trace(rd, mut demod) => demod.demodulate(rd, sink)
        }
    }
}

/// Decodes tape recordings, images and trace logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapeDecoder {
    format: TapeFormat,
    options: DecodeOptions,
}

impl TapeDecoder {
    pub fn new(format: TapeFormat) -> Self {
        TapeDecoder { format, options: DecodeOptions::default() }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn format(&self) -> TapeFormat {
        self.format
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }
    /// Decodes the whole input from `rd`.
    ///
    /// # Errors
    /// * An invalid header or a PCM format unsuitable for the tape format is reported with
    ///   [DecodeErrorKind::UnsupportedInput] before any decoding starts.
    /// * Framing, protocol and checksum errors of the consumer stage.
    /// * Errors of the input reader and a truncated input.
    pub fn decode<R: Read + Send + 'static>(&self, rd: R) -> io::Result<Decoded> {
        let producer = self.producer(rd)?;
        let (tx, rx) = bit_channel(self.options.channel_capacity);
        let handle = thread::Builder::new()
            .name(format!("{} demodulator", self.format))
            .spawn(move || producer.run(tx))?;

        let consumed = self.consume(rx);

        let produced = match handle.join() {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(io::ErrorKind::Other, "demodulator thread panicked"))
        };
        match produced {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("demodulator stopped: {}", e);
            }
            Err(e) => {
                if let Err(ref cerr) = consumed {
                    debug!("consumer error after a demodulator failure: {}", cerr);
                }
                return Err(e)
            }
            Ok(()) => {}
        }
        consumed
    }

    fn producer<R: Read>(&self, rd: R) -> io::Result<Producer<R>> {
        let format = self.format;
        info!("decoding {}", format);
        Ok(match format {
            TapeFormat::Fb => {
                let samples = read_wav(rd)?;
                let pcm = samples.format();
                info!("{:?}", pcm);
                let demod = DurationDemodulator::with_timing(&pcm, &self.options.fb_timing);
                Producer::Pcm(samples, PcmDemodulator::Duration(demod))
            }
            TapeFormat::Kcs|TapeFormat::Msx => {
                let samples = read_wav(rd)?;
                let pcm = samples.format();
                info!("{:?}", pcm);
                let demod = HalfCycleDemodulator::new(&pcm, &self.options.half_cycle_for(format))?;
                Producer::Pcm(samples, PcmDemodulator::HalfCycle(demod))
            }
            TapeFormat::T77 { reverse } => {
                let values = read_t77(BufReader::new(rd))?;
                Producer::T77(values, T77Demodulator::new(reverse))
            }
            TapeFormat::TraceLog(kind) => {
                let mut rd = BufReader::new(rd);
                if rd.fill_buf()?.contains(&0) {
                    return Err(decode_error(DecodeErrorKind::UnsupportedInput,
                                            "a trace log can't contain NUL characters"))
                }
                Producer::Trace(rd, TraceLogDemodulator::new(kind))
            }
        })
    }

    fn consume(&self, rx: BitReceiver) -> io::Result<Decoded> {
        match self.format {
            TapeFormat::Fb|TapeFormat::TraceLog(..) => {
                let blocks = FbBlockReader::new(rx)
                    .with_checksum_policy(self.options.fb_checksum)
                    .read_blocks()?;
                Ok(Decoded::Blocks(blocks))
            }
            TapeFormat::Kcs|TapeFormat::Msx => {
                let mut data = Vec::new();
                let segments = ByteStreamDecoder::new(self.options.stream_for(self.format))
                    .decode(rx, &mut data)?;
                Ok(Decoded::Stream { data, segments })
            }
            TapeFormat::T77 {..} => {
                let mut frames = FrameReader::new(rx, FrameFormat::UART_LENIENT);
                let mut decoder = T77FileDecoder::new(self.options.t77_checksum);
                let mut data = Vec::new();
                let mut files = Vec::new();
                while let Some(frame) = frames.next_frame()? {
                    match frame {
                        Frame::Byte(byte) => {
                            data.push(byte);
                            files.extend(decoder.push_byte(byte)?);
                        }
                        frame => return Err(decode_error(DecodeErrorKind::Framing,
                                    format!("{:?} at byte {}", frame, data.len())))
                    }
                }
                files.extend(decoder.finish()?);
                Ok(Decoded::T77 { data, files })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_options_work() {
        let options = DecodeOptions::default();
        assert_eq!(1, options.channel_capacity);
        assert_eq!(HalfCycleConfig::kcs(), options.half_cycle_for(TapeFormat::Kcs));
        assert_eq!(HalfCycleConfig::msx(), options.half_cycle_for(TapeFormat::Msx));
        assert_eq!(StreamConfig::strict(), options.stream_for(TapeFormat::Kcs));
        assert_eq!(StreamConfig::lenient(), options.stream_for(TapeFormat::Msx));
        let options = options.with_half_cycle(HalfCycleConfig::kcs_legacy())
                             .with_stream(StreamConfig::strict())
                             .with_channel_capacity(64);
        assert_eq!(64, options.channel_capacity);
        assert_eq!(HalfCycleConfig::kcs_legacy(), options.half_cycle_for(TapeFormat::Msx));
        assert_eq!(StreamConfig::strict(), options.stream_for(TapeFormat::Msx));
    }

    #[test]
    fn t77_block_errors_stop_demodulation() -> io::Result<()> {
        use std::io::Cursor;
        use cmtrusty_core::error::IoErrorExt;
        use cmtrusty_formats::t77::{t77_file_blocks, T77Encoder};

        let mut data = t77_file_blocks(b"FIRST", 0x00_0000, b"10 END");
        data[4] ^= 0x20;
        for n in 0..20u8 {
            data.extend(t77_file_blocks(&[b'F', b'A' + n], 0x00_0000, &[n; 200]));
        }
        let mut image = Vec::new();
        T77Encoder::default().write_image(&data, &mut image)?;
        let decoder = TapeDecoder::new(TapeFormat::T77 { reverse: false });
        let producer = decoder.producer(Cursor::new(image))?;
        let (tx, rx) = bit_channel(decoder.options().channel_capacity);
        let handle = thread::spawn(move || producer.run(tx));
        let err = decoder.consume(rx).unwrap_err();
        assert_eq!(Some(DecodeErrorKind::Checksum), err.decode_error_kind());
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(io::ErrorKind::BrokenPipe, err.kind());
        Ok(())
    }

    #[test]
    fn tape_format_display_works() {
        assert_eq!("T77 (reverse)", TapeFormat::T77 { reverse: true }.to_string());
        assert_eq!("execution trace log", TapeFormat::TraceLog(TraceKind::Execution).to_string());
    }
}
