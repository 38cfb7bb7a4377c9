/*
    Copyright (C) 2026  CMTRUSTY contributors

    This file is part of CMTRUSTY, a Rust library for decoding cassette tape recordings.

    For the full copyright notice, see the lib.rs file.
*/
//! Bits recovered from emulator trace logs of the **FB** tape saving routine.
//!
//! A trace log can stand in for a real recording. Two kinds of logs are recognized:
//!
//! * [TraceKind::PortWrites] watches writes to the tape port. Each bit is a write of `#$FF`
//!   followed by a delay loop of `DEC` instructions. The number of loop iterations
//!   tells the bit value.
//! * [TraceKind::Execution] watches the two instructions loading the delay constant of
//!   a 0 (`#$34`) and a 1 (`#$6A`) bit.
use core::fmt;
use std::io::{self, BufRead, Write};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use cmtrusty_core::bits::{Bit, BitSink};
use cmtrusty_core::error::{decode_error, DecodeErrorKind};

/// The number of `DEC` instructions after a high port write encoding a 0 bit.
pub const PORT_ZERO_DECS: u32 = 52;
/// The number of `DEC` instructions after a high port write encoding a 1 bit.
pub const PORT_ONE_DECS: u32 = 106;

const LOAD: &str = "LDA";
const DECREMENT: &str = "DEC";
const PORT_LOW: &str = "#$04";
const PORT_HIGH: &str = "#$FF";
const DELAY_ZERO: &str = "#$34";
const DELAY_ONE: &str = "#$6A";

#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceKind {
    PortWrites,
    Execution,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TraceKind::PortWrites => "port writes",
            TraceKind::Execution => "execution"
        })
    }
}

#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PortPhase {
    Idle,
    Low,
    High,
}

/// Recovers bits from trace log lines.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceLogDemodulator {
    kind: TraceKind,
    phase: PortPhase,
    decs: u32,
    line: u64,
}

impl TraceLogDemodulator {
    pub fn new(kind: TraceKind) -> Self {
        TraceLogDemodulator { kind, phase: PortPhase::Idle, decs: 0, line: 0 }
    }

    pub fn kind(&self) -> TraceKind {
        self.kind
    }
    /// Returns the number of lines processed so far.
    pub fn lines(&self) -> u64 {
        self.line
    }

    fn close_measurement<S: BitSink>(&mut self, mut sink: S) -> io::Result<()> {
        if self.phase != PortPhase::High {
            return Ok(())
        }
        let bit = match self.decs {
            PORT_ZERO_DECS => Bit::Zero,
            PORT_ONE_DECS => Bit::One,
            decs => return Err(decode_error(DecodeErrorKind::Protocol,
                                format!("invalid trace log at line {}: {} {} instructions after a high write",
                                        self.line, decs, DECREMENT)))
        };
        self.phase = PortPhase::Idle;
        sink.write_bit(bit)
    }
    /// Processes a single trace log `line`.
    pub fn push_line<S: BitSink>(&mut self, line: &str, mut sink: S) -> io::Result<()> {
        self.line += 1;
        match self.kind {
            TraceKind::PortWrites => {
                if line.contains(LOAD) {
                    self.close_measurement(&mut sink)?;
                    if line.contains(PORT_LOW) {
                        self.phase = PortPhase::Low;
                        self.decs = 0;
                    }
                    if line.contains(PORT_HIGH) {
                        self.phase = PortPhase::High;
                        self.decs = 0;
                    }
                }
                if line.contains(DECREMENT) {
                    self.decs += 1;
                }
                Ok(())
            }
            TraceKind::Execution => {
                if line.contains(DELAY_ZERO) {
                    sink.write_bit(Bit::Zero)?;
                }
                if line.contains(DELAY_ONE) {
                    sink.write_bit(Bit::One)?;
                }
                Ok(())
            }
        }
    }
    /// Flushes the last measurement.
    pub fn finish<S: BitSink>(&mut self, sink: S) -> io::Result<()> {
        self.close_measurement(sink)
    }
    /// Processes all lines from `rd` and flushes the last measurement.
    pub fn demodulate<R: BufRead, S: BitSink>(&mut self, rd: R, mut sink: S) -> io::Result<()> {
        for line in rd.lines() {
            self.push_line(&line?, &mut sink)?;
        }
        self.finish(&mut sink)?;
        debug!("{} trace log: {} lines", self.kind, self.line);
        Ok(())
    }
}

/// Writes `bits` as a trace log of the given `kind` accepted by [TraceLogDemodulator].
///
/// [Bit::Error] is skipped.
pub fn write_trace_log<I, W>(kind: TraceKind, bits: I, mut wr: W) -> io::Result<()>
    where I: IntoIterator<Item=Bit>,
          W: Write
{
    for bit in bits {
        match (kind, bit) {
            (_, Bit::Error) => {}
            (TraceKind::Execution, Bit::Zero) => writeln!(wr, "B587 LDA {}", DELAY_ZERO)?,
            (TraceKind::Execution, Bit::One) => writeln!(wr, "B591 LDA {}", DELAY_ONE)?,
            (TraceKind::PortWrites, bit) => {
                let decs = if bit.is_one() { PORT_ONE_DECS } else { PORT_ZERO_DECS };
                for port in [PORT_HIGH, PORT_LOW].iter() {
                    writeln!(wr, "B597 $A9 ${}     {} {}", &port[2..], LOAD, port)?;
                    for _ in 0..decs {
                        writeln!(wr, "B59C $C6 $1C     {} $001C", DECREMENT)?;
                    }
                }
            }
        }
    }
    Ok(())
}
