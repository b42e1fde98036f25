//! # Print Job Driver
//!
//! Sequences one connection through the raster command grammar.
//!
//! ## State Machine
//!
//! ```text
//! Disconnected ──connect──▶ Connected ──initialize──▶ Initialized
//!                                                         │
//!                                                    enter raster
//!                                                         ▼
//!   ┌──────────── stream lines ───────────────────── RasterMode
//!   ▼
//! StreamingLines(k) ──print──▶ Printing(k) ──stream lines──▶ StreamingLines(k+1)
//!                                   │
//!                                finalize
//!                                   ▼
//!                               Finalized
//!
//! any live state ──transport failure──▶ Failed(message)
//! ```
//!
//! Allowed moves are decided by the pure function [`transition`]. The driver
//! checks the move *before* sending anything, so an illegal call leaves both
//! the printer and the driver untouched.
//!
//! ## Command Order per Job
//!
//! | Step | Commands |
//! |------|----------|
//! | initialize | invalidate, `ESC @`, `ESC i S` (+ 32-byte reply) |
//! | enter raster | `ESC i a 01`, `ESC i z`, `ESC i ! 00`, `ESC i M`, `ESC i K`, `ESC i d`, `M 02` |
//! | each label | `G`/`Z` per line, then `0C` or `1A` |
//! | finalize | `ESC i S` (+ reply) |

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::commands::{self, CommandMode, PagePosition, PrintInformation};
use super::status::{PrinterStatus, STATUS_FRAME_LEN, StatusReport, StatusType};
use crate::error::{LabelError, ProtocolError, TransportError};
use crate::printer::{TapeWidth, config::MINIMUM_TAPE_DOTS};
use crate::raster::{RasterLine, packbits};
use crate::transport::{Session, Transport};

/// Wait after "printing completed" for the trailing phase-change frame
const PHASE_CHANGE_GRACE: Duration = Duration::from_millis(500);

// ============================================================================
// JOB OPTIONS
// ============================================================================

/// Per-job printer settings.
///
/// Every field has a default, so a JSON job file only needs to name what it
/// changes:
///
/// ```
/// use ptlabel::protocol::driver::JobOptions;
///
/// let options: JobOptions = serde_json::from_str(r#"{"continuous": true}"#).unwrap();
/// assert!(options.continuous);
/// assert!(options.compression);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Print labels back to back, cutting only after the last one
    pub continuous: bool,
    /// Enable the auto cutter
    pub auto_cut: bool,
    /// Send raster lines in PackBits (TIFF) mode
    pub compression: bool,
    /// Ask for the slower high-quality print mode
    pub high_quality: bool,
    /// Feed before and after each label (dots)
    pub feed_margin_dots: u16,
    /// Media type byte for print information; taken from status when unset
    pub media_type: Option<u8>,
    /// How long to wait for a status reply
    pub status_timeout_ms: u64,
    /// Status requests sent during initialization before giving up
    pub status_attempts: u8,
    /// Wait for a "printing completed" frame after every label
    pub confirm_completion: bool,
    /// How long to wait for that frame
    pub completion_timeout_ms: u64,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            continuous: false,
            auto_cut: true,
            compression: true,
            high_quality: false,
            feed_margin_dots: 0,
            media_type: None,
            status_timeout_ms: 1_000,
            status_attempts: 3,
            confirm_completion: false,
            completion_timeout_ms: 30_000,
        }
    }
}

impl JobOptions {
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Where a job is in the command sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Disconnected,
    Connected,
    Initialized,
    RasterMode,
    /// Sending raster lines of label `label` (0-based within the job)
    StreamingLines { label: usize },
    /// Print command for `label` has been sent
    Printing { label: usize },
    Finalized,
    Failed(String),
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Disconnected => write!(f, "disconnected"),
            DriverState::Connected => write!(f, "connected"),
            DriverState::Initialized => write!(f, "initialized"),
            DriverState::RasterMode => write!(f, "in raster mode"),
            DriverState::StreamingLines { label } => write!(f, "streaming label {}", label),
            DriverState::Printing { label } => write!(f, "printing label {}", label),
            DriverState::Finalized => write!(f, "finalized"),
            DriverState::Failed(msg) => write!(f, "failed ({})", msg),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Connect,
    Initialize,
    EnterRaster,
    StreamLines,
    Print,
    Finalize,
    Fail(String),
}

impl fmt::Display for DriverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverEvent::Connect => write!(f, "connect"),
            DriverEvent::Initialize => write!(f, "initialize"),
            DriverEvent::EnterRaster => write!(f, "enter raster mode"),
            DriverEvent::StreamLines => write!(f, "stream lines"),
            DriverEvent::Print => write!(f, "print"),
            DriverEvent::Finalize => write!(f, "finalize"),
            DriverEvent::Fail(_) => write!(f, "fail"),
        }
    }
}

/// Next state for `event` in `state`, or `IllegalTransition`.
///
/// `Finalize` is accepted from `Initialized` and `RasterMode` too, for status
/// queries and jobs where no label survived rendering.
pub fn transition(state: &DriverState, event: &DriverEvent) -> Result<DriverState, ProtocolError> {
    use DriverEvent as E;
    use DriverState as S;

    let next = match (state, event) {
        (S::Disconnected, E::Connect) => S::Connected,
        (S::Connected, E::Initialize) => S::Initialized,
        (S::Initialized, E::EnterRaster) => S::RasterMode,
        (S::RasterMode, E::StreamLines) => S::StreamingLines { label: 0 },
        (S::Printing { label }, E::StreamLines) => S::StreamingLines { label: label + 1 },
        (S::StreamingLines { label }, E::Print) => S::Printing { label: *label },
        (S::Initialized | S::RasterMode | S::Printing { .. }, E::Finalize) => S::Finalized,
        (S::Finalized | S::Failed(_), E::Fail(_)) => return Err(illegal(state, event)),
        (_, E::Fail(msg)) => S::Failed(msg.clone()),
        _ => return Err(illegal(state, event)),
    };
    Ok(next)
}

fn illegal(state: &DriverState, event: &DriverEvent) -> ProtocolError {
    ProtocolError::IllegalTransition {
        state: state.to_string(),
        event: event.to_string(),
    }
}

// ============================================================================
// LINE FRAMING
// ============================================================================

/// Frame one raster line as a transfer command.
///
/// With compression on, a blank line becomes `Z`, a compressed line is sent
/// as-is and an uncompressed line is wrapped in a single literal packet.
/// With compression off the raw bytes are sent.
pub fn line_command(line: &RasterLine, compression: bool) -> Result<Vec<u8>, ProtocolError> {
    if compression {
        if line.is_blank() {
            Ok(commands::zero_line())
        } else if line.is_compressed() {
            Ok(commands::raster_line(line.payload()))
        } else {
            Ok(commands::raster_line(&packbits::literal(line.payload())))
        }
    } else {
        Ok(commands::raster_line(&line.decode()?))
    }
}

// ============================================================================
// DRIVER
// ============================================================================

/// # Protocol Driver
///
/// Owns the job's [`Session`] and walks it through the state machine. Every
/// command goes out as its own `send`.
///
/// ## Example
///
/// ```
/// use ptlabel::printer::TapeWidth;
/// use ptlabel::protocol::driver::{Driver, DriverState, JobOptions};
/// use ptlabel::raster::{Bitmap, rasterize};
/// use ptlabel::transport::MockTransport;
///
/// let mut driver = Driver::new(MockTransport::new(), TapeWidth::Mm12, JobOptions::default())?;
/// driver.initialize()?;
/// driver.enter_raster_mode()?;
///
/// let bitmap = Bitmap::from_packed(8, 1, vec![0xFF]).unwrap();
/// driver.print_label(&rasterize(&bitmap, TapeWidth::Mm12, true)?, true)?;
/// driver.finalize()?;
/// assert_eq!(driver.state(), &DriverState::Finalized);
/// driver.finish()?;
/// # Ok::<(), ptlabel::error::LabelError>(())
/// ```
pub struct Driver<T: Transport> {
    session: Session<T>,
    state: DriverState,
    tape: TapeWidth,
    options: JobOptions,
    status: PrinterStatus,
}

impl<T: Transport> Driver<T> {
    /// Take ownership of an open transport.
    pub fn new(transport: T, tape: TapeWidth, options: JobOptions) -> Result<Self, LabelError> {
        let state = transition(&DriverState::Disconnected, &DriverEvent::Connect)?;
        let session = Session::new(transport);
        log::info!("Driver connected to {}", session.describe());
        Ok(Self {
            session,
            state,
            tape,
            options,
            status: PrinterStatus::Unavailable,
        })
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Most recent status snapshot.
    pub fn status(&self) -> &PrinterStatus {
        &self.status
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Reset the printer and read its status.
    ///
    /// The status request is repeated up to `status_attempts` times until a
    /// full frame arrives. A printer that never answers yields `Unavailable`,
    /// which is not an error.
    pub fn initialize(&mut self) -> Result<PrinterStatus, LabelError> {
        let next = self.check(DriverEvent::Initialize)?;

        self.send(&commands::invalidate())?;
        self.send(&commands::initialize())?;

        let mut status = PrinterStatus::Unavailable;
        for attempt in 1..=self.options.status_attempts.max(1) {
            self.send(&commands::status_request())?;
            status = self.read_status()?;
            if status.report().is_some() {
                break;
            }
            log::debug!("No status reply (attempt {})", attempt);
        }

        if let Some(report) = status.report() {
            if report.media_width_mm != 0 && report.media_width_mm != self.tape.code() {
                log::warn!(
                    "Installed tape is {}mm but the label is for {}",
                    report.media_width_mm,
                    self.tape
                );
            }
            if !report.errors.is_empty() {
                log::warn!("Printer reports: {}", report.errors);
            }
        }

        self.status = status.clone();
        self.state = next;
        Ok(status)
    }

    /// Switch to raster mode and send the job's settings.
    pub fn enter_raster_mode(&mut self) -> Result<(), LabelError> {
        let next = self.check(DriverEvent::EnterRaster)?;

        let media_type = self.options.media_type.unwrap_or_else(|| {
            self.status
                .report()
                .map(|r| r.media_type.to_byte())
                .unwrap_or(0)
        });
        let info = PrintInformation {
            media_type,
            width_mm: self.tape.code(),
            length_mm: 0,
            raster_lines: 0,
            quality: self.options.high_quality,
            page: PagePosition::Starting,
        };

        self.send(&commands::switch_mode(CommandMode::Raster))?;
        self.send(&commands::print_information(&info))?;
        self.send(&commands::status_notification(true))?;
        self.send(&commands::various_mode(self.options.auto_cut))?;
        self.send(&commands::advanced_mode(false))?;
        self.send(&commands::margin(self.options.feed_margin_dots))?;
        if self.options.compression {
            self.send(&commands::compression(true))?;
        }

        log::debug!("Raster mode: {:?}", info);
        self.state = next;
        Ok(())
    }

    /// Stream one label's lines and print it.
    ///
    /// `last` marks the final label of the job. In continuous mode only the
    /// last label is fed and cut; otherwise every label is.
    pub fn print_label(&mut self, lines: &[RasterLine], last: bool) -> Result<(), LabelError> {
        let streaming = self.check(DriverEvent::StreamLines)?;
        let printing = transition(&streaming, &DriverEvent::Print)?;

        if lines.len() + self.options.feed_margin_dots as usize * 2 < MINIMUM_TAPE_DOTS {
            log::warn!(
                "Label is {} dots long, shorter than the {} dot minimum; the printer pads it",
                lines.len(),
                MINIMUM_TAPE_DOTS
            );
        }

        self.state = streaming;
        for line in lines {
            let cmd = line_command(line, self.options.compression)?;
            self.send(&cmd)?;
        }

        let print = if self.options.continuous && !last {
            commands::print()
        } else {
            commands::print_and_feed()
        };
        self.send(&print)?;
        self.state = printing;
        log::debug!("Printed label ({} lines, last={})", lines.len(), last);

        if self.options.confirm_completion {
            self.await_completion()?;
        }
        Ok(())
    }

    /// Request a final status frame and close out the state machine.
    pub fn finalize(&mut self) -> Result<PrinterStatus, LabelError> {
        let next = self.check(DriverEvent::Finalize)?;
        self.send(&commands::status_request())?;
        let status = self.read_status()?;
        self.status = status.clone();
        self.state = next;
        Ok(status)
    }

    /// Close the connection.
    pub fn finish(self) -> Result<(), TransportError> {
        self.session.finish()
    }

    // ------------------------------------------------------------------------

    fn check(&self, event: DriverEvent) -> Result<DriverState, ProtocolError> {
        transition(&self.state, &event)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), LabelError> {
        self.session.send(data).map_err(|e| self.fail(e))
    }

    /// Record a fatal error and move to `Failed`.
    fn fail(&mut self, err: impl Into<LabelError>) -> LabelError {
        let err = err.into();
        let msg = err.to_string();
        log::warn!("Driver failed while {}: {}", self.state, msg);
        if let Ok(next) = transition(&self.state, &DriverEvent::Fail(msg)) {
            self.state = next;
        }
        err
    }

    fn read_status(&mut self) -> Result<PrinterStatus, LabelError> {
        let timeout = self.options.status_timeout();
        let frame = self.read_frame(timeout)?;
        Ok(PrinterStatus::from_reply(frame.as_deref()))
    }

    /// Collect up to one status frame, tolerating fragmented reads.
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LabelError> {
        let deadline = Instant::now() + timeout;
        let mut frame = Vec::with_capacity(STATUS_FRAME_LEN);

        while frame.len() < STATUS_FRAME_LEN {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.session.receive(STATUS_FRAME_LEN - frame.len(), remaining) {
                Ok(Some(chunk)) if !chunk.is_empty() => frame.extend_from_slice(&chunk),
                Ok(_) => break,
                Err(e) => return Err(self.fail(e)),
            }
            if remaining.is_zero() {
                break;
            }
        }

        Ok(if frame.is_empty() { None } else { Some(frame) })
    }

    /// Wait for the printer to report the label as printed.
    fn await_completion(&mut self) -> Result<(), LabelError> {
        let deadline = Instant::now() + self.options.completion_timeout();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(frame) = self.read_frame(remaining)? else {
                return Err(self.fail(ProtocolError::CompletionTimeout));
            };

            let report = match StatusReport::parse(&frame) {
                Ok(report) => report,
                Err(e) => {
                    log::debug!("Skipping frame while waiting for completion: {}", e);
                    if remaining.is_zero() {
                        return Err(self.fail(ProtocolError::CompletionTimeout));
                    }
                    continue;
                }
            };

            match report.status_type {
                StatusType::PrintingCompleted => {
                    // The printer follows up with a phase change; drain it.
                    let _ = self.read_frame(PHASE_CHANGE_GRACE)?;
                    self.status = PrinterStatus::Available(report);
                    return Ok(());
                }
                StatusType::ErrorOccurred => {
                    let conditions = report.errors.describe();
                    let msg = if conditions.is_empty() {
                        "unknown printer error".to_string()
                    } else {
                        conditions.join(", ")
                    };
                    self.status = PrinterStatus::Available(report);
                    return Err(self.fail(ProtocolError::Device(msg)));
                }
                StatusType::TurnedOff => {
                    return Err(self.fail(ProtocolError::Device(
                        "printer turned off during printing".to_string(),
                    )));
                }
                other => {
                    log::debug!("Waiting for completion, got {:?}", other);
                    if remaining.is_zero() {
                        return Err(self.fail(ProtocolError::CompletionTimeout));
                    }
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
