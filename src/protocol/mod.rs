//! # P-touch Raster Protocol
//!
//! This module implements the raster command set used by Brother P-touch
//! tape printers (PT-E550W, PT-P750W, PT-P710BT).
//!
//! ## Module Structure
//!
//! - [`commands`]: Byte builders for every command the driver sends
//! - [`status`]: 32-byte status frame parsing
//! - [`driver`]: State machine that sequences a job over a transport
//!
//! ## Usage Example
//!
//! ```
//! use ptlabel::protocol::commands;
//!
//! // Reset the printer and ask for its status
//! let mut data = Vec::new();
//! data.extend(commands::invalidate());
//! data.extend(commands::initialize());
//! data.extend(commands::status_request());
//! assert_eq!(data.len(), 100 + 2 + 3);
//! ```
//!
//! ## Protocol Reference
//!
//! Brother "Software Developer's Manual: Raster Command Reference" for the
//! PT-E550W/P750W/P710BT.

pub mod commands;
pub mod driver;
pub mod status;

pub use driver::{Driver, DriverEvent, DriverState, JobOptions, transition};
pub use status::{ErrorFlags, MediaType, PrinterStatus, StatusReport, StatusType};
