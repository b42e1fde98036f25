//! # ptlabel - P-touch Tape Label Library
//!
//! ptlabel prints data-driven labels on Brother P-touch tape printers
//! (PT-E550W, PT-P750W, PT-P710BT) over USB or Bluetooth. It provides:
//!
//! - **Layout**: text, Code 128/39, EAN-13 and QR fields fitted to the tape
//! - **Rasterization**: 128-pin head lines with PackBits compression
//! - **Protocol**: raster command builders, status parsing and a job driver
//! - **Transport**: USB bulk (libusb) and Bluetooth RFCOMM links
//! - **Batch printing**: one label per data row with per-row outcomes
//!
//! ## Quick Start
//!
//! ```no_run
//! use ptlabel::{
//!     batch::Batch,
//!     layout::{DataRow, FieldKind, FieldSpec, LabelSpec},
//!     printer::TapeWidth,
//!     transport::TransportTarget,
//! };
//!
//! let spec = LabelSpec::new(
//!     TapeWidth::Mm12,
//!     vec![
//!         FieldSpec::text("{{name}}"),
//!         FieldSpec::new(FieldKind::Qr, "https://example.com/{{id}}"),
//!     ],
//! );
//! let rows: Vec<DataRow> = vec![
//!     [("name".into(), "Shelf A".into()), ("id".into(), "1".into())].into(),
//!     [("name".into(), "Shelf B".into()), ("id".into(), "2".into())].into(),
//! ];
//!
//! let target = TransportTarget::Usb { serial: None };
//! let result = Batch::new(&spec, &rows).run_on(&target, |row| {
//!     println!("row {}: {:?}", row.index, row.outcome);
//! });
//! assert_eq!(result.totals.total, 2);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`layout`] | Label specs, placeholders and field layout |
//! | [`raster`] | Bitmaps, PackBits and raster lines |
//! | [`protocol`] | Raster commands, status frames, job driver |
//! | [`transport`] | USB, Bluetooth and mock links |
//! | [`batch`] | Multi-row print jobs |
//! | [`preview`] | PNG rendering without a printer |
//! | [`printer`] | Models and tape widths |
//! | [`error`] | Error types |

pub mod batch;
pub mod error;
pub mod layout;
pub mod preview;
pub mod printer;
pub mod protocol;
pub mod raster;
pub mod transport;

// Re-exports for convenience
pub use batch::{Batch, JobFile, PrintResult};
pub use error::LabelError;
pub use printer::TapeWidth;
