//! # Printer Module
//!
//! This module provides printer-specific configurations and utilities.
//!
//! ## Modules
//!
//! - [`config`]: Printer hardware specifications and the tape-width table

pub mod config;

pub use config::{HEAD_PINS, LINE_BYTES, PrinterModel, TapeWidth, USB_VENDOR_BROTHER};
