//! # USB Bulk Transport
//!
//! Talks to P-touch printers attached over USB using libusb (via `rusb`).
//!
//! ## Endpoints
//!
//! | Direction | Endpoint | Use |
//! |-----------|----------|-----|
//! | OUT | 0x02 | Commands and raster data |
//! | IN | 0x81 | Status frames |
//!
//! ## Device Selection
//!
//! Devices are matched by Brother's vendor ID (0x04F9) and a product ID from
//! [`PrinterModel::SUPPORTED`]. When a serial number is given only that
//! device is opened; otherwise the first match wins.
//!
//! ## Permissions (Linux)
//!
//! Opening the device requires write access to its `/dev/bus/usb` node,
//! usually granted with a udev rule:
//!
//! ```text
//! SUBSYSTEM=="usb", ATTR{idVendor}=="04f9", MODE="0666"
//! ```

use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};

use super::{DeviceDescriptor, Transport};
use crate::error::TransportError;
use crate::printer::{PrinterModel, USB_VENDOR_BROTHER};

/// Bulk OUT endpoint
const EP_OUT: u8 = 0x02;

/// Bulk IN endpoint
const EP_IN: u8 = 0x81;

/// Printer interface number
const INTERFACE: u8 = 0;

/// Largest bulk packet written at once (bytes)
const PACKET_SIZE: usize = 0x40;

/// Timeout for each bulk write
const WRITE_TIMEOUT: Duration = Duration::from_millis(15_000);

/// # USB Printer Transport
///
/// Owns a claimed interface on one printer. [`close`](Transport::close)
/// releases the interface and the device handle.
pub struct UsbTransport {
    handle: Option<DeviceHandle<GlobalContext>>,
    model: PrinterModel,
    serial: Option<String>,
}

impl UsbTransport {
    /// Open the printer with the given serial number, or the first one found.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - No supported printer is attached (or none with that serial)
    /// - The device cannot be opened (permissions, busy)
    /// - The interface cannot be claimed
    pub fn open(serial: Option<&str>) -> Result<Self, TransportError> {
        let devices = rusb::devices().map_err(|e| TransportError::Connect(e.to_string()))?;

        for device in devices.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };
            let Some(model) = supported_model(&desc) else {
                continue;
            };

            let mut handle = device
                .open()
                .map_err(|e| TransportError::Connect(format!("{}: {}", model.name, e)))?;
            let device_serial = handle.read_serial_number_string_ascii(&desc).ok();

            if let Some(wanted) = serial {
                if device_serial.as_deref() != Some(wanted) {
                    log::debug!(
                        "Skipping {} with serial {:?}",
                        model.name,
                        device_serial
                    );
                    continue;
                }
            }

            claim(&mut handle)?;
            log::info!(
                "USB connected: {} (serial {})",
                model.name,
                device_serial.as_deref().unwrap_or("unknown")
            );
            return Ok(Self {
                handle: Some(handle),
                model,
                serial: device_serial,
            });
        }

        Err(TransportError::NotFound(match serial {
            Some(s) => format!("no USB printer with serial {}", s),
            None => "no USB printer attached".to_string(),
        }))
    }

    pub fn model(&self) -> PrinterModel {
        self.model
    }

    fn handle(&self) -> Result<&DeviceHandle<GlobalContext>, TransportError> {
        self.handle.as_ref().ok_or(TransportError::Closed)
    }
}

impl Transport for UsbTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let handle = self.handle()?;
        let mut sent = 0;

        while sent < data.len() {
            let end = (sent + PACKET_SIZE).min(data.len());
            let written = handle
                .write_bulk(EP_OUT, &data[sent..end], WRITE_TIMEOUT)
                .map_err(|e| TransportError::Send(e.to_string()))?;
            if written == 0 {
                return Err(TransportError::Send(
                    "IO timeout while writing to printer".to_string(),
                ));
            }
            sent += written;
        }

        Ok(())
    }

    fn receive(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let handle = self.handle()?;
        let mut buf = vec![0u8; max_len];

        match handle.read_bulk(EP_IN, &mut buf, timeout) {
            Ok(0) => Ok(None),
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => Err(TransportError::Receive(e.to_string())),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut handle) = self.handle.take() {
            handle
                .release_interface(INTERFACE)
                .map_err(|e| TransportError::Connect(format!("release failed: {}", e)))?;
            log::info!("USB disconnected: {}", self.model.name);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.serial {
            Some(serial) => format!("{} (USB {})", self.model.name, serial),
            None => format!("{} (USB)", self.model.name),
        }
    }
}

/// Detach any kernel driver, select the configuration and claim the
/// printer interface.
fn claim(handle: &mut DeviceHandle<GlobalContext>) -> Result<(), TransportError> {
    // Not every platform supports auto-detach; the claim below reports the
    // real failure if a driver is still bound.
    if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
        log::debug!("Kernel driver auto-detach unavailable: {}", e);
    }
    if let Err(e) = handle.set_active_configuration(1) {
        log::debug!("set_active_configuration: {}", e);
    }
    handle
        .claim_interface(INTERFACE)
        .map_err(|e| TransportError::Connect(format!("claim interface failed: {}", e)))
}

fn supported_model(desc: &rusb::DeviceDescriptor) -> Option<PrinterModel> {
    if desc.vendor_id() != USB_VENDOR_BROTHER {
        return None;
    }
    PrinterModel::by_product_id(desc.product_id())
}

/// Enumerate attached supported printers.
///
/// Devices that cannot be opened are still listed, with the model name as
/// product and no serial.
pub fn discover() -> Result<Vec<DeviceDescriptor>, TransportError> {
    let devices = rusb::devices().map_err(|e| TransportError::Discovery(e.to_string()))?;

    let mut found = Vec::new();
    for device in devices.iter() {
        let Ok(desc) = device.device_descriptor() else {
            continue;
        };
        let Some(model) = supported_model(&desc) else {
            continue;
        };

        let (product, serial, manufacturer) = match device.open() {
            Ok(handle) => (
                handle
                    .read_product_string_ascii(&desc)
                    .unwrap_or_else(|_| model.name.to_string()),
                handle.read_serial_number_string_ascii(&desc).ok(),
                handle.read_manufacturer_string_ascii(&desc).ok(),
            ),
            Err(e) => {
                log::debug!("Cannot open {} for descriptors: {}", model.name, e);
                (model.name.to_string(), None, None)
            }
        };

        found.push(DeviceDescriptor::Usb {
            product,
            serial,
            manufacturer,
            product_id: model.product_id,
        });
    }

    sort_descriptors(&mut found);
    Ok(found)
}

/// Order descriptors so repeated scans compare equal.
pub(crate) fn sort_descriptors(devices: &mut [DeviceDescriptor]) {
    devices.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

fn sort_key(device: &DeviceDescriptor) -> (u8, String, String) {
    match device {
        DeviceDescriptor::Usb {
            product, serial, ..
        } => (0, serial.clone().unwrap_or_default(), product.clone()),
        DeviceDescriptor::Bluetooth { name, address } => (1, address.clone(), name.clone()),
    }
}
