//! # Bluetooth RFCOMM Transport
//!
//! This module talks to P-touch printers over Bluetooth Classic using the
//! Serial Port Profile (SPP). The socket is opened directly with
//! `AF_BLUETOOTH` / `BTPROTO_RFCOMM`, so no `/dev/rfcommN` binding is needed.
//!
//! ## Bluetooth Setup (Linux)
//!
//! The printer must be paired once before it accepts RFCOMM connections:
//!
//! ```bash
//! $ bluetoothctl
//! [bluetooth]# scan on
//! # Look for "PT-P710BT" or similar
//! [bluetooth]# pair EC:79:49:XX:XX:XX
//! [bluetooth]# trust EC:79:49:XX:XX:XX
//! ```
//!
//! ## Discovery
//!
//! [`discover`] runs a bounded `bluetoothctl` inquiry and then reads the
//! controller's device cache, both within the caller's duration `D`:
//!
//! ```text
//! bluetoothctl --timeout N scan on     N = whole seconds of D - 1s, killed at N
//! bluetoothctl devices                 killed at D
//!   -> "Device EC:79:49:12:34:56 PT-P710BT9876"
//! ```
//!
//! The first device whose name contains `PT-` or `Brother` is reported as the
//! likely match.

use std::fs::File;
use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{BluetoothScan, DeviceDescriptor, Transport};
use crate::error::TransportError;

/// Part of a scan's duration kept back for listing the device cache
const LIST_BUDGET: Duration = Duration::from_secs(1);

/// How often the inquiry process is polled for exit
const SCAN_POLL: Duration = Duration::from_millis(100);

/// Name fragments that identify a P-touch printer
const PRINTER_NAME_HINTS: &[&str] = &["PT-", "Brother"];

/// # Bluetooth Printer Transport
///
/// An open RFCOMM stream to one printer.
///
/// ## Example
///
/// ```no_run
/// use ptlabel::transport::{BluetoothTransport, Transport};
/// use ptlabel::protocol::commands;
///
/// let mut transport = BluetoothTransport::connect("EC:79:49:12:34:56", 1)?;
/// transport.send(&commands::invalidate())?;
/// transport.close()?;
/// # Ok::<(), ptlabel::error::TransportError>(())
/// ```
pub struct BluetoothTransport {
    stream: Option<File>,
    address: String,
    channel: u8,
}

impl BluetoothTransport {
    /// Connect to `address` on RFCOMM `channel`.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - The address is not of the form `XX:XX:XX:XX:XX:XX`
    /// - The platform has no RFCOMM sockets
    /// - The peer refuses or is out of range
    pub fn connect(address: &str, channel: u8) -> Result<Self, TransportError> {
        let bdaddr = parse_mac(address).ok_or_else(|| {
            TransportError::Connect(format!("invalid Bluetooth address: {}", address))
        })?;

        let stream = open_rfcomm(bdaddr, channel)?;
        let address = address.to_uppercase();
        log::info!("Bluetooth connected: {} channel {}", address, channel);

        Ok(Self {
            stream: Some(stream),
            address,
            channel,
        })
    }

    fn stream(&mut self) -> Result<&mut File, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for BluetoothTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream()?;
        stream
            .write_all(data)
            .and_then(|_| stream.flush())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn receive(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let stream = self.stream()?;
        if !wait_readable(stream, timeout).map_err(|e| TransportError::Receive(e.to_string()))? {
            return Ok(None);
        }

        let mut buf = vec![0u8; max_len];
        let n = stream
            .read(&mut buf)
            .map_err(|e| TransportError::Receive(e.to_string()))?;
        if n == 0 {
            return Err(TransportError::Receive("connection closed by printer".to_string()));
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.stream.take().is_some() {
            log::info!("Bluetooth disconnected: {}", self.address);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} (RFCOMM {})", self.address, self.channel)
    }
}

// ============================================================================
// RFCOMM SOCKETS
// ============================================================================

#[cfg(target_os = "linux")]
mod rfcomm {
    /// RFCOMM protocol number for `socket(AF_BLUETOOTH, ...)`
    pub const BTPROTO_RFCOMM: libc::c_int = 3;

    /// `struct sockaddr_rc` from `<bluetooth/rfcomm.h>`
    #[repr(C)]
    pub struct SockaddrRc {
        pub rc_family: libc::sa_family_t,
        /// Address bytes, least significant first
        pub rc_bdaddr: [u8; 6],
        pub rc_channel: u8,
    }
}

#[cfg(target_os = "linux")]
fn open_rfcomm(bdaddr: [u8; 6], channel: u8) -> Result<File, TransportError> {
    use std::os::fd::{FromRawFd, OwnedFd};

    let fd = unsafe {
        libc::socket(
            libc::AF_BLUETOOTH,
            libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
            rfcomm::BTPROTO_RFCOMM,
        )
    };
    if fd < 0 {
        return Err(TransportError::Connect(format!(
            "socket failed: {}",
            io::Error::last_os_error()
        )));
    }
    // Owned from here on so every error path closes it.
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };

    let mut reversed = bdaddr;
    reversed.reverse();
    let addr = rfcomm::SockaddrRc {
        rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
        rc_bdaddr: reversed,
        rc_channel: channel,
    };

    let result = unsafe {
        libc::connect(
            fd,
            &addr as *const rfcomm::SockaddrRc as *const libc::sockaddr,
            std::mem::size_of::<rfcomm::SockaddrRc>() as libc::socklen_t,
        )
    };
    if result != 0 {
        return Err(TransportError::Connect(format!(
            "RFCOMM connect failed: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(File::from(owned))
}

#[cfg(not(target_os = "linux"))]
fn open_rfcomm(_bdaddr: [u8; 6], _channel: u8) -> Result<File, TransportError> {
    Err(TransportError::Unsupported(
        "RFCOMM sockets are only available on Linux".to_string(),
    ))
}

/// Wait until the stream has data, up to `timeout`.
#[cfg(unix)]
fn wait_readable(stream: &File, timeout: Duration) -> io::Result<bool> {
    use std::os::fd::AsRawFd;

    let mut pfd = libc::pollfd {
        fd: stream.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    loop {
        let ready = unsafe { libc::poll(&mut pfd, 1, millis) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(ready > 0);
    }
}

#[cfg(not(unix))]
fn wait_readable(_stream: &File, _timeout: Duration) -> io::Result<bool> {
    Ok(true)
}

// ============================================================================
// DISCOVERY
// ============================================================================

/// Scan for nearby Bluetooth devices, returning within `duration`.
///
/// The inquiry gets the whole seconds of `duration` minus [`LIST_BUDGET`];
/// listing the device cache must finish by the same overall deadline. Either
/// child process still running at its deadline is killed. Repeated scans of
/// the same environment return the same list: entries are deduplicated by
/// address and sorted.
pub fn discover(duration: Duration) -> Result<BluetoothScan, TransportError> {
    let started = Instant::now();
    let deadline = started + duration;

    let window = inquiry_window(duration);
    if window.is_zero() {
        log::debug!("Scan duration {:?} too short for an inquiry, listing cache only", duration);
    } else {
        let mut scan = Command::new("bluetoothctl");
        scan.arg("--timeout")
            .arg(window.as_secs().to_string())
            .arg("scan")
            .arg("on");
        if run_until(&mut scan, started + window)?.is_none() {
            log::debug!("Stopped Bluetooth inquiry at its deadline");
        }
    }

    let mut list = Command::new("bluetoothctl");
    list.arg("devices");
    let (status, stdout) = run_until(&mut list, deadline)?.ok_or_else(|| {
        TransportError::Discovery(format!(
            "bluetoothctl devices did not answer within {:?}",
            duration
        ))
    })?;
    if !status.success() {
        return Err(TransportError::Discovery(format!(
            "bluetoothctl devices failed: {}",
            status
        )));
    }

    let devices = parse_device_list(&stdout);
    let likely_match = likely_match(&devices);
    log::info!(
        "Bluetooth scan found {} device(s), likely printer: {:?}",
        devices.len(),
        likely_match
    );
    Ok(BluetoothScan {
        devices,
        likely_match,
    })
}

/// Inquiry length for a scan of `duration`, in whole seconds.
///
/// [`LIST_BUDGET`] is kept back for listing the cache, but never more than
/// half of `duration`. Zero means there is no time for an inquiry.
fn inquiry_window(duration: Duration) -> Duration {
    let window = duration.saturating_sub(LIST_BUDGET).max(duration / 2);
    Duration::from_secs(window.as_secs())
}

/// Run `command` until it exits or `deadline` passes, capturing stdout.
///
/// Returns `None` when the process was killed at the deadline.
fn run_until(
    command: &mut Command,
    deadline: Instant,
) -> Result<Option<(ExitStatus, String)>, TransportError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| TransportError::Discovery(format!("Failed to run {}: {}", program, e)))?;

    // Drain stdout on the side so a chatty child never blocks on a full pipe.
    let reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut text = String::new();
            let _ = out.read_to_string(&mut text);
            text
        })
    });

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let text = reader.and_then(|r| r.join().ok()).unwrap_or_default();
                return Ok(Some((status, text)));
            }
            Ok(None) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(None);
                }
                thread::sleep(SCAN_POLL.min(remaining));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TransportError::Discovery(format!("{}: {}", program, e)));
            }
        }
    }
}

/// Parse `bluetoothctl devices` output into descriptors.
///
/// Lines look like `Device EC:79:49:12:34:56 PT-P710BT9876`; anything else is
/// ignored. Addresses are uppercased.
pub fn parse_device_list(text: &str) -> Vec<DeviceDescriptor> {
    let mut devices: Vec<DeviceDescriptor> = Vec::new();

    for line in text.lines() {
        let Some(start) = line.find("Device ") else {
            continue;
        };
        let rest = &line[start + "Device ".len()..];
        let (address, name) = match rest.split_once(' ') {
            Some((address, name)) => (address, name.trim()),
            None => (rest.trim(), ""),
        };
        if !is_valid_mac(address) {
            continue;
        }
        let address = address.to_uppercase();
        let duplicate = devices.iter().any(|d| match d {
            DeviceDescriptor::Bluetooth { address: a, .. } => *a == address,
            DeviceDescriptor::Usb { .. } => false,
        });
        if duplicate {
            continue;
        }
        let name = if name.is_empty() {
            address.clone()
        } else {
            name.to_string()
        };
        devices.push(DeviceDescriptor::Bluetooth { name, address });
    }

    super::usb::sort_descriptors(&mut devices);
    devices
}

/// Index of the first device whose name looks like a P-touch printer.
pub fn likely_match(devices: &[DeviceDescriptor]) -> Option<usize> {
    devices.iter().position(|d| match d {
        DeviceDescriptor::Bluetooth { name, .. } => {
            PRINTER_NAME_HINTS.iter().any(|hint| name.contains(hint))
        }
        DeviceDescriptor::Usb { .. } => false,
    })
}

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    parse_mac(mac).is_some()
}

fn parse_mac(mac: &str) -> Option<[u8; 6]> {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return None;
    }
    let mut bytes = [0u8; 6];
    for (byte, part) in bytes.iter_mut().zip(&parts) {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    Some(bytes)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_mac_addresses() {
        assert!(is_valid_mac("00:11:22:33:44:55"));
        assert!(is_valid_mac("AA:BB:CC:DD:EE:FF"));
        assert!(is_valid_mac("aa:bb:cc:dd:ee:ff"));
        assert!(is_valid_mac("00:00:00:00:00:00"));
    }

    #[test]
    fn test_invalid_mac_addresses() {
        assert!(!is_valid_mac("00:11:22:33:44")); // too short
        assert!(!is_valid_mac("00:11:22:33:44:55:66")); // too long
        assert!(!is_valid_mac("00-11-22-33-44-55")); // wrong separator
        assert!(!is_valid_mac("GG:HH:II:JJ:KK:LL")); // invalid hex
        assert!(!is_valid_mac("")); // empty
        assert!(!is_valid_mac("not-a-mac")); // garbage
    }

    #[test]
    fn test_parse_mac_bytes() {
        assert_eq!(
            parse_mac("EC:79:49:12:34:5f"),
            Some([0xEC, 0x79, 0x49, 0x12, 0x34, 0x5F])
        );
    }

    #[test]
    fn test_parse_device_list() {
        let text = "\
Device EC:79:49:12:34:56 PT-P710BT9876
Device 11:22:33:44:55:66 Headphones
garbage line
Device not-a-mac Something
[NEW] Device aa:bb:cc:dd:ee:ff Brother Label
";
        let devices = parse_device_list(text);
        assert_eq!(
            devices,
            vec![
                DeviceDescriptor::Bluetooth {
                    name: "Headphones".into(),
                    address: "11:22:33:44:55:66".into(),
                },
                DeviceDescriptor::Bluetooth {
                    name: "Brother Label".into(),
                    address: "AA:BB:CC:DD:EE:FF".into(),
                },
                DeviceDescriptor::Bluetooth {
                    name: "PT-P710BT9876".into(),
                    address: "EC:79:49:12:34:56".into(),
                },
            ]
        );
        assert_eq!(likely_match(&devices), Some(1));
    }

    #[test]
    fn test_parse_device_list_is_idempotent() {
        let a = "Device 22:22:22:22:22:22 B\nDevice 11:11:11:11:11:11 A\n";
        let b = "Device 11:11:11:11:11:11 A\nDevice 22:22:22:22:22:22 B\nDevice 11:11:11:11:11:11 A\n";
        assert_eq!(parse_device_list(a), parse_device_list(b));
    }

    #[test]
    fn test_unnamed_device_uses_address() {
        let devices = parse_device_list("Device 01:02:03:04:05:06\n");
        assert_eq!(
            devices,
            vec![DeviceDescriptor::Bluetooth {
                name: "01:02:03:04:05:06".into(),
                address: "01:02:03:04:05:06".into(),
            }]
        );
        assert_eq!(likely_match(&devices), None);
    }

    #[test]
    fn test_connect_rejects_bad_address() {
        let err = BluetoothTransport::connect("nope", 1).err().unwrap();
        assert!(err.to_string().contains("invalid Bluetooth address"));
    }

    #[test]
    fn test_inquiry_window_stays_inside_duration() {
        assert_eq!(inquiry_window(Duration::from_secs(8)), Duration::from_secs(7));
        assert_eq!(inquiry_window(Duration::from_secs(3)), Duration::from_secs(2));
        assert_eq!(inquiry_window(Duration::from_millis(2500)), Duration::from_secs(1));
        assert_eq!(inquiry_window(Duration::from_millis(1500)), Duration::ZERO);
        assert_eq!(inquiry_window(Duration::from_millis(300)), Duration::ZERO);
        assert_eq!(inquiry_window(Duration::ZERO), Duration::ZERO);

        for ms in [0u64, 1, 999, 1000, 1001, 4321, 8000, 60_000] {
            let duration = Duration::from_millis(ms);
            assert!(inquiry_window(duration) <= duration, "{:?}", duration);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_until_kills_at_deadline() {
        let started = Instant::now();
        let mut command = Command::new("sleep");
        command.arg("5");
        let result = run_until(&mut command, started + Duration::from_millis(200)).unwrap();
        assert!(result.is_none());
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_until_captures_stdout() {
        let mut command = Command::new("echo");
        command.arg("Device EC:79:49:12:34:56 PT-P710BT9876");
        let (status, stdout) = run_until(&mut command, Instant::now() + Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert!(status.success());
        assert_eq!(
            parse_device_list(&stdout),
            vec![DeviceDescriptor::Bluetooth {
                name: "PT-P710BT9876".into(),
                address: "EC:79:49:12:34:56".into(),
            }]
        );
    }

    #[test]
    fn test_run_until_missing_program_is_discovery_error() {
        let mut command = Command::new("ptlabel-no-such-program");
        let err = run_until(&mut command, Instant::now() + Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Discovery(_)));
    }
}
