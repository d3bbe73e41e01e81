/*
 * @file dispatcher.rs
 * @brief Serial link ownership and best-effort command dispatch
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Device link lifecycle and best-effort command dispatch over UART.

use anyhow::{Context, Result};
use log::{error, info, warn};
use serialport::SerialPort;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Serial write timeout so a wedged device cannot stall a request.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Connection state of the device link.
///
/// # Details
/// The state is set once when the link is opened at startup and can
/// move to `Error` only when a write fails. There is no reconnect
/// path; a failed link stays failed until the process restarts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// Channel opened and accepting commands.
    Open,
    /// No channel was configured.
    Closed,
    /// Opening failed, or a write failed after opening.
    Error,
}

/// Result of a single dispatch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The frame reached the channel.
    Dispatched,
    /// The link is closed or errored; the command was only logged.
    ChannelUnavailable,
    /// The write failed and the link moved to `Error`.
    WriteFailed,
}

/// Byte sink for framed command writes.
///
/// # Details
/// Abstracts the serial port so the dispatch path can be exercised
/// against in-memory channels. A frame is a complete command line
/// including its trailing newline.
pub trait DeviceChannel: Send {
    /// Writes one complete frame to the device.
    ///
    /// # Arguments
    /// * `frame` - Command bytes including the trailing newline.
    ///
    /// # Errors
    /// Returns an error if the underlying write or flush fails.
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()>;
}

/// Production channel backed by a serial port.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

/// Implementation of serial channel construction.
impl SerialChannel {
    /// Wraps an opened serial port.
    ///
    /// # Arguments
    /// * `port` - The port returned by [`open_serial_port`].
    ///
    /// # Returns
    /// * `Self` - A channel ready for framed writes.
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

/// Framed writes over the serial port.
impl DeviceChannel for SerialChannel {
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }
}

/// Internal link representation; a channel exists only while open.
enum Link {
    Open(Box<dyn DeviceChannel>),
    Closed,
    Error,
}

/// Implementation of link state projection.
impl Link {
    /// Maps the internal representation onto the public state.
    fn state(&self) -> LinkState {
        match self {
            Link::Open(_) => LinkState::Open,
            Link::Closed => LinkState::Closed,
            Link::Error => LinkState::Error,
        }
    }
}

/// Owner of the device link.
///
/// # Details
/// All writes go through an internal mutex, so concurrent requests are
/// serialized and frames from different commands never interleave.
/// Dispatch is best effort: failures are logged and reflected in the
/// outcome, never surfaced to the request that triggered them.
pub struct Dispatcher {
    link: Mutex<Link>,
}

/// Implementation of dispatcher construction and dispatch.
impl Dispatcher {
    /// Creates a dispatcher over an open channel.
    ///
    /// # Arguments
    /// * `channel` - The device channel to write frames to.
    ///
    /// # Returns
    /// * `Self` - A dispatcher in the `Open` state.
    pub fn connected(channel: Box<dyn DeviceChannel>) -> Self {
        Self {
            link: Mutex::new(Link::Open(channel)),
        }
    }

    /// Creates a dispatcher with no channel configured.
    ///
    /// # Returns
    /// * `Self` - A dispatcher in the `Closed` state.
    pub fn disconnected() -> Self {
        Self {
            link: Mutex::new(Link::Closed),
        }
    }

    /// Creates a dispatcher whose open attempt failed.
    ///
    /// # Returns
    /// * `Self` - A dispatcher in the `Error` state.
    pub fn failed() -> Self {
        Self {
            link: Mutex::new(Link::Error),
        }
    }

    /// Sends one command to the device, best effort.
    ///
    /// # Details
    /// The command is framed with exactly one trailing newline and
    /// written as a unit. When the link is not open the command is
    /// logged instead of written, matching how the service behaves on
    /// development machines with no board attached. A failed write
    /// moves the link to `Error`; the channel is dropped and later
    /// dispatches report `ChannelUnavailable` without touching it.
    ///
    /// # Arguments
    /// * `command` - The command text, without line terminator.
    ///
    /// # Returns
    /// * `DispatchOutcome` - What happened to this command.
    pub fn dispatch(&self, command: &str) -> DispatchOutcome {
        let mut link = self.link.lock().unwrap();
        let write_result = match &mut *link {
            Link::Open(channel) => {
                info!("→ Sending {} to device", command);
                let frame = format!("{}\n", command);
                channel.write_frame(frame.as_bytes())
            }
            _ => {
                info!("Serial port not available, command would be: {}", command);
                return DispatchOutcome::ChannelUnavailable;
            }
        };
        match write_result {
            Ok(()) => {
                info!("✓ Command sent");
                DispatchOutcome::Dispatched
            }
            Err(err) => {
                error!("Serial write error: {}", err);
                *link = Link::Error;
                DispatchOutcome::WriteFailed
            }
        }
    }

    /// Reports the current link state.
    ///
    /// # Returns
    /// * `LinkState` - Snapshot of the link at this instant.
    pub fn link_state(&self) -> LinkState {
        self.link.lock().unwrap().state()
    }

    /// Reports whether the link is open for writes.
    ///
    /// # Returns
    /// * `bool` - `true` only in the `Open` state.
    pub fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Open
    }
}

/// Opens the device link once at startup.
///
/// # Details
/// An empty path means no device is configured and yields a `Closed`
/// dispatcher without touching the filesystem. A failed open is logged
/// and yields an `Error` dispatcher; the service still starts so the
/// chat path keeps working without hardware. On success the port is
/// cloned for the sensor reader thread, which owns its handle
/// independently of the write side.
///
/// # Arguments
/// * `path` - Serial device path, empty to disable.
/// * `baud` - Baud rate for the link.
///
/// # Returns
/// * `(Dispatcher, Option<Box<dyn SerialPort>>)` - The dispatcher and,
///   when available, a cloned port handle for the reader thread.
pub fn open_channel(path: &str, baud: u32) -> (Dispatcher, Option<Box<dyn SerialPort>>) {
    if path.is_empty() {
        info!("No serial port configured, commands will be logged only");
        return (Dispatcher::disconnected(), None);
    }
    match open_serial_port(path, baud) {
        Ok(port) => {
            info!("Serial port {} open at {} baud", path, baud);
            let reader = match port.try_clone() {
                Ok(clone) => Some(clone),
                Err(err) => {
                    warn!("Could not clone serial port for reading: {}", err);
                    None
                }
            };
            let channel = Box::new(SerialChannel::new(port));
            (Dispatcher::connected(channel), reader)
        }
        Err(err) => {
            error!("Could not open serial port {}: {:#}", path, err);
            info!("Serial communication disabled");
            (Dispatcher::failed(), None)
        }
    }
}

/// Opens a serial port with the specified path and baud rate.
///
/// # Details
/// Configures the port with a short write timeout so a wedged device
/// cannot stall the request that triggered the write.
///
/// # Arguments
/// * `path` - The device path (e.g., "/dev/tty.usbmodem1101").
/// * `baud` - The baud rate (e.g., 9600).
///
/// # Returns
/// * `Ok(Box<dyn SerialPort>)` - Opened serial port ready for I/O.
///
/// # Errors
/// Returns an error if the port cannot be opened at the given path and baud.
fn open_serial_port(path: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    serialport::new(path, baud)
        .timeout(SERIAL_TIMEOUT)
        .open()
        .with_context(|| format!("Failed to open {}", path))
}
