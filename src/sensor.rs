//! Background reader for telemetry lines arriving from the device.

use log::{error, warn};
use serde::Serialize;
use serialport::SerialPort;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Prefix marking telemetry lines among other device output.
const DATA_PREFIX: &str = "data:";

/// Read timeout for the reader's port handle.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Backoff after a read error before trying again.
const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on buffered bytes while waiting for a newline.
const MAX_PENDING_BYTES: usize = 4096;

/// Latest environment readings reported by the device.
///
/// # Details
/// Values start at zero and only move when the device sends a fully
/// valid telemetry line, so a flaky sensor can never clear the last
/// good reading.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct SensorReadings {
    /// Temperature in degrees Celsius.
    pub temperature: i32,
    /// Relative humidity in percent.
    pub humidity: i32,
}

/// Shared handle to the most recent readings.
pub type SensorHandle = Arc<Mutex<SensorReadings>>;

/// Creates a handle holding zeroed readings.
///
/// # Returns
/// * `SensorHandle` - Fresh handle for the reader and the HTTP layer.
pub fn new_handle() -> SensorHandle {
    Arc::new(Mutex::new(SensorReadings::default()))
}

/// Starts the reader thread over a cloned port handle.
///
/// # Details
/// The thread owns its handle independently of the write side and runs
/// for the life of the process. Read errors are logged with a short
/// backoff and never affect the write link. The returned handle is
/// normally dropped; the thread is detached by design.
///
/// # Arguments
/// * `port` - Cloned serial port dedicated to reading.
/// * `readings` - Destination for parsed telemetry.
///
/// # Returns
/// * `JoinHandle<()>` - Handle to the spawned reader thread.
pub fn spawn_reader(mut port: Box<dyn SerialPort>, readings: SensorHandle) -> JoinHandle<()> {
    if let Err(err) = port.set_timeout(READ_TIMEOUT) {
        warn!("Could not set serial read timeout: {}", err);
    }
    thread::spawn(move || read_loop(port, readings))
}

/// Accumulates serial bytes and applies each complete line.
fn read_loop(mut port: Box<dyn SerialPort>, readings: SensorHandle) {
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        match port.read(&mut chunk) {
            Ok(0) => thread::sleep(READ_RETRY_DELAY),
            Ok(n) => {
                pending.extend_from_slice(&chunk[..n]);
                drain_lines(&mut pending, &readings);
                if pending.len() > MAX_PENDING_BYTES {
                    // No newline in sight; drop the backlog to resync framing.
                    pending.clear();
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {}
            Err(err) => {
                error!("Serial read error: {}", err);
                thread::sleep(READ_RETRY_DELAY);
            }
        }
    }
}

/// Splits off every complete line and folds valid ones into the readings.
///
/// # Details
/// Bytes after the last newline stay in the buffer until the rest of
/// the line arrives. Invalid lines are dropped without touching the
/// stored readings.
///
/// # Arguments
/// * `pending` - Accumulated bytes, consumed up to the last newline.
/// * `readings` - Destination for parsed telemetry.
fn drain_lines(pending: &mut Vec<u8>, readings: &SensorHandle) {
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let line_bytes: Vec<u8> = pending.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line_bytes);
        if let Some((temperature, humidity)) = parse_sensor_line(line.trim()) {
            let mut latest = readings.lock().unwrap();
            latest.temperature = temperature;
            latest.humidity = humidity;
        }
    }
}

/// Parses one trimmed line into a temperature and humidity pair.
///
/// # Details
/// A telemetry line is the data prefix followed by exactly two
/// whitespace-separated integers, for example `data: 23 47`. Anything
/// else, including lines with extra fields, is ignored so firmware
/// debug output can share the wire.
///
/// # Arguments
/// * `line` - The line with surrounding whitespace already trimmed.
///
/// # Returns
/// * `Some((i32, i32))` - Parsed temperature and humidity.
/// * `None` - The line is not valid telemetry.
fn parse_sensor_line(line: &str) -> Option<(i32, i32)> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let mut parts = payload.split_whitespace();
    let temperature = parts.next()?.parse().ok()?;
    let humidity = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((temperature, humidity))
}
