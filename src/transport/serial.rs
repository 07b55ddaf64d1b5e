//! Serial slider transport
//!
//! Finds the controller's port and reads newline-terminated frames of
//! `|`-separated raw readings, one integer per slider. Malformed frames are
//! dropped with a diagnostic; well-formed frames are broadcast to the engine.

use serialport::SerialPortType;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors from port discovery and the serial link.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no serial port matches device '{device}' and no fallback port is set")]
    PortNotFound { device: String },

    #[error("no serial port configured: set 'device name' or 'port'")]
    NoPortConfigured,

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// One batch of raw readings, one per slider.
#[derive(Debug, Clone)]
pub struct SliderFrame {
    pub readings: Vec<u16>,
}

/// Case-insensitive match of a USB product string against the configured
/// device name.
fn product_matches(product: Option<&str>, device: &str) -> bool {
    product
        .map(|p| p.to_lowercase().contains(&device.to_lowercase()))
        .unwrap_or(false)
}

/// Locate the controller's port.
///
/// Prefers the port whose USB product string contains `device_name`, so the
/// mapping keeps working when the controller moves to another USB port;
/// falls back to the configured port otherwise.
pub fn find_port(
    device_name: Option<&str>,
    fallback: Option<&str>,
) -> Result<String, TransportError> {
    if let Some(device) = device_name {
        for port in serialport::available_ports()? {
            if let SerialPortType::UsbPort(info) = &port.port_type {
                if product_matches(info.product.as_deref(), device) {
                    return Ok(port.port_name);
                }
            }
        }
    }

    if let Some(port) = fallback {
        return Ok(port.to_string());
    }

    match device_name {
        Some(device) => Err(TransportError::PortNotFound {
            device: device.to_string(),
        }),
        None => Err(TransportError::NoPortConfigured),
    }
}

/// Parse one frame line into raw readings. Returns None when the arity or a
/// value is wrong.
fn parse_frame(line: &str, expected: usize) -> Option<Vec<u16>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let readings: Option<Vec<u16>> = line
        .split('|')
        .map(|part| part.trim().parse::<u16>().ok())
        .collect();
    readings.filter(|r| r.len() == expected)
}

/// Background reader for the serial link.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    slider_count: usize,
    running: Arc<AtomicBool>,
    sender: broadcast::Sender<SliderFrame>,
    task: Option<JoinHandle<()>>,
}

impl SerialTransport {
    pub fn new(port_name: impl Into<String>, baud_rate: u32, slider_count: usize) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            port_name: port_name.into(),
            baud_rate,
            slider_count,
            running: Arc::new(AtomicBool::new(false)),
            sender,
            task: None,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to incoming frames.
    pub fn subscribe(&self) -> broadcast::Receiver<SliderFrame> {
        self.sender.subscribe()
    }

    /// Open the port and start reading frames.
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.is_running() {
            return Ok(());
        }

        let port = serialport::new(self.port_name.as_str(), self.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;

        self.running.store(true, Ordering::SeqCst);

        let slider_count = self.slider_count;
        let running = Arc::clone(&self.running);
        let sender = self.sender.clone();

        let task = tokio::task::spawn_blocking(move || {
            let mut reader = std::io::BufReader::new(port);
            let mut line = String::new();

            while running.load(Ordering::SeqCst) {
                match reader.read_line(&mut line) {
                    Ok(0) => {
                        // EOF: the device may be resetting; back off briefly.
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    Ok(_) => {
                        match parse_frame(&line, slider_count) {
                            Some(readings) => {
                                // Ignore send errors when nobody listens yet.
                                let _ = sender.send(SliderFrame { readings });
                            }
                            None => {
                                eprintln!("Dropping malformed frame: {:?}", line.trim());
                            }
                        }
                        line.clear();
                    }
                    // Timed out mid-frame: keep the partial line and retry.
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        eprintln!("Serial read error: {e}");
                        running.store(false, Ordering::SeqCst);
                    }
                }
            }
        });

        self.task = Some(task);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop();
    }
}
