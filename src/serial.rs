//! Serial port transport

use std::io::{self, Read, Write};
use std::time::Duration;

use log::debug;
use sensel::Transport;
use serialport::{ClearBuffer, SerialPort};

use crate::config::SerialConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("no serial port configured, pass --port or set serial.port in the config file")]
    NoPort,
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },
    #[error("{0} is not a sensel device")]
    NotSensel(String),
    #[error(transparent)]
    Device(#[from] sensel::Error),
}

/// Open the configured port and check that a sensel device answers on it
pub fn connect(config: &SerialConfig, retries: usize) -> Result<SerialTransport, ConnectError> {
    let path = config.port.as_deref().ok_or(ConnectError::NoPort)?;
    let mut transport = SerialTransport::open(path, config.baud_rate, config.timeout).map_err(
        |source| ConnectError::Open {
            path: path.to_string(),
            source,
        },
    )?;
    sensel::probe(&mut transport, retries)?
        .then_some(transport)
        .ok_or_else(|| ConnectError::NotSensel(path.to_string()))
}

/// A sensel device behind a serial port (USB CDC or a BLE serial bridge)
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> serialport::Result<Self> {
        let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
        debug!("opened {path} at {baud_rate} baud");
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            res => res,
        }
    }

    fn available(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn close(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }
}
