//! Scripted in-memory transport replaying device responses.

use std::collections::VecDeque;
use std::io;

use sensel_core::Transport;

use crate::checksum::checksum;
use crate::consts::{ack, reg};

/// Replays queued device bytes and records everything the host writes
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub closed: bool,
    /// Fail every write with a broken pipe
    pub broken: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> &mut Self {
        self.rx.extend(bytes);
        self
    }

    /// Queue the answer to a fixed-size read
    pub fn read_response(&mut self, reg: u8, payload: &[u8]) -> &mut Self {
        self.push(&[ack::READ, reg])
            .push(&(payload.len() as u16).to_le_bytes())
            .push(payload)
            .push(&[checksum(payload)])
    }

    /// Queue the answer to a fixed-size write
    pub fn write_response(&mut self, reg: u8) -> &mut Self {
        self.push(&[ack::WRITE, reg])
    }

    /// Queue the answer to a variable-size read
    pub fn variable_response(&mut self, reg: u8, payload: &[u8]) -> &mut Self {
        self.push(&[ack::RVS, reg, 0])
            .push(&(payload.len() as u16).to_le_bytes())
            .push(payload)
            .push(&[checksum(payload)])
    }

    /// Queue a frame as drained from the wire, without a leading ack
    pub fn raw_frame(&mut self, payload: &[u8]) -> &mut Self {
        self.push(&[reg::SCAN_READ_FRAME, 0])
            .push(&(payload.len() as u16).to_le_bytes())
            .push(payload)
            .push(&[checksum(payload)])
    }

    /// Queue `code` followed by a frame
    pub fn frame(&mut self, code: u8, payload: &[u8]) -> &mut Self {
        self.push(&[code]).raw_frame(payload)
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.broken {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.tx.extend_from_slice(buf);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.rx.len());
        for (dst, src) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn available(&mut self) -> io::Result<usize> {
        Ok(self.rx.len())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}
