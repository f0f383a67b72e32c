//! Encoders for the command shapes sent to the device.
//!
//! Every command is built fresh for each call, nothing is shared between
//! exchanges.

use sensel_core::ContactMask;

use crate::checksum::checksum;
use crate::consts::{BOARD_ADDR, READ_BIT, VS_HEADER_SIZE};

/// Fixed-size value stored in a register, encoded little-endian
pub trait RegisterValue: Sized {
    const SIZE: u8;
    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Self;
}

impl RegisterValue for u8 {
    const SIZE: u8 = 1;
    fn to_bytes(&self) -> Vec<u8> {
        vec![*self]
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl RegisterValue for bool {
    const SIZE: u8 = 1;
    fn to_bytes(&self) -> Vec<u8> {
        vec![*self as u8]
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl RegisterValue for u16 {
    const SIZE: u8 = 2;
    fn to_bytes(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl RegisterValue for u32 {
    const SIZE: u8 = 4;
    fn to_bytes(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl RegisterValue for ContactMask {
    const SIZE: u8 = 1;
    fn to_bytes(&self) -> Vec<u8> {
        vec![self.bits()]
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        ContactMask::from_bits_truncate(bytes[0])
    }
}

/// Construct a read request. `size` is 0 for variable-size registers.
pub const fn read_request(reg: u8, size: u8) -> [u8; 3] {
    [BOARD_ADDR | READ_BIT, reg, size]
}

/// Construct a fixed-size write: header, payload and checksum
pub fn write_request(reg: u8, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 4);
    buf.extend_from_slice(&[BOARD_ADDR, reg, data.len() as u8]);
    buf.extend_from_slice(data);
    buf.push(checksum(data));
    buf
}

/// Construct the extended header opening a variable-size write of `len` bytes
pub fn variable_write_header(reg: u8, len: u32) -> [u8; 9] {
    let mut buf = [0u8; 9];
    buf[0] = BOARD_ADDR;
    buf[1] = reg;
    buf[2] = 0;
    buf[3] = VS_HEADER_SIZE;
    buf[4..8].copy_from_slice(&len.to_le_bytes());
    buf[8] = checksum(&buf[4..8]);
    buf
}

/// Construct one chunk of a variable-size write: length, data and checksum
pub fn variable_chunk(chunk: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(chunk.len() + 3);
    buf.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
    buf.extend_from_slice(chunk);
    buf.push(checksum(chunk));
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_request_sets_read_bit() {
        assert_eq!(read_request(0x24, 1), [0x81, 0x24, 0x01]);
        assert_eq!(read_request(0x26, 0), [0x81, 0x26, 0x00]);
    }

    #[test]
    fn write_request_appends_checksum() {
        assert_eq!(
            write_request(0x20, &[0xf4, 0x01]),
            vec![0x01, 0x20, 0x02, 0xf4, 0x01, 0xf5]
        );
    }

    #[test]
    fn variable_header_layout() {
        let header = variable_write_header(0x80, 0x0102);
        assert_eq!(header, [0x01, 0x80, 0x00, 0x04, 0x02, 0x01, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn chunk_layout() {
        assert_eq!(variable_chunk(&[9, 9]), vec![0x02, 0x00, 9, 9, 18]);
    }

    #[test]
    fn register_values_are_little_endian() {
        assert_eq!(0x1234u16.to_bytes(), vec![0x34, 0x12]);
        assert_eq!(u32::from_bytes(&[0x40, 0x42, 0x0f, 0x00]), 1_000_000);
        assert!(bool::from_bytes(&[2]));
    }
}
