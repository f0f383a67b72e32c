use std::fmt;

use sensel_core::{Error, Result};

use crate::abi::RegisterValue;

/// Firmware version block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub protocol: u8,
    pub major: u8,
    pub minor: u8,
    pub build: u16,
    pub release: u8,
    pub device_id: u16,
    pub revision: u8,
}

impl RegisterValue for FirmwareInfo {
    const SIZE: u8 = 9;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![self.protocol, self.major, self.minor];
        buf.extend_from_slice(&self.build.to_le_bytes());
        buf.push(self.release);
        buf.extend_from_slice(&self.device_id.to_le_bytes());
        buf.push(self.revision);
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            protocol: bytes[0],
            major: bytes[1],
            minor: bytes[2],
            build: u16::from_le_bytes([bytes[3], bytes[4]]),
            release: bytes[5],
            device_id: u16::from_le_bytes([bytes[6], bytes[7]]),
            revision: bytes[8],
        }
    }
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{} (release {}, protocol {})",
            self.major, self.minor, self.build, self.release, self.protocol
        )
    }
}

/// Sensor geometry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorInfo {
    pub max_contacts: u8,
    pub num_rows: u16,
    pub num_cols: u16,
    /// Active area width in millimeters
    pub width: f32,
    /// Active area height in millimeters
    pub height: f32,
}

impl SensorInfo {
    pub fn cells(&self) -> usize {
        self.num_rows as usize * self.num_cols as usize
    }
}

/// Scan resolution, trading detail for frame rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScanDetail {
    #[default]
    High = 0,
    Medium = 1,
    Low = 2,
}

impl TryFrom<u8> for ScanDetail {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ScanDetail::High),
            1 => Ok(ScanDetail::Medium),
            2 => Ok(ScanDetail::Low),
            _ => Err(Error::InvalidArgument("unknown scan detail code")),
        }
    }
}

/// LED geometry and the brightness levels read when the session opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leds {
    pub count: u8,
    /// Bytes per brightness cell, 1 or 2
    pub reg_size: u8,
    pub max_brightness: u16,
    levels: Vec<u16>,
}

impl Leds {
    pub fn new(count: u8, reg_size: u8, max_brightness: u16) -> Result<Self> {
        match (count, reg_size) {
            (0, _) | (_, 1 | 2) => Ok(Self {
                count,
                reg_size,
                max_brightness,
                levels: Vec::new(),
            }),
            _ => Err(Error::InvalidArgument("LED brightness cells must be 1 or 2 bytes")),
        }
    }

    /// Total bytes in the brightness register
    pub fn register_len(&self) -> usize {
        self.count as usize * self.reg_size as usize
    }

    /// Fill the brightness cache from the raw brightness register
    pub fn load(&mut self, raw: &[u8]) {
        self.levels = match self.reg_size {
            2 => raw
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
            _ => raw.iter().map(|b| *b as u16).collect(),
        };
    }

    pub fn brightness(&self, id: u8) -> Option<u16> {
        self.levels.get(id as usize).copied()
    }

    pub fn levels(&self) -> &[u16] {
        &self.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_block_layout() {
        let info = FirmwareInfo::from_bytes(&[1, 0, 7, 0x2c, 0x01, 2, 0x34, 0x12, 5]);
        assert_eq!(info.build, 300);
        assert_eq!(info.device_id, 0x1234);
        assert_eq!(info.revision, 5);
        assert_eq!(info.to_string(), "0.7.300 (release 2, protocol 1)");
        assert_eq!(info.to_bytes().len(), FirmwareInfo::SIZE as usize);
    }

    #[test]
    fn wide_led_cells() {
        let mut leds = Leds::new(2, 2, 1000).unwrap();
        assert_eq!(leds.register_len(), 4);
        leds.load(&[0xe8, 0x03, 0x10, 0x00]);
        assert_eq!(leds.brightness(0), Some(1000));
        assert_eq!(leds.brightness(1), Some(16));
        assert_eq!(leds.brightness(2), None);
        assert!(Leds::new(1, 3, 0).is_err());
        assert!(Leds::new(0, 0, 0).is_ok());
    }
}
