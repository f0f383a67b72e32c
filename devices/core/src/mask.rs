//! Bit sets describing what a frame and its contacts carry.

use bitflags::bitflags;

bitflags! {
    /// Telemetry sections present in a frame, also used as the frame content
    /// control register value.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ContentMask: u8 {
        const PRESSURE = 0x01;
        const LABELS = 0x02;
        const CONTACTS = 0x04;
        const ACCEL = 0x08;
    }
}

impl ContentMask {
    /// Sections produced by the pressure/label codec
    pub const MAPS: Self = Self::PRESSURE.union(Self::LABELS);
}

bitflags! {
    /// Optional sub-records carried by every contact in a frame
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ContactMask: u8 {
        const ELLIPSE = 0x01;
        const DELTAS = 0x02;
        const BOUNDING_BOX = 0x04;
        const PEAK = 0x08;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values() {
        assert_eq!(ContentMask::MAPS.bits(), 0x03);
        assert_eq!((ContentMask::CONTACTS | ContentMask::ACCEL).bits(), 0x0C);
        assert_eq!(
            ContactMask::from_bits_truncate(0x05),
            ContactMask::ELLIPSE | ContactMask::BOUNDING_BOX
        );
    }
}
