//! Wire constants: board addressing, register map and acknowledgement codes.

/// Address of the sensor board on the link
pub const BOARD_ADDR: u8 = 0x01;
/// Set on the address byte of read requests
pub const READ_BIT: u8 = 0x80;
/// Largest chunk sent per variable-size write packet
pub const MAX_VS_CHUNK: usize = 512;
/// Size of the extended header fields following a variable-size write request
pub const VS_HEADER_SIZE: u8 = 4;
/// Contents of the magic register
pub const MAGIC: &[u8; 6] = b"S3NS31";

/// Register ids
pub mod reg {
    pub const MAGIC: u8 = 0x00;
    pub const FW_VERSION_PROTOCOL: u8 = 0x06;
    pub const SENSOR_NUM_COLS: u8 = 0x10;
    pub const SENSOR_NUM_ROWS: u8 = 0x12;
    pub const SENSOR_ACTIVE_AREA_WIDTH_UM: u8 = 0x14;
    pub const SENSOR_ACTIVE_AREA_HEIGHT_UM: u8 = 0x18;
    pub const SCAN_FRAME_RATE: u8 = 0x20;
    pub const SCAN_BUFFER_CONTROL: u8 = 0x22;
    pub const SCAN_DETAIL_CONTROL: u8 = 0x23;
    pub const FRAME_CONTENT_CONTROL: u8 = 0x24;
    pub const SCAN_ENABLED: u8 = 0x25;
    pub const SCAN_READ_FRAME: u8 = 0x26;
    pub const FRAME_CONTENT_SUPPORTED: u8 = 0x28;
    pub const CONTACTS_MAX_COUNT: u8 = 0x40;
    pub const CONTACTS_ENABLE_BLOB_MERGE: u8 = 0x41;
    pub const CONTACTS_MIN_FORCE: u8 = 0x47;
    pub const CONTACTS_MASK: u8 = 0x4B;
    pub const BASELINE_DYNAMIC_ENABLED: u8 = 0x57;
    pub const POWER_BUTTON_PRESSED: u8 = 0x72;
    pub const LED_BRIGHTNESS: u8 = 0x80;
    pub const LED_BRIGHTNESS_SIZE: u8 = 0x81;
    pub const LED_BRIGHTNESS_MAX: u8 = 0x82;
    pub const LED_COUNT: u8 = 0x84;
    pub const UNIT_SHIFT_DIMS: u8 = 0xA0;
    pub const UNIT_SHIFT_FORCE: u8 = 0xA1;
    pub const UNIT_SHIFT_AREA: u8 = 0xA2;
    pub const UNIT_SHIFT_ANGLE: u8 = 0xA3;
    pub const SOFT_RESET: u8 = 0xE0;
}

/// Acknowledgement codes
pub mod ack {
    pub const READ: u8 = 1;
    pub const READ_NACK: u8 = 2;
    /// Variable-size read ack, also announces a single non-buffered frame
    pub const RVS: u8 = 3;
    pub const RVS_NACK: u8 = 4;
    pub const WRITE: u8 = 5;
    pub const WRITE_NACK: u8 = 6;
    pub const WVS: u8 = 7;
    pub const WVS_NACK: u8 = 8;
    /// A frame pushed by the device in asynchronous scan mode follows
    pub const ASYNC_DATA: u8 = 9;
    /// Terminates a burst of device-buffered frames
    pub const BUFFERED_FRAME_END: u8 = 10;
}
