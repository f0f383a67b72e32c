//! Host driver for sensel force sensing devices.
//!
//! This crate provides:
//! - The register protocol (fixed and variable size reads and writes)
//! - Frame acquisition in sync, async and device-buffered scan modes
//! - Frame decoding into contacts, pressure/label maps and acceleration
//! - [`Sensel`], an owned session that negotiates device capabilities on open

use log::{debug, warn};
use register::Link;

pub use buffer::FrameBuffer;
pub use parser::{
    AccelSample, BoundingBox, Contact, ContactState, DecodedFrame, Deltas, Ellipse, Peak, Scales,
};
pub use scan::ScanMode;
pub use sensel_core::{
    ContactMask, ContentMask, Decompressor, Error, Result, Stage, Transport, DEFAULT_READ_RETRIES,
};
pub use types::{FirmwareInfo, Leds, ScanDetail, SensorInfo};

use crate::consts::reg;
use crate::parser::Parser;
use crate::scan::{read_cycle, SCAN_DISABLED};

pub mod abi;
pub mod buffer;
pub mod checksum;
pub mod consts;
pub mod parser;
pub mod register;
pub mod scan;
pub mod types;

#[cfg(test)]
mod mock;

/// Session tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Enforce the ack code and checksum of variable-size reads. When off,
    /// mismatches are only logged.
    pub strict_variable_reads: bool,
    /// Empty reads tolerated per blocking read
    pub read_retries: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            strict_variable_reads: true,
            read_retries: DEFAULT_READ_RETRIES,
        }
    }
}

/// Check whether the peer on `transport` is a sensel device by reading its
/// magic register
pub fn probe<T: Transport + ?Sized>(transport: &mut T, retries: usize) -> Result<bool> {
    let magic =
        Link::new(transport, retries).read_register(reg::MAGIC, consts::MAGIC.len() as u8)?;
    Ok(magic == consts::MAGIC)
}

/// An open device.
///
/// The session owns its transport, the frame accumulation buffer and every
/// capability negotiated at open. A transport failure leaves the byte stream
/// at an unknown position; the session then refuses further I/O with
/// [`Error::Poisoned`] and must be closed and reopened.
pub struct Sensel<T: Transport> {
    transport: T,
    options: SessionOptions,
    decompressor: Option<Box<dyn Decompressor>>,
    buffer: FrameBuffer,
    parser: Parser,
    poisoned: bool,
    scanning: bool,
    scan_mode: ScanMode,
    buffer_control: u8,
    firmware: FirmwareInfo,
    sensor: SensorInfo,
    supported_content: ContentMask,
    frame_content: ContentMask,
    dynamic_baseline: bool,
    leds: Leds,
}

impl<T: Transport> Sensel<T> {
    /// Reset the device behind `transport` and negotiate its capabilities.
    /// Frames carrying pressure or label maps are not decodable without a
    /// decompressor, see [`Sensel::open_with_decompressor`].
    pub fn open(transport: T, options: SessionOptions) -> Result<Self> {
        Self::open_inner(transport, options, None)
    }

    pub fn open_with_decompressor(
        transport: T,
        options: SessionOptions,
        decompressor: Box<dyn Decompressor>,
    ) -> Result<Self> {
        Self::open_inner(transport, options, Some(decompressor))
    }

    fn open_inner(
        transport: T,
        options: SessionOptions,
        decompressor: Option<Box<dyn Decompressor>>,
    ) -> Result<Self> {
        let mut this = Self {
            transport,
            options,
            decompressor,
            buffer: FrameBuffer::with_capacity(0),
            parser: Parser::default(),
            poisoned: false,
            scanning: false,
            scan_mode: ScanMode::Sync,
            buffer_control: 0,
            firmware: FirmwareInfo::default(),
            sensor: SensorInfo::default(),
            supported_content: ContentMask::empty(),
            frame_content: ContentMask::empty(),
            dynamic_baseline: true,
            leds: Leds::default(),
        };

        if let Err(e) = this.soft_reset() {
            if let Err(close_err) = this.transport.close() {
                warn!("failed to close transport after aborted open: {close_err}");
            }
            return Err(e);
        }
        Ok(this)
    }

    /// Reset the device and close the transport
    pub fn close(mut self) -> Result<()> {
        if !self.poisoned {
            if let Err(e) = self.link().write(reg::SOFT_RESET, &1u8) {
                warn!("soft reset on close failed: {e}");
            }
        }
        self.transport.close()?;
        debug!("session closed");
        Ok(())
    }

    /// Run `op`, poisoning the session if it fails at the transport level
    fn guard<R>(&mut self, op: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        let res = op(self);
        if let Err(e) = &res {
            if e.is_session_fatal() {
                warn!("session poisoned: {e}");
                self.poisoned = true;
            }
        }
        res
    }

    fn link(&mut self) -> Link<'_, T> {
        let sink = (self.scan_mode == ScanMode::Async).then_some(&mut self.buffer);
        Link::new(&mut self.transport, self.options.read_retries)
            .strict(self.options.strict_variable_reads)
            .async_sink(sink)
    }

    /// Reinitialize every device register, then negotiate again
    pub fn soft_reset(&mut self) -> Result<()> {
        self.guard(|s| {
            s.link().write(reg::SOFT_RESET, &1u8)?;
            s.negotiate()
        })
    }

    fn negotiate(&mut self) -> Result<()> {
        let mut link = Link::new(&mut self.transport, self.options.read_retries)
            .strict(self.options.strict_variable_reads);

        let firmware: FirmwareInfo = link.read(reg::FW_VERSION_PROTOCOL)?;
        let frame_content = ContentMask::from_bits_truncate(link.read(reg::FRAME_CONTENT_CONTROL)?);
        let buffer_control: u8 = link.read(reg::SCAN_BUFFER_CONTROL)?;
        let supported_content =
            ContentMask::from_bits_truncate(link.read(reg::FRAME_CONTENT_SUPPORTED)?);
        let dynamic_baseline: bool = link.read(reg::BASELINE_DYNAMIC_ENABLED)?;

        let max_contacts: u8 = link.read(reg::CONTACTS_MAX_COUNT)?;
        let num_rows: u16 = link.read(reg::SENSOR_NUM_ROWS)?;
        let num_cols: u16 = link.read(reg::SENSOR_NUM_COLS)?;

        let dims_shift: u8 = link.read(reg::UNIT_SHIFT_DIMS)?;
        let force_shift: u8 = link.read(reg::UNIT_SHIFT_FORCE)?;
        let angle_shift: u8 = link.read(reg::UNIT_SHIFT_ANGLE)?;
        let area_shift: u8 = link.read(reg::UNIT_SHIFT_AREA)?;
        let scales = Scales::from_shifts(dims_shift, force_shift, angle_shift, area_shift);

        let width_um: u32 = link.read(reg::SENSOR_ACTIVE_AREA_WIDTH_UM)?;
        let height_um: u32 = link.read(reg::SENSOR_ACTIVE_AREA_HEIGHT_UM)?;

        let led_count: u8 = link.read(reg::LED_COUNT)?;
        let led_max: u16 = link.read(reg::LED_BRIGHTNESS_MAX)?;
        let led_size: u8 = link.read(reg::LED_BRIGHTNESS_SIZE)?;
        let mut leds = Leds::new(led_count, led_size, led_max)?;
        if led_count > 0 {
            let raw = link.read_variable(reg::LED_BRIGHTNESS, leds.register_len())?;
            leds.load(&raw);
        }

        let sensor = SensorInfo {
            max_contacts,
            num_rows,
            num_cols,
            width: width_um as f32 / 1000.0,
            height: height_um as f32 / 1000.0,
        };
        debug!(
            "firmware {firmware}, {num_rows}x{num_cols} sensor ({:.1}x{:.1} mm), up to {max_contacts} contacts, {led_count} leds",
            sensor.width, sensor.height
        );
        debug!("content {frame_content:?} of {supported_content:?}, buffer depth {buffer_control}, {scales:?}");

        self.firmware = firmware;
        self.frame_content = frame_content;
        self.buffer_control = buffer_control;
        self.supported_content = supported_content;
        self.dynamic_baseline = dynamic_baseline;
        self.sensor = sensor;
        self.leds = leds;
        self.parser = Parser {
            scales,
            max_contacts,
            cells: sensor.cells(),
            ..Default::default()
        };
        self.buffer = FrameBuffer::default();
        self.scanning = false;
        self.scan_mode = ScanMode::Sync;
        Ok(())
    }

    pub fn firmware_info(&self) -> FirmwareInfo {
        self.firmware
    }

    pub fn sensor_info(&self) -> SensorInfo {
        self.sensor
    }

    /// Unit scale factors read at open
    pub fn scales(&self) -> Scales {
        self.parser.scales
    }

    pub fn supported_frame_content(&self) -> ContentMask {
        self.supported_content
    }

    pub fn frame_content(&self) -> ContentMask {
        self.frame_content
    }

    /// Select the sections carried by every frame.
    ///
    /// Content the device cannot produce is rejected before any I/O. Without a
    /// decompressor the pressure and label bits are dropped silently.
    pub fn set_frame_content(&mut self, content: ContentMask) -> Result<()> {
        self.guard(|s| {
            if !s.supported_content.contains(content) {
                return Err(Error::UnsupportedContent {
                    requested: content,
                    supported: s.supported_content,
                });
            }
            let content = if s.decompressor.is_some() {
                content
            } else {
                content.difference(ContentMask::MAPS)
            };
            if content == s.frame_content {
                return Ok(());
            }
            s.link().write(reg::FRAME_CONTENT_CONTROL, &content.bits())?;
            s.frame_content = content;
            Ok(())
        })
    }

    pub fn scan_mode(&self) -> ScanMode {
        self.scan_mode
    }

    /// Switch scan mode, updating the device immediately if it is scanning
    pub fn set_scan_mode(&mut self, mode: ScanMode) -> Result<()> {
        self.guard(|s| {
            if s.scanning && mode != s.scan_mode {
                s.link().write(reg::SCAN_ENABLED, &mode.code())?;
            }
            s.scan_mode = mode;
            Ok(())
        })
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Start scanning in the current mode. Resets the frame buffer and the
    /// dropped frame counter.
    pub fn start_scanning(&mut self) -> Result<()> {
        self.guard(|s| {
            if s.scanning {
                return Ok(());
            }
            s.buffer.reset();
            s.parser.counter.reset();
            let code = s.scan_mode.code();
            s.link().write(reg::SCAN_ENABLED, &code)?;
            s.scanning = true;
            debug!("scanning started in {:?} mode", s.scan_mode);
            Ok(())
        })
    }

    /// Stop scanning. Frames already buffered stay available.
    pub fn stop_scanning(&mut self) -> Result<()> {
        self.guard(|s| {
            if !s.scanning {
                return Ok(());
            }
            s.link().write(reg::SCAN_ENABLED, &SCAN_DISABLED)?;
            s.scanning = false;
            debug!("scanning stopped, {} frames buffered", s.buffer.frame_count());
            Ok(())
        })
    }

    /// Cached device-side buffering depth
    pub fn buffer_control(&self) -> u8 {
        self.buffer_control
    }

    /// Let the device batch up to `depth` frames per sync request, 0 to send
    /// one frame per request
    pub fn set_buffer_control(&mut self, depth: u8) -> Result<()> {
        self.guard(|s| {
            s.link().write(reg::SCAN_BUFFER_CONTROL, &depth)?;
            s.buffer_control = depth;
            Ok(())
        })
    }

    pub fn scan_detail(&mut self) -> Result<ScanDetail> {
        self.guard(|s| s.link().read::<u8>(reg::SCAN_DETAIL_CONTROL)?.try_into())
    }

    pub fn set_scan_detail(&mut self, detail: ScanDetail) -> Result<()> {
        self.guard(|s| s.link().write(reg::SCAN_DETAIL_CONTROL, &(detail as u8)))
    }

    pub fn dynamic_baseline(&self) -> bool {
        self.dynamic_baseline
    }

    pub fn set_dynamic_baseline(&mut self, enabled: bool) -> Result<()> {
        self.guard(|s| {
            if enabled == s.dynamic_baseline {
                return Ok(());
            }
            s.link().write(reg::BASELINE_DYNAMIC_ENABLED, &enabled)?;
            s.dynamic_baseline = enabled;
            Ok(())
        })
    }

    pub fn power_button_pressed(&mut self) -> Result<bool> {
        self.guard(|s| s.link().read(reg::POWER_BUTTON_PRESSED))
    }

    /// LED geometry and the brightness levels read at open
    pub fn leds(&self) -> &Leds {
        &self.leds
    }

    /// Run one acquisition cycle, returning how many frames were buffered
    pub fn read_sensor(&mut self) -> Result<usize> {
        self.guard(|s| {
            if !s.scanning {
                return Err(Error::InvalidArgument("scanning is not active"));
            }
            read_cycle(
                &mut s.transport,
                &mut s.buffer,
                s.scan_mode,
                s.buffer_control,
                s.options.read_retries,
            )
        })
    }

    /// Number of complete frames waiting in the buffer
    pub fn available_frames(&self) -> usize {
        self.buffer.frame_count()
    }

    /// Decode the oldest buffered frame. A frame that fails to decode is
    /// dropped, the next call moves on to the following one.
    pub fn get_frame(&mut self) -> Result<DecodedFrame> {
        self.guard(|s| {
            let Self {
                buffer,
                parser,
                decompressor,
                ..
            } = s;
            let res =
                buffer.pop_frame_with(|payload| parser.parse(payload, decompressor.as_deref_mut()));
            match &res {
                Ok(frame) if frame.lost_frames > 0 => {
                    warn!("{} frames lost before this one", frame.lost_frames)
                },
                Err(Error::NoFrames) | Ok(_) => {},
                Err(e) => warn!("dropped undecodable frame: {e}"),
            }
            res
        })
    }

    /// Device timestamp of the last decoded frame
    pub fn last_timestamp(&self) -> u32 {
        self.parser.last_timestamp
    }

    pub fn read_register(&mut self, reg: u8, size: u8) -> Result<Vec<u8>> {
        self.guard(|s| s.link().read_register(reg, size))
    }

    pub fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        self.guard(|s| s.link().write_register(reg, data))
    }

    pub fn read_register_vs(&mut self, reg: u8, max: usize) -> Result<Vec<u8>> {
        self.guard(|s| s.link().read_variable(reg, max))
    }

    /// Write a variable-size register, reporting the bytes written so far
    /// after every chunk
    pub fn write_register_vs(
        &mut self,
        reg: u8,
        data: &[u8],
        progress: &mut dyn FnMut(usize),
    ) -> Result<usize> {
        self.guard(|s| s.link().write_variable(reg, data, progress))
    }
}

/// Typed getter and setter pairs for plain fixed-size registers
macro_rules! impl_register_accessors {
    ($( $(#[$meta:meta])* $get:ident / $set:ident : $ty:ty = $reg:expr; )*) => {
        impl<T: Transport> Sensel<T> {
            $(
                $(#[$meta])*
                pub fn $get(&mut self) -> Result<$ty> {
                    self.guard(|s| s.link().read::<$ty>($reg))
                }

                $(#[$meta])*
                pub fn $set(&mut self, value: $ty) -> Result<()> {
                    self.guard(|s| s.link().write($reg, &value))
                }
            )*
        }
    };
}

impl_register_accessors! {
    /// Upper bound on the scan rate, in frames per second
    max_frame_rate / set_max_frame_rate: u16 = reg::SCAN_FRAME_RATE;
    /// Whether touching contacts merge into one
    contacts_blob_merge / set_contacts_blob_merge: bool = reg::CONTACTS_ENABLE_BLOB_MERGE;
    /// Force below which no contact is reported
    contacts_min_force / set_contacts_min_force: u16 = reg::CONTACTS_MIN_FORCE;
    /// Sub-records carried by every contact
    contacts_mask / set_contacts_mask: ContactMask = reg::CONTACTS_MASK;
}
