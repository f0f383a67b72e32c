//! Frame content decoding.
//!
//! A frame payload is laid out as
//!
//! ```text
//! content_mask:u8 counter:u8 timestamp:u32
//! [contacts: ext_mask:u8 n:u8 contact*n]
//! [accel: x:i16 y:i16 z:i16]
//! [pressure/labels: codec bytes]
//! ```
//!
//! Each contact is a 10-byte base record followed by the ellipse, deltas,
//! bounding box and peak sub-records selected by the extension mask. Every
//! integer field is divided by its session scale factor on the way out.

use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;
use sensel_core::{ContactMask, ContentMask, Decompressor, Error, Result, NULL_LABEL};

/// Power-of-two multipliers turning raw register units into physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scales {
    pub dims: f32,
    pub force: f32,
    pub angle: f32,
    pub area: f32,
}

impl Default for Scales {
    fn default() -> Self {
        Self {
            dims: 1.0,
            force: 1.0,
            angle: 1.0,
            area: 1.0,
        }
    }
}

impl Scales {
    /// Build from the unit shift registers, `scale = 2^shift`
    pub fn from_shifts(dims: u8, force: u8, angle: u8, area: u8) -> Self {
        let scale = |shift: u8| 2f32.powi(shift as i32);
        Self {
            dims: scale(dims),
            force: scale(force),
            angle: scale(angle),
            area: scale(area),
        }
    }
}

/// Tracks the one-byte rolling frame counter to count dropped frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingCounter {
    prev: u8,
    primed: bool,
}

impl Default for RollingCounter {
    fn default() -> Self {
        Self {
            prev: u8::MAX,
            primed: false,
        }
    }
}

impl RollingCounter {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record `counter` and return how many frames were lost since the
    /// previous one. The first frame after a reset never reports losses; a
    /// repeated counter value counts as a full wrap.
    pub fn advance(&mut self, counter: u8) -> u32 {
        let lost = if self.primed {
            match counter.wrapping_sub(self.prev) {
                0 => 255,
                elapsed => elapsed as u32 - 1,
            }
        } else {
            0
        };
        self.prev = counter;
        self.primed = true;
        lost
    }
}

/// Lifecycle state of a contact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContactState {
    #[default]
    Invalid,
    Start,
    Move,
    End,
}

impl From<u8> for ContactState {
    fn from(value: u8) -> Self {
        match value {
            1 => ContactState::Start,
            2 => ContactState::Move,
            3 => ContactState::End,
            _ => ContactState::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    /// Degrees
    pub orientation: f32,
    pub major_axis: f32,
    pub minor_axis: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deltas {
    pub dx: f32,
    pub dy: f32,
    pub force: f32,
    pub area: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: f32,
    pub y: f32,
    pub force: f32,
}

/// One touch point. Positions are in millimeters, force in grams.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: u8,
    pub state: ContactState,
    pub x: f32,
    pub y: f32,
    pub force: f32,
    pub area: f32,
    pub ellipse: Option<Ellipse>,
    pub deltas: Option<Deltas>,
    pub bounding_box: Option<BoundingBox>,
    pub peak: Option<Peak>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// A fully decoded frame. Each section is present only when its content bit
/// was set on the frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFrame {
    pub content: ContentMask,
    pub lost_frames: u32,
    pub timestamp: u32,
    pub contacts: Option<Vec<Contact>>,
    /// Row-major, one value per sensor cell
    pub force: Option<Vec<f32>>,
    /// Row-major, [`NULL_LABEL`] for cells outside every contact
    pub labels: Option<Vec<u8>>,
    pub accel: Option<AccelSample>,
}

impl DecodedFrame {
    pub fn n_contacts(&self) -> usize {
        self.contacts.as_ref().map_or(0, Vec::len)
    }
}

fn read_contact(cur: &mut Cursor<&[u8]>, ext: ContactMask, s: &Scales) -> io::Result<Contact> {
    let id = cur.read_u8()?;
    let state = ContactState::from(cur.read_u8()?);
    let x = cur.read_u16::<LittleEndian>()? as f32 / s.dims;
    let y = cur.read_u16::<LittleEndian>()? as f32 / s.dims;
    let force = cur.read_u16::<LittleEndian>()? as f32 / s.force;
    let area = cur.read_u16::<LittleEndian>()? as f32 / s.area;

    let ellipse = match ext.contains(ContactMask::ELLIPSE) {
        true => Some(Ellipse {
            orientation: cur.read_i16::<LittleEndian>()? as f32 / s.angle,
            major_axis: cur.read_u16::<LittleEndian>()? as f32 / s.dims,
            minor_axis: cur.read_u16::<LittleEndian>()? as f32 / s.dims,
        }),
        false => None,
    };
    let deltas = match ext.contains(ContactMask::DELTAS) {
        true => Some(Deltas {
            dx: cur.read_i16::<LittleEndian>()? as f32 / s.dims,
            dy: cur.read_i16::<LittleEndian>()? as f32 / s.dims,
            force: cur.read_i16::<LittleEndian>()? as f32 / s.force,
            area: cur.read_i16::<LittleEndian>()? as f32 / s.area,
        }),
        false => None,
    };
    let bounding_box = match ext.contains(ContactMask::BOUNDING_BOX) {
        true => Some(BoundingBox {
            min_x: cur.read_u16::<LittleEndian>()? as f32 / s.dims,
            min_y: cur.read_u16::<LittleEndian>()? as f32 / s.dims,
            max_x: cur.read_u16::<LittleEndian>()? as f32 / s.dims,
            max_y: cur.read_u16::<LittleEndian>()? as f32 / s.dims,
        }),
        false => None,
    };
    let peak = match ext.contains(ContactMask::PEAK) {
        true => Some(Peak {
            x: cur.read_u16::<LittleEndian>()? as f32 / s.dims,
            y: cur.read_u16::<LittleEndian>()? as f32 / s.dims,
            force: cur.read_u16::<LittleEndian>()? as f32 / s.force,
        }),
        false => None,
    };

    Ok(Contact {
        id,
        state,
        x,
        y,
        force,
        area,
        ellipse,
        deltas,
        bounding_box,
        peak,
    })
}

fn truncated(section: &'static str) -> impl Fn(io::Error) -> Error {
    move |_| Error::Malformed(section)
}

/// Decodes frame payloads with the geometry and scales negotiated at open
#[derive(Debug, Clone, Default)]
pub struct Parser {
    pub scales: Scales,
    pub max_contacts: u8,
    /// Sensor cells, rows times columns
    pub cells: usize,
    pub counter: RollingCounter,
    pub last_timestamp: u32,
}

impl Parser {
    /// Decode one frame payload. Pressure and label bytes go to
    /// `decompressor`, or are skipped when there is none.
    pub fn parse<D: Decompressor + ?Sized>(
        &mut self,
        payload: &[u8],
        decompressor: Option<&mut D>,
    ) -> Result<DecodedFrame> {
        let mut cur = Cursor::new(payload);
        let content = ContentMask::from_bits_truncate(cur.read_u8().map_err(truncated("frame header"))?);
        let counter = cur.read_u8().map_err(truncated("frame header"))?;
        let timestamp = cur
            .read_u32::<LittleEndian>()
            .map_err(truncated("frame header"))?;

        self.last_timestamp = timestamp;
        let mut frame = DecodedFrame {
            content,
            lost_frames: self.counter.advance(counter),
            timestamp,
            ..Default::default()
        };

        if content.contains(ContentMask::CONTACTS) {
            let ext = ContactMask::from_bits_truncate(cur.read_u8().map_err(truncated("contact header"))?);
            let n = cur.read_u8().map_err(truncated("contact header"))?;
            if n > self.max_contacts {
                return Err(Error::Malformed("more contacts than the device supports"));
            }
            let contacts = (0..n)
                .map(|_| read_contact(&mut cur, ext, &self.scales))
                .collect::<io::Result<Vec<_>>>()
                .map_err(truncated("contact record"))?;
            frame.contacts = Some(contacts);
        }

        if content.contains(ContentMask::ACCEL) {
            let mut axis = || cur.read_i16::<LittleEndian>().map_err(truncated("acceleration"));
            frame.accel = Some(AccelSample {
                x: axis()?,
                y: axis()?,
                z: axis()?,
            });
        }

        let mut pos = cur.position() as usize;
        if content.intersects(ContentMask::MAPS) {
            let rest = &payload[pos..];
            match decompressor {
                Some(codec) => {
                    let wants_force = content.contains(ContentMask::PRESSURE);
                    let wants_labels = content.contains(ContentMask::LABELS);
                    let mut force = vec![0.0; if wants_force { self.cells } else { 0 }];
                    let mut labels = vec![NULL_LABEL; if wants_labels { self.cells } else { 0 }];
                    let used = codec.decode(rest, content, &mut force, &mut labels)?;
                    if used > rest.len() {
                        return Err(Error::Decompress(format!(
                            "codec consumed {used} bytes of {}",
                            rest.len()
                        )));
                    }
                    pos += used;
                    frame.force = wants_force.then_some(force);
                    frame.labels = wants_labels.then_some(labels);
                },
                None => {
                    trace!("no decompressor, skipping {} map bytes", rest.len());
                    pos = payload.len();
                },
            }
        }

        match payload.len() - pos {
            0 => Ok(frame),
            left => Err(Error::TrailingBytes(left)),
        }
    }
}
