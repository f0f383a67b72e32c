use crate::{ContentMask, Result};

/// Label value for sensor cells not covered by any contact
pub const NULL_LABEL: u8 = 255;

/// Pressure and label map codec.
///
/// The frame parser hands every byte following the contact and acceleration
/// sections to the codec, which fills the maps selected by `content` and
/// reports how many bytes it consumed.
pub trait Decompressor: Send {
    /// Decode `data` into `force` (one value per sensor cell, row-major) and
    /// `labels` (one byte per sensor cell). A map is empty when its content
    /// bit is clear.
    fn decode(
        &mut self,
        data: &[u8],
        content: ContentMask,
        force: &mut [f32],
        labels: &mut [u8],
    ) -> Result<usize>;
}
