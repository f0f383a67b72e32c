//! Accumulation buffer for raw frames drained from the transport.
//!
//! The buffer holds zero or more complete frames back to back, each stored as
//! a little-endian `u16` payload length followed by the payload. The wire
//! checksum is verified on arrival and never stored. A frame that fails to
//! arrive completely is rolled back, so partial frames are never resident.

use log::trace;
use sensel_core::{read_exact, Error, Result, Stage, Transport};

use crate::checksum::checksum;

/// Allocation made when a session opens
pub const INITIAL_CAPACITY: usize = 256;

const LEN_PREFIX: usize = 2;

#[derive(Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
    /// Planned capacity, grown to twice the need whenever a need exceeds it
    capacity: usize,
    frames: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            frames: 0,
        }
    }

    /// Make room for `need` bytes in total. Growth doubles the need, so a
    /// buffer that ends up holding `n` bytes reallocates O(log n) times.
    pub fn ensure_capacity(&mut self, need: usize) {
        if self.capacity < need {
            self.capacity = need * 2;
            self.data.reserve_exact(self.capacity - self.data.len());
            trace!("frame buffer grown to {} bytes", self.capacity);
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of complete frames resident
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Bytes in use, length prefixes included
    pub fn resident_bytes(&self) -> usize {
        self.data.len()
    }

    /// Drop every resident frame, keeping the allocation
    pub fn reset(&mut self) {
        self.data.clear();
        self.frames = 0;
    }

    /// Drain one raw frame (`reg, header, len:u16, payload, checksum`) from
    /// the transport into the buffer tail.
    pub fn append_raw_frame<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        retries: usize,
    ) -> Result<()> {
        let mut head = [0u8; 4];
        read_exact(transport, &mut head, retries)?;
        let len = u16::from_le_bytes([head[2], head[3]]) as usize;

        let start = self.data.len();
        self.ensure_capacity(start + len + 3);
        self.data.extend_from_slice(&head[2..]);
        self.data.resize(start + LEN_PREFIX + len + 1, 0);

        if let Err(e) = read_exact(transport, &mut self.data[start + LEN_PREFIX..], retries) {
            self.data.truncate(start);
            return Err(e);
        }

        let end = start + LEN_PREFIX + len;
        let computed = checksum(&self.data[start + LEN_PREFIX..end]);
        let received = self.data[end];
        if computed != received {
            self.data.truncate(start);
            return Err(Error::Checksum {
                stage: Stage::FrameDrain,
                computed,
                received,
            });
        }

        self.data.truncate(end);
        self.frames += 1;
        trace!("buffered frame of {len} bytes ({} resident)", self.frames);
        Ok(())
    }

    /// Hand the oldest frame's payload to `parse`, then remove the frame
    /// whatever the outcome.
    pub fn pop_frame_with<R>(&mut self, parse: impl FnOnce(&[u8]) -> Result<R>) -> Result<R> {
        if self.frames == 0 {
            return Err(Error::NoFrames);
        }
        let len = u16::from_le_bytes([self.data[0], self.data[1]]) as usize;
        let res = parse(&self.data[LEN_PREFIX..LEN_PREFIX + len]);
        self.data.drain(..LEN_PREFIX + len);
        self.frames -= 1;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;

    #[test]
    fn growth_stays_within_twice_the_largest_need() {
        let mut buffer = FrameBuffer::with_capacity(0);
        let mut max_need = 0;
        for need in [3, 1, 7, 7, 8, 40, 16, 81, 80, 300, 2] {
            buffer.ensure_capacity(need);
            max_need = max_need.max(need);
            assert!(buffer.capacity() >= max_need);
            assert!(buffer.capacity() <= 2 * max_need);
        }
    }

    #[test]
    fn frames_are_stored_without_checksum() {
        let mut t = ScriptedTransport::new();
        t.raw_frame(&[1, 2, 3]);
        let mut buffer = FrameBuffer::default();
        buffer.append_raw_frame(&mut t, 1).unwrap();

        assert_eq!(buffer.frame_count(), 1);
        assert_eq!(buffer.resident_bytes(), 5);
        let payload = buffer.pop_frame_with(|p| Ok(p.to_vec())).unwrap();
        assert_eq!(payload, vec![1, 2, 3]);
        assert_eq!(buffer.resident_bytes(), 0);
    }

    #[test]
    fn bad_checksum_leaves_no_trace() {
        let mut t = ScriptedTransport::new();
        t.raw_frame(&[9]);
        t.push(&[0, 0, 2, 0, 1, 1, 0xff]);
        let mut buffer = FrameBuffer::default();
        buffer.append_raw_frame(&mut t, 1).unwrap();

        let err = buffer.append_raw_frame(&mut t, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::Checksum {
                stage: Stage::FrameDrain,
                computed: 2,
                received: 0xff
            }
        ));
        assert_eq!(buffer.frame_count(), 1);
        assert_eq!(buffer.resident_bytes(), 3);
    }

    #[test]
    fn truncated_frame_is_rolled_back() {
        let mut t = ScriptedTransport::new();
        t.push(&[0, 0, 4, 0, 1, 2]);
        let mut buffer = FrameBuffer::default();
        let err = buffer.append_raw_frame(&mut t, 1).unwrap_err();
        assert!(matches!(err, Error::Stalled { wanted: 5, missing: 3 }));
        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.resident_bytes(), 0);
    }

    #[test]
    fn frame_count_tracks_appends_and_pops() {
        let mut t = ScriptedTransport::new();
        let mut buffer = FrameBuffer::with_capacity(4);
        let mut expected = 0usize;

        for round in 0..6u8 {
            for i in 0..=round % 3 {
                t.raw_frame(&vec![round; (i as usize) * 50]);
                buffer.append_raw_frame(&mut t, 1).unwrap();
                expected += 1;
            }
            for _ in 0..round % 2 + 1 {
                if expected == 0 {
                    break;
                }
                buffer.pop_frame_with(|_| Ok(())).unwrap();
                expected -= 1;
            }
            assert_eq!(buffer.frame_count(), expected);
        }

        while expected > 0 {
            buffer.pop_frame_with(|_| Ok(())).unwrap();
            expected -= 1;
        }
        let before = buffer.resident_bytes();
        assert!(matches!(buffer.pop_frame_with(|_| Ok(())), Err(Error::NoFrames)));
        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.resident_bytes(), before);
    }

    #[test]
    fn failed_parse_still_removes_frame() {
        let mut t = ScriptedTransport::new();
        t.raw_frame(&[1]).raw_frame(&[2]);
        let mut buffer = FrameBuffer::default();
        buffer.append_raw_frame(&mut t, 1).unwrap();
        buffer.append_raw_frame(&mut t, 1).unwrap();

        let res: Result<()> = buffer.pop_frame_with(|_| Err(Error::TrailingBytes(1)));
        assert!(res.is_err());
        let next = buffer.pop_frame_with(|p| Ok(p[0])).unwrap();
        assert_eq!(next, 2);
    }
}
