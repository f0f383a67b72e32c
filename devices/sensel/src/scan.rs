//! Frame acquisition across the scan modes.

use log::trace;
use sensel_core::{Result, Stage, Transport};

use crate::abi;
use crate::buffer::FrameBuffer;
use crate::consts::{ack, reg};
use crate::register::{expect_ack, read_byte};

/// Scan enable register value that stops scanning
pub const SCAN_DISABLED: u8 = 0;

/// Device acquisition mode, also the scan enable register value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScanMode {
    /// The host requests every frame
    #[default]
    Sync = 1,
    /// The device pushes frames as they are scanned
    Async = 2,
}

impl ScanMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// How one read cycle collects frames, derived from the scan mode and the
/// device-side buffering depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Drain pushed frames until the transport runs dry
    Async,
    /// One frame per request
    Single,
    /// A burst of frames closed by an end marker
    Buffered,
}

impl Collection {
    pub fn select(mode: ScanMode, depth: u8) -> Self {
        match (mode, depth) {
            (ScanMode::Async, _) => Collection::Async,
            (ScanMode::Sync, 0) => Collection::Single,
            (ScanMode::Sync, _) => Collection::Buffered,
        }
    }
}

/// Run one acquisition cycle, returning the number of frames appended to
/// `buffer`.
///
/// In sync mode a frame request is sent first. Frames appended before a
/// failure stay resident.
pub fn read_cycle<T: Transport + ?Sized>(
    transport: &mut T,
    buffer: &mut FrameBuffer,
    mode: ScanMode,
    depth: u8,
    retries: usize,
) -> Result<usize> {
    if mode == ScanMode::Sync {
        transport.write(&abi::read_request(reg::SCAN_READ_FRAME, 0))?;
    }

    let before = buffer.frame_count();
    let collection = Collection::select(mode, depth);
    match collection {
        Collection::Async => {
            while transport.available()? > 0 {
                let code = read_byte(transport, retries)?;
                expect_ack(Stage::FrameAck, reg::SCAN_READ_FRAME, code, ack::ASYNC_DATA)?;
                buffer.append_raw_frame(transport, retries)?;
            }
        },
        Collection::Single => {
            let code = read_byte(transport, retries)?;
            expect_ack(Stage::FrameAck, reg::SCAN_READ_FRAME, code, ack::RVS)?;
            buffer.append_raw_frame(transport, retries)?;
        },
        Collection::Buffered => {
            let mut code = read_byte(transport, retries)?;
            while code == ack::RVS {
                buffer.append_raw_frame(transport, retries)?;
                code = read_byte(transport, retries)?;
            }
            expect_ack(
                Stage::FrameAck,
                reg::SCAN_READ_FRAME,
                code,
                ack::BUFFERED_FRAME_END,
            )?;
        },
    }

    let appended = buffer.frame_count() - before;
    trace!("{collection:?} cycle appended {appended} frames");
    Ok(appended)
}

#[cfg(test)]
mod tests {
    use sensel_core::Error;

    use super::*;
    use crate::mock::ScriptedTransport;

    #[test]
    fn collection_follows_mode_and_depth() {
        assert_eq!(Collection::select(ScanMode::Sync, 0), Collection::Single);
        assert_eq!(Collection::select(ScanMode::Sync, 3), Collection::Buffered);
        assert_eq!(Collection::select(ScanMode::Async, 0), Collection::Async);
        assert_eq!(Collection::select(ScanMode::Async, 3), Collection::Async);
    }

    #[test]
    fn sync_cycle_requests_one_frame() {
        let mut t = ScriptedTransport::new();
        t.frame(ack::RVS, &[0; 6]);
        let mut buffer = FrameBuffer::default();
        let n = read_cycle(&mut t, &mut buffer, ScanMode::Sync, 0, 1).unwrap();
        assert_eq!(n, 1);
        assert_eq!(t.tx, vec![0x81, 0x26, 0x00]);
    }

    #[test]
    fn sync_cycle_rejects_other_acks() {
        let mut t = ScriptedTransport::new();
        t.push(&[ack::READ_NACK]);
        let mut buffer = FrameBuffer::default();
        let err = read_cycle(&mut t, &mut buffer, ScanMode::Sync, 0, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedAck {
                stage: Stage::FrameAck,
                ack: 2,
                expected: 3,
                ..
            }
        ));
    }

    #[test]
    fn buffered_cycle_reads_until_end_marker() {
        let mut t = ScriptedTransport::new();
        t.frame(ack::RVS, &[1])
            .frame(ack::RVS, &[2])
            .push(&[ack::BUFFERED_FRAME_END]);
        let mut buffer = FrameBuffer::default();
        let n = read_cycle(&mut t, &mut buffer, ScanMode::Sync, 1, 1).unwrap();
        assert_eq!(n, 2);
        assert_eq!(buffer.frame_count(), 2);
        assert!(t.rx.is_empty());
    }

    #[test]
    fn buffered_cycle_requires_end_marker() {
        let mut t = ScriptedTransport::new();
        t.frame(ack::RVS, &[1]).push(&[ack::ASYNC_DATA]);
        let mut buffer = FrameBuffer::default();
        let err = read_cycle(&mut t, &mut buffer, ScanMode::Sync, 2, 1).unwrap_err();
        assert!(matches!(err, Error::UnexpectedAck { ack: 9, expected: 10, .. }));
        assert_eq!(buffer.frame_count(), 1);
    }

    #[test]
    fn async_cycle_drains_until_dry() {
        let mut t = ScriptedTransport::new();
        t.frame(ack::ASYNC_DATA, &[5, 5]);
        let mut buffer = FrameBuffer::default();
        let n = read_cycle(&mut t, &mut buffer, ScanMode::Async, 0, 1).unwrap();
        assert_eq!(n, 1);
        assert!(t.tx.is_empty());

        let n = read_cycle(&mut t, &mut buffer, ScanMode::Async, 0, 1).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn async_cycle_rejects_stray_ack() {
        let mut t = ScriptedTransport::new();
        t.push(&[ack::WRITE]);
        let mut buffer = FrameBuffer::default();
        let err = read_cycle(&mut t, &mut buffer, ScanMode::Async, 0, 1).unwrap_err();
        assert!(matches!(err, Error::UnexpectedAck { ack: 5, expected: 9, .. }));
    }
}
