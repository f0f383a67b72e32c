//! Byte-stream transport abstraction.

use std::io;

use crate::{Error, Result};

/// Empty reads tolerated before a blocking read is declared stalled
pub const DEFAULT_READ_RETRIES: usize = 1;

/// A point-to-point byte pipe to one device (serial port, BLE tunnel, ...).
///
/// The session owns its transport exclusively; opening happens before the
/// value is handed over, closing through [`Transport::close`].
pub trait Transport {
    /// Write every byte of `buf`
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read whatever is available, up to `buf.len()` bytes.
    ///
    /// Returning `Ok(0)`, or a `TimedOut`/`WouldBlock` error, means no bytes
    /// arrived in time.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of bytes that can be read without blocking
    fn available(&mut self) -> io::Result<usize>;

    /// Release the underlying link
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Fill `buf` completely, tolerating at most `retries` empty reads.
///
/// Empty reads are counted over the whole call, not per chunk, so a slow
/// trickle cannot keep a read alive forever.
pub fn read_exact<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    retries: usize,
) -> Result<()> {
    let mut filled = 0;
    let mut empty_reads = 0;
    while filled < buf.len() {
        match transport.read(&mut buf[filled..]) {
            Ok(0) => empty_reads += 1,
            Ok(n) => filled += n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                empty_reads += 1
            },
            Err(e) => return Err(Error::Io(e)),
        }
        if empty_reads > retries {
            return Err(Error::Stalled {
                wanted: buf.len(),
                missing: buf.len() - filled,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Hands out one queued chunk per read, `None` meaning an empty read
    struct Trickle(VecDeque<Option<Vec<u8>>>);

    impl Transport for Trickle {
        fn write(&mut self, _: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front().flatten() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                },
                None => Ok(0),
            }
        }

        fn available(&mut self) -> io::Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn partial_reads_are_stitched() {
        let mut t = Trickle(VecDeque::from([Some(vec![1, 2]), Some(vec![3])]));
        let mut buf = [0u8; 3];
        read_exact(&mut t, &mut buf, 0).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn one_empty_read_is_retried() {
        let mut t = Trickle(VecDeque::from([Some(vec![1]), None, Some(vec![2])]));
        let mut buf = [0u8; 2];
        read_exact(&mut t, &mut buf, DEFAULT_READ_RETRIES).unwrap();
        assert_eq!(buf, [1, 2]);
    }

    #[test]
    fn stall_is_reported_after_budget() {
        let mut t = Trickle(VecDeque::from([Some(vec![1]), None, None, Some(vec![2])]));
        let mut buf = [0u8; 2];
        let err = read_exact(&mut t, &mut buf, DEFAULT_READ_RETRIES).unwrap_err();
        assert!(matches!(err, Error::Stalled { wanted: 2, missing: 1 }));
    }
}
