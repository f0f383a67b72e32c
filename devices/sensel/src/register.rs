//! Register access over a byte transport.
//!
//! A [`Link`] borrows the transport for one or more exchanges. When the
//! device pushes frames on its own (asynchronous scanning) a frame may land
//! between a request and its acknowledgement; giving the link an async sink
//! makes it drain such frames into the accumulation buffer before looking at
//! the real acknowledgement.

use log::{trace, warn};
use sensel_core::{read_exact, Error, Result, Stage, Transport};

use crate::abi::{self, RegisterValue};
use crate::buffer::FrameBuffer;
use crate::checksum::checksum;
use crate::consts::{ack, MAX_VS_CHUNK};

/// Read a single byte
pub(crate) fn read_byte<T: Transport + ?Sized>(transport: &mut T, retries: usize) -> Result<u8> {
    let mut byte = [0u8];
    read_exact(transport, &mut byte, retries)?;
    Ok(byte[0])
}

/// Check an acknowledgement code
pub(crate) fn expect_ack(stage: Stage, reg: u8, code: u8, expected: u8) -> Result<()> {
    (code == expected).then_some(()).ok_or(Error::UnexpectedAck {
        stage,
        reg,
        ack: code,
        expected,
    })
}

/// Read and throw away `n` bytes, keeping the stream aligned after a rejected
/// response
fn skip<T: Transport + ?Sized>(transport: &mut T, n: usize, retries: usize) -> Result<()> {
    let mut sink = vec![0u8; n];
    read_exact(transport, &mut sink, retries)
}

pub struct Link<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    async_sink: Option<&'a mut FrameBuffer>,
    retries: usize,
    strict: bool,
}

impl<'a, T: Transport + ?Sized> Link<'a, T> {
    pub fn new(transport: &'a mut T, retries: usize) -> Self {
        Self {
            transport,
            async_sink: None,
            retries,
            strict: true,
        }
    }

    /// Route async frames met during register exchanges into `buffer`
    pub fn async_sink(mut self, buffer: Option<&'a mut FrameBuffer>) -> Self {
        self.async_sink = buffer;
        self
    }

    /// Whether variable-size reads enforce their ack code and checksum
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn byte(&mut self) -> Result<u8> {
        read_byte(&mut *self.transport, self.retries)
    }

    /// Drain pending async frames, returning the first acknowledgement code
    /// that is not an async data marker.
    ///
    /// A frame that fails its checksum has still been read in full, so it is
    /// dropped and draining continues up to the register response.
    pub fn drain_async(&mut self, mut code: u8) -> Result<u8> {
        if let Some(buffer) = self.async_sink.as_deref_mut() {
            while code == ack::ASYNC_DATA {
                trace!("draining async frame ahead of register response");
                match buffer.append_raw_frame(&mut *self.transport, self.retries) {
                    Ok(()) => {},
                    Err(e @ Error::Checksum { .. }) => warn!("dropped async frame: {e}"),
                    Err(e) => return Err(e),
                }
                code = read_byte(&mut *self.transport, self.retries)?;
            }
        }
        Ok(code)
    }

    /// Fixed-size read of `size` bytes
    pub fn read_register(&mut self, reg: u8, size: u8) -> Result<Vec<u8>> {
        if size == 0 {
            return Err(Error::InvalidArgument(
                "fixed-size reads need a non-zero size",
            ));
        }
        self.transport.write(&abi::read_request(reg, size))?;
        let code = self.byte()?;
        let code = self.drain_async(code)?;
        expect_ack(Stage::RegisterRead, reg, code, ack::READ)?;

        let mut head = [0u8; 3];
        read_exact(&mut *self.transport, &mut head, self.retries)?;
        trace!("read {reg:#04x}: echo {:#04x}", head[0]);
        let actual = u16::from_le_bytes([head[1], head[2]]) as usize;
        if actual != size as usize {
            skip(&mut *self.transport, actual + 1, self.retries)?;
            return Err(Error::SizeMismatch {
                stage: Stage::RegisterRead,
                reg,
                expected: size as usize,
                actual,
            });
        }

        let mut payload = vec![0u8; actual];
        read_exact(&mut *self.transport, &mut payload, self.retries)?;
        let received = self.byte()?;
        let computed = checksum(&payload);
        (computed == received)
            .then_some(payload)
            .ok_or(Error::Checksum {
                stage: Stage::RegisterRead,
                computed,
                received,
            })
    }

    /// Fixed-size write
    pub fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        if data.len() > u8::MAX as usize {
            return Err(Error::InvalidArgument(
                "fixed-size writes carry at most 255 bytes",
            ));
        }
        self.transport.write(&abi::write_request(reg, data))?;
        let code = self.byte()?;
        let code = self.drain_async(code)?;
        let echo = self.byte()?;
        trace!("write {reg:#04x}: echo {echo:#04x}");
        expect_ack(Stage::RegisterWrite, reg, code, ack::WRITE)
    }

    /// Variable-size read of at most `max` bytes
    pub fn read_variable(&mut self, reg: u8, max: usize) -> Result<Vec<u8>> {
        self.transport.write(&abi::read_request(reg, 0))?;
        let code = self.byte()?;
        let code = self.drain_async(code)?;
        let mut rest = [0u8; 4];
        read_exact(&mut *self.transport, &mut rest, self.retries)?;
        trace!("variable read {reg:#04x}: ack block [{code}, {:#04x}, {:#04x}]", rest[0], rest[1]);
        let actual = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        if self.strict {
            if let Err(e) = expect_ack(Stage::VariableRead, reg, code, ack::RVS) {
                skip(&mut *self.transport, actual + 1, self.retries)?;
                return Err(e);
            }
        }

        if actual > max {
            skip(&mut *self.transport, actual + 1, self.retries)?;
            return Err(Error::Overflow {
                stage: Stage::VariableRead,
                reg,
                capacity: max,
                actual,
            });
        }

        let mut payload = vec![0u8; actual];
        read_exact(&mut *self.transport, &mut payload, self.retries)?;
        let received = self.byte()?;
        let computed = checksum(&payload);
        if computed != received {
            if self.strict {
                return Err(Error::Checksum {
                    stage: Stage::VariableRead,
                    computed,
                    received,
                });
            }
            warn!(
                "variable read {reg:#04x}: checksum mismatch ({computed:#04x} != {received:#04x}), keeping payload"
            );
        }
        Ok(payload)
    }

    /// Variable-size write, sent in chunks of at most 512 bytes. `progress`
    /// receives the running byte count after every acknowledged chunk.
    pub fn write_variable(
        &mut self,
        reg: u8,
        data: &[u8],
        progress: &mut dyn FnMut(usize),
    ) -> Result<usize> {
        let len = u32::try_from(data.len())
            .map_err(|_| Error::InvalidArgument("variable-size payload exceeds u32 range"))?;
        self.transport.write(&abi::variable_write_header(reg, len))?;
        let code = self.byte()?;
        let code = self.drain_async(code)?;
        let echo = self.byte()?;
        trace!("variable write {reg:#04x}: header ack {code}, echo {echo:#04x}");

        let mut written = 0;
        for chunk in data.chunks(MAX_VS_CHUNK) {
            self.transport.write(&abi::variable_chunk(chunk))?;
            let code = self.byte()?;
            expect_ack(Stage::VariableWrite, reg, code, ack::WVS)?;
            written += chunk.len();
            progress(written);
        }
        Ok(written)
    }

    /// Typed fixed-size read
    pub fn read<V: RegisterValue>(&mut self, reg: u8) -> Result<V> {
        self.read_register(reg, V::SIZE).map(|bytes| V::from_bytes(&bytes))
    }

    /// Typed fixed-size write
    pub fn write<V: RegisterValue>(&mut self, reg: u8, value: &V) -> Result<()> {
        self.write_register(reg, &value.to_bytes())
    }
}
