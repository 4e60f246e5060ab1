//! Length-prefixed framing.
//!
//! Every envelope on the wire is `[u32 big-endian length][body]`. Readers
//! consume exactly one frame per call, so a connection can carry any number
//! of envelopes back to back.

use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};

use crate::error::{CodecError, Result};

pub const FRAME_HEADER_LEN: usize = 4;
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

fn body_len(body: &[u8]) -> Result<u32> {
    u32::try_from(body.len()).map_err(|_| CodecError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX,
    })
}

/// Prefixes `body` with its length, producing the bytes of one whole frame.
pub fn frame_body(body: &[u8]) -> Result<Vec<u8>> {
    let len = body_len(body)?;
    let mut framed = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(body);
    Ok(framed)
}

pub struct FrameReader<R> {
    inner: BufReader<R>,
    max_frame_len: u32,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, max_frame_len: u32) -> Self {
        Self::with_capacity(inner, max_frame_len, 8 * 1024)
    }

    pub fn with_capacity(inner: R, max_frame_len: u32, capacity: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, inner),
            max_frame_len,
        }
    }

    /// Blocks until one whole frame body has been read.
    ///
    /// End of stream before the first header byte is [`CodecError::Closed`];
    /// end of stream anywhere else is a truncated frame.
    pub fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        let mut filled = 0;
        while filled < FRAME_HEADER_LEN {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Err(CodecError::Closed),
                Ok(0) => return Err(CodecError::protocol("truncated frame header")),
                Ok(read) => filled += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }

        let len = u32::from_be_bytes(header);
        if len > self.max_frame_len {
            return Err(CodecError::protocol(format!(
                "frame length {len} exceeds limit {}",
                self.max_frame_len
            )));
        }

        let mut body = vec![0u8; len as usize];
        self.inner.read_exact(&mut body).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => CodecError::protocol("truncated frame body"),
            _ => CodecError::Io(err),
        })?;
        Ok(body)
    }
}

pub struct FrameWriter<W: Write> {
    inner: BufWriter<W>,
    max_frame_len: u32,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W, max_frame_len: u32) -> Self {
        Self::with_capacity(inner, max_frame_len, 8 * 1024)
    }

    pub fn with_capacity(inner: W, max_frame_len: u32, capacity: usize) -> Self {
        Self {
            inner: BufWriter::with_capacity(capacity, inner),
            max_frame_len,
        }
    }

    /// Fails with [`CodecError::FrameTooLarge`] if `body` cannot be sent as
    /// one frame on this stream.
    fn check_len(&self, body: &[u8]) -> Result<()> {
        let len = body_len(body)?;
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len: body.len(),
                max: self.max_frame_len,
            });
        }
        Ok(())
    }

    /// Writes `body` as one frame and flushes it. Nothing reaches the stream
    /// when the body is over the limit.
    pub fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        self.check_len(body)?;
        let len = body_len(body)?;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(body)?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
