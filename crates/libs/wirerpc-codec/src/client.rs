use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::config::CodecConfig;
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::{CodecError, Result};
use crate::frame::{FrameReader, FrameWriter};
use crate::message::{Message, Payload};
use crate::registry::ClientRegistry;
use crate::sync::lock_ignore_poison;
use crate::transport::{Close, Conn};

/// What the dispatch engine learns from one response before touching its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub method: String,
    pub seq: u64,
    /// Remote error text, empty on success.
    pub error: String,
}

impl ResponseHeader {
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

struct ReadState {
    frames: FrameReader<Box<dyn Read + Send>>,
    body: Option<Payload>,
}

/// Client half of the codec for one connection.
///
/// Shared between any number of call-issuing threads (`write_request`) and a
/// single reader loop (`read_response_header` followed by one of the body
/// operations).
pub struct ClientCodec {
    reader: Mutex<ReadState>,
    writer: Mutex<FrameWriter<Box<dyn Write + Send>>>,
    closer: Box<dyn Close>,
    pending: ClientRegistry,
    closed: AtomicBool,
    label: String,
}

impl ClientCodec {
    pub fn new(conn: Conn) -> Self {
        Self::with_config(conn, &CodecConfig::default())
    }

    pub fn with_config(conn: Conn, config: &CodecConfig) -> Self {
        let label = conn.label().to_string();
        let Conn {
            reader,
            writer,
            closer,
            ..
        } = conn;
        Self {
            reader: Mutex::new(ReadState {
                frames: FrameReader::with_capacity(
                    reader,
                    config.max_frame_len,
                    config.read_buffer_capacity,
                ),
                body: None,
            }),
            writer: Mutex::new(FrameWriter::with_capacity(
                writer,
                config.max_frame_len,
                config.write_buffer_capacity,
            )),
            closer,
            pending: ClientRegistry::new(),
            closed: AtomicBool::new(false),
            label,
        }
    }

    /// Places one call on the wire and remembers `seq → method` until its
    /// response arrives.
    pub fn write_request<P: Message>(&self, seq: u64, method: &str, params: &P) -> Result<()> {
        let envelope = RequestEnvelope {
            method: method.to_string(),
            params: params.encode()?,
            id: seq,
        };
        let body = envelope.to_bytes()?;

        let mut writer = lock_ignore_poison(&self.writer);
        // Registered before the bytes leave so a fast reply always finds it.
        self.pending.insert(seq, method)?;
        if let Err(err) = writer.write_frame(&body) {
            self.pending.take(seq);
            return Err(err);
        }
        drop(writer);

        log::debug!(
            "rpc client({}): >> request seq={} method={} len={}",
            self.label,
            seq,
            method,
            body.len()
        );
        Ok(())
    }

    /// Blocks for the next response and resolves which call it answers.
    pub fn read_response_header(&self) -> Result<ResponseHeader> {
        let mut state = lock_ignore_poison(&self.reader);
        state.body = None;
        let frame = state.frames.read_frame()?;
        let envelope = ResponseEnvelope::from_bytes(&frame)?;

        let Some(method) = self.pending.take(envelope.id) else {
            log::warn!(
                "rpc client({}): response for unknown call id={}",
                self.label,
                envelope.id
            );
            return Err(CodecError::protocol(format!(
                "response for unknown call id {}",
                envelope.id
            )));
        };

        log::debug!(
            "rpc client({}): << response seq={} method={} error={}",
            self.label,
            envelope.id,
            method,
            envelope.is_error()
        );
        state.body = Some(Payload::new(envelope.result));
        Ok(ResponseHeader {
            method,
            seq: envelope.id,
            error: envelope.error,
        })
    }

    /// Decodes the result of the response last returned by
    /// [`read_response_header`](Self::read_response_header).
    pub fn read_response_body<R: Message>(&self) -> Result<R> {
        self.take_response_payload()?.decode()
    }

    /// Hands out the still-encoded result so it can be decoded later, on the
    /// thread that knows its type.
    pub fn take_response_payload(&self) -> Result<Payload> {
        lock_ignore_poison(&self.reader)
            .body
            .take()
            .ok_or_else(|| CodecError::protocol("no response header has been read"))
    }

    /// Drops the current result without decoding it.
    pub fn discard_response_body(&self) {
        lock_ignore_poison(&self.reader).body = None;
    }

    /// Shuts the stream down. Pending calls stay in the registry; see
    /// [`abandon_pending`](Self::abandon_pending).
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            let _ = writer.flush();
        }
        log::debug!(
            "rpc client({}): closing with {} pending call(s)",
            self.label,
            self.pending.len()
        );
        self.closer.close()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Empties the registry and returns the calls that will never be
    /// answered on this connection, so the caller can fail them.
    pub fn abandon_pending(&self) -> Vec<(u64, String)> {
        self.pending.drain()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
