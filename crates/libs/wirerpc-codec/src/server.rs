use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::config::CodecConfig;
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::{CodecError, Result};
use crate::frame::{FrameReader, FrameWriter};
use crate::message::{Message, Payload};
use crate::registry::ServerRegistry;
use crate::sync::lock_ignore_poison;
use crate::transport::{Close, Conn};

/// Placeholder carried when a handler fails with an empty message, since an
/// empty error string means success on the wire.
pub const UNSPECIFIED_ERROR: &str = "unspecified error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub method: String,
    /// Connection-local sequence number, the key for `write_response`.
    pub seq: u64,
}

struct ReadState {
    frames: FrameReader<Box<dyn Read + Send>>,
    params: Option<Payload>,
}

/// Server half of the codec for one connection.
///
/// Requests are renumbered on arrival: the dispatch engine sees local
/// sequence numbers, and `write_response` maps them back to the id the client
/// chose.
pub struct ServerCodec {
    reader: Mutex<ReadState>,
    writer: Mutex<FrameWriter<Box<dyn Write + Send>>>,
    closer: Box<dyn Close>,
    pending: ServerRegistry,
    closed: AtomicBool,
    label: String,
}

impl ServerCodec {
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
                params: None,
            }),
            writer: Mutex::new(FrameWriter::with_capacity(
                writer,
                config.max_frame_len,
                config.write_buffer_capacity,
            )),
            closer,
            pending: ServerRegistry::new(),
            closed: AtomicBool::new(false),
            label,
        }
    }

    pub fn read_request_header(&self) -> Result<RequestHeader> {
        let mut state = lock_ignore_poison(&self.reader);
        state.params = None;
        let frame = state.frames.read_frame()?;
        let envelope = RequestEnvelope::from_bytes(&frame)?;

        let seq = self.pending.register(envelope.id);
        log::debug!(
            "rpc server({}): << request seq={} id={} method={}",
            self.label,
            seq,
            envelope.id,
            envelope.method
        );
        state.params = Some(Payload::new(envelope.params));
        Ok(RequestHeader {
            method: envelope.method,
            seq,
        })
    }

    /// Decodes the params of the request last returned by
    /// [`read_request_header`](Self::read_request_header).
    pub fn read_request_body<P: Message>(&self) -> Result<P> {
        self.read_request_payload()?.decode()
    }

    /// Like [`read_request_body`](Self::read_request_body) but leaves the
    /// params encoded.
    pub fn read_request_payload(&self) -> Result<Payload> {
        let params = lock_ignore_poison(&self.reader)
            .params
            .take()
            .ok_or_else(|| CodecError::protocol("no request header has been read"))?;
        if params.is_empty() {
            return Err(CodecError::MissingParams);
        }
        Ok(params)
    }

    pub fn discard_request_body(&self) {
        lock_ignore_poison(&self.reader).params = None;
    }

    /// Answers the call registered under `seq` with either a result or an
    /// error message.
    ///
    /// The result is encoded before the call is looked up, so an encode
    /// failure leaves the call pending and the caller can still answer it
    /// with an error.
    pub fn write_response<R: Message>(&self, seq: u64, reply: Result<&R, &str>) -> Result<()> {
        let reply = match reply {
            Ok(result) => Ok(Payload::encode(result)?),
            Err(error) => Err(error),
        };
        self.write_response_payload(seq, reply)
    }

    /// Like [`write_response`](Self::write_response) with the result already
    /// encoded.
    ///
    /// The call is only released once its frame is accepted. A reply refused
    /// with [`CodecError::FrameTooLarge`] leaves it pending so it can still be
    /// answered with an error.
    pub fn write_response_payload(&self, seq: u64, reply: Result<Payload, &str>) -> Result<()> {
        let mut writer = lock_ignore_poison(&self.writer);
        let Some(id) = self.pending.get(seq) else {
            log::warn!("rpc server({}): no pending call for seq={}", self.label, seq);
            return Err(CodecError::UnknownSequence { seq });
        };

        let envelope = match reply {
            Ok(result) => ResponseEnvelope::success(id, result.into_bytes()),
            Err("") => ResponseEnvelope::failure(id, UNSPECIFIED_ERROR),
            Err(error) => ResponseEnvelope::failure(id, error),
        };
        let body = envelope.to_bytes()?;
        let written = writer.write_frame(&body);
        if !matches!(written, Err(CodecError::FrameTooLarge { .. })) {
            self.pending.take(seq);
        }
        drop(writer);
        written?;

        log::debug!(
            "rpc server({}): >> response seq={} id={} error={} len={}",
            self.label,
            seq,
            id,
            envelope.is_error(),
            body.len()
        );
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            let _ = writer.flush();
        }
        let dropped = self.pending.clear();
        log::debug!(
            "rpc server({}): closing, {} call(s) left unanswered",
            self.label,
            dropped
        );
        self.closer.close()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
