use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::client::ClientCodec;
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::message::{Message, Payload};
use crate::sync::lock_ignore_poison;
use crate::transport::{self, Conn};

/// Why a call issued through [`RpcClient`] did not produce a result.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CallError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("remote error: {0}")]
    Server(String),

    #[error("connection shut down")]
    Shutdown,
}

type Waiter = mpsc::Sender<Result<Payload, CallError>>;

#[derive(Default)]
struct Waiters {
    shut_down: bool,
    calls: HashMap<u64, Waiter>,
}

struct Shared {
    codec: ClientCodec,
    next_seq: AtomicU64,
    waiters: Mutex<Waiters>,
}

/// Blocking RPC client over one connection.
///
/// Any number of threads may call concurrently; a background reader thread
/// matches responses to callers. Once the connection ends every waiting and
/// future call fails with [`CallError::Shutdown`].
pub struct RpcClient {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl RpcClient {
    pub fn new(conn: Conn) -> io::Result<Self> {
        Self::with_config(conn, &CodecConfig::default())
    }

    pub fn with_config(conn: Conn, config: &CodecConfig) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            codec: ClientCodec::with_config(conn, config),
            next_seq: AtomicU64::new(1),
            waiters: Mutex::new(Waiters::default()),
        });
        let reader_shared = Arc::clone(&shared);
        let reader = thread::Builder::new()
            .name(format!("rpc-reader {}", shared.codec.label()))
            .spawn(move || read_loop(&reader_shared))?;
        Ok(Self {
            shared,
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Issues `method` and blocks until its response arrives or the
    /// connection ends. There is no timeout; close the client to give up.
    pub fn call<P: Message, R: Message>(&self, method: &str, params: &P) -> Result<R, CallError> {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        {
            let mut waiters = lock_ignore_poison(&self.shared.waiters);
            if waiters.shut_down {
                return Err(CallError::Shutdown);
            }
            waiters.calls.insert(seq, tx);
        }

        if let Err(err) = self.shared.codec.write_request(seq, method, params) {
            lock_ignore_poison(&self.shared.waiters).calls.remove(&seq);
            return Err(err.into());
        }

        match rx.recv() {
            Ok(Ok(payload)) => Ok(payload.decode()?),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CallError::Shutdown),
        }
    }

    /// Number of calls written but not yet answered.
    pub fn pending_calls(&self) -> usize {
        self.shared.codec.pending_len()
    }

    /// Closes the connection and waits for the reader thread to fail any
    /// outstanding calls.
    pub fn close(&self) -> Result<(), CodecError> {
        let closed = self.shared.codec.close();
        if let Some(reader) = lock_ignore_poison(&self.reader).take() {
            let _ = reader.join();
        }
        closed
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        let _ = self.shared.codec.close();
    }
}

/// Connects to `address` over `network` (`"tcp"` or `"unix"`) and wraps the
/// connection in an [`RpcClient`].
pub fn dial(network: &str, address: &str) -> io::Result<RpcClient> {
    RpcClient::new(transport::dial(network, address)?)
}

fn read_loop(shared: &Shared) {
    let reason = loop {
        let header = match shared.codec.read_response_header() {
            Ok(header) => header,
            Err(err) => break err,
        };
        let seq = header.seq;
        let outcome = if header.is_error() {
            shared.codec.discard_response_body();
            Err(CallError::Server(header.error))
        } else {
            shared.codec.take_response_payload().map_err(CallError::from)
        };

        match lock_ignore_poison(&shared.waiters).calls.remove(&seq) {
            Some(waiter) => {
                let _ = waiter.send(outcome);
            }
            None => log::warn!(
                "rpc client({}): response seq={} has no waiting caller",
                shared.codec.label(),
                seq
            ),
        }
    };

    match reason {
        CodecError::Closed => {
            log::debug!("rpc client({}): server closed connection", shared.codec.label());
        }
        err if shared.codec.is_closed() => {
            log::debug!("rpc client({}): reader stopped after close: {err}", shared.codec.label());
        }
        err => log::warn!("rpc client({}): reader stopped: {err}", shared.codec.label()),
    }

    // The codec registry holds only calls already on the wire. A caller that
    // registered its waiter but has not written yet is only in `waiters`.
    let mut waiters = {
        let mut waiters = lock_ignore_poison(&shared.waiters);
        waiters.shut_down = true;
        std::mem::take(&mut waiters.calls)
    };
    for (seq, method) in shared.codec.abandon_pending() {
        log::debug!(
            "rpc client({}): failing pending call seq={} method={}",
            shared.codec.label(),
            seq,
            method
        );
        if let Some(waiter) = waiters.remove(&seq) {
            let _ = waiter.send(Err(CallError::Shutdown));
        }
    }
    for (_, waiter) in waiters {
        let _ = waiter.send(Err(CallError::Shutdown));
    }
    let _ = shared.codec.close();
}
