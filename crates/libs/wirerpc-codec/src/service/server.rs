use std::collections::HashMap;
use std::io;
use std::marker::PhantomData;
use std::net::TcpListener;
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::message::{Message, Payload};
use crate::server::ServerCodec;
use crate::sync::{read_ignore_poison, write_ignore_poison};
use crate::transport::Conn;

// Type-erased handler: encoded params in, encoded result or error text out.
trait HandlerFn: Send + Sync {
    fn call(&self, params: Payload) -> Result<Payload, String>;
}

type BoxedHandler = Arc<dyn HandlerFn>;

struct Handler<F, P, R> {
    func: F,
    _phantom: PhantomData<fn(P) -> R>,
}

impl<F, P, R> HandlerFn for Handler<F, P, R>
where
    F: Fn(P) -> Result<R, String> + Send + Sync + 'static,
    P: Message + 'static,
    R: Message + 'static,
{
    fn call(&self, params: Payload) -> Result<Payload, String> {
        let params: P = params.decode().map_err(|err| err.to_string())?;
        let result = (self.func)(params)?;
        Payload::encode(&result).map_err(|err| err.to_string())
    }
}

/// Serves registered methods over [`ServerCodec`] connections. Each call runs
/// on its own thread; responses go out in completion order.
#[derive(Clone, Default)]
pub struct RpcServer {
    handlers: Arc<RwLock<HashMap<String, BoxedHandler>>>,
    config: CodecConfig,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            handlers: Arc::default(),
            config,
        }
    }

    /// Registers `handler` under `method`, replacing any previous handler.
    /// Returns `true` if one was replaced.
    pub fn register<F, P, R>(&self, method: impl Into<String>, handler: F) -> bool
    where
        F: Fn(P) -> Result<R, String> + Send + Sync + 'static,
        P: Message + 'static,
        R: Message + 'static,
    {
        let wrapped: BoxedHandler = Arc::new(Handler {
            func: handler,
            _phantom: PhantomData,
        });
        write_ignore_poison(&self.handlers)
            .insert(method.into(), wrapped)
            .is_some()
    }

    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = read_ignore_poison(&self.handlers).keys().cloned().collect();
        methods.sort();
        methods
    }

    fn handler(&self, method: &str) -> Option<BoxedHandler> {
        read_ignore_poison(&self.handlers).get(method).cloned()
    }

    /// Accepts connections forever, serving each on its own thread.
    pub fn serve(&self, listener: &TcpListener) -> io::Result<()> {
        log::info!("rpc server listening on {}", listener.local_addr()?);
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    log::warn!("rpc server: accept failed: {err}");
                    continue;
                }
            };
            let conn = match Conn::tcp(stream) {
                Ok(conn) => conn,
                Err(err) => {
                    log::warn!("rpc server: could not split connection: {err}");
                    continue;
                }
            };
            let server = self.clone();
            thread::Builder::new()
                .name(format!("rpc-conn {}", conn.label()))
                .spawn(move || server.serve_conn(conn))?;
        }
        Ok(())
    }

    /// Serves one connection until the peer hangs up or the stream breaks.
    /// Blocks the calling thread.
    pub fn serve_conn(&self, conn: Conn) {
        let codec = Arc::new(ServerCodec::with_config(conn, &self.config));
        self.serve_codec(codec);
    }

    pub fn serve_codec(&self, codec: Arc<ServerCodec>) {
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
        loop {
            let header = match codec.read_request_header() {
                Ok(header) => header,
                Err(CodecError::Closed) => {
                    log::debug!("rpc server({}): peer closed connection", codec.label());
                    break;
                }
                Err(err) => {
                    if !codec.is_closed() {
                        log::warn!("rpc server({}): read failed: {err}", codec.label());
                    }
                    break;
                }
            };

            let Some(handler) = self.handler(&header.method) else {
                codec.discard_request_body();
                let error = format!("rpc: can't find method {}", header.method);
                if let Err(err) = codec.write_response_payload(header.seq, Err(error.as_str())) {
                    log::warn!("rpc server({}): {err}", codec.label());
                }
                continue;
            };
            let params = codec.read_request_payload();

            in_flight.retain(|call| !call.is_finished());
            let codec = Arc::clone(&codec);
            in_flight.push(thread::spawn(move || {
                let reply = params
                    .map_err(|err| err.to_string())
                    .and_then(|params| handler.call(params));
                answer(&codec, header.seq, reply);
            }));
        }

        // Let calls that are already running answer before the stream goes away.
        for call in in_flight {
            let _ = call.join();
        }
        if let Err(err) = codec.close() {
            log::debug!("rpc server({}): close failed: {err}", codec.label());
        }
    }
}

/// Error text sent in place of a result that does not fit in one frame.
pub const RESPONSE_TOO_LARGE: &str = "response exceeds frame limit";

/// Writes one reply. A result too large for the connection's frame limit is
/// replaced by an error reply so the caller is never left waiting.
fn answer(codec: &ServerCodec, seq: u64, reply: Result<Payload, String>) {
    let written = match reply {
        Ok(result) => match codec.write_response_payload(seq, Ok(result)) {
            Err(err @ CodecError::FrameTooLarge { .. }) => {
                log::warn!("rpc server({}): response seq={} dropped: {err}", codec.label(), seq);
                codec.write_response_payload(seq, Err(RESPONSE_TOO_LARGE))
            }
            other => other,
        },
        Err(error) => codec.write_response_payload(seq, Err(error.as_str())),
    };
    match written {
        Ok(()) => {}
        Err(err) if codec.is_closed() => {
            log::debug!("rpc server({}): response seq={} not written: {err}", codec.label(), seq);
        }
        Err(err) => {
            log::warn!("rpc server({}): response seq={} not written: {err}", codec.label(), seq);
        }
    }
}
