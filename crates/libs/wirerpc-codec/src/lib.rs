//! Length-prefixed MessagePack codec for request/response RPC.
//!
//! Every frame on the wire is a big-endian `u32` length followed by one
//! MessagePack envelope:
//!
//! - requests: `[method, params, id]`
//! - responses: `[id, result, error]`
//!
//! `params` and `result` are the MessagePack encoding of the call argument
//! and return value, carried as opaque binary so the envelope can be routed
//! before either is decoded.
//!
//! The crate provides:
//!
//! - [`ClientCodec`] and [`ServerCodec`], the two halves a dispatch engine
//!   drives: write a request / read a response on one side, read a request /
//!   write a response on the other, correlating calls by sequence number
//! - [`Message`], implemented for every serde type, and [`Payload`] for
//!   bodies whose concrete type is only known later
//! - [`transport`] helpers that split TCP and Unix streams into [`Conn`]s
//! - a small [`service`] layer ([`RpcServer`], [`RpcClient`]) built on the
//!   codecs

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod message;
pub mod registry;
pub mod server;
pub mod service;
mod sync;
pub mod transport;

pub use client::{ClientCodec, ResponseHeader};
pub use config::CodecConfig;
pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use error::{CodecError, Result};
pub use frame::{frame_body, FrameReader, FrameWriter, DEFAULT_MAX_FRAME_LEN, FRAME_HEADER_LEN};
pub use message::{Message, Payload};
pub use server::{RequestHeader, ServerCodec, UNSPECIFIED_ERROR};
pub use service::{CallError, RpcClient, RpcServer, RESPONSE_TOO_LARGE};
pub use transport::{Close, Conn};
