//! A deliberately small dispatch layer on top of the codecs: enough to serve
//! named methods on a connection and to issue blocking calls against one.

mod client;
mod server;

pub use client::{dial, CallError, RpcClient};
pub use server::{RpcServer, RESPONSE_TOO_LARGE};
