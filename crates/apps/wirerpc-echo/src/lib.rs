//! Echo/arith demo service for the wirerpc codec: configuration loading and
//! the handlers the `wirerpc-echo` binary serves.

pub mod config;
pub mod services;

pub use config::{AppConfig, ServerSection, DEFAULT_LISTEN};
pub use services::{register_all, AddArgs, EchoArgs, EchoReply, ARITH_ADD, ECHO_CALL};
