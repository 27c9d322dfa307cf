//! Teach.it Console Client Library Crate
//!
//! Configuration, the HTTP implementation of the tutoring service, and the
//! interactive console that drives the learning flow. The `teachit` binary
//! is a thin wrapper around this library.

pub mod config;
pub mod driver;
pub mod http;
pub mod protocol;
pub mod state;
pub mod terminal;
