//! Minimal single-file fetch over TCP.
//!
//! A requester sends a fixed 5-byte header naming a file; the responder
//! answers with a fixed 8-byte header carrying either the file's full
//! contents or a not-found status. One request, at most one response, then
//! the connection closes.
//!
//! - [`protocol`] - frame formats and validation, no I/O
//! - [`wire`] - exact-length reads and full writes over a byte stream
//! - [`server`] - responder accept loop and session state machine
//! - [`client`] - requester session

pub mod client;
pub mod protocol;
pub mod server;
pub mod wire;

pub use client::{fetch, FetchConfig, FetchError, FetchOutcome};
pub use protocol::{
    ProtocolError, Request, RequestHeader, Response, ResponseHeader, Status, FILENAME_MAX,
    FILENAME_MIN, MAGIC, MODE_REQUEST, MODE_RESPONSE,
};
pub use server::{Server, ServerConfig};
pub use wire::{read_exact, read_limited, write_all, WireError, READ_TIMEOUT};
