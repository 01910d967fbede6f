//! Network abstraction for the binary command link.
//!
//! The command channel speaks a framed binary protocol over any transport
//! that can connect, push bytes, and do a bounded-duration read: in
//! production a TLS-secured WebSocket, in tests the in-memory
//! [`MockTransport`](crate::hal::MockTransport). The secure transport
//! adapter itself (TLS session setup, certificate handling) lives outside
//! this crate; see [`TlsConfig`](crate::config::TlsConfig) for the
//! credential surface it consumes.

use core::time::Duration;

/// A binary, message-oriented transport.
///
/// The channel drives this with a strict lifecycle: `connect` once on
/// start, any number of `send_binary`/`receive_binary` calls, then `close`
/// on stop. `close` must be safe to call when already closed; shutdown is
/// expressed by closing the transport, there is no separate cancellation
/// token.
pub trait BinaryTransport {
    /// Error type for transport operations.
    type Error;

    /// Open the connection to the given URI.
    fn connect(&mut self, uri: &str) -> Result<(), Self::Error>;

    /// Close the connection. Must be idempotent.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Send one binary message.
    fn send_binary(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Wait up to `timeout` for one binary message.
    ///
    /// Returns `Ok(None)` when the timeout elapses without a message.
    fn receive_binary(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, Self::Error>;
}
