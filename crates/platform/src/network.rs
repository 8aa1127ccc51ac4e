//! Network socket abstraction for HTTP audio streams

/// A single TCP client socket.
///
/// Reads and writes go through the `embedded-io` traits; [`ReadReady`]
/// answers "is a read going to return immediately", which the orchestrator
/// uses to stay non-blocking.
///
/// [`ReadReady`]: embedded_io::ReadReady
pub trait NetworkClient:
    embedded_io_async::Read + embedded_io_async::Write + embedded_io::ReadReady
{
    /// Open a connection to `host:port`, replacing any previous one.
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// `true` while the peer has not closed the connection.
    fn is_connected(&mut self) -> bool;

    /// Close the connection. Closing a closed socket is a no-op.
    fn close(&mut self);
}
