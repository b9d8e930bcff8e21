//! The transport capability: whatever actually moves bytes across the
//! wire for a connection. Out of scope to implement (no TLS record
//! layer ships here) — this module only specifies the interface the
//! driver calls through, and the raw passthrough used by tests and by
//! connections that never need anything beyond TCP.

use std::io;
use std::os::unix::io::RawFd;

use crate::sys::Socket;

/// Capability a connection's transport must provide. A transport may
/// tear itself down on fatal error; the driver re-checks `Option<Box<dyn
/// Transport>>` after every call rather than assuming the handle is
/// still valid.
pub trait Transport {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Advances the `SSL_WAIT_HS` handshake slot. Returns `Ok(true)`
    /// once the transport handshake is complete. The default
    /// implementation completes immediately, since this crate ships no
    /// cipher/record-layer code — a real TLS transport overrides this.
    fn handshake(&mut self) -> io::Result<bool> {
        Ok(true)
    }
}

/// A plain, unencrypted TCP transport: `recv`/`send` go straight to the
/// socket, and the handshake slot is a no-op.
pub struct RawTransport {
    sock: Socket,
}

impl RawTransport {
    pub unsafe fn from_raw_fd(fd: RawFd) -> RawTransport {
        RawTransport {
            sock: Socket::from_raw(fd),
        }
    }
}

impl Transport for RawTransport {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.sock.read(buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sock.write(buf)
    }
}
