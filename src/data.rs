//! The data/stream capability sitting above the connection core. Out
//! of scope to implement (no session/stream logic ships here) — this
//! module specifies the interface and a minimal echoing implementation
//! used by the driver's own integration tests.

use std::io;

use crate::xprt::Transport;

/// Outcome of `DataLayer::init`. `Destroyed` means the data layer tore
/// the connection down from inside `init`; the driver must return
/// immediately and touch nothing else about the connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataInit {
    Ready,
    Destroyed,
}

/// Outcome of `DataLayer::wake`, the connection-state edge notification.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataWake {
    Continue,
    Destroyed,
}

/// Capability the data/stream layer above the core provides. `recv`
/// and `send` are handed the transport rather than a buffer because
/// the data layer, not the core, owns the decision of how much to pull
/// and where it lands (its own stream buffer, typically).
pub trait DataLayer {
    fn init(&mut self) -> DataInit;
    fn recv(&mut self, xprt: &mut dyn Transport) -> io::Result<usize>;
    fn send(&mut self, xprt: &mut dyn Transport) -> io::Result<usize>;
    fn wake(&mut self) -> DataWake;
}

/// A minimal data layer that echoes whatever it reads back out,
/// standing in for a real stream/session in the driver's own tests.
#[derive(Default)]
pub struct EchoData {
    buf: Vec<u8>,
}

impl DataLayer for EchoData {
    fn init(&mut self) -> DataInit {
        DataInit::Ready
    }

    fn recv(&mut self, xprt: &mut dyn Transport) -> io::Result<usize> {
        let mut chunk = [0u8; 4096];
        let n = xprt.recv(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn send(&mut self, xprt: &mut dyn Transport) -> io::Result<usize> {
        if self.buf.is_empty() {
            return Ok(0);
        }
        let n = xprt.send(&self.buf)?;
        self.buf.drain(..n);
        Ok(n)
    }

    fn wake(&mut self) -> DataWake {
        DataWake::Continue
    }
}
