//! Errors the connection core can raise, plus the outcome codes the
//! I/O driver returns to whatever owns the event loop.

use std::error;
use std::fmt;

/// Reasons a connection's `ERROR` bit gets set, kept distinct from
/// `io::Error` because most of these are protocol-level, not OS-level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrCode {
    /// Peek returned zero bytes where a header was expected.
    Empty,
    /// Peek returned fewer bytes than any valid header could have.
    Truncated,
    /// First bytes are not `"PROXY "`.
    NotHeader,
    /// Protocol tag after the family is neither `TCP4` nor `TCP6`.
    BadProto,
    /// Header parsed far enough to identify a family but the address,
    /// port, or trailing CRLF fields are malformed.
    BadHeader,
    /// The destructive read after a successful peek returned fewer
    /// bytes than the peek did — the header was split across segments.
    Abort,
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrCode::Empty => "peer sent no bytes before a header was expected",
            ErrCode::Truncated => "peek returned less than the shortest valid header",
            ErrCode::NotHeader => "stream does not start with the PROXY signature",
            ErrCode::BadProto => "PROXY header names an unsupported protocol family",
            ErrCode::BadHeader => "PROXY header fields failed to parse",
            ErrCode::Abort => "PROXY header split across TCP segments",
        };
        f.write_str(msg)
    }
}

/// A protocol-level failure raised while driving a connection through
/// its handshake. Distinct from `io::Error`, which the driver maps
/// into `ConnFlags::ERROR` directly without ever constructing one of
/// these (a transient `WouldBlock` is not an error at all).
#[derive(Debug)]
pub struct ProxyError {
    pub code: ErrCode,
}

impl ProxyError {
    pub fn new(code: ErrCode) -> ProxyError {
        ProxyError { code }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy protocol error: {}", self.code)
    }
}

impl error::Error for ProxyError {}

/// What the I/O driver tells its caller happened to a connection this
/// entry. The engine uses this to decide whether to keep the slot,
/// re-arm it, or free it back to the pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DriverOutcome {
    /// Connection is still live; polling has been reconciled.
    Progressed,
    /// The data layer returned a negative status and tore itself down;
    /// the driver touched nothing else and the caller must release it.
    Released,
    /// `ERROR` was set this entry; `err_code` names why.
    Failed(ErrCode),
}
