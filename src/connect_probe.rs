//! `tcp_connect_probe`: resolves a pending L4 connect by issuing a
//! zero-length send, the common trick for making the kernel surface a
//! deferred `connect()`'s resolved status without an extra `getsockopt`
//! round trip on most platforms. A hard failure falls back to
//! `SO_ERROR` via `take_error_raw` to recover the real errno instead of
//! whatever the zero-length send itself reported.

use log::{trace, warn};

use crate::connection::Connection;
use crate::flags::ConnFlags;
use crate::sys::socket;

/// Returns `true` if the connection is no longer waiting on L4 connect
/// (either it succeeded or a hard failure set `ERROR`), `false` if the
/// connect is still in progress and nothing more can be done this
/// entry.
pub fn probe(conn: &mut Connection) -> bool {
    if !conn.flags.contains(ConnFlags::WAIT_L4_CONN) {
        return true;
    }

    match socket::probe_writable_raw(conn.fd) {
        Ok(()) => {
            trace!("connect probe: resolved for fd={}", conn.fd);
            conn.flags.remove(ConnFlags::WAIT_L4_CONN);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            trace!("connect probe: still in progress for fd={}", conn.fd);
            false
        }
        Err(e) => {
            let real = socket::take_error_raw(conn.fd)
                .ok()
                .flatten()
                .unwrap_or(e);
            warn!("connect probe: hard failure for fd={}: {real}", conn.fd);
            conn.flags.insert(ConnFlags::ERROR);
            true
        }
    }
}
