//! The handshake dispatcher: runs each enabled handshake bit in a
//! fixed order — accept-PROXY, send-PROXY, TLS — until a step reports
//! incomplete, an error is raised, or no bits remain set. Adding a new
//! handshake phase (PROXY v2, say) is a matter of appending one more
//! `(bit, step)` pair to `STEPS`.

use log::{debug, trace, warn};

use crate::connection::Connection;
use crate::flags::ConnFlags;
use crate::proxy_v1;
use crate::reactor::Poller;
use crate::sys::socket;

/// One step of the handshake pipeline. `Ok(true)` means the step
/// completed and its bit has been cleared; `Ok(false)` means it needs
/// more data and the whole dispatcher should stop for this entry. Each
/// step gets the reactor too, since a failure path may need to quiesce
/// polling (`conn_recv_proxy`'s `fail:` label does this directly,
/// rather than deferring to the driver's own poll reconciliation).
type Step = fn(&mut Connection, &mut dyn Poller) -> std::io::Result<bool>;

const STEPS: &[(ConnFlags, Step)] = &[
    (ConnFlags::ACCEPT_PROXY, accept_proxy),
    (ConnFlags::SEND_PROXY, send_proxy),
    (ConnFlags::SSL_WAIT_HS, ssl_wait_hs),
];

/// Drains every handshake bit set on `conn`, in fixed order, until the
/// set is empty or a step needs more data or `ERROR` has been raised.
pub fn drive(conn: &mut Connection, reactor: &mut dyn Poller) {
    loop {
        if conn.flags.contains(ConnFlags::ERROR) {
            trace!("handshake: exiting, ERROR set");
            return;
        }
        if !conn.flags.intersects(ConnFlags::HANDSHAKE) {
            return;
        }

        let mut any_run = false;
        for &(bit, step) in STEPS {
            if !conn.flags.contains(bit) {
                continue;
            }
            any_run = true;
            match step(conn, reactor) {
                Ok(true) => {
                    conn.flags.remove(bit);
                    debug!("handshake: step {bit:?} complete");
                }
                Ok(false) => {
                    trace!("handshake: step {bit:?} incomplete, yielding");
                    return;
                }
                Err(e) => {
                    warn!("handshake: step {bit:?} failed with {e}");
                    conn.flags.insert(ConnFlags::ERROR);
                    return;
                }
            }
        }
        if !any_run {
            return;
        }
    }
}

/// `conn_recv_proxy`: peek for a PROXY v1 header, validate it in full,
/// then destructively re-read exactly the bytes that made it up.
fn accept_proxy(conn: &mut Connection, reactor: &mut dyn Poller) -> std::io::Result<bool> {
    // Set by the driver's refresh step when the reactor observed the
    // peer half-close before this entry; no header can still be coming.
    if conn.flags.contains(ConnFlags::SOCK_RD_SH) {
        fail(conn, reactor, crate::error::ErrCode::Abort);
        return Ok(true);
    }
    if !conn.ctrl_ready() {
        fail(conn, reactor, crate::error::ErrCode::Abort);
        return Ok(true);
    }

    let mut buf = [0u8; 256];
    let peeked = match socket::peek_raw(conn.fd, &mut buf) {
        Ok(n) => n,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            reactor.cant_recv(conn.token);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let header = match proxy_v1::parse(&buf[..peeked]) {
        Ok(h) => h,
        Err(code) => {
            // Missing data is terminal here: MSG_PEEK already showed a
            // partial header, and polling again would replay the same
            // bytes with no way to distinguish "still short" from new
            // data (the segment-atomic rule in the design notes).
            fail(conn, reactor, code);
            return Ok(true);
        }
    };

    let reread = socket::read_raw(conn.fd, &mut buf[..header.len])?;
    if reread != header.len {
        conn.flags.insert(ConnFlags::SOCK_RD_SH | ConnFlags::SOCK_WR_SH);
        fail(conn, reactor, crate::error::ErrCode::Abort);
        return Ok(true);
    }

    conn.addr_from = Some(header.from);
    conn.addr_to = Some(header.to);
    conn.flags.insert(ConnFlags::ADDR_FROM_SET | ConnFlags::ADDR_TO_SET);
    Ok(true)
}

/// Shared failure path for `accept_proxy`: set the error, and stop
/// both sock-layer directions immediately rather than waiting for the
/// driver's own poll reconciliation pass.
fn fail(conn: &mut Connection, reactor: &mut dyn Poller, code: crate::error::ErrCode) {
    conn.set_error(code);
    conn.stop_sock_both(reactor);
}

/// `conn_si_send_proxy`: emits a PROXY v1 line ahead of application
/// data. The core only ever has one line to send, so unlike the inbound
/// side there is no partial-write retry loop to manage across entries
/// beyond the usual `WouldBlock` yield.
fn send_proxy(conn: &mut Connection, _reactor: &mut dyn Poller) -> std::io::Result<bool> {
    let line = proxy_v1::make_proxy_line(conn.addr_from, conn.addr_to);
    let Some(xprt) = conn.xprt.as_deref_mut() else {
        return Ok(true);
    };
    match xprt.send(line.as_bytes()) {
        Ok(n) if n == line.len() => Ok(true),
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

/// Placeholder TLS handshake slot. No cipher/record-layer code ships
/// in this crate; a real transport overrides `Transport::handshake`.
fn ssl_wait_hs(conn: &mut Connection, _reactor: &mut dyn Poller) -> std::io::Result<bool> {
    match conn.xprt.as_deref_mut() {
        Some(xprt) => xprt.handshake(),
        None => Ok(true),
    }
}
