//! The I/O driver: the single readiness callback every reactor event
//! is dispatched through. Mirrors `conn_fd_handler` — enter, refresh
//! polling flags from what the reactor observed, snapshot flags, drain
//! handshakes, move data, re-enter handshakes if something re-armed
//! them, probe a pending connect, wake the data layer on a
//! connection-state edge, then reconcile polling.

use log::{debug, trace, warn};

use crate::data::{DataInit, DataWake};
use crate::error::DriverOutcome;
use crate::flags::ConnFlags;
use crate::pool::{ConnId, Pool};
use crate::reactor::{Poller, Token};
use crate::{connect_probe, handshake};

/// Runs one driver entry for the connection registered under `token`.
/// Returns `Progressed` if the connection is still live and polling
/// has been reconciled, or `Released` once the data layer (or a fatal
/// handshake error) has relinquished it — the caller must not touch
/// the connection again after `Released`.
pub fn drive(pool: &mut Pool, reactor: &mut dyn Poller, token: Token) -> DriverOutcome {
    let id: ConnId = token.into();
    let Some(conn) = pool.get_mut(id) else {
        trace!("driver: no connection attached to token {token:?}");
        return DriverOutcome::Progressed;
    };

    // Refresh polling flags: fold a reactor-observed half-close into
    // the sock-shutdown bits before anything below acts on them.
    if reactor.is_hup(token) {
        conn.flags.insert(ConnFlags::SOCK_RD_SH | ConnFlags::SOCK_WR_SH);
    }

    let mut flags_in = conn.flags & !ConnFlags::ERROR;

    loop {
        handshake::drive(conn, reactor);

        if conn.flags.contains(ConnFlags::ERROR) {
            break;
        }

        if !conn.flags.contains(ConnFlags::POLL_SOCK) {
            conn.stop_sock_both(reactor);
        }

        if conn.flags.contains(ConnFlags::INIT_DATA) {
            let destroyed = match conn.data.as_deref_mut() {
                Some(data) => data.init() == DataInit::Destroyed,
                None => false,
            };
            conn.flags.remove(ConnFlags::INIT_DATA);
            if destroyed {
                debug!("driver: data layer destroyed connection during init");
                teardown(pool, reactor, id, token);
                return DriverOutcome::Released;
            }
        }

        let handshake_pending_before = conn.flags.intersects(ConnFlags::HANDSHAKE);

        let recv_mask = ConnFlags::DATA_RD_ENA | ConnFlags::WAIT_ROOM | ConnFlags::ERROR | ConnFlags::HANDSHAKE;
        if conn.xprt_ready()
            && conn.recv_ready(reactor)
            && (conn.flags & recv_mask) == ConnFlags::DATA_RD_ENA
        {
            flags_in = ConnFlags::WAIT_L4_CONN | ConnFlags::CONNECTED;
            if let (Some(data), Some(xprt)) = (conn.data.as_deref_mut(), conn.xprt.as_deref_mut()) {
                match data.recv(xprt) {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => reactor.cant_recv(token),
                    Err(e) => {
                        warn!("driver: data recv failed: {e}");
                        conn.flags.insert(ConnFlags::ERROR);
                    }
                }
            }
        }

        let send_mask = ConnFlags::DATA_WR_ENA | ConnFlags::WAIT_DATA | ConnFlags::ERROR | ConnFlags::HANDSHAKE;
        if conn.xprt_ready()
            && conn.send_ready(reactor)
            && (conn.flags & send_mask) == ConnFlags::DATA_WR_ENA
        {
            flags_in = ConnFlags::WAIT_L4_CONN | ConnFlags::CONNECTED;
            if let (Some(data), Some(xprt)) = (conn.data.as_deref_mut(), conn.xprt.as_deref_mut()) {
                match data.send(xprt) {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => reactor.cant_send(token),
                    Err(e) => {
                        warn!("driver: data send failed: {e}");
                        conn.flags.insert(ConnFlags::ERROR);
                    }
                }
            }
        }

        if conn.flags.contains(ConnFlags::ERROR) {
            break;
        }

        // Re-enter the handshake dispatcher only if moving data just
        // re-armed a handshake bit that wasn't pending a moment ago (a
        // renegotiation). A bit that was already pending and is simply
        // still waiting on more bytes must not spin here — control
        // returns to the event loop instead.
        let handshake_pending_after = conn.flags.intersects(ConnFlags::HANDSHAKE);
        if handshake_pending_after && !handshake_pending_before {
            continue;
        }
        break;
    }

    if conn.flags.contains(ConnFlags::WAIT_L4_CONN) {
        connect_probe::probe(conn);
    }

    if conn.flags.contains(ConnFlags::WAKE_DATA) && (conn.flags ^ flags_in).intersects(ConnFlags::CONN_STATE) {
        let destroyed = match conn.data.as_deref_mut() {
            Some(data) => data.wake() == DataWake::Destroyed,
            None => false,
        };
        if destroyed {
            debug!("driver: data layer destroyed connection on wake");
            teardown(pool, reactor, id, token);
            return DriverOutcome::Released;
        }
    }

    if !conn.flags.intersects(ConnFlags::CONN_STATE) {
        debug!("driver: connection fully established");
        conn.flags.insert(ConnFlags::CONNECTED);
    }

    conn.update_polling(reactor);

    if conn.flags.contains(ConnFlags::ERROR) {
        let code = conn.err_code;
        warn!("driver: connection entering error state: {code:?}");
        return DriverOutcome::Failed(code.unwrap_or(crate::error::ErrCode::Abort));
    }

    DriverOutcome::Progressed
}

fn teardown(pool: &mut Pool, reactor: &mut dyn Poller, id: ConnId, token: Token) {
    let conn = pool.remove(id);
    let _ = reactor.deregister(conn.fd, token);
}
