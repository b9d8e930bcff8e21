//! The connection record: the single `flags` word plus the handful of
//! capability handles and addresses it governs, and the poll
//! reconciler that keeps the reactor's subscriptions in sync with it.

use std::net::SocketAddr;
use std::os::unix::io::RawFd;

use log::trace;

use crate::data::DataLayer;
use crate::error::ErrCode;
use crate::flags::ConnFlags;
use crate::reactor::{Poller, Token};
use crate::xprt::Transport;

pub struct Connection {
    pub fd: RawFd,
    pub token: Token,
    pub flags: ConnFlags,
    pub xprt: Option<Box<dyn Transport>>,
    pub data: Option<Box<dyn DataLayer>>,
    pub addr_from: Option<SocketAddr>,
    pub addr_to: Option<SocketAddr>,
    pub err_code: Option<ErrCode>,
}

impl Connection {
    pub fn new(fd: RawFd, token: Token, flags: ConnFlags) -> Connection {
        Connection {
            fd,
            token,
            flags,
            xprt: None,
            data: None,
            addr_from: None,
            addr_to: None,
            err_code: None,
        }
    }

    /// The descriptor is attached and usable for control operations: a
    /// live fd and no fatal transport-layer tear-down (`xprt` going to
    /// `None`, per `xprt.rs`).
    pub fn ctrl_ready(&self) -> bool {
        self.fd >= 0 && self.xprt.is_some()
    }

    /// A transport is still attached (not torn down by a callback).
    pub fn xprt_ready(&self) -> bool {
        self.xprt.is_some()
    }

    pub fn recv_ready(&self, reactor: &dyn Poller) -> bool {
        self.ctrl_ready() && reactor.recv_ready(self.token)
    }

    pub fn send_ready(&self, reactor: &dyn Poller) -> bool {
        self.ctrl_ready() && reactor.send_ready(self.token)
    }

    pub fn set_error(&mut self, code: ErrCode) {
        self.err_code = Some(code);
        self.flags.insert(ConnFlags::ERROR);
    }

    /// Mirrors `conn_sock_stop_both`: withdraws both sock-layer
    /// directions, used on every handshake failure path.
    pub fn stop_sock_both(&mut self, reactor: &mut dyn Poller) {
        self.flags.remove(ConnFlags::SOCK_RD_ENA | ConnFlags::SOCK_WR_ENA);
        self.update_sock_polling(reactor);
    }

    /// `conn_cond_update_polling`: dispatches to the sock-layer
    /// reconciler while a handshake needs polling, the data-layer one
    /// once the connection is purely in the data phase.
    pub fn update_polling(&mut self, reactor: &mut dyn Poller) {
        if self.flags.contains(ConnFlags::POLL_SOCK) {
            self.update_sock_polling(reactor);
        } else {
            self.update_data_polling(reactor);
        }
    }

    pub fn update_sock_polling(&mut self, reactor: &mut dyn Poller) {
        self.reconcile(
            reactor,
            ConnFlags::SOCK_RD_ENA,
            ConnFlags::SOCK_WR_ENA,
            "sock",
        );
    }

    pub fn update_data_polling(&mut self, reactor: &mut dyn Poller) {
        self.reconcile(
            reactor,
            ConnFlags::DATA_RD_ENA,
            ConnFlags::DATA_WR_ENA,
            "data",
        );
    }

    fn reconcile(
        &mut self,
        reactor: &mut dyn Poller,
        rd_ena: ConnFlags,
        wr_ena: ConnFlags,
        layer: &str,
    ) {
        if !self.ctrl_ready() {
            return;
        }

        let want_rd = self.flags.contains(rd_ena);
        let have_rd = self.flags.contains(ConnFlags::CURR_RD_ENA);
        if want_rd && !have_rd {
            trace!("{layer}: want_recv token={:?}", self.token);
            let _ = reactor.want_recv(self.token);
            self.flags.insert(ConnFlags::CURR_RD_ENA);
        } else if !want_rd && have_rd {
            trace!("{layer}: stop_recv token={:?}", self.token);
            let _ = reactor.stop_recv(self.token);
            self.flags.remove(ConnFlags::CURR_RD_ENA);
        }

        let want_wr = self.flags.contains(wr_ena);
        let have_wr = self.flags.contains(ConnFlags::CURR_WR_ENA);
        if want_wr && !have_wr {
            trace!("{layer}: want_send token={:?}", self.token);
            let _ = reactor.want_send(self.token);
            self.flags.insert(ConnFlags::CURR_WR_ENA);
        } else if !want_wr && have_wr {
            trace!("{layer}: stop_send token={:?}", self.token);
            let _ = reactor.stop_send(self.token);
            self.flags.remove(ConnFlags::CURR_WR_ENA);
        }
    }
}
