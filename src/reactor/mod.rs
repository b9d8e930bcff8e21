//! The reactor adapter: a level-triggered epoll wrapper plus the
//! `Poller` capability the connection core drives interest through.
//!
//! Epoll has no call to ask "is fd 7 currently readable" on demand — it
//! only tells you what changed since the last `wait`. The driver's poll
//! reconciler (`conn_update_sock_polling` in the design notes) wants to
//! reason about current readiness at arbitrary points in the handshake,
//! so `EpollReactor` caches the last readiness it observed per token
//! and the interest it last asked epoll to watch for, the same role
//! HAProxy's `fdtab[]` plays for its `fd_recv_ready`/`fd_send_ready`.

mod event;
mod ready;
mod token;

pub use event::Event;
pub use ready::Ready;
pub use token::Token;

use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::sys::epoll::{Epoll, Events};

/// The interest/readiness capability the connection driver needs from
/// whatever reactor backs it. Kept separate from `EpollReactor` so the
/// driver and connection modules never depend on epoll directly.
pub trait Poller {
    fn register(&mut self, fd: RawFd, token: Token) -> io::Result<()>;
    fn deregister(&mut self, fd: RawFd, token: Token) -> io::Result<()>;

    fn want_recv(&mut self, token: Token) -> io::Result<()>;
    fn stop_recv(&mut self, token: Token) -> io::Result<()>;
    fn want_send(&mut self, token: Token) -> io::Result<()>;
    fn stop_send(&mut self, token: Token) -> io::Result<()>;

    /// True once the last `wait` reported the fd as readable and that
    /// readiness has not since been consumed by `cant_recv`.
    fn recv_ready(&self, token: Token) -> bool;
    fn send_ready(&self, token: Token) -> bool;

    /// Clears cached recv-readiness after a read returns `WouldBlock`,
    /// mirroring `fd_cant_recv` clearing `FD_POLL_IN` early so a stale
    /// cache entry can't fool the next reconciler pass into retrying.
    fn cant_recv(&mut self, token: Token);
    fn cant_send(&mut self, token: Token);

    /// True if the last `wait` reported the peer half-closed its end.
    /// The driver's "refresh polling flags" step folds this into
    /// `SOCK_RD_SH`/`SOCK_WR_SH` before re-entering the handshake.
    fn is_hup(&self, token: Token) -> bool;
}

#[derive(Default, Clone, Copy)]
struct Interest {
    fd: RawFd,
    want_recv: bool,
    want_send: bool,
    recv_ready: bool,
    send_ready: bool,
    hup: bool,
}

pub struct EpollReactor {
    epoll: Epoll,
    events: Events,
    interests: HashMap<Token, Interest>,
}

impl EpollReactor {
    pub fn new(capacity: usize) -> io::Result<EpollReactor> {
        Ok(EpollReactor {
            epoll: Epoll::new()?,
            events: Events::with_capacity(capacity),
            interests: HashMap::new(),
        })
    }

    /// Blocks for at most `timeout` and folds whatever epoll reports
    /// into the cached readiness of the affected tokens, returning the
    /// tokens that changed so the driver knows which connections to
    /// re-enter.
    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Token>> {
        self.epoll.wait(&mut self.events, timeout)?;

        let mut woken = Vec::new();
        for idx in 0..self.events.len() {
            let Some(event) = self.events.get(idx) else {
                continue;
            };
            let token = event.token();
            if let Some(interest) = self.interests.get_mut(&token) {
                if event.kind().is_readable() || event.kind().is_error() || event.kind().is_hup() {
                    interest.recv_ready = true;
                }
                if event.kind().is_writable() || event.kind().is_error() || event.kind().is_hup() {
                    interest.send_ready = true;
                }
                if event.kind().is_hup() {
                    interest.hup = true;
                }
                woken.push(token);
            }
        }
        Ok(woken)
    }

    fn sync(&mut self, token: Token) -> io::Result<()> {
        let interest = *self
            .interests
            .get(&token)
            .expect("sync called on unregistered token");
        let mut ready = Ready::empty();
        if interest.want_recv {
            ready.insert(Ready::readable());
        }
        if interest.want_send {
            ready.insert(Ready::writable());
        }
        self.epoll.modify(interest.fd, token, ready)
    }
}

impl Poller for EpollReactor {
    fn register(&mut self, fd: RawFd, token: Token) -> io::Result<()> {
        self.interests.insert(
            token,
            Interest {
                fd,
                ..Interest::default()
            },
        );
        self.epoll.add(fd, token, Ready::empty())
    }

    fn deregister(&mut self, fd: RawFd, token: Token) -> io::Result<()> {
        self.interests.remove(&token);
        self.epoll.delete(fd)
    }

    fn want_recv(&mut self, token: Token) -> io::Result<()> {
        if let Some(i) = self.interests.get_mut(&token) {
            i.want_recv = true;
        }
        self.sync(token)
    }

    fn stop_recv(&mut self, token: Token) -> io::Result<()> {
        if let Some(i) = self.interests.get_mut(&token) {
            i.want_recv = false;
        }
        self.sync(token)
    }

    fn want_send(&mut self, token: Token) -> io::Result<()> {
        if let Some(i) = self.interests.get_mut(&token) {
            i.want_send = true;
        }
        self.sync(token)
    }

    fn stop_send(&mut self, token: Token) -> io::Result<()> {
        if let Some(i) = self.interests.get_mut(&token) {
            i.want_send = false;
        }
        self.sync(token)
    }

    fn recv_ready(&self, token: Token) -> bool {
        self.interests.get(&token).map_or(false, |i| i.recv_ready)
    }

    fn send_ready(&self, token: Token) -> bool {
        self.interests.get(&token).map_or(false, |i| i.send_ready)
    }

    fn cant_recv(&mut self, token: Token) {
        if let Some(i) = self.interests.get_mut(&token) {
            i.recv_ready = false;
        }
    }

    fn cant_send(&mut self, token: Token) {
        if let Some(i) = self.interests.get_mut(&token) {
            i.send_ready = false;
        }
    }

    fn is_hup(&self, token: Token) -> bool {
        self.interests.get(&token).map_or(false, |i| i.hup)
    }
}
