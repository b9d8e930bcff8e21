//! Connection core for an L4/L7 proxy.
//!
//! Drives a single connection's fd through a fixed handshake pipeline
//! (PROXY protocol v1 today, with slots reserved for TLS), reconciles
//! socket polling against both a handshake layer and a pluggable data
//! layer, and exposes a concrete `epoll(7)` reactor plus a slab-backed
//! connection pool so the crate is runnable out of the box and not
//! just a set of interfaces.
//!
//! ```no_run
//! use connkit_core::flags::ConnFlags;
//! use connkit_core::pool::Pool;
//! use connkit_core::reactor::{EpollReactor, Poller, Token};
//! use connkit_core::connection::Connection;
//! use connkit_core::driver;
//!
//! let mut pool = Pool::new();
//! let mut reactor = EpollReactor::new(128).unwrap();
//!
//! // `fd` comes from an acceptor; the listener decides the initial
//! // handshake bits (here: expect an inbound PROXY v1 header).
//! # let fd = -1;
//! let id = pool.insert(Connection::new(fd, Token(0), ConnFlags::ACCEPT_PROXY));
//! let token: Token = id.into();
//! reactor.register(fd, token).ok();
//!
//! loop {
//!     for token in reactor.poll(None).unwrap() {
//!         driver::drive(&mut pool, &mut reactor, token);
//!     }
//! #   break;
//! }
//! ```

#[macro_use]
extern crate log;

pub mod connect_probe;
pub mod connection;
pub mod data;
pub mod driver;
pub mod error;
pub mod flags;
pub mod handshake;
pub mod pool;
pub mod proxy_v1;
pub mod reactor;
mod sys;
pub mod xprt;

pub use connection::Connection;
pub use error::{DriverOutcome, ErrCode, ProxyError};
pub use flags::ConnFlags;
pub use pool::{ConnId, Pool};
pub use reactor::{EpollReactor, Poller, Token};
