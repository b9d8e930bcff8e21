//! The connection pool: a `slab::Slab`-backed free list handing out
//! `ConnId`s, mirroring how the reactor keys registrations by an
//! opaque `Token` — in fact a `ConnId` and the `Token` registered for
//! its fd are numerically the same value, so a readiness event resolves
//! to its connection with one slab lookup and no side table.

use crate::connection::Connection;
use crate::reactor::Token;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnId(usize);

impl From<ConnId> for Token {
    fn from(id: ConnId) -> Token {
        Token(id.0)
    }
}

impl From<Token> for ConnId {
    fn from(token: Token) -> ConnId {
        ConnId(token.0)
    }
}

#[derive(Default)]
pub struct Pool {
    slab: slab::Slab<Connection>,
}

impl Pool {
    pub fn new() -> Pool {
        Pool {
            slab: slab::Slab::new(),
        }
    }

    pub fn insert(&mut self, conn: Connection) -> ConnId {
        ConnId(self.slab.insert(conn))
    }

    pub fn get(&self, id: ConnId) -> Option<&Connection> {
        self.slab.get(id.0)
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut Connection> {
        self.slab.get_mut(id.0)
    }

    /// Removes and returns a connection so the caller can finish
    /// teardown (unregistering the fd) before the slot is recycled.
    pub fn remove(&mut self, id: ConnId) -> Connection {
        self.slab.remove(id.0)
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }
}
