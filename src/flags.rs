//! The connection flag word: every bit of handshake, polling, and
//! lifecycle state lives here, mirroring the single `unsigned int
//! flags` HAProxy's `struct connection` carries. One word instead of
//! a dozen booleans keeps the poll reconciler's XOR-based edge
//! detection (see `connection::wake_edge`) a single integer compare.

use std::ops;

macro_rules! bits {
    ($($(#[$doc:meta])* $name:ident = $val:expr;)*) => {
        $(
            $(#[$doc])*
            pub const $name: ConnFlags = ConnFlags($val);
        )*
    };
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub struct ConnFlags(u32);

impl ConnFlags {
    bits! {
        /// Peer address resolved (from the PROXY header or the accept).
        ADDR_FROM_SET = 1 << 0;
        ADDR_TO_SET   = 1 << 1;

        /// Awaiting an inbound PROXY v1 header before data can flow.
        ACCEPT_PROXY = 1 << 2;
        /// Must emit a PROXY v1 header before data can flow.
        SEND_PROXY   = 1 << 3;
        /// Placeholder slot for a TLS handshake; never driven by this
        /// crate (no cipher/record-layer code), but part of the fixed
        /// dispatch order so a future transport can plug in here.
        SSL_WAIT_HS  = 1 << 4;

        SOCK_RD_SH = 1 << 5;
        SOCK_WR_SH = 1 << 6;

        DATA_RD_ENA = 1 << 7;
        DATA_WR_ENA = 1 << 8;

        SOCK_RD_ENA = 1 << 9;
        SOCK_WR_ENA = 1 << 10;

        CURR_RD_ENA = 1 << 11;
        CURR_WR_ENA = 1 << 12;

        WAIT_ROOM = 1 << 13;
        WAIT_DATA = 1 << 14;

        WAIT_L4_CONN = 1 << 15;
        WAIT_L6_CONN = 1 << 16;

        CONNECTED = 1 << 17;
        INIT_DATA = 1 << 18;
        WAKE_DATA = 1 << 19;
        ERROR     = 1 << 20;
        POLL_SOCK = 1 << 21;
    }

    pub const HANDSHAKE: ConnFlags = ConnFlags(Self::ACCEPT_PROXY.0 | Self::SEND_PROXY.0 | Self::SSL_WAIT_HS.0);
    pub const CONN_STATE: ConnFlags = ConnFlags(Self::WAIT_L4_CONN.0 | Self::WAIT_L6_CONN.0 | Self::CONNECTED.0);

    pub const fn empty() -> ConnFlags {
        ConnFlags(0)
    }

    pub fn is_empty(self) -> bool {
        self == ConnFlags::empty()
    }

    pub fn contains(self, other: ConnFlags) -> bool {
        (self & other) == other
    }

    pub fn intersects(self, other: ConnFlags) -> bool {
        !(self & other).is_empty()
    }

    pub fn insert(&mut self, other: ConnFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ConnFlags) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: ConnFlags, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl ops::BitOr for ConnFlags {
    type Output = ConnFlags;
    fn bitor(self, rhs: ConnFlags) -> ConnFlags {
        ConnFlags(self.0 | rhs.0)
    }
}

impl ops::BitAnd for ConnFlags {
    type Output = ConnFlags;
    fn bitand(self, rhs: ConnFlags) -> ConnFlags {
        ConnFlags(self.0 & rhs.0)
    }
}

impl ops::BitXor for ConnFlags {
    type Output = ConnFlags;
    fn bitxor(self, rhs: ConnFlags) -> ConnFlags {
        ConnFlags(self.0 ^ rhs.0)
    }
}

impl ops::Not for ConnFlags {
    type Output = ConnFlags;
    fn not(self) -> ConnFlags {
        ConnFlags(!self.0)
    }
}

impl ops::BitOrAssign for ConnFlags {
    fn bitor_assign(&mut self, rhs: ConnFlags) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_mask_covers_all_three_bits() {
        assert!(ConnFlags::HANDSHAKE.contains(ConnFlags::ACCEPT_PROXY));
        assert!(ConnFlags::HANDSHAKE.contains(ConnFlags::SEND_PROXY));
        assert!(ConnFlags::HANDSHAKE.contains(ConnFlags::SSL_WAIT_HS));
    }

    #[test]
    fn conn_state_mutually_exclusive_with_error_clear() {
        let mut flags = ConnFlags::WAIT_L4_CONN | ConnFlags::ERROR;
        let snapshot = flags & !ConnFlags::ERROR;
        assert!(snapshot.contains(ConnFlags::WAIT_L4_CONN));
        assert!(!snapshot.contains(ConnFlags::ERROR));

        flags.remove(ConnFlags::WAIT_L4_CONN);
        flags.insert(ConnFlags::CONNECTED);
        assert!((flags ^ snapshot).intersects(ConnFlags::CONN_STATE));
    }
}
