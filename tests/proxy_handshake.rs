//! End-to-end coverage of the handshake dispatcher against real sockets
//! (a `UnixStream` pair stands in for the accepted TCP connection; the
//! peek/read/write syscalls behave the same over either fd type).

use std::io::{Read, Write};
use std::os::unix::io::IntoRawFd;
use std::os::unix::net::UnixStream;

use connkit_core::connection::Connection;
use connkit_core::flags::ConnFlags;
use connkit_core::handshake;
use connkit_core::reactor::{EpollReactor, Token};
use connkit_core::xprt::{RawTransport, Transport};

#[test]
fn happy_tcp4_accept_proxy_resolves_addresses() {
    let _ = env_logger::try_init();
    let (a, mut b) = UnixStream::pair().unwrap();
    let fd = a.into_raw_fd();
    b.write_all(b"PROXY TCP4 192.168.0.1 192.168.0.11 56324 443\r\n").unwrap();

    let mut reactor = EpollReactor::new(4).unwrap();
    let mut conn = Connection::new(fd, Token(0), ConnFlags::ACCEPT_PROXY);
    conn.xprt = Some(Box::new(unsafe { RawTransport::from_raw_fd(fd) }));

    handshake::drive(&mut conn, &mut reactor);

    assert!(!conn.flags.contains(ConnFlags::ACCEPT_PROXY));
    assert!(!conn.flags.contains(ConnFlags::ERROR));
    assert_eq!(conn.addr_from, Some("192.168.0.1:56324".parse().unwrap()));
    assert_eq!(conn.addr_to, Some("192.168.0.11:443".parse().unwrap()));
}

#[test]
fn happy_tcp6_accept_proxy_resolves_addresses() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let fd = a.into_raw_fd();
    b.write_all(b"PROXY TCP6 ::1 ::2 111 222\r\n").unwrap();

    let mut reactor = EpollReactor::new(4).unwrap();
    let mut conn = Connection::new(fd, Token(0), ConnFlags::ACCEPT_PROXY);
    conn.xprt = Some(Box::new(unsafe { RawTransport::from_raw_fd(fd) }));

    handshake::drive(&mut conn, &mut reactor);

    assert!(!conn.flags.contains(ConnFlags::ACCEPT_PROXY));
    assert_eq!(conn.addr_from, Some("[::1]:111".parse().unwrap()));
    assert_eq!(conn.addr_to, Some("[::2]:222".parse().unwrap()));
}

#[test]
fn header_leaves_trailing_payload_for_the_data_layer() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let fd = a.into_raw_fd();
    b.write_all(b"PROXY TCP4 1.1.1.1 2.2.2.2 1 2\r\nhello").unwrap();

    let mut reactor = EpollReactor::new(4).unwrap();
    let mut conn = Connection::new(fd, Token(0), ConnFlags::ACCEPT_PROXY);
    conn.xprt = Some(Box::new(unsafe { RawTransport::from_raw_fd(fd) }));
    handshake::drive(&mut conn, &mut reactor);
    assert!(!conn.flags.contains(ConnFlags::ERROR));

    // The destructive re-read must have consumed exactly the header;
    // "hello" is still sitting in the socket for whatever reads next.
    // Reuse the connection's own transport rather than wrapping `fd` a
    // second time — two owning wrappers over one fd would each try to
    // close it on drop.
    let xprt = conn.xprt.as_deref_mut().unwrap();
    let mut rest = [0u8; 16];
    let n = xprt.recv(&mut rest).unwrap();
    assert_eq!(&rest[..n], b"hello");
}

#[test]
fn truncated_peek_aborts_and_stops_both_sock_directions() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let fd = a.into_raw_fd();
    // Matches the "PROXY " signature but is far short of the shortest
    // valid TCP4/TCP6 line.
    b.write_all(b"PROXY TCP4 1.1").unwrap();

    let mut reactor = EpollReactor::new(4).unwrap();
    reactor.register(fd, Token(0)).unwrap();

    let mut conn = Connection::new(fd, Token(0), ConnFlags::ACCEPT_PROXY);
    conn.xprt = Some(Box::new(unsafe { RawTransport::from_raw_fd(fd) }));
    conn.flags.insert(ConnFlags::SOCK_RD_ENA | ConnFlags::SOCK_WR_ENA);
    conn.update_sock_polling(&mut reactor);
    assert!(conn.flags.contains(ConnFlags::CURR_RD_ENA));
    assert!(conn.flags.contains(ConnFlags::CURR_WR_ENA));

    handshake::drive(&mut conn, &mut reactor);

    assert!(conn.flags.contains(ConnFlags::ERROR));
    assert_eq!(conn.err_code, Some(connkit_core::ErrCode::Truncated));
    assert!(!conn.flags.contains(ConnFlags::CURR_RD_ENA));
    assert!(!conn.flags.contains(ConnFlags::CURR_WR_ENA));
}

#[test]
fn non_proxy_stream_is_rejected_as_not_header() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let fd = a.into_raw_fd();
    b.write_all(b"GET / HTTP/1.1\r\n").unwrap();

    let mut reactor = EpollReactor::new(4).unwrap();
    let mut conn = Connection::new(fd, Token(0), ConnFlags::ACCEPT_PROXY);
    conn.xprt = Some(Box::new(unsafe { RawTransport::from_raw_fd(fd) }));

    handshake::drive(&mut conn, &mut reactor);

    assert!(conn.flags.contains(ConnFlags::ERROR));
    assert_eq!(conn.err_code, Some(connkit_core::ErrCode::NotHeader));
}

#[test]
fn send_proxy_emits_a_tcp4_line_on_the_wire() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let fd = a.into_raw_fd();

    let mut reactor = EpollReactor::new(4).unwrap();
    let mut conn = Connection::new(fd, Token(0), ConnFlags::SEND_PROXY);
    conn.addr_from = Some("192.168.0.1:56324".parse().unwrap());
    conn.addr_to = Some("192.168.0.11:443".parse().unwrap());
    conn.xprt = Some(Box::new(unsafe { RawTransport::from_raw_fd(fd) }));

    handshake::drive(&mut conn, &mut reactor);
    assert!(!conn.flags.contains(ConnFlags::SEND_PROXY));

    let mut out = [0u8; 64];
    let n = b.read(&mut out).unwrap();
    assert_eq!(&out[..n], b"PROXY TCP4 192.168.0.1 192.168.0.11 56324 443\r\n");
}
