//! PROXY protocol v1 header parsing and emission.
//!
//! The parser peeks the socket (never consumes) so a header split
//! across TCP segments can still poll for more data; once a header is
//! confirmed present, a destructive read re-consumes exactly the bytes
//! that made up the header — if the kernel hands back fewer bytes that
//! second time, the segment split mid-header and the connection is
//! aborted. This mirrors `conn_recv_proxy` line for line, including
//! its TCP4/TCP6 dispatch, but with a plain equality check where the
//! original's `!memcmp(...) != 0` condition happens to also be true
//! whenever the bytes DON'T match (a precedence bug masked there by
//! TCP4/TCP6 being the only two branches tried in order).

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::error::ErrCode;

const SIGNATURE: &[u8] = b"PROXY ";
const SHORTEST_LINE: usize = 18;

#[derive(Debug)]
pub struct ProxyHeader {
    pub from: SocketAddr,
    pub to: SocketAddr,
    /// Bytes making up the header line, including the trailing `\r\n`.
    /// The caller must destructively re-read exactly this many bytes —
    /// any remainder in `buf` belongs to whatever the data layer reads
    /// next, not to this header.
    pub len: usize,
}

/// Parses a peeked buffer as a PROXY v1 header. `buf` is whatever a
/// single `MSG_PEEK` returned; an empty buffer and a too-short buffer
/// are both reported distinctly so the caller can tell a clean
/// shutdown (`Empty`) from a header still arriving (`Truncated`).
pub fn parse(buf: &[u8]) -> Result<ProxyHeader, ErrCode> {
    if buf.is_empty() {
        return Err(ErrCode::Empty);
    }
    if buf.len() < 6 {
        return Err(ErrCode::Truncated);
    }
    if &buf[..6] != SIGNATURE {
        return Err(ErrCode::NotHeader);
    }
    if buf.len() < SHORTEST_LINE {
        return Err(ErrCode::Truncated);
    }

    let rest = &buf[6..];
    if rest.len() >= 5 && &rest[..5] == b"TCP4 " {
        parse_tcp4(&rest[5..]).map(|(from, to, body_len)| ProxyHeader {
            from,
            to,
            len: 6 + 5 + body_len,
        })
    } else if rest.len() >= 5 && &rest[..5] == b"TCP6 " {
        parse_tcp6(&rest[5..]).map(|(from, to, body_len)| ProxyHeader {
            from,
            to,
            len: 6 + 5 + body_len,
        })
    } else {
        Err(ErrCode::BadProto)
    }
}

/// Parses `"src dst sport dport\r\n"`, returning the two addresses and
/// the number of bytes consumed (through and including the `\r\n`).
fn parse_tcp4(body: &[u8]) -> Result<(SocketAddr, SocketAddr, usize), ErrCode> {
    let crlf_at = body
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(ErrCode::Truncated)?;
    let line = &body[..crlf_at];

    let mut fields = line.splitn(4, |&b| b == b' ');
    let src = fields.next().ok_or(ErrCode::BadHeader)?;
    let dst = fields.next().ok_or(ErrCode::BadHeader)?;
    let sport_bytes = fields.next().ok_or(ErrCode::BadHeader)?;
    let dport_bytes = fields.next().ok_or(ErrCode::BadHeader)?;
    if fields.next().is_some() {
        return Err(ErrCode::BadHeader);
    }

    let src_addr: Ipv4Addr = parse_ascii(src).ok_or(ErrCode::BadHeader)?;
    let dst_addr: Ipv4Addr = parse_ascii(dst).ok_or(ErrCode::BadHeader)?;
    let sport: u16 = parse_ascii(sport_bytes).ok_or(ErrCode::BadHeader)?;
    let dport: u16 = parse_ascii(dport_bytes).ok_or(ErrCode::BadHeader)?;

    Ok((
        SocketAddr::V4(SocketAddrV4::new(src_addr, sport)),
        SocketAddr::V4(SocketAddrV4::new(dst_addr, dport)),
        crlf_at + 2,
    ))
}

fn parse_tcp6(body: &[u8]) -> Result<(SocketAddr, SocketAddr, usize), ErrCode> {
    let crlf_at = body
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(ErrCode::Truncated)?;
    let line = &body[..crlf_at];

    let mut fields = line.splitn(4, |&b| b == b' ');
    let src = fields.next().ok_or(ErrCode::BadHeader)?;
    let dst = fields.next().ok_or(ErrCode::BadHeader)?;
    let sport_bytes = fields.next().ok_or(ErrCode::BadHeader)?;
    let dport_bytes = fields.next().ok_or(ErrCode::BadHeader)?;
    if fields.next().is_some() {
        return Err(ErrCode::BadHeader);
    }

    let src_addr: Ipv6Addr = parse_ascii(src).ok_or(ErrCode::BadHeader)?;
    let dst_addr: Ipv6Addr = parse_ascii(dst).ok_or(ErrCode::BadHeader)?;
    let sport: u16 = parse_ascii(sport_bytes).ok_or(ErrCode::BadHeader)?;
    let dport: u16 = parse_ascii(dport_bytes).ok_or(ErrCode::BadHeader)?;

    Ok((
        SocketAddr::V6(SocketAddrV6::new(src_addr, sport, 0, 0)),
        SocketAddr::V6(SocketAddrV6::new(dst_addr, dport, 0, 0)),
        crlf_at + 2,
    ))
}

fn parse_ascii<T: std::str::FromStr>(buf: &[u8]) -> Option<T> {
    std::str::from_utf8(buf).ok()?.parse().ok()
}

/// Emits a PROXY v1 line for a pair of addresses of matching family,
/// or `"PROXY UNKNOWN\r\n"` if the families differ or either is absent.
pub fn make_proxy_line(src: Option<SocketAddr>, dst: Option<SocketAddr>) -> String {
    match (src, dst) {
        (Some(SocketAddr::V4(s)), Some(SocketAddr::V4(d))) => {
            format!(
                "PROXY TCP4 {} {} {} {}\r\n",
                s.ip(),
                d.ip(),
                s.port(),
                d.port()
            )
        }
        (Some(SocketAddr::V6(s)), Some(SocketAddr::V6(d))) => {
            format!(
                "PROXY TCP6 {} {} {} {}\r\n",
                s.ip(),
                d.ip(),
                s.port(),
                d.port()
            )
        }
        _ => "PROXY UNKNOWN\r\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp4_header() {
        let buf = b"PROXY TCP4 192.168.0.1 192.168.0.11 56324 443\r\n";
        let hdr = parse(buf).unwrap();
        assert_eq!(hdr.len, buf.len());
        assert_eq!(hdr.from, "192.168.0.1:56324".parse().unwrap());
        assert_eq!(hdr.to, "192.168.0.11:443".parse().unwrap());
    }

    #[test]
    fn header_len_excludes_trailing_bytes() {
        let mut buf = b"PROXY TCP4 1.1.1.1 2.2.2.2 1 2\r\n".to_vec();
        let header_len = buf.len();
        buf.extend_from_slice(b"GET / HTTP/1.1\r\n");
        let hdr = parse(&buf).unwrap();
        assert_eq!(hdr.len, header_len);
    }

    #[test]
    fn parses_tcp6_header() {
        let buf = b"PROXY TCP6 ::1 ::2 111 222\r\n";
        let hdr = parse(buf).unwrap();
        assert_eq!(hdr.from, "[::1]:111".parse().unwrap());
        assert_eq!(hdr.to, "[::2]:222".parse().unwrap());
        assert_eq!(hdr.len, buf.len());
    }

    #[test]
    fn empty_peek_is_empty_not_truncated() {
        assert_eq!(parse(b"").unwrap_err(), ErrCode::Empty);
    }

    #[test]
    fn short_peek_is_truncated() {
        assert_eq!(parse(b"PROXY ").unwrap_err(), ErrCode::Truncated);
    }

    #[test]
    fn peek_shorter_than_the_signature_is_truncated() {
        assert_eq!(parse(b"PROX").unwrap_err(), ErrCode::Truncated);
    }

    #[test]
    fn peek_one_byte_short_of_the_shortest_line_is_truncated() {
        let buf = b"PROXY TCP4 1.1.1.1 2.2.2.2 1 2";
        assert_eq!(buf.len(), 30);
        assert_eq!(parse(&buf[..17]).unwrap_err(), ErrCode::Truncated);
    }

    #[test]
    fn trailing_garbage_before_crlf_is_bad_header() {
        assert_eq!(
            parse(b"PROXY TCP4 1.1.1.1 2.2.2.2 1 2 extra\r\n").unwrap_err(),
            ErrCode::BadHeader
        );
    }

    #[test]
    fn double_space_between_fields_is_bad_header() {
        assert_eq!(
            parse(b"PROXY TCP4 1.1.1.1  2.2.2.2 1 2\r\n").unwrap_err(),
            ErrCode::BadHeader
        );
    }

    #[test]
    fn tcp5_tag_is_bad_proto() {
        assert_eq!(
            parse(b"PROXY TCP5 1.1.1.1 2.2.2.2 1 2\r\n").unwrap_err(),
            ErrCode::BadProto
        );
    }

    #[test]
    fn wrong_signature_is_not_header() {
        assert_eq!(parse(b"GET / HTTP/1.1 xx\r\n").unwrap_err(), ErrCode::NotHeader);
    }

    #[test]
    fn unknown_protocol_tag_is_bad_proto() {
        assert_eq!(
            parse(b"PROXY UDP4 1.1.1.1 2.2.2.2 1 2\r\n").unwrap_err(),
            ErrCode::BadProto
        );
    }

    #[test]
    fn emits_unknown_for_mismatched_families() {
        let v4: SocketAddr = "1.2.3.4:1".parse().unwrap();
        let v6: SocketAddr = "[::1]:2".parse().unwrap();
        assert_eq!(make_proxy_line(Some(v4), Some(v6)), "PROXY UNKNOWN\r\n");
        assert_eq!(make_proxy_line(None, Some(v4)), "PROXY UNKNOWN\r\n");
        assert_eq!(make_proxy_line(None, None), "PROXY UNKNOWN\r\n");
    }

    #[test]
    fn emits_tcp4_line() {
        let src: SocketAddr = "192.168.0.1:56324".parse().unwrap();
        let dst: SocketAddr = "192.168.0.11:443".parse().unwrap();
        assert_eq!(
            make_proxy_line(Some(src), Some(dst)),
            "PROXY TCP4 192.168.0.1 192.168.0.11 56324 443\r\n"
        );
    }
}
