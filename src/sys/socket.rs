use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

use libc::{c_int, c_void, MSG_PEEK};

use super::fd::FileDesc;
use super::syscall;

/// A non-owning view over the raw socket operations the connection core
/// needs: peek, destructive read/write, shutdown, and the handful of
/// socket options the handshake and connect-probe steps touch.
///
/// Unlike the teacher's `Socket`, this type never creates or accepts
/// connections itself — the fd always arrives from outside the core
/// (the acceptor), so there is no `new`/`new_raw`/`accept` here.
#[derive(Debug)]
pub struct Socket(FileDesc);

impl Socket {
    pub unsafe fn from_raw(fd: RawFd) -> Socket {
        Socket(FileDesc::new(fd))
    }

    fn recv_with_flags(&self, buf: &mut [u8], flags: c_int) -> io::Result<usize> {
        loop {
            let ret = syscall!(recv(
                self.0.raw(),
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                flags
            ));
            match ret {
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
                Ok(n) => return Ok(n as usize),
            }
        }
    }

    /// Non-destructive read: bytes stay in the kernel's receive buffer.
    pub fn peek(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv_with_flags(buf, MSG_PEEK)
    }

    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv_with_flags(buf, 0)
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let ret = syscall!(send(
                self.0.raw(),
                buf.as_ptr() as *const c_void,
                buf.len(),
                libc::MSG_NOSIGNAL
            ));
            match ret {
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
                Ok(n) => return Ok(n as usize),
            }
        }
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        let how = match how {
            Shutdown::Write => libc::SHUT_WR,
            Shutdown::Read => libc::SHUT_RD,
            Shutdown::Both => libc::SHUT_RDWR,
        };
        syscall!(shutdown(self.0.raw(), how))?;
        Ok(())
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let mut nonblocking = nonblocking as c_int;
        syscall!(ioctl(self.0.raw(), libc::FIONBIO, &mut nonblocking)).map(|_| ())
    }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Socket::read(self, buf)
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Socket::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl FromRawFd for Socket {
    unsafe fn from_raw_fd(fd: RawFd) -> Socket {
        Socket::from_raw(fd)
    }
}

impl IntoRawFd for Socket {
    fn into_raw_fd(self) -> RawFd {
        self.0.into_raw_fd()
    }
}

/// Non-owning, non-closing raw-fd operations for callers that only
/// hold a borrowed descriptor (the connection core never owns `fd`
/// directly — the pool does). Building a `Socket` would wrap it in a
/// closing-on-drop `FileDesc`, which is wrong for a borrow.
fn recv_raw_with_flags(fd: RawFd, buf: &mut [u8], flags: c_int) -> io::Result<usize> {
    loop {
        let ret = syscall!(recv(fd, buf.as_mut_ptr() as *mut c_void, buf.len(), flags));
        match ret {
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
            Ok(n) => return Ok(n as usize),
        }
    }
}

pub fn peek_raw(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    recv_raw_with_flags(fd, buf, MSG_PEEK)
}

pub fn read_raw(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    recv_raw_with_flags(fd, buf, 0)
}

pub fn probe_writable_raw(fd: RawFd) -> io::Result<()> {
    syscall!(send(fd, std::ptr::null(), 0, libc::MSG_NOSIGNAL)).map(|_| ())
}

/// `getsockopt(SO_ERROR)` on a borrowed fd: recovers the real errno a
/// hard connect-probe failure left behind, instead of whatever generic
/// error the zero-length `send` itself happened to report.
pub fn take_error_raw(fd: RawFd) -> io::Result<Option<io::Error>> {
    let mut raw: c_int = 0;
    let mut len = std::mem::size_of::<c_int>() as libc::socklen_t;
    syscall!(getsockopt(
        fd,
        libc::SOL_SOCKET,
        libc::SO_ERROR,
        &mut raw as *mut _ as *mut c_void,
        &mut len
    ))?;
    if raw == 0 {
        Ok(None)
    } else {
        Ok(Some(io::Error::from_raw_os_error(raw)))
    }
}
