use crate::reactor::poller::platform::{
    sys_accept, sys_bind, sys_close, sys_connect, sys_get_socket_error, sys_listen, sys_recv,
    sys_send, sys_set_reuseaddr, sys_socket, sys_sockname,
};

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::{AsRawFd, RawFd};

/// An owned, non-blocking IPv4 stream socket.
///
/// The descriptor is closed exactly once, when the socket is dropped.
pub struct Socket {
    fd: RawFd,
}

impl Socket {
    /// Creates a new non-blocking socket.
    pub fn new() -> io::Result<Self> {
        Ok(Self { fd: sys_socket()? })
    }

    /// Creates a socket bound to `addr` and listening with `backlog`.
    pub fn listen(addr: &SocketAddrV4, backlog: i32) -> io::Result<Self> {
        let socket = Self::new()?;

        sys_set_reuseaddr(socket.fd)?;
        sys_bind(socket.fd, addr)?;
        sys_listen(socket.fd, backlog)?;

        Ok(socket)
    }

    /// Creates a socket and starts connecting it to `addr`.
    ///
    /// A connection still in progress is not an error: the socket becomes
    /// writable once it settles, and [`take_error`](Self::take_error) then
    /// reports whether it succeeded.
    pub fn connect(addr: &SocketAddrV4) -> io::Result<Self> {
        let socket = Self::new()?;
        sys_connect(socket.fd, addr)?;

        Ok(socket)
    }

    /// Accepts one pending connection.
    pub fn accept(&self) -> io::Result<(Socket, SocketAddrV4)> {
        let (fd, peer) = sys_accept(self.fd)?;

        Ok((Socket { fd }, peer))
    }

    pub fn send(&self, buffer: &[u8]) -> io::Result<usize> {
        sys_send(self.fd, buffer)
    }

    pub fn recv(&self, buffer: &mut [u8]) -> io::Result<usize> {
        sys_recv(self.fd, buffer)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddrV4> {
        sys_sockname(self.fd)
    }

    /// Takes the socket's pending error, e.g. the outcome of a connect.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        sys_get_socket_error(self.fd)
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket").field("fd", &self.fd).finish()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        tracing::trace!(fd = self.fd, "socket closed");
        sys_close(self.fd);
    }
}

/// Resolves a host name to an IPv4 socket address.
///
/// Only dotted IPv4 literals and `localhost` are understood; the runtime
/// never performs blocking name resolution.
pub fn resolve(host: &str, port: u16) -> io::Result<SocketAddrV4> {
    let ip = if host.eq_ignore_ascii_case("localhost") {
        Ipv4Addr::LOCALHOST
    } else {
        host.parse::<Ipv4Addr>().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot resolve `{host}`: only IPv4 literals and localhost are supported"),
            )
        })?
    };

    Ok(SocketAddrV4::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_accepts_literals_and_localhost() {
        assert_eq!(
            resolve("localhost", 80).unwrap(),
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 80)
        );
        assert_eq!(
            resolve("192.168.0.10", 8080).unwrap(),
            SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 10), 8080)
        );
    }

    #[test]
    fn test_resolve_rejects_names() {
        let err = resolve("example.com", 80).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_listen_binds_ephemeral_port() {
        let socket = Socket::listen(&SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), 8).unwrap();

        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }
}
