use libc::{
    AF_INET, EINPROGRESS, F_GETFL, F_SETFL, MSG_NOSIGNAL, O_NONBLOCK, SO_ERROR, SO_REUSEADDR,
    SOCK_CLOEXEC, SOCK_STREAM, SOL_SOCKET, accept, bind, c_int, close, connect, fcntl,
    getsockname, getsockopt, listen, recv, send, setsockopt, sockaddr, sockaddr_in, socket,
    socklen_t,
};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::RawFd;
use std::{io, mem};

fn cvt(rc: c_int) -> io::Result<c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

fn cvt_size(n: isize) -> io::Result<usize> {
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Sets a file descriptor to non-blocking mode.
pub(crate) fn sys_set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = cvt(unsafe { fcntl(fd, F_GETFL) })?;
    cvt(unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) })?;

    Ok(())
}

/// Creates a non-blocking IPv4 stream socket.
pub(crate) fn sys_socket() -> io::Result<RawFd> {
    let fd = cvt(unsafe { socket(AF_INET, SOCK_STREAM | SOCK_CLOEXEC, 0) })?;

    if let Err(e) = sys_set_nonblocking(fd) {
        sys_close(fd);
        return Err(e);
    }

    Ok(fd)
}

/// Closes a file descriptor.
pub(crate) fn sys_close(fd: RawFd) {
    unsafe { close(fd) };
}

/// Binds a socket to an address.
pub(crate) fn sys_bind(fd: RawFd, addr: &SocketAddrV4) -> io::Result<()> {
    let (raw, len) = to_raw(addr);

    cvt(unsafe { bind(fd, &raw as *const sockaddr_in as *const sockaddr, len) })?;

    Ok(())
}

/// Marks a socket as a listening socket.
pub(crate) fn sys_listen(fd: RawFd, backlog: c_int) -> io::Result<()> {
    cvt(unsafe { listen(fd, backlog) })?;

    Ok(())
}

/// Accepts a pending connection.
///
/// The returned socket is already non-blocking.
pub(crate) fn sys_accept(fd: RawFd) -> io::Result<(RawFd, SocketAddrV4)> {
    let mut raw: sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_in>() as socklen_t;

    let client = cvt(unsafe {
        accept(fd, &mut raw as *mut sockaddr_in as *mut sockaddr, &mut len)
    })?;

    if let Err(e) = sys_set_nonblocking(client) {
        sys_close(client);
        return Err(e);
    }

    Ok((client, from_raw(&raw)))
}

/// Starts connecting a non-blocking socket.
///
/// Returns `Ok(false)` while the connection is still in progress; the
/// socket becomes writable once it settles.
pub(crate) fn sys_connect(fd: RawFd, addr: &SocketAddrV4) -> io::Result<bool> {
    let (raw, len) = to_raw(addr);

    let rc = unsafe { connect(fd, &raw as *const sockaddr_in as *const sockaddr, len) };
    if rc == 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(EINPROGRESS) {
        Ok(false)
    } else {
        Err(err)
    }
}

/// Sends bytes without raising `SIGPIPE` on a closed peer.
pub(crate) fn sys_send(fd: RawFd, buffer: &[u8]) -> io::Result<usize> {
    cvt_size(unsafe { send(fd, buffer.as_ptr() as *const _, buffer.len(), MSG_NOSIGNAL) })
}

/// Receives at most `buffer.len()` bytes.
pub(crate) fn sys_recv(fd: RawFd, buffer: &mut [u8]) -> io::Result<usize> {
    cvt_size(unsafe { recv(fd, buffer.as_mut_ptr() as *mut _, buffer.len(), 0) })
}

/// Returns the local address of a socket.
pub(crate) fn sys_sockname(fd: RawFd) -> io::Result<SocketAddrV4> {
    let mut raw: sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_in>() as socklen_t;

    cvt(unsafe { getsockname(fd, &mut raw as *mut sockaddr_in as *mut sockaddr, &mut len) })?;

    Ok(from_raw(&raw))
}

/// Takes the pending error of a socket (`SO_ERROR`), if any.
pub(crate) fn sys_get_socket_error(fd: RawFd) -> io::Result<Option<io::Error>> {
    let mut value: c_int = 0;
    let mut len = mem::size_of::<c_int>() as socklen_t;

    cvt(unsafe {
        getsockopt(
            fd,
            SOL_SOCKET,
            SO_ERROR,
            &mut value as *mut c_int as *mut _,
            &mut len,
        )
    })?;

    if value == 0 {
        Ok(None)
    } else {
        Ok(Some(io::Error::from_raw_os_error(value)))
    }
}

/// Enables `SO_REUSEADDR` on a socket.
pub(crate) fn sys_set_reuseaddr(fd: RawFd) -> io::Result<()> {
    let yes: c_int = 1;

    cvt(unsafe {
        setsockopt(
            fd,
            SOL_SOCKET,
            SO_REUSEADDR,
            &yes as *const c_int as *const _,
            mem::size_of::<c_int>() as socklen_t,
        )
    })?;

    Ok(())
}

fn to_raw(addr: &SocketAddrV4) -> (sockaddr_in, socklen_t) {
    let mut raw: sockaddr_in = unsafe { mem::zeroed() };

    raw.sin_family = AF_INET as _;
    raw.sin_port = addr.port().to_be();
    raw.sin_addr.s_addr = u32::from(*addr.ip()).to_be();

    (raw, mem::size_of::<sockaddr_in>() as socklen_t)
}

fn from_raw(raw: &sockaddr_in) -> SocketAddrV4 {
    let ip = Ipv4Addr::from(u32::from_be(raw.sin_addr.s_addr));
    let port = u16::from_be(raw.sin_port);

    SocketAddrV4::new(ip, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_address_conversion_preserves_ip_and_port() {
        let addr = SocketAddrV4::new(Ipv4Addr::new(10, 1, 2, 3), 8080);
        let (raw, len) = to_raw(&addr);

        assert_eq!(len as usize, mem::size_of::<sockaddr_in>());
        assert_eq!(from_raw(&raw), addr);
    }

    #[test]
    fn test_bound_socket_reports_ephemeral_port() {
        let fd = sys_socket().unwrap();
        sys_bind(fd, &SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();

        let local = sys_sockname(fd).unwrap();
        sys_close(fd);

        assert_eq!(*local.ip(), Ipv4Addr::LOCALHOST);
        assert_ne!(local.port(), 0);
    }
}
