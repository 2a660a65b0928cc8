use super::socket::{Socket, resolve};
use crate::error::TaskError;
use crate::http::{Request, Router, dispatch};
use crate::log::{LogSink, ServedRecord};
use crate::reactor::{Interest, Reactor};
use crate::runtime::task::Unit;
use crate::time::sleep;

use chrono::Utc;

use std::cell::RefCell;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

impl Reactor {
    /// Binds a listening socket on `host:port` and serves every connection
    /// through `router`.
    ///
    /// Returns the bound address, so port `0` can be used to pick an
    /// ephemeral port. The listener stays registered until the reactor
    /// shuts down.
    pub fn start_server(&self, host: &str, port: u16, router: Router) -> io::Result<SocketAddr> {
        let addr = resolve(host, port)?;
        let listener = Socket::listen(&addr, self.config().backlog)?;
        let local = listener.local_addr()?;

        let fd = listener.as_raw_fd();
        let router = Rc::new(router);

        self.register(
            fd,
            Interest::Readable,
            Rc::new(move |reactor: &Reactor, _fd: RawFd| on_accept(reactor, &listener, &router)),
        )?;

        tracing::info!(addr = %local, "listening");

        Ok(local.into())
    }
}

fn on_accept(reactor: &Reactor, listener: &Socket, router: &Rc<Router>) {
    let (conn, peer) = match listener.accept() {
        Ok(accepted) => accepted,
        Err(err) => {
            tracing::debug!(error = %err, "accept failed");
            return;
        }
    };

    let fd = conn.as_raw_fd();
    let slot = RefCell::new(Some(conn));
    let router = router.clone();

    tracing::debug!(fd, %peer, "connection accepted");

    let registered = reactor.register(
        fd,
        Interest::Readable,
        Rc::new(move |reactor: &Reactor, fd: RawFd| on_message(reactor, fd, &slot, peer, &router)),
    );

    if let Err(err) = registered {
        tracing::debug!(fd, error = %err, "failed to register connection");
    }
}

fn on_message(
    reactor: &Reactor,
    fd: RawFd,
    slot: &RefCell<Option<Socket>>,
    peer: SocketAddrV4,
    router: &Rc<Router>,
) {
    reactor.unregister(fd);

    let Some(conn) = slot.borrow_mut().take() else {
        return;
    };

    let mut buffer = vec![0; reactor.config().read_buffer_size];

    match conn.recv(&mut buffer) {
        Ok(0) => {
            tracing::debug!(fd, %peer, "connection closed by peer");
        }
        Ok(n) => {
            buffer.truncate(n);

            let sink = reactor.sink();
            let router = router.clone();

            reactor
                .scheduler()
                .register(Unit::new(serve(conn, buffer, peer.into(), router, sink)));
        }
        Err(err) => {
            tracing::debug!(fd, %peer, error = %err, "receive failed");
        }
    }
}

/// Answers one request. The connection is closed when this returns,
/// whatever the outcome.
async fn serve(
    conn: Socket,
    data: Vec<u8>,
    peer: SocketAddr,
    router: Rc<Router>,
    sink: Rc<dyn LogSink>,
) -> Result<(), TaskError> {
    let started = Instant::now();

    let request = Request::parse(&data, peer)?;
    let handler = router.lookup(&request.path);

    let mut response = dispatch(handler.as_ref(), &request).await?;
    response.stamp(Utc::now());

    write_all(&conn, &response.to_bytes()).await?;

    sink.request_served(&ServedRecord {
        method: request.method,
        path: request.path,
        status: response.status(),
        peer,
        elapsed: started.elapsed(),
    });

    Ok(())
}

async fn write_all(conn: &Socket, mut bytes: &[u8]) -> Result<(), TaskError> {
    while !bytes.is_empty() {
        match conn.send(bytes) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(n) => bytes = &bytes[n..],
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => sleep(Duration::ZERO).await,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}
