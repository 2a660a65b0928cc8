use super::socket::{Socket, resolve};
use crate::error::TaskError;
use crate::log::OutboundRecord;
use crate::reactor::{Interest, Reactor};
use crate::runtime::bridge::Bridge;
use crate::runtime::task::Unit;

use std::cell::{Cell, RefCell};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Instant;

/// State shared by the callbacks of one outbound request.
struct Outbound {
    socket: RefCell<Option<Socket>>,
    message: Vec<u8>,
    sent: Cell<usize>,
    bridge: Bridge<Vec<u8>>,
}

impl Reactor {
    /// Sends `method path` to `host:port` and returns the first chunk of the
    /// response (a single receive of at most the configured read size).
    ///
    /// Only IPv4 literals and `localhost` are accepted as `host`. Transport
    /// failures surface as the unit's error; one log line is emitted when
    /// the request reaches a terminal state, successful or not.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let body = reactor.request("127.0.0.1", 8080, "/", "get").await?;
    /// ```
    pub fn request(&self, host: &str, port: u16, path: &str, method: &str) -> Unit<Vec<u8>> {
        let reactor = self.clone();

        let host = host.to_owned();
        let path = path.to_owned();
        let method = method.to_ascii_uppercase();

        Unit::new(async move {
            let started = Instant::now();
            let bridge = Bridge::new();

            let outcome = match reactor.begin(&host, port, &path, &method, &bridge) {
                Ok(()) => bridge.await,
                Err(err) => Err(TaskError::from(err)),
            };

            reactor.sink().request_completed(&OutboundRecord {
                method,
                host,
                port,
                path,
                elapsed: started.elapsed(),
                ok: outcome.is_ok(),
            });

            outcome
        })
    }

    fn begin(
        &self,
        host: &str,
        port: u16,
        path: &str,
        method: &str,
        bridge: &Bridge<Vec<u8>>,
    ) -> io::Result<()> {
        let addr = resolve(host, port)?;
        let socket = Socket::connect(&addr)?;
        let fd = socket.as_raw_fd();

        let message = format!("{method} {path} HTTP/1.1\r\nHost: {host}:{port}\r\n\r\n");

        let outbound = Rc::new(Outbound {
            socket: RefCell::new(Some(socket)),
            message: message.into_bytes(),
            sent: Cell::new(0),
            bridge: bridge.clone(),
        });

        tracing::debug!(fd, %addr, "connecting");

        self.register(
            fd,
            Interest::Writable,
            Rc::new(move |reactor: &Reactor, fd: RawFd| on_writable(reactor, fd, &outbound)),
        )
    }
}

fn on_writable(reactor: &Reactor, fd: RawFd, outbound: &Rc<Outbound>) {
    let step = {
        let socket = outbound.socket.borrow();

        let Some(socket) = socket.as_ref() else {
            return;
        };

        match socket.take_error() {
            Ok(Some(err)) | Err(err) => Err(err),
            Ok(None) => socket.send(&outbound.message[outbound.sent.get()..]),
        }
    };

    match step {
        Ok(n) => {
            outbound.sent.set(outbound.sent.get() + n);

            if outbound.sent.get() < outbound.message.len() {
                return;
            }

            let next = outbound.clone();
            let switched = reactor.register(
                fd,
                Interest::Readable,
                Rc::new(move |reactor: &Reactor, fd: RawFd| on_readable(reactor, fd, &next)),
            );

            if let Err(err) = switched {
                fail(reactor, fd, outbound, err);
            }
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
        Err(err) => fail(reactor, fd, outbound, err),
    }
}

fn on_readable(reactor: &Reactor, fd: RawFd, outbound: &Rc<Outbound>) {
    reactor.unregister(fd);

    let Some(socket) = outbound.socket.borrow_mut().take() else {
        return;
    };

    let mut buffer = vec![0; reactor.config().read_buffer_size];

    let resolved = match socket.recv(&mut buffer) {
        Ok(n) => {
            buffer.truncate(n);
            outbound.bridge.resolve(buffer)
        }
        Err(err) => outbound.bridge.resolve_with_error(err),
    };

    drop(socket);

    if let Err(err) = resolved {
        tracing::debug!(fd, error = %err, "outbound outcome dropped");
    }
}

fn fail(reactor: &Reactor, fd: RawFd, outbound: &Outbound, err: io::Error) {
    reactor.unregister(fd);

    drop(outbound.socket.borrow_mut().take());

    tracing::debug!(fd, error = %err, "outbound request failed");

    if let Err(err) = outbound.bridge.resolve_with_error(err) {
        tracing::debug!(fd, error = %err, "outbound outcome dropped");
    }
}
