use weft::http::{Response, Router};
use weft::log::MemorySink;
use weft::{Reactor, Scheduler, TaskError, Unit};

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;

/// Awaits `build(reactor)` as a nested unit while the reactor polls, then
/// shuts the reactor down.
///
/// Also returns how many descriptors were still registered right after the
/// request finished.
fn run_request<F>(build: F) -> (Result<Vec<u8>, TaskError>, MemorySink, usize)
where
    F: FnOnce(&Reactor) -> Unit<Vec<u8>>,
{
    let sink = MemorySink::new();
    let scheduler = Scheduler::builder().sink(Rc::new(sink.clone())).build();
    let reactor = Reactor::new(&scheduler).expect("Failed to create reactor");

    let slot = Rc::new(RefCell::new(None));
    let out = slot.clone();
    let handle = reactor.handle();
    let request = build(&reactor);
    let observer = reactor.clone();

    scheduler.register(Unit::new(async move {
        let result = request.await;
        *out.borrow_mut() = Some((result, observer.registered_count()));
        handle.shutdown();
        Ok(())
    }));

    reactor.spawn_poller();
    scheduler.run_forever();

    let (result, registered) = slot.borrow_mut().take().expect("Request task never finished");
    (result, sink, registered)
}

#[test]
fn test_refused_connection_arrives_as_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
        listener.local_addr().expect("Failed to get local address").port()
    };

    let (result, sink, registered) =
        run_request(|reactor| reactor.request("127.0.0.1", port, "/", "get"));

    let err = result.unwrap_err();
    assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionRefused));

    let outbound = sink.outbound();
    assert_eq!(outbound.len(), 1);
    assert!(!outbound[0].ok);
    assert_eq!(outbound[0].method, "GET");
    assert_eq!(outbound[0].port, port);

    assert_eq!(registered, 0, "socket left registered");
    assert!(sink.failures().is_empty());
}

#[test]
fn test_unresolvable_host_is_rejected_without_blocking() {
    let (result, sink, _) =
        run_request(|reactor| reactor.request("example.invalid", 80, "/", "GET"));

    assert_eq!(result.unwrap_err().io_kind(), Some(io::ErrorKind::InvalidInput));
    assert!(!sink.outbound()[0].ok);
}

#[test]
fn test_response_is_read_once_and_request_logged() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
    let port = listener.local_addr().expect("Failed to get local address").port();
    let (tx, rx) = mpsc::channel();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("Failed to accept connection");

        let mut request = Vec::new();
        let mut buffer = [0; 256];
        while !request.ends_with(b"\r\n\r\n") {
            let n = stream.read(&mut buffer).expect("Failed to read request");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buffer[..n]);
        }

        tx.send(request).expect("Failed to report request");
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
            .expect("Failed to write response");
    });

    let (result, sink, registered) =
        run_request(|reactor| reactor.request("localhost", port, "/hello", "get"));

    server.join().expect("Server thread panicked");

    let request = String::from_utf8(rx.recv().unwrap()).unwrap();
    assert_eq!(
        request,
        format!("GET /hello HTTP/1.1\r\nHost: localhost:{port}\r\n\r\n")
    );

    assert_eq!(
        result.unwrap(),
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"
    );

    let outbound = sink.outbound();
    assert_eq!(outbound.len(), 1);
    assert!(outbound[0].ok);
    assert_eq!(outbound[0].host, "localhost");
    assert_eq!(outbound[0].path, "/hello");
    assert_eq!(registered, 0);
}

#[test]
fn test_request_to_own_server() {
    let sink = MemorySink::new();
    let scheduler = Scheduler::builder().sink(Rc::new(sink.clone())).build();
    let reactor = Reactor::new(&scheduler).expect("Failed to create reactor");

    let router = Router::new().get("/ping", |_| Unit::ready(Response::text(200, "pong")));
    let addr = reactor
        .start_server("127.0.0.1", 0, router)
        .expect("Failed to start server");

    let handle = reactor.handle();
    let client = reactor.clone();

    let body = scheduler.block_on(async move {
        let poller = weft::spawn(client.poll_forever());

        let body = client
            .request("127.0.0.1", addr.port(), "/ping", "GET")
            .await;

        handle.shutdown();
        (body, poller)
    });

    let (body, _) = body;
    let body = String::from_utf8(body.unwrap()).unwrap();

    assert!(body.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(body.ends_with("pong"));
    assert_eq!(sink.served().len(), 1);
    assert_eq!(sink.outbound().len(), 1);
}
