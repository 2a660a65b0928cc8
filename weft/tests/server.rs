use weft::http::{Handler, Request, Response, Router};
use weft::log::MemorySink;
use weft::time::sleep;
use weft::{Reactor, ReactorHandle, Scheduler, TaskError, Unit};

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

struct Home;

impl Handler for Home {
    fn get(&self, _request: &Request) -> Unit<Response> {
        Unit::ready(Response::text(200, "hello world"))
    }

    fn post(&self, request: &Request) -> Unit<Response> {
        let name = request.param("name").unwrap_or("nobody").to_owned();
        Unit::ready(Response::text(201, format!("created {name}")))
    }

    fn put(&self, _request: &Request) -> Unit<Response> {
        Unit::fail(TaskError::msg("division by zero"))
    }
}

struct Slow;

impl Handler for Slow {
    fn get(&self, _request: &Request) -> Unit<Response> {
        Unit::new(async {
            sleep(Duration::from_millis(300)).await;
            Ok(Response::text(200, "slow"))
        })
    }
}

struct Panicky;

impl Handler for Panicky {
    fn get(&self, _request: &Request) -> Unit<Response> {
        Unit::new(async {
            let broken = true;
            if broken {
                panic!("handler bug");
            }

            Ok(Response::text(200, "unreachable"))
        })
    }

    fn delete(&self, request: &Request) -> Unit<Response> {
        if !request.path.is_empty() {
            panic!("handler bug before suspending");
        }

        Unit::ready(Response::text(200, "unreachable"))
    }
}

/// Stops the reactor when dropped, so a failing client never hangs the test.
struct ShutdownOnDrop(ReactorHandle);

impl Drop for ShutdownOnDrop {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

/// Runs a server on an ephemeral port until `client` returns.
fn with_server<T, F>(router: Router, client: F) -> (T, MemorySink)
where
    F: FnOnce(SocketAddr) -> T + Send + 'static,
    T: Send + 'static,
{
    let sink = MemorySink::new();
    let scheduler = Scheduler::builder().sink(Rc::new(sink.clone())).build();
    let reactor = Reactor::builder()
        .wake_for_timers(true)
        .build(&scheduler)
        .expect("Failed to create reactor");

    let addr = reactor
        .start_server("127.0.0.1", 0, router)
        .expect("Failed to start server");
    let guard = ShutdownOnDrop(reactor.handle());

    let client = thread::spawn(move || {
        let _guard = guard;
        client(addr)
    });

    reactor.spawn_poller();
    scheduler.run_forever();

    (client.join().expect("Client thread panicked"), sink)
}

fn exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).expect("Failed to connect to server");
    stream.write_all(request).expect("Failed to write request");

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .expect("Failed to read response");

    String::from_utf8(response).expect("Response is not UTF-8")
}

#[test]
fn test_get_is_answered_and_connection_closed() {
    let router = Router::new().route("/", Home);

    let (response, sink) = with_server(router, |addr| {
        exchange(addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
    });

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Server: weft/0.1\r\n"));
    assert!(response.contains("Content-Length: 11\r\n"));
    assert!(response.ends_with("\r\n\r\nhello world"));

    let served = sink.served();
    assert_eq!(served.len(), 1);
    assert_eq!(served[0].status, 200);
    assert_eq!(served[0].method, "GET");
    assert_eq!(served[0].path, "/");
}

#[test]
fn test_query_parameters_reach_handler() {
    let router = Router::new().route("/", Home);

    let (response, _) = with_server(router, |addr| {
        exchange(addr, b"post /?name=ada%20l HTTP/1.1\r\n\r\n")
    });

    assert!(response.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(response.ends_with("created ada l"));
}

#[test]
fn test_handler_error_becomes_500_and_connection_still_closes() {
    let router = Router::new().route("/", Home);

    let (response, sink) = with_server(router, |addr| {
        exchange(addr, b"PUT / HTTP/1.1\r\n\r\n")
    });

    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(response.ends_with("500 Internal Server Error"));
    assert_eq!(sink.served()[0].status, 500);
    assert!(sink.failures().is_empty());

    let handler_failures = sink.handler_failures();
    assert_eq!(handler_failures.len(), 1);
    assert_eq!(handler_failures[0].method, "PUT");
    assert_eq!(handler_failures[0].path, "/");
    assert_eq!(handler_failures[0].message, "division by zero");
}

#[test]
fn test_panicking_handler_does_not_stop_server() {
    let router = Router::new().route("/", Home).route("/panic", Panicky);

    let (responses, sink) = with_server(router, |addr| {
        [
            exchange(addr, b"GET /panic HTTP/1.1\r\n\r\n"),
            exchange(addr, b"DELETE /panic HTTP/1.1\r\n\r\n"),
            exchange(addr, b"GET / HTTP/1.1\r\n\r\n"),
        ]
    });

    assert!(responses[0].starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(responses[1].is_empty(), "connection closed without an answer");
    assert!(responses[2].ends_with("hello world"));

    let handler_failures = sink.handler_failures();
    assert_eq!(handler_failures.len(), 1);
    assert_eq!(handler_failures[0].message, "task panicked: handler bug");

    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].1, "task panicked: handler bug before suspending");

    let statuses: Vec<u16> = sink.served().iter().map(|record| record.status).collect();
    assert_eq!(statuses, [500, 200]);
}

#[test]
fn test_json_post_merges_body_into_params() {
    let router = Router::new().route("/", Home);

    let (response, _) = with_server(router, |addr| {
        exchange(
            addr,
            b"POST /?name=query HTTP/1.1\r\n\
              Content-Type: application/json\r\n\r\n\
              {\"name\": \"ada\"}",
        )
    });

    assert!(response.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(response.contains("\r\nDate: "));
    assert!(response.contains("\r\nTimestamp: "));
    assert!(response.ends_with("created ada"));
}

#[test]
fn test_unknown_path_and_method() {
    let router = Router::new().route("/", Home);

    let (responses, _) = with_server(router, |addr| {
        (
            exchange(addr, b"GET /missing HTTP/1.1\r\n\r\n"),
            exchange(addr, b"DELETE / HTTP/1.1\r\n\r\n"),
        )
    });

    assert!(responses.0.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(responses.1.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
}

#[test]
fn test_malformed_request_fails_task_and_closes_connection() {
    let router = Router::new().route("/", Home);

    let (response, sink) = with_server(router, |addr| exchange(addr, b"garbage\r\n\r\n"));

    assert!(response.is_empty(), "nothing is written for an unparsable request");

    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].1, "malformed request: request line");
    assert!(sink.served().is_empty());
}

#[test]
fn test_slow_handler_does_not_block_other_connections() {
    let router = Router::new().route("/", Home).route("/slow", Slow);

    let (order, _) = with_server(router, |addr| {
        let start = Instant::now();

        let slow = thread::spawn(move || {
            let response = exchange(addr, b"GET /slow HTTP/1.1\r\n\r\n");
            (response, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        let fast = exchange(addr, b"GET / HTTP/1.1\r\n\r\n");
        let fast_elapsed = start.elapsed();

        let (slow, slow_elapsed) = slow.join().expect("Slow client panicked");

        (fast, fast_elapsed, slow, slow_elapsed)
    });

    let (fast, fast_elapsed, slow, slow_elapsed) = order;

    assert!(fast.ends_with("hello world"));
    assert!(slow.ends_with("slow"));
    assert!(fast_elapsed < slow_elapsed);
    assert!(slow_elapsed >= Duration::from_millis(300));
}

#[test]
fn test_peer_closing_without_data_is_ignored() {
    let router = Router::new().route("/", Home);

    let (response, sink) = with_server(router, |addr| {
        drop(TcpStream::connect(addr).expect("Failed to connect to server"));
        exchange(addr, b"GET / HTTP/1.1\r\n\r\n")
    });

    assert!(response.ends_with("hello world"));
    assert!(sink.failures().is_empty());
    assert_eq!(sink.served().len(), 1);
}
