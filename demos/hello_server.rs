//! Serves `/` on localhost:8080.
//!
//! ```text
//! curl -i localhost:8080/          # waits 5s, then "hello world"
//! curl -i -X POST localhost:8080/?name=weft -H 'Content-Type: application/json' -d '{"id": 1}'
//! curl -i -X PUT localhost:8080/   # 500
//! curl -i localhost:8080/missing   # 404
//! ```
//!
//! A slow GET does not hold up other connections.

use weft::http::{Handler, Request, Response, Router};
use weft::log::{HandlerFailure, LogSink, OutboundRecord, ServedRecord};
use weft::time::sleep;
use weft::{Reactor, Scheduler, TaskError, TaskId, Unit};

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use std::rc::Rc;
use std::time::Duration;

struct Home;

impl Handler for Home {
    fn get(&self, _request: &Request) -> Unit<Response> {
        Unit::new(async {
            sleep(Duration::from_secs(5)).await;
            Ok(Response::text(200, "hello world"))
        })
    }

    fn post(&self, request: &Request) -> Unit<Response> {
        let body = json!({
            "client_ip": request.peer.ip().to_string(),
            "client_port": request.peer.port(),
            "path": request.path,
            "method": request.method,
            "headers": to_object(&request.headers),
            "params": to_object(&request.params),
        });

        Unit::ready(Response::json(200, &body))
    }

    fn put(&self, _request: &Request) -> Unit<Response> {
        Unit::fail(TaskError::msg("division by zero"))
    }
}

fn to_object(pairs: &IndexMap<String, String>) -> Value {
    pairs
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
        .collect::<Map<_, _>>()
        .into()
}

/// Prints log events to stderr.
struct Stderr;

impl LogSink for Stderr {
    fn task_failed(&self, task: TaskId, error: &TaskError) {
        eprintln!("[E] task {task} failed: {error}");
    }

    fn handler_failed(&self, failure: &HandlerFailure) {
        eprintln!("[E] {failure}");
    }

    fn request_completed(&self, record: &OutboundRecord) {
        eprintln!("[I] {record}");
    }

    fn request_served(&self, record: &ServedRecord) {
        eprintln!("[I] {record}");
    }
}

fn main() -> std::io::Result<()> {
    let scheduler = Scheduler::builder().sink(Rc::new(Stderr)).build();
    let reactor = Reactor::builder().wake_for_timers(true).build(&scheduler)?;

    let router = Router::new().route("/", Home);
    let addr = reactor.start_server("localhost", 8080, router)?;

    eprintln!("[I] listening on {addr}");

    reactor.spawn_poller();
    scheduler.run_forever();

    Ok(())
}
