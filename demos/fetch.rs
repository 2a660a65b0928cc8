//! Fires `count` concurrent GET requests and prints the size of each
//! response.
//!
//! ```text
//! cargo run --example fetch -- 127.0.0.1 8080 / 100
//! ```

use weft::time::instrumented;
use weft::{Reactor, Scheduler, TaskError, Unit};

use std::cell::Cell;
use std::env;
use std::process::ExitCode;
use std::rc::Rc;

#[weft::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let (Some(host), Some(port), Some(path)) = (args.first(), args.get(1), args.get(2)) else {
        eprintln!("usage: fetch <host> <port> <path> [count]");
        return ExitCode::FAILURE;
    };

    let Ok(port) = port.parse::<u16>() else {
        eprintln!("invalid port `{port}`");
        return ExitCode::FAILURE;
    };

    let count = args.get(3).and_then(|n| n.parse::<usize>().ok()).unwrap_or(1);

    let Some(scheduler) = Scheduler::current() else {
        return ExitCode::FAILURE;
    };

    let reactor = match Reactor::new(&scheduler) {
        Ok(reactor) => reactor,
        Err(err) => {
            eprintln!("failed to create reactor: {err}");
            return ExitCode::FAILURE;
        }
    };

    let remaining = Rc::new(Cell::new(count));
    let failed = Rc::new(Cell::new(0usize));

    for i in 0..count {
        let request = reactor.request(host, port, path, "get");
        let handle = reactor.handle();
        let remaining = remaining.clone();
        let failed = failed.clone();

        weft::spawn(Unit::new(async move {
            let (outcome, elapsed) = instrumented(request).await;

            match &outcome {
                Ok(body) => println!("#{i}: {} bytes in {elapsed:?}", body.len()),
                Err(err) => {
                    println!("#{i}: {err}");
                    failed.set(failed.get() + 1);
                }
            }

            remaining.set(remaining.get() - 1);
            if remaining.get() == 0 {
                handle.shutdown();
            }

            Ok::<_, TaskError>(())
        }));
    }

    if count > 0 {
        if let Err(err) = reactor.poll_forever().await {
            eprintln!("reactor failed: {err}");
            return ExitCode::FAILURE;
        }
    }

    if failed.get() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
