//! Demo: the reference usage scenarios, end to end.
//!
//! Run with `cargo run --bin pipeline` (set `RUST_LOG=seqchain=trace` to
//! watch every dispatch step).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use seqchain::prelude::*;
use tracing::info;

fn arithmetic_chain() {
    // Five slaves, each adding data[0] + i; with data[0] = 1 the master
    // observes 1 + 2 + 3 + 4 + 5 = 15.
    let chains = EventChains::<i32>::new();
    let out = Arc::new(Mutex::new(0));

    let done = out.clone();
    chains.register_append("sum", move |ctx: StepContext<i32>| {
        info!(
            "arithmetic chain finished: out = {} (complete: {})",
            *done.lock(),
            ctx.is_complete()
        );
    });
    for i in 0..5 {
        let out = out.clone();
        chains.register_append("sum", move |ctx: StepContext<i32>| {
            *out.lock() += ctx.with_data(|data| data[0]) + i;
            ctx.advance();
        });
    }
    chains.emit("sum", vec![1]);
}

fn insert_after_chain() {
    // The spliced node lands directly after the master and therefore runs
    // first: 1 * (1 + 4) = 5, then 5 + 1 = 6.
    let chains = EventChains::<i32>::new();
    let out = Arc::new(Mutex::new(1));

    let done = out.clone();
    chains.register_append("calc", move |_ctx: StepContext<i32>| {
        info!("insert-after chain finished: out = {}", *done.lock());
    });
    {
        let out = out.clone();
        chains.register_append("calc", move |ctx: StepContext<i32>| {
            *out.lock() += ctx.with_data(|data| data[0]);
            ctx.advance();
        });
    }
    {
        let out = out.clone();
        chains
            .register_after("calc", move |ctx: StepContext<i32>| {
                *out.lock() *= ctx.with_data(|data| data[0]) + 4;
                ctx.advance();
            })
            .expect("calc master exists");
    }
    chains.emit("calc", vec![1]);
}

fn interleaved_chains() {
    // Two chains with disjoint node sets; each emission runs to completion
    // independently of the other.
    let chains = EventChains::<i32>::new();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    for (master, labels) in [("alpha", ["a0", "a1"]), ("beta", ["b0", "b1"])] {
        let done = log.clone();
        chains.register_append(master, move |_ctx: StepContext<i32>| {
            info!("{:?}", *done.lock());
        });
        for label in labels {
            let log = log.clone();
            chains.register_append(master, move |ctx: StepContext<i32>| {
                log.lock().push(label);
                ctx.advance();
            });
        }
    }
    chains.emit("beta", vec![]);
    chains.emit("alpha", vec![]);
}

async fn deferred_chain() {
    // Each slave parks its context in a timer task before signaling; the
    // chain suspends at every step and still completes in order.
    let chains = EventChains::<i32>::new();
    let out = Arc::new(Mutex::new(0));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let done = out.clone();
    chains.register_append("fetch", move |ctx: StepContext<i32>| {
        info!(
            "deferred chain finished: out = {} (complete: {})",
            *done.lock(),
            ctx.is_complete()
        );
        let _ = tx.send(());
    });
    for i in 0..3 {
        let out = out.clone();
        chains.register_append("fetch", move |ctx: StepContext<i32>| {
            let out = out.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                *out.lock() += ctx.with_data(|data| data[0]) + i;
                ctx.advance();
            });
        });
    }

    chains.emit("fetch", vec![1]);
    let _ = rx.recv().await;
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    arithmetic_chain();
    insert_after_chain();
    interleaved_chains();
    deferred_chain().await;
}
