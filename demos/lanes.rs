//! # Example: Request lanes and draft queues
//!
//! Builds the per-purpose registry with a `LogWriter`, floods the read lane, and runs
//! two draft edits on the same line through a keyed action queue.
//!
//! Run with: `RUST_LOG=debug cargo run --example lanes --features logging`

use std::{sync::Arc, time::Duration};

use inflight::{
    Config, KeyedActionQueues, LogWriter, Purpose, Schedulers, Subscribe, Task, TaskError,
};
use tracing_subscriber::EnvFilter;

/// Pretend request that takes `ms` milliseconds.
fn request(name: String, ms: u64) -> Task<String, String> {
    Task::named(name.clone(), move || async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        if name.contains("missing") {
            return Err(format!("404 for {name}"));
        }
        Ok(format!("{name}: ok"))
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let schedulers = Schedulers::builder(Config::default().with_limit(Purpose::Read, 3))
        .with_subscribers(subs)
        .build()?;

    // Read lane: 8 fetches, at most 3 outstanding.
    let reads = schedulers.get(Purpose::Read);
    let fetches: Vec<_> = (0..8)
        .map(|i| {
            let name = if i == 5 {
                "GET /files/missing".to_string()
            } else {
                format!("GET /files/{i}")
            };
            reads.schedule(request(name, 50))
        })
        .collect();
    println!(
        "read lane: in_flight={} waiting={}",
        schedulers.lane(Purpose::Read).in_flight(),
        schedulers.lane(Purpose::Read).waiting()
    );
    for fetch in fetches {
        match fetch.await {
            Ok(body) => println!("{body}"),
            Err(TaskError::Failed(e)) => println!("failed: {e}"),
            Err(e) => println!("error: {e}"),
        }
    }

    // Draft queue: save then discard on the same line, through the write lane.
    let drafts = KeyedActionQueues::<String, &'static str>::new().with_bus(schedulers.bus().clone());
    drafts.add_listener(Arc::new(|pending: &[&'static str]| {
        println!("line:7 pending={pending:?}");
    }));

    let line = "change~42/ps1/line:7".to_string();
    let mut handles = Vec::new();
    for (state, name) in [("saving", "PUT /drafts/7"), ("discarding", "DELETE /drafts/7")] {
        let writes = schedulers.get(Purpose::Write);
        let action = Task::named(name, move || async move {
            writes.schedule(request(name.to_string(), 30)).await
        });
        handles.push(drafts.enqueue(&line, action, state));
    }
    drafts.await_clear(&line).await;
    for h in handles {
        println!("{:?}", h.await);
    }

    schedulers.shutdown().await;
    Ok(())
}
