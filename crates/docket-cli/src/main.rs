use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docket_core::app::AppBuilder;
use docket_core::domain::{Envelope, StatusKind};
use docket_core::error::HandlerError;
use docket_core::impls::InMemoryItemStore;
use docket_core::queue::QueueOptions;
use docket_core::typed::{Handler, Task};

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    name: String,
}

impl Task for Hello {
    const TYPE: &'static str = "demo.hello.v1";
}

struct HelloHandler {
    remaining_failures: AtomicU32,
}

impl HelloHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Handler<Hello> for HelloHandler {
    async fn handle(&self, task: Hello) -> Result<(), HandlerError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::new(format!(
                "intentional failure (left={left})"
            )));
        }

        println!("Hello, {}!", task.name);
        Ok(())
    }
}

fn load_options(path: Option<&str>) -> Result<QueueOptions, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(QueueOptions::default());
    };
    let text = std::fs::read_to_string(Path::new(path))?;
    Ok(toml::from_str(&text)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // optional TOML file with QueueOptions; the demo shortens the retry table
    let arg = std::env::args().nth(1);
    let mut options = load_options(arg.as_deref())?;
    if arg.is_none() {
        options.poll_interval = Duration::from_millis(200);
        options.failed_poll_interval = Duration::from_millis(200);
        options.retry_intervals = vec![0, 1, 1];
        options.persist_failure_detail = true;
    }

    let store = Arc::new(InMemoryItemStore::<Envelope>::new());
    let app = AppBuilder::new(store)
        .options(options)
        .register::<Hello, _>(HelloHandler::new(2))?
        .expect_tasks(&[Hello::TYPE])
        .build()
        .await?;

    let scheduler = app.start();

    let item = app
        .producer()
        .enqueue(
            &Hello {
                name: "docket".to_string(),
            },
            None,
        )
        .await?;
    info!(item_id = %item.id, "enqueued");

    // wait for a terminal status, or ctrl-c
    loop {
        let done = match app.queue().get(item.id).await? {
            Some(current) => current.head_kind().is_terminal(),
            // deleted on success
            None => true,
        };
        if done {
            break;
        }
        tokio::select! {
            _ = sleep(Duration::from_millis(50)) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Some(current) = app.queue().get(item.id).await? {
        let history: Vec<StatusKind> = current.statuses.iter().rev().map(|s| s.kind).collect();
        println!("history: {history:?}");
        if let Some(detail) = current.statuses.iter().find_map(|s| s.failure_detail.as_ref()) {
            println!("last failure: {}", detail.message);
        }
    }
    println!("counts: {:?}", app.queue().counts().await?);

    scheduler.shutdown_and_join().await;
    Ok(())
}
