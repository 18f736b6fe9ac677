//! Pipeline host: generates an outline, one content section per outline entry,
//! then a rendered layout, persisting state so a run can be resumed.

mod plan;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use docflow_core::{JsonFileStore, Pipeline, PipelineStore, Scheduler, init_observability};
use docflow_harness::Harness;
use docflow_harness::vendors::http::HttpGenerationService;
use tracing::info;

#[derive(Parser)]
#[command(name = "docflow")]
#[command(version)]
#[command(about = "Generate a sectioned document from a streaming generation service", long_about = None)]
struct Cli {
    /// Pipeline state file
    #[arg(long, global = true, default_value = "docflow.pipeline.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new document
    New {
        /// What the document is about
        topic: String,

        /// Intended readers
        #[arg(long)]
        audience: Option<String>,
    },
    /// Continue a saved pipeline
    Resume {
        /// Retry the unit the pipeline halted at
        #[arg(long)]
        retry: bool,
    },
    /// Regenerate a finished unit with instructions
    Revise {
        /// Unit number as printed by `status` (1-based)
        unit: usize,

        /// What to change
        instructions: String,
    },
    /// Print the saved pipeline
    Status,
    /// Write the layout markup to a file
    Export {
        /// Destination file
        out: PathBuf,
    },
}

/// Load .env from the crate dir, then the current dir.
fn load_env() {
    if let Ok(canon) = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join(".env")
        .canonicalize()
    {
        let _ = dotenvy::from_path(canon);
    }
    let _ = dotenvy::dotenv();
}

fn load(store: &JsonFileStore) -> Result<Pipeline, Box<dyn std::error::Error>> {
    store
        .load()?
        .ok_or_else(|| format!("no saved pipeline at {}", store.path().display()).into())
}

fn scheduler(pipeline: Pipeline, store: Arc<JsonFileStore>) -> Result<Scheduler, Box<dyn std::error::Error>> {
    let service = HttpGenerationService::from_env()?;
    let scheduler = Scheduler::new(pipeline, Harness::new(Arc::new(service))).with_store(store);

    let cancel = scheduler.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling the active unit...");
            cancel.cancel();
        }
    });
    tokio::spawn(progress::report(scheduler.subscribe()));
    Ok(scheduler)
}

/// Runs the pipeline, appending the next stage each time the current one is done.
async fn drive(scheduler: &mut Scheduler) {
    loop {
        scheduler.run().await;
        let next = plan::next_units(scheduler.pipeline());
        if next.is_empty() {
            break;
        }
        info!(count = next.len(), event = "pipeline.expanded", "appending units");
        for unit in next {
            scheduler.append(unit);
        }
    }
}

fn report_outcome(pipeline: &Pipeline) {
    if pipeline.is_complete() {
        println!("done: {} units complete", pipeline.len());
    } else if let Some(index) = pipeline.halted_at() {
        println!(
            "halted at unit {}; run `docflow resume --retry` to try again",
            index + 1
        );
    } else {
        println!("stopped with pending units; run `docflow resume` to continue");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env();
    init_observability();
    let cli = Cli::parse();
    let store = Arc::new(JsonFileStore::new(&cli.state));

    match cli.command {
        Command::New { topic, audience } => {
            let pipeline = plan::new_pipeline(&topic, audience.as_deref());
            store.save(&pipeline)?;
            let mut scheduler = scheduler(pipeline, store.clone())?;
            drive(&mut scheduler).await;
            report_outcome(scheduler.pipeline());
        }
        Command::Resume { retry } => {
            let mut scheduler = scheduler(load(&store)?, store.clone())?;
            if retry && let Some(index) = scheduler.pipeline().halted_at() {
                scheduler.retry(index).await?;
            }
            drive(&mut scheduler).await;
            report_outcome(scheduler.pipeline());
        }
        Command::Revise { unit, instructions } => {
            let index = unit.checked_sub(1).ok_or("unit numbers start at 1")?;
            let mut scheduler = scheduler(load(&store)?, store.clone())?;
            scheduler.revise(index, &instructions).await?;
            if let Some(unit) = scheduler.pipeline().unit(index) {
                println!("{}", progress::status_line(unit, scheduler.pipeline().len()));
            }
        }
        Command::Status => progress::print_pipeline(&load(&store)?),
        Command::Export { out } => {
            let pipeline = load(&store)?;
            let markup = plan::layout_markup(&pipeline).ok_or("the layout unit has no markup yet")?;
            std::fs::write(&out, markup)?;
            println!("wrote {}", out.display());
        }
    }
    Ok(())
}
