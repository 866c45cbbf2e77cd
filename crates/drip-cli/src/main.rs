use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use drip_core::ports::{SeededJitter, ThreadRngJitter};
use drip_core::{
    Operation, OutcomeKind, QueueBuilder, QueueConfig, QueueCounts, ReportSummary, Task,
    TaskError, TaskQueue,
};

/// Export simulated conversations through a paced, retrying queue.
#[derive(Debug, Parser)]
#[command(name = "drip", version)]
struct Args {
    /// Number of conversations to export.
    #[arg(long, default_value_t = 20)]
    count: usize,

    #[arg(long)]
    min_delay_ms: Option<u64>,

    #[arg(long)]
    max_delay_ms: Option<u64>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    max_attempts: Option<u32>,

    #[arg(long)]
    abort_threshold: Option<u32>,

    /// Probability that a single fetch fails transiently.
    #[arg(long, default_value_t = 0.1)]
    failure_rate: f64,

    /// Index of a conversation whose fetch is rejected as unauthorized.
    #[arg(long)]
    fatal_at: Option<usize>,

    /// Seed for jitter and simulated failures.
    #[arg(long)]
    seed: Option<u64>,

    /// QueueConfig JSON file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the final summary as JSON.
    #[arg(long)]
    json: bool,
}

/// Stand-in for the network client: one conversation export.
struct SimulatedExport {
    conversation: usize,
    failure_rate: f64,
    fatal: bool,
    rng: Mutex<StdRng>,
}

#[async_trait]
impl Operation<String> for SimulatedExport {
    async fn run(&self) -> Result<String, TaskError> {
        let (latency, rejected) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            (
                Duration::from_millis(rng.gen_range(20..=120)),
                rng.gen_bool(self.failure_rate),
            )
        };
        tokio::time::sleep(latency).await;

        if self.fatal {
            return Err(TaskError::fatal("upstream rejected credentials (401)"));
        }
        if rejected {
            return Err(TaskError::transient("upstream rate limited (429)"));
        }
        Ok(format!(
            "# Conversation {:04}\n\nexported {} bytes of history\n",
            self.conversation,
            latency.as_millis() * 64
        ))
    }
}

#[derive(Debug, Serialize)]
struct RunSummary {
    aborted: bool,
    summary: ReportSummary,
    counts: QueueCounts,
    failed: Vec<String>,
}

fn load_config(args: &Args) -> anyhow::Result<QueueConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            QueueConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => QueueConfig::default(),
    };

    if let Some(ms) = args.min_delay_ms {
        config.min_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = args.max_delay_ms {
        config.max_delay = Duration::from_millis(ms);
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(n) = args.max_attempts {
        config.max_attempts = n;
    }
    if let Some(n) = args.abort_threshold {
        config.abort_threshold = n;
    }
    Ok(config)
}

fn build_queue(args: &Args, config: QueueConfig) -> anyhow::Result<TaskQueue<String>> {
    let builder = QueueBuilder::new().config(config);
    let queue = match args.seed {
        Some(seed) => builder.jitter(SeededJitter::new(seed)).build()?,
        None => builder.jitter(ThreadRngJitter).build()?,
    };
    Ok(queue)
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    if !(0.0..=1.0).contains(&args.failure_rate) {
        bail!("--failure-rate must be within [0, 1], got {}", args.failure_rate);
    }

    let config = load_config(&args)?;
    tracing::info!(
        count = args.count,
        min_delay_ms = config.min_delay.as_millis() as u64,
        max_delay_ms = config.max_delay.as_millis() as u64,
        concurrency = config.concurrency,
        "starting export"
    );
    let queue = build_queue(&args, config)?;

    for i in 0..args.count {
        let rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64 + 1)),
            None => StdRng::from_entropy(),
        };
        let export = SimulatedExport {
            conversation: i,
            failure_rate: args.failure_rate,
            fatal: args.fatal_at == Some(i),
            rng: Mutex::new(rng),
        };
        queue.add(Task::new(format!("conversation-{i:04}"), export))?;
    }

    queue.on_progress(|p| {
        println!(
            "[{:>3}/{:<3}] {:<20} {:?} (attempt {})",
            p.completed, p.total, p.current_name, p.current_status, p.attempt
        );
    });

    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    queue.on_done(move |report| {
        let failed: Vec<String> = report
            .results
            .iter()
            .filter(|e| e.outcome.kind() == OutcomeKind::Failure)
            .map(|e| match e.outcome.error() {
                Some(err) => format!("{}: {err}", e.name),
                None => e.name.clone(),
            })
            .collect();
        let sent = (report.aborted, report.summary(), failed);
        if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.send(sent);
        }
    });

    queue.start()?;
    let (aborted, summary, failed) = rx.await.context("queue stopped without a done event")?;

    let run = RunSummary {
        aborted,
        summary,
        counts: queue.counts(),
        failed,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        println!();
        println!(
            "exported: {}  failed: {}  not attempted: {}",
            run.summary.succeeded, run.summary.failed, run.summary.not_attempted
        );
        for line in &run.failed {
            println!("  failed {line}");
        }
        if run.aborted {
            println!("aborted: too many consecutive failures");
        }
    }

    Ok(if run.aborted {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
