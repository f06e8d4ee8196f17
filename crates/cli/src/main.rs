//! `px`: run pipelines and render scheduler commands.
//!
//! Set RUST_LOG=px_core=debug for engine logs on stderr.

mod output;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Result, WrapErr};
use px_core::config::load_config;
use px_core::scheduler::{SchedulerArgs, SchedulerFactory};
use px_core::task::{Submission, TaskDriver, TaskManager};
use px_protocol::task_models::{Priority, TaskState};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "px", version, about = "Run px pipelines on local or batch-scheduled hosts")]
struct Cli {
    /// Log engine activity at debug level. RUST_LOG takes precedence.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a pipeline from `.px/pipelines` to completion.
    Run {
        /// Pipeline name
        pipeline: String,

        /// Project root holding the `.px/` directory
        #[arg(long, value_name = "DIR", default_value = ".")]
        root: PathBuf,

        /// Parameter value, repeatable
        #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Task name. Defaults to the pipeline name
        #[arg(long)]
        name: Option<String>,

        /// Defaults to $USER
        #[arg(long)]
        submitter: Option<String>,

        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List the pipelines under `.px/pipelines`.
    Pipelines {
        #[arg(long, value_name = "DIR", default_value = ".")]
        root: PathBuf,
    },

    /// Print the command that would submit a shell command.
    SubmitCommand {
        /// LSF, PBS or OGE
        #[arg(long)]
        scheduler: String,

        #[arg(long, default_value = "")]
        queue: String,

        #[arg(long, default_value = "")]
        job_name: String,

        #[arg(long, default_value_t = 0)]
        threads: u32,

        #[arg(long, default_value_t = 0)]
        memory_mb: u32,

        /// Return as soon as the job is queued
        #[arg(long)]
        background: bool,

        /// The shell command to submit
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Print the command that would kill a job.
    KillCommand {
        #[arg(long)]
        scheduler: String,

        job_id: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run {
            pipeline,
            root,
            params,
            name,
            submitter,
            priority,
            json,
        } => {
            let request = RunRequest {
                pipeline,
                root,
                params: params.into_iter().collect(),
                name,
                submitter,
                priority: priority.into(),
                json,
            };
            run_pipeline(request).await
        }
        Command::Pipelines { root } => {
            let config = load_config(&root)
                .await
                .wrap_err_with(|| format!("loading {}", root.display()))?;
            for pipeline in &config.pipelines {
                println!(
                    "{}\t{} step(s)\t{}",
                    pipeline.name,
                    pipeline.processes.len(),
                    pipeline.description
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::SubmitCommand {
            scheduler,
            queue,
            job_name,
            threads,
            memory_mb,
            background,
            command,
        } => {
            let args = SchedulerArgs::default()
                .with_queue(queue)
                .with_job_name(job_name)
                .with_threads(threads)
                .with_memory_mb(memory_mb);
            let scheduler = SchedulerFactory::create(&scheduler, args)?;
            println!("{}", scheduler.create_command(&command.join(" "), !background));
            Ok(ExitCode::SUCCESS)
        }
        Command::KillCommand { scheduler, job_id } => {
            let scheduler = SchedulerFactory::create(&scheduler, SchedulerArgs::default())?;
            println!("{}", scheduler.create_kill_command(&job_id));
            Ok(ExitCode::SUCCESS)
        }
    }
}

struct RunRequest {
    pipeline: String,
    root: PathBuf,
    params: BTreeMap<String, String>,
    name: Option<String>,
    submitter: Option<String>,
    priority: Priority,
    json: bool,
}

/// Run one task and stream its events until it finishes.
///
/// Ctrl-C aborts the task and waits for the driver to wind down.
async fn run_pipeline(request: RunRequest) -> Result<ExitCode> {
    let config = load_config(&request.root)
        .await
        .wrap_err_with(|| format!("loading {}", request.root.display()))?;
    let pipeline = config
        .pipeline(&request.pipeline)
        .cloned()
        .ok_or_else(|| eyre!("no pipeline named '{}'", request.pipeline))?;
    let ctx = config.build_context()?;

    let (events_tx, mut events_rx) = mpsc::channel(256);
    let json = request.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if json {
                println!("{}", output::json_line(&event));
            } else {
                output::render(&event).iter().for_each(|line| println!("{line}"));
            }
        }
    });

    let manager = TaskManager::new(
        TaskDriver::new(ctx, &config.execution.output_dir),
        events_tx,
    );
    let submitter = request
        .submitter
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "px".to_string());
    let name = request.name.unwrap_or_else(|| pipeline.name.clone());
    let task_id = manager
        .submit(
            Submission::new(name, pipeline)
                .with_values(request.params)
                .with_priority(request.priority)
                .with_submitter(submitter),
        )
        .await;
    info!(task = %task_id, "task submitted");

    let task = tokio::select! {
        task = manager.wait_for_task(task_id) => task.map_err(|e| eyre!(e))?,
        _ = tokio::signal::ctrl_c() => {
            warn!(task = %task_id, "interrupted, aborting task");
            if let Err(e) = manager.abort(task_id).await {
                warn!(error = %e, "abort failed");
            }
            manager.wait_for_task(task_id).await.map_err(|e| eyre!(e))?
        }
    };

    drop(manager);
    printer.await?;

    if !json {
        output::summary(&task).iter().for_each(|line| println!("{line}"));
    }
    Ok(if task.state == TaskState::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
