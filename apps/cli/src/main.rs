use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    ComparisonInput, Decision, HttpContractApi, PollEvent, PollOutcome, ResultOutcome,
    ResultView, ReviewSubmission, ReviewWorkflow, ViewContext,
};
use shared::domain::{EvaluationId, TaskId};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, normalize_base_url};
use render::{render_badge, render_form, render_result};

#[derive(Parser, Debug)]
#[command(name = "contract-review", about = "Submit contract changes and review the risky ones")]
struct Cli {
    /// Backend url, overriding the config file and environment.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Config file to read instead of ./client.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit an original and a modified contract for comparison.
    Compare(CompareArgs),
    /// Fetch the current status of a task once.
    Status { task_id: String },
    /// Wait for a task result and print it.
    Result {
        /// Task id or result link (`/compare?task_id=...`).
        task: String,
    },
    /// Decide on the findings of a task that waits for human review.
    Review(ReviewArgs),
    /// Check that the backend is reachable.
    Health,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[arg(long)]
    original: PathBuf,
    #[arg(long)]
    modified: PathBuf,
    #[arg(long)]
    category: Option<String>,
    /// Keep polling the task status until it settles.
    #[arg(long)]
    watch: bool,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// Task id or result link (`/compare?task_id=...`).
    task: String,
    /// Reject the finding with this id. Unlisted findings are approved.
    #[arg(long = "reject", value_name = "ID")]
    reject: Vec<i64>,
    /// Attach a comment to a finding.
    #[arg(long = "comment", value_name = "ID=TEXT", value_parser = parse_comment)]
    comments: Vec<(i64, String)>,
}

fn parse_comment(raw: &str) -> Result<(i64, String), String> {
    let (id, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=TEXT, got '{raw}'"))?;
    let id = id
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("'{id}' is not a finding id"))?;
    Ok((id, text.to_string()))
}

/// A bare task id, or a result link carrying one.
fn view_for(task: &str) -> ViewContext {
    let task = task.trim();
    if task.contains("task_id=") || task.starts_with('/') || task.contains("://") {
        ViewContext::from_location(task)
    } else {
        ViewContext::for_task(TaskId::new(task))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        settings.base_url = normalize_base_url(base_url);
    }
    info!(base_url = %settings.base_url, "using backend");

    let api = Arc::new(
        HttpContractApi::new(&settings.base_url)
            .with_context(|| format!("invalid backend url '{}'", settings.base_url))?,
    );
    let workflow = ReviewWorkflow::new(api, settings.poll_config());

    match cli.command {
        Command::Compare(args) => compare(&workflow, args).await,
        Command::Status { task_id } => {
            let badge = workflow.fetch_status(&TaskId::new(task_id.trim())).await?;
            println!("{}", render_badge(&badge));
            Ok(())
        }
        Command::Result { task } => {
            let view = open_result(&workflow, &task).await?;
            println!("{}", render_result(&view));
            Ok(())
        }
        Command::Review(args) => review(&workflow, args).await,
        Command::Health => {
            let health = workflow
                .check_health()
                .await
                .context("backend health check failed")?;
            println!("backend {}: {}", settings.base_url, health.status);
            Ok(())
        }
    }
}

async fn compare(workflow: &ReviewWorkflow, args: CompareArgs) -> Result<()> {
    let original = fs::read_to_string(&args.original)
        .with_context(|| format!("failed to read '{}'", args.original.display()))?;
    let modified = fs::read_to_string(&args.modified)
        .with_context(|| format!("failed to read '{}'", args.modified.display()))?;
    let mut input = ComparisonInput::new(original, modified);
    if let Some(category) = args.category {
        input = input.with_category(category);
    }

    let mut events = workflow.poller().subscribe_events();
    let task_id = workflow.submit_comparison(input).await?;
    println!("submitted task {task_id}");

    if !args.watch {
        workflow.poller().stop().await;
        println!("follow it with: contract-review status {task_id}");
        return Ok(());
    }

    loop {
        match events.recv().await {
            Ok(PollEvent::Status(badge)) if badge.task_id == task_id => {
                println!("{}", render_badge(&badge));
            }
            Ok(PollEvent::TransientFailure { attempt, error, .. }) => {
                eprintln!("status check {attempt} failed: {error}");
            }
            Ok(PollEvent::Stopped {
                task_id: stopped,
                outcome,
                ..
            }) if stopped == task_id => {
                if matches!(outcome, PollOutcome::Cancelled) {
                    bail!("status polling for {task_id} was cancelled");
                }
                return Ok(());
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "watch: missed status updates");
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

async fn open_result(workflow: &ReviewWorkflow, task: &str) -> Result<ResultView> {
    let view = view_for(task);
    let Some(task_id) = view.task_id().cloned() else {
        bail!("'{task}' does not name a task");
    };

    match workflow.open_result(&view).await {
        Some(ResultOutcome::Ready(result)) => Ok(result),
        Some(ResultOutcome::TimedOut { attempts }) => bail!(
            "task {task_id} did not settle after {attempts} checks; it may still be running"
        ),
        Some(ResultOutcome::Cancelled) | None => bail!("result polling for {task_id} was cancelled"),
    }
}

async fn review(workflow: &ReviewWorkflow, args: ReviewArgs) -> Result<()> {
    let view = open_result(workflow, &args.task).await?;
    let mut form = match view.review_form {
        Some(form) => form,
        None => {
            println!("{}", render_result(&view));
            bail!("task has no findings awaiting review");
        }
    };

    for id in args.reject {
        form.set_decision(EvaluationId(id), Decision::Reject)?;
    }
    for (id, comment) in args.comments {
        form.set_comment(EvaluationId(id), comment)?;
    }
    println!("{}", render_form(&form));

    match workflow.submit_review(&mut form).await? {
        ReviewSubmission::Refreshed(refreshed) => {
            println!();
            println!("{}", render_result(&refreshed));
        }
        ReviewSubmission::RefreshFailed(err) => {
            println!();
            println!("review recorded for task {}", form.task_id());
            eprintln!("could not fetch the updated result: {err}");
            eprintln!("check it later with: contract-review result {}", form.task_id());
        }
        ReviewSubmission::AlreadySubmitted => {}
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
