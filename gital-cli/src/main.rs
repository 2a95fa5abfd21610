//! gital CLI - clone and update every project of a GitLab group

mod console;

use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use gital_core::{
    CancelFlag, Config, Event, GitAuth, Orchestrator, OrchestratorOptions, Project, Reporter,
    Secrets,
};
use gital_gitlab::GitLabClient;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use console::ConsoleReporter;

/// Exit status after Ctrl-C, as a shell would report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

/// gital: bulk-clone and fast-forward every project of a GitLab group
#[derive(Parser, Debug)]
#[command(name = "gital")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Group key, e.g. `payments` or `payments/backend`
    group: Option<String>,

    /// Update repositories that are already cloned
    #[arg(short, long)]
    update: bool,

    /// Number of projects processed at the same time
    #[arg(short, long, default_value = "1")]
    jobs: NonZeroUsize,

    /// Root directory the group directory is created in
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// GitLab base URL (overrides config)
    #[arg(long, env = "GITAL_URL")]
    url: Option<String>,

    /// GitLab API postfix, e.g. `/api/v4/` (overrides config)
    #[arg(long, env = "GITAL_POSTFIX")]
    postfix: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// How a run ended
#[derive(Debug)]
enum Finish {
    Completed(anyhow::Result<()>),
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_exit(&e),
    };

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let cancel = CancelFlag::new();
    let interrupt = async {
        // Without a handler there is nothing to wait for
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    match until_interrupted(run(cli, cancel.clone()), interrupt).await {
        Finish::Completed(Ok(())) => ExitCode::SUCCESS,
        Finish::Completed(Err(e)) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
        Finish::Interrupted => {
            cancel.cancel();
            ConsoleReporter::new().report(Event::Interrupted);
            // Don't wait for the project in flight; an unfinished clone only
            // ever lives in its staging directory
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}

/// Print a clap error; `--help` and `--version` are not failures
fn usage_exit(err: &clap::Error) -> ExitCode {
    let _ = err.print();
    if err.use_stderr() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Drive `work` until it finishes or `interrupt` fires
async fn until_interrupted<W, I>(work: W, interrupt: I) -> Finish
where
    W: Future<Output = anyhow::Result<()>>,
    I: Future<Output = ()>,
{
    tokio::select! {
        result = work => Finish::Completed(result),
        () = interrupt => Finish::Interrupted,
    }
}

async fn run(cli: Cli, cancel: CancelFlag) -> anyhow::Result<()> {
    // Configuration is checked before anything else, group key included
    let config = Config::load_with_overrides(cli.url.clone(), cli.postfix.clone())?;
    let endpoint = config.endpoint()?;
    let token = Secrets::load()?.require_gitlab_token()?;

    let Some(group) = cli.group else {
        bail!("Please provide group key.");
    };

    let root = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    tracing::debug!(
        url = %endpoint.url,
        postfix = %endpoint.postfix,
        group = %group,
        root = %root.display(),
        "Configuration loaded"
    );

    let client = GitLabClient::from_endpoint(&endpoint, token.clone())?;
    let projects: Vec<Project> = client
        .group_projects(&group)
        .await?
        .into_iter()
        .map(|project| project.into_project(config.gitlab.clone_protocol))
        .collect::<Result<_, _>>()?;

    if projects.is_empty() {
        bail!("No projects found in group {group}.");
    }

    let orchestrator = Orchestrator::new(OrchestratorOptions {
        update_existing: cli.update,
        clone_branch: config.clone.branch.clone(),
        auth: GitAuth::with_token(token),
    })
    .with_cancel_flag(cancel);

    let reporter = ConsoleReporter::new();
    let jobs = cli.jobs.get();

    let statuses = if jobs == 1 {
        tokio::task::spawn_blocking(move || {
            orchestrator.sync(&group, &projects, &root, &reporter)
        })
        .await
        .context("Project worker failed")??
    } else {
        orchestrator
            .sync_concurrent(&group, projects, &root, jobs, &reporter)
            .await?
    };
    tracing::debug!(projects = statuses.len(), "Batch finished");

    Ok(())
}
