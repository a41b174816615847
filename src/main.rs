use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use jobwatch::{Config, HttpJobSource, Job, JobListController, JobListView, LoadState, Overrides, MIN_SEARCH_LEN};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobwatch")]
#[command(about = "Browse and search job postings from a Parse server")]
struct Cli {
    /// Parse server base URL (overrides JOBWATCH_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Parse application id (overrides JOBWATCH_APP_ID)
    #[arg(long, global = true)]
    app_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all jobs, most recent first
    List {
        /// Maximum number of jobs to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Search jobs (queries of 3 characters or fewer list everything)
    Search {
        /// Free-text query
        query: String,
    },

    /// Show the compact preview of the newest jobs
    Widget {
        /// Number of jobs in the preview
        #[arg(short, long)]
        count: Option<usize>,
    },

    /// Resolve a job id to its detail page
    Show {
        /// Job object id
        id: String,
    },

    /// Read queries from stdin, one per line, and print each result list
    Interactive,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn load(controller: &JobListController) -> Result<()> {
    controller
        .initialize()
        .await
        .context("Job list task failed")?;
    match controller.load_state() {
        LoadState::Failed(reason) => Err(anyhow!("Failed to load jobs: {}", reason)),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = Config::load(Overrides {
        api_url: cli.api_url,
        application_id: cli.app_id,
    })?;
    let source = HttpJobSource::new(&config)?;
    let controller = JobListController::new(Arc::new(source));

    match cli.command {
        Commands::List { limit } => {
            load(&controller).await?;
            let jobs = controller.displayed_jobs();
            let shown = limit.unwrap_or(jobs.len()).min(jobs.len());
            print_jobs(&jobs[..shown]);
        }

        Commands::Search { query } => {
            load(&controller).await?;
            if let Some(handle) = controller.search(&query) {
                // A canceled search has nothing to report.
                let _ = handle.await;
            } else if !query.is_empty() {
                println!(
                    "Query is {} characters or shorter, showing all jobs.\n",
                    MIN_SEARCH_LEN
                );
            }
            print_jobs(&controller.displayed_jobs());
        }

        Commands::Widget { count } => {
            load(&controller).await?;
            let view = controller.view();
            let count = count.unwrap_or(config.widget_preview_count);
            let preview = view.preview(count);
            if preview.is_empty() {
                println!("No jobs found.");
            }
            for job in preview {
                println!(
                    "{:<10} {:>18}  {}",
                    job.employment_type().to_string(),
                    job.recency().to_string(),
                    truncate(job.title.as_deref().unwrap_or(""), 48)
                );
                println!("{:<30}{}", "", truncate(job.company_name(), 48));
            }
        }

        Commands::Show { id } => {
            let (tx, rx) = oneshot::channel();
            if let Some(handle) = controller.navigate_to_detail(&id, move |job| {
                let _ = tx.send(job);
            }) {
                handle.await.context("Job lookup task failed")?;
            }
            match rx.await {
                Ok(job) => print_detail(&job),
                Err(_) => println!("Job {} not found.", id),
            }
        }

        Commands::Interactive => {
            load(&controller).await?;
            print_jobs(&controller.displayed_jobs());

            let stdin = BufReader::new(tokio::io::stdin());
            run_interactive(&controller, stdin, print_view).await?;
        }
    }

    Ok(())
}

/// Feeds each input line to `search` and hands every settled snapshot to
/// `on_view`. Returns after input ends and the last search has landed.
async fn run_interactive<R, F>(controller: &JobListController, input: R, mut on_view: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&JobListView),
{
    let mut updates = controller.subscribe();
    let mut lines = input.lines();
    let mut last = None;

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("Failed to read input")? {
                Some(line) => last = controller.search(line.trim()),
                None => break,
            },
            Ok(()) = updates.changed() => {
                let view = updates.borrow_and_update().clone();
                if view.is_settled() {
                    on_view(&view);
                }
            }
        }
    }

    if let Some(handle) = last {
        // A canceled search has nothing to report.
        let _ = handle.await;
    }
    if updates.has_changed().unwrap_or(false) {
        let view = updates.borrow_and_update().clone();
        if view.is_settled() {
            on_view(&view);
        }
    }
    Ok(())
}

fn print_view(view: &JobListView) {
    println!("\n--- {:?} ---", view.search);
    print_jobs(&view.displayed);
}

fn print_jobs(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!(
        "{:<12} {:<10} {:<18} {:<40} {:<24}",
        "ID", "TYPE", "POSTED", "TITLE", "COMPANY"
    );
    println!("{}", "-".repeat(108));
    for job in jobs {
        println!(
            "{:<12} {:<10} {:<18} {:<40} {:<24}",
            truncate(job.id.as_deref().unwrap_or("-"), 12),
            job.employment_type().to_string(),
            job.recency().to_string(),
            truncate(job.title.as_deref().unwrap_or(""), 38),
            truncate(job.company_name(), 22)
        );
    }
}

fn print_detail(job: &Job) {
    println!("Job {}", job.id.as_deref().unwrap_or("-"));
    println!("Title: {}", job.title.as_deref().unwrap_or(""));
    println!("Company: {}", job.company_name());
    let employment = job.employment_type().to_string();
    if !employment.is_empty() {
        println!("Type: {}", employment);
    }
    println!("Posted: {}", job.recency());
    match job.detail_target() {
        Some(target) => println!("URL: {}", target.url),
        None => println!("URL: (none)"),
    }
    if let Some(logo) = job.logo_url() {
        println!("Logo: {}", logo);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max < 3 {
        s.chars().take(max).collect()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
