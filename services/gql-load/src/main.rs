//! Load test CLI for GraphQL endpoints.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gql_load::compare::{format_comparison, ComparisonData};
use gql_load::config::{list_scenarios, Overrides, ScenarioFile};
use gql_load::http::{HttpTransport, DEFAULT_TIMEOUT};
use gql_load::report::{format_table, ResultsOutput};
use gql_load::{LoadRunner, RequestLogSink, RunContext, ShutdownSignal};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "gql-load")]
#[command(about = "Load testing tool for GraphQL endpoints", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, env = "GQL_LOAD_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long, env = "GQL_LOAD_CONFIG")]
        config: PathBuf,

        /// Environment from the scenario file
        #[arg(short, long, env = "GQL_LOAD_ENV")]
        env: String,

        /// Override concurrency level
        #[arg(long)]
        concurrency: Option<u32>,

        /// Override total request count
        #[arg(long)]
        requests: Option<u64>,

        /// Override target requests per second
        #[arg(long)]
        rps: Option<u32>,

        /// Override run duration in seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
        timeout: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,

        /// Do not write a results file
        #[arg(long)]
        no_save: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Compare two results files or directories of results
    Compare {
        /// Baseline results file or directory
        baseline: PathBuf,

        /// Candidate results file or directory
        candidate: PathBuf,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Run {
            config,
            env,
            concurrency,
            requests,
            rps,
            duration,
            timeout,
            output,
            no_save,
            no_progress,
        } => {
            let overrides = Overrides {
                concurrency,
                requests,
                rps,
                duration_seconds: duration,
            };
            run(
                config,
                &env,
                overrides,
                Duration::from_secs(timeout),
                output,
                !no_save,
                !no_progress,
            )
            .await
        }
        Commands::Compare {
            baseline,
            candidate,
        } => {
            let a = ComparisonData::load(&baseline)
                .with_context(|| format!("Failed to load {}", baseline.display()))?;
            let b = ComparisonData::load(&candidate)
                .with_context(|| format!("Failed to load {}", candidate.display()))?;
            println!("{}", format_comparison(&a, &b));
            Ok(())
        }
        Commands::List { dir } => {
            let scenarios = list_scenarios(&dir)
                .with_context(|| format!("Failed to read {}", dir.display()))?;
            if scenarios.is_empty() {
                println!("No scenario files found in {}", dir.display());
            }
            for (path, scenario) in scenarios {
                let file = path.file_name().unwrap_or_default().to_string_lossy();
                println!("  {} - {}", file, scenario.name);
                if !scenario.description.is_empty() {
                    println!("    {}", scenario.description);
                }
                println!("    environments: {}", scenario.environment_names().join(", "));
            }
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn run(
    config: PathBuf,
    env: &str,
    overrides: Overrides,
    timeout: Duration,
    output: OutputFormat,
    save: bool,
    progress: bool,
) -> Result<()> {
    let scenario = ScenarioFile::from_file(&config)
        .with_context(|| format!("Failed to load scenario {}", config.display()))?;
    let resolved = scenario.resolve(env, &overrides)?;
    let spec = resolved.spec.clone();

    let transport = HttpTransport::new(spec.effective_concurrency(), timeout)
        .context("Failed to create HTTP client")?;
    let mut runner = LoadRunner::new(spec.clone(), Arc::new(transport))?;
    let mut logging_to = None;
    if let Some(path) = &spec.log_file {
        match RequestLogSink::create(path).await {
            Ok(sink) => {
                runner = runner.with_log_sink(sink);
                logging_to = Some(path);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Request logging disabled"),
        }
    }

    println!("Loaded scenario: {} ({})", scenario.name, resolved.environment);
    if !resolved.description.is_empty() {
        println!("  {}", resolved.description);
    }
    println!("  URL: {}", spec.url);
    println!("  Concurrency: {}", runner.concurrency());
    println!("  Requests: {}", runner.budget());
    if let Some(rps) = spec.target_rps {
        println!("  Rate limit: {} req/s", rps);
    }
    if let Some(d) = spec.duration {
        println!("  Duration: {}s", d.as_secs());
    }
    if let Some(path) = logging_to {
        println!("  Logging requests to: {}", path.display());
    }
    println!();

    let context = runner.context();
    spawn_signal_handler(context.clone());

    let done = CancellationToken::new();
    let progress_task =
        progress.then(|| spawn_progress(context.clone(), runner.budget(), done.clone()));

    let snapshot = runner.run().await;

    done.cancel();
    if let Some(task) = progress_task {
        task.await.ok();
    }

    if context.is_cancelled() {
        println!("Test interrupted - showing partial results");
    }

    let results = ResultsOutput::from_run(&spec, &snapshot);
    match output {
        OutputFormat::Table => println!("{}", format_table(&spec.name, &snapshot)),
        OutputFormat::Json => println!("{}", results.format_json()?),
    }

    if save {
        match results.save(&resolved.output_dir) {
            Ok(path) => println!("Results saved to: {}", path.display()),
            Err(e) => warn!(error = %e, "Failed to save results"),
        }
    }

    Ok(())
}

/// First Ctrl-C or SIGTERM stops originating and drains; a second exits at once.
fn spawn_signal_handler(context: RunContext) {
    tokio::spawn(async move {
        let mut shutdown = match ShutdownSignal::new() {
            Ok(shutdown) => shutdown,
            Err(e) => {
                warn!(error = %e, "Failed to install signal handlers");
                return;
            }
        };
        if shutdown.cancel_on_signal(&context).await.is_none() {
            return;
        }
        if let Some(signal) = shutdown.recv().await {
            warn!(signal, "Received second shutdown signal, exiting");
            std::process::exit(130);
        }
    });
}

fn spawn_progress(
    context: RunContext,
    budget: u64,
    done: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let pb = ProgressBar::new(budget);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                _ = done.cancelled() => break,
                _ = ticker.tick() => {
                    pb.set_position(context.aggregator().completed());
                    if context.is_cancelled() {
                        pb.set_message("Draining in-flight requests...");
                    }
                }
            }
        }
        pb.set_position(context.aggregator().completed());
        pb.finish_with_message("Complete");
    })
}
