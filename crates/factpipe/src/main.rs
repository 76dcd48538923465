use anyhow::Result;
use clap::{Parser, Subcommand};
use factpipe::server::{router, AppState};
use factpipe_core::{Claim, Error, EvaluationConfig, ExtractionMode};
use factpipe_local::{
    configured_providers, evaluation_from_env, http_client, search_from_env, validate_article,
    EvaluatorKind, Pipeline, PipelineOptions, SearchKind,
};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "factpipe")]
#[command(about = "Flag inaccurate claims in article text and attach ranked sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fact-check one article (from --file or stdin) and print the claims.
    Check(CheckCmd),
    /// Serve the fact-check endpoint over HTTP.
    Serve(ServeCmd),
    /// Show which providers are configured (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ProviderArgs {
    /// Evaluation backend: auto|cohere|openai_compat
    #[arg(long, env = "FACTPIPE_EVALUATOR", default_value = "auto")]
    evaluator: EvaluatorKind,
    /// Search backend: auto|serpapi|brave|none
    #[arg(long, env = "FACTPIPE_SEARCH", default_value = "auto")]
    search: SearchKind,
}

#[derive(clap::Args, Debug)]
struct PipelineArgs {
    /// Send segmented statements (longer than 30 chars) instead of the raw article.
    #[arg(long)]
    segment: bool,
    /// Do not merge continuation sentences into the previous statement.
    #[arg(long)]
    no_merge: bool,
    /// Fail when the evaluator reply has no parseable JSON array.
    #[arg(long)]
    strict: bool,
    /// Keep claims the model could not verify.
    #[arg(long)]
    keep_unverified: bool,
    /// Sources attached to each claim.
    #[arg(long, default_value_t = 5)]
    max_sources: usize,
    /// Skip the extra "Fact check: ..." query.
    #[arg(long)]
    no_fact_check_query: bool,
    /// Do not boost known fact-checking domains.
    #[arg(long)]
    no_trusted_domains: bool,
    /// Extra source lookups when every query of a lookup failed.
    #[arg(long, default_value_t = 1)]
    retry_count: u32,
    /// Per search query timeout (ms).
    #[arg(long, default_value_t = 8_000)]
    timeout_ms: u64,
    /// Bound on the whole fact check (ms).
    #[arg(long, env = "FACTPIPE_DEADLINE_MS", default_value_t = 60_000)]
    deadline_ms: u64,
    /// Evaluation call timeout (ms).
    #[arg(long, default_value_t = 45_000)]
    evaluation_timeout_ms: u64,
    /// Extra evaluation attempts on transport errors.
    #[arg(long, default_value_t = 0)]
    evaluation_retries: u32,
    /// Concurrent per-claim source lookups.
    #[arg(long, default_value_t = 4)]
    parallel: usize,
}

impl PipelineArgs {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            segment: self.segment,
            merge_continuations: !self.no_merge,
            extraction: if self.strict {
                ExtractionMode::Strict
            } else {
                ExtractionMode::Lenient
            },
            keep_unverified: self.keep_unverified,
            sources: EvaluationConfig {
                max_sources: self.max_sources,
                include_fact_check_domain_boost: !self.no_fact_check_query,
                include_trusted_domains: !self.no_trusted_domains,
                retry_count: self.retry_count,
                timeout_ms: self.timeout_ms,
            },
            deadline_ms: self.deadline_ms,
            evaluation_timeout_ms: self.evaluation_timeout_ms,
            max_parallel_lookups: self.parallel,
            evaluation_retries: self.evaluation_retries,
            ..PipelineOptions::default()
        }
    }
}

#[derive(clap::Args, Debug)]
struct CheckCmd {
    /// Read the article from this file instead of stdin.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    #[command(flatten)]
    pipeline: PipelineArgs,
    #[command(flatten)]
    providers: ProviderArgs,
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    /// Listen address.
    #[arg(long, env = "FACTPIPE_BIND", default_value = "127.0.0.1:5001")]
    bind: String,
    #[command(flatten)]
    pipeline: PipelineArgs,
    #[command(flatten)]
    providers: ProviderArgs,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing() {
    // Logs go to stderr; stdout is reserved for command output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(pipeline: &PipelineArgs, providers: &ProviderArgs) -> factpipe_core::Result<Pipeline> {
    let client = http_client()?;
    let evaluation = evaluation_from_env(client.clone(), providers.evaluator)?;
    let search = search_from_env(client, providers.search)?;
    tracing::debug!(
        evaluator = evaluation.name(),
        search = search.name(),
        "providers selected"
    );
    Ok(Pipeline::new(evaluation, search, pipeline.options()))
}

fn read_article(file: Option<&PathBuf>) -> factpipe_core::Result<String> {
    match file {
        Some(p) => std::fs::read_to_string(p)
            .map_err(|e| Error::InvalidInput(format!("read {}: {e}", p.display()))),
        None => {
            let mut s = String::new();
            std::io::stdin()
                .read_to_string(&mut s)
                .map_err(|e| Error::InvalidInput(format!("read stdin: {e}")))?;
            Ok(s)
        }
    }
}

async fn run_check(args: &CheckCmd) -> factpipe_core::Result<Vec<Claim>> {
    let article = read_article(args.file.as_ref())?;
    let options = args.pipeline.options();
    validate_article(&article, options.min_article_chars)?;
    let pipeline = build_pipeline(&args.pipeline, &args.providers)?;
    pipeline.run(&article).await
}

fn print_claims_text(claims: &[Claim]) {
    if claims.is_empty() {
        println!("no inaccurate claims found");
        return;
    }
    for (i, c) in claims.iter().enumerate() {
        println!("{}. {}", i + 1, c.sentence);
        if let Some(r) = &c.reasoning {
            println!("   reason: {r}");
        }
        for s in &c.sources {
            println!(
                "   [{}] {} ({}) {}",
                s.rank(),
                s.title(),
                s.domain(),
                s.link()
            );
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Check(args) => match run_check(&args).await {
            Ok(claims) => match args.output.to_ascii_lowercase().as_str() {
                "text" => print_claims_text(&claims),
                _ => println!("{}", serde_json::json!({ "claims": claims })),
            },
            Err(e) => {
                println!("{}", serde_json::json!({ "error": e.to_string(), "code": e.code() }));
                std::process::exit(if e.is_client_error() { 2 } else { 1 });
            }
        },
        Commands::Serve(args) => {
            let pipeline = build_pipeline(&args.pipeline, &args.providers)?;
            tracing::info!(
                evaluator = pipeline.evaluator_name(),
                search = pipeline.search_name(),
                "pipeline ready"
            );
            let app = router(AppState::new(pipeline));
            let listener = tokio::net::TcpListener::bind(&args.bind).await?;
            tracing::info!(addr = %listener.local_addr()?, "listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            tracing::info!("server stopped");
        }
        Commands::Doctor(args) => {
            let providers = configured_providers();
            let evaluator_ready = providers.get("cohere").copied().unwrap_or(false)
                || providers.get("openai_compat").copied().unwrap_or(false);
            let mut warnings: Vec<&str> = Vec::new();
            if !evaluator_ready {
                warnings.push("no evaluation backend configured; `check` and `serve` will fail");
            }
            if !providers.get("serpapi").copied().unwrap_or(false)
                && !providers.get("brave").copied().unwrap_or(false)
            {
                warnings.push("no search provider configured; claims will have no sources");
            }
            let payload = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": evaluator_ready,
                "name": "factpipe",
                "version": env!("CARGO_PKG_VERSION"),
                "configured": { "providers": providers },
                "warnings": warnings,
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("factpipe {}", env!("CARGO_PKG_VERSION"));
                    for (name, ok) in &providers {
                        println!("- {name}: {}", if *ok { "configured" } else { "missing" });
                    }
                    for w in &warnings {
                        println!("warning: {w}");
                    }
                }
                _ => println!("{payload}"),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "factpipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("factpipe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(())
}
