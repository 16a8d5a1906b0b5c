use genai::adapter::AdapterKind;
use svcgraph_cli::cli::commands::{AnalyzeArgs, CliArgs, Commands, HealthArgs};
use svcgraph_cli::cli::output::{graph_document, HealthStatus, OutputFormat, OutputFormatter};
use svcgraph_cli::collaborators;
use svcgraph_cli::logging::{init_logging, parse_level, LoggingConfig};
use svcgraph_cli::{NAME, VERSION};
use svcgraph_core::{LoggingHandler, PipelineError, SvcgraphConfig};
use svcgraph_llm::EmbeddingClient;
use svcgraph_pipeline::{ConfigCenterSpec, PipelineOrchestrator, RunOptions};
use svcgraph_store::GraphStore;

use clap::Parser;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_CANCELLED: i32 = 2;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Analyze(analyze_args) => handle_analyze(analyze_args, args.quiet).await,
        Commands::Health(health_args) => handle_health(health_args).await,
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("SVCGRAPH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };
    init_logging(LoggingConfig::from_env(level));
}

fn resolve_config(args: &AnalyzeArgs) -> SvcgraphConfig {
    let defaults = SvcgraphConfig::default();
    SvcgraphConfig {
        provider: args.backend.unwrap_or(defaults.provider),
        model: args.model.clone().unwrap_or_else(|| defaults.model.clone()),
        top_k: args.top_k.unwrap_or(defaults.top_k),
        run_timeout_secs: args.timeout.or(defaults.run_timeout_secs),
        interpret_chunks: args.interpret || defaults.interpret_chunks,
        ..defaults
    }
}

fn config_center_spec(args: &AnalyzeArgs, project_root: &Path) -> ConfigCenterSpec {
    ConfigCenterSpec {
        name: args.config_center.clone(),
        dir: args.config_center_dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                project_root.join(dir)
            }
        }),
    }
}

fn write_or_print(path: Option<&PathBuf>, content: &str) -> std::io::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content)?;
            info!(path = %path.display(), "Output written");
            Ok(())
        }
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

fn exit_code_for(err: &PipelineError) -> i32 {
    match err {
        PipelineError::Cancelled(_) => EXIT_CANCELLED,
        _ => EXIT_FAILURE,
    }
}

async fn handle_analyze(args: &AnalyzeArgs, quiet: bool) -> i32 {
    let project_root = match &args.project_path {
        Some(path) => path.clone(),
        None => match env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                error!("Failed to get current directory: {}", e);
                return EXIT_FAILURE;
            }
        },
    };

    let config = resolve_config(args);
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your environment variables and command-line arguments.");
        return EXIT_FAILURE;
    }
    debug!(provider = ?config.provider, model = %config.model, "Configuration resolved");

    let (collaborators, memory_store) = match collaborators::build(&config, args.dry_run) {
        Ok(built) => built,
        Err(e) => {
            error!("{:#}", e);
            if config.graph.url.is_none() && !args.dry_run {
                eprintln!("\nSet SVCGRAPH_NEO4J_URL or use --dry-run.");
            }
            return EXIT_FAILURE;
        }
    };

    let mut orchestrator = PipelineOrchestrator::new(collaborators, RunOptions::from(&config));
    if !quiet {
        orchestrator = orchestrator.with_progress(Arc::new(LoggingHandler));
    }

    let spec = config_center_spec(args, &project_root);
    info!(project = %project_root.display(), dry_run = args.dry_run, "Starting analysis");

    let result = tokio::select! {
        result = orchestrator.analyze(&project_root, spec) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning run");
            Err(PipelineError::Cancelled("interrupted".to_string()))
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!("Analysis failed: {}", e);
            return exit_code_for(&e);
        }
    };

    if let Some(path) = &args.graph_output {
        let document = graph_document(&report.graph);
        let written = serde_json::to_string_pretty(&document)
            .map_err(std::io::Error::other)
            .and_then(|content| fs::write(path, content));
        if let Err(e) = written {
            error!("Failed to write graph to {}: {}", path.display(), e);
            return EXIT_FAILURE;
        }
        info!(path = %path.display(), "Graph written");
    }

    if let Some(memory) = memory_store {
        debug!(writes = memory.write_count(), "Dry run kept the graph in memory");
    }

    let formatter = OutputFormatter::new(args.format.into());
    let output = match formatter.format_summary(&report.summary) {
        Ok(out) => out,
        Err(e) => {
            error!("Failed to format summary: {}", e);
            return EXIT_FAILURE;
        }
    };

    if let Err(e) = write_or_print(args.output.as_ref(), &output) {
        error!("Failed to write output: {}", e);
        return EXIT_FAILURE;
    }

    if !report.summary.is_complete() {
        warn!(
            incomplete = report.summary.incomplete.len(),
            skipped = report.summary.skipped_kinds.len(),
            "Graph coverage is partial"
        );
    }
    EXIT_OK
}

async fn check_llm(config: &SvcgraphConfig) -> HealthStatus {
    let key_var = match config.provider {
        AdapterKind::Ollama => {
            let host =
                env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
            let url = format!("{}/api/tags", host.trim_end_matches('/'));
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new());
            return match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    HealthStatus::available(format!("Connected to {}", host))
                        .with_details(format!("Model: {}", config.model))
                }
                _ => HealthStatus::unavailable(format!("Cannot connect to {}", host))
                    .with_details("Ensure Ollama is running: ollama serve"),
            };
        }
        AdapterKind::OpenAI => "OPENAI_API_KEY",
        AdapterKind::Anthropic => "ANTHROPIC_API_KEY",
        AdapterKind::Gemini => "GEMINI_API_KEY",
        AdapterKind::Xai => "XAI_API_KEY",
        AdapterKind::Groq => "GROQ_API_KEY",
        other => {
            return HealthStatus::unavailable(format!("Provider {:?} is not supported", other))
        }
    };

    match env::var(key_var) {
        Ok(_) => HealthStatus::available("API key is configured")
            .with_details(format!("{:?} / {}", config.provider, config.model)),
        Err(_) => HealthStatus::unavailable("API key not configured")
            .with_details(format!("Set {} environment variable", key_var)),
    }
}

async fn check_embedding(config: &SvcgraphConfig) -> HealthStatus {
    let client = match collaborators::embedding_client(config) {
        Ok(client) => client,
        Err(e) => return HealthStatus::unavailable(format!("{:#}", e)),
    };
    match client.embed(&["health check".to_string()]).await {
        Ok(vectors) => HealthStatus::available(format!("{} responded", client.name()))
            .with_details(format!(
                "Dimensions: {}",
                vectors.first().map(Vec::len).unwrap_or(0)
            )),
        Err(e) => HealthStatus::unavailable(e.to_string())
            .with_details("Check SVCGRAPH_EMBEDDING_URL and SVCGRAPH_EMBEDDING_API_KEY"),
    }
}

async fn check_graph_store(config: &SvcgraphConfig) -> HealthStatus {
    let store = match collaborators::graph_store(config) {
        Ok(store) => store,
        Err(e) => {
            return HealthStatus::unavailable(format!("{:#}", e))
                .with_details("Set SVCGRAPH_NEO4J_URL")
        }
    };
    match store.ping().await {
        Ok(()) => HealthStatus::available(format!("{} reachable", store.name())),
        Err(e) => HealthStatus::unavailable(e.to_string()),
    }
}

async fn handle_health(args: &HealthArgs) -> i32 {
    let config = SvcgraphConfig::default();
    info!("Checking collaborator health");

    let (llm, embedding, graph) = tokio::join!(
        check_llm(&config),
        check_embedding(&config),
        check_graph_store(&config)
    );

    let mut results = BTreeMap::new();
    results.insert("llm".to_string(), llm);
    results.insert("embedding".to_string(), embedding);
    results.insert("graph-store".to_string(), graph);

    let format: OutputFormat = args.format.into();
    let output = match OutputFormatter::new(format).format_health(&results) {
        Ok(out) => out,
        Err(e) => {
            error!("Failed to format health output: {}", e);
            return EXIT_FAILURE;
        }
    };
    println!("{}", output);

    if results.values().all(|status| status.available) {
        EXIT_OK
    } else {
        EXIT_FAILURE
    }
}
