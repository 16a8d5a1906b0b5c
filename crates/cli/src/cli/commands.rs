use clap::{Parser, Subcommand, ValueEnum};
use genai::adapter::AdapterKind;
use std::path::PathBuf;
use svcgraph_core::config::parse_provider;

/// LLM-assisted dependency graph extraction for multi-service projects
#[derive(Parser, Debug)]
#[command(
    name = "svcgraph",
    about = "LLM-assisted dependency graph extraction for multi-service projects",
    version,
    author,
    long_about = "svcgraph locates the services of a project, retrieves the code relevant to \
                  each kind of inter-service dependency, asks an LLM to name the dependencies \
                  it sees, and writes the merged graph to a graph database."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Verbose logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Extract the dependency graph of a project",
        long_about = "Analyzes every service of the project and upserts the resulting graph.\n\n\
                      Examples:\n  \
                      svcgraph analyze\n  \
                      svcgraph analyze /path/to/project --config-center config\n  \
                      svcgraph analyze --dry-run --graph-output graph.json\n  \
                      svcgraph analyze --backend ollama --model qwen2.5-coder:7b"
    )]
    Analyze(AnalyzeArgs),

    #[command(
        about = "Check LLM, embedding and graph store availability",
        long_about = "Checks that the configured collaborators can be reached.\n\n\
                      Examples:\n  \
                      svcgraph health\n  \
                      svcgraph health --format json"
    )]
    Health(HealthArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to the project root (defaults to current directory)"
    )]
    pub project_path: Option<PathBuf>,

    #[arg(long, value_name = "NAME", help = "Service that acts as the config center")]
    pub config_center: Option<String>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Directory holding the config center's files"
    )]
    pub config_center_dir: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Format of the run summary"
    )]
    pub format: OutputFormatArg,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the run summary to a file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Also write the merged graph as JSON")]
    pub graph_output: Option<PathBuf>,

    #[arg(long, help = "Keep the graph in memory instead of writing to the graph store")]
    pub dry_run: bool,

    #[arg(
        short = 'b',
        long,
        value_parser = parse_adapter_kind,
        help = "LLM provider (overrides SVCGRAPH_PROVIDER)"
    )]
    pub backend: Option<AdapterKind>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Model name (provider-specific)")]
    pub model: Option<String>,

    #[arg(long, value_name = "N", help = "Chunks retrieved per dependency kind")]
    pub top_k: Option<usize>,

    #[arg(long, value_name = "SECONDS", help = "Deadline for the run, up to writing the graph")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Have the model describe each file before it is embedded")]
    pub interpret: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_adapter_kind(s: &str) -> Result<AdapterKind, String> {
    parse_provider(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_analyze_args() {
        let args = CliArgs::parse_from(["svcgraph", "analyze"]);
        match args.command {
            Commands::Analyze(analyze) => {
                assert_eq!(analyze.format, OutputFormatArg::Human);
                assert!(analyze.project_path.is_none());
                assert!(analyze.config_center.is_none());
                assert!(analyze.backend.is_none());
                assert!(analyze.timeout.is_none());
                assert!(!analyze.dry_run);
                assert!(!analyze.interpret);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_analyze_with_options() {
        let args = CliArgs::parse_from([
            "svcgraph",
            "analyze",
            "/work/shop",
            "--config-center",
            "config",
            "--config-center-dir",
            "/work/shop/config",
            "--format",
            "json",
            "--graph-output",
            "graph.json",
            "--dry-run",
            "--backend",
            "claude",
            "--model",
            "claude-3-5-haiku-latest",
            "--top-k",
            "8",
            "--timeout",
            "300",
            "--interpret",
        ]);

        match args.command {
            Commands::Analyze(analyze) => {
                assert_eq!(analyze.project_path, Some(PathBuf::from("/work/shop")));
                assert_eq!(analyze.config_center.as_deref(), Some("config"));
                assert_eq!(
                    analyze.config_center_dir,
                    Some(PathBuf::from("/work/shop/config"))
                );
                assert_eq!(analyze.format, OutputFormatArg::Json);
                assert_eq!(analyze.graph_output, Some(PathBuf::from("graph.json")));
                assert!(analyze.dry_run);
                assert_eq!(analyze.backend, Some(AdapterKind::Anthropic));
                assert_eq!(analyze.top_k, Some(8));
                assert_eq!(analyze.timeout, Some(300));
                assert!(analyze.interpret);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_health_command() {
        let args = CliArgs::parse_from(["svcgraph", "health", "--format", "yaml"]);
        match args.command {
            Commands::Health(health) => assert_eq!(health.format, OutputFormatArg::Yaml),
            _ => panic!("Expected Health command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["svcgraph", "-v", "analyze"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["svcgraph", "--log-level", "debug", "health"]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_adapter_kind_parsing() {
        assert!(parse_adapter_kind("ollama").is_ok());
        assert!(parse_adapter_kind("grok").is_ok());
        assert!(parse_adapter_kind("invalid").is_err());
    }
}
