pub mod commands;
pub mod output;

pub use commands::{AnalyzeArgs, CliArgs, Commands, HealthArgs};
pub use output::{HealthStatus, OutputFormat, OutputFormatter};
