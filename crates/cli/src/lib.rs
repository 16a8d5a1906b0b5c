pub mod cli;
pub mod collaborators;
pub mod logging;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
