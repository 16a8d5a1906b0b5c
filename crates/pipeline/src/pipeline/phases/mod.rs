// Workflow phases of one analysis run, in execution order.

#[path = "01_locate.rs"]
pub mod locate;
#[path = "02_config_center.rs"]
pub mod config_center;
#[path = "03_index.rs"]
pub mod index;
#[path = "04_extract.rs"]
pub mod extract;
#[path = "05_resolve.rs"]
pub mod resolve;
#[path = "06_materialize.rs"]
pub mod materialize;

pub use config_center::ConfigCenterPhase;
pub use extract::ExtractPhase;
pub use index::IndexPhase;
pub use locate::LocatePhase;
pub use materialize::MaterializePhase;
pub use resolve::ResolvePhase;
