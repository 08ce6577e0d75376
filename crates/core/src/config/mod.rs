pub mod migrate_config;
pub mod naming;
pub mod validation;

pub use migrate_config::*;
pub use naming::*;
pub use validation::*;
