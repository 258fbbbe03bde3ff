pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;

pub use builder::{CommandOverrides, build_config};
pub use models::AppConfig;
