use mesoatlas::engine::config as core_config;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub root: PathBuf,
    pub jobs: usize,
    pub core_config: core_config::PipelineConfig,
}
