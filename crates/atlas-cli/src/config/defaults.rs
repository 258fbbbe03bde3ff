/// Defaults for settings that only exist on the command line side. Library settings
/// take their defaults from `mesoatlas::engine::config`.
pub struct DefaultsConfig {
    pub jobs: usize,
    pub gap_limit: usize,
    pub generation_method: String,
    pub lookup_base_url: String,
    pub lookup_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            gap_limit: 20,
            generation_method: "manual".to_string(),
            lookup_base_url: "https://pubchem.ncbi.nlm.nih.gov/rest/pug".to_string(),
            lookup_timeout_secs: 10,
        }
    }
}
