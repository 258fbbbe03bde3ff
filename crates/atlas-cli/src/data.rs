use crate::error::{CliError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PATH_CONFIG_FILE: &str = "root.conf";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "mesoatlas", "atlas")
}

/// Resolves the default output root: a user-chosen path persisted in the config
/// directory, or the OS data directory.
#[derive(Debug)]
pub struct DataManager {
    base_path: PathBuf,
}

impl DataManager {
    pub fn new() -> Result<Self> {
        let path = Self::determine_data_path()?;
        debug!("DataManager initialized with path: {:?}", &path);
        Ok(Self { base_path: path })
    }

    pub fn with_custom_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
        }
    }

    pub fn get_data_path(&self) -> &Path {
        &self.base_path
    }

    pub fn set_custom_path(path: &Path) -> Result<()> {
        if !path.is_absolute() {
            return Err(CliError::Argument(format!(
                "Output root must be an absolute path, got '{}'",
                path.display()
            )));
        }
        let config_path = Self::get_path_config_file()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(config_path, path.to_string_lossy().as_bytes()).map_err(CliError::from)
    }

    pub fn reset_path() -> Result<()> {
        if let Ok(config_path) = Self::get_path_config_file() {
            if config_path.exists() {
                fs::remove_file(config_path)?;
            }
        }
        Ok(())
    }

    fn determine_data_path() -> Result<PathBuf> {
        match Self::get_path_config_file() {
            Ok(config_path) if config_path.exists() => {
                Self::read_custom_path(&config_path)?.map_or_else(Self::get_default_data_path, Ok)
            }
            _ => Self::get_default_data_path(),
        }
    }

    fn read_custom_path(config_path: &Path) -> Result<Option<PathBuf>> {
        let custom_path_str = fs::read_to_string(config_path)?.trim().to_string();
        if custom_path_str.is_empty() {
            warn!("Custom path config file is empty, falling back to default path.");
            return Ok(None);
        }
        Ok(Some(PathBuf::from(custom_path_str)))
    }

    fn get_path_config_file() -> Result<PathBuf> {
        project_dirs()
            .map(|dirs| dirs.config_dir().join(PATH_CONFIG_FILE))
            .ok_or_else(|| CliError::Data("Could not determine config directory path.".to_string()))
    }

    fn get_default_data_path() -> Result<PathBuf> {
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                CliError::Data("Could not determine default data directory path.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn custom_path_is_used_verbatim() {
        let temp_dir = tempdir().unwrap();
        let manager = DataManager::with_custom_path(temp_dir.path());
        assert_eq!(manager.get_data_path(), temp_dir.path());
    }

    #[test]
    fn path_config_file_is_trimmed_and_empty_means_default() {
        let temp_dir = tempdir().unwrap();
        let conf = temp_dir.path().join(PATH_CONFIG_FILE);

        fs::write(&conf, "  /srv/atlas\n").unwrap();
        assert_eq!(
            DataManager::read_custom_path(&conf).unwrap(),
            Some(PathBuf::from("/srv/atlas"))
        );

        fs::write(&conf, "\n").unwrap();
        assert_eq!(DataManager::read_custom_path(&conf).unwrap(), None);
    }

    #[test]
    fn relative_custom_paths_are_rejected() {
        let result = DataManager::set_custom_path(Path::new("relative/root"));
        assert!(matches!(result, Err(CliError::Argument(_))));
    }
}
