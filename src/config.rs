use crate::statement::DEFAULT_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CbjointConfig {
    /// Store identifier substituted for the placeholder
    pub store: Option<String>,
    /// Placeholder token in raw query text
    pub placeholder: String,
    /// JSON file seeding the in-memory store
    pub data: Option<String>,
    /// Deduplicate foreign keys during reference resolution
    pub dedup: bool,
}

impl Default for CbjointConfig {
    fn default() -> Self {
        Self {
            store: None,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            data: None,
            dedup: false,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("cbjoint.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<CbjointConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CbjointConfig = toml::from_str(&contents)?;
    if config.placeholder.is_empty() {
        anyhow::bail!("placeholder in {} must not be empty", path.display());
    }
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &CbjointConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_config_round_trip_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cbjoint.toml");

        let config = CbjointConfig {
            store: Some("beer-sample".to_string()),
            data: Some("docs.json".to_string()),
            ..CbjointConfig::default()
        };
        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), Some(config));

        std::fs::write(&path, "store = \"travel\"\n").unwrap();
        let partial = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(partial.placeholder, DEFAULT_PLACEHOLDER);
        assert!(!partial.dedup);

        std::fs::write(&path, "placeholder = \"\"\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
