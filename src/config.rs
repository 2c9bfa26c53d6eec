use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Defaults loaded from `astq.toml`; command-line flags override each field.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AstqConfig {
    pub language: Option<String>,
    pub backend: Option<String>,
    pub context: Option<usize>,
    pub abspaths: Option<bool>,
    pub skip_docstrings: Option<bool>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("astq.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<AstqConfig>> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: AstqConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("astq.toml");
        assert!(load_config(Some(&path)).unwrap().is_none());
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("astq.toml");
        std::fs::write(&path, "language = \"python\"\ncontext = 2\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.language.as_deref(), Some("python"));
        assert_eq!(config.context, Some(2));
        assert!(config.backend.is_none());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("astq.toml");
        std::fs::write(&path, "language = [not toml").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
