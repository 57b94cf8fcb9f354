use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE: &str = "esport.db";
pub const DEFAULT_EXPORT_DIR: &str = "data/export";
pub const DEFAULT_IMPORT_DIR: &str = "data/import";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EsportConfig {
    pub database: Option<String>,
    pub export_dir: Option<String>,
    pub import_dir: Option<String>,
}

impl EsportConfig {
    /// Config with every setting spelled out, as written by `init`
    pub fn with_defaults() -> Self {
        Self {
            database: Some(DEFAULT_DATABASE.to_string()),
            export_dir: Some(DEFAULT_EXPORT_DIR.to_string()),
            import_dir: Some(DEFAULT_IMPORT_DIR.to_string()),
        }
    }

    /// Database path: flag, then config, then default
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        resolve(flag, self.database.as_deref(), DEFAULT_DATABASE)
    }

    pub fn export_dir(&self, flag: Option<&Path>) -> PathBuf {
        resolve(flag, self.export_dir.as_deref(), DEFAULT_EXPORT_DIR)
    }

    pub fn import_dir(&self, flag: Option<&Path>) -> PathBuf {
        resolve(flag, self.import_dir.as_deref(), DEFAULT_IMPORT_DIR)
    }
}

fn resolve(flag: Option<&Path>, configured: Option<&str>, default: &str) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| configured.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(default))
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("esportdb.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<EsportConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: EsportConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &EsportConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
