use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HarvestPaths {
    pub harvest_home: PathBuf,
    pub archives_dir: PathBuf,
    pub legacy_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_file: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<HarvestPaths> {
    let harvest_home = match env::var("HARVEST_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("comment-harvest"),
    };

    let archives_dir = env_or_default_path("HARVEST_ARCHIVES_DIR", harvest_home.join("archives"));
    let legacy_dir = env_or_default_path("HARVEST_LEGACY_DIR", archives_dir.join("old"));
    let logs_dir = env_or_default_path("HARVEST_LOGS_DIR", harvest_home.join("logs"));
    let config_file = env_or_default_path("HARVEST_CONFIG_PATH", harvest_home.join("harvest.toml"));

    Ok(HarvestPaths {
        harvest_home,
        archives_dir,
        legacy_dir,
        logs_dir,
        config_file,
    })
}
