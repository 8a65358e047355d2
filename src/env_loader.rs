use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_HOME_DIR: &str = "comment-harvest";

/// `HARVEST_HOME` is the harvest home itself; without it the home falls back
/// to `~/comment-harvest`, the same rule `paths::resolve_paths` applies.
fn home_dotenv_path(harvest_home: Option<&str>, user_home: Option<&Path>) -> Option<PathBuf> {
    let home = match harvest_home.map(str::trim).filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => user_home?.join(DEFAULT_HOME_DIR),
    };
    Some(home.join(".env"))
}

/// Working-directory `.env` first, then the one in the harvest home.
/// Variables already set in the process environment always win.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let harvest_home = env::var("HARVEST_HOME").ok();
    let user_home = dirs::home_dir();
    let Some(path) = home_dotenv_path(harvest_home.as_deref(), user_home.as_deref()) else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
