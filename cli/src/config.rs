use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub api_url: String,
    pub api_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nutrack").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Self::from_parts(
            data_dir,
            std::env::var("NUTRACK_DB_PATH").ok(),
            std::env::var("NUTRACK_API_URL").ok(),
            std::env::var("NUTRACK_API_TOKEN").ok(),
        ))
    }

    fn from_parts(
        data_dir: PathBuf,
        db_override: Option<String>,
        api_url: Option<String>,
        api_token: Option<String>,
    ) -> Self {
        let db_path = db_override
            .filter(|p| !p.trim().is_empty())
            .map_or_else(|| data_dir.join("nutrack.db"), PathBuf::from);
        let api_url = api_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_token = api_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Config {
            db_path,
            data_dir,
            api_url,
            api_token,
        }
    }
}
