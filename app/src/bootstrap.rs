use std::path::PathBuf;

use crate::config::AppConfig;

/// Load .env from multiple candidate paths.
pub fn load_dotenv() {
    let candidates = [".env", "../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::debug!("No .env file found, using system environment variables");
}

/// Default output directory: `<Pictures>/PhotoAffix`, falling back to the home
/// directory and then the working directory.
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("PhotoAffix")
}

/// Output directory for `config`.
pub fn output_dir(config: &AppConfig) -> PathBuf {
    config.output_dir.clone().unwrap_or_else(default_output_dir)
}
