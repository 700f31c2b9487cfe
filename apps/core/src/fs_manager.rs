use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub struct PortablePathManager;

impl PortablePathManager {
    /// Application root: the working directory, falling back to the executable's folder.
    pub fn root_dir() -> PathBuf {
        match std::env::current_dir() {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to get current directory: {}. Falling back to exe dir.", e);
                std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
                    .unwrap_or_default()
            }
        }
    }

    /// Main data directory (./data).
    pub fn data_dir() -> PathBuf {
        Self::root_dir().join("data")
    }

    /// Default retrieval corpus (./data/corpus.json).
    pub fn default_corpus_path() -> PathBuf {
        Self::data_dir().join("corpus.json")
    }

    /// File backing a SQLite URL; `None` for in-memory databases.
    pub fn sqlite_file(database_url: &str) -> Option<PathBuf> {
        let path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);
        let path = path.split('?').next().unwrap_or(path);

        if path.is_empty() || path == ":memory:" || database_url == "sqlite::memory:" {
            return None;
        }
        Some(PathBuf::from(path))
    }

    /// Creates the directory a file-backed SQLite database lives in.
    pub fn prepare_database_dir(database_url: &str) -> Result<(), std::io::Error> {
        let Some(parent) = Self::sqlite_file(database_url)
            .and_then(|file| file.parent().map(Path::to_path_buf))
            .filter(|dir| !dir.as_os_str().is_empty())
        else {
            return Ok(());
        };

        if !parent.exists() {
            info!("Creating database directory: {:?}", parent);
            fs::create_dir_all(&parent)?;
        }
        Ok(())
    }
}
