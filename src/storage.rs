use crate::errors::AppError;
use crate::models::AppData;
use std::path::Path;
use tokio::fs;
use tracing::error;

pub async fn load_data(path: &Path) -> AppData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                AppData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            AppData::default()
        }
    }
}

/// Writes to a sibling temp file first so a crash never leaves a half
/// written data file behind.
pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).await.map_err(AppError::internal)?;
    fs::rename(&tmp, path).await.map_err(AppError::internal)?;
    Ok(())
}

/// Cheap reachability check for the health endpoint.
pub async fn is_reachable(path: &Path) -> bool {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::metadata(dir).await.map(|meta| meta.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Settings;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("mood_journal_storage_{}_{name}.json", std::process::id()));
        path
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let data = load_data(&temp_path("missing")).await;
        assert!(data.tasks.is_empty());
        assert_eq!(data.settings, Settings::default());
    }

    #[tokio::test]
    async fn persisted_data_reloads() {
        let path = temp_path("roundtrip");
        let mut data = AppData::default();
        data.settings.daily_goal = 9;
        data.next_task_id = 4;
        persist_data(&path, &data).await.unwrap();

        let loaded = load_data(&path).await;
        assert_eq!(loaded.settings.daily_goal, 9);
        assert_eq!(loaded.next_task_id, 4);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_file_loads_defaults() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"{ not json").unwrap();
        let data = load_data(&path).await;
        assert!(data.journal.is_empty());
        assert!(is_reachable(&path).await);
        let _ = std::fs::remove_file(&path);
    }
}
