use anyhow::{Context, Result};
use log::error;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

#[derive(Clone)]
pub struct SettingsHandle {
    path: PathBuf,
    settings: Arc<RwLock<Settings>>,
}

impl SettingsHandle {
    pub async fn load(path: PathBuf) -> Result<SettingsHandle> {
        let settings = Settings::read(&path)?;
        let handle = SettingsHandle {
            path,
            settings: Arc::new(RwLock::new(settings)),
        };
        handle.save().await;
        Ok(handle)
    }

    pub async fn save(&self) {
        let settings = self.settings.write().await;
        if let Err(e) = settings.write(&self.path) {
            error!(
                "Couldn't save settings to {}: {}",
                self.path.to_string_lossy(),
                e
            );
        }
    }

    /// How long each bring-up step waits for the G2 to answer.
    pub async fn get_request_timeout(&self) -> Duration {
        let settings = self.settings.read().await;
        Duration::from_millis(
            settings
                .request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }

    pub async fn get_initialise_on_connect(&self) -> bool {
        let settings = self.settings.read().await;
        settings.initialise_on_connect.unwrap_or(true)
    }

    pub async fn get_last_loaded_file(&self) -> Option<PathBuf> {
        let settings = self.settings.read().await;
        settings.last_loaded_file.clone()
    }

    pub async fn set_last_loaded_file(&self, path: &Path) {
        let mut settings = self.settings.write().await;
        settings.last_loaded_file = Some(path.to_path_buf());
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    request_timeout_ms: Option<u64>,
    initialise_on_connect: Option<bool>,
    last_loaded_file: Option<PathBuf>,
}

impl Settings {
    pub fn read(path: &Path) -> Result<Settings> {
        match File::open(path) {
            Ok(reader) => serde_json::from_reader(reader).context(format!(
                "Could not parse daemon settings file at {}",
                path.to_string_lossy()
            )),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(error) => Err(error).context(format!(
                "Could not open daemon settings file for reading at {}",
                path.to_string_lossy()
            )),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_all(parent) {
                if e.kind() != ErrorKind::AlreadyExists {
                    return Err(e).context(format!(
                        "Could not create settings directory at {}",
                        parent.to_string_lossy()
                    ))?;
                }
            }
        }
        let writer = File::create(path).context(format!(
            "Could not open daemon settings file for writing at {}",
            path.to_string_lossy()
        ))?;
        serde_json::to_writer_pretty(writer, self).context(format!(
            "Could not write to daemon settings file at {}",
            path.to_string_lossy()
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let settings = SettingsHandle::load(path.clone()).await.unwrap();
        assert_eq!(settings.get_request_timeout().await, Duration::from_millis(5000));
        assert!(settings.get_initialise_on_connect().await);
        assert_eq!(settings.get_last_loaded_file().await, None);

        // Loading writes the defaults back out.
        assert!(path.exists());
    }

    #[tokio::test]
    async fn values_survive_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "request_timeout_ms": 250, "initialise_on_connect": false }"#)
            .unwrap();

        let settings = SettingsHandle::load(path.clone()).await.unwrap();
        assert_eq!(settings.get_request_timeout().await, Duration::from_millis(250));
        assert!(!settings.get_initialise_on_connect().await);

        settings.set_last_loaded_file(Path::new("/tmp/Init.prf2")).await;
        settings.save().await;

        let reloaded = SettingsHandle::load(path).await.unwrap();
        assert_eq!(
            reloaded.get_last_loaded_file().await,
            Some(PathBuf::from("/tmp/Init.prf2"))
        );
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Settings::read(&path).is_err());
    }
}
