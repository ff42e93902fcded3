use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::AppError;
use crate::pipeline::RenderedArtifacts;

/// Fixed on-disk locations of the spreadsheet and the narrative report.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    spreadsheet_path: PathBuf,
    report_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(spreadsheet_path: impl Into<PathBuf>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            spreadsheet_path: spreadsheet_path.into(),
            report_path: report_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.spreadsheet_path.clone(), config.report_path.clone())
    }

    pub fn spreadsheet_path(&self) -> &Path {
        &self.spreadsheet_path
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn spreadsheet_file_name(&self) -> String {
        file_name(&self.spreadsheet_path, "crypto_data.xlsx")
    }

    pub fn report_file_name(&self) -> String {
        file_name(&self.report_path, "market_report.docx")
    }

    /// Replaces both files as a pair. Each file is swapped in whole, and if
    /// either one cannot be replaced both keep their previous content.
    #[tracing::instrument(
        name = "artifacts write",
        skip(self, artifacts),
        fields(
            spreadsheet.path = %self.spreadsheet_path.display(),
            report.path = %self.report_path.display(),
        )
    )]
    pub async fn write(&self, artifacts: &RenderedArtifacts) -> Result<(), AppError> {
        let sheet_tmp = tmp_path(&self.spreadsheet_path);
        let report_tmp = tmp_path(&self.report_path);

        // Stage both files before touching either target.
        let staged = async {
            stage(&self.spreadsheet_path, &artifacts.spreadsheet).await?;
            stage(&self.report_path, &artifacts.report).await
        }
        .await;
        if let Err(e) = staged {
            remove_quietly(&sheet_tmp).await;
            remove_quietly(&report_tmp).await;
            return Err(e);
        }

        // Keep the current spreadsheet so it can be put back if the report
        // rename fails.
        let backup = backup_path(&self.spreadsheet_path);
        let had_previous = match tokio::fs::copy(&self.spreadsheet_path, &backup).await {
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                remove_quietly(&sheet_tmp).await;
                remove_quietly(&report_tmp).await;
                return Err(AppError::Write(format!(
                    "failed to back up {}: {e}",
                    self.spreadsheet_path.display()
                )));
            }
        };

        if let Err(e) = tokio::fs::rename(&sheet_tmp, &self.spreadsheet_path).await {
            remove_quietly(&sheet_tmp).await;
            remove_quietly(&report_tmp).await;
            remove_quietly(&backup).await;
            return Err(AppError::Write(format!(
                "atomic rename to {} failed: {e}",
                self.spreadsheet_path.display()
            )));
        }

        if let Err(e) = tokio::fs::rename(&report_tmp, &self.report_path).await {
            remove_quietly(&report_tmp).await;
            let restored = if had_previous {
                tokio::fs::rename(&backup, &self.spreadsheet_path).await
            } else {
                tokio::fs::remove_file(&self.spreadsheet_path).await
            };
            if let Err(restore_err) = restored {
                tracing::error!(
                    error = %restore_err,
                    path = %self.spreadsheet_path.display(),
                    "Failed to restore previous spreadsheet"
                );
            }
            return Err(AppError::Write(format!(
                "atomic rename to {} failed: {e}",
                self.report_path.display()
            )));
        }

        remove_quietly(&backup).await;
        Ok(())
    }
}

async fn stage(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    create_parent(path).await?;
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| AppError::Write(format!("failed to write {}: {e}", tmp.display())))
}

async fn create_parent(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::Write(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    Ok(())
}

async fn remove_quietly(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

fn file_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn tmp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::process::tests::{record, snapshot};
    use crate::pipeline::render_artifacts;

    fn artifacts(btc: f64) -> RenderedArtifacts {
        render_artifacts(&snapshot(vec![
            record("BTC", btc, 10.0, 1.0),
            record("ETH", 3000.0, 10.0, -1.0),
        ]))
        .unwrap()
    }

    fn store_in(dir: &Path) -> ArtifactStore {
        ArtifactStore::new(
            dir.join("out").join("crypto_data.xlsx"),
            dir.join("out").join("market_report.docx"),
        )
    }

    fn leftovers(store: &ArtifactStore) -> bool {
        tmp_path(store.spreadsheet_path()).exists()
            || tmp_path(store.report_path()).exists()
            || backup_path(store.spreadsheet_path()).exists()
    }

    #[tokio::test]
    async fn test_write_creates_parent_and_replaces_both() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let first = artifacts(50000.0);
        store.write(&first).await.unwrap();
        assert_eq!(std::fs::read(store.spreadsheet_path()).unwrap(), first.spreadsheet);
        assert_eq!(std::fs::read(store.report_path()).unwrap(), first.report);

        let second = artifacts(51000.0);
        store.write(&second).await.unwrap();
        assert_eq!(std::fs::read(store.spreadsheet_path()).unwrap(), second.spreadsheet);
        assert_eq!(std::fs::read(store.report_path()).unwrap(), second.report);

        assert!(!leftovers(&store));
    }

    #[tokio::test]
    async fn test_write_into_parent_that_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = ArtifactStore::new(blocker.join("data.xlsx"), blocker.join("report.docx"));

        let err = store.write(&artifacts(50000.0)).await.unwrap_err();
        assert!(matches!(err, AppError::Write(_)));
    }

    #[tokio::test]
    async fn test_report_rename_failure_restores_spreadsheet() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let first = artifacts(50000.0);
        store.write(&first).await.unwrap();

        // A non-empty directory at the report path cannot be renamed over.
        std::fs::remove_file(store.report_path()).unwrap();
        std::fs::create_dir(store.report_path()).unwrap();
        std::fs::write(store.report_path().join("keep"), b"x").unwrap();

        let err = store.write(&artifacts(51000.0)).await.unwrap_err();
        assert!(matches!(err, AppError::Write(_)));

        assert_eq!(std::fs::read(store.spreadsheet_path()).unwrap(), first.spreadsheet);
        assert!(!leftovers(&store));
    }

    #[tokio::test]
    async fn test_report_rename_failure_without_previous_leaves_no_spreadsheet() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        std::fs::create_dir_all(store.report_path().join("keep")).unwrap();

        let err = store.write(&artifacts(50000.0)).await.unwrap_err();
        assert!(matches!(err, AppError::Write(_)));

        assert!(!store.spreadsheet_path().exists());
        assert!(!leftovers(&store));
    }

    #[test]
    fn test_tmp_and_backup_paths_append_suffix() {
        assert_eq!(
            tmp_path(Path::new("out/crypto_data.xlsx")),
            PathBuf::from("out/crypto_data.xlsx.tmp")
        );
        assert_eq!(
            backup_path(Path::new("out/crypto_data.xlsx")),
            PathBuf::from("out/crypto_data.xlsx.bak")
        );
    }

    #[test]
    fn test_file_names() {
        let store = ArtifactStore::new("/srv/data/prices.xlsx", "/srv/data/summary.docx");
        assert_eq!(store.spreadsheet_file_name(), "prices.xlsx");
        assert_eq!(store.report_file_name(), "summary.docx");

        let store = ArtifactStore::new("/", "/");
        assert_eq!(store.spreadsheet_file_name(), "crypto_data.xlsx");
    }
}
