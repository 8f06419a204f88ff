use super::Context;
use crate::client::{ControllerClient, ProjectFile};
use crate::error::ClientError;
use crate::lock;
use crate::value::EnumDictionary;
use anyhow::Context as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn read_from_file(path: &Path) -> anyhow::Result<ProjectFile> {
    let handle = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(serde_json::from_reader(handle)?)
}

fn save_to_file(path: &Path, project: &ProjectFile) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let handle = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(handle);
    serde_json::to_writer(&mut writer, project)?;
    writer.flush()?;
    Ok(())
}

impl Context {
    fn project_cache_path(&self) -> PathBuf {
        self.controller
            .data_dir
            .join(format!("ihc-project-file-{}.json", self.thing))
    }

    /// Make sure the cached project matches the controller and rebuild the
    /// enum dictionary from it.
    pub(super) async fn load_project(&self, client: &dyn ControllerClient) -> Result<(), ClientError> {
        if self.controller.load_project_file {
            let mut project = lock(&self.project).take();
            let synced = self.sync_project(client, &mut project).await;
            // Put it back even when the controller failed us.
            *lock(&self.project) = project;
            synced?;
        }

        let dictionary = match lock(&self.project).as_ref() {
            Some(project) => EnumDictionary::new(&project.enums),
            None => EnumDictionary::default(),
        };
        debug!("Enum dictionary has {} definitions", dictionary.len());
        *lock(&self.enums) = dictionary;
        Ok(())
    }

    async fn sync_project(
        &self,
        client: &dyn ControllerClient,
        project: &mut Option<ProjectFile>,
    ) -> Result<(), ClientError> {
        let path = self.project_cache_path();
        let mut reload = false;

        if project.is_none() {
            match read_from_file(&path) {
                Ok(cached) => *project = Some(cached),
                Err(e) => {
                    debug!(
                        "Error occurred when read project file from file '{}', reason {}",
                        path.display(),
                        e
                    );
                    reload = true;
                }
            }
        }

        let info = client.project_info().await?;
        if project.as_ref().map_or(true, |p| p.info != info) {
            debug!("Local project file is not same as in the controller, reload project file from controller!");
            reload = true;
        }

        if reload {
            debug!("Loading IHC /ELKO LS project file from controller...");
            let downloaded = client.project_file().await?;
            debug!("Saving project file to local file '{}'", path.display());
            if let Err(e) = save_to_file(&path, &downloaded) {
                warn!(
                    "Error occurred when trying to write data to file '{}', reason {}",
                    path.display(),
                    e
                );
            }
            *project = Some(downloaded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProjectInfo;
    use crate::value::{EnumDefinition, EnumValue};
    use chrono::NaiveDate;

    fn project(number: &str) -> ProjectFile {
        ProjectFile {
            info: ProjectInfo {
                project_number: number.into(),
                last_modified: NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
            },
            enums: vec![EnumDefinition {
                definition_type_id: 100,
                values: vec![EnumValue {
                    id: 1,
                    name: "Auto".into(),
                }],
            }],
            data: b"<project/>".to_vec(),
        }
    }

    #[test]
    fn cache_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ihc-project-file-x.json");
        save_to_file(&path, &project("7")).unwrap();
        assert_eq!(read_from_file(&path).unwrap(), project("7"));
    }

    #[test]
    fn stale_cache_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ihc-project-file-x.json");
        let mut big = project("7");
        big.data = vec![b'x'; 64 * 1024];
        save_to_file(&path, &big).unwrap();
        save_to_file(&path, &project("8")).unwrap();
        assert_eq!(read_from_file(&path).unwrap(), project("8"));
    }

    #[test]
    fn missing_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_from_file(&dir.path().join("absent.json")).is_err());
    }
}
