use chrono::Utc;
use directories::ProjectDirs;
use iiif_model::{ProjectMeta, SourceType, UserSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const URN_UUID_PREFIX: &str = "urn:uuid:";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Everything persisted for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProject {
    pub meta: ProjectMeta,
    pub manifest: Value,
    /// Saved annotation pages keyed by canvas index.
    pub saved_pages: BTreeMap<usize, Value>,
}

/// Filesystem project store:
/// `projects/<uuid>/{meta.json, manifest.json, annotations/<index>.json}`
/// plus `settings.json` at the root.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: UserSettings,
}

impl ProjectStore {
    pub fn from_default_location() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("org", "iiif-annotator", "iiif-annotator")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create_project(
        &self,
        name: &str,
        source_type: SourceType,
        source_ref: &str,
        manifest: &Value,
    ) -> Result<ProjectMeta, StorageError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let meta = ProjectMeta {
            id: format!("{URN_UUID_PREFIX}{id}"),
            name: name.to_owned(),
            source_type,
            source_ref: source_ref.to_owned(),
            created_at: now,
            updated_at: now,
        };

        let dir = self.project_dir(&id);
        fs::create_dir_all(dir.join("annotations"))?;
        write_json(&dir.join("meta.json"), &meta)?;
        write_json(&dir.join("manifest.json"), manifest)?;

        tracing::info!(project = %meta.id, name, "created project");
        Ok(meta)
    }

    /// Every readable project, most recently updated first.
    pub fn list_projects(&self) -> Result<Vec<ProjectMeta>, StorageError> {
        let projects_root = self.root.join("projects");
        if !projects_root.exists() {
            return Ok(Vec::new());
        }

        let mut metas = Vec::new();
        for entry in fs::read_dir(&projects_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match read_json::<ProjectMeta>(&entry.path().join("meta.json")) {
                Ok(meta) => metas.push(meta),
                Err(err) => {
                    tracing::debug!(path = %entry.path().display(), error = %err, "skipping unreadable project");
                }
            }
        }

        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }

    pub fn read_project(&self, project_id: &str) -> Result<StoredProject, StorageError> {
        let dir = self.existing_project_dir(project_id)?;
        let meta = read_json(&dir.join("meta.json"))?;
        let manifest = read_json(&dir.join("manifest.json"))?;

        let mut saved_pages = BTreeMap::new();
        let annotations_dir = dir.join("annotations");
        if annotations_dir.is_dir() {
            for entry in fs::read_dir(&annotations_dir)? {
                let path = entry?.path();
                let Some(index) = page_index(&path) else {
                    continue;
                };
                match read_json::<Value>(&path) {
                    Ok(page) => {
                        saved_pages.insert(index, page);
                    }
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable annotation page");
                    }
                }
            }
        }

        Ok(StoredProject { meta, manifest, saved_pages })
    }

    /// Replace the stored manifest, optionally renaming the project.
    pub fn update_manifest(
        &self,
        project_id: &str,
        manifest: &Value,
        name: Option<&str>,
    ) -> Result<ProjectMeta, StorageError> {
        let dir = self.existing_project_dir(project_id)?;
        write_json(&dir.join("manifest.json"), manifest)?;
        self.touch(&dir, name)
    }

    pub fn write_canvas_annotations(
        &self,
        project_id: &str,
        canvas_index: usize,
        page: &Value,
    ) -> Result<(), StorageError> {
        let dir = self.existing_project_dir(project_id)?;
        let annotations_dir = dir.join("annotations");
        fs::create_dir_all(&annotations_dir)?;
        write_json(&annotations_dir.join(format!("{canvas_index}.json")), page)?;
        self.touch(&dir, None)?;

        tracing::debug!(project = project_id, canvas_index, "wrote canvas annotations");
        Ok(())
    }

    pub fn delete_project(&self, project_id: &str) -> Result<(), StorageError> {
        let dir = self.existing_project_dir(project_id)?;
        fs::remove_dir_all(&dir)?;
        tracing::info!(project = project_id, "deleted project");
        Ok(())
    }

    pub fn load_settings(&self) -> Result<UserSettings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(UserSettings::default());
        }

        let envelope: SettingsEnvelope = read_json(&path)?;
        Ok(envelope.settings)
    }

    pub fn save_settings(&self, settings: &UserSettings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };
        write_json(&self.settings_path(), &envelope)
    }

    fn touch(&self, dir: &Path, name: Option<&str>) -> Result<ProjectMeta, StorageError> {
        let meta_path = dir.join("meta.json");
        let mut meta: ProjectMeta = read_json(&meta_path)?;
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            meta.name = name.to_owned();
        }
        meta.updated_at = Utc::now();
        write_json(&meta_path, &meta)?;
        Ok(meta)
    }

    fn project_dir(&self, id: &Uuid) -> PathBuf {
        self.root.join("projects").join(id.to_string())
    }

    fn existing_project_dir(&self, project_id: &str) -> Result<PathBuf, StorageError> {
        let not_found = || StorageError::ProjectNotFound(project_id.to_owned());
        let bare = project_id.strip_prefix(URN_UUID_PREFIX).unwrap_or(project_id);
        let id = Uuid::parse_str(bare).map_err(|_| not_found())?;

        let dir = self.project_dir(&id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(not_found())
        }
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}

fn page_index(path: &Path) -> Option<usize> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write through a temp file so readers never see a half-written document.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
