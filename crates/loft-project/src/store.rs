//! Project metadata records and state blob persistence
//!
//! The metadata document is the source of truth for a project's existence
//! and timestamps; the state blob is the source of truth for its content.
//! A project with no stored state blob is valid; it just hasn't been
//! saved yet.

use crate::state::ProjectState;
use loft_core::{now_iso8601, prefixed_id, LoftError, Result};
use loft_store::BlobStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lightweight per-project metadata record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A freshly forked project and its persisted state
#[derive(Debug)]
pub struct VariationResult {
    pub project_id: String,
    pub project_name: String,
    pub state: ProjectState,
}

/// Store for one owner's projects.
///
/// Metadata lives as one `.toml` document per project under the docs root;
/// the serialized `ProjectState` lives in blob storage keyed by project id.
pub struct ProjectStore {
    owner_id: String,
    docs_root: PathBuf,
    blob: Arc<dyn BlobStore>,
}

impl ProjectStore {
    pub fn new<P: AsRef<Path>>(docs_root: P, blob: Arc<dyn BlobStore>, owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            docs_root: docs_root.as_ref().to_path_buf(),
            blob,
        }
    }

    /// Create a new project metadata record and return it
    pub fn create(&self, name: &str) -> Result<Project> {
        let now = now_iso8601();
        let project = Project {
            id: prefixed_id("project"),
            name: name.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.save_record(&project)?;
        Ok(project)
    }

    /// All of the owner's projects, most recently updated first
    pub fn list(&self) -> Result<Vec<Project>> {
        let dir = self.owner_dir();
        let mut projects = Vec::new();

        if !dir.exists() {
            return Ok(projects);
        }

        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                let content = std::fs::read_to_string(&path)?;
                if let Ok(file) = toml::from_str::<ProjectFile>(&content) {
                    projects.push(file.project);
                }
            }
        }

        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    /// Load a project's metadata record
    pub fn get(&self, project_id: &str) -> Result<Project> {
        let path = self.record_path(project_id);
        if !path.exists() {
            return Err(LoftError::NotFound(format!(
                "Project not found: {}",
                project_id
            )));
        }
        let content = std::fs::read_to_string(&path)?;
        let file: ProjectFile = toml::from_str(&content)?;
        Ok(file.project)
    }

    /// Serialize `state` wholesale to the project's blob and touch
    /// `updated_at`. Full overwrite, no merge.
    pub fn save_state(&self, project_id: &str, state: &ProjectState) -> Result<()> {
        let mut project = self.get(project_id)?;

        let bytes = serde_json::to_vec(state)?;
        self.blob
            .put(&self.state_path(project_id), &bytes, "application/json")?;

        project.updated_at = now_iso8601();
        self.save_record(&project)
    }

    /// Fetch the project's saved state. A missing blob means the project
    /// was never saved and returns `Ok(None)`.
    pub fn load_state(&self, project_id: &str) -> Result<Option<ProjectState>> {
        match self.blob.get(&self.state_path(project_id))? {
            Some(bytes) => {
                let state: ProjectState = serde_json::from_slice(&bytes)?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Rename a project, touching `updated_at`
    pub fn rename(&self, project_id: &str, new_name: &str) -> Result<Project> {
        let mut project = self.get(project_id)?;
        project.name = new_name.to_string();
        project.updated_at = now_iso8601();
        self.save_record(&project)?;
        Ok(project)
    }

    /// Delete the metadata record and best-effort delete the state blob.
    /// An already-absent blob is success, not failure.
    pub fn delete(&self, project_id: &str) -> Result<()> {
        match std::fs::remove_file(self.record_path(project_id)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.blob.delete(&self.state_path(project_id))?;
        Ok(())
    }

    /// Fork: allocate a project named `{base_name}_variation` whose state
    /// is a deep copy of `source` (full activity history and cursor
    /// included), persist it, and return the new project.
    pub fn create_variation(
        &self,
        base_name: &str,
        source: &ProjectState,
    ) -> Result<VariationResult> {
        let variation_name = format!("{}_variation", base_name);
        let project = self.create(&variation_name)?;

        let state = ProjectState::from_source(source, now_iso8601());
        self.save_state(&project.id, &state)?;

        Ok(VariationResult {
            project_id: project.id,
            project_name: variation_name,
            state,
        })
    }

    fn save_record(&self, project: &Project) -> Result<()> {
        let dir = self.owner_dir();
        std::fs::create_dir_all(&dir)?;
        let wrapper = ProjectFile {
            project: project.clone(),
        };
        let content = toml::to_string_pretty(&wrapper)?;
        std::fs::write(self.record_path(&project.id), content)?;
        Ok(())
    }

    fn owner_dir(&self) -> PathBuf {
        self.docs_root.join(&self.owner_id)
    }

    fn record_path(&self, project_id: &str) -> PathBuf {
        self.owner_dir().join(format!("{}.toml", project_id))
    }

    fn state_path(&self, project_id: &str) -> String {
        format!(
            "users/{}/projects/{}/project.json",
            self.owner_id, project_id
        )
    }
}

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    project: Project,
}
