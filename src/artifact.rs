//! Versioned artifact store.
//!
//! Artifacts are named text documents produced by phases and consumed by
//! later phases. The store is the only owner of artifact content; writes
//! bump the version, reads never do. When a directory is attached, every
//! write lands the document on disk next to a JSON index so a run can be
//! resumed by a different process.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::phase::Phase;

/// Well-known artifact names used by the phase definitions.
pub mod names {
    pub const IDEA_BRIEF: &str = "idea_brief";
    pub const BRAINSTORM_NOTES: &str = "brainstorm_notes";
    pub const PRODUCT_DEFINITION: &str = "product_definition";
    pub const STACK_SELECTION: &str = "stack_selection";
    pub const DESIGN_GUIDELINES: &str = "design_guidelines";
    pub const TASK_LIST: &str = "task_list";
    pub const CONTENT_COPY: &str = "content_copy";
    pub const MARKETING_ASSETS: &str = "marketing_assets";
}

/// Sections every product definition document must contain.
pub const PRODUCT_DEFINITION_SECTIONS: &[&str] = &[
    "name",
    "description",
    "value proposition",
    "key features",
    "target audience",
    "user flows",
];

/// A named, versioned text document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact name (e.g. "product_definition").
    pub name: String,
    /// Document content.
    pub content: String,
    /// Version counter, starting at 1 on first write.
    pub version: u32,
    /// Phase that most recently wrote this artifact.
    pub produced_by: Phase,
}

/// A by-name reference to an artifact, passed to tools instead of content so
/// later reads observe the current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Name of the referenced artifact.
    pub name: String,
    /// Version at the time the reference was taken, for audit logs.
    pub version: u32,
}

/// Versioned key-value store of named documents.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    artifacts: BTreeMap<String, Artifact>,
    dir: Option<PathBuf>,
}

/// On-disk index entry, one per artifact.
#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    version: u32,
    produced_by: Phase,
    file: String,
}

impl ArtifactStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a persistence directory. Each write lands the document at
    /// `<dir>/<name>.md` and updates `<dir>/artifacts.json`.
    pub fn with_dir(mut self, dir: PathBuf) -> Self {
        self.dir = Some(dir);
        self
    }

    /// Loads a store from a previously persisted directory.
    pub fn open(dir: PathBuf) -> Result<Self> {
        let index_path = dir.join("artifacts.json");
        let mut store = Self::new().with_dir(dir.clone());
        if !index_path.exists() {
            return Ok(store);
        }

        let raw = fs::read_to_string(&index_path)?;
        let index: BTreeMap<String, IndexEntry> = serde_json::from_str(&raw)
            .map_err(|e| Error::State(format!("corrupt artifact index: {}", e)))?;

        for (name, entry) in index {
            let content = fs::read_to_string(dir.join(&entry.file))?;
            store.artifacts.insert(
                name.clone(),
                Artifact {
                    name,
                    content,
                    version: entry.version,
                    produced_by: entry.produced_by,
                },
            );
        }
        Ok(store)
    }

    /// Writes an artifact, incrementing its version. Returns the new version.
    pub fn write(&mut self, name: &str, content: impl Into<String>, phase: Phase) -> Result<u32> {
        let version = self.artifacts.get(name).map_or(1, |a| a.version + 1);
        let artifact = Artifact {
            name: name.to_string(),
            content: content.into(),
            version,
            produced_by: phase,
        };
        self.artifacts.insert(name.to_string(), artifact);
        self.persist()?;

        tracing::debug!(artifact = %name, version, phase = %phase.name(), "wrote artifact");
        Ok(version)
    }

    /// Returns the artifact with the given name, if present.
    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.get(name)
    }

    /// Returns true if an artifact with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }

    /// Takes a by-name reference to an existing artifact.
    ///
    /// Fails closed when the artifact does not exist: downstream tools must
    /// never run against a missing styling or definition document.
    pub fn reference(&self, name: &str) -> Result<ArtifactRef> {
        self.artifacts
            .get(name)
            .map(|a| ArtifactRef {
                name: a.name.clone(),
                version: a.version,
            })
            .ok_or_else(|| Error::BlockedPrecondition(format!("missing artifact '{}'", name)))
    }

    /// Names of artifacts currently in the store.
    pub fn names(&self) -> Vec<&str> {
        self.artifacts.keys().map(String::as_str).collect()
    }

    /// Checks that the product definition carries its required sections.
    ///
    /// Section headings are matched case-insensitively anywhere in the
    /// document, so both `## Value Proposition` and `**value proposition:**`
    /// count.
    pub fn validate_product_definition(&self) -> Result<()> {
        let artifact = self
            .get(names::PRODUCT_DEFINITION)
            .ok_or_else(|| Error::BlockedPrecondition("missing artifact 'product_definition'".into()))?;

        let lowered = artifact.content.to_lowercase();
        let missing: Vec<&str> = PRODUCT_DEFINITION_SECTIONS
            .iter()
            .filter(|s| !lowered.contains(**s))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::BlockedPrecondition(format!(
                "product_definition missing sections: {}",
                missing.join(", ")
            )))
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;

        let mut index = BTreeMap::new();
        for (name, artifact) in &self.artifacts {
            let file = format!("{}.md", name);
            fs::write(dir.join(&file), &artifact.content)?;
            index.insert(
                name.clone(),
                IndexEntry {
                    version: artifact.version,
                    produced_by: artifact.produced_by,
                    file,
                },
            );
        }

        let json = serde_json::to_string_pretty(&index)
            .map_err(|e| Error::State(format!("failed to serialize artifact index: {}", e)))?;
        fs::write(dir.join("artifacts.json"), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips_byte_identical() {
        let mut store = ArtifactStore::new();
        let content = "# Idea\n\nSell socks, but faster.\n";
        store.write(names::IDEA_BRIEF, content, Phase::Idea).unwrap();

        let artifact = store.get(names::IDEA_BRIEF).unwrap();
        assert_eq!(artifact.content, content);
        assert_eq!(artifact.version, 1);
    }

    #[test]
    fn writes_increment_version_reads_do_not() {
        let mut store = ArtifactStore::new();
        store.write(names::IDEA_BRIEF, "v1", Phase::Idea).unwrap();
        store.get(names::IDEA_BRIEF);
        store.get(names::IDEA_BRIEF);
        let v = store.write(names::IDEA_BRIEF, "v2", Phase::Idea).unwrap();

        assert_eq!(v, 2);
        assert_eq!(store.get(names::IDEA_BRIEF).unwrap().version, 2);
        assert_eq!(store.get(names::IDEA_BRIEF).unwrap().content, "v2");
    }

    #[test]
    fn reference_fails_closed_on_missing_artifact() {
        let store = ArtifactStore::new();
        let err = store.reference(names::DESIGN_GUIDELINES).unwrap_err();
        assert!(matches!(err, Error::BlockedPrecondition(_)));
    }

    #[test]
    fn reference_records_current_version() {
        let mut store = ArtifactStore::new();
        store
            .write(names::DESIGN_GUIDELINES, "dark mode only", Phase::Design)
            .unwrap();
        store
            .write(names::DESIGN_GUIDELINES, "light mode only", Phase::Design)
            .unwrap();

        let r = store.reference(names::DESIGN_GUIDELINES).unwrap();
        assert_eq!(r.version, 2);
    }

    #[test]
    fn product_definition_validation_flags_missing_sections() {
        let mut store = ArtifactStore::new();
        store
            .write(
                names::PRODUCT_DEFINITION,
                "## Name\nSockSpeed\n## Description\nFast socks\n",
                Phase::Definition,
            )
            .unwrap();

        let err = store.validate_product_definition().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("value proposition"));
        assert!(msg.contains("user flows"));
    }

    #[test]
    fn product_definition_validation_accepts_complete_document() {
        let mut store = ArtifactStore::new();
        store
            .write(
                names::PRODUCT_DEFINITION,
                "## Name\n## Description\n## Value Proposition\n\
                 ## Key Features\n## Target Audience\n## User Flows\n",
                Phase::Definition,
            )
            .unwrap();

        assert!(store.validate_product_definition().is_ok());
    }

    #[test]
    fn store_persists_and_reopens() {
        let dir = TempDir::new().unwrap();
        let mut store = ArtifactStore::new().with_dir(dir.path().to_path_buf());
        store
            .write(names::PRODUCT_DEFINITION, "## Name\nSockSpeed\n", Phase::Definition)
            .unwrap();
        store
            .write(names::PRODUCT_DEFINITION, "## Name\nSockSpeed v2\n", Phase::Definition)
            .unwrap();

        let reopened = ArtifactStore::open(dir.path().to_path_buf()).unwrap();
        let artifact = reopened.get(names::PRODUCT_DEFINITION).unwrap();
        assert_eq!(artifact.version, 2);
        assert_eq!(artifact.content, "## Name\nSockSpeed v2\n");
        assert_eq!(artifact.produced_by, Phase::Definition);
    }

    #[test]
    fn open_on_empty_dir_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path().to_path_buf()).unwrap();
        assert!(store.names().is_empty());
    }
}
