//! Pending screenshots of the current session.

use crate::capture::ScreenshotArtifact;
use std::path::PathBuf;

/// Read-only description of a stored artifact, handed to the view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub id: String,
    pub storage_path: PathBuf,
    pub encoded_len: usize,
}

/// Ordered collection of captured artifacts, in capture order.
///
/// Ids are unique; the store is the sole owner of the artifacts until they
/// are drained for submission or deleted.
#[derive(Default, Debug)]
pub struct ScreenshotStore {
    artifacts: Vec<ScreenshotArtifact>,
}

impl ScreenshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an artifact. Returns `false` and drops it if the id is
    /// already present.
    pub fn add(&mut self, artifact: ScreenshotArtifact) -> bool {
        if self.contains(&artifact.id) {
            log::warn!("Ignoring screenshot with duplicate id {}", artifact.id);
            return false;
        }
        self.artifacts.push(artifact);
        true
    }

    /// Removes the artifact with `id`, if any.
    pub fn remove(&mut self, id: &str) -> Option<ScreenshotArtifact> {
        let index = self.artifacts.iter().position(|a| a.id == id)?;
        Some(self.artifacts.remove(index))
    }

    /// Takes every artifact out, leaving the store empty.
    pub fn drain(&mut self) -> Vec<ScreenshotArtifact> {
        std::mem::take(&mut self.artifacts)
    }

    /// Puts previously drained artifacts back in front of anything captured
    /// since.
    pub fn restore_front(&mut self, artifacts: Vec<ScreenshotArtifact>) {
        let newer = std::mem::replace(&mut self.artifacts, artifacts);
        for artifact in newer {
            self.add(artifact);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.artifacts.iter().any(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn summaries(&self) -> Vec<ArtifactSummary> {
        self.artifacts
            .iter()
            .map(|a| ArtifactSummary {
                id: a.id.clone(),
                storage_path: a.storage_path.clone(),
                encoded_len: a.image_data.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(id: &str) -> ScreenshotArtifact {
        ScreenshotArtifact {
            id: id.to_string(),
            storage_path: PathBuf::from(format!("/tmp/{id}.png")),
            image_data: "AAAA".into(),
        }
    }

    fn ids(store: &ScreenshotStore) -> Vec<String> {
        store.summaries().into_iter().map(|s| s.id).collect()
    }

    #[test]
    fn keeps_capture_order() {
        let mut store = ScreenshotStore::new();
        store.add(artifact("a"));
        store.add(artifact("b"));
        store.add(artifact("c"));
        assert_eq!(ids(&store), ["a", "b", "c"]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut store = ScreenshotStore::new();
        assert!(store.add(artifact("a")));
        assert!(!store.add(artifact("a")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_missing_id_is_a_noop() {
        let mut store = ScreenshotStore::new();
        store.add(artifact("a"));
        assert!(store.remove("zzz").is_none());
        assert_eq!(store.remove("a").map(|a| a.id), Some("a".to_string()));
        assert!(store.is_empty());
    }

    #[test]
    fn drain_then_add_holds_only_the_new_artifact() {
        let mut store = ScreenshotStore::new();
        store.add(artifact("old-1"));
        store.add(artifact("old-2"));

        let drained = store.drain();
        assert_eq!(drained.len(), 2);
        assert!(store.is_empty());

        store.add(artifact("new"));
        assert_eq!(ids(&store), ["new"]);
    }

    #[test]
    fn restore_front_keeps_newer_captures_behind() {
        let mut store = ScreenshotStore::new();
        store.add(artifact("a"));
        store.add(artifact("b"));
        let drained = store.drain();
        store.add(artifact("c"));

        store.restore_front(drained);
        assert_eq!(ids(&store), ["a", "b", "c"]);
    }
}
