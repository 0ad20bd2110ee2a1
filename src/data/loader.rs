// ============================================================
// Layer 4 — Feature Loader
// ============================================================
// Loads utterances whose acoustic features were extracted
// upstream and stored as JSON:
//
//   { "id": "utt_001", "text": "…", "frames": [[f32; F]; T] }
//
// The path may be a single file or a directory. In a directory
// every *.json file is read in file-name order, so the output
// order is stable across runs. A file that fails to parse is
// logged and skipped; the rest still load.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{traits::FeatureSource, utterance::Utterance};

pub struct FeatureLoader {
    path: PathBuf,
}

impl FeatureLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FeatureSource for FeatureLoader {
    fn load_all(&self) -> Result<Vec<Utterance>> {
        if self.path.is_file() {
            return Ok(vec![load_single_json(&self.path)?]);
        }

        if !self.path.exists() {
            tracing::warn!(
                "Features path '{}' does not exist, nothing to load",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.path)
            .with_context(|| format!("Cannot read directory '{}'", self.path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        files.sort();

        let mut utterances = Vec::with_capacity(files.len());
        for path in &files {
            match load_single_json(path) {
                Ok(utt) => {
                    tracing::debug!(
                        "Loaded: {} ({} frames x {})",
                        utt.id,
                        utt.num_frames(),
                        utt.feature_dim()
                    );
                    utterances.push(utt);
                }
                Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
            }
        }

        tracing::info!(
            "Loaded {} utterances from '{}'",
            utterances.len(),
            self.path.display()
        );
        Ok(utterances)
    }
}

fn load_single_json(path: &Path) -> Result<Utterance> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid utterance JSON in '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_loads_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", r#"{"id":"b","text":"two","frames":[[0.5,1.0]]}"#);
        write(dir.path(), "a.json", r#"{"id":"a","text":"one","frames":[[0.0,0.0],[1.0,1.0]]}"#);
        write(dir.path(), "notes.txt", "ignored");

        let utts = FeatureLoader::new(dir.path()).load_all().unwrap();
        let ids: Vec<&str> = utts.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(utts[0].num_frames(), 2);
    }

    #[test]
    fn test_bad_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.json", r#"{"id":"g","text":"ok","frames":[[1.0]]}"#);
        write(dir.path(), "bad.json", "{ not json");

        let utts = FeatureLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(utts.len(), 1);
        assert_eq!(utts[0].id, "g");
    }

    #[test]
    fn test_single_file_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.json", "[]");
        let err = FeatureLoader::new(dir.path().join("bad.json")).load_all().unwrap_err();
        assert!(format!("{err:#}").contains("Invalid utterance JSON"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let utts = FeatureLoader::new("/no/such/features/dir").load_all().unwrap();
        assert!(utts.is_empty());
    }
}
