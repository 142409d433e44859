//! Content loading from authored JSON files.
//!
//! Two entry points: [`load_content`] degrades malformed or missing
//! files to empty collections with warnings (gameplay continues with
//! whatever content survives), while [`load_content_strict`] surfaces
//! every problem as a [`ContentError`] for engine construction paths
//! that must not mask authoring breakage.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::de::DeserializeOwned;
use thiserror::Error;

use wayfarer_data::{ContentDef, DialogueLineDef, MilestoneDef, QuestDef, validate_content};

pub const QUESTS_FILE: &str = "quests.json";
pub const MILESTONES_FILE: &str = "milestones.json";
pub const DIALOGUE_FILE: &str = "dialogue.json";

/// Failure while loading authored content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("required content file missing: {0}")]
    MissingFile(PathBuf),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("content validation failed:\n{0}")]
    Invalid(String),
}

fn load_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ContentError> {
    if !path.is_file() {
        return Err(ContentError::MissingFile(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ContentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load quest definitions from a `quests.json` file.
///
/// # Errors
/// Returns a [`ContentError`] if the file is missing or malformed.
pub fn load_quest_defs(path: &Path) -> Result<Vec<QuestDef>, ContentError> {
    let quests: Vec<QuestDef> = load_file(path)?;
    info!("{} quest definitions loaded from '{}'", quests.len(), path.display());
    Ok(quests)
}

/// Load milestone definitions from a `milestones.json` file.
///
/// # Errors
/// Returns a [`ContentError`] if the file is missing or malformed.
pub fn load_milestone_defs(path: &Path) -> Result<Vec<MilestoneDef>, ContentError> {
    let milestones: Vec<MilestoneDef> = load_file(path)?;
    info!(
        "{} milestone definitions loaded from '{}'",
        milestones.len(),
        path.display()
    );
    Ok(milestones)
}

/// Load dialogue lines from a `dialogue.json` file.
///
/// # Errors
/// Returns a [`ContentError`] if the file is missing or malformed.
pub fn load_dialogue_defs(path: &Path) -> Result<Vec<DialogueLineDef>, ContentError> {
    let lines: Vec<DialogueLineDef> = load_file(path)?;
    info!("{} dialogue lines loaded from '{}'", lines.len(), path.display());
    Ok(lines)
}

/// Load the full content set from a directory, degrading each
/// malformed or missing file to an empty collection with a warning.
/// Validation findings are logged, never fatal.
pub fn load_content(dir: &Path) -> ContentDef {
    let content = ContentDef {
        quests: load_or_default("quests", load_quest_defs(&dir.join(QUESTS_FILE))),
        milestones: load_or_default("milestones", load_milestone_defs(&dir.join(MILESTONES_FILE))),
        dialogue: load_or_default("dialogue", load_dialogue_defs(&dir.join(DIALOGUE_FILE))),
    };
    for finding in validate_content(&content) {
        warn!("content validation: {finding}");
    }
    content
}

/// Load the full content set, failing on any missing file, parse
/// error, or validation finding.
///
/// # Errors
/// Returns the first load failure, or an aggregated `Invalid` error
/// listing every validation finding.
pub fn load_content_strict(dir: &Path) -> Result<ContentDef, ContentError> {
    let content = ContentDef {
        quests: load_quest_defs(&dir.join(QUESTS_FILE))?,
        milestones: load_milestone_defs(&dir.join(MILESTONES_FILE))?,
        dialogue: load_dialogue_defs(&dir.join(DIALOGUE_FILE))?,
    };
    let findings = validate_content(&content);
    if findings.is_empty() {
        return Ok(content);
    }
    let details = findings
        .into_iter()
        .map(|finding| format!("- {finding}"))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ContentError::Invalid(details))
}

fn load_or_default<T>(kind: &str, result: Result<Vec<T>, ContentError>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(err) => {
            warn!("failed to load {kind}; continuing with none: {err}");
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const QUESTS: &str = r#"[
        { "id": "pass", "title": "Embers of the Pass", "stages": [
            { "id": "s1", "title": "Reach the pass", "tasks": [
                { "id": "t1", "text": "Climb the switchbacks" }
            ]}
        ]}
    ]"#;

    const DIALOGUE: &str = r#"[
        { "id": "greet", "speaker": "elder", "text": "Welcome back." }
    ]"#;

    #[test]
    fn lenient_load_degrades_bad_files_to_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(QUESTS_FILE), QUESTS).unwrap();
        fs::write(dir.path().join(MILESTONES_FILE), "{{ not json").unwrap();
        // dialogue.json intentionally absent

        let content = load_content(dir.path());
        assert_eq!(content.quests.len(), 1);
        assert!(content.milestones.is_empty());
        assert!(content.dialogue.is_empty());
    }

    #[test]
    fn strict_load_fails_on_missing_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(QUESTS_FILE), QUESTS).unwrap();
        fs::write(dir.path().join(MILESTONES_FILE), "[]").unwrap();

        let err = load_content_strict(dir.path()).unwrap_err();
        assert!(matches!(err, ContentError::MissingFile(_)));
    }

    #[test]
    fn strict_load_aggregates_validation_findings() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(QUESTS_FILE), QUESTS).unwrap();
        fs::write(dir.path().join(MILESTONES_FILE), "[]").unwrap();
        fs::write(
            dir.path().join(DIALOGUE_FILE),
            r#"[ { "id": "greet", "speaker": "elder", "text": "Hi.", "next": "missing_line" } ]"#,
        )
        .unwrap();

        let err = load_content_strict(dir.path()).unwrap_err();
        match err {
            ContentError::Invalid(details) => assert!(details.contains("missing_line")),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn strict_load_passes_clean_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(QUESTS_FILE), QUESTS).unwrap();
        fs::write(dir.path().join(MILESTONES_FILE), "[]").unwrap();
        fs::write(dir.path().join(DIALOGUE_FILE), DIALOGUE).unwrap();

        let content = load_content_strict(dir.path()).unwrap();
        assert_eq!(content.quests[0].stages[0].tasks[0].id, "t1");
        assert_eq!(content.dialogue[0].speaker, "elder");
    }
}
