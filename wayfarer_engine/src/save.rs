//! Save fingerprinting and save-file management.
//!
//! The fingerprint is a deterministic hash over the gameplay-relevant
//! projection of a save payload; the autosave path uses it to skip
//! writes that would not change anything meaningful. Every write first
//! rotates the existing file into a timestamped `.bak` sibling, pruned
//! to the three most recent per target.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::macros::format_description;

pub const AUTOSAVE_FILE: &str = "autosave.json";
pub const QUICKSAVE_FILE: &str = "quicksave.json";
/// Backups retained per save file.
pub const BACKUP_KEEP: usize = 3;
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(60);

/// Compute the deterministic content fingerprint of a save payload.
///
/// Tokens are gathered in a fixed order with explicit sorts wherever
/// the payload uses unordered maps, so two payloads equal in covered
/// content hash identically regardless of key insertion order. Missing
/// or null fields stringify as `None` rather than failing.
pub fn fingerprint(payload: &Value) -> String {
    let mut tokens: Vec<String> = Vec::new();

    let map = &payload["game_state"]["map"];
    for key in [
        "current_world_id",
        "current_hub_id",
        "current_node_id",
        "current_room_id",
    ] {
        tokens.push(stringify(&map[key]));
    }

    let mut items: Vec<(&String, &Value)> = payload["game_state"]["inventory"]
        .as_object()
        .map(|obj| obj.iter().collect())
        .unwrap_or_default();
    items.sort_by(|a, b| a.0.cmp(b.0));
    for (name, qty) in items {
        tokens.push(format!("I:{name}:{}", stringify(qty)));
    }

    let mut characters: Vec<(&String, &Value)> = payload["characters"]
        .as_object()
        .map(|obj| obj.iter().collect())
        .unwrap_or_default();
    characters.sort_by(|a, b| a.0.cmp(b.0));
    for (id, character) in characters {
        tokens.push(format!(
            "C:{id}:{}:{}",
            stringify(&character["level"]),
            stringify(&character["hp"])
        ));
    }

    let mut quests: Vec<&Value> = payload["game_state"]["quests"]["quests"]
        .as_array()
        .map(|list| list.iter().collect())
        .unwrap_or_default();
    quests.sort_by(|a, b| {
        a["id"]
            .as_str()
            .unwrap_or_default()
            .cmp(b["id"].as_str().unwrap_or_default())
    });
    for quest in quests {
        tokens.push(format!(
            "Q:{}:{}:{}",
            stringify(&quest["id"]),
            stringify(&quest["status"]),
            stringify(&quest["stage_index"])
        ));
    }

    for scope in ["worlds", "hubs", "nodes"] {
        let mut routes: Vec<(&String, &Value)> = payload["game_state"]["routes"][scope]
            .as_object()
            .map(|obj| obj.iter().collect())
            .unwrap_or_default();
        routes.sort_by(|a, b| a.0.cmp(b.0));
        for (id, discovered) in routes {
            let bit = if discovered.as_bool().unwrap_or(false) { 1 } else { 0 };
            tokens.push(format!("R:{scope}:{id}:{bit}"));
        }
    }

    hex::encode(Sha256::digest(tokens.join("|").as_bytes()))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Parse status of a discovered save file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveFileStatus {
    Ready,
    Corrupted { message: String },
}

/// One save file found in the save directory.
#[derive(Debug, Clone)]
pub struct SaveFileEntry {
    pub slot: String,
    pub path: PathBuf,
    pub file_name: String,
    pub modified: Option<SystemTime>,
    pub status: SaveFileStatus,
}

/// Slot/autosave/quicksave file management with backup rotation and
/// fingerprint-throttled autosaves.
pub struct SaveSystem {
    save_dir: PathBuf,
    min_autosave_interval: Duration,
    last_autosave: Option<SystemTime>,
    last_fingerprint: Option<String>,
}

impl SaveSystem {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            min_autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            last_autosave: None,
            last_fingerprint: None,
        }
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.min_autosave_interval = interval;
        self
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Write a numbered slot save.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn save_slot(&mut self, slot: u32, payload: &Value) -> Result<PathBuf> {
        self.write_save(&format!("save{slot}.json"), payload)
    }

    /// Write the quicksave file.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn quicksave(&mut self, payload: &Value) -> Result<PathBuf> {
        self.write_save(QUICKSAVE_FILE, payload)
    }

    /// Write the autosave file, subject to the dual throttle gate: the
    /// write is skipped only when the minimum interval has not elapsed
    /// AND the fingerprint is unchanged. A meaningful state change
    /// always writes immediately; identical state waits out the timer.
    ///
    /// Returns `None` when no write occurred.
    ///
    /// # Errors
    /// Returns an error if the write itself fails; in-memory throttle
    /// state is only updated after a successful write.
    pub fn autosave(&mut self, payload: &Value, throttle: bool) -> Result<Option<PathBuf>> {
        let digest = fingerprint(payload);
        if throttle {
            let elapsed = self
                .last_autosave
                .map_or(true, |at| at.elapsed().map_or(true, |e| e >= self.min_autosave_interval));
            let changed = self.last_fingerprint.as_deref() != Some(digest.as_str());
            if !elapsed && !changed {
                return Ok(None);
            }
        }
        let path = self.write_save(AUTOSAVE_FILE, payload)?;
        self.last_autosave = Some(SystemTime::now());
        self.last_fingerprint = Some(digest);
        Ok(Some(path))
    }

    fn write_save(&self, file_name: &str, payload: &Value) -> Result<PathBuf> {
        fs::create_dir_all(&self.save_dir)
            .with_context(|| format!("creating save directory {}", self.save_dir.display()))?;
        let path = self.save_dir.join(file_name);
        rotate_backups(&path)?;
        let raw = serde_json::to_string_pretty(payload).context("serializing save payload")?;
        fs::write(&path, raw).with_context(|| format!("writing save file {}", path.display()))?;
        info!("wrote save file {}", path.display());
        Ok(path)
    }

    /// Enumerate save files (not backups) in the save directory, most
    /// recently modified first. Unreadable or unparseable files are
    /// reported as corrupted rather than skipped or fatal.
    ///
    /// # Errors
    /// Returns an error if the directory contents cannot be read.
    pub fn list_saves(&self) -> Result<Vec<SaveFileEntry>> {
        if !self.save_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in
            fs::read_dir(&self.save_dir).with_context(|| format!("reading {}", self.save_dir.display()))?
        {
            let entry = entry.with_context(|| format!("enumerating {}", self.save_dir.display()))?;
            if let Some(found) = entry_from_path(&entry) {
                entries.push(found);
            }
        }
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then(a.slot.cmp(&b.slot)));
        Ok(entries)
    }
}

/// Load and parse a save payload from disk.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_save_file(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading save file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing save file {}", path.display()))
}

fn entry_from_path(entry: &fs::DirEntry) -> Option<SaveFileEntry> {
    let path = entry.path();
    if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return None;
    }
    let file_name = path.file_name().and_then(|name| name.to_str())?.to_string();
    let slot = path.file_stem().and_then(|stem| stem.to_str())?.to_string();
    let modified = entry.metadata().ok().and_then(|meta| meta.modified().ok());
    let status = match load_save_file(&path) {
        Ok(_) => SaveFileStatus::Ready,
        Err(err) => {
            warn!("save file '{slot}' unreadable ({}): {err:#}", path.display());
            SaveFileStatus::Corrupted {
                message: format!("{err:#}"),
            }
        },
    };
    Some(SaveFileEntry {
        slot,
        path,
        file_name,
        modified,
        status,
    })
}

/// Copy an existing save aside as `<stem>.<timestamp>.bak`, then prune
/// old backups down to [`BACKUP_KEEP`].
fn rotate_backups(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Ok(());
    }
    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
        return Ok(());
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let backup = dir.join(format!("{stem}.{}.bak", backup_timestamp()));
    fs::copy(path, &backup).with_context(|| format!("backing up {}", path.display()))?;
    prune_backups(dir, stem)
}

fn prune_backups(dir: &Path, stem: &str) -> Result<()> {
    let prefix = format!("{stem}.");
    let mut backups: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".bak"))
        })
        .collect();
    // fixed-width timestamps sort chronologically
    backups.sort();
    while backups.len() > BACKUP_KEEP {
        let oldest = backups.remove(0);
        if let Err(err) = fs::remove_file(&oldest) {
            warn!("failed to prune backup {}: {err}", oldest.display());
        }
    }
    Ok(())
}

fn backup_timestamp() -> String {
    let format = format_description!("[year][month][day]T[hour][minute][second]-[subsecond digits:6]");
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_else(|_| "00000000T000000-000000".to_string())
}
