//! Dialogue graph.
//!
//! Lines are indexed by id and by speaker (case-insensitive). When the
//! game asks what an NPC should say, conditioned lines are considered
//! before unconditioned ones (a stable partition, not a numeric
//! priority) and the first line whose condition holds wins.

use std::collections::HashMap;

use log::{info, warn};

use wayfarer_data::DialogueLineDef;

use crate::condition::{ConditionState, is_met};

/// Handler for `type:value` trigger actions attached to dialogue lines.
pub trait DialogueTriggerHandler {
    fn handle(&mut self, kind: &str, value: &str);
}

fn has_condition(line: &DialogueLineDef) -> bool {
    line.condition.as_deref().is_some_and(|c| !c.trim().is_empty())
}

/// Read-only dialogue content plus the single pending auto-advance.
pub struct DialogueGraph {
    lines: HashMap<String, DialogueLineDef>,
    /// Lowercased speaker -> line ids, conditioned lines first.
    by_speaker: HashMap<String, Vec<String>>,
    pending_next: Option<String>,
}

impl DialogueGraph {
    pub fn new(lines: Vec<DialogueLineDef>) -> Self {
        let mut by_speaker: HashMap<String, Vec<String>> = HashMap::new();
        let mut by_id = HashMap::new();
        for line in lines {
            by_speaker
                .entry(line.speaker.to_lowercase())
                .or_default()
                .push(line.id.clone());
            by_id.insert(line.id.clone(), line);
        }
        // stable partition: conditioned lines ahead of unconditioned,
        // source order preserved within each group
        for ids in by_speaker.values_mut() {
            ids.sort_by_key(|id| !by_id.get(id).is_some_and(has_condition));
        }
        info!("dialogue graph built with {} lines", by_id.len());
        Self {
            lines: by_id,
            by_speaker,
            pending_next: None,
        }
    }

    pub fn line(&self, line_id: &str) -> Option<&DialogueLineDef> {
        self.lines.get(line_id)
    }

    /// Pick the line an NPC should speak right now, or None.
    pub fn line_for_speaker(&self, speaker_id: &str, state: &dyn ConditionState) -> Option<&str> {
        let ids = self.by_speaker.get(&speaker_id.to_lowercase())?;
        ids.iter()
            .find(|id| {
                self.lines.get(*id).is_some_and(|line| {
                    line.condition.as_deref().map_or(true, |cond| is_met(cond, state))
                })
            })
            .map(String::as_str)
    }

    /// Play a line: dispatch its trigger clauses to the handler and
    /// queue its follow-up for after dismissal. Unknown ids log and
    /// return None rather than erroring outward.
    pub fn play(&mut self, line_id: &str, triggers: &mut dyn DialogueTriggerHandler) -> Option<&DialogueLineDef> {
        let Some(line) = self.lines.get(line_id) else {
            warn!("dialogue line '{line_id}' not found; play ignored");
            return None;
        };
        // canonical `next` is a list; only the first entry auto-plays
        let next = line.next.first().cloned();
        let trigger = line.trigger.clone();
        self.pending_next = next;

        if let Some(raw) = trigger {
            for clause in raw.split(',') {
                let clause = clause.trim();
                if clause.is_empty() {
                    continue;
                }
                match clause.split_once(':') {
                    Some((kind, value)) => triggers.handle(kind.trim(), value.trim()),
                    None => warn!("dialogue line '{line_id}': malformed trigger clause '{clause}'"),
                }
            }
        }
        self.lines.get(line_id)
    }

    /// Called when the presented line is dismissed. Returns the queued
    /// follow-up line id (single-hop auto-advance), clearing it.
    pub fn dismiss(&mut self) -> Option<String> {
        self.pending_next.take()
    }
}
