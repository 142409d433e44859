//! Milestone engine.
//!
//! Milestones are one-time world-state flags completed by gameplay
//! triggers (battle, event, or quest completion). Completion is
//! monotonic: once in the completed set a milestone never leaves it and
//! its unlock effects never re-run.

use std::collections::{HashMap, HashSet};

use log::{info, warn};
use serde_json::json;

use wayfarer_data::{MilestoneDef, MilestoneTriggerDef};

use crate::event::{EventSink, emit_quiet};

/// Capability for applying milestone unlock effects to the game world.
pub trait WorldEffects {
    /// Ids of the current party members.
    fn party_member_ids(&self) -> Vec<String>;
    /// Grant an ability to one party member.
    fn grant_ability(&mut self, member_id: &str, ability_id: &str);
    /// Clear an area's locked flag.
    fn unlock_area(&mut self, area_id: &str);
}

/// Ability ids are bound to their owner by a character-id prefix
/// (e.g. `mira_fireball` belongs to `mira`). Existing content depends
/// on this convention; it lives here so it can later be swapped for an
/// explicit per-character ability list.
pub fn ability_belongs_to(member_id: &str, ability_id: &str) -> bool {
    ability_id.starts_with(member_id)
}

/// Milestone definitions plus the monotonic completed set.
pub struct MilestoneEngine {
    milestones: HashMap<String, MilestoneDef>,
    completed: HashSet<String>,
    sink: Box<dyn EventSink>,
}

impl MilestoneEngine {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            milestones: HashMap::new(),
            completed: HashSet::new(),
            sink,
        }
    }

    /// Upsert milestone definitions by id.
    pub fn register_definitions(&mut self, defs: impl IntoIterator<Item = MilestoneDef>) {
        let mut count = 0usize;
        for def in defs {
            self.milestones.insert(def.id.clone(), def);
            count += 1;
        }
        info!(
            "{count} milestone definitions registered ({} total)",
            self.milestones.len()
        );
    }

    pub fn is_complete(&self, milestone_id: &str) -> bool {
        self.completed.contains(milestone_id)
    }

    pub fn completed(&self) -> &HashSet<String> {
        &self.completed
    }

    /// Restore the completed set from persisted state.
    pub fn load_completed(&mut self, completed: impl IntoIterator<Item = String>) {
        self.completed = completed.into_iter().collect();
        info!("{} completed milestones restored", self.completed.len());
    }

    /// React to a battle ending.
    pub fn on_battle_end(&mut self, battle_id: &str, world: &mut dyn WorldEffects) {
        self.check_triggers(world, |trigger| {
            matches!(trigger, MilestoneTriggerDef::Battle { battle_id: id } if id == battle_id)
        });
    }

    /// React to a scripted event completing.
    pub fn on_event_complete(&mut self, event_id: &str, world: &mut dyn WorldEffects) {
        self.check_triggers(world, |trigger| {
            matches!(trigger, MilestoneTriggerDef::Event { event_id: id } if id == event_id)
        });
    }

    /// React to a quest completing.
    pub fn on_quest_complete(&mut self, quest_id: &str, world: &mut dyn WorldEffects) {
        self.check_triggers(world, |trigger| {
            matches!(trigger, MilestoneTriggerDef::Quest { quest_id: id } if id == quest_id)
        });
    }

    /// Unlock every not-yet-completed milestone whose trigger matches.
    /// Milestones without a trigger are inert here.
    fn check_triggers(&mut self, world: &mut dyn WorldEffects, matches: impl Fn(&MilestoneTriggerDef) -> bool) {
        let due: Vec<String> = self
            .milestones
            .values()
            .filter(|def| !self.completed.contains(&def.id))
            .filter(|def| def.trigger.as_ref().is_some_and(&matches))
            .map(|def| def.id.clone())
            .collect();
        for id in due {
            self.unlock(&id, world);
        }
    }

    /// Complete a milestone and apply its effects, in order: record
    /// completion, grant abilities, unlock areas, emit narration.
    /// Idempotent; unknown ids warn and do nothing.
    pub fn unlock(&mut self, milestone_id: &str, world: &mut dyn WorldEffects) {
        if self.completed.contains(milestone_id) {
            return;
        }
        let Some(def) = self.milestones.get(milestone_id).cloned() else {
            warn!("milestone '{milestone_id}' not found; unlock ignored");
            return;
        };
        self.completed.insert(milestone_id.to_string());

        let members = world.party_member_ids();
        for ability in &def.effects.unlock_abilities {
            for member in &members {
                if ability_belongs_to(member, ability) {
                    world.grant_ability(member, ability);
                }
            }
        }
        for area in &def.effects.unlock_areas {
            world.unlock_area(area);
        }

        info!("milestone '{milestone_id}' completed");
        emit_quiet(
            self.sink.as_mut(),
            "milestone_unlocked",
            json!({ "milestone_id": milestone_id, "name": def.name }),
        );
    }
}
