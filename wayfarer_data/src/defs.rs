use serde::{Deserialize, Deserializer, Serialize};

/// Stable identifier used across content references.
pub type Id = String;

/// The full authored content set loaded by the engine at startup.
///
/// Each field corresponds to one content file (`quests.json`,
/// `milestones.json`, `dialogue.json`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContentDef {
    #[serde(default)]
    pub quests: Vec<QuestDef>,
    #[serde(default)]
    pub milestones: Vec<MilestoneDef>,
    #[serde(default)]
    pub dialogue: Vec<DialogueLineDef>,
}

/// Immutable quest template. Live quest state is instantiated from this
/// by the engine; the definition itself is never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestDef {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flavor: String,
    pub giver: Option<Id>,
    pub hub_id: Option<Id>,
    pub node_id: Option<Id>,
    /// Reward descriptors are opaque to the engine and passed through
    /// verbatim in the `quest_completed` event payload.
    #[serde(default)]
    pub rewards: Vec<serde_json::Value>,
    #[serde(default)]
    pub stages: Vec<StageDef>,
}

impl QuestDef {
    /// Minimal placeholder for quests referenced before registration.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: id.to_string(),
            summary: String::new(),
            description: String::new(),
            flavor: String::new(),
            giver: None,
            hub_id: None,
            node_id: None,
            rewards: Vec::new(),
            stages: Vec::new(),
        }
    }
}

/// Ordered step within a quest definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

/// Checklist item within a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    pub id: Id,
    pub text: String,
    pub tutorial_id: Option<Id>,
}

/// One-time world-state flag with unlock side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneDef {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Milestones without a trigger are inert and only complete via
    /// explicit unlock calls.
    pub trigger: Option<MilestoneTriggerDef>,
    #[serde(default)]
    pub effects: MilestoneEffectsDef,
}

/// Gameplay event that completes a milestone.
///
/// Unknown tags decode to `Unknown` (inert) rather than failing the
/// whole content file; `validate_content` reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MilestoneTriggerDef {
    Battle { battle_id: Id },
    Event { event_id: Id },
    Quest { quest_id: Id },
    #[serde(other)]
    Unknown,
}

/// Unlocks applied when a milestone completes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MilestoneEffectsDef {
    #[serde(default)]
    pub unlock_abilities: Vec<Id>,
    #[serde(default)]
    pub unlock_areas: Vec<Id>,
}

/// A single authored dialogue line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueLineDef {
    pub id: Id,
    /// NPC id; matched case-insensitively at runtime.
    pub speaker: Id,
    pub text: String,
    /// Comma-separated `type:value` predicate clauses, all of which
    /// must hold for the line to be offered. Absent = always eligible.
    pub condition: Option<String>,
    /// Comma-separated `type:value` actions dispatched when the line
    /// is played.
    pub trigger: Option<String>,
    /// Follow-up line ids. Authored content uses both a bare string
    /// and a list; both decode to a list here. The runtime follows
    /// only the first entry.
    #[serde(default, deserialize_with = "string_or_list")]
    pub next: Vec<Id>,
}

/// Accept either `"next": "line_2"` or `"next": ["line_2", "line_3"]`.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<Id>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Id),
        Many(Vec<Id>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(id)) => vec![id],
        Some(OneOrMany::Many(ids)) => ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialogue_next_accepts_string_or_list() {
        let single: DialogueLineDef =
            serde_json::from_str(r#"{"id":"a","speaker":"npc","text":"hi","next":"b"}"#).unwrap();
        assert_eq!(single.next, vec!["b".to_string()]);

        let many: DialogueLineDef =
            serde_json::from_str(r#"{"id":"a","speaker":"npc","text":"hi","next":["b","c"]}"#).unwrap();
        assert_eq!(many.next, vec!["b".to_string(), "c".to_string()]);

        let absent: DialogueLineDef =
            serde_json::from_str(r#"{"id":"a","speaker":"npc","text":"hi"}"#).unwrap();
        assert!(absent.next.is_empty());
    }

    #[test]
    fn milestone_trigger_decodes_tagged_variants() {
        let def: MilestoneDef = serde_json::from_str(
            r#"{"id":"m1","name":"First Blood","trigger":{"type":"battle","battle_id":"b1"}}"#,
        )
        .unwrap();
        assert_eq!(
            def.trigger,
            Some(MilestoneTriggerDef::Battle {
                battle_id: "b1".into()
            })
        );
        assert!(def.effects.unlock_abilities.is_empty());
    }

    #[test]
    fn milestone_trigger_unknown_tag_is_inert_not_fatal() {
        let def: MilestoneDef = serde_json::from_str(
            r#"{"id":"m1","name":"Odd","trigger":{"type":"weather","weather_id":"storm"}}"#,
        )
        .unwrap();
        assert_eq!(def.trigger, Some(MilestoneTriggerDef::Unknown));
    }

    #[test]
    fn quest_def_defaults_optional_fields() {
        let def: QuestDef = serde_json::from_str(r#"{"id":"q1","title":"Quest One"}"#).unwrap();
        assert!(def.stages.is_empty());
        assert!(def.rewards.is_empty());
        assert!(def.giver.is_none());
    }
}
