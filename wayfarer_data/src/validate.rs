use std::collections::HashSet;
use std::fmt;

use crate::*;

/// Validation error for malformed or missing references in a ContentDef.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DuplicateId { kind: &'static str, id: String },
    MissingReference { kind: &'static str, id: String, context: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateId { kind, id } => {
                write!(f, "duplicate {kind} id '{id}'")
            },
            ValidationError::MissingReference { kind, id, context } => {
                write!(f, "missing {kind} '{id}' ({context})")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate cross-references and basic invariants in a ContentDef.
///
/// ```
/// use wayfarer_data::{ContentDef, DialogueLineDef, validate_content};
///
/// let content = ContentDef {
///     dialogue: vec![DialogueLineDef {
///         id: "greet".into(),
///         speaker: "elder".into(),
///         text: "Welcome back.".into(),
///         condition: None,
///         trigger: None,
///         next: Vec::new(),
///     }],
///     ..ContentDef::default()
/// };
/// assert!(validate_content(&content).is_empty());
/// ```
pub fn validate_content(content: &ContentDef) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut quests = HashSet::new();
    let mut milestones = HashSet::new();
    let mut dialogue = HashSet::new();

    track_ids(
        "quest",
        content.quests.iter().map(|q| q.id.as_str()),
        &mut quests,
        &mut errors,
    );
    track_ids(
        "milestone",
        content.milestones.iter().map(|m| m.id.as_str()),
        &mut milestones,
        &mut errors,
    );
    track_ids(
        "dialogue line",
        content.dialogue.iter().map(|d| d.id.as_str()),
        &mut dialogue,
        &mut errors,
    );

    for quest in &content.quests {
        let mut stages = HashSet::new();
        for stage in &quest.stages {
            if !stages.insert(stage.id.as_str()) {
                errors.push(ValidationError::DuplicateId {
                    kind: "stage",
                    id: format!("{}/{}", quest.id, stage.id),
                });
            }
            let mut tasks = HashSet::new();
            for task in &stage.tasks {
                if !tasks.insert(task.id.as_str()) {
                    errors.push(ValidationError::DuplicateId {
                        kind: "task",
                        id: format!("{}/{}/{}", quest.id, stage.id, task.id),
                    });
                }
            }
        }
        if quest.title.trim().is_empty() {
            errors.push(ValidationError::InvalidValue {
                context: format!("quest '{}' title empty", quest.id),
            });
        }
    }

    for milestone in &content.milestones {
        if milestone.trigger == Some(MilestoneTriggerDef::Unknown) {
            errors.push(ValidationError::InvalidValue {
                context: format!("milestone '{}' trigger type unrecognized", milestone.id),
            });
        }
    }

    for line in &content.dialogue {
        if line.speaker.trim().is_empty() {
            errors.push(ValidationError::InvalidValue {
                context: format!("dialogue line '{}' speaker empty", line.id),
            });
        }
        for next in &line.next {
            check_ref(
                "dialogue line",
                next,
                &dialogue,
                format!("dialogue line '{}' next", line.id),
                &mut errors,
            );
        }
    }

    errors
}

/// Record each id in `seen`, flagging duplicates.
fn track_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
    seen: &mut HashSet<&'a str>,
    errors: &mut Vec<ValidationError>,
) {
    for id in ids {
        if !seen.insert(id) {
            errors.push(ValidationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
}

/// Flag a reference to an id that was never defined.
fn check_ref(
    kind: &'static str,
    id: &str,
    defined: &HashSet<&str>,
    context: String,
    errors: &mut Vec<ValidationError>,
) {
    if !defined.contains(id) {
        errors.push(ValidationError::MissingReference {
            kind,
            id: id.to_string(),
            context,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, next: Vec<Id>) -> DialogueLineDef {
        DialogueLineDef {
            id: id.into(),
            speaker: "npc".into(),
            text: "...".into(),
            condition: None,
            trigger: None,
            next,
        }
    }

    #[test]
    fn duplicate_quest_ids_are_reported() {
        let content = ContentDef {
            quests: vec![QuestDef::placeholder("q1"), QuestDef::placeholder("q1")],
            ..ContentDef::default()
        };
        let errors = validate_content(&content);
        assert!(errors.contains(&ValidationError::DuplicateId {
            kind: "quest",
            id: "q1".into()
        }));
    }

    #[test]
    fn dangling_dialogue_next_is_reported() {
        let content = ContentDef {
            dialogue: vec![line("a", vec!["missing".into()])],
            ..ContentDef::default()
        };
        let errors = validate_content(&content);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::MissingReference { kind: "dialogue line", id, .. } if id == "missing"
        ));
    }

    #[test]
    fn valid_next_chain_passes() {
        let content = ContentDef {
            dialogue: vec![line("a", vec!["b".into()]), line("b", Vec::new())],
            ..ContentDef::default()
        };
        assert!(validate_content(&content).is_empty());
    }

    #[test]
    fn unknown_milestone_trigger_is_reported() {
        let milestone: MilestoneDef = serde_json::from_str(
            r#"{"id":"m","name":"M","trigger":{"type":"nope"}}"#,
        )
        .unwrap();
        let content = ContentDef {
            milestones: vec![milestone],
            ..ContentDef::default()
        };
        let errors = validate_content(&content);
        assert!(matches!(&errors[0], ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn duplicate_stage_and_task_ids_are_reported() {
        let mut quest = QuestDef::placeholder("q1");
        quest.title = "Quest".into();
        quest.stages = vec![
            StageDef {
                id: "s1".into(),
                title: "One".into(),
                description: String::new(),
                tasks: vec![
                    TaskDef {
                        id: "t1".into(),
                        text: "do".into(),
                        tutorial_id: None,
                    },
                    TaskDef {
                        id: "t1".into(),
                        text: "redo".into(),
                        tutorial_id: None,
                    },
                ],
            },
            StageDef {
                id: "s1".into(),
                title: "Again".into(),
                description: String::new(),
                tasks: Vec::new(),
            },
        ];
        let content = ContentDef {
            quests: vec![quest],
            ..ContentDef::default()
        };
        let errors = validate_content(&content);
        assert_eq!(errors.len(), 2);
    }
}
