//! Predicate-string evaluation for dialogue and content gating.
//!
//! Conditions are comma-separated `type:value` clauses, all of which
//! must hold (AND only, no nesting). Evaluation is fail-closed: an
//! unrecognized clause type or a failed lookup hides the gated content
//! rather than crashing or showing it.

use log::debug;

use crate::quest::QuestStatus;

/// Read-only world lookups needed to evaluate condition clauses.
///
/// The quest lookup is an explicit capability rather than a duck-typed
/// map so broken providers cannot silently change clause semantics.
pub trait ConditionState {
    /// Current status of a quest, if it has ever been instantiated.
    fn quest_status(&self, quest_id: &str) -> Option<QuestStatus>;
    /// Whether a milestone is in the completed set.
    fn milestone_complete(&self, milestone_id: &str) -> bool;
    /// Whether the named item is present in the inventory.
    fn has_item(&self, item_name: &str) -> bool;
}

/// One parsed `type:value` clause.
///
/// The value is everything after the first colon, preserved verbatim
/// (so values may themselves contain colons).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `quest:<id>` — true while the quest is active or complete.
    QuestUnderway(String),
    /// `milestone:<id>` — true once the milestone is completed.
    MilestoneSet(String),
    /// `milestone_not_set:<id>` — true until the milestone completes.
    MilestoneNotSet(String),
    /// `item:<name>` — true while the item is in the inventory.
    HasItem(String),
    /// Anything else; always evaluates false.
    Unknown(String),
}

impl Clause {
    /// Parse a single trimmed clause.
    pub fn parse(raw: &str) -> Clause {
        match raw.split_once(':') {
            Some(("quest", value)) => Clause::QuestUnderway(value.to_string()),
            Some(("milestone", value)) => Clause::MilestoneSet(value.to_string()),
            Some(("milestone_not_set", value)) => Clause::MilestoneNotSet(value.to_string()),
            Some(("item", value)) => Clause::HasItem(value.to_string()),
            _ => Clause::Unknown(raw.to_string()),
        }
    }

    /// Evaluate this clause against the supplied state. Fail-closed.
    pub fn holds(&self, state: &dyn ConditionState) -> bool {
        match self {
            Clause::QuestUnderway(id) => matches!(
                state.quest_status(id),
                Some(QuestStatus::Active | QuestStatus::Complete)
            ),
            Clause::MilestoneSet(id) => state.milestone_complete(id),
            Clause::MilestoneNotSet(id) => !state.milestone_complete(id),
            Clause::HasItem(name) => state.has_item(name),
            Clause::Unknown(raw) => {
                debug!("unrecognized condition clause '{raw}' evaluates false");
                false
            },
        }
    }
}

/// Split a condition string into parsed clauses, ignoring empty pieces.
pub fn parse_condition(condition: &str) -> Vec<Clause> {
    condition
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(Clause::parse)
        .collect()
}

/// Evaluate a full condition string. Empty or blank conditions are
/// always true; otherwise every clause must hold.
pub fn is_met(condition: &str, state: &dyn ConditionState) -> bool {
    if condition.trim().is_empty() {
        return true;
    }
    parse_condition(condition).iter().all(|clause| clause.holds(state))
}

/// Ready-made [`ConditionState`] over the two engines plus the caller's
/// inventory map. The game loop borrows its engines into this for the
/// duration of a dialogue query.
pub struct WorldConditionState<'a> {
    pub quests: &'a crate::quest::QuestEngine,
    pub milestones: &'a crate::milestone::MilestoneEngine,
    pub inventory: &'a std::collections::HashMap<String, i64>,
}

impl ConditionState for WorldConditionState<'_> {
    fn quest_status(&self, quest_id: &str) -> Option<QuestStatus> {
        self.quests.status_of(quest_id)
    }

    fn milestone_complete(&self, milestone_id: &str) -> bool {
        self.milestones.is_complete(milestone_id)
    }

    fn has_item(&self, item_name: &str) -> bool {
        self.inventory.contains_key(item_name)
    }
}
