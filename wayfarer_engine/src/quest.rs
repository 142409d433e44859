//! Quest state machine.
//!
//! Quest definitions are immutable templates registered up front; live
//! [`QuestState`] instances are created lazily the first time gameplay
//! touches a quest. Statuses move `inactive -> active -> {complete,
//! failed}`; the terminal states are absorbing. Every transition emits
//! a named event through the injected [`EventSink`] after the state has
//! already been updated, so observers always see consistent state.

use std::collections::HashMap;
use std::fmt::Display;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use wayfarer_data::QuestDef;

use crate::event::{EventSink, emit_quiet};

/// Retained log entries per quest; oldest dropped first.
pub const QUEST_LOG_CAP: usize = 100;

/// Lifecycle status of a live quest.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    Inactive,
    Active,
    Complete,
    Failed,
}

impl QuestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, QuestStatus::Complete | QuestStatus::Failed)
    }
}

impl Display for QuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestStatus::Inactive => write!(f, "inactive"),
            QuestStatus::Active => write!(f, "active"),
            QuestStatus::Complete => write!(f, "complete"),
            QuestStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Checklist item within a stage; only its `done` flag mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestTask {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    pub tutorial_id: Option<String>,
}

/// Ordered step within a quest. The task list is fixed at quest
/// instantiation; never reordered or resized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestStage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<QuestTask>,
}

/// Timestamped audit-trail entry on a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: String,
    pub text: String,
}

/// Live, mutable instance of a quest, owned by the engine's state table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestState {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flavor: String,
    pub giver: Option<String>,
    pub hub_id: Option<String>,
    pub node_id: Option<String>,
    /// Opaque reward descriptors, passed through in `quest_completed`.
    #[serde(default)]
    pub rewards: Vec<serde_json::Value>,
    pub status: QuestStatus,
    pub stage_index: usize,
    #[serde(default)]
    pub stages: Vec<QuestStage>,
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

impl QuestState {
    /// Build a fresh live state from a definition template.
    pub fn from_def(def: &QuestDef) -> Self {
        Self {
            id: def.id.clone(),
            title: def.title.clone(),
            summary: def.summary.clone(),
            description: def.description.clone(),
            flavor: def.flavor.clone(),
            giver: def.giver.clone(),
            hub_id: def.hub_id.clone(),
            node_id: def.node_id.clone(),
            rewards: def.rewards.clone(),
            status: QuestStatus::Inactive,
            stage_index: 0,
            stages: def
                .stages
                .iter()
                .map(|stage| QuestStage {
                    id: stage.id.clone(),
                    title: stage.title.clone(),
                    description: stage.description.clone(),
                    tasks: stage
                        .tasks
                        .iter()
                        .map(|task| QuestTask {
                            id: task.id.clone(),
                            text: task.text.clone(),
                            done: false,
                            tutorial_id: task.tutorial_id.clone(),
                        })
                        .collect(),
                })
                .collect(),
            log: Vec::new(),
        }
    }

    /// The stage the quest is currently on, if any stages exist.
    pub fn current_stage(&self) -> Option<&QuestStage> {
        self.stages.get(self.stage_index)
    }

    fn append_log(&mut self, text: String) {
        self.log.push(LogEntry {
            at: timestamp(),
            text,
        });
        if self.log.len() > QUEST_LOG_CAP {
            let excess = self.log.len() - QUEST_LOG_CAP;
            self.log.drain(..excess);
        }
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Serialized form of the full engine state, sufficient for exact
/// round-trip restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestSnapshot {
    pub tracked: Option<String>,
    #[serde(default)]
    pub quests: Vec<QuestState>,
}

/// Quest progression engine: definition registry plus live-state table.
pub struct QuestEngine {
    defs: HashMap<String, QuestDef>,
    live: HashMap<String, QuestState>,
    tracked: Option<String>,
    sink: Box<dyn EventSink>,
}

impl QuestEngine {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            defs: HashMap::new(),
            live: HashMap::new(),
            tracked: None,
            sink,
        }
    }

    /// Upsert definition templates by id. Safe to call repeatedly for
    /// hot-reload; already-instantiated live states are unaffected.
    pub fn register_definitions(&mut self, defs: impl IntoIterator<Item = QuestDef>) {
        let mut count = 0usize;
        for def in defs {
            self.defs.insert(def.id.clone(), def);
            count += 1;
        }
        info!("{count} quest definitions registered ({} total)", self.defs.len());
    }

    /// Return the live state for a quest, instantiating it from the
    /// registered definition (or a placeholder) on first reference.
    pub fn ensure(&mut self, quest_id: &str) -> &mut QuestState {
        let defs = &self.defs;
        self.live
            .entry(quest_id.to_string())
            .or_insert_with(|| match defs.get(quest_id) {
                Some(def) => QuestState::from_def(def),
                None => {
                    warn!("quest '{quest_id}' has no registered definition; using placeholder");
                    QuestState::from_def(&QuestDef::placeholder(quest_id))
                },
            })
    }

    /// Activate a quest. No-op unless the quest is still inactive:
    /// a finished quest is never resurrected and an active one never
    /// restarted.
    pub fn start(&mut self, quest_id: &str) {
        let state = self.ensure(quest_id);
        if state.status != QuestStatus::Inactive {
            return;
        }
        state.status = QuestStatus::Active;
        let title = state.title.clone();
        state.append_log(format!("Quest started: {title}"));
        info!("quest '{quest_id}' started");
        emit_quiet(
            self.sink.as_mut(),
            "quest_started",
            json!({ "quest_id": quest_id, "title": title }),
        );
    }

    /// Jump to the stage with the given id. Unknown stage ids are a
    /// silent no-op; authoring errors must not halt the game.
    pub fn set_stage(&mut self, quest_id: &str, stage_id: &str) {
        let state = self.ensure(quest_id);
        let Some(pos) = state.stages.iter().position(|stage| stage.id == stage_id) else {
            return;
        };
        state.stage_index = pos;
        let title = state.stages[pos].title.clone();
        state.append_log(format!("Stage: {title}"));
        emit_quiet(
            self.sink.as_mut(),
            "quest_stage_changed",
            json!({ "quest_id": quest_id, "stage_id": stage_id, "stage_index": pos }),
        );
    }

    /// Advance to the next stage, or complete the quest when the final
    /// stage is exhausted. Stage exhaustion implying completion is the
    /// designed mechanism; there is no separate "finish" call for the
    /// last stage.
    pub fn next_stage(&mut self, quest_id: &str) {
        let state = self.ensure(quest_id);
        if state.stage_index + 1 < state.stages.len() {
            state.stage_index += 1;
            let pos = state.stage_index;
            let (stage_id, title) = {
                let stage = &state.stages[pos];
                (stage.id.clone(), stage.title.clone())
            };
            state.append_log(format!("Stage: {title}"));
            emit_quiet(
                self.sink.as_mut(),
                "quest_stage_changed",
                json!({ "quest_id": quest_id, "stage_id": stage_id, "stage_index": pos }),
            );
        } else {
            self.complete(quest_id);
        }
    }

    /// Flip a task's `done` flag. The task is looked up only within the
    /// current stage; task ids on other stages are invisible here.
    pub fn set_task_done(&mut self, quest_id: &str, task_id: &str, done: bool) {
        let state = self.ensure(quest_id);
        let index = state.stage_index;
        let Some(stage) = state.stages.get_mut(index) else {
            return;
        };
        let Some(task) = stage.tasks.iter_mut().find(|task| task.id == task_id) else {
            return;
        };
        task.done = done;
        let text = task.text.clone();
        state.append_log(if done {
            format!("Task done: {text}")
        } else {
            format!("Task reopened: {text}")
        });
        emit_quiet(
            self.sink.as_mut(),
            "quest_task_updated",
            json!({ "quest_id": quest_id, "task_id": task_id, "done": done }),
        );
    }

    /// Mark a quest complete and emit its rewards payload. Idempotent.
    pub fn complete(&mut self, quest_id: &str) {
        let state = self.ensure(quest_id);
        if state.status == QuestStatus::Complete {
            return;
        }
        state.status = QuestStatus::Complete;
        let title = state.title.clone();
        let rewards = state.rewards.clone();
        state.append_log(format!("Quest complete: {title}"));
        info!("quest '{quest_id}' completed");
        emit_quiet(
            self.sink.as_mut(),
            "quest_completed",
            json!({ "quest_id": quest_id, "title": title, "rewards": rewards }),
        );
    }

    /// Mark a quest failed. Idempotent.
    pub fn fail(&mut self, quest_id: &str) {
        let state = self.ensure(quest_id);
        if state.status == QuestStatus::Failed {
            return;
        }
        state.status = QuestStatus::Failed;
        let title = state.title.clone();
        state.append_log(format!("Quest failed: {title}"));
        info!("quest '{quest_id}' failed");
        emit_quiet(
            self.sink.as_mut(),
            "quest_failed",
            json!({ "quest_id": quest_id, "title": title }),
        );
    }

    /// Pin (or clear) the single HUD-tracked quest. Tracking is
    /// advisory: no validation, always emits, even for unknown ids.
    pub fn set_tracked(&mut self, quest_id: Option<&str>) {
        self.tracked = quest_id.map(str::to_string);
        emit_quiet(
            self.sink.as_mut(),
            "quest_tracked",
            json!({ "quest_id": self.tracked }),
        );
    }

    pub fn tracked(&self) -> Option<&str> {
        self.tracked.as_deref()
    }

    pub fn get(&self, quest_id: &str) -> Option<&QuestState> {
        self.live.get(quest_id)
    }

    /// Live quests with `active` status, ordered by id.
    pub fn list_active(&self) -> Vec<&QuestState> {
        self.list_with_status(QuestStatus::Active)
    }

    /// Live quests with `complete` status, ordered by id.
    pub fn list_completed(&self) -> Vec<&QuestState> {
        self.list_with_status(QuestStatus::Complete)
    }

    fn list_with_status(&self, status: QuestStatus) -> Vec<&QuestState> {
        let mut quests: Vec<&QuestState> = self.live.values().filter(|q| q.status == status).collect();
        quests.sort_by(|a, b| a.id.cmp(&b.id));
        quests
    }

    /// Serialize the tracked id and every live quest state.
    pub fn snapshot(&self) -> QuestSnapshot {
        let mut quests: Vec<QuestState> = self.live.values().cloned().collect();
        quests.sort_by(|a, b| a.id.cmp(&b.id));
        QuestSnapshot {
            tracked: self.tracked.clone(),
            quests,
        }
    }

    /// Restore from a snapshot, replacing (not merging) the entire
    /// live-state table.
    pub fn restore(&mut self, snapshot: QuestSnapshot) {
        self.tracked = snapshot.tracked;
        self.live = snapshot
            .quests
            .into_iter()
            .map(|quest| (quest.id.clone(), quest))
            .collect();
        info!("{} live quests restored from snapshot", self.live.len());
    }

    /// Quest-status lookup capability used by condition evaluation.
    pub fn status_of(&self, quest_id: &str) -> Option<QuestStatus> {
        self.live.get(quest_id).map(|quest| quest.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CollectingSink, NullSink};
    use std::cell::RefCell;
    use std::rc::Rc;
    use wayfarer_data::{StageDef, TaskDef};

    fn two_stage_def(id: &str) -> QuestDef {
        let mut def = QuestDef::placeholder(id);
        def.title = "Embers of the Pass".into();
        def.rewards = vec![json!({"type": "gold", "amount": 50})];
        def.stages = vec![
            StageDef {
                id: "s1".into(),
                title: "Reach the pass".into(),
                description: String::new(),
                tasks: vec![TaskDef {
                    id: "t1".into(),
                    text: "Climb the switchbacks".into(),
                    tutorial_id: None,
                }],
            },
            StageDef {
                id: "s2".into(),
                title: "Light the beacon".into(),
                description: String::new(),
                tasks: vec![TaskDef {
                    id: "t2".into(),
                    text: "Use the flint".into(),
                    tutorial_id: Some("tut_flint".into()),
                }],
            },
        ];
        def
    }

    fn engine_with(def: QuestDef) -> (QuestEngine, Rc<RefCell<CollectingSink>>) {
        let sink = Rc::new(RefCell::new(CollectingSink::default()));
        let mut engine = QuestEngine::new(Box::new(sink.clone()));
        engine.register_definitions([def]);
        (engine, sink)
    }

    #[test]
    fn ensure_instantiates_from_definition() {
        let (mut engine, _) = engine_with(two_stage_def("pass"));
        let state = engine.ensure("pass");
        assert_eq!(state.status, QuestStatus::Inactive);
        assert_eq!(state.stage_index, 0);
        assert_eq!(state.stages.len(), 2);
        assert!(!state.stages[0].tasks[0].done);
    }

    #[test]
    fn ensure_builds_placeholder_for_unregistered_quest() {
        let mut engine = QuestEngine::new(Box::new(NullSink));
        let state = engine.ensure("mystery");
        assert_eq!(state.title, "mystery");
        assert!(state.stages.is_empty());
    }

    #[test]
    fn start_is_not_reentrant_and_never_resurrects() {
        let (mut engine, sink) = engine_with(two_stage_def("pass"));
        engine.start("pass");
        engine.start("pass");
        assert_eq!(sink.borrow().count("quest_started"), 1);

        engine.fail("pass");
        engine.start("pass");
        assert_eq!(engine.get("pass").unwrap().status, QuestStatus::Failed);
        assert_eq!(sink.borrow().count("quest_started"), 1);
    }

    #[test]
    fn set_stage_jumps_by_id_and_ignores_unknown() {
        let (mut engine, sink) = engine_with(two_stage_def("pass"));
        engine.start("pass");
        engine.set_stage("pass", "s2");
        assert_eq!(engine.get("pass").unwrap().stage_index, 1);
        engine.set_stage("pass", "no_such_stage");
        assert_eq!(engine.get("pass").unwrap().stage_index, 1);
        assert_eq!(sink.borrow().count("quest_stage_changed"), 1);
    }

    #[test]
    fn task_update_only_sees_current_stage() {
        let (mut engine, sink) = engine_with(two_stage_def("pass"));
        engine.start("pass");
        // t2 lives on stage 2; the quest is on stage 1
        engine.set_task_done("pass", "t2", true);
        assert!(!engine.get("pass").unwrap().stages[1].tasks[0].done);
        assert_eq!(sink.borrow().count("quest_task_updated"), 0);

        engine.set_task_done("pass", "t1", true);
        assert!(engine.get("pass").unwrap().stages[0].tasks[0].done);
        assert_eq!(sink.borrow().count("quest_task_updated"), 1);
    }

    #[test]
    fn complete_emits_rewards_payload_once() {
        let (mut engine, sink) = engine_with(two_stage_def("pass"));
        engine.start("pass");
        engine.complete("pass");
        engine.complete("pass");
        let sink = sink.borrow();
        assert_eq!(sink.count("quest_completed"), 1);
        let (_, payload) = sink
            .events
            .iter()
            .find(|(name, _)| name == "quest_completed")
            .unwrap();
        assert_eq!(payload["rewards"][0]["type"], "gold");
    }

    #[test]
    fn tracking_is_advisory_and_always_emits() {
        let (mut engine, sink) = engine_with(two_stage_def("pass"));
        engine.set_tracked(Some("completely_unknown"));
        assert_eq!(engine.tracked(), Some("completely_unknown"));
        engine.set_tracked(None);
        assert_eq!(engine.tracked(), None);
        assert_eq!(sink.borrow().count("quest_tracked"), 2);
    }

    #[test]
    fn list_queries_partition_by_status() {
        let (mut engine, _) = engine_with(two_stage_def("pass"));
        engine.register_definitions([two_stage_def("echo")]);
        engine.start("pass");
        engine.start("echo");
        engine.complete("echo");
        let active: Vec<&str> = engine.list_active().iter().map(|q| q.id.as_str()).collect();
        let completed: Vec<&str> = engine.list_completed().iter().map(|q| q.id.as_str()).collect();
        assert_eq!(active, vec!["pass"]);
        assert_eq!(completed, vec!["echo"]);
    }

    #[test]
    fn hot_reload_does_not_touch_live_state() {
        let (mut engine, _) = engine_with(two_stage_def("pass"));
        engine.start("pass");
        let mut updated = two_stage_def("pass");
        updated.title = "Renamed".into();
        engine.register_definitions([updated]);
        assert_eq!(engine.get("pass").unwrap().title, "Embers of the Pass");
        // a fresh quest picks up the new template
        let mut other = QuestEngine::new(Box::new(NullSink));
        other.register_definitions([{
            let mut def = two_stage_def("pass");
            def.title = "Renamed".into();
            def
        }]);
        assert_eq!(other.ensure("pass").title, "Renamed");
    }

    #[test]
    fn quest_log_is_capped() {
        let mut state = QuestState::from_def(&QuestDef::placeholder("q"));
        for n in 0..(QUEST_LOG_CAP + 25) {
            state.append_log(format!("entry {n}"));
        }
        assert_eq!(state.log.len(), QUEST_LOG_CAP);
        assert_eq!(state.log[0].text, "entry 25");
    }

    #[test]
    fn status_of_reports_only_live_quests() {
        let (mut engine, _) = engine_with(two_stage_def("pass"));
        assert_eq!(engine.status_of("pass"), None);
        engine.start("pass");
        assert_eq!(engine.status_of("pass"), Some(QuestStatus::Active));
    }
}
