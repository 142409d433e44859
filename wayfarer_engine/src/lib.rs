#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub const WAYFARER_VERSION: &str = env!("CARGO_PKG_VERSION");

// Core modules
pub mod condition;
pub mod dialogue;
pub mod event;
pub mod loader;
pub mod milestone;
pub mod quest;
pub mod save;

// Re-exports for convenience
pub use condition::{ConditionState, is_met};
pub use dialogue::DialogueGraph;
pub use event::{CollectingSink, EventSink, NullSink};
pub use loader::load_content;
pub use milestone::MilestoneEngine;
pub use quest::{QuestEngine, QuestState, QuestStatus};
pub use save::{SaveSystem, fingerprint};
