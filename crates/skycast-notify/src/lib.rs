//! Weather notifications for SkyCast
//!
//! Per-location rules (one-shot, daily, weekly or forecast-conditional)
//! are evaluated against the latest forecast and turned into triggers on a
//! local notification center. Each location owns a primary slot, seven
//! weekday slots and independent today/tomorrow one-shots. Favorite
//! cities are persisted alongside the rules.

pub mod center;
pub mod content;
pub mod evaluator;
pub mod favorites;
pub mod orchestrator;
pub mod rule;
pub mod scheduler;
pub mod store;
pub mod trigger;

pub use center::{
    AuthorizationStatus, CenterError, InMemoryNotificationCenter, NotificationCenter,
    NotificationRequest,
};
pub use content::NotificationContent;
pub use evaluator::{evaluate, Evaluation, TriggerPlan};
pub use favorites::{Favorites, FavoritesStore, JsonFileFavoritesStore, MemoryFavoritesStore};
pub use orchestrator::{ApplyOutcome, NotificationOrchestrator, NotifyError};
pub use rule::{DaySlot, NotificationRule, RuleError, RuleKind};
pub use scheduler::{system_clock, Clock, TriggerScheduler};
pub use store::{JsonFileRuleStore, MemoryRuleStore, RuleStore};
pub use trigger::{FireSpec, ScheduledTrigger, Slot};
