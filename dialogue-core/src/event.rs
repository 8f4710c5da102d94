//! Event definitions, validation, and allow-listing (§4.1).

use crate::errors::{DialogueError, DialogueResult};
use serde::{Deserialize, Serialize};

/// Internal sentinel for "all events"/"all rooms". Exposed as `"*"` on the
/// wire (DESIGN NOTES §9) but kept as a named constant internally so a
/// collision with a real event name is never silent.
pub const WILDCARD: &str = "*";

/// A single field-level validation failure, joined into the human-readable
/// message `validate_event_data` produces on rejection.
#[derive(Debug, Clone)]
pub struct FieldIssue {
    pub path: String,
    pub issue: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            issue: issue.into(),
        }
    }
}

/// The `Validator<T>` capability spec.md §1 treats as an external
/// collaborator: given an arbitrary JSON value, either coerce it into a
/// validated value or report the failures that blocked coercion.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &serde_json::Value) -> Result<serde_json::Value, Vec<FieldIssue>>;
}

/// History retention policy attached to an `EventDefinition`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryPolicy {
    pub enabled: bool,
    pub limit: usize,
}

impl HistoryPolicy {
    pub fn new(limit: usize) -> Self {
        Self {
            enabled: true,
            limit: limit.max(1),
        }
    }
}

/// Immutable descriptor for one event type, frozen after `define_event`.
#[derive(Clone)]
pub struct EventDefinition {
    name: String,
    validator: Option<std::sync::Arc<dyn Validator>>,
    history: Option<HistoryPolicy>,
}

impl std::fmt::Debug for EventDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDefinition")
            .field("name", &self.name)
            .field("has_validator", &self.validator.is_some())
            .field("history", &self.history)
            .finish()
    }
}

/// Options accepted by `define_event`.
#[derive(Default)]
pub struct EventDefinitionOpts {
    pub validator: Option<std::sync::Arc<dyn Validator>>,
    pub history: Option<HistoryPolicy>,
}

impl EventDefinition {
    /// `defineEvent(name, opts?) -> EventDefinition`.
    pub fn new(name: impl Into<String>, opts: EventDefinitionOpts) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "event name must not be empty");
        Self {
            name,
            validator: opts.validator,
            history: opts.history,
        }
    }

    /// A bare definition with no validator and no history, synthesized by
    /// the dispatcher when a room has a non-empty allow-list that already
    /// contains the event name (§4.8, `trigger` inbound handling).
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, EventDefinitionOpts::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> Option<HistoryPolicy> {
        self.history
    }
}

/// `validateEventData(def, value)`.
pub fn validate_event_data(
    def: &EventDefinition,
    value: serde_json::Value,
) -> DialogueResult<serde_json::Value> {
    match &def.validator {
        None => Ok(value),
        Some(validator) => validator.validate(&value).map_err(|issues| {
            let joined = issues
                .iter()
                .map(|i| format!("{}: {}", i.path, i.issue))
                .collect::<Vec<_>>()
                .join(", ");
            DialogueError::ValidationFailure(format!(
                "Event '{}' validation failed: {}",
                def.name, joined
            ))
        }),
    }
}

/// `isEventAllowed(name, list)` — true when the allow-list is empty, or
/// contains an entry by that name, or contains the wildcard entry.
pub fn is_event_allowed(name: &str, list: &[EventDefinition]) -> bool {
    list.is_empty()
        || list
            .iter()
            .any(|def| def.name() == name || def.name() == WILDCARD)
}
