use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Accumulator for a policy record under construction, keyed by field name.
/// String fields are stored as JSON strings, amounts as JSON numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDraft(Map<String, Value>);

impl PolicyDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Per-session state of the guided creation flow.
///
/// Fields are private so the idle invariant holds by construction: when no
/// flow is active the step index is 0 and the draft is empty. The whole value
/// is replaced through these methods per turn, never mutated field by field
/// from outside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    creating: bool,
    step_index: usize,
    draft: PolicyDraft,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_creating(&self) -> bool {
        self.creating
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn draft(&self) -> &PolicyDraft {
        &self.draft
    }

    /// Enter the guided flow at step 0 with a fresh draft.
    pub fn begin(&mut self) {
        self.creating = true;
        self.step_index = 0;
        self.draft = PolicyDraft::new();
    }

    /// Leave the guided flow, discarding any partial draft.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn store(&mut self, key: &str, value: Value) {
        self.draft.insert(key, value);
        self.step_index += 1;
    }

    /// Take the completed draft and return to idle.
    pub(crate) fn finish(&mut self) -> PolicyDraft {
        let draft = std::mem::take(&mut self.draft);
        self.reset();
        draft
    }
}
