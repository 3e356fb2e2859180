use serde_json::Value;
use tracing::debug;

use crate::state::{ConversationState, PolicyDraft};

/// Returns an error message when the input is rejected, `None` when it passes.
pub type StepValidator = fn(&str) -> Option<String>;

/// Converts accepted input into the value stored in the draft.
pub type StepTransform = fn(&str) -> Value;

/// One step of the guided creation dialogue. The step table is static and
/// shared by every session; per-session progress lives in
/// [`ConversationState`].
pub struct CreationStep {
    /// Draft field this step fills
    pub key: &'static str,
    /// Question posted to the user when the step becomes current
    pub prompt: &'static str,
    pub validator: Option<StepValidator>,
    pub transform: Option<StepTransform>,
}

/// Outcome of feeding one user message into the active flow
#[derive(Debug, PartialEq)]
pub enum StepOutcome {
    /// Validation failed; the step index did not advance. The caller posts
    /// the error followed by the re-posted prompt.
    Rejected {
        error: String,
        reprompt: &'static str,
    },
    /// Input accepted and stored; the caller posts the next step's prompt.
    Advanced { prompt: &'static str },
    /// The last step was filled. State is already back to idle; the caller
    /// submits the draft.
    Complete { draft: PolicyDraft },
}

/// Drives a [`ConversationState`] through a fixed step table.
pub struct GuidedFlow {
    steps: &'static [CreationStep],
}

impl GuidedFlow {
    pub fn new(steps: &'static [CreationStep]) -> Self {
        Self { steps }
    }

    pub fn first_prompt(&self) -> &'static str {
        self.steps[0].prompt
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Feed one user message into the flow. The input must already be
    /// trimmed and non-empty; blank turns are dropped before reaching here.
    pub fn handle_input(&self, state: &mut ConversationState, input: &str) -> StepOutcome {
        let Some(step) = self.steps.get(state.step_index()) else {
            // only reachable if state was built against a different table
            state.reset();
            return StepOutcome::Rejected {
                error: "Something went wrong with the current step.".to_string(),
                reprompt: self.first_prompt(),
            };
        };

        let input = input.trim();
        if let Some(validate) = step.validator {
            if let Some(error) = validate(input) {
                debug!(field = step.key, %error, "step input rejected");
                return StepOutcome::Rejected {
                    error,
                    reprompt: step.prompt,
                };
            }
        }

        let value = match step.transform {
            Some(transform) => transform(input),
            None => Value::String(input.to_string()),
        };
        state.store(step.key, value);

        if state.step_index() == self.steps.len() {
            debug!("guided flow complete, draft ready for submission");
            StepOutcome::Complete {
                draft: state.finish(),
            }
        } else {
            StepOutcome::Advanced {
                prompt: self.steps[state.step_index()].prompt,
            }
        }
    }
}
