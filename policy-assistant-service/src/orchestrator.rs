use std::sync::Arc;

use dialog_flow::{GuidedFlow, Result, Session, StepOutcome};
use tracing::{info, warn};

use crate::gateway::model::ChatModel;
use crate::gateway::policy_api::{PolicyApi, PolicyRecord, create_payload};
use crate::intent::{self, Intent};
use crate::replies;
use crate::steps::CREATION_STEPS;

/// Turn-taking controller. Owns nothing between turns: each call receives
/// the session, mutates its transcript and state, and returns; callers
/// process one turn at a time per session so transcript order equals
/// turn-start order.
pub struct Orchestrator {
    policy_api: Arc<dyn PolicyApi>,
    model: Arc<dyn ChatModel>,
    flow: GuidedFlow,
}

impl Orchestrator {
    pub fn new(policy_api: Arc<dyn PolicyApi>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            policy_api,
            model,
            flow: GuidedFlow::new(CREATION_STEPS),
        }
    }

    /// Process one user turn. Blank input is a silent no-op; otherwise the
    /// user message is appended first and every outcome, including gateway
    /// failures, ends with at least one assistant message.
    pub async fn handle_turn(&self, session: &mut Session, raw_input: &str) {
        let input = raw_input.trim().to_string();
        if input.is_empty() {
            return;
        }

        session.transcript.push_user(input.as_str());

        let detected = intent::classify(&session.state, &input);
        info!(session_id = %session.id, intent = ?detected, "dispatching turn");

        if let Err(error) = self.dispatch(session, &input, &detected).await {
            warn!(session_id = %session.id, %error, "turn failed, using fallback copy");
            session
                .transcript
                .push_assistant(replies::failure_reply(&input));
        }
    }

    async fn dispatch(&self, session: &mut Session, input: &str, detected: &Intent) -> Result<()> {
        match detected {
            Intent::GuidedStep => self.guided_step(session, input).await,
            Intent::CountPolicies => {
                self.count_policies(session).await;
                Ok(())
            }
            Intent::StartCreation => {
                session.state.begin();
                session.transcript.push_assistant(self.flow.first_prompt());
                Ok(())
            }
            Intent::PolicyNumberLookup(number) => {
                self.policy_number_lookup(session, input, number).await
            }
            Intent::MemberLookup {
                first_name,
                last_name,
            } => self.member_lookup(session, input, first_name, last_name).await,
            Intent::InsuranceQuestion | Intent::SmallTalk => {
                self.chat(session, input, None, &[]).await
            }
        }
    }

    /// One step of the guided creation dialogue. `cancel` abandons the
    /// draft; otherwise validation failures re-prompt the same step and the
    /// final step submits the draft, win or lose.
    async fn guided_step(&self, session: &mut Session, input: &str) -> Result<()> {
        if input.eq_ignore_ascii_case("cancel") {
            session.state.reset();
            session
                .transcript
                .push_assistant(replies::creation_cancelled());
            return Ok(());
        }

        match self.flow.handle_input(&mut session.state, input) {
            StepOutcome::Rejected { error, reprompt } => {
                session
                    .transcript
                    .push_assistant(format!("{error} Please try again."));
                session.transcript.push_assistant(reprompt);
            }
            StepOutcome::Advanced { prompt } => {
                session.transcript.push_assistant(prompt);
            }
            StepOutcome::Complete { draft } => {
                // state is already idle again; the draft is gone either way
                match self.policy_api.create(create_payload(draft)).await {
                    Ok(record) => session
                        .transcript
                        .push_assistant(replies::create_success(&record)),
                    Err(error) => session
                        .transcript
                        .push_assistant(replies::create_failure(&error)),
                }
            }
        }
        Ok(())
    }

    async fn count_policies(&self, session: &mut Session) {
        match self.policy_api.count().await {
            Ok(count) => session.transcript.push_assistant(replies::count_reply(count)),
            Err(error) => session
                .transcript
                .push_assistant(replies::count_failure(&error)),
        }
    }

    async fn policy_number_lookup(
        &self,
        session: &mut Session,
        input: &str,
        number: &str,
    ) -> Result<()> {
        if let Some(record) = self.policy_api.lookup_by_number(number).await? {
            // a hit answers the turn; the model is not consulted
            session
                .transcript
                .push_assistant(replies::policy_details(&record));
            return Ok(());
        }

        // unknown number: try the member-name reading of the same message
        if let Some((first_name, last_name)) = intent::parse_member_name(input) {
            let records = self
                .policy_api
                .lookup_by_member(&first_name, &last_name)
                .await?;
            if !records.is_empty() {
                session.transcript.push_assistant(replies::member_matches(
                    &first_name,
                    &last_name,
                    &records,
                ));
                return Ok(());
            }
        }

        let note = replies::unrecognized_policy_note(number);
        self.chat(session, input, Some(note), &[]).await
    }

    async fn member_lookup(
        &self,
        session: &mut Session,
        input: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<()> {
        let records = self.policy_api.lookup_by_member(first_name, last_name).await?;
        if records.is_empty() {
            return self.chat(session, input, None, &[]).await;
        }
        session
            .transcript
            .push_assistant(replies::member_matches(first_name, last_name, &records));
        Ok(())
    }

    /// Forward the question to the model with prior history, enriched with
    /// anything fetched this turn. Without a credential the model is never
    /// invoked and a templated reply is synthesized instead.
    async fn chat(
        &self,
        session: &mut Session,
        question: &str,
        note: Option<String>,
        fetched: &[PolicyRecord],
    ) -> Result<()> {
        if !self.model.is_configured() {
            session
                .transcript
                .push_assistant(replies::offline_reply(fetched));
            return Ok(());
        }

        let prompt = build_prompt(question, note.as_deref(), fetched);
        // history is everything before this turn's user message
        let history = session.transcript.before(session.transcript.len() - 1).to_vec();
        let reply = self.model.complete(&prompt, &history).await?;
        session.transcript.push_assistant(reply);
        Ok(())
    }
}

fn build_prompt(question: &str, note: Option<&str>, fetched: &[PolicyRecord]) -> String {
    let mut sections = Vec::new();
    if !fetched.is_empty() {
        let summaries = fetched
            .iter()
            .map(replies::record_summary)
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("Policy data fetched for this question:\n{summaries}"));
    }
    if let Some(note) = note {
        sections.push(note.to_string());
    }
    sections.push(question.to_string());
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dialog_flow::{AssistantError, Message, MessageRole};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockPolicyApi {
        by_number: Option<PolicyRecord>,
        by_member: Vec<PolicyRecord>,
        list_len: usize,
        fail_lookup: bool,
        fail_count: bool,
        number_calls: AtomicUsize,
        member_calls: AtomicUsize,
        list_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    #[async_trait]
    impl PolicyApi for MockPolicyApi {
        async fn lookup_by_number(&self, _policy_number: &str) -> Result<Option<PolicyRecord>> {
            self.number_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_lookup {
                return Err(AssistantError::Transport("connection refused".to_string()));
            }
            Ok(self.by_number.clone())
        }

        async fn lookup_by_member(
            &self,
            _first_name: &str,
            _last_name: &str,
        ) -> Result<Vec<PolicyRecord>> {
            self.member_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.by_member.clone())
        }

        async fn count(&self) -> Result<usize> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_count {
                return Err(AssistantError::Transport("connection refused".to_string()));
            }
            Ok(self.list_len)
        }

        async fn create(&self, payload: Value) -> Result<PolicyRecord> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PolicyRecord {
                policy_number: payload["policy_number"].as_str().map(String::from),
                ..Default::default()
            })
        }
    }

    struct EchoModel {
        configured: bool,
        calls: AtomicUsize,
    }

    impl EchoModel {
        fn new(configured: bool) -> Self {
            Self {
                configured,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, prompt: &str, _history: &[Message]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("echo: {prompt}"))
        }
    }

    fn orchestrator(
        api: MockPolicyApi,
        model: EchoModel,
    ) -> (Orchestrator, Arc<MockPolicyApi>, Arc<EchoModel>) {
        let api = Arc::new(api);
        let model = Arc::new(model);
        (
            Orchestrator::new(api.clone(), model.clone()),
            api,
            model,
        )
    }

    fn assistant_texts(session: &Session) -> Vec<&str> {
        session
            .transcript
            .messages()
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.text.as_str())
            .collect()
    }

    #[tokio::test]
    async fn blank_input_is_a_silent_no_op() {
        let (orchestrator, _, _) = orchestrator(MockPolicyApi::default(), EchoModel::new(true));
        let mut session = Session::new("s");
        orchestrator.handle_turn(&mut session, "   ").await;
        assert!(session.transcript.is_empty());
    }

    #[tokio::test]
    async fn count_issues_one_list_call_and_reports_verbatim() {
        let (orchestrator, api, _) = orchestrator(MockPolicyApi::default(), EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator
            .handle_turn(&mut session, "how many policies are saved?")
            .await;

        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(assistant_texts(&session), vec!["There are 0 saved policies."]);
    }

    #[tokio::test]
    async fn full_creation_flow_submits_once_and_resets() {
        let (orchestrator, api, _) = orchestrator(MockPolicyApi::default(), EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator.handle_turn(&mut session, "add a new policy").await;
        assert!(session.state.is_creating());

        let inputs = [
            "POL-123456",
            "Acme Health",
            "Jane",
            "Doe",
            "1990-05-05",
            "50000",
            "250",
            "2030-12-31",
        ];
        for input in inputs {
            orchestrator.handle_turn(&mut session, input).await;
        }

        assert_eq!(api.create_calls.load(Ordering::SeqCst), 1);
        assert!(!session.state.is_creating());
        assert_eq!(session.state.step_index(), 0);
        let last = assistant_texts(&session).last().unwrap().to_string();
        assert!(last.contains("has been saved"));
    }

    #[tokio::test]
    async fn invalid_dob_reprompts_without_advancing() {
        let (orchestrator, _, _) = orchestrator(MockPolicyApi::default(), EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator.handle_turn(&mut session, "add a new policy").await;
        for input in ["POL-123456", "Acme Health", "Jane", "Doe"] {
            orchestrator.handle_turn(&mut session, input).await;
        }
        assert_eq!(session.state.step_index(), 4);

        orchestrator.handle_turn(&mut session, "2999-01-01").await;
        assert_eq!(session.state.step_index(), 4);
        let texts = assistant_texts(&session);
        let error = texts[texts.len() - 2];
        assert!(error.contains("Please try again."));
        assert!(texts.last().unwrap().contains("date of birth"));

        orchestrator.handle_turn(&mut session, "1990-05-05").await;
        assert_eq!(session.state.step_index(), 5);
        assert_eq!(
            session.state.draft().get("dob"),
            Some(&Value::String("1990-05-05".into()))
        );
    }

    #[tokio::test]
    async fn cancel_abandons_the_draft() {
        let (orchestrator, api, _) = orchestrator(MockPolicyApi::default(), EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator.handle_turn(&mut session, "add a new policy").await;
        orchestrator.handle_turn(&mut session, "POL-123456").await;
        orchestrator.handle_turn(&mut session, "cancel").await;

        assert!(!session.state.is_creating());
        assert!(session.state.draft().is_empty());
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn policy_number_hit_short_circuits_the_model() {
        let api = MockPolicyApi {
            by_number: Some(PolicyRecord {
                policy_number: Some("123456".to_string()),
                coverage_status: Some("active".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let (orchestrator, _, model) = orchestrator(api, EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator
            .handle_turn(&mut session, "my policy 123456 please")
            .await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert!(assistant_texts(&session)[0].contains("123456"));
    }

    #[tokio::test]
    async fn unknown_number_falls_back_to_member_then_chat() {
        let api = MockPolicyApi {
            by_member: vec![PolicyRecord {
                policy_number: Some("777777".to_string()),
                last_name: Some("Doe".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let (orchestrator, api, model) = orchestrator(api, EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator
            .handle_turn(&mut session, "check 123456 for Jane Doe")
            .await;

        assert_eq!(api.number_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.member_calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert!(assistant_texts(&session)[0].contains("Jane Doe"));
    }

    #[tokio::test]
    async fn unknown_number_with_no_member_match_reaches_the_model_with_a_note() {
        let (orchestrator, _, model) = orchestrator(MockPolicyApi::default(), EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator.handle_turn(&mut session, "check 123456").await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let reply = assistant_texts(&session)[0];
        assert!(reply.contains("was not recognized"));
        assert!(reply.contains("check 123456"));
    }

    #[tokio::test]
    async fn no_credential_means_templated_reply_and_no_model_call() {
        let (orchestrator, _, model) = orchestrator(MockPolicyApi::default(), EchoModel::new(false));
        let mut session = Session::new("s");

        orchestrator.handle_turn(&mut session, "hello").await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert!(assistant_texts(&session)[0].contains("6-digit number"));
    }

    #[tokio::test]
    async fn lookup_failure_becomes_an_apologetic_reply() {
        let api = MockPolicyApi {
            fail_lookup: true,
            ..Default::default()
        };
        let (orchestrator, _, _) = orchestrator(api, EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator.handle_turn(&mut session, "look up 123456").await;

        let texts = assistant_texts(&session);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("I'm sorry"));
        assert!(texts[0].contains("manual policy lookup"));
    }

    #[tokio::test]
    async fn count_failure_names_the_problem() {
        let api = MockPolicyApi {
            fail_count: true,
            ..Default::default()
        };
        let (orchestrator, _, _) = orchestrator(api, EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator
            .handle_turn(&mut session, "how many policies are saved?")
            .await;

        assert!(assistant_texts(&session)[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn sequential_turns_keep_fifo_order() {
        let (orchestrator, _, _) = orchestrator(MockPolicyApi::default(), EchoModel::new(true));
        let mut session = Session::new("s");

        orchestrator.handle_turn(&mut session, "hello").await;
        orchestrator.handle_turn(&mut session, "how are you").await;

        let roles: Vec<MessageRole> = session
            .transcript
            .messages()
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
            ]
        );
        assert_eq!(session.transcript.messages()[0].text, "hello");
        assert_eq!(session.transcript.messages()[2].text, "how are you");
    }
}
