//! Scripted collaborators for tests
//!
//! [`ScriptedPort`] answers every [`GenerationPort`] call from a script and
//! records what it was asked. Content is generated from the checkpoint name
//! (`"<name> Q1"` .. `"<name> Q3"`) unless overridden, evaluations are taken
//! from a queue, and individual calls can be made to fail or to take time.
//!
//! ```rust,ignore
//! let port = Arc::new(
//!     ScriptedPort::new()
//!         .with_outline(&["Ownership", "Borrowing"])
//!         .with_scores(&[50, 80, 90]),
//! );
//! let engine = WorkflowEngine::new(port.clone());
//! ```

use crate::error::GenerationError;
use crate::model::Message;
use crate::port::{
    CheckpointOutline, ClarificationPort, ClarifyResponse, ContentRequest, Evaluation,
    EvaluationRequest, GeneratedContent, GenerationPort, SimplifyRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCall {
    Structure,
    Content { checkpoint_id: String, name: String },
    Evaluate { name: String, answers: Vec<String> },
    Simplify { name: String, feedback: String },
}

#[derive(Default)]
struct Script {
    outline: Vec<CheckpointOutline>,
    fail_structure: Option<String>,
    question_counts: HashMap<String, usize>,
    failing_content: HashSet<String>,
    content_delays: HashMap<String, Duration>,
    evaluations: VecDeque<Evaluation>,
    evaluation_failures: usize,
    simplification_failures: usize,
    evaluation_delay: Option<Duration>,
    calls: Vec<PortCall>,
}

/// Scripted [`GenerationPort`]
#[derive(Default)]
pub struct ScriptedPort {
    script: Mutex<Script>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checkpoints returned by structuring, objectives derived from names
    pub fn with_outline(self, names: &[&str]) -> Self {
        self.script.lock().outline = names
            .iter()
            .map(|name| CheckpointOutline::new(*name, format!("Understand {}", name)))
            .collect();
        self
    }

    pub fn fail_structure(self, reason: &str) -> Self {
        self.script.lock().fail_structure = Some(reason.to_string());
        self
    }

    /// Return `count` questions for the named checkpoint instead of three
    pub fn with_question_count(self, name: &str, count: usize) -> Self {
        self.script.lock().question_counts.insert(name.to_string(), count);
        self
    }

    pub fn fail_content_for(self, name: &str) -> Self {
        self.script.lock().failing_content.insert(name.to_string());
        self
    }

    pub fn with_content_delay(self, name: &str, delay: Duration) -> Self {
        self.script.lock().content_delays.insert(name.to_string(), delay);
        self
    }

    /// Delay content for each outline entry, longest first, so calls finish
    /// in reverse order
    pub fn with_reversed_completion(self, step: Duration) -> Self {
        {
            let mut script = self.script.lock();
            let count = script.outline.len() as u32;
            let names: Vec<String> = script.outline.iter().map(|o| o.name.clone()).collect();
            for (i, name) in names.into_iter().enumerate() {
                script.content_delays.insert(name, step * (count - i as u32));
            }
        }
        self
    }

    /// Queue evaluations whose `passed` flag agrees with the score
    pub fn with_scores(self, scores: &[i32]) -> Self {
        for score in scores {
            self.push_evaluation(*score, *score >= 70);
        }
        self
    }

    pub fn with_evaluation_delay(self, delay: Duration) -> Self {
        self.script.lock().evaluation_delay = Some(delay);
        self
    }

    /// Queue one evaluation verbatim, including an inconsistent `passed`
    pub fn push_evaluation(&self, score: i32, passed: bool) {
        self.script.lock().evaluations.push_back(Evaluation {
            score,
            feedback: format!("scored {}", score),
            passed,
        });
    }

    pub fn fail_next_evaluation(&self) {
        self.script.lock().evaluation_failures += 1;
    }

    /// Let every checkpoint's content succeed again
    pub fn clear_content_failures(&self) {
        self.script.lock().failing_content.clear();
    }

    pub fn fail_next_simplification(&self) {
        self.script.lock().simplification_failures += 1;
    }

    pub fn calls(&self) -> Vec<PortCall> {
        self.script.lock().calls.clone()
    }

    pub fn count_calls(&self, matches: impl Fn(&PortCall) -> bool) -> usize {
        self.script.lock().calls.iter().filter(|c| matches(c)).count()
    }

    /// Highest number of content calls that were running at once
    pub fn max_concurrent_content(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: PortCall) {
        self.script.lock().calls.push(call);
    }
}

#[async_trait]
impl GenerationPort for ScriptedPort {
    async fn generate_structure(
        &self,
        _report: &str,
    ) -> Result<Vec<CheckpointOutline>, GenerationError> {
        self.record(PortCall::Structure);
        let script = self.script.lock();
        match &script.fail_structure {
            Some(reason) => Err(GenerationError::failed(reason.clone())),
            None => Ok(script.outline.clone()),
        }
    }

    async fn generate_content(
        &self,
        request: ContentRequest<'_>,
    ) -> Result<GeneratedContent, GenerationError> {
        self.record(PortCall::Content {
            checkpoint_id: request.checkpoint_id.to_string(),
            name: request.name.to_string(),
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let (delay, fails, count) = {
            let script = self.script.lock();
            (
                script.content_delays.get(request.name).copied(),
                script.failing_content.contains(request.name),
                script.question_counts.get(request.name).copied().unwrap_or(3),
            )
        };
        // Yield so concurrently issued calls overlap even without a delay
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fails {
            return Err(GenerationError::failed(format!("no content for {}", request.name)));
        }
        Ok(GeneratedContent {
            study_material: format!("All about {}", request.name),
            quiz_questions: (1..=count).map(|i| format!("{} Q{}", request.name, i)).collect(),
        })
    }

    async fn evaluate(
        &self,
        request: EvaluationRequest<'_>,
    ) -> Result<Evaluation, GenerationError> {
        self.record(PortCall::Evaluate {
            name: request.name.to_string(),
            answers: request.user_answers.to_vec(),
        });
        let delay = self.script.lock().evaluation_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock();
        if script.evaluation_failures > 0 {
            script.evaluation_failures -= 1;
            return Err(GenerationError::failed("evaluator unavailable"));
        }
        script
            .evaluations
            .pop_front()
            .ok_or_else(|| GenerationError::Malformed("no scripted evaluation left".to_string()))
    }

    async fn simplify(&self, request: SimplifyRequest<'_>) -> Result<String, GenerationError> {
        self.record(PortCall::Simplify {
            name: request.name.to_string(),
            feedback: request.feedback.to_string(),
        });
        let mut script = self.script.lock();
        if script.simplification_failures > 0 {
            script.simplification_failures -= 1;
            return Err(GenerationError::failed("simplifier unavailable"));
        }
        Ok(format!("{} made simple", request.name))
    }
}

/// Scripted [`ClarificationPort`]
///
/// Asks each queued question in turn, then verifies and writes a brief from
/// the last human message.
#[derive(Default)]
pub struct ScriptedClarifier {
    questions: Mutex<VecDeque<String>>,
    fail_brief: Mutex<bool>,
    seen: Mutex<Vec<Vec<Message>>>,
    dates: Mutex<Vec<String>>,
}

impl ScriptedClarifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asking(self, question: &str) -> Self {
        self.questions.lock().push_back(question.to_string());
        self
    }

    pub fn failing_brief(self) -> Self {
        *self.fail_brief.lock() = true;
        self
    }

    /// Conversations passed to each call, oldest first
    pub fn conversations(&self) -> Vec<Vec<Message>> {
        self.seen.lock().clone()
    }

    /// `today` values passed to each call
    pub fn dates(&self) -> Vec<String> {
        self.dates.lock().clone()
    }

    fn observe(&self, messages: &[Message], today: &str) {
        self.seen.lock().push(messages.to_vec());
        self.dates.lock().push(today.to_string());
    }
}

fn last_human(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == crate::model::Role::Human)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

#[async_trait]
impl ClarificationPort for ScriptedClarifier {
    async fn clarify(
        &self,
        messages: &[Message],
        today: &str,
    ) -> Result<ClarifyResponse, GenerationError> {
        self.observe(messages, today);
        match self.questions.lock().pop_front() {
            Some(question) => Ok(ClarifyResponse {
                need_clarification: true,
                question,
                verification: String::new(),
            }),
            None => Ok(ClarifyResponse {
                need_clarification: false,
                question: String::new(),
                verification: format!("Got it: {}", last_human(messages)),
            }),
        }
    }

    async fn write_brief(
        &self,
        messages: &[Message],
        today: &str,
    ) -> Result<String, GenerationError> {
        self.observe(messages, today);
        if *self.fail_brief.lock() {
            return Err(GenerationError::failed("brief writer unavailable"));
        }
        Ok(format!("Brief: {}", last_human(messages)))
    }
}
