//! State transition functions
//!
//! Every write to a [`WorkflowState`] happens here. Each function validates
//! its input first and only then mutates, so a rejected call leaves the state
//! exactly as it was. Collaborator calls live in the engine; these functions
//! only apply their results.

use crate::error::{ContentFailure, Result, WorkflowError};
use crate::model::{
    Checkpoint, Message, WorkflowState, PASS_THRESHOLD, QUESTIONS_PER_CHECKPOINT,
};
use crate::outcome::QuizPrompt;
use crate::port::{CheckpointOutline, ClarifyResponse, Evaluation, GeneratedContent};
use crate::stage::Stage;
use std::collections::HashMap;

/// Verdict committed by [`apply_evaluation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub score: u8,
    pub passed: bool,
}

/// Clamp a collaborator score into 0..=100
pub fn normalize_score(raw: i32) -> u8 {
    raw.clamp(0, 100) as u8
}

/// Pass derivation owned by the engine, regardless of what the evaluator claims
pub fn is_passing(score: u8) -> bool {
    score >= PASS_THRESHOLD
}

fn no_checkpoint(state: &WorkflowState) -> WorkflowError {
    WorkflowError::Configuration(format!(
        "no checkpoint at cursor {} (of {})",
        state.current_checkpoint_index,
        state.checkpoints.len()
    ))
}

pub(crate) fn apply_clarification(state: &mut WorkflowState, response: ClarifyResponse) {
    if response.need_clarification {
        state.messages.push(Message::assistant(response.question.clone()));
        state.enter(Stage::NeedsClarification {
            question: response.question,
        });
    } else {
        state.messages.push(Message::assistant(response.verification));
        state.enter(Stage::WritingBrief);
    }
}

pub(crate) fn apply_brief(state: &mut WorkflowState, brief: String) -> Result<()> {
    if brief.trim().is_empty() {
        return Err(WorkflowError::BriefFailed {
            reason: "collaborator returned an empty brief".to_string(),
        });
    }
    state.research_brief = Some(brief.clone());
    state.user_request = brief;
    state.enter(Stage::Structuring);
    Ok(())
}

pub(crate) fn apply_structure(
    state: &mut WorkflowState,
    outlines: Vec<CheckpointOutline>,
) -> Result<()> {
    if outlines.is_empty() {
        return Err(WorkflowError::StructuringFailed {
            reason: "collaborator returned no checkpoints".to_string(),
        });
    }
    state.checkpoints = outlines
        .into_iter()
        .map(|o| Checkpoint::new(o.name, o.objective))
        .collect();
    state.current_checkpoint_index = 0;
    state.enter(Stage::Contenting);
    Ok(())
}

/// Commit batch content, matched to checkpoints by id
///
/// All-or-nothing: if any checkpoint is missing content or has the wrong
/// question count, nothing is written.
pub(crate) fn apply_content(
    state: &mut WorkflowState,
    mut generated: HashMap<String, GeneratedContent>,
) -> Result<()> {
    let mut failures = Vec::new();
    for cp in &state.checkpoints {
        match generated.get(&cp.id) {
            None => failures.push(ContentFailure {
                checkpoint_id: cp.id.clone(),
                reason: "no content returned".to_string(),
            }),
            Some(content) if content.quiz_questions.len() != QUESTIONS_PER_CHECKPOINT => {
                failures.push(ContentFailure {
                    checkpoint_id: cp.id.clone(),
                    reason: format!(
                        "expected {} questions, got {}",
                        QUESTIONS_PER_CHECKPOINT,
                        content.quiz_questions.len()
                    ),
                })
            }
            Some(content) if content.study_material.trim().is_empty() => {
                failures.push(ContentFailure {
                    checkpoint_id: cp.id.clone(),
                    reason: "empty study material".to_string(),
                })
            }
            Some(_) => {}
        }
    }
    if !failures.is_empty() {
        return Err(WorkflowError::ContentGenerationFailed { failures });
    }

    for cp in &mut state.checkpoints {
        if let Some(content) = generated.remove(&cp.id) {
            cp.study_material = content.study_material;
            cp.quiz_questions = content.quiz_questions;
        }
    }
    state.enter(Stage::Quizzing);
    Ok(())
}

/// Select the checkpoint under the cursor and suspend, or finish the run
pub(crate) fn present(state: &mut WorkflowState) -> Option<QuizPrompt> {
    let total = state.checkpoints.len();
    let position = state.current_checkpoint_index;
    match state.checkpoints.get(position) {
        None => {
            state.enter(Stage::Done);
            None
        }
        Some(cp) => {
            let prompt = QuizPrompt::for_checkpoint(cp, position, total);
            state.enter(Stage::AwaitingAnswers {
                checkpoint_id: prompt.checkpoint_id.clone(),
            });
            Some(prompt)
        }
    }
}

/// Prompt for a run that is already suspended
pub fn pending_prompt(state: &WorkflowState) -> Option<QuizPrompt> {
    match &state.stage {
        Stage::AwaitingAnswers { checkpoint_id } => state
            .current_checkpoint()
            .filter(|cp| &cp.id == checkpoint_id)
            .map(|cp| {
                QuizPrompt::for_checkpoint(
                    cp,
                    state.current_checkpoint_index,
                    state.checkpoints.len(),
                )
            }),
        _ => None,
    }
}

pub(crate) fn apply_answers(state: &mut WorkflowState, answers: Vec<String>) -> Result<()> {
    let Stage::AwaitingAnswers { checkpoint_id } = &state.stage else {
        return Err(WorkflowError::InvalidResumeState {
            stage: state.stage.name().to_string(),
        });
    };

    let cp = state.current_checkpoint().ok_or_else(|| no_checkpoint(state))?;
    if &cp.id != checkpoint_id {
        return Err(WorkflowError::Configuration(format!(
            "suspended checkpoint '{}' does not match cursor checkpoint '{}'",
            checkpoint_id, cp.id
        )));
    }

    let expected = cp.quiz_questions.len();
    if answers.len() != expected {
        return Err(WorkflowError::AnswerCountMismatch {
            expected,
            actual: answers.len(),
        });
    }

    if let Some(cp) = state.current_checkpoint_mut() {
        cp.user_answers = answers;
    }
    state.enter(Stage::Evaluating);
    Ok(())
}

/// Commit score, feedback and verdict together and move the cursor on a pass
pub(crate) fn apply_evaluation(
    state: &mut WorkflowState,
    evaluation: Evaluation,
    persist_remediation: bool,
) -> Result<Verdict> {
    let score = normalize_score(evaluation.score);
    let passed = is_passing(score);

    let cp = state.current_checkpoint_mut().ok_or(WorkflowError::Configuration(
        "evaluation committed with no current checkpoint".to_string(),
    ))?;
    cp.score = score;
    cp.passed = passed;
    cp.feedback = evaluation.feedback;
    cp.attempts += 1;
    if !persist_remediation {
        cp.simplified_material = None;
    }

    if passed {
        state.current_checkpoint_index += 1;
        state.enter(Stage::Quizzing);
    } else {
        state.enter(Stage::Remediating);
    }
    Ok(Verdict { score, passed })
}

pub(crate) fn apply_simplification(state: &mut WorkflowState, material: String) -> Result<()> {
    let cp = state.current_checkpoint().ok_or_else(|| no_checkpoint(state))?;
    if material.trim().is_empty() {
        return Err(WorkflowError::SimplificationFailed {
            checkpoint_id: cp.id.clone(),
            reason: "collaborator returned empty material".to_string(),
        });
    }
    if let Some(cp) = state.current_checkpoint_mut() {
        cp.simplified_material = Some(material);
    }
    state.enter(Stage::Quizzing);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(questions: usize) -> GeneratedContent {
        GeneratedContent {
            study_material: "material".to_string(),
            quiz_questions: (0..questions).map(|i| format!("Q{}", i)).collect(),
        }
    }

    fn structured(names: &[&str]) -> WorkflowState {
        let mut state = WorkflowState::new("report", "request");
        let outlines = names
            .iter()
            .map(|n| CheckpointOutline::new(*n, format!("learn {}", n)))
            .collect();
        apply_structure(&mut state, outlines).unwrap();
        state
    }

    fn ready(names: &[&str]) -> WorkflowState {
        let mut state = structured(names);
        let generated = state
            .checkpoints
            .iter()
            .map(|cp| (cp.id.clone(), content(3)))
            .collect();
        apply_content(&mut state, generated).unwrap();
        state
    }

    #[test]
    fn test_score_normalization() {
        assert_eq!(normalize_score(-20), 0);
        assert_eq!(normalize_score(150), 100);
        assert!(is_passing(70));
        assert!(!is_passing(69));
    }

    #[test]
    fn test_empty_structure_rejected_without_mutation() {
        let mut state = WorkflowState::new("report", "request");
        let before = state.clone();
        let err = apply_structure(&mut state, Vec::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::StructuringFailed { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_content_is_all_or_nothing() {
        let mut state = structured(&["a", "b"]);
        let ids: Vec<String> = state.checkpoints.iter().map(|cp| cp.id.clone()).collect();
        let before = state.clone();

        let mut generated = HashMap::new();
        generated.insert(ids[0].clone(), content(3));
        generated.insert(ids[1].clone(), content(2));

        let err = apply_content(&mut state, generated).unwrap_err();
        match err {
            WorkflowError::ContentGenerationFailed { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].checkpoint_id, ids[1]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_answers_validated_before_recording() {
        let mut state = ready(&["a"]);
        present(&mut state).unwrap();
        let before = state.clone();

        let err = apply_answers(&mut state, vec!["x".into(), "y".into()]).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::AnswerCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(state, before);

        apply_answers(&mut state, vec!["x".into(), "y".into(), "z".into()]).unwrap();
        assert_eq!(state.stage, Stage::Evaluating);
        assert_eq!(state.checkpoints[0].user_answers.len(), 3);
    }

    #[test]
    fn test_evaluation_overrides_inconsistent_verdict() {
        let mut state = ready(&["a", "b"]);
        present(&mut state).unwrap();
        apply_answers(&mut state, vec!["1".into(), "2".into(), "3".into()]).unwrap();

        let verdict = apply_evaluation(
            &mut state,
            Evaluation {
                score: 40,
                feedback: "weak".to_string(),
                passed: true,
            },
            true,
        )
        .unwrap();

        assert_eq!(verdict, Verdict { score: 40, passed: false });
        assert!(!state.checkpoints[0].passed);
        assert_eq!(state.current_checkpoint_index, 0);
        assert_eq!(state.stage, Stage::Remediating);
    }

    #[test]
    fn test_remediation_cleared_when_not_persisted() {
        let mut state = ready(&["a"]);
        present(&mut state).unwrap();
        apply_answers(&mut state, vec!["1".into(), "2".into(), "3".into()]).unwrap();
        let failed = Evaluation {
            score: 10,
            feedback: "no".to_string(),
            passed: false,
        };
        apply_evaluation(&mut state, failed, false).unwrap();
        apply_simplification(&mut state, "simpler".to_string()).unwrap();

        let prompt = present(&mut state).unwrap();
        assert_eq!(prompt.material, "simpler");
        assert_eq!(prompt.attempt, 2);

        apply_answers(&mut state, vec!["1".into(), "2".into(), "3".into()]).unwrap();
        let passed = Evaluation {
            score: 95,
            feedback: "great".to_string(),
            passed: true,
        };
        apply_evaluation(&mut state, passed, false).unwrap();

        assert_eq!(state.checkpoints[0].simplified_material, None);
        assert_eq!(state.current_checkpoint_index, 1);
    }

    #[test]
    fn test_present_past_end_finishes() {
        let mut state = ready(&["a"]);
        state.current_checkpoint_index = 1;
        assert!(present(&mut state).is_none());
        assert_eq!(state.stage, Stage::Done);
    }

    #[test]
    fn test_pending_prompt_only_while_suspended() {
        let mut state = ready(&["a"]);
        assert!(pending_prompt(&state).is_none());
        let presented = present(&mut state).unwrap();
        assert_eq!(pending_prompt(&state), Some(presented));
    }

    #[test]
    fn test_clarification_branches() {
        let mut state = WorkflowState::with_conversation("r", vec![Message::human("teach me")]);
        apply_clarification(
            &mut state,
            ClarifyResponse {
                need_clarification: true,
                question: "Which part?".to_string(),
                verification: String::new(),
            },
        );
        assert!(matches!(state.stage, Stage::NeedsClarification { .. }));
        assert_eq!(state.messages.last(), Some(&Message::assistant("Which part?")));

        state.reopen_with_reply("Chapter 2").unwrap();
        apply_clarification(
            &mut state,
            ClarifyResponse {
                need_clarification: false,
                question: String::new(),
                verification: "Starting on chapter 2".to_string(),
            },
        );
        assert_eq!(state.stage, Stage::WritingBrief);

        assert!(apply_brief(&mut state, "  ".to_string()).is_err());
        apply_brief(&mut state, "Learn chapter 2".to_string()).unwrap();
        assert_eq!(state.user_request, "Learn chapter 2");
        assert_eq!(state.research_brief.as_deref(), Some("Learn chapter 2"));
        assert_eq!(state.stage, Stage::Structuring);
    }
}
