//! The two-step submission pipeline
//!
//! One submission runs the formula flow, then conditionally the solution
//! flow, and turns every outcome into transcript entries. Flow failures are
//! absorbed here as `Error: ...` assistant messages; only validation failures
//! (an empty question) surface as `Err` without touching the transcript.

use crate::flows::{FormulaInput, MathFlows, SolutionInput};
use serde::Serialize;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// One transcript entry produced by a submission, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

impl TranscriptEntry {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

/// How a submission ended
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    FormulaOnly { formula: String },
    FormulaAndSolution { formula: String, solution: String },
    Failed { error: String },
}

/// Result of one question submission
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub outcome: SubmissionOutcome,
    pub messages: Vec<TranscriptEntry>,
}

/// Runs one question through the formula flow and, when a non-empty formula
/// comes back, the solution flow. Each flow is invoked at most once.
pub async fn run_submission<F: MathFlows>(
    flows: &F,
    question: &str,
) -> Result<SubmissionResult, String> {
    let question = question.trim();
    if question.is_empty() {
        return Err("Please enter a math question.".to_string());
    }

    let mut messages = vec![TranscriptEntry::new(ROLE_USER, question.to_string())];

    let formula = match flows
        .generate_formula(&FormulaInput {
            question: question.to_string(),
        })
        .await
    {
        Ok(output) => output.formula,
        Err(e) => {
            let error = format!("Failed to generate a formula: {}", e);
            messages.push(TranscriptEntry::new(
                ROLE_ASSISTANT,
                format!("Error: {}", error),
            ));
            return Ok(SubmissionResult {
                outcome: SubmissionOutcome::Failed { error },
                messages,
            });
        }
    };

    messages.push(TranscriptEntry::new(
        ROLE_ASSISTANT,
        format!("Wolfram Language Formula: {}", formula),
    ));

    // An empty formula never reaches the solution flow, even when the flow
    // implementation skipped its own validation.
    if formula.trim().is_empty() {
        return Ok(SubmissionResult {
            outcome: SubmissionOutcome::FormulaOnly { formula },
            messages,
        });
    }

    let solution = match flows
        .generate_solution(&SolutionInput {
            problem: question.to_string(),
            formula: Some(formula.clone()),
        })
        .await
    {
        Ok(output) => output.solution,
        Err(e) => {
            let error = format!("Failed to generate a step-by-step solution: {}", e);
            messages.push(TranscriptEntry::new(
                ROLE_ASSISTANT,
                format!("Error: {}", error),
            ));
            return Ok(SubmissionResult {
                outcome: SubmissionOutcome::Failed { error },
                messages,
            });
        }
    };

    messages.push(TranscriptEntry::new(
        ROLE_ASSISTANT,
        format!("Step-by-step solution: {}", solution),
    ));

    Ok(SubmissionResult {
        outcome: SubmissionOutcome::FormulaAndSolution { formula, solution },
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::{FlowError, FormulaOutput, SolutionOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockFlows {
        formula_result: Result<String, String>,
        solution_result: Result<String, String>,
        formula_calls: AtomicUsize,
        solution_calls: AtomicUsize,
        last_solution_input: Mutex<Option<(String, Option<String>)>>,
    }

    impl MockFlows {
        fn new(formula: Result<&str, &str>, solution: Result<&str, &str>) -> Self {
            Self {
                formula_result: formula.map(str::to_string).map_err(str::to_string),
                solution_result: solution.map(str::to_string).map_err(str::to_string),
                formula_calls: AtomicUsize::new(0),
                solution_calls: AtomicUsize::new(0),
                last_solution_input: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl MathFlows for MockFlows {
        async fn generate_formula(
            &self,
            _input: &FormulaInput,
        ) -> Result<FormulaOutput, FlowError> {
            self.formula_calls.fetch_add(1, Ordering::SeqCst);
            match &self.formula_result {
                Ok(formula) => Ok(FormulaOutput {
                    formula: formula.clone(),
                }),
                Err(e) => Err(FlowError::Api(e.clone())),
            }
        }

        async fn generate_solution(
            &self,
            input: &SolutionInput,
        ) -> Result<SolutionOutput, FlowError> {
            self.solution_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_solution_input.lock().unwrap() =
                Some((input.problem.clone(), input.formula.clone()));
            match &self.solution_result {
                Ok(solution) => Ok(SolutionOutput {
                    solution: solution.clone(),
                }),
                Err(e) => Err(FlowError::Api(e.clone())),
            }
        }
    }

    fn roles(result: &SubmissionResult) -> Vec<&str> {
        result.messages.iter().map(|m| m.role.as_str()).collect()
    }

    #[tokio::test]
    async fn formula_and_solution_happy_path() {
        let flows = MockFlows::new(Ok("2+2"), Ok("4"));
        let result = run_submission(&flows, "What is 2+2?").await.unwrap();

        assert_eq!(roles(&result), vec!["user", "assistant", "assistant"]);
        assert_eq!(result.messages[0].content, "What is 2+2?");
        assert_eq!(
            result.messages[1].content,
            "Wolfram Language Formula: 2+2"
        );
        assert_eq!(result.messages[2].content, "Step-by-step solution: 4");
        assert_eq!(
            result.outcome,
            SubmissionOutcome::FormulaAndSolution {
                formula: "2+2".to_string(),
                solution: "4".to_string(),
            }
        );

        // The solution flow received the original problem plus the formula
        let input = flows.last_solution_input.lock().unwrap().clone().unwrap();
        assert_eq!(input.0, "What is 2+2?");
        assert_eq!(input.1.as_deref(), Some("2+2"));
    }

    #[tokio::test]
    async fn formula_failure_skips_solution_flow() {
        let flows = MockFlows::new(Err("request timed out"), Ok("unused"));
        let result = run_submission(&flows, "What is 2+2?").await.unwrap();

        assert_eq!(roles(&result), vec!["user", "assistant"]);
        assert!(result.messages[1].content.starts_with("Error: "));
        assert!(result.messages[1].content.contains("request timed out"));
        assert!(matches!(result.outcome, SubmissionOutcome::Failed { .. }));
        assert_eq!(flows.formula_calls.load(Ordering::SeqCst), 1);
        assert_eq!(flows.solution_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_formula_skips_solution_flow() {
        let flows = MockFlows::new(Ok(""), Ok("unused"));
        let result = run_submission(&flows, "What is 2+2?").await.unwrap();

        assert_eq!(roles(&result), vec!["user", "assistant"]);
        assert_eq!(result.messages[1].content, "Wolfram Language Formula: ");
        assert_eq!(
            result.outcome,
            SubmissionOutcome::FormulaOnly {
                formula: String::new()
            }
        );
        assert_eq!(flows.solution_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn solution_failure_appends_single_error_entry() {
        let flows = MockFlows::new(Ok("2+2"), Err("rate limited"));
        let result = run_submission(&flows, "What is 2+2?").await.unwrap();

        assert_eq!(roles(&result), vec!["user", "assistant", "assistant"]);
        assert_eq!(
            result.messages[1].content,
            "Wolfram Language Formula: 2+2"
        );
        assert!(result.messages[2].content.starts_with("Error: "));
        assert!(matches!(result.outcome, SubmissionOutcome::Failed { .. }));
        assert_eq!(flows.formula_calls.load(Ordering::SeqCst), 1);
        assert_eq!(flows.solution_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_question_is_rejected_without_invoking_flows() {
        let flows = MockFlows::new(Ok("2+2"), Ok("4"));
        assert!(run_submission(&flows, "").await.is_err());
        assert!(run_submission(&flows, "   \n").await.is_err());
        assert_eq!(flows.formula_calls.load(Ordering::SeqCst), 0);
        assert_eq!(flows.solution_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn consecutive_submissions_stay_in_chronological_order() {
        let flows = MockFlows::new(Ok("2+2"), Ok("4"));
        let mut transcript = Vec::new();
        for question in ["What is 2+2?", "What is 3+3?"] {
            let result = run_submission(&flows, question).await.unwrap();
            transcript.extend(result.messages);
        }

        // The user message of submission N precedes all of its assistant
        // messages, which precede the user message of submission N+1.
        assert_eq!(transcript.len(), 6);
        assert_eq!(transcript[0].content, "What is 2+2?");
        assert_eq!(transcript[0].role, ROLE_USER);
        assert_eq!(transcript[3].content, "What is 3+3?");
        assert_eq!(transcript[3].role, ROLE_USER);
        assert!(transcript[1..3].iter().all(|m| m.role == ROLE_ASSISTANT));
        assert!(transcript[4..6].iter().all(|m| m.role == ROLE_ASSISTANT));
    }
}
