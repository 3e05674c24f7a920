//! Focus-group evaluations: parsing persona verdicts and scoring them.

use crewforge_core::agent::ExecutionResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::parser::ParsedOutputs;

static EVALUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[^{}]*"(?:nota|score)"[^{}]*\}"#).expect("valid evaluation regex")
});
static SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:nota|score)"\s*:\s*(\d+(?:\.\d+)?)"#).expect("valid score regex")
});

/// Score given when an evaluation omits one.
const DEFAULT_SCORE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Aprovado,
    Reprovado,
    PrecisaAjustes,
}

impl Verdict {
    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "aprovado" | "approved" => Self::Aprovado,
            "reprovado" | "rejected" => Self::Reprovado,
            _ => Self::PrecisaAjustes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaEvaluation {
    pub persona_id: String,
    pub persona_name: String,
    /// 0–10
    pub score: f32,
    pub positives: Vec<String>,
    pub negatives: Vec<String>,
    pub suggestions: Vec<String>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusGroupResult {
    pub average_score: f32,
    pub passed: bool,
    pub iterations: u32,
    pub evaluations: Vec<PersonaEvaluation>,
}

#[derive(Deserialize)]
struct RawEvaluation {
    persona_id: Option<String>,
    persona_name: Option<String>,
    #[serde(alias = "score")]
    nota: Option<f32>,
    #[serde(default, alias = "positives")]
    pontos_positivos: Vec<String>,
    #[serde(default, alias = "negatives")]
    pontos_negativos: Vec<String>,
    #[serde(default, alias = "suggestions")]
    sugestoes: Vec<String>,
    #[serde(alias = "verdict")]
    veredicto: Option<String>,
}

impl From<RawEvaluation> for PersonaEvaluation {
    fn from(raw: RawEvaluation) -> Self {
        Self {
            persona_id: raw.persona_id.unwrap_or_default(),
            persona_name: raw.persona_name.unwrap_or_default(),
            score: raw.nota.unwrap_or(DEFAULT_SCORE).clamp(0.0, 10.0),
            positives: raw.pontos_positivos,
            negatives: raw.pontos_negativos,
            suggestions: raw.sugestoes,
            verdict: raw
                .veredicto
                .as_deref()
                .map(Verdict::parse)
                .unwrap_or(Verdict::PrecisaAjustes),
        }
    }
}

fn score_only(fragment: &str) -> Option<PersonaEvaluation> {
    let caps = SCORE.captures(fragment)?;
    let score: f32 = caps.get(1)?.as_str().parse().ok()?;
    Some(PersonaEvaluation {
        persona_id: String::new(),
        persona_name: String::new(),
        score: score.clamp(0.0, 10.0),
        positives: Vec::new(),
        negatives: Vec::new(),
        suggestions: Vec::new(),
        verdict: Verdict::PrecisaAjustes,
    })
}

/// Every flat JSON object carrying a `nota` (or `score`) key in `text`.
///
/// Missing persona fields are left empty. Objects that are not valid JSON
/// still yield a score-only evaluation when the score itself can be read.
pub fn parse_evaluations(text: &str) -> Vec<PersonaEvaluation> {
    EVALUATION
        .find_iter(text)
        .filter_map(|m| match serde_json::from_str::<RawEvaluation>(m.as_str()) {
            Ok(raw) => Some(PersonaEvaluation::from(raw)),
            Err(_) => score_only(m.as_str()),
        })
        .collect()
}

/// One evaluation per successful evaluator result.
///
/// The first evaluation object in each output is used; a missing persona
/// id or name is taken from the agent that produced it.
pub fn evaluations_from_results(results: &[ExecutionResult]) -> Vec<PersonaEvaluation> {
    results
        .iter()
        .filter(|r| !r.is_failure())
        .filter_map(|r| {
            let mut evaluation = parse_evaluations(&r.output).into_iter().next()?;
            if evaluation.persona_id.is_empty() {
                evaluation.persona_id = r.agent_id.clone();
            }
            if evaluation.persona_name.is_empty() {
                evaluation.persona_name = r.agent_name.clone();
            }
            Some(evaluation)
        })
        .collect()
}

/// Arithmetic mean of the scores; 0 when there are none.
pub fn average_score(evaluations: &[PersonaEvaluation]) -> f32 {
    if evaluations.is_empty() {
        return 0.0;
    }
    evaluations.iter().map(|e| e.score).sum::<f32>() / evaluations.len() as f32
}

/// Task description for one evaluator.
pub fn evaluation_task(persona_name: &str) -> String {
    format!(
        "Evaluate the content in the context as {persona_name}. \
         Be specific about what works and what does not."
    )
}

/// Task for the refiner between iterations.
pub fn refinement_task(outputs: &ParsedOutputs, evaluations: &[PersonaEvaluation]) -> String {
    let bullets = |pick: fn(&PersonaEvaluation) -> &Vec<String>| {
        let items: Vec<String> = evaluations
            .iter()
            .flat_map(|e| pick(e).iter().map(move |i| format!("- {} ({})", i, e.persona_name)))
            .collect();
        if items.is_empty() {
            "- (none)".to_string()
        } else {
            items.join("\n")
        }
    };
    format!(
        "Rewrite the main copy below so it addresses the focus group feedback.\n\n\
         Current copy:\n{}\n\n\
         Negatives:\n{}\n\n\
         Suggestions:\n{}\n\n\
         Return only the new copy.",
        outputs.copy.as_deref().unwrap_or_default(),
        bullets(|e| &e.negatives),
        bullets(|e| &e.suggestions),
    )
}
