//! AI-assisted CV features.
//!
//! Each feature sends a fixed system prompt plus a text view of the CV to
//! the completion client. Unusable replies and provider failures degrade to a
//! canned payload with the same shape as a real answer; only a missing API
//! key is reported as an error.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::llm_client::prompts::json_system_prompt;
use crate::llm_client::{parse_json, CompletionClient, LlmError};
use crate::models::cv::CvData;

pub mod handlers;
pub mod prompts;

/// Result of an AI call: either the model's answer or the canned fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum AiOutcome<T> {
    Parsed(T),
    Fallback(T),
}

impl<T> AiOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, AiOutcome::Fallback(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            AiOutcome::Parsed(_) => "parsed",
            AiOutcome::Fallback(_) => "fallback",
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            AiOutcome::Parsed(value) | AiOutcome::Fallback(value) => value,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response payloads
// ────────────────────────────────────────────────────────────────────────────

/// Models answer scores as `78`, `78.5` or `"78"`. All of them are accepted
/// and rounded into 0..=100.
fn score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScore {
        Number(f64),
        Text(String),
    }

    let value = match RawScore::deserialize(deserializer)? {
        RawScore::Number(n) => n,
        RawScore::Text(text) => text
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("score is not a number: {text}")))?,
    };
    if !value.is_finite() {
        return Err(serde::de::Error::custom("score is not finite"));
    }
    Ok(value.round().clamp(0.0, 100.0) as u32)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default, deserialize_with = "score")]
    pub content: u32,
    #[serde(default, deserialize_with = "score")]
    pub formatting: u32,
    #[serde(default, deserialize_with = "score")]
    pub keywords: u32,
    #[serde(default, deserialize_with = "score")]
    pub ats_compatibility: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weakness {
    pub issue: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvAnalysis {
    #[serde(deserialize_with = "score")]
    pub overall_score: u32,
    #[serde(default)]
    pub breakdown: ScoreBreakdown,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<Weakness>,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSuggestion {
    pub section: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    #[serde(deserialize_with = "score")]
    pub match_percentage: u32,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<SectionSuggestion>,
    #[serde(default)]
    pub optimized_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSuggestions {
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovedText {
    pub improved: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl CvAnalysis {
    pub fn fallback() -> Self {
        Self {
            overall_score: 72,
            breakdown: ScoreBreakdown {
                content: 75,
                formatting: 70,
                keywords: 65,
                ats_compatibility: 78,
            },
            strengths: strings(&["Good structure", "Clear contact information"]),
            weaknesses: vec![Weakness {
                issue: "Limited quantifiable achievements".to_string(),
                suggestion: "Add metrics and numbers to demonstrate impact".to_string(),
            }],
            missing_keywords: strings(&["leadership", "collaboration", "results-driven"]),
            recommendations: strings(&[
                "Add more specific achievements with numbers",
                "Include relevant keywords for your industry",
            ]),
        }
    }
}

impl JobMatch {
    /// Echoes the CV's current summary so the client never loses it.
    pub fn fallback(summary: &str) -> Self {
        Self {
            match_percentage: 60,
            matched_keywords: strings(&["communication", "teamwork"]),
            missing_keywords: strings(&["specific skill 1", "specific skill 2"]),
            suggestions: vec![SectionSuggestion {
                section: "skills".to_string(),
                suggestion: "Review the job description and add relevant skills".to_string(),
            }],
            optimized_summary: summary.to_string(),
        }
    }
}

impl SkillSuggestions {
    pub fn fallback() -> Self {
        Self {
            technical_skills: strings(&["Microsoft Office", "Data Analysis", "Project Management"]),
            soft_skills: strings(&["Communication", "Teamwork", "Problem-solving"]),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Features
// ────────────────────────────────────────────────────────────────────────────

/// Calls the model and parses its reply as `T`. Returns `Err` only when the
/// client is not configured.
async fn complete_json<T: DeserializeOwned>(
    llm: &dyn CompletionClient,
    system: &str,
    prompt: &str,
    fallback: impl FnOnce() -> T,
) -> Result<AiOutcome<T>, LlmError> {
    let system = json_system_prompt(system);
    let text = match llm.complete(&system, prompt).await {
        Ok(text) => text,
        Err(LlmError::NotConfigured) => return Err(LlmError::NotConfigured),
        Err(e) => {
            warn!(error = %e, "AI provider call failed, using fallback");
            return Ok(AiOutcome::Fallback(fallback()));
        }
    };

    match parse_json::<T>(&text) {
        Ok(value) => Ok(AiOutcome::Parsed(value)),
        Err(e) => {
            warn!(error = %e, "AI response parsing error, using fallback");
            Ok(AiOutcome::Fallback(fallback()))
        }
    }
}

pub async fn analyze_cv(
    llm: &dyn CompletionClient,
    data: &CvData,
) -> Result<AiOutcome<CvAnalysis>, LlmError> {
    complete_json(
        llm,
        prompts::ANALYZE_SYSTEM,
        &prompts::analysis_prompt(data),
        CvAnalysis::fallback,
    )
    .await
}

/// Plain-text rewrite; the original content is the fallback.
pub async fn improve_section(
    llm: &dyn CompletionClient,
    section: &str,
    content: &str,
    context: Option<&str>,
) -> Result<AiOutcome<ImprovedText>, LlmError> {
    let prompt = prompts::improve_prompt(section, content, context);
    let original = || ImprovedText {
        improved: content.to_string(),
    };

    match llm.complete(prompts::IMPROVE_SYSTEM, &prompt).await {
        Ok(text) if !text.trim().is_empty() => Ok(AiOutcome::Parsed(ImprovedText {
            improved: text.trim().to_string(),
        })),
        Ok(_) => Ok(AiOutcome::Fallback(original())),
        Err(LlmError::NotConfigured) => Err(LlmError::NotConfigured),
        Err(e) => {
            warn!(error = %e, section = %section, "AI improve failed, returning original");
            Ok(AiOutcome::Fallback(original()))
        }
    }
}

pub async fn optimize_for_job(
    llm: &dyn CompletionClient,
    data: &CvData,
    job_description: &str,
) -> Result<AiOutcome<JobMatch>, LlmError> {
    complete_json(
        llm,
        prompts::OPTIMIZE_SYSTEM,
        &prompts::optimize_prompt(data, job_description),
        || JobMatch::fallback(&data.summary),
    )
    .await
}

pub async fn suggest_skills(
    llm: &dyn CompletionClient,
    job_title: &str,
) -> Result<AiOutcome<SkillSuggestions>, LlmError> {
    complete_json(
        llm,
        prompts::SUGGEST_SKILLS_SYSTEM,
        &prompts::suggest_skills_prompt(job_title),
        SkillSuggestions::fallback,
    )
    .await
}
