use super::types::{
    Candidate, FunctionCall, GeminiCallResult, Part, PromptFeedback, SafetyRating, UsageMetadata,
};
use crate::http::HttpResponse;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

const WARNING_PROBABILITIES: [&str; 2] = ["MEDIUM", "HIGH"];

/// A safety rating at `MEDIUM` or `HIGH` probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyWarning {
    pub category: String,
    pub probability: String,
    pub blocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    pub model_version: Option<String>,
    pub candidate_count: usize,
    pub total_tokens: u64,
    pub thinking_tokens: u64,
    pub finish_reason: Option<String>,
    pub used_tools: bool,
    pub used_thinking: bool,
    pub used_caching: bool,
    pub safety_warnings: bool,
    pub status_code: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: u64,
    pub total_tokens: u64,
    pub thinking_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetySummary {
    pub has_warnings: bool,
    pub warnings: Vec<SafetyWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetadata {
    pub model_version: Option<String>,
    pub candidate_count: usize,
    pub used_caching: bool,
    pub cache_efficiency: f64,
}

/// Flattened view of a response, ready to log or serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSummary {
    pub text_content: Option<String>,
    pub tool_calls: Vec<FunctionCall>,
    pub thinking_content: Vec<String>,
    pub finish_reason: Option<String>,
    pub usage: UsageSummary,
    pub safety: SafetySummary,
    pub metadata: SummaryMetadata,
}

/// Parsed `generateContent` response plus the transport metadata it came with.
///
/// All accessors look at candidate 0 unless stated otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeminiGenerateResponse {
    pub result: GeminiCallResult,
    pub headers: HashMap<String, Vec<String>>,
    pub status_code: u16,
    pub raw_body: Option<String>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

impl GeminiGenerateResponse {
    pub fn new(result: GeminiCallResult) -> Self {
        Self {
            result,
            headers: HashMap::new(),
            status_code: 200,
            raw_body: None,
        }
    }

    pub fn from_json(body: Value) -> Result<Self> {
        Ok(Self::new(serde_json::from_value(body)?))
    }

    /// Wrap a completed exchange. A missing JSON body is an API error.
    pub fn from_http(response: HttpResponse) -> Result<Self> {
        let body = response.json.ok_or_else(|| {
            Error::api(response.status, "generateContent response had no JSON body")
        })?;

        Ok(Self {
            result: serde_json::from_value(body)?,
            headers: response.headers,
            status_code: response.status,
            raw_body: Some(response.raw_body),
        })
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.result.candidates
    }

    pub fn usage_metadata(&self) -> &UsageMetadata {
        &self.result.usage_metadata
    }

    pub fn model_version(&self) -> Option<&str> {
        self.result.model_version.as_deref()
    }

    pub fn prompt_feedback(&self) -> Option<&PromptFeedback> {
        self.result.prompt_feedback.as_ref()
    }

    pub fn primary_candidate(&self) -> Option<&Candidate> {
        self.result.candidates.first()
    }

    /// Same as [`Self::primary_candidate`]; no ranking is applied.
    pub fn best_candidate(&self) -> Option<&Candidate> {
        self.primary_candidate()
    }

    pub fn all_candidates(&self) -> &[Candidate] {
        self.candidates()
    }

    fn primary_parts(&self) -> &[Part] {
        self.primary_candidate()
            .map(Candidate::parts)
            .unwrap_or(&[])
    }

    /// First plain-text part (no `thought` flag) of the primary candidate.
    pub fn text_content(&self) -> Option<&str> {
        self.primary_parts().iter().find_map(Part::output_text)
    }

    pub fn all_text_content(&self) -> Vec<&str> {
        self.primary_parts()
            .iter()
            .filter_map(Part::output_text)
            .collect()
    }

    pub fn tool_use_blocks(&self) -> Vec<&FunctionCall> {
        self.primary_parts()
            .iter()
            .filter_map(|part| match part {
                Part::FunctionCall { function_call } => Some(function_call),
                _ => None,
            })
            .collect()
    }

    pub fn thinking_content(&self) -> Vec<&str> {
        self.primary_parts()
            .iter()
            .filter_map(Part::thought_text)
            .collect()
    }

    pub fn safety_ratings(&self) -> &[SafetyRating] {
        self.primary_candidate()
            .map(|candidate| candidate.safety_ratings.as_slice())
            .unwrap_or(&[])
    }

    pub fn citation_metadata(&self) -> Option<&Value> {
        self.primary_candidate()
            .and_then(|candidate| candidate.citation_metadata.as_ref())
    }

    /// Concatenated plain text per candidate index; candidates without text
    /// are left out.
    pub fn all_candidates_text_content(&self) -> BTreeMap<usize, String> {
        self.result
            .candidates
            .iter()
            .enumerate()
            .filter_map(|(index, candidate)| {
                let text: Vec<&str> = candidate
                    .parts()
                    .iter()
                    .filter_map(Part::output_text)
                    .collect();
                (!text.is_empty()).then(|| (index, text.concat()))
            })
            .collect()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.primary_candidate()
            .and_then(|candidate| candidate.finish_reason.as_deref())
    }

    fn finished_with(&self, reason: &str) -> bool {
        self.finish_reason() == Some(reason)
    }

    pub fn completed_naturally(&self) -> bool {
        self.finished_with("STOP")
    }

    pub fn was_stopped_by_token_limit(&self) -> bool {
        self.finished_with("MAX_TOKENS")
    }

    pub fn was_blocked_by_safety(&self) -> bool {
        self.finished_with("SAFETY")
    }

    pub fn was_stopped_by_recitation(&self) -> bool {
        self.finished_with("RECITATION")
    }

    pub fn was_stopped_by_language(&self) -> bool {
        self.finished_with("LANGUAGE")
    }

    pub fn used_tools(&self) -> bool {
        !self.tool_use_blocks().is_empty()
    }

    pub fn used_thinking(&self) -> bool {
        self.thinking_tokens() > 0 || !self.thinking_content().is_empty()
    }

    pub fn total_tokens(&self) -> u64 {
        self.result.usage_metadata.total_token_count.unwrap_or(0)
    }

    pub fn input_tokens(&self) -> u64 {
        self.result.usage_metadata.prompt_token_count.unwrap_or(0)
    }

    pub fn output_tokens(&self) -> u64 {
        self.result.usage_metadata.candidates_token_count.unwrap_or(0)
    }

    pub fn thinking_tokens(&self) -> u64 {
        self.result.usage_metadata.thoughts_token_count.unwrap_or(0)
    }

    pub fn cached_tokens(&self) -> u64 {
        self.result
            .usage_metadata
            .cached_content_token_count
            .unwrap_or(0)
    }

    /// Thinking tokens as a percentage of the total.
    pub fn thinking_ratio(&self) -> f64 {
        percent(self.thinking_tokens(), self.total_tokens())
    }

    pub fn used_caching(&self) -> bool {
        self.cached_tokens() > 0
    }

    /// Cached tokens as a percentage of the input tokens.
    pub fn cache_efficiency(&self) -> f64 {
        percent(self.cached_tokens(), self.input_tokens())
    }

    pub fn safety_warnings(&self) -> Vec<SafetyWarning> {
        self.safety_ratings()
            .iter()
            .filter(|rating| WARNING_PROBABILITIES.contains(&rating.probability.as_str()))
            .map(|rating| SafetyWarning {
                category: rating.category.clone(),
                probability: rating.probability.clone(),
                blocked: rating.blocked.unwrap_or(false),
            })
            .collect()
    }

    pub fn has_safety_warnings(&self) -> bool {
        self.safety_ratings()
            .iter()
            .any(|rating| WARNING_PROBABILITIES.contains(&rating.probability.as_str()))
    }

    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            model_version: self.result.model_version.clone(),
            candidate_count: self.result.candidates.len(),
            total_tokens: self.total_tokens(),
            thinking_tokens: self.thinking_tokens(),
            finish_reason: self.finish_reason().map(str::to_string),
            used_tools: self.used_tools(),
            used_thinking: self.used_thinking(),
            used_caching: self.used_caching(),
            safety_warnings: self.has_safety_warnings(),
            status_code: self.status_code,
        }
    }

    /// Ratios in the summary are rounded to two decimals.
    pub fn to_summary(&self) -> ResponseSummary {
        let warnings = self.safety_warnings();

        ResponseSummary {
            text_content: self.text_content().map(str::to_string),
            tool_calls: self.tool_use_blocks().into_iter().cloned().collect(),
            thinking_content: self
                .thinking_content()
                .into_iter()
                .map(str::to_string)
                .collect(),
            finish_reason: self.finish_reason().map(str::to_string),
            usage: UsageSummary {
                input_tokens: self.input_tokens(),
                output_tokens: self.output_tokens(),
                thinking_tokens: self.thinking_tokens(),
                total_tokens: self.total_tokens(),
                thinking_ratio: round2(self.thinking_ratio()),
            },
            safety: SafetySummary {
                has_warnings: !warnings.is_empty(),
                warnings,
            },
            metadata: SummaryMetadata {
                model_version: self.result.model_version.clone(),
                candidate_count: self.result.candidates.len(),
                used_caching: self.used_caching(),
                cache_efficiency: round2(self.cache_efficiency()),
            },
        }
    }
}
