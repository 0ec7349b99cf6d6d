//! Shared data model: claims, Stage-1 records, chunks, Stage-2 results

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Claim lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Submitted,
    Paid,
    Denied,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 3] = [ClaimStatus::Submitted, ClaimStatus::Paid, ClaimStatus::Denied];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::Paid => "paid",
            ClaimStatus::Denied => "denied",
        }
    }
}

impl FromStr for ClaimStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ClaimStatus::Submitted),
            "paid" => Ok(ClaimStatus::Paid),
            "denied" => Ok(ClaimStatus::Denied),
            other => Err(Error::Schema(format!("unknown claim status '{}'", other))),
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One insurance reimbursement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub patient_id: String,
    pub provider_id: String,
    pub procedure_code: String,
    pub amount: f64,
    pub claim_date: NaiveDate,
    pub status: ClaimStatus,
    /// Synthetic ground truth
    pub is_fraud_label: bool,
}

/// Claim plus the Stage-1 derived fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Record {
    #[serde(flatten)]
    pub claim: Claim,
    pub provider_total_claims: u64,
    pub provider_mean_amount: f64,
    /// 75th percentile of the claim's procedure group
    pub q3: f64,
    /// Interquartile range of the claim's procedure group
    pub iqr: f64,
    pub is_amount_outlier: bool,
    pub is_duplicate: bool,
    pub provider_high_volume: bool,
    /// Count of the three flags above (0-3)
    pub stage1_score: u8,
}

impl Stage1Record {
    pub fn is_candidate(&self) -> bool {
        self.stage1_score >= 1
    }
}

/// Result of a Stage-1 refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage1Summary {
    pub rows: usize,
    /// Claims with `stage1_score >= 1`
    pub candidates: usize,
}

/// Synthetic provider record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub provider_id: String,
    pub provider_name: String,
    pub registration_year: i32,
    pub license_number: String,
}

/// Synthetic patient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub age: u32,
    pub gender: String,
}

/// Bounded slice of a supporting document, tagged with its claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub doc_id: String,
    pub claim_id: String,
    #[serde(default)]
    pub provider_id: Option<String>,
    pub text: String,
}

/// One entry of a retrieval result, ordered by ascending distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub doc_id: String,
    pub claim_id: String,
    pub text: String,
    pub distance: f64,
}

/// Retrieved document summary carried in a Stage-2 result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocPreview {
    pub doc_id: String,
    pub distance: f64,
    pub text_preview: String,
}

/// Characters of chunk text kept in a [`DocPreview`]
pub const TEXT_PREVIEW_CHARS: usize = 200;

impl DocPreview {
    pub fn from_chunk(chunk: &RetrievedChunk) -> Self {
        Self {
            doc_id: chunk.doc_id.clone(),
            distance: chunk.distance,
            text_preview: chunk.text.chars().take(TEXT_PREVIEW_CHARS).collect(),
        }
    }
}

/// Stage-2 classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Legit,
    NeedsMoreInfo,
    Suspicious,
    /// Claim id absent from the Stage-1 population
    NotFound,
}

impl Verdict {
    pub const SUSPICIOUS_THRESHOLD: f64 = 0.7;
    pub const NEEDS_MORE_INFO_THRESHOLD: f64 = 0.35;

    /// Threshold a bounded Stage-2 score
    pub fn from_score(score: f64) -> Self {
        if score >= Self::SUSPICIOUS_THRESHOLD {
            Verdict::Suspicious
        } else if score >= Self::NEEDS_MORE_INFO_THRESHOLD {
            Verdict::NeedsMoreInfo
        } else {
            Verdict::Legit
        }
    }

    /// Predicted-positive for evaluation
    pub fn is_flagged(&self) -> bool {
        matches!(self, Verdict::Suspicious | Verdict::NeedsMoreInfo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Legit => "legit",
            Verdict::NeedsMoreInfo => "needs_more_info",
            Verdict::Suspicious => "suspicious",
            Verdict::NotFound => "not_found",
        }
    }
}

impl FromStr for Verdict {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legit" => Ok(Verdict::Legit),
            "needs_more_info" => Ok(Verdict::NeedsMoreInfo),
            "suspicious" => Ok(Verdict::Suspicious),
            "not_found" => Ok(Verdict::NotFound),
            other => Err(Error::Schema(format!("unknown verdict '{}'", other))),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage-2 analysis of a single claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTwoResult {
    pub claim_id: String,
    pub provider_id: String,
    pub amount: f64,
    pub stage1_score: u8,
    pub is_fraud_label: bool,
    /// Stage-2's own recomputation, independent of the stored Stage-1 flag
    pub is_amount_outlier: bool,
    pub keyword_matches: usize,
    /// Bounded to [0, 1]
    pub score: f64,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    pub retrieved_docs: Vec<DocPreview>,
}

/// Returned instead of a [`StageTwoResult`] for unknown claim ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotFoundResult {
    pub claim_id: String,
    pub verdict: Verdict,
    pub score: f64,
    pub reasons: Vec<String>,
}

impl NotFoundResult {
    pub fn new(claim_id: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            verdict: Verdict::NotFound,
            score: 0.0,
            reasons: vec!["Claim ID not found or no claims processed.".to_string()],
        }
    }
}

/// Outcome of `analyze_claim`; a miss is a normal value, not an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Analyzed(StageTwoResult),
    NotFound(NotFoundResult),
}

impl AnalysisOutcome {
    pub fn verdict(&self) -> Verdict {
        match self {
            AnalysisOutcome::Analyzed(result) => result.verdict,
            AnalysisOutcome::NotFound(result) => result.verdict,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            AnalysisOutcome::Analyzed(result) => result.score,
            AnalysisOutcome::NotFound(result) => result.score,
        }
    }

    pub fn into_result(self) -> Option<StageTwoResult> {
        match self {
            AnalysisOutcome::Analyzed(result) => Some(result),
            AnalysisOutcome::NotFound(_) => None,
        }
    }
}

/// Binary classification quality against the synthetic labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Rows are true label, columns predicted label, order [0, 1]
    pub confusion_matrix: [[u64; 2]; 2],
}

/// Outcome of a batch Stage-2 run over all Stage-1 candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub candidates_processed: usize,
    pub results_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EvaluationMetrics>,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_queue_json: Option<String>,
}

impl EvaluationSummary {
    /// Summary for a population without candidates
    pub fn empty() -> Self {
        Self {
            candidates_processed: 0,
            results_saved: false,
            run_id: None,
            metrics: None,
            duration_seconds: 0.0,
            review_queue_json: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_boundaries() {
        assert_eq!(Verdict::from_score(0.7), Verdict::Suspicious);
        assert_eq!(Verdict::from_score(0.699_999_9), Verdict::NeedsMoreInfo);
        assert_eq!(Verdict::from_score(0.35), Verdict::NeedsMoreInfo);
        assert_eq!(Verdict::from_score(0.349_999_9), Verdict::Legit);
        assert_eq!(Verdict::from_score(0.0), Verdict::Legit);
        assert_eq!(Verdict::from_score(1.0), Verdict::Suspicious);
    }

    #[test]
    fn test_verdict_serializes_snake_case() {
        let json = serde_json::to_string(&Verdict::NeedsMoreInfo).unwrap();
        assert_eq!(json, "\"needs_more_info\"");
        assert_eq!("not_found".parse::<Verdict>().unwrap(), Verdict::NotFound);
    }

    #[test]
    fn test_flagged_verdicts() {
        assert!(Verdict::Suspicious.is_flagged());
        assert!(Verdict::NeedsMoreInfo.is_flagged());
        assert!(!Verdict::Legit.is_flagged());
        assert!(!Verdict::NotFound.is_flagged());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let chunk = RetrievedChunk {
            doc_id: "d".to_string(),
            claim_id: "C100000".to_string(),
            text: "é".repeat(300),
            distance: 0.5,
        };
        let preview = DocPreview::from_chunk(&chunk);
        assert_eq!(preview.text_preview.chars().count(), TEXT_PREVIEW_CHARS);
    }

    #[test]
    fn test_not_found_outcome_shape() {
        let outcome = AnalysisOutcome::NotFound(NotFoundResult::new("C999999"));
        assert_eq!(outcome.verdict(), Verdict::NotFound);
        assert_eq!(outcome.score(), 0.0);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["verdict"], "not_found");
        assert_eq!(json["claim_id"], "C999999");
    }

    #[test]
    fn test_stage1_record_flattens_claim() {
        let record = Stage1Record {
            claim: Claim {
                claim_id: "C100001".to_string(),
                patient_id: "U2000".to_string(),
                provider_id: "P1000".to_string(),
                procedure_code: "PROC_A".to_string(),
                amount: 1200.0,
                claim_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                status: ClaimStatus::Paid,
                is_fraud_label: false,
            },
            provider_total_claims: 3,
            provider_mean_amount: 1000.0,
            q3: 1300.0,
            iqr: 400.0,
            is_amount_outlier: false,
            is_duplicate: false,
            provider_high_volume: true,
            stage1_score: 1,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["claim_id"], "C100001");
        assert_eq!(json["claim_date"], "2025-03-01");
        assert_eq!(json["status"], "paid");
        assert!(record.is_candidate());
    }
}
