//! Call records as returned by the store, and the work item projection.

use serde::{Deserialize, Serialize};

/// Analysis status written back to the store after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A call row as returned by the store's candidate listing.
///
/// Only the fields the scheduler reads are modeled; unknown columns are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRow {
    pub id: String,
    #[serde(default)]
    pub transcript: Option<String>,
    /// Formatted duration ("HH:MM:SS"); takes priority over `duration_seconds`.
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub call_status: Option<String>,
    #[serde(default)]
    pub analysis_status: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
}

impl CallRow {
    /// Duration in whole seconds, preferring the formatted field.
    pub fn duration_secs(&self) -> u64 {
        if let Some(secs) = self.duration.as_deref().and_then(parse_hms) {
            return secs;
        }
        self.duration_seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(|s| s as u64)
            .unwrap_or(0)
    }

    pub fn transcript_text(&self) -> &str {
        self.transcript.as_deref().unwrap_or("")
    }

    pub fn segment_count(&self) -> usize {
        count_segments(self.transcript_text())
    }

    /// Project this row into the fields the batch processor needs.
    pub fn to_work_item(&self) -> WorkItem {
        WorkItem {
            id: self.id.clone(),
            transcript: self.transcript_text().to_string(),
            duration_secs: self.duration_secs(),
            segment_count: self.segment_count(),
            company_name: non_empty(self.company_name.as_deref()),
            contact_name: non_empty(self.contact_name.as_deref()),
        }
    }
}

/// A call selected for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub transcript: String,
    pub duration_secs: u64,
    pub segment_count: usize,
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
}

impl WorkItem {
    /// Label shown in progress output: company, then contact, then "Call N".
    pub fn display_label(&self, index: usize) -> String {
        self.company_name
            .clone()
            .or_else(|| self.contact_name.clone())
            .unwrap_or_else(|| format!("Call {}", index + 1))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse "HH:MM:SS", "MM:SS" or bare seconds. Fractional seconds are truncated.
pub fn parse_hms(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let (last, rest) = parts.split_last()?;
    let seconds: f64 = last.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let mut total = 0u64;
    for part in rest {
        let n: u64 = part.trim().parse().ok()?;
        total = total.checked_mul(60)?.checked_add(n)?;
    }

    total.checked_mul(60)?.checked_add(seconds as u64)
}

/// Count sentence-like segments: runs of text separated by `.`, `!`, `?` or newlines.
pub fn count_segments(text: &str) -> usize {
    text.split(['.', '!', '?', '\n'])
        .filter(|s| !s.trim().is_empty())
        .count()
}
