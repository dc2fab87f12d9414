//! Transcript quality heuristics.
//!
//! Scores whether a transcript is worth sending to the scoring model: enough
//! sentence-like segments, signs of an actual two-party conversation, limited
//! transcription noise, and some commercial vocabulary. Pure and deterministic.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::count_segments;

/// Minimum score for a transcript to be considered analyzable.
pub const MIN_VALID_SCORE: u8 = 60;
/// Minimum sentence-like segments for a valid transcript.
pub const MIN_SEGMENTS: usize = 5;
/// Minimum character count; shorter transcripts are never valid.
pub const MIN_CHARS: usize = 100;
/// Dialog marker matches required to count as a conversation (strictly more than this).
const DIALOG_THRESHOLD: usize = 3;
const MIN_AVG_SEGMENT_CHARS: f64 = 10.0;
const HIGH_NOISE_RATIO: f64 = 0.10;
const MEDIUM_NOISE_RATIO: f64 = 0.05;

const EMPTY_TRANSCRIPT: &str = "empty transcript";

/// Measurements the score was derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub char_count: usize,
    pub word_count: usize,
    pub segment_count: usize,
    pub avg_segment_chars: f64,
    pub dialog_markers: usize,
    pub noise_markers: usize,
    pub noise_ratio: f64,
    pub business_families: usize,
}

/// Noise band derived from the noise ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseLevel {
    Low,
    Medium,
    High,
}

impl NoiseLevel {
    fn from_ratio(ratio: f64) -> Self {
        if ratio > HIGH_NOISE_RATIO {
            Self::High
        } else if ratio > MEDIUM_NOISE_RATIO {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn penalty(&self) -> i32 {
        match self {
            Self::High => 30,
            Self::Medium => 10,
            Self::Low => 0,
        }
    }
}

/// Result of evaluating one transcript. Recomputed on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// 0-100.
    pub score: u8,
    pub is_valid: bool,
    pub has_dialog: bool,
    pub noise: NoiseLevel,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub metrics: QualityMetrics,
}

/// Whether a transcript should be analyzed, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeDecision {
    pub allow: bool,
    pub reason: String,
}

struct Patterns {
    dialog: Vec<Regex>,
    bracket_tags: Regex,
    ellipsis: Regex,
    fillers: Regex,
    word: Regex,
    business: Vec<Regex>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).unwrap_or_else(|e| panic!("invalid pattern {p}: {e}"));
        Patterns {
            dialog: vec![
                // pronouns
                re(r"(?i)\b(i|you|we|me|my|your|our|je|tu|vous|nous|moi|toi)\b"),
                // greetings
                re(r"(?i)\b(hello|hi|hey|good (morning|afternoon|evening)|bonjour|bonsoir|salut|allo|allô)\b"),
                // questions
                re(r"\?"),
                // yes / no
                re(r"(?i)\b(yes|no|yeah|yep|nope|ok|okay|sure|oui|non|ouais|d'accord)\b"),
            ],
            bracket_tags: re(r"\[[^\]]*\]|\([^)]*(inaudible|unintelligible|crosstalk|silence|noise)[^)]*\)"),
            ellipsis: re(r"\.\.\.|…"),
            fillers: re(r"(?i)\b(uh|uhm|um|umm|erm|hmm|mhm|euh|heu|bah|ben)\b"),
            word: re(r"[\p{L}\p{N}']+"),
            business: vec![
                // commercial terms
                re(r"(?i)\b(price|pricing|cost|quote|offer|discount|contract|invoice|prix|tarif|devis|offre|remise|contrat|facture)\b"),
                // product and service
                re(r"(?i)\b(product|service|solution|software|platform|subscription|license|produit|solution|logiciel|plateforme|abonnement|licence)\b"),
                // meetings and follow-up
                re(r"(?i)\b(meeting|appointment|demo|call back|follow[- ]up|schedule|rendez-vous|rdv|démo|rappeler|relance)\b"),
                // company and needs
                re(r"(?i)\b(company|business|budget|client|customer|team|need|needs|project|entreprise|société|besoin|besoins|projet|équipe)\b"),
            ],
        }
    })
}

/// Evaluate a transcript's suitability for analysis.
pub fn evaluate(text: &str) -> QualityReport {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return QualityReport {
            score: 0,
            is_valid: false,
            has_dialog: false,
            noise: NoiseLevel::Low,
            issues: vec![EMPTY_TRANSCRIPT.to_string()],
            recommendations: vec!["check that the call recording was transcribed".to_string()],
            metrics: QualityMetrics::default(),
        };
    }

    let p = patterns();
    let metrics = measure(trimmed, p);
    let noise = NoiseLevel::from_ratio(metrics.noise_ratio);
    let has_dialog = metrics.dialog_markers > DIALOG_THRESHOLD;

    let mut score: i32 = 100;
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if metrics.segment_count < MIN_SEGMENTS {
        score -= 20;
        issues.push(format!(
            "too few segments ({} < {})",
            metrics.segment_count, MIN_SEGMENTS
        ));
        recommendations.push("transcript may be truncated or lack punctuation".to_string());
    }

    if metrics.avg_segment_chars < MIN_AVG_SEGMENT_CHARS {
        score -= 15;
        issues.push(format!(
            "segments are very short (avg {:.1} chars)",
            metrics.avg_segment_chars
        ));
    }

    if !has_dialog {
        score -= 25;
        issues.push("no dialog detected".to_string());
        recommendations.push("verify the recording contains a conversation".to_string());
    }

    match noise {
        NoiseLevel::High => {
            issues.push(format!(
                "high transcription noise ({:.0}%)",
                metrics.noise_ratio * 100.0
            ));
            recommendations.push("re-transcribe with a better speech model".to_string());
        }
        NoiseLevel::Medium => {
            issues.push(format!(
                "moderate transcription noise ({:.0}%)",
                metrics.noise_ratio * 100.0
            ));
        }
        NoiseLevel::Low => {}
    }
    score -= noise.penalty();

    if metrics.char_count < MIN_CHARS {
        score -= 20;
        issues.push(format!(
            "transcript too short ({} < {} chars)",
            metrics.char_count, MIN_CHARS
        ));
    }

    if metrics.business_families == 0 {
        score -= 15;
        issues.push("no business vocabulary".to_string());
        recommendations.push("call may not be a sales conversation".to_string());
    }

    let score = score.clamp(0, 100) as u8;
    let is_valid = score >= MIN_VALID_SCORE
        && metrics.segment_count >= MIN_SEGMENTS
        && has_dialog
        && metrics.char_count >= MIN_CHARS;

    QualityReport {
        score,
        is_valid,
        has_dialog,
        noise,
        issues,
        recommendations,
        metrics,
    }
}

fn measure(text: &str, p: &Patterns) -> QualityMetrics {
    let char_count = text.chars().count();

    let segment_lengths: Vec<usize> = text
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().count())
        .collect();
    let segment_count = count_segments(text);
    let avg_segment_chars = if segment_lengths.is_empty() {
        0.0
    } else {
        segment_lengths.iter().sum::<usize>() as f64 / segment_lengths.len() as f64
    };

    let dialog_markers = p.dialog.iter().map(|re| re.find_iter(text).count()).sum();

    let words: Vec<&str> = p.word.find_iter(text).map(|m| m.as_str()).collect();
    let word_count = words.len();

    // 1-2 letter tokens are normal in speech; only an excess over a third of
    // all tokens counts as noise.
    let short_tokens = words
        .iter()
        .filter(|w| {
            let n = w.chars().filter(|c| c.is_alphabetic()).count();
            (1..=2).contains(&n)
        })
        .count();
    let short_excess = short_tokens.saturating_sub(word_count / 3);

    let noise_markers = p.bracket_tags.find_iter(text).count()
        + p.ellipsis.find_iter(text).count()
        + p.fillers.find_iter(text).count()
        + short_excess;
    let noise_ratio = noise_markers as f64 / word_count.max(1) as f64;

    let business_families = p.business.iter().filter(|re| re.is_match(text)).count();

    QualityMetrics {
        char_count,
        word_count,
        segment_count,
        avg_segment_chars,
        dialog_markers,
        noise_markers,
        noise_ratio,
        business_families,
    }
}

/// Decide whether a transcript should be analyzed.
pub fn should_analyze(text: &str) -> AnalyzeDecision {
    let report = evaluate(text);
    let reason = if report.issues.is_empty() {
        format!("quality score {}/100", report.score)
    } else {
        format!(
            "quality score {}/100: {}",
            report.score,
            report.issues.join("; ")
        )
    };
    AnalyzeDecision {
        allow: report.is_valid,
        reason,
    }
}
