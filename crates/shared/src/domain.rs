use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Login,
    Signup,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Login => Self::Signup,
            Self::Signup => Self::Login,
        }
    }

    /// Path segment of the remote operation backing this mode.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Signup => "signup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerScore {
    pub speaker: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JargonTerm {
    pub term: String,
    pub freq: u32,
    pub weight: f64,
}

/// Report produced by one successful analysis. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub clarity_index: u8,
    pub overall_summary: String,
    pub total_words: u64,
    pub total_jargon_count: u64,
    #[serde(default)]
    pub speaker_scores: Vec<SpeakerScore>,
    #[serde(default)]
    pub top_jargon_terms: Vec<JargonTerm>,
    #[serde(default)]
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub clarity_index: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_jargon_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
}

impl HistoryEntry {
    pub fn new(created_at: DateTime<Utc>, clarity_index: u8) -> Self {
        Self {
            created_at,
            clarity_index,
            id: None,
            meeting_label: None,
            total_jargon_count: None,
            duration_sec: None,
        }
    }
}

/// Parses RFC 3339 timestamps, or naive ISO-8601 ones which the service emits in UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn toggling_auth_mode_alternates() {
        assert_eq!(AuthMode::Login.toggled(), AuthMode::Signup);
        assert_eq!(AuthMode::Signup.toggled().toggled(), AuthMode::Signup);
        assert_eq!(AuthMode::Signup.endpoint(), "signup");
    }

    #[test]
    fn history_entry_accepts_naive_service_timestamps() {
        let entry: HistoryEntry = serde_json::from_str(
            r#"{"id":"m1","created_at":"2024-05-01T10:30:00.123456","meeting_label":"standup.mp4","clarity_index":72,"total_jargon_count":4,"duration_sec":61.5}"#,
        )
        .expect("decode");
        assert_eq!(entry.clarity_index, 72);
        assert_eq!(entry.meeting_label.as_deref(), Some("standup.mp4"));
        assert_eq!(
            entry.created_at.date_naive(),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap().date_naive()
        );
    }

    #[test]
    fn history_entry_requires_only_timestamp_and_index() {
        let entry: HistoryEntry =
            serde_json::from_str(r#"{"created_at":"2024-05-01T10:30:00Z","clarity_index":40}"#)
                .expect("decode");
        assert_eq!(
            entry,
            HistoryEntry::new(Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(), 40)
        );
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn analysis_result_uses_service_field_names() {
        let result: AnalysisResult = serde_json::from_str(
            r#"{
                "clarity_index": 81,
                "total_words": 1200,
                "total_jargon_count": 3,
                "overall_summary": "Mostly clear.",
                "speaker_scores": [{"speaker": "A", "score": 0.4}],
                "top_jargon_terms": [{"term": "synergy", "freq": 2, "weight": 0.8}],
                "transcript": "hello"
            }"#,
        )
        .expect("decode");
        assert_eq!(result.clarity_index, 81);
        assert_eq!(result.speaker_scores[0].speaker, "A");
        assert_eq!(result.top_jargon_terms[0].freq, 2);
    }
}
