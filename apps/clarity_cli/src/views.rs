//! Text renderings of controller snapshots. Pure functions of their input.

use client_core::{View, ViewSnapshot};
use shared::domain::{AnalysisResult, AuthMode, HistoryEntry, JargonTerm, SpeakerScore};

pub const NO_HISTORY: &str = "No history yet. Run at least one meeting.";
pub const NOT_ENOUGH_HISTORY: &str = "Run at least two meetings to see the trend.";
pub const NO_SPEAKERS: &str = "No speaker scores available.";
pub const NO_JARGON: &str = "No high-impact jargon detected.";

const TREND_BAR_WIDTH: usize = 40;

pub fn render(snapshot: &ViewSnapshot) -> String {
    match (snapshot.view, snapshot.analysis.as_ref()) {
        (View::Unauthenticated, _) => render_auth(snapshot.auth_mode, snapshot.loading),
        (View::Presenting, Some(analysis)) => render_results(analysis, &snapshot.history),
        (View::AwaitingInput, _) | (View::Presenting, None) => {
            render_upload(&snapshot.identity, &snapshot.history, snapshot.loading)
        }
    }
}

pub fn render_auth(mode: AuthMode, loading: bool) -> String {
    if loading {
        return "Please wait...".to_string();
    }
    match mode {
        AuthMode::Login => [
            "Log in",
            "  clarity login --username <NAME> --password <PASSWORD>",
            "Need an account? clarity signup --username <NAME> --password <PASSWORD>",
        ]
        .join("\n"),
        AuthMode::Signup => [
            "Sign up",
            "  clarity signup --username <NAME> --password <PASSWORD>",
            "Already have an account? clarity login --username <NAME> --password <PASSWORD>",
        ]
        .join("\n"),
    }
}

pub fn render_upload(identity: &str, history: &[HistoryEntry], loading: bool) -> String {
    if loading {
        return "Analyzing...".to_string();
    }
    [
        format!("Signed in as {identity}"),
        "Upload meeting video".to_string(),
        "  clarity analyze <PATH.mp4>".to_string(),
        String::new(),
        "Clarity trend".to_string(),
        render_history(history),
    ]
    .join("\n")
}

pub fn render_results(analysis: &AnalysisResult, history: &[HistoryEntry]) -> String {
    [
        "Meeting Clarity Index".to_string(),
        format!("  {}/100", analysis.clarity_index),
        format!("  {}", analysis.overall_summary),
        String::new(),
        format!(
            "Total words: {}   Jargon terms: {}   Speakers: {}",
            analysis.total_words,
            analysis.total_jargon_count,
            analysis.speaker_scores.len()
        ),
        String::new(),
        "Clarity trend".to_string(),
        render_history(history),
        String::new(),
        "Speaker scores".to_string(),
        render_speakers(&analysis.speaker_scores),
        String::new(),
        "Top jargon terms".to_string(),
        render_jargon(&analysis.top_jargon_terms),
        String::new(),
        "Transcript".to_string(),
        analysis.transcript.clone(),
        String::new(),
        "Analyze another meeting: clarity analyze <PATH.mp4>".to_string(),
    ]
    .join("\n")
}

pub fn render_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return NO_HISTORY.to_string();
    }
    render_trend(history)
}

/// One row per entry, in the order the service returned them.
pub fn render_trend(history: &[HistoryEntry]) -> String {
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return NOT_ENOUGH_HISTORY.to_string();
    };
    if history.len() < 2 {
        return NOT_ENOUGH_HISTORY.to_string();
    }

    let mut lines: Vec<String> = history
        .iter()
        .map(|entry| {
            let filled = usize::from(entry.clarity_index.min(100)) * TREND_BAR_WIDTH / 100;
            format!(
                "  {}  {:<width$} {:>3}",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                "#".repeat(filled),
                entry.clarity_index,
                width = TREND_BAR_WIDTH
            )
        })
        .collect();
    let delta = i16::from(last.clarity_index) - i16::from(first.clarity_index);
    lines.push(format!(
        "  {delta:+} since first meeting ({} meetings)",
        history.len()
    ));
    lines.join("\n")
}

pub fn render_speakers(scores: &[SpeakerScore]) -> String {
    if scores.is_empty() {
        return NO_SPEAKERS.to_string();
    }
    scores
        .iter()
        .map(|s| format!("  {}: {:.2}", s.speaker, s.score))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_jargon(terms: &[JargonTerm]) -> String {
    if terms.is_empty() {
        return NO_JARGON.to_string();
    }
    let width = terms
        .iter()
        .map(|t| t.term.chars().count())
        .max()
        .unwrap_or(0)
        .max("Term".len());
    let mut lines = vec![format!("  {:<width$}  {:>4}  {:>6}", "Term", "Freq", "Weight")];
    lines.extend(
        terms
            .iter()
            .map(|t| format!("  {:<width$}  {:>4}  {:>6}", t.term, t.freq, t.weight)),
    );
    lines.join("\n")
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
