//! Tolerant line parser for model output.
//!
//! Each line is expected to look like `phrase | confidence | tag1, tag2`.
//! Common drift is accepted (bullets, numbering, `phrase: 0.8`, `phrase (80%)`).
//! Lines that cannot be read are collected as rejects, never raised.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*•]+\s*|\d+[.)]\s+)").unwrap());
static SEPARATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<phrase>.+?)\s*(?:[:,=]|\s-)\s*(?P<conf>[+-]?\d+(?:\.\d+)?%?)$").unwrap()
});
static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<phrase>.+?)\s*[(\[](?P<conf>[+-]?\d+(?:\.\d+)?%?)[)\]]$").unwrap()
});

/// One successfully parsed line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub phrase: String,
    pub confidence: f64,
    pub tags: BTreeSet<String>,
}

/// A line that could not be parsed, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReject {
    pub line_no: usize,
    pub line: String,
    pub reason: String,
}

/// Result of parsing a whole completion.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub entries: Vec<ParsedLine>,
    pub rejects: Vec<ParseReject>,
}

/// Parse every line of a completion.
pub fn parse_candidate_lines(text: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("```") {
            continue;
        }
        match parse_line(line) {
            Ok(entry) => outcome.entries.push(entry),
            Err(reason) => outcome.rejects.push(ParseReject {
                line_no: idx + 1,
                line: line.to_string(),
                reason,
            }),
        }
    }

    outcome
}

fn parse_line(line: &str) -> Result<ParsedLine, String> {
    let body = LIST_MARKER.replace(line, "");
    let body = body.trim();

    let (phrase, conf, tags) = if body.contains('|') || body.contains('\t') {
        let mut fields = body.split(|c: char| c == '|' || c == '\t').map(str::trim);
        let phrase = fields.next().unwrap_or_default();
        let conf = fields.next().ok_or("missing confidence")?;
        let tags = fields.next().unwrap_or_default();
        (phrase, conf, tags)
    } else if let Some(caps) = PARENTHESIZED
        .captures(body)
        .or_else(|| SEPARATED.captures(body))
    {
        let phrase = caps.name("phrase").map_or("", |m| m.as_str());
        let conf = caps.name("conf").map_or("", |m| m.as_str());
        (phrase, conf, "")
    } else {
        return Err("no confidence found".into());
    };

    let phrase = strip_quotes(phrase);
    if phrase.is_empty() {
        return Err("empty phrase".into());
    }
    let confidence = parse_confidence(conf)?;

    let tags: BTreeSet<String> = tags
        .split(',')
        .map(|t| strip_quotes(t).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(ParsedLine {
        phrase: phrase.to_string(),
        confidence,
        tags,
    })
}

fn parse_confidence(raw: &str) -> Result<f64, String> {
    let raw = raw.trim();
    let (number, scale) = match raw.strip_suffix('%') {
        Some(n) => (n.trim(), 100.0),
        None => (raw, 1.0),
    };
    let value: f64 = number
        .parse()
        .map_err(|_| format!("confidence {:?} is not a number", raw))?;
    let value = value / scale;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("confidence {} outside [0, 1]", value));
    }
    Ok(value)
}

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '`').trim()
}
