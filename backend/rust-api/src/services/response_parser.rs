//! Line grammar for generated question batches.
//!
//! A batch is split on question markers (`Question 3:`, `Q3.`, `3.`, with
//! optional `**` emphasis) found at the start of a line. Once a segment has
//! reached its answer or explanation, a bare `3.` only opens a new segment when
//! option lines follow it, so numbered steps stay inside the explanation. Each
//! segment either yields a candidate or a [`DiscardReason`]; discards never
//! fail the batch.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::metrics::QUESTIONS_DISCARDED_TOTAL;
use crate::models::question::{renumber, OPTION_IDS};
use crate::models::{OptionRecord, QuestionRecord, QuestionType};

lazy_static! {
    static ref NAMED_MARKER: Regex =
        Regex::new(r"(?i)^\s*(?:\*\*|__)?\s*(?:question\s*\d+|q\s*\d+)\s*[:.)]\s*(?:\*\*|__)?\s*").unwrap();
    static ref BARE_MARKER: Regex = Regex::new(r"^\s*(?:\*\*|__)?\s*\d+\s*[:.)]\s*(?:\*\*|__)?\s*").unwrap();
    static ref OPTION_LINE: Regex = Regex::new(r"^\s*(?:\*\*)?([A-Za-z])\s*[).](?:\*\*)?\s+(.+)$").unwrap();
    static ref ANSWER_LINE: Regex =
        Regex::new(r"(?i)^\s*(?:\*\*)?\s*(?:correct\s+)?answer\s*(?:\*\*)?\s*[:\-]\s*(?:\*\*)?\s*\(?([a-z])\b").unwrap();
    static ref EXPLANATION_LINE: Regex =
        Regex::new(r"(?i)^\s*(?:\*\*)?\s*explanation\s*(?:\*\*)?\s*:\s*(?:\*\*)?\s*(.*)$").unwrap();
    static ref TYPE_LINE: Regex =
        Regex::new(r"(?i)^\s*(?:\*\*)?\s*type\s*(?:\*\*)?\s*:\s*(?:\*\*)?\s*(.*)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    MissingQuestionText,
    MissingAnswer,
    OptionCount(usize),
    OptionLetters,
    AnswerNotInOptions(String),
}

impl DiscardReason {
    pub fn label(&self) -> &'static str {
        match self {
            DiscardReason::MissingQuestionText => "missing_question_text",
            DiscardReason::MissingAnswer => "missing_answer",
            DiscardReason::OptionCount(_) => "option_count",
            DiscardReason::OptionLetters => "option_letters",
            DiscardReason::AnswerNotInOptions(_) => "answer_not_in_options",
        }
    }
}

#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub candidates: Vec<QuestionRecord>,
    pub discarded: Vec<DiscardReason>,
}

/// Parses a raw batch. Survivors get provisional ids `q1..` in segment order.
pub fn parse_batch(raw: &str) -> ParsedBatch {
    let mut batch = ParsedBatch::default();

    for (index, segment) in split_segments(raw).iter().enumerate() {
        match parse_segment(segment) {
            Ok(candidate) => batch.candidates.push(candidate),
            Err(reason) => {
                tracing::debug!(segment = index + 1, reason = ?reason, "Discarding generated question");
                QUESTIONS_DISCARDED_TOTAL
                    .with_label_values(&["parse", reason.label()])
                    .inc();
                batch.discarded.push(reason);
            }
        }
    }

    renumber(&mut batch.candidates);
    batch
}

/// Text before the first marker is dropped. The marker itself is stripped, so
/// a segment starts with whatever followed it on the marker line.
fn split_segments(raw: &str) -> Vec<String> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut segments: Vec<Vec<&str>> = Vec::new();
    let mut past_answer = false;

    for (index, &line) in lines.iter().enumerate() {
        let marker = NAMED_MARKER.find(line).or_else(|| {
            BARE_MARKER
                .find(line)
                .filter(|_| !past_answer || options_follow(&lines[index + 1..]))
        });

        if let Some(marker) = marker {
            segments.push(vec![&line[marker.end()..]]);
            past_answer = false;
        } else if let Some(current) = segments.last_mut() {
            if ANSWER_LINE.is_match(line) || EXPLANATION_LINE.is_match(line) {
                past_answer = true;
            }
            current.push(line);
        }
    }

    segments.into_iter().map(|lines| lines.join("\n")).collect()
}

fn options_follow(rest: &[&str]) -> bool {
    rest.iter()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| OPTION_LINE.is_match(line))
}

pub fn parse_segment(segment: &str) -> Result<QuestionRecord, DiscardReason> {
    let mut lines = segment.lines();

    let text = lines
        .by_ref()
        .map(strip_emphasis)
        .find(|line| !line.is_empty())
        .ok_or(DiscardReason::MissingQuestionText)?;

    let mut options: Vec<(String, String)> = Vec::new();
    let mut answer: Option<String> = None;
    let mut explanation: Vec<String> = Vec::new();
    let mut in_explanation = false;
    let mut question_type = None;

    for line in lines {
        if let Some(caps) = TYPE_LINE.captures(line) {
            in_explanation = false;
            question_type = QuestionType::parse(strip_emphasis(&caps[1]).as_str());
        } else if let Some(caps) = EXPLANATION_LINE.captures(line) {
            in_explanation = true;
            explanation.push(strip_emphasis(&caps[1]));
        } else if let Some(caps) = ANSWER_LINE.captures(line) {
            in_explanation = false;
            answer = Some(caps[1].to_ascii_lowercase());
        } else if in_explanation {
            explanation.push(line.trim().to_string());
        } else if answer.is_none() {
            if let Some(caps) = OPTION_LINE.captures(line) {
                options.push((caps[1].to_ascii_lowercase(), strip_emphasis(&caps[2])));
            }
        }
    }

    let answer = answer.ok_or(DiscardReason::MissingAnswer)?;

    if options.len() != OPTION_IDS.len() {
        return Err(DiscardReason::OptionCount(options.len()));
    }

    let by_letter: BTreeMap<String, String> = options.into_iter().collect();
    if by_letter.len() != OPTION_IDS.len() || !OPTION_IDS.iter().all(|id| by_letter.contains_key(*id)) {
        return Err(DiscardReason::OptionLetters);
    }
    if !by_letter.contains_key(&answer) {
        return Err(DiscardReason::AnswerNotInOptions(answer));
    }

    Ok(QuestionRecord {
        question_id: String::new(),
        text,
        options: by_letter
            .into_iter()
            .map(|(option_id, text)| OptionRecord { option_id, text })
            .collect(),
        correct_option_id: answer,
        explanation: explanation
            .into_iter()
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        question_type,
    })
}

fn strip_emphasis(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c| c == '*' || c == '_')
        .trim()
        .to_string()
}
