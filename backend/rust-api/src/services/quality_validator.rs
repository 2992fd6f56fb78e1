use std::collections::HashSet;

use crate::models::QuestionRecord;

pub const MIN_QUESTION_CHARS: usize = 10;
pub const MIN_EXPLANATION_CHARS: usize = 20;
pub const MIN_OPTION_CHARS: usize = 3;

const DEGENERATE_OPTIONS: [&str; 8] = [
    "all of the above",
    "none of the above",
    "unknown",
    "all of these",
    "none of these",
    "i don't know",
    "not sure",
    "n/a",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    QuestionTooShort,
    ExplanationTooShort,
    OptionTooShort(String),
    DuplicateOptions,
    DegenerateOption(String),
}

impl Rejection {
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::QuestionTooShort => "question_too_short",
            Rejection::ExplanationTooShort => "explanation_too_short",
            Rejection::OptionTooShort(_) => "option_too_short",
            Rejection::DuplicateOptions => "duplicate_options",
            Rejection::DegenerateOption(_) => "degenerate_option",
        }
    }
}

/// First rule the candidate breaks, if any.
pub fn evaluate(question: &QuestionRecord) -> Result<(), Rejection> {
    if char_len(&question.text) < MIN_QUESTION_CHARS {
        return Err(Rejection::QuestionTooShort);
    }
    if char_len(&question.explanation) < MIN_EXPLANATION_CHARS {
        return Err(Rejection::ExplanationTooShort);
    }

    let mut seen = HashSet::new();
    for option in &question.options {
        if char_len(&option.text) < MIN_OPTION_CHARS {
            return Err(Rejection::OptionTooShort(option.option_id.clone()));
        }
        let normalized = option.text.trim().to_lowercase();
        if is_degenerate(&normalized) {
            return Err(Rejection::DegenerateOption(option.option_id.clone()));
        }
        if !seen.insert(normalized) {
            return Err(Rejection::DuplicateOptions);
        }
    }

    Ok(())
}

pub fn accepts(question: &QuestionRecord) -> bool {
    evaluate(question).is_ok()
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

fn is_degenerate(normalized: &str) -> bool {
    let bare = normalized.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '/');
    DEGENERATE_OPTIONS.contains(&bare) || normalized.contains("of the above")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionRecord;

    fn question(options: [&str; 4], explanation: &str) -> QuestionRecord {
        QuestionRecord {
            question_id: "q1".to_string(),
            text: "Which fraction is the largest?".to_string(),
            options: options
                .iter()
                .zip(["a", "b", "c", "d"])
                .map(|(text, id)| OptionRecord {
                    option_id: id.to_string(),
                    text: text.to_string(),
                })
                .collect(),
            correct_option_id: "a".to_string(),
            explanation: explanation.to_string(),
            question_type: None,
        }
    }

    const GOOD_EXPLANATION: &str = "Three quarters is bigger than the other options.";

    #[test]
    fn well_formed_question_passes() {
        assert!(accepts(&question(["3/4", "1/2", "2/5", "1/3"], GOOD_EXPLANATION)));
    }

    #[test]
    fn short_explanation_is_rejected() {
        let candidate = question(["3/4", "1/2", "2/5", "1/3"], "Because it is.");
        assert_eq!(evaluate(&candidate), Err(Rejection::ExplanationTooShort));
    }

    #[test]
    fn short_question_is_rejected() {
        let mut candidate = question(["3/4", "1/2", "2/5", "1/3"], GOOD_EXPLANATION);
        candidate.text = "  Largest? ".to_string();
        assert_eq!(evaluate(&candidate), Err(Rejection::QuestionTooShort));
    }

    #[test]
    fn short_option_is_rejected() {
        let candidate = question(["3/4", "1", "2/5", "1/3"], GOOD_EXPLANATION);
        assert_eq!(
            evaluate(&candidate),
            Err(Rejection::OptionTooShort("b".to_string()))
        );
    }

    #[test]
    fn duplicate_options_ignore_case_and_padding() {
        let candidate = question(["Half", " half ", "Third", "Quarter"], GOOD_EXPLANATION);
        assert_eq!(evaluate(&candidate), Err(Rejection::DuplicateOptions));
    }

    #[test]
    fn degenerate_options_are_rejected() {
        for filler in ["All of the above.", "N/A", "Not sure!", "Both of the above"] {
            let candidate = question(["Half", "Third", "Quarter", filler], GOOD_EXPLANATION);
            assert_eq!(
                evaluate(&candidate),
                Err(Rejection::DegenerateOption("d".to_string())),
                "{filler} should be rejected"
            );
        }
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let mut candidate = question(["π/2", "π/3", "π/4", "π/6"], GOOD_EXPLANATION);
        candidate.text = "Какой угол?".to_string();
        assert!(accepts(&candidate));
    }
}
