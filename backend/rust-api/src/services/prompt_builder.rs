use std::fmt::Write as _;

use crate::models::DifficultyProfile;

pub const MAX_REFERENCE_CHARS: usize = 6000;

/// Everything the generation prompt is built from.
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub topic_name: &'a str,
    pub topic_description: Option<&'a str>,
    pub reference_material: Option<&'a str>,
    pub profile: &'a DifficultyProfile,
    pub count: u32,
    /// Set on retries after the previous batch lost questions to validation.
    pub quality_feedback: bool,
}

/// Target split of question kinds for a batch of `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionMix {
    pub recall: u32,
    pub application: u32,
    pub analysis: u32,
}

impl QuestionMix {
    pub fn for_count(count: u32) -> Self {
        let recall = (f64::from(count) * 0.3).round() as u32;
        let application = ((f64::from(count) * 0.4).round() as u32).min(count - recall);
        Self {
            recall,
            application,
            analysis: count - recall - application,
        }
    }
}

pub fn build_generation_prompt(input: &PromptInput<'_>) -> String {
    let mix = QuestionMix::for_count(input.count);
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Create exactly {} multiple-choice questions on the topic \"{}\".",
        input.count,
        input.topic_name.trim()
    );
    if let Some(description) = non_empty(input.topic_description) {
        let _ = writeln!(prompt, "Topic description: {}", description);
    }
    let _ = writeln!(
        prompt,
        "Difficulty: {} ({}).",
        input.profile.tier, input.profile.complexity_descriptor
    );

    if let Some(material) = non_empty(input.reference_material) {
        let excerpt: String = material.chars().take(MAX_REFERENCE_CHARS).collect();
        let _ = writeln!(
            prompt,
            "\nBase the questions on this reference material:\n\"\"\"\n{}\n\"\"\"",
            excerpt
        );
    }

    let _ = writeln!(
        prompt,
        "\nQuestion mix: {} recall, {} application, {} analysis.",
        mix.recall, mix.application, mix.analysis
    );

    prompt.push_str(
        "\nQuality rules:\n\
         - Every question has exactly one correct answer.\n\
         - Wrong options must be plausible and about the same length as the correct one.\n\
         - Ask one thing per question; no double-barreled questions.\n\
         - Never use \"all of the above\" or \"none of the above\" as an option.\n\
         - All four options must be different.\n\
         - The explanation says why the correct answer is right in at least one full sentence.\n",
    );

    if input.quality_feedback {
        prompt.push_str(
            "\nSome earlier questions were rejected for being too short, having duplicate \
             or placeholder options, or missing explanations. Pay extra attention to the \
             quality rules above.\n",
        );
    }

    prompt.push_str(
        "\nFormat every question exactly like this, with no other text:\n\
         Question 1: <question text>\n\
         A) <option>\n\
         B) <option>\n\
         C) <option>\n\
         D) <option>\n\
         Answer: <letter>\n\
         Explanation: <why the answer is correct>\n\
         Type: <recall|application|analysis>\n",
    );

    prompt
}

/// Prompt asking for study advice after a submission with mistakes.
pub fn build_advice_prompt(result_percent: u32, missed: &[(String, String)]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "A student scored {}% on a test. These are the questions they got wrong, \
         each with the explanation of the correct answer:",
        result_percent
    );
    for (index, (question, explanation)) in missed.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}\n   Explanation: {}", index + 1, question, explanation);
    }
    prompt.push_str(
        "\nWrite short, encouraging study advice (at most 5 sentences) that names the \
         concepts to revisit. Do not repeat the questions verbatim.",
    );
    prompt
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
