//! Prompt text for every agent role. Prompts only contain data taken from
//! their input, so identical input always yields an identical prompt.

use dp_core::ContentKind;

pub const SUMMARIZER_ROLE: &str = "summarizer";
pub const EDITOR_ROLE: &str = "editor";
pub const TIP_GENERATOR_ROLE: &str = "tip-generator";
pub const TIP_EDITOR_ROLE: &str = "tip-editor";

/// Marker preceding the input JSON; the input is always the last object in
/// the prompt.
pub const INPUT_MARKER: &str = "Input:";

pub fn summarizer_role(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Article => SUMMARIZER_ROLE,
        ContentKind::Tip => TIP_GENERATOR_ROLE,
    }
}

pub fn editor_role(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Article => EDITOR_ROLE,
        ContentKind::Tip => TIP_EDITOR_ROLE,
    }
}

const ARTICLE_SUMMARY_INSTRUCTIONS: &str = r#"You turn research updates into actionable articles for readers seeking healthy ageing guidance.
Write with an encouraging, trustworthy tone.
Use the research note below to draft a concise article.
Return valid JSON with the shape:
{"title": "string", "summary": "2-3 sentence overview", "body": "Markdown formatted body", "takeaways": ["bullet"], "tags": ["keyword"]}"#;

const TIP_SUMMARY_INSTRUCTIONS: &str = r#"You craft concise, actionable longevity tips for busy readers.
Keep the tone encouraging, evidence-informed and accessible.
Using the research note below, create a single tip people can apply today.
Return valid JSON with the shape:
{"title": "short tip title", "summary": "one sentence", "body": "1-2 paragraph Markdown explanation", "tags": ["keyword"]}"#;

const ARTICLE_EDIT_INSTRUCTIONS: &str = r#"You are the editor of an evidence-informed longevity publication.
Review the draft article for clarity, accuracy and tone. Keep claims grounded in the source,
add a reader-friendly summary and a single-sentence disclaimer reminding readers to consult
healthcare professionals.
Return valid JSON with the shape:
{"title": "Updated headline", "summary": "2-3 sentence refined overview", "body": "Rewritten Markdown body", "takeaways": ["Key lesson"], "tags": ["keyword"], "disclaimer": "Short disclaimer"}"#;

const TIP_EDIT_INSTRUCTIONS: &str = r#"You are the editor of an evidence-informed longevity publication.
Tighten the draft tip so it is short, safe and actionable.
Return valid JSON with the shape:
{"title": "short tip title", "summary": "one sentence", "body": "Polished Markdown body", "tags": ["keyword"]}"#;

pub fn summarizer_instructions(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Article => ARTICLE_SUMMARY_INSTRUCTIONS,
        ContentKind::Tip => TIP_SUMMARY_INSTRUCTIONS,
    }
}

pub fn editor_instructions(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Article => ARTICLE_EDIT_INSTRUCTIONS,
        ContentKind::Tip => TIP_EDIT_INSTRUCTIONS,
    }
}

pub fn render(instructions: &str, input_json: &str) -> String {
    format!("{}\n\n{}\n{}\n", instructions, INPUT_MARKER, input_json)
}
