use std::fmt;

use async_trait::async_trait;
use dp_core::text::truncate_chars;
use dp_core::{Constraints, Error, Responder, Result};
use serde_json::{json, Map, Value};

use crate::agents::prompts::{EDITOR_ROLE, INPUT_MARKER, SUMMARIZER_ROLE, TIP_EDITOR_ROLE, TIP_GENERATOR_ROLE};
use crate::json::embedded_objects;

const SUMMARY_CHARS: usize = 220;
const DISCLAIMER: &str =
    "This content is for educational purposes only and is not a substitute for professional medical advice.";

/// Offline responder that answers every role with well-formed JSON built
/// from the prompt's input. Same prompt in, same text out.
#[derive(Default)]
pub struct LocalResponder;

impl fmt::Debug for LocalResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalResponder").finish()
    }
}

impl LocalResponder {
    pub fn new() -> Self {
        Self
    }
}

fn prompt_input(prompt: &str) -> Result<Map<String, Value>> {
    let input = prompt
        .rfind(INPUT_MARKER)
        .map(|idx| &prompt[idx + INPUT_MARKER.len()..])
        .unwrap_or(prompt);
    embedded_objects(input)
        .into_iter()
        .next()
        .ok_or_else(|| Error::Responder("local responder found no JSON input in the prompt".to_string()))
}

fn field<'a>(input: &'a Map<String, Value>, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).map(str::trim).unwrap_or_default()
}

fn string_list(input: &Map<String, Value>, key: &str) -> Vec<String> {
    input
        .get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn first_sentence(text: &str) -> &str {
    match text.find(". ") {
        Some(idx) => &text[..=idx],
        None => text,
    }
}

fn draft_payload(input: &Map<String, Value>, tip: bool, max_length: usize) -> Value {
    let title = match field(input, "title") {
        "" => "Untitled update",
        title => title,
    };
    let note = match field(input, "summary") {
        "" => title,
        note => note,
    };
    let summary = truncate_chars(note, SUMMARY_CHARS).trim();

    let mut tags = vec!["longevity".to_string()];
    if let Some(topic) = input.get("topic").and_then(Value::as_str).filter(|t| !t.trim().is_empty()) {
        tags.push(topic.to_string());
    }

    if tip {
        let body = format!("{}\n\nTry it today: {}", summary, first_sentence(summary));
        json!({
            "title": format!("Tip: {}", title),
            "summary": first_sentence(summary),
            "body": truncate_chars(&body, max_length),
            "tags": tags,
        })
    } else {
        let mut body = format!("### {}\n\n{}", title, note);
        let source = field(input, "source_url");
        if !source.is_empty() {
            body.push_str(&format!("\n\nSource: {}", source));
        }
        json!({
            "title": title,
            "summary": summary,
            "body": truncate_chars(&body, max_length),
            "takeaways": [first_sentence(summary)],
            "tags": tags,
        })
    }
}

fn edit_payload(input: &Map<String, Value>, tip: bool, max_length: usize) -> Value {
    let body = field(input, "body");
    let mut edited = json!({
        "title": field(input, "title"),
        "summary": field(input, "summary"),
        "body": truncate_chars(body, max_length),
        "tags": string_list(input, "tags"),
    });
    if !tip {
        edited["takeaways"] = json!(string_list(input, "takeaways"));
        edited["disclaimer"] = json!(DISCLAIMER);
    }
    edited
}

#[async_trait]
impl Responder for LocalResponder {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, prompt: &str, constraints: &Constraints) -> Result<String> {
        let input = prompt_input(prompt)?;
        let payload = match constraints.role.as_str() {
            SUMMARIZER_ROLE => draft_payload(&input, false, constraints.max_length),
            TIP_GENERATOR_ROLE => draft_payload(&input, true, constraints.max_length),
            EDITOR_ROLE => edit_payload(&input, false, constraints.max_length),
            TIP_EDITOR_ROLE => edit_payload(&input, true, constraints.max_length),
            other => return Err(Error::Responder(format!("local responder has no behaviour for role '{}'", other))),
        };
        Ok(serde_json::to_string(&payload)?)
    }
}
