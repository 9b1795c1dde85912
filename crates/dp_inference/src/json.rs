use serde_json::{Map, Value};

/// Every JSON object embedded in `text`, in order of appearance.
///
/// Scanning restarts after the end of each object found, so nested objects
/// are not reported separately.
pub fn embedded_objects(text: &str) -> Vec<Map<String, Value>> {
    let mut objects = Vec::new();
    let mut offset = 0;

    while let Some(pos) = text[offset..].find('{') {
        let start = offset + pos;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => {
                objects.push(map);
                offset = start + stream.byte_offset();
            }
            _ => offset = start + 1,
        }
    }

    objects
}

/// Contents of a ```-fenced block wrapping the whole text, if any.
pub fn strip_code_fence(text: &str) -> Option<&str> {
    let text = text.trim();
    if !text.starts_with("```") {
        return None;
    }
    // The closing fence must not overlap the opening one.
    let closing = 3 + text[3..].rfind("```")?;
    let inner = match text.find('\n') {
        Some(newline) if newline < closing => &text[newline + 1..closing],
        _ => &text[3..closing],
    };
    let inner = inner.trim();
    (!inner.is_empty()).then_some(inner)
}

/// The JSON object a model answered with: the whole text, a fenced block,
/// or the first object embedded in prose.
pub fn response_object(text: &str) -> Option<Map<String, Value>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let candidates = strip_code_fence(text).into_iter().chain(std::iter::once(text));
    for candidate in candidates {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
            return Some(map);
        }
    }

    embedded_objects(text).into_iter().next()
}
