//! Request Analyzer
//!
//! Derives a capability [`RequirementProfile`] from a raw chat or embeddings
//! request body. The analysis is heuristic and read-only: the original body is
//! never mutated, and unknown fields are ignored.

use serde_json::Value;

/// Substrings whose presence in the prompt marks the request as code-bearing.
const CODE_MARKERS: &[&str] = &[
    "def ",
    "class ",
    "import ",
    "const ",
    "let ",
    "var ",
    "function ",
    "public static void",
    "int main(",
    "async def",
    "return ",
    "if __name__",
    "package ",
    "namespace ",
];

/// Prompt vocabulary signalling a need for fresh external data.
const FRESHNESS_MARKERS: &[&str] = &[
    "current",
    "latest",
    "now",
    "today",
    "recent",
    "what's happening",
    "price of",
    "stock",
    "weather",
    "news",
    "breaking",
    "live",
];

/// Message-level vocabulary signalling web-search or grounding context.
const GROUNDING_MARKERS: &[&str] = &["web_search", "internet", "grounding", "real-time", "live data"];

/// Prompt vocabulary requesting explicit reasoning.
const REASONING_MARKERS: &[&str] = &["think", "step by step", "chain of thought", "reasoning"];

/// Content-part `type` tags that carry image payloads.
const IMAGE_PART_TYPES: &[&str] = &["image", "image_url", "input_image"];

/// Capability requirements inferred from one request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementProfile {
    pub has_images: bool,
    pub contains_code: bool,
    pub requires_tool_calling: bool,
    pub requires_internet: bool,
    pub requires_thinking: bool,
    pub requires_fast: bool,
    /// Character length of the extracted prompt text
    pub prompt_length: usize,
    /// Number of entries in the `messages` array
    pub message_count: usize,
}

impl RequirementProfile {
    /// Analyze a request body.
    pub fn from_body(body: &Value) -> Self {
        let prompt = extract_prompt(body);
        let prompt_lower = prompt.to_lowercase();
        let messages = body.get("messages").and_then(Value::as_array);

        let has_images = truthy(body.get("images"))
            || messages.is_some_and(|msgs| {
                msgs.iter().any(|m| truthy(m.get("images")))
            })
            || messages
                .and_then(|msgs| msgs.last())
                .is_some_and(|last| content_has_image_part(last));

        let requires_tool_calling = truthy(body.get("tools"))
            || truthy(body.get("tool_choice"))
            || messages.is_some_and(|msgs| msgs.iter().any(|m| truthy(m.get("tool_calls"))));

        let requires_internet = FRESHNESS_MARKERS.iter().any(|kw| prompt_lower.contains(kw))
            || messages.is_some_and(|msgs| {
                msgs.iter().any(|m| {
                    let text = m.to_string().to_lowercase();
                    GROUNDING_MARKERS.iter().any(|kw| text.contains(kw))
                })
            });

        let think_option = truthy(body.get("think"))
            || truthy(body.get("options").and_then(|o| o.get("think")));
        let requires_thinking =
            think_option || REASONING_MARKERS.iter().any(|kw| prompt_lower.contains(kw));

        let requires_fast = truthy(body.get("options").and_then(|o| o.get("fast_model")));

        Self {
            has_images,
            contains_code: CODE_MARKERS.iter().any(|kw| prompt_lower.contains(kw)),
            requires_tool_calling,
            requires_internet,
            requires_thinking,
            requires_fast,
            prompt_length: prompt.chars().count(),
            message_count: messages.map_or(0, |m| m.len()),
        }
    }

    /// Number of capability axes this profile requires.
    pub fn required_axes(&self) -> usize {
        [
            self.has_images,
            self.contains_code,
            self.requires_tool_calling,
            self.requires_internet,
            self.requires_thinking,
            self.requires_fast,
        ]
        .iter()
        .filter(|&&b| b)
        .count()
    }
}

/// Extract the prompt text: a top-level `prompt` field wins, otherwise the
/// last message's content (string form, or the first `text` part of a
/// structured content array).
fn extract_prompt(body: &Value) -> String {
    if let Some(prompt) = body.get("prompt") {
        return match prompt {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    let Some(last) = body
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|msgs| msgs.last())
    else {
        return String::new();
    };
    match last.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .find(|p| p.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|p| p.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Whether a message carries a multimodal content list with an image part.
fn content_has_image_part(message: &Value) -> bool {
    let Some(Value::Array(parts)) = message.get("content") else {
        return false;
    };
    parts.iter().any(|p| {
        p.get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| IMAGE_PART_TYPES.contains(&t))
    })
}

/// Best-effort model extraction from an opaque request body, for paths that
/// proxy arbitrary payloads. Non-JSON bodies and non-object payloads yield
/// `None` rather than an error.
pub fn extract_model(body_bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body_bytes).ok()?;
    value
        .get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// JSON truthiness: present, non-null, non-false, non-empty.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Number(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_requires_nothing() {
        let profile = RequirementProfile::from_body(&json!({}));
        assert_eq!(profile, RequirementProfile::default());
        assert_eq!(profile.required_axes(), 0);
    }

    #[test]
    fn detects_code_in_last_message() {
        let body = json!({
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "user", "content": "fix this: def main():\n    pass"}
            ]
        });
        let profile = RequirementProfile::from_body(&body);
        assert!(profile.contains_code);
        assert_eq!(profile.message_count, 2);
    }

    #[test]
    fn only_last_message_feeds_prompt_analysis() {
        let body = json!({
            "messages": [
                {"role": "user", "content": "def main(): pass"},
                {"role": "user", "content": "thanks"}
            ]
        });
        assert!(!RequirementProfile::from_body(&body).contains_code);
    }

    #[test]
    fn detects_images_on_messages() {
        let body = json!({
            "messages": [{"role": "user", "content": "describe", "images": ["aGk="]}]
        });
        assert!(RequirementProfile::from_body(&body).has_images);
    }

    #[test]
    fn detects_tools_and_thinking_option() {
        let body = json!({
            "tools": [{"type": "function"}],
            "options": {"think": true},
            "messages": [{"role": "user", "content": "help"}]
        });
        let profile = RequirementProfile::from_body(&body);
        assert!(profile.requires_tool_calling);
        assert!(profile.requires_thinking);
        assert_eq!(profile.required_axes(), 2);
    }

    #[test]
    fn detects_freshness_vocabulary() {
        let body = json!({"prompt": "what is the latest news on rust releases"});
        let profile = RequirementProfile::from_body(&body);
        assert!(profile.requires_internet);
    }

    #[test]
    fn model_extraction_is_best_effort() {
        assert_eq!(
            extract_model(br#"{"model": "llama3", "stream": true}"#).as_deref(),
            Some("llama3")
        );
        assert_eq!(extract_model(b"not json at all"), None);
        assert_eq!(extract_model(br#"{"model": ""}"#), None);
        assert_eq!(extract_model(br#"[1, 2, 3]"#), None);
    }

    #[test]
    fn image_part_in_structured_content_sets_has_images() {
        let body = json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is in this picture"},
                    {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,aGk="}}
                ]
            }]
        });
        assert!(RequirementProfile::from_body(&body).has_images);

        // only the last message's content list is inspected
        let earlier = json!({
            "messages": [
                {"role": "user", "content": [{"type": "image", "image": "aGk="}]},
                {"role": "user", "content": "summarize the above"}
            ]
        });
        assert!(!RequirementProfile::from_body(&earlier).has_images);
    }

    #[test]
    fn reasoning_vocabulary_beyond_think() {
        for prompt in [
            "explain the proof step by step",
            "use chain of thought here",
            "show your reasoning",
        ] {
            let profile = RequirementProfile::from_body(&json!({ "prompt": prompt }));
            assert!(profile.requires_thinking, "prompt: {prompt}");
        }
        assert!(
            !RequirementProfile::from_body(&json!({"prompt": "hello there"})).requires_thinking
        );
    }

    #[test]
    fn structured_content_uses_first_text_part() {
        let body = json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "image_url", "image_url": {"url": "data:..."}},
                    {"type": "text", "text": "think about the weather today"}
                ]
            }]
        });
        let profile = RequirementProfile::from_body(&body);
        assert!(profile.requires_thinking);
        assert!(profile.requires_internet);
    }
}
