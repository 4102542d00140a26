use std::sync::LazyLock;

use regex::Regex;

use crate::models::LLM_FRAGMENT_MARKER;

const AGENT_PURPOSE_MARKER: &str = r#""purpose":"AGENT""#;
const CONVERSATION_ID_PREFIX: &str = "amzn1.conversation.";

#[derive(Debug, Clone)]
pub struct Matcher {
    name: &'static str,
    pattern: Regex,
}

impl Matcher {
    pub fn new(name: &'static str, pattern: Regex) -> Self {
        Self { name, pattern }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn find<'h>(&self, haystack: &'h str) -> Option<&'h str> {
        self.pattern
            .captures(haystack)
            .and_then(|captures| captures.get(1))
            .map(|value| value.as_str())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub matcher: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ExtractionStrategy {
    matchers: Vec<Matcher>,
}

impl ExtractionStrategy {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        Self { matchers }
    }

    pub fn activity_csrf() -> Self {
        Self::new(vec![
            Matcher::new("meta_tag", CSRF_META_TAG.clone()),
            Matcher::new("data_attribute", CSRF_DATA_ATTRIBUTE.clone()),
            Matcher::new("script_variable", CSRF_SCRIPT_VARIABLE.clone()),
            Matcher::new("anti_csrf_marker", CSRF_ANTI_CSRF_MARKER.clone()),
        ])
    }

    pub fn matcher_names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(Matcher::name).collect()
    }

    pub fn first_match(&self, haystack: &str) -> Option<Extracted> {
        self.matchers.iter().find_map(|matcher| {
            matcher.find(haystack).map(|value| Extracted {
                matcher: matcher.name(),
                value: value.to_string(),
            })
        })
    }
}

static CSRF_META_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta name="csrf-token" content="([^"]+)""#)
        .expect("csrf meta regex must compile")
});
static CSRF_DATA_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-csrf="([^"]+)""#).expect("csrf data attribute regex must compile")
});
static CSRF_SCRIPT_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""csrfToken"\s*:\s*"([^"]+)""#).expect("csrf script regex must compile")
});
static CSRF_ANTI_CSRF_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"anti-csrftoken-a2z['":\s]+['"]([^'"]+)['"]"#)
        .expect("anti-csrf marker regex must compile")
});
static CONVERSATION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""conversationId"\s*:\s*"(amzn1\.conversation\.[^"]+)""#)
        .expect("conversation id regex must compile")
});
static QUOTED_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""text"\s*:\s*"([^"]+)""#).expect("quoted text regex must compile")
});

pub fn conversation_id(body: &str) -> Option<String> {
    CONVERSATION_ID
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
        .filter(|value| value.len() > CONVERSATION_ID_PREFIX.len())
}

/// The first quoted text is the echoed input; later matches count only when they do
/// not contain the input and the body carries an agent marker somewhere.
pub fn reply_text(body: &str, input_text: &str) -> Option<String> {
    if !body.contains(LLM_FRAGMENT_MARKER) && !body.contains(AGENT_PURPOSE_MARKER) {
        return None;
    }

    QUOTED_TEXT
        .captures_iter(body)
        .skip(1)
        .filter_map(|captures| captures.get(1))
        .map(|value| value.as_str())
        .find(|candidate| !candidate.contains(input_text))
        .map(ToString::to_string)
}

pub fn cookie_value<'a>(cookie_blob: &'a str, name: &str) -> Option<&'a str> {
    cookie_blob
        .split(';')
        .map(str::trim)
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
