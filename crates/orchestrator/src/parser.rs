//! Best-effort extraction of named sections from a crew's compiled output.
//!
//! For each field the parser first looks for a task section whose
//! `### n. Agent` header matches the field's keywords, then falls back to
//! scanning the whole text from the first keyword hit up to the next
//! `\n\n---` or `\n\n[`. When nothing matches at all, the entire text is
//! kept as `copy` so no output is lost.

use crewforge_agent::SECTION_DELIMITER;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const MAX_HASHTAGS: usize = 15;

static STRATEGY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)estratég|strateg|briefing|análise|analysis").expect("valid strategy regex")
});
static COPY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)copy|legenda|caption|texto|post").expect("valid copy regex")
});
static VISUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)prompt|visual|arte|design").expect("valid visual regex")
});
static CTA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcta\b|call.to.action|chamada").expect("valid cta regex")
});
static HASHTAG_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)hashtag").expect("valid hashtag header regex"));
static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[^\s#]+").expect("valid hashtag regex"));

/// Structured deliverable parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
}

impl ParsedOutputs {
    pub fn is_empty(&self) -> bool {
        self.strategy.is_none()
            && self.copy.is_none()
            && self.hashtags.is_empty()
            && self.visual_prompt.is_none()
            && self.cta.is_none()
    }

    /// Render the parts for evaluators, one labelled block each.
    pub fn format_for_review(&self) -> String {
        let mut parts = Vec::new();
        if let Some(s) = &self.strategy {
            parts.push(format!("STRATEGY:\n{s}"));
        }
        if let Some(c) = &self.copy {
            parts.push(format!("COPY:\n{c}"));
        }
        if !self.hashtags.is_empty() {
            parts.push(format!("HASHTAGS:\n{}", self.hashtags.join(" ")));
        }
        if let Some(v) = &self.visual_prompt {
            parts.push(format!("VISUAL:\n{v}"));
        }
        if let Some(c) = &self.cta {
            parts.push(format!("CTA:\n{c}"));
        }
        parts.join(SECTION_DELIMITER)
    }
}

/// A compiled-output section: its `###` header line and the text below it.
fn sections(text: &str) -> Vec<(&str, String)> {
    text.split(SECTION_DELIMITER)
        .filter_map(|section| {
            let mut lines = section.lines().skip_while(|l| !l.starts_with("### "));
            let header = lines.next()?;
            let body = lines.collect::<Vec<_>>().join("\n");
            Some((header, body.trim().to_string()))
        })
        .collect()
}

fn from_header(sections: &[(&str, String)], re: &Regex) -> Option<String> {
    sections
        .iter()
        .find(|(header, body)| re.is_match(header) && !body.is_empty())
        .map(|(_, body)| body.clone())
}

fn from_scan(text: &str, re: &Regex) -> Option<String> {
    let hit = re.find(text)?;
    let rest = &text[hit.start()..];
    let end = ["\n\n---", "\n\n["]
        .iter()
        .filter_map(|t| rest.find(t))
        .min()
        .unwrap_or(rest.len());
    let section = rest[..end].trim();
    (!section.is_empty()).then(|| section.to_string())
}

fn extract(text: &str, sections: &[(&str, String)], re: &Regex) -> Option<String> {
    from_header(sections, re).or_else(|| from_scan(text, re))
}

fn hashtags(text: &str, sections: &[(&str, String)]) -> Vec<String> {
    let re = &*HASHTAG;
    let source = from_header(sections, &HASHTAG_HEADER).filter(|body| re.is_match(body));
    let haystack = source.as_deref().unwrap_or(text);

    let mut tags: Vec<String> = Vec::new();
    for m in re.find_iter(haystack) {
        let tag = m.as_str().trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '_');
        if tag.len() > 1 && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
        if tags.len() == MAX_HASHTAGS {
            break;
        }
    }
    tags
}

/// Split free text into [`ParsedOutputs`].
pub fn parse_outputs(text: &str) -> ParsedOutputs {
    let sections = sections(text);
    let mut outputs = ParsedOutputs {
        strategy: extract(text, &sections, &STRATEGY),
        copy: extract(text, &sections, &COPY),
        hashtags: hashtags(text, &sections),
        visual_prompt: extract(text, &sections, &VISUAL),
        cta: extract(text, &sections, &CTA),
    };
    if outputs.is_empty() && !text.trim().is_empty() {
        outputs.copy = Some(text.to_string());
    }
    outputs
}
