//! Parsing of critique responses into [`ReflectionResult`].

use crewforge_core::agent::ReflectionResult;

/// Extract the JSON object from a critique response.
///
/// Models often wrap JSON in prose or code fences, so the span between the
/// first `{` and the last `}` is parsed. Returns `None` when no object parses.
pub fn parse_reflection(text: &str) -> Option<ReflectionResult> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<ReflectionResult>(&text[start..=end])
        .ok()
        .map(ReflectionResult::clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let text = "Here you go:\n```json\n{\"needsCorrection\": true, \"issues\": [\"vague\"], \
                    \"score\": 5, \"suggestions\": [\"be specific\"], \"confidence\": 80}\n```";
        let r = parse_reflection(text).unwrap();
        assert!(r.needs_correction);
        assert_eq!(r.issues, vec!["vague"]);
        assert_eq!(r.score, 5.0);
        assert_eq!(r.confidence, 80.0);
    }

    #[test]
    fn missing_fields_take_neutral_defaults() {
        let r = parse_reflection("{\"score\": 9}").unwrap();
        assert!(!r.needs_correction);
        assert_eq!(r.score, 9.0);
        assert_eq!(r.confidence, 50.0);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let r = parse_reflection("{\"score\": 42, \"confidence\": -3}").unwrap();
        assert_eq!(r.score, 10.0);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_reflection("no json here").is_none());
        assert!(parse_reflection("} backwards {").is_none());
        assert!(parse_reflection("{not json}").is_none());
    }
}
