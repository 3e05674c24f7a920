//! Prompt construction for agent calls.
//!
//! Every model call an agent makes is two messages: a system message built
//! from the [`AgentSpec`] and a user message carrying the task. Reflection
//! and correction calls reuse the same system message so the critique is
//! judged against the agent's own goal.

use crewforge_core::agent::{AgentSpec, ReflectionResult};
use crewforge_core::message::Message;

/// Marker placed before context that was cut to fit the window.
pub const TRUNCATION_MARKER: &str = "[...earlier context truncated...]";

/// System prompt for an agent.
pub fn system_prompt(spec: &AgentSpec) -> String {
    let mut prompt = format!("You are {}, {}.", spec.name, spec.role);
    if !spec.goal.is_empty() {
        prompt.push_str(&format!("\nGoal: {}", spec.goal));
    }
    if !spec.backstory.is_empty() {
        prompt.push_str(&format!("\n\n{}", spec.backstory));
    }
    prompt
}

/// Merge supplied context with recalled memory.
///
/// Memory comes first so the caller's context is the most recent text.
/// When the merge exceeds `window` characters only the trailing portion is
/// kept, prefixed by [`TRUNCATION_MARKER`].
pub fn merge_context(context: Option<&str>, memory: Option<&str>, window: usize) -> String {
    let merged = [memory, context]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let len = merged.chars().count();
    if len <= window {
        return merged;
    }
    let tail: String = merged.chars().skip(len - window).collect();
    format!("{TRUNCATION_MARKER}\n{tail}")
}

/// Messages for the primary task call.
pub fn task_messages(
    spec: &AgentSpec,
    task: &str,
    context: &str,
    tool_output: &str,
) -> Vec<Message> {
    let mut user = task.trim().to_string();
    if !context.is_empty() {
        user.push_str(&format!("\n\nContext:\n{context}"));
    }
    if !tool_output.is_empty() {
        user.push_str(&format!("\n\nTool results:\n{tool_output}"));
    }
    vec![Message::system(system_prompt(spec)), Message::user(user)]
}

/// Messages for the critique call.
pub fn reflection_messages(spec: &AgentSpec, task: &str, output: &str) -> Vec<Message> {
    let user = format!(
        "Critically review the output below against the task and your goal.\n\n\
         Task:\n{task}\n\n\
         Output:\n{output}\n\n\
         Respond with JSON only:\n\
         {{\"needsCorrection\": bool, \"issues\": [string], \"score\": 0-10, \
         \"suggestions\": [string], \"confidence\": 0-100}}"
    );
    vec![Message::system(system_prompt(spec)), Message::user(user)]
}

/// Messages for the self-correction call.
pub fn correction_messages(
    spec: &AgentSpec,
    task: &str,
    output: &str,
    reflection: &ReflectionResult,
) -> Vec<Message> {
    let bullets = |items: &[String]| {
        if items.is_empty() {
            "- (none)".to_string()
        } else {
            items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
        }
    };
    let user = format!(
        "Improve your previous output for this task.\n\n\
         Task:\n{task}\n\n\
         Previous output:\n{output}\n\n\
         Issues:\n{}\n\n\
         Suggestions:\n{}\n\n\
         Return only the improved version.",
        bullets(&reflection.issues),
        bullets(&reflection.suggestions),
    );
    vec![Message::system(system_prompt(spec)), Message::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewforge_core::message::Role;

    #[test]
    fn system_prompt_includes_goal_and_backstory() {
        let spec = AgentSpec::new("s", "Strategist", "content strategist")
            .with_goal("Plan the post")
            .with_backstory("Ten years in social media.");
        let p = system_prompt(&spec);
        assert!(p.starts_with("You are Strategist, content strategist."));
        assert!(p.contains("Goal: Plan the post"));
        assert!(p.ends_with("Ten years in social media."));
    }

    #[test]
    fn merge_puts_memory_before_context() {
        let merged = merge_context(Some("crew context"), Some("old output"), 1000);
        assert_eq!(merged, "old output\n\ncrew context");
        assert_eq!(merge_context(None, None, 10), "");
        assert_eq!(merge_context(Some("  "), Some("m"), 10), "m");
    }

    #[test]
    fn merge_keeps_trailing_window() {
        let merged = merge_context(Some("abcdefghij"), None, 4);
        assert_eq!(merged, format!("{TRUNCATION_MARKER}\nghij"));
    }

    #[test]
    fn task_messages_shape() {
        let spec = AgentSpec::new("a", "A", "writer");
        let msgs = task_messages(&spec, "Write", "ctx", "");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].content, "Write\n\nContext:\nctx");
    }

    #[test]
    fn correction_lists_issues() {
        let spec = AgentSpec::new("a", "A", "writer");
        let reflection = ReflectionResult {
            needs_correction: true,
            issues: vec!["too long".into()],
            ..ReflectionResult::neutral()
        };
        let msgs = correction_messages(&spec, "t", "o", &reflection);
        assert!(msgs[1].content.contains("- too long"));
        assert!(msgs[1].content.contains("Suggestions:\n- (none)"));
    }
}
