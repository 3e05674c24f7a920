//! `crewforge orchestrate`: run one demand end to end.

use anyhow::Context;
use crewforge_config::AppConfig;
use crewforge_orchestrator::{MasterOrchestrator, OrchestrationRequest, OrchestrationResponse};

pub fn request(
    client: String,
    demand: String,
    topic: String,
    objective: Option<String>,
    focus_group: Option<bool>,
    min_score: Option<f32>,
) -> OrchestrationRequest {
    OrchestrationRequest {
        client_id: client,
        demand_type: demand,
        topic,
        objective,
        use_focus_group: focus_group,
        min_focus_group_score: min_score,
    }
}

pub async fn run(request: OrchestrationRequest, json: bool) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    if !config.has_api_key() {
        anyhow::bail!(
            "No API key for provider '{}' (set CREWFORGE_API_KEY or OPENAI_API_KEY)",
            config.default_provider
        );
    }
    let orchestrator = MasterOrchestrator::from_config(&config)
        .await
        .context("Failed to initialize orchestrator")?;

    let response = orchestrator.orchestrate(request).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render(&response));
    }

    if !response.success {
        anyhow::bail!(response.error.unwrap_or_else(|| "Orchestration failed".into()));
    }
    Ok(())
}

/// Human-readable summary of a response.
pub fn render(response: &OrchestrationResponse) -> String {
    let mut out = String::new();
    let status = if response.success { "✅" } else { "❌" };
    out.push_str(&format!("{status} {} via {}\n", response.demand_type, response.crew_used));
    out.push_str(&format!("   Request:  {}\n", response.request_id));
    out.push_str(&format!("   Agents:   {}\n", response.agents_involved.join(", ")));
    out.push_str(&format!(
        "   Time:     {:.1}s, {} tokens\n",
        response.execution_time_ms as f64 / 1000.0,
        response.token_usage.total
    ));

    if let Some(error) = &response.error {
        out.push_str(&format!("   Error:    {error}\n"));
        return out;
    }

    let outputs = &response.outputs;
    let sections = [
        ("Strategy", outputs.strategy.as_deref()),
        ("Copy", outputs.copy.as_deref()),
        ("Visual", outputs.visual_prompt.as_deref()),
        ("CTA", outputs.cta.as_deref()),
    ];
    for (label, text) in sections {
        if let Some(text) = text {
            out.push_str(&format!("\n── {label} ──\n{}\n", text.trim()));
        }
    }
    if !outputs.hashtags.is_empty() {
        out.push_str(&format!("\n── Hashtags ──\n{}\n", outputs.hashtags.join(" ")));
    }

    if let Some(fg) = &response.focus_group_result {
        let verdict = if fg.passed { "passed" } else { "did not pass" };
        out.push_str(&format!(
            "\n🎯 Focus group {verdict}: {:.1}/10 after {} iteration(s)\n",
            fg.average_score, fg.iterations
        ));
        for e in &fg.evaluations {
            out.push_str(&format!("   {:>4.1}  {} ({:?})\n", e.score, e.persona_name, e.verdict));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewforge_core::agent::TokenUsage;
    use crewforge_orchestrator::ParsedOutputs;

    fn response(success: bool) -> OrchestrationResponse {
        OrchestrationResponse {
            success,
            request_id: "req-1".into(),
            demand_type: "instagram_post".into(),
            crew_used: "instagram_crew".into(),
            agents_involved: vec!["strategist".into(), "copywriter_instagram".into()],
            outputs: ParsedOutputs {
                copy: Some("Buy now".into()),
                hashtags: vec!["#launch".into()],
                ..Default::default()
            },
            focus_group_result: None,
            execution_time_ms: 1500,
            token_usage: TokenUsage { input: 80, output: 40, total: 120 },
            error: (!success).then(|| "2 tasks failed".to_string()),
        }
    }

    #[test]
    fn render_success() {
        let text = render(&response(true));
        assert!(text.contains("instagram_post via instagram_crew"));
        assert!(text.contains("strategist, copywriter_instagram"));
        assert!(text.contains("1.5s, 120 tokens"));
        assert!(text.contains("── Copy ──\nBuy now"));
        assert!(text.contains("#launch"));
    }

    #[test]
    fn render_failure_shows_error_only() {
        let text = render(&response(false));
        assert!(text.contains("Error:    2 tasks failed"));
        assert!(!text.contains("── Copy ──"));
    }

    #[test]
    fn request_maps_flags() {
        let r = request("acme".into(), "blog_post".into(), "x".into(), None, Some(true), Some(8.0));
        assert_eq!(r.use_focus_group, Some(true));
        assert_eq!(r.min_focus_group_score, Some(8.0));
    }
}
