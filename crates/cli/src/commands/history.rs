//! `crewforge history`: recorded runs and agent statistics.

use anyhow::Context;
use crewforge_config::AppConfig;
use crewforge_core::history::{HistoryStore, RunRecord};
use std::sync::Arc;

async fn open() -> anyhow::Result<Arc<dyn HistoryStore>> {
    let config = AppConfig::load().context("Failed to load config")?;
    crewforge_memory::history_from_config(&config)
        .await
        .context("Failed to open history store")
}

fn print_runs(runs: &[RunRecord]) {
    if runs.is_empty() {
        println!("   No runs recorded.");
        return;
    }
    for run in runs {
        let status = if run.success { "✅" } else { "❌" };
        println!(
            "  {status} {}  {:<18} {:<14} {}/{} tasks  {} tokens  {:.1}s",
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.crew_type,
            run.process,
            run.completed_tasks,
            run.total_tasks,
            run.total_tokens,
            run.total_time_ms as f64 / 1000.0
        );
        if let Some(topic) = run.params.get("topic").and_then(|t| t.as_str()) {
            println!("      topic: {topic}");
        }
    }
}

pub async fn list(client: &str, limit: usize) -> anyhow::Result<()> {
    let store = open().await?;
    println!("📜 Recent runs for {client}");
    print_runs(&store.list_runs(client, limit).await?);
    Ok(())
}

pub async fn search(client: &str, term: &str, limit: usize) -> anyhow::Result<()> {
    let store = open().await?;
    println!("🔍 Runs for {client} mentioning \"{term}\"");
    print_runs(&store.search_runs(client, term, limit).await?);
    Ok(())
}

pub async fn stats(client: &str, agent: Option<&str>) -> anyhow::Result<()> {
    let store = open().await?;
    let scope = agent.unwrap_or("all agents");
    println!("📊 Performance for {client} ({scope})");
    match store.agent_performance(client, agent).await? {
        None => println!("   No interactions recorded."),
        Some(p) => {
            println!("   Interactions:     {}", p.total_interactions);
            println!("   Reflection score: {:.2}", p.avg_reflection_score);
            println!("   Confidence:       {:.2}", p.avg_confidence);
            println!("   Corrected:        {:.1}%", p.correction_rate);
            println!("   Fallback used:    {:.1}%", p.fallback_rate);
            println!("   Avg tokens:       {:.0}", p.avg_tokens_used);
            println!("   Avg time:         {:.0} ms", p.avg_execution_time_ms);
        }
    }
    Ok(())
}

pub async fn prune(days: u32) -> anyhow::Result<()> {
    let store = open().await?;
    let removed = store.delete_older_than(days).await?;
    println!("🧹 Removed {removed} run(s) older than {days} days");
    Ok(())
}
