//! `crewforge demand`: demand types and their templates.

use crewforge_orchestrator::{AgentRegistry, DemandAnalyzer};

pub fn list() {
    println!("📋 Demand types");
    for demand_type in DemandAnalyzer::known_types() {
        let analysis = DemandAnalyzer::analyze(demand_type);
        println!(
            "  {demand_type:<20} {:<16} {:<12} {} agents",
            analysis.crew_template,
            analysis.process,
            analysis.agents.len()
        );
    }
}

pub fn analyze(demand_type: &str) -> anyhow::Result<()> {
    let analysis = DemandAnalyzer::analyze(demand_type);
    if !DemandAnalyzer::is_known(demand_type) {
        println!("   ⚠️  Unknown demand type, using the {} template", analysis.crew_template);
    }

    let registry = AgentRegistry::default();
    println!("🧭 {demand_type}");
    println!("   Crew:        {}", analysis.crew_template);
    println!("   Process:     {}", analysis.process);
    println!("   Complexity:  {}", analysis.complexity);
    println!("   Estimate:    ~{} min", analysis.estimated_minutes);
    println!("   Focus group: {}", if analysis.requires_focus_group { "yes" } else { "no" });
    println!();
    for (i, (agent_id, task)) in analysis.agents.iter().zip(&analysis.tasks).enumerate() {
        let name = registry
            .create(agent_id)
            .map(|spec| spec.name)
            .ok_or_else(|| anyhow::anyhow!("Template references unknown agent '{agent_id}'"))?;
        println!("   {}. {name} ({agent_id})", i + 1);
        println!("      {task}");
    }
    Ok(())
}
