//! Demand analysis: request type → crew template.
//!
//! A pure table lookup. Unknown demand types get the generic
//! `social_media_post` template while keeping the requested type name.

use crewforge_core::crew::ProcessMode;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Template chosen for a demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandAnalysis {
    pub demand_type: String,
    pub crew_template: String,
    pub process: ProcessMode,
    /// Agent ids, one per task, in task order
    pub agents: Vec<String>,
    pub complexity: Complexity,
    pub estimated_minutes: u32,
    pub requires_focus_group: bool,
    pub tasks: Vec<String>,
}

struct Template {
    demand_type: &'static str,
    crew: &'static str,
    process: ProcessMode,
    complexity: Complexity,
    minutes: u32,
    focus_group: bool,
    steps: &'static [(&'static str, &'static str)],
}

const FALLBACK_TYPE: &str = "social_media_post";

const TEMPLATES: &[Template] = &[
    Template {
        demand_type: "instagram_post",
        crew: "instagram_crew",
        process: ProcessMode::Sequential,
        complexity: Complexity::Medium,
        minutes: 5,
        focus_group: true,
        steps: &[
            (
                "strategist",
                "Write the strategic briefing for the post: audience, angle and key message.",
            ),
            (
                "copywriter_instagram",
                "Write the Instagram caption (copy) with a strong hook and a clear CTA.",
            ),
            ("hashtag_specialist", "Select up to 15 relevant hashtags for the post."),
            ("visual_designer", "Write the visual prompt describing the art for the post."),
        ],
    },
    Template {
        demand_type: "linkedin_post",
        crew: "linkedin_crew",
        process: ProcessMode::Sequential,
        complexity: Complexity::Low,
        minutes: 3,
        focus_group: false,
        steps: &[
            ("strategist", "Write the strategic briefing for a LinkedIn post."),
            (
                "copywriter_linkedin",
                "Write the LinkedIn post copy in a professional tone with a CTA.",
            ),
        ],
    },
    Template {
        demand_type: "social_media_post",
        crew: "social_media_crew",
        process: ProcessMode::Sequential,
        complexity: Complexity::Low,
        minutes: 4,
        focus_group: false,
        steps: &[
            ("strategist", "Write the strategic briefing for the social media post."),
            (
                "copywriter_social",
                "Write the post copy adapted to social media, ending with a CTA.",
            ),
            ("visual_designer", "Write the visual prompt describing the art for the post."),
        ],
    },
    Template {
        demand_type: "blog_post",
        crew: "blog_crew",
        process: ProcessMode::Sequential,
        complexity: Complexity::Medium,
        minutes: 10,
        focus_group: false,
        steps: &[
            ("strategist", "Write the content strategy and outline for the article."),
            ("seo_specialist", "List target keywords and the SEO structure for the article."),
            ("blog_writer", "Write the full blog post text following the outline and keywords."),
        ],
    },
    Template {
        demand_type: "email_marketing",
        crew: "email_crew",
        process: ProcessMode::Sequential,
        complexity: Complexity::Medium,
        minutes: 5,
        focus_group: false,
        steps: &[
            ("strategist", "Write the strategic briefing for the email campaign."),
            ("email_copywriter", "Write the email subject line, body copy and CTA."),
        ],
    },
    Template {
        demand_type: "marketing_campaign",
        crew: "campaign_crew",
        process: ProcessMode::Hierarchical,
        complexity: Complexity::High,
        minutes: 20,
        focus_group: true,
        steps: &[
            ("campaign_manager", "Define the campaign concept, phases and success metrics."),
            ("strategist", "Write the strategic analysis and channel plan for the campaign."),
            ("copywriter_social", "Write the key campaign copy and CTA for each channel."),
            ("visual_designer", "Write the visual direction and art prompts for the campaign."),
            ("ads_specialist", "Plan paid media: audiences, budget split and ad variations."),
        ],
    },
    Template {
        demand_type: "video_script",
        crew: "video_crew",
        process: ProcessMode::Sequential,
        complexity: Complexity::Medium,
        minutes: 8,
        focus_group: false,
        steps: &[
            ("strategist", "Write the strategic briefing for the video."),
            (
                "video_scriptwriter",
                "Write the video script with scenes, narration text and a closing CTA.",
            ),
        ],
    },
    Template {
        demand_type: "ad_campaign",
        crew: "ads_crew",
        process: ProcessMode::Parallel,
        complexity: Complexity::High,
        minutes: 12,
        focus_group: true,
        steps: &[
            ("strategist", "Write the strategic analysis for the ad campaign."),
            ("ads_specialist", "Plan targeting, budget and ad formats."),
            ("copywriter_social", "Write three ad copy variations, each with a CTA."),
            ("visual_designer", "Write the visual prompts for the ad creatives."),
        ],
    },
];

/// Maps demand types to crew templates.
pub struct DemandAnalyzer;

impl DemandAnalyzer {
    pub fn analyze(demand_type: &str) -> DemandAnalysis {
        let key = demand_type.trim().to_lowercase();
        let template = TEMPLATES
            .iter()
            .find(|t| t.demand_type == key)
            .or_else(|| TEMPLATES.iter().find(|t| t.demand_type == FALLBACK_TYPE))
            .unwrap_or(&TEMPLATES[0]);

        DemandAnalysis {
            demand_type: demand_type.to_string(),
            crew_template: template.crew.to_string(),
            process: template.process,
            agents: template.steps.iter().map(|(agent, _)| agent.to_string()).collect(),
            complexity: template.complexity,
            estimated_minutes: template.minutes,
            requires_focus_group: template.focus_group,
            tasks: template.steps.iter().map(|(_, task)| task.to_string()).collect(),
        }
    }

    pub fn known_types() -> Vec<&'static str> {
        TEMPLATES.iter().map(|t| t.demand_type).collect()
    }

    pub fn is_known(demand_type: &str) -> bool {
        let key = demand_type.trim().to_lowercase();
        TEMPLATES.iter().any(|t| t.demand_type == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instagram_template() {
        let a = DemandAnalyzer::analyze("instagram_post");
        assert_eq!(a.crew_template, "instagram_crew");
        assert_eq!(a.process, ProcessMode::Sequential);
        assert_eq!(a.agents[0], "strategist");
        assert!(a.agents.contains(&"copywriter_instagram".to_string()));
        assert_eq!(a.agents.len(), a.tasks.len());
        assert!(a.requires_focus_group);
    }

    #[test]
    fn unknown_type_uses_generic_template() {
        let a = DemandAnalyzer::analyze("carrier_pigeon");
        assert_eq!(a.demand_type, "carrier_pigeon");
        assert_eq!(a.crew_template, "social_media_crew");
        assert!(!DemandAnalyzer::is_known("carrier_pigeon"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(DemandAnalyzer::analyze(" Blog_Post ").crew_template, "blog_crew");
    }

    #[test]
    fn every_template_is_consistent() {
        for t in DemandAnalyzer::known_types() {
            let a = DemandAnalyzer::analyze(t);
            assert!(!a.agents.is_empty(), "{t}");
            assert_eq!(a.agents.len(), a.tasks.len(), "{t}");
        }
        assert_eq!(DemandAnalyzer::known_types().len(), 8);
    }
}
