//! Agent catalogue: agent id → spec factory.
//!
//! Templates name agents by id; the registry turns an id into a fresh
//! [`AgentSpec`]. The table is explicit so tests can enumerate it.

use crewforge_core::agent::AgentSpec;
use std::collections::BTreeMap;

pub type AgentFactory = fn() -> AgentSpec;

/// Ids of the focus-group evaluators, brand check last.
pub const FOCUS_GROUP_AGENTS: [&str; 4] = [
    "persona_skeptic",
    "persona_young_digital",
    "persona_busy_executive",
    "brand_guardian",
];

/// Rewrites a deliverable from focus-group feedback.
pub const REFINER_AGENT: &str = "content_refiner";

const EVALUATION_FORMAT: &str = "Answer with one JSON object using the keys \
\"persona_id\", \"persona_name\", \"nota\" (a number from 0 to 10), \
\"pontos_positivos\" (list), \"pontos_negativos\" (list), \"sugestoes\" (list) \
and \"veredicto\" (aprovado, reprovado or precisa_ajustes).";

#[derive(Clone)]
pub struct AgentRegistry {
    factories: BTreeMap<String, AgentFactory>,
}

impl AgentRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register or replace a factory.
    pub fn register(&mut self, id: impl Into<String>, factory: AgentFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn create(&self, id: &str) -> Option<AgentSpec> {
        self.factories.get(id).map(|f| f())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        let mut r = Self::empty();
        r.register("strategist", strategist);
        r.register("copywriter_instagram", copywriter_instagram);
        r.register("copywriter_linkedin", copywriter_linkedin);
        r.register("copywriter_social", copywriter_social);
        r.register("hashtag_specialist", hashtag_specialist);
        r.register("visual_designer", visual_designer);
        r.register("seo_specialist", seo_specialist);
        r.register("blog_writer", blog_writer);
        r.register("email_copywriter", email_copywriter);
        r.register("video_scriptwriter", video_scriptwriter);
        r.register("ads_specialist", ads_specialist);
        r.register("campaign_manager", campaign_manager);
        r.register("persona_skeptic", persona_skeptic);
        r.register("persona_young_digital", persona_young_digital);
        r.register("persona_busy_executive", persona_busy_executive);
        r.register("brand_guardian", brand_guardian);
        r.register(REFINER_AGENT, content_refiner);
        r
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

fn strategist() -> AgentSpec {
    AgentSpec::new("strategist", "Content Strategist", "content strategist")
        .with_goal("Turn the demand into a clear strategic briefing")
        .with_backstory(
            "You analyse audience, positioning and brand voice before anything is written.",
        )
        .with_temperature(0.5)
        .with_tool("knowledge_lookup")
        .with_tool("run_history")
}

fn copywriter_instagram() -> AgentSpec {
    AgentSpec::new("copywriter_instagram", "Instagram Copywriter", "Instagram copywriter")
        .with_goal("Write captions that stop the scroll and drive action")
        .with_backstory(
            "You write short, punchy captions with a hook in the first line and a CTA at the end.",
        )
        .with_temperature(0.8)
        .with_tool("knowledge_lookup")
}

fn copywriter_linkedin() -> AgentSpec {
    AgentSpec::new("copywriter_linkedin", "LinkedIn Copywriter", "LinkedIn copywriter")
        .with_goal("Write credible professional posts")
        .with_backstory("You write for decision makers: concrete, data-backed, no hype.")
        .with_tool("knowledge_lookup")
}

fn copywriter_social() -> AgentSpec {
    AgentSpec::new("copywriter_social", "Social Media Copywriter", "social media copywriter")
        .with_goal("Write copy adapted to each social channel")
        .with_backstory("You adapt one message to the tone of each network.")
        .with_temperature(0.8)
        .with_tool("knowledge_lookup")
}

fn hashtag_specialist() -> AgentSpec {
    AgentSpec::new("hashtag_specialist", "Hashtag Specialist", "hashtag specialist")
        .with_goal("Pick hashtags that balance reach and relevance")
        .with_backstory("Return hashtags on one line, each starting with #.")
        .with_temperature(0.4)
        .with_max_tokens(300)
}

fn visual_designer() -> AgentSpec {
    AgentSpec::new("visual_designer", "Visual Designer", "art director")
        .with_goal("Describe the visual so a designer or image model can produce it")
        .with_backstory("You describe composition, palette, typography and mood in one prompt.")
}

fn seo_specialist() -> AgentSpec {
    AgentSpec::new("seo_specialist", "SEO Specialist", "SEO specialist")
        .with_goal("Make the content discoverable")
        .with_backstory("You pick keywords by intent and structure headings around them.")
        .with_temperature(0.4)
}

fn blog_writer() -> AgentSpec {
    AgentSpec::new("blog_writer", "Blog Writer", "long-form writer")
        .with_goal("Write complete, well-structured articles")
        .with_backstory("You write clear articles with headings, examples and a closing CTA.")
        .with_max_tokens(4000)
        .with_tool("knowledge_lookup")
}

fn email_copywriter() -> AgentSpec {
    AgentSpec::new("email_copywriter", "Email Copywriter", "email marketing copywriter")
        .with_goal("Write emails that get opened and clicked")
        .with_backstory("You write subject lines under 50 characters and one CTA per email.")
}

fn video_scriptwriter() -> AgentSpec {
    AgentSpec::new("video_scriptwriter", "Video Scriptwriter", "video scriptwriter")
        .with_goal("Write scripts that hold attention to the end")
        .with_backstory("You structure scripts as hook, development and CTA, scene by scene.")
}

fn ads_specialist() -> AgentSpec {
    AgentSpec::new("ads_specialist", "Ads Specialist", "paid media specialist")
        .with_goal("Plan paid campaigns that hit the target cost per result")
        .with_backstory(
            "You plan audiences, budgets and creative testing for paid social and search.",
        )
        .with_temperature(0.5)
}

fn campaign_manager() -> AgentSpec {
    AgentSpec::new("campaign_manager", "Campaign Manager", "campaign manager")
        .with_goal("Coordinate the crew into one coherent campaign")
        .with_backstory(
            "You plan the work, review each deliverable against the brief, and consolidate the result.",
        )
        .with_temperature(0.4)
        .with_tool("run_history")
}

fn evaluator(id: &str, name: &str, persona: &str) -> AgentSpec {
    AgentSpec::new(id, name, "focus group evaluator")
        .with_goal("Evaluate the content honestly from your point of view")
        .with_backstory(format!("{persona}\n\n{EVALUATION_FORMAT}"))
        .with_temperature(0.6)
        .with_max_tokens(800)
}

fn persona_skeptic() -> AgentSpec {
    evaluator(
        "persona_skeptic",
        "Skeptical Consumer",
        "You distrust marketing claims and punish vague promises.",
    )
}

fn persona_young_digital() -> AgentSpec {
    evaluator(
        "persona_young_digital",
        "Young Digital Native",
        "You scroll fast, value authenticity and ignore anything that looks like an ad.",
    )
}

fn persona_busy_executive() -> AgentSpec {
    evaluator(
        "persona_busy_executive",
        "Busy Executive",
        "You have ten seconds; content must be clear, relevant and credible immediately.",
    )
}

fn brand_guardian() -> AgentSpec {
    evaluator(
        "brand_guardian",
        "Brand Guardian",
        "You check the content against the brand guidelines: voice, claims, visual identity and forbidden terms.",
    )
}

fn content_refiner() -> AgentSpec {
    AgentSpec::new(REFINER_AGENT, "Content Refiner", "senior editor")
        .with_goal("Improve the deliverable using focus group feedback")
        .with_backstory(
            "You keep what works, fix what the evaluators criticised, and return only the new version.",
        )
        .with_temperature(0.6)
}
