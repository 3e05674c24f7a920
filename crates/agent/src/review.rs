//! Manager review verdicts for hierarchical crews.
//!
//! The manager is asked to open its review with `VERDICT: APPROVED` or
//! `VERDICT: NEEDS_ADJUSTMENT`. An explicit verdict line always decides.
//! Without one, the review is scanned for adjustment markers.

/// Outcome of a manager review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approved,
    NeedsAdjustment,
}

/// Decides whether a review asks for the task to be redone.
#[derive(Debug, Clone)]
pub struct ReviewPolicy {
    markers: Vec<String>,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self::with_markers(["ajuste", "correção", "adjust", "revise", "correction"])
    }
}

impl ReviewPolicy {
    /// A policy with custom fallback markers (matched case-insensitively).
    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(|m| m.into().to_lowercase()).collect(),
        }
    }

    /// Instruction appended to review prompts.
    pub fn instruction() -> &'static str {
        "Start your review with exactly one line: `VERDICT: APPROVED` or `VERDICT: NEEDS_ADJUSTMENT`."
    }

    pub fn verdict(&self, review: &str) -> ReviewVerdict {
        if let Some(explicit) = explicit_verdict(review) {
            return explicit;
        }
        let lower = review.to_lowercase();
        if self.markers.iter().any(|m| lower.contains(m.as_str())) {
            ReviewVerdict::NeedsAdjustment
        } else {
            ReviewVerdict::Approved
        }
    }

    pub fn needs_adjustment(&self, review: &str) -> bool {
        self.verdict(review) == ReviewVerdict::NeedsAdjustment
    }
}

fn explicit_verdict(review: &str) -> Option<ReviewVerdict> {
    review.lines().find_map(|line| {
        let line = line.trim().trim_matches(|c| c == '*' || c == '`' || c == '#').trim();
        let upper = line.to_uppercase();
        let rest = upper.strip_prefix("VERDICT:")?.trim().to_string();
        if rest.starts_with("NEEDS_ADJUSTMENT") || rest.starts_with("NEEDS ADJUSTMENT") {
            Some(ReviewVerdict::NeedsAdjustment)
        } else if rest.starts_with("APPROVED") {
            Some(ReviewVerdict::Approved)
        } else {
            None
        }
    })
}
