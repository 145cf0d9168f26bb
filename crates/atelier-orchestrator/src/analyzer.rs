//! Request analysis.
//!
//! Rule- and keyword-driven classification of a raw content request into a
//! [`TaskAnalysis`]. Analysis never fails: input that matches nothing
//! degrades to a general deliverable at moderate complexity.

use atelier_core::{Capability, Complexity, ContentRequest, DeliverableType, TaskAnalysis};
use tracing::debug;

/// Classifies a content request.
pub fn analyze(request: &ContentRequest) -> TaskAnalysis {
    let deliverable_type = request
        .deliverable_type
        .unwrap_or_else(|| detect_deliverable(&request.task));
    let required_capabilities = required_capabilities(deliverable_type);
    let complexity = estimate_complexity(&request.task);
    let requires_tool_use = !request.preferences.disable_tool_use && implies_grounding(&request.task);

    debug!(
        deliverable = ?deliverable_type,
        ?complexity,
        tool_use = requires_tool_use,
        "request analyzed"
    );

    TaskAnalysis {
        deliverable_type,
        estimated_agent_count: required_capabilities.len(),
        required_capabilities,
        complexity,
        requires_tool_use,
    }
}

fn detect_deliverable(task: &str) -> DeliverableType {
    let lower = task.to_lowercase();
    if ["presentation", "slide", "deck", "keynote"]
        .iter()
        .any(|k| lower.contains(k))
    {
        DeliverableType::Presentation
    } else if ["course", "curriculum", "lesson", "syllabus", "tutorial"]
        .iter()
        .any(|k| lower.contains(k))
    {
        DeliverableType::Course
    } else if ["essay", "article", "blog post", "op-ed"]
        .iter()
        .any(|k| lower.contains(k))
    {
        DeliverableType::Essay
    } else if ["report", "analysis", "whitepaper", "brief"]
        .iter()
        .any(|k| lower.contains(k))
    {
        DeliverableType::Report
    } else {
        DeliverableType::General
    }
}

/// Fixed deliverable-type → capability mapping. Must stay the union of the
/// planner's workflow template slots for the same deliverable.
pub fn required_capabilities(deliverable: DeliverableType) -> Vec<Capability> {
    match deliverable {
        DeliverableType::Essay => vec![
            Capability::Research,
            Capability::Writing,
            Capability::Editing,
        ],
        DeliverableType::Presentation => vec![
            Capability::Research,
            Capability::Structuring,
            Capability::Writing,
            Capability::VisualDesign,
            Capability::Editing,
        ],
        DeliverableType::Course => vec![
            Capability::Research,
            Capability::Structuring,
            Capability::Writing,
            Capability::Assessment,
            Capability::Editing,
        ],
        DeliverableType::Report => vec![
            Capability::Research,
            Capability::FactChecking,
            Capability::Writing,
            Capability::Editing,
            Capability::Summarization,
        ],
        DeliverableType::General => vec![Capability::General],
    }
}

fn estimate_complexity(task: &str) -> Complexity {
    let words = task.split_whitespace().count();
    if words == 0 {
        // No signal at all: degrade to the moderate default.
        return Complexity::Moderate;
    }
    let base = if words < 25 {
        Complexity::Simple
    } else if words <= 100 {
        Complexity::Moderate
    } else {
        Complexity::Complex
    };

    if is_multi_part(task) {
        match base {
            Complexity::Simple => Complexity::Moderate,
            _ => Complexity::Complex,
        }
    } else {
        base
    }
}

fn is_multi_part(task: &str) -> bool {
    let lower = task.to_lowercase();
    if lower.contains("; ") || lower.contains(" as well as ") || lower.contains(" also ") {
        return true;
    }
    // Numbered lists ("1. ... 2. ...") signal explicit multi-part asks.
    let numbered = (1..=3)
        .filter(|n| lower.contains(&format!("{n}.")) || lower.contains(&format!("{n})")))
        .count();
    numbered >= 2
}

fn implies_grounding(task: &str) -> bool {
    let lower = task.to_lowercase();
    [
        "cite",
        "source",
        "research",
        "data",
        "statistic",
        "evidence",
        "reference",
        "fact",
        "up-to-date",
        "latest",
    ]
    .iter()
    .any(|k| lower.contains(k))
}
