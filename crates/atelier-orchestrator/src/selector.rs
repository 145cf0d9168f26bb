//! Model-tier selection.
//!
//! A pure function from task demands and caller preferences to an abstract
//! model tier. Deterministic, no side effects, no I/O — call it as often
//! as you like.

use atelier_core::{Complexity, Level, ModelTier, Preferences};

/// Selects the model tier for one invocation.
///
/// Escalation rules, in order:
/// - complexity sets the base tier (simple → economy, moderate → standard,
///   complex → advanced);
/// - a high quality requirement escalates one tier, a low one de-escalates;
/// - a high speed priority de-escalates one tier;
/// - high cost sensitivity de-escalates one tier, except when the quality
///   requirement is also high — quality wins that trade-off;
/// - tool use needs at least the standard tier.
pub fn select_tier(
    complexity: Complexity,
    quality: Level,
    speed_priority: Level,
    cost_sensitivity: Level,
    needs_tool_use: bool,
) -> ModelTier {
    let mut tier = match complexity {
        Complexity::Simple => ModelTier::Economy,
        Complexity::Moderate => ModelTier::Standard,
        Complexity::Complex => ModelTier::Advanced,
    };

    match quality {
        Level::High => tier = tier.escalate(),
        Level::Low => tier = tier.de_escalate(),
        Level::Medium => {}
    }

    if speed_priority == Level::High {
        tier = tier.de_escalate();
    }

    // Quality takes precedence over cost when both are high.
    if cost_sensitivity == Level::High && quality != Level::High {
        tier = tier.de_escalate();
    }

    if needs_tool_use && tier < ModelTier::Standard {
        tier = ModelTier::Standard;
    }

    tier
}

/// Tier for one planned task: the preference-driven selection, floored at
/// the agent's declared minimum tier.
pub fn tier_for_task(
    complexity: Complexity,
    preferences: &Preferences,
    needs_tool_use: bool,
    agent_minimum: ModelTier,
) -> ModelTier {
    let selected = select_tier(
        complexity,
        preferences.quality,
        preferences.speed_priority,
        preferences.cost_sensitivity,
        needs_tool_use,
    );
    selected.max(agent_minimum)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_sets_base_tier() {
        let m = Level::Medium;
        assert_eq!(select_tier(Complexity::Simple, m, m, m, false), ModelTier::Economy);
        assert_eq!(select_tier(Complexity::Moderate, m, m, m, false), ModelTier::Standard);
        assert_eq!(select_tier(Complexity::Complex, m, m, m, false), ModelTier::Advanced);
    }

    #[test]
    fn test_quality_escalates() {
        assert_eq!(
            select_tier(Complexity::Moderate, Level::High, Level::Medium, Level::Medium, false),
            ModelTier::Advanced
        );
        assert_eq!(
            select_tier(Complexity::Complex, Level::High, Level::Medium, Level::Medium, false),
            ModelTier::Premium
        );
    }

    #[test]
    fn test_speed_and_cost_de_escalate() {
        assert_eq!(
            select_tier(Complexity::Complex, Level::Medium, Level::High, Level::Medium, false),
            ModelTier::Standard
        );
        assert_eq!(
            select_tier(Complexity::Complex, Level::Medium, Level::Medium, Level::High, false),
            ModelTier::Standard
        );
        // Both pressures stack.
        assert_eq!(
            select_tier(Complexity::Complex, Level::Medium, Level::High, Level::High, false),
            ModelTier::Economy
        );
    }

    #[test]
    fn test_quality_beats_cost_when_both_high() {
        // High quality escalates and suppresses the cost de-escalation.
        assert_eq!(
            select_tier(Complexity::Moderate, Level::High, Level::Medium, Level::High, false),
            ModelTier::Advanced
        );
    }

    #[test]
    fn test_tool_use_floors_at_standard() {
        assert_eq!(
            select_tier(Complexity::Simple, Level::Low, Level::High, Level::High, true),
            ModelTier::Standard
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        for _ in 0..50 {
            assert_eq!(
                select_tier(Complexity::Complex, Level::High, Level::Low, Level::High, true),
                select_tier(Complexity::Complex, Level::High, Level::Low, Level::High, true),
            );
        }
    }

    #[test]
    fn test_agent_minimum_is_a_floor() {
        let prefs = Preferences {
            quality: Level::Low,
            speed_priority: Level::High,
            cost_sensitivity: Level::High,
            disable_tool_use: false,
        };
        assert_eq!(
            tier_for_task(Complexity::Simple, &prefs, false, ModelTier::Advanced),
            ModelTier::Advanced
        );
        assert_eq!(
            tier_for_task(Complexity::Simple, &prefs, false, ModelTier::Economy),
            ModelTier::Economy
        );
    }
}
