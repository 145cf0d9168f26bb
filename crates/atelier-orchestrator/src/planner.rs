//! Execution planning.
//!
//! Turns a [`TaskAnalysis`] plus the agent registry into a validated
//! [`ExecutionPlan`]: phases following a fixed per-deliverable workflow
//! template, with every phase after the first depending on the one before
//! it and no dependencies between tasks of the same phase.

use crate::registry::{AgentDefinition, AgentRegistry};
use crate::selector;
use atelier_core::{
    AgentTask, AtelierResult, Capability, ContentRequest, DeliverableType, ExecutionPhase,
    ExecutionPlan, PlanningError, TaskAnalysis,
};
use tracing::warn;
use uuid::Uuid;

/// Planner tunables.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Hard ceiling on plan size; larger plans are rejected, not truncated.
    pub max_tasks: usize,
    /// Retry budget stamped on every planned task.
    pub default_max_retries: u32,
    /// Per-attempt timeout stamped on every planned task.
    pub default_timeout_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_tasks: 12,
            default_max_retries: 2,
            default_timeout_ms: 60_000,
        }
    }
}

/// One phase of a workflow template: name, parallelism, capability slots.
struct PhaseSpec {
    name: &'static str,
    parallel: bool,
    capabilities: &'static [Capability],
}

const fn spec(name: &'static str, parallel: bool, capabilities: &'static [Capability]) -> PhaseSpec {
    PhaseSpec {
        name,
        parallel,
        capabilities,
    }
}

/// The fixed workflow template for a deliverable type.
fn template(deliverable: DeliverableType) -> Vec<PhaseSpec> {
    use Capability::*;
    match deliverable {
        DeliverableType::Essay => vec![
            spec("research", false, &[Research]),
            spec("drafting", false, &[Writing]),
            spec("editing", false, &[Editing]),
        ],
        DeliverableType::Presentation => vec![
            spec("research", false, &[Research]),
            spec("drafting", true, &[Structuring, Writing]),
            spec("design", false, &[VisualDesign]),
            spec("editing", false, &[Editing]),
        ],
        DeliverableType::Course => vec![
            spec("research", false, &[Research]),
            spec("structuring", false, &[Structuring]),
            spec("drafting", true, &[Writing, Assessment]),
            spec("editing", false, &[Editing]),
        ],
        DeliverableType::Report => vec![
            spec("research", true, &[Research, FactChecking]),
            spec("drafting", false, &[Writing]),
            spec("editing", true, &[Editing, Summarization]),
        ],
        DeliverableType::General => vec![spec("drafting", false, &[General])],
    }
}

fn instruction_for(capability: Capability) -> &'static str {
    match capability {
        Capability::Research => "Research the topic for",
        Capability::Writing => "Draft the content for",
        Capability::Editing => "Edit and polish the draft for",
        Capability::Critique => "Review the draft for",
        Capability::Structuring => "Design the structure for",
        Capability::Summarization => "Summarize the material for",
        Capability::FactChecking => "Fact-check the material for",
        Capability::VisualDesign => "Design the visual treatment for",
        Capability::Assessment => "Write assessments for",
        Capability::General => "Complete",
    }
}

/// Builds execution plans against an injected registry.
pub struct Planner<'a> {
    registry: &'a AgentRegistry,
    config: PlannerConfig,
}

impl<'a> Planner<'a> {
    /// Creates a planner with default configuration.
    pub fn new(registry: &'a AgentRegistry) -> Self {
        Self {
            registry,
            config: PlannerConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Produces a validated plan for the analyzed request.
    ///
    /// Missing-capability policy: substitute the general-purpose agent
    /// when one is registered, otherwise fail with
    /// [`PlanningError::MissingCapability`] — never both for one lookup.
    pub fn plan(
        &self,
        request: &ContentRequest,
        analysis: &TaskAnalysis,
    ) -> AtelierResult<ExecutionPlan> {
        let specs = template(analysis.deliverable_type);

        let total_tasks: usize = specs.iter().map(|s| s.capabilities.len()).sum();
        if total_tasks > self.config.max_tasks {
            return Err(PlanningError::PlanTooLarge {
                tasks: total_tasks,
                max: self.config.max_tasks,
            }
            .into());
        }

        let mut phases: Vec<ExecutionPhase> = Vec::with_capacity(specs.len());
        let mut prev_phase_id: Option<Uuid> = None;
        let mut prev_task_ids: Vec<Uuid> = Vec::new();

        for phase_spec in specs {
            let mut phase = ExecutionPhase::new(phase_spec.name, phase_spec.parallel);
            if let Some(prev) = prev_phase_id {
                phase.depends_on.push(prev);
            }

            for &capability in phase_spec.capabilities {
                let agent = self.resolve(capability)?;
                let tier = selector::tier_for_task(
                    analysis.complexity,
                    &request.preferences,
                    analysis.requires_tool_use,
                    agent.default_tier,
                );
                let prompt_input =
                    format!("{}: {}", instruction_for(capability), request.task);

                let mut task = AgentTask::new(&agent.id, prompt_input, tier)
                    .with_dependencies(prev_task_ids.clone())
                    .with_max_retries(self.config.default_max_retries)
                    .with_timeout_ms(self.config.default_timeout_ms);
                task.priority = agent.priority;
                phase.tasks.push(task);
            }

            prev_task_ids = phase.tasks.iter().map(|t| t.id).collect();
            prev_phase_id = Some(phase.id);
            phases.push(phase);
        }

        let plan = ExecutionPlan { phases };
        plan.validate().map_err(PlanningError::InvalidGraph)?;
        Ok(plan)
    }

    fn resolve(&self, capability: Capability) -> Result<&AgentDefinition, PlanningError> {
        if let Some(agent) = self.registry.find_by_capability(capability) {
            return Ok(agent);
        }
        if capability != Capability::General {
            if let Some(general) = self.registry.find_by_capability(Capability::General) {
                warn!(%capability, substitute = %general.id, "no specialist registered, substituting general-purpose agent");
                return Ok(general);
            }
        }
        Err(PlanningError::MissingCapability(capability))
    }
}
