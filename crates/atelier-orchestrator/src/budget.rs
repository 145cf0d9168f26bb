use atelier_core::ModelTier;
use tokio::sync::Mutex;
use tracing::warn;

/// Per-session budget enforcement.
///
/// Constructed per session, never shared across unrelated sessions. The
/// running total lives behind a mutex so admission checks and charges go
/// through one serialized path.
pub struct CostMonitor {
    budget_limit: Option<f64>,
    spent: Mutex<f64>,
}

impl CostMonitor {
    /// Creates a monitor; `None` means unlimited.
    pub fn new(budget_limit: Option<f64>) -> Self {
        Self {
            budget_limit,
            spent: Mutex::new(0.0),
        }
    }

    /// Pre-dispatch check: would this tier's estimated cost fit the budget?
    ///
    /// A refused task is skipped, not failed; the phase proceeds without it.
    pub async fn admit(&self, tier: ModelTier) -> bool {
        let Some(limit) = self.budget_limit else {
            return true;
        };
        let spent = self.spent.lock().await;
        let admitted = *spent + tier.estimated_cost_per_call() <= limit;
        if !admitted {
            warn!(
                spent = *spent,
                limit,
                tier = %tier,
                "budget check refused dispatch"
            );
        }
        admitted
    }

    /// Adds the actual cost of a completed execution to the running total.
    pub async fn charge(&self, cost: f64) {
        *self.spent.lock().await += cost;
    }

    /// The total charged so far.
    pub async fn spent(&self) -> f64 {
        *self.spent.lock().await
    }
}
