//! Migration runner - applies a step list to one session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::ddl::{DdlExecutor, Statement};
use crate::error::{MigrateError, Result};
use crate::inspect::SchemaInspector;
use crate::schema::SchemaSnapshot;
use crate::step::{Migration, MigrationStep};
use crate::store::SchemaStore;

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied { statements: usize, rows_affected: u64 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub id: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Name of the migration that ran.
    pub migration: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// One entry per step, in execution order.
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn applied(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Applied { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.steps.len() - self.applied()
    }

    /// True when every step was already satisfied.
    pub fn is_noop(&self) -> bool {
        self.applied() == 0
    }

    /// Convert report to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Whether a step would run, evaluated without changing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    pub id: String,
    pub satisfied: bool,
}

/// Applies steps in order, stopping at the first failure.
///
/// Every decision is re-derived from a fresh [`SchemaSnapshot`]; nothing is
/// recorded between runs. Cancellation is only observed between steps, so a
/// statement already sent always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct MigrationRunner {
    cancel: Option<CancellationToken>,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.is_cancelled())
            .unwrap_or(false)
    }

    /// Run the migration.
    pub async fn run(
        &self,
        store: &mut dyn SchemaStore,
        migration: &Migration,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Starting migration '{}' ({} steps), run {}",
            migration.name,
            migration.steps.len(),
            run_id
        );

        let mut steps = Vec::with_capacity(migration.steps.len());
        for step in &migration.steps {
            if self.is_cancelled() {
                info!("Cancelled before step '{}'", step.id);
                return Err(MigrateError::Cancelled);
            }

            match run_step(store, step).await {
                Ok(outcome) => steps.push(StepReport {
                    id: step.id.clone(),
                    outcome,
                }),
                Err(e) => {
                    let e = e.in_step(&step.id);
                    error!("Step '{}' failed: {}", step.id, e.root());
                    return Err(e);
                }
            }
        }

        let report = RunReport {
            run_id,
            migration: migration.name.clone(),
            started_at,
            completed_at: Utc::now(),
            steps,
        };
        info!(
            "Migration '{}' complete: {} applied, {} skipped",
            report.migration,
            report.applied(),
            report.skipped()
        );
        Ok(report)
    }

    /// Evaluate each step's skip condition without applying anything.
    ///
    /// Later steps are judged against the current schema, not the schema the
    /// earlier steps would produce.
    pub async fn status(
        &self,
        store: &mut dyn SchemaStore,
        migration: &Migration,
    ) -> Result<Vec<StepStatus>> {
        let mut out = Vec::with_capacity(migration.steps.len());
        for step in &migration.steps {
            let snapshot = SchemaInspector::new(&mut *store)
                .snapshot(&step.inspected_tables())
                .await
                .map_err(|e| e.in_step(&step.id))?;
            let satisfied =
                step.skip_if.holds(&snapshot) || narrow(&step.apply, &snapshot).is_empty();
            out.push(StepStatus {
                id: step.id.clone(),
                satisfied,
            });
        }
        Ok(out)
    }
}

async fn run_step(store: &mut dyn SchemaStore, step: &MigrationStep) -> Result<StepOutcome> {
    let snapshot = SchemaInspector::new(&mut *store)
        .snapshot(&step.inspected_tables())
        .await?;

    if step.skip_if.holds(&snapshot) {
        info!("Skipping '{}': {}", step.id, step.skip_if);
        return Ok(StepOutcome::Skipped {
            reason: step.skip_if.to_string(),
        });
    }

    let plan = narrow(&step.apply, &snapshot);
    if plan.is_empty() {
        info!("Skipping '{}': nothing left to apply", step.id);
        return Ok(StepOutcome::Skipped {
            reason: "nothing left to apply".to_string(),
        });
    }

    if let Some(required) = &step.require {
        if !required.holds(&snapshot) {
            return Err(MigrateError::Verification {
                step: step.id.clone(),
                message: format!("requires {}", required),
            });
        }
    }

    info!("Applying '{}' ({} statement(s))", step.id, plan.len());
    let mut rows_affected = 0;
    for statement in &plan {
        rows_affected += execute_guarded(store, &step.id, statement).await?;
    }

    if let Some(check) = &step.verify {
        let after = SchemaInspector::new(&mut *store).snapshot(&check.tables()).await?;
        if !check.holds(&after) {
            return Err(MigrateError::Verification {
                step: step.id.clone(),
                message: format!("expected {}", check),
            });
        }
        debug!("Verified '{}': {}", step.id, check);
    }

    Ok(StepOutcome::Applied {
        statements: plan.len(),
        rows_affected,
    })
}

/// Execute one statement. A backfill must leave the row count unchanged.
async fn execute_guarded(
    store: &mut dyn SchemaStore,
    step: &str,
    statement: &Statement,
) -> Result<u64> {
    let Statement::Backfill { table, .. } = statement else {
        return DdlExecutor::new(&mut *store).execute(statement).await;
    };

    let before = store.count_rows(table).await?;
    let affected = DdlExecutor::new(&mut *store).execute(statement).await?;
    let after = store.count_rows(table).await?;
    if before != after {
        return Err(MigrateError::Verification {
            step: step.to_string(),
            message: format!(
                "row count of {} changed during backfill: {} before, {} after",
                table, before, after
            ),
        });
    }
    info!("Backfilled {} row(s) of {}, {} changed", after, table, affected);
    Ok(affected)
}

/// Drop the parts of a plan that live state shows are already in place.
fn narrow(plan: &[Statement], snapshot: &SchemaSnapshot) -> Vec<Statement> {
    plan.iter()
        .filter_map(|statement| match statement {
            Statement::AddColumns { table, columns } => {
                let missing: Vec<_> = columns
                    .iter()
                    .filter(|c| !snapshot.has_column(table, &c.name))
                    .cloned()
                    .collect();
                (!missing.is_empty()).then(|| Statement::AddColumns {
                    table: table.clone(),
                    columns: missing,
                })
            }
            Statement::DropColumns { table, columns } => {
                let present: Vec<_> = columns
                    .iter()
                    .filter(|c| snapshot.has_column(table, c))
                    .cloned()
                    .collect();
                (!present.is_empty()).then(|| Statement::DropColumns {
                    table: table.clone(),
                    columns: present,
                })
            }
            other => Some(other.clone()),
        })
        .collect()
}
