//! Migrator - executes a migration plan against a store.
//!
//! Steps run strictly in order and each one commits before the next starts.
//! A failing step aborts the rest of the plan; the store keeps the model of
//! the last completed step.

use super::plan::{MigrationPlan, MigrationStep};
use super::store::{MigrationContext, ModelStore};
use crate::catalog::Schema;
use crate::error::StoreError;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of applying a migration plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version the store started at.
    pub from_version: String,
    /// Version the store ended at.
    pub to_version: String,
    /// Steps executed, including skipped scripts.
    pub steps_executed: usize,
    /// Scripts skipped because their marker was already present.
    pub scripts_skipped: usize,
    /// Total steps in the plan.
    pub total_steps: usize,
}

impl MigrationReport {
    /// Report for a store that needed no migration.
    pub fn unchanged(version: &str) -> Self {
        Self {
            from_version: version.to_string(),
            to_version: version.to_string(),
            steps_executed: 0,
            scripts_skipped: 0,
            total_steps: 0,
        }
    }
}

/// Executes migration plans.
pub struct Migrator;

impl Migrator {
    /// Apply every step of `plan` to `store`.
    #[instrument(skip_all, fields(from = %plan.start.version, to = %plan.target.version))]
    pub fn apply<S: ModelStore>(store: &S, plan: &MigrationPlan) -> Result<MigrationReport, StoreError> {
        let mut report = MigrationReport {
            from_version: plan.start.version.clone(),
            to_version: plan.start.version.clone(),
            steps_executed: 0,
            scripts_skipped: 0,
            total_steps: plan.steps.len(),
        };
        let mut current = Arc::clone(&plan.start);

        for (idx, step) in plan.steps.iter().enumerate() {
            debug!(step = idx, description = %step.description(), "running migration step");
            match Self::execute_step(store, &current, step) {
                Ok(outcome) => {
                    if let StepOutcome::Migrated(model) = &outcome {
                        current = Arc::clone(model);
                        report.to_version = current.version.clone();
                    }
                    if matches!(outcome, StepOutcome::Skipped) {
                        report.scripts_skipped += 1;
                    }
                    report.steps_executed += 1;
                }
                Err(e) => {
                    warn!(
                        step = idx,
                        model = %current.version,
                        error = %e,
                        "migration step failed"
                    );
                    return Err(e);
                }
            }
        }

        info!(
            steps = report.steps_executed,
            skipped = report.scripts_skipped,
            "migration complete"
        );
        Ok(report)
    }

    fn execute_step<S: ModelStore>(
        store: &S,
        current: &Arc<Schema>,
        step: &MigrationStep,
    ) -> Result<StepOutcome, StoreError> {
        match step {
            MigrationStep::Lightweight { target, .. } => {
                store.migrate_structurally(current, target)?;
                Ok(StepOutcome::Migrated(Arc::clone(target)))
            }
            MigrationStep::Scripted { script, .. } => {
                let marker = step.marker_name();
                let mut context = store.open_at(current)?;
                if let Some(name) = &marker {
                    if context.has_marker(name)? {
                        info!(marker = %name, "script already applied, skipping");
                        return Ok(StepOutcome::Skipped);
                    }
                }
                script.run(&mut context)?;
                if let Some(name) = &marker {
                    context.mark_applied(name)?;
                }
                context.save()?;
                Ok(StepOutcome::Ran)
            }
        }
    }
}

enum StepOutcome {
    Migrated(Arc<Schema>),
    Ran,
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Attribute, EntityDeclaration, ScalarType, SchemaBuilder, StoreFingerprint};
    use crate::migration::MigrationScript;
    use crate::storage::{Record, RecordId, Value};
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    /// Store double that records what the migrator asks of it.
    #[derive(Default)]
    struct FakeStore {
        state: Rc<RefCell<FakeState>>,
    }

    #[derive(Default)]
    struct FakeState {
        model: Option<StoreFingerprint>,
        markers: BTreeSet<String>,
        log: Vec<String>,
        fail_structural: bool,
    }

    struct FakeContext {
        model: Arc<Schema>,
        state: Rc<RefCell<FakeState>>,
        pending: Vec<String>,
    }

    impl ModelStore for FakeStore {
        type Context = FakeContext;

        fn current_fingerprint(&self) -> Result<Option<StoreFingerprint>, StoreError> {
            Ok(self.state.borrow().model)
        }

        fn migrate_structurally(&self, _from: &Schema, to: &Arc<Schema>) -> Result<(), StoreError> {
            let mut state = self.state.borrow_mut();
            if state.fail_structural {
                return Err(StoreError::Script("structural".into()));
            }
            state.log.push(format!("migrate {}", to.version));
            state.model = Some(to.fingerprint());
            Ok(())
        }

        fn open_at(&self, model: &Arc<Schema>) -> Result<FakeContext, StoreError> {
            Ok(FakeContext {
                model: Arc::clone(model),
                state: Rc::clone(&self.state),
                pending: Vec::new(),
            })
        }
    }

    impl MigrationContext for FakeContext {
        fn model(&self) -> &Schema {
            &self.model
        }

        fn insert(&mut self, entity: &str, _: Vec<(String, Value)>) -> Result<RecordId, StoreError> {
            self.state.borrow_mut().log.push(format!("insert {entity}"));
            Ok(RecordId(0))
        }

        fn get(&self, _: RecordId) -> Result<Option<Record>, StoreError> {
            Ok(None)
        }

        fn fetch_all(&self, _: &str) -> Result<Vec<(RecordId, Record)>, StoreError> {
            Ok(Vec::new())
        }

        fn set(&mut self, id: RecordId, _: &str, _: Value) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id.0))
        }

        fn relate(&mut self, id: RecordId, _: &str, _: RecordId) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id.0))
        }

        fn unrelate(&mut self, id: RecordId, _: &str, _: RecordId) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id.0))
        }

        fn related(&self, id: RecordId, _: &str) -> Result<Vec<RecordId>, StoreError> {
            Err(StoreError::NotFound(id.0))
        }

        fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
            Err(StoreError::NotFound(id.0))
        }

        fn has_marker(&self, name: &str) -> Result<bool, StoreError> {
            Ok(self.state.borrow().markers.contains(name))
        }

        fn mark_applied(&mut self, name: &str) -> Result<(), StoreError> {
            self.pending.push(name.to_string());
            Ok(())
        }

        fn save(&mut self) -> Result<(), StoreError> {
            let mut state = self.state.borrow_mut();
            state.markers.extend(self.pending.drain(..));
            state.log.push("save".to_string());
            Ok(())
        }
    }

    fn schema(version: &str, ty: ScalarType) -> Arc<Schema> {
        Arc::new(
            SchemaBuilder::new(version)
                .with_entity(EntityDeclaration::new("Item").with_attribute(Attribute::new("a", ty)))
                .build()
                .unwrap(),
        )
    }

    fn scripted_plan(idempotent: bool) -> MigrationPlan {
        let v1 = schema("v1", ScalarType::Int64);
        let v2 = schema("v2", ScalarType::String);
        MigrationPlan {
            start: v1,
            target: Arc::clone(&v2),
            steps: vec![
                MigrationStep::Scripted {
                    source_version: "v1".into(),
                    target_version: "v2".into(),
                    script: MigrationScript::new(|ctx| ctx.insert("Item", vec![]).map(|_| ())),
                    idempotent,
                },
                MigrationStep::Lightweight {
                    source_version: "v1".into(),
                    target: v2,
                },
            ],
        }
    }

    #[test]
    fn test_steps_run_in_order() {
        let store = FakeStore::default();
        let report = Migrator::apply(&store, &scripted_plan(false)).unwrap();

        assert_eq!(store.state.borrow().log, vec!["insert Item", "save", "migrate v2"]);
        assert!(store.state.borrow().markers.contains("script:v1->v2"));
        assert_eq!(report.from_version, "v1");
        assert_eq!(report.to_version, "v2");
        assert_eq!(report.steps_executed, 2);
        assert_eq!(report.scripts_skipped, 0);
    }

    #[test]
    fn test_marked_script_is_skipped() {
        let store = FakeStore::default();
        store
            .state
            .borrow_mut()
            .markers
            .insert("script:v1->v2".to_string());

        let report = Migrator::apply(&store, &scripted_plan(false)).unwrap();
        assert_eq!(store.state.borrow().log, vec!["migrate v2"]);
        assert_eq!(report.scripts_skipped, 1);
        assert_eq!(report.steps_executed, 2);
    }

    #[test]
    fn test_idempotent_script_always_runs() {
        let store = FakeStore::default();
        Migrator::apply(&store, &scripted_plan(true)).unwrap();
        Migrator::apply(&store, &scripted_plan(true)).unwrap();

        let state = store.state.borrow();
        assert!(state.markers.is_empty());
        assert_eq!(state.log.iter().filter(|l| *l == "insert Item").count(), 2);
    }

    #[test]
    fn test_failure_aborts_plan() {
        let store = FakeStore::default();
        store.state.borrow_mut().fail_structural = true;

        let err = Migrator::apply(&store, &scripted_plan(false)).unwrap_err();
        assert!(matches!(err, StoreError::Script(_)));
        // The script step committed before the failure.
        assert_eq!(store.state.borrow().log, vec!["insert Item", "save"]);
        assert_eq!(store.current_fingerprint().unwrap(), None);
    }
}
