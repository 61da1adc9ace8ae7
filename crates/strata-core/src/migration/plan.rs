//! Migration planning over a version chain.
//!
//! The planner searches the chain from the newest version backwards for the
//! schema the store's fingerprint matches, then emits the steps of every
//! transition from that version up to the target, oldest first. Planning is
//! pure: it never touches the store, so a planning error leaves it intact.

use super::descriptor::{ChainEntry, MigrationDescriptor, MigrationScript, VersionChain};
use super::diff::SchemaDiff;
use super::error::MigrationError;
use super::grader::CompatibilityReport;
use crate::catalog::{Schema, StoreFingerprint};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// One step of a migration.
#[derive(Debug, Clone)]
pub enum MigrationStep {
    /// Structural transform of the store to `target`.
    Lightweight {
        source_version: String,
        target: Arc<Schema>,
    },
    /// Data transformation run at the store's current model.
    Scripted {
        source_version: String,
        target_version: String,
        script: MigrationScript,
        idempotent: bool,
    },
}

impl MigrationStep {
    /// Get a human-readable description.
    pub fn description(&self) -> String {
        match self {
            MigrationStep::Lightweight {
                source_version,
                target,
            } => format!("lightweight {} -> {}", source_version, target.version),
            MigrationStep::Scripted {
                source_version,
                target_version,
                idempotent,
                ..
            } => format!(
                "script {} -> {}{}",
                source_version,
                target_version,
                if *idempotent { " (idempotent)" } else { "" }
            ),
        }
    }

    /// Marker name guarding a non-idempotent script.
    pub fn marker_name(&self) -> Option<String> {
        match self {
            MigrationStep::Scripted {
                source_version,
                target_version,
                idempotent: false,
                ..
            } => Some(format!("script:{}->{}", source_version, target_version)),
            _ => None,
        }
    }

    pub fn is_lightweight(&self) -> bool {
        matches!(self, MigrationStep::Lightweight { .. })
    }

    pub fn is_scripted(&self) -> bool {
        matches!(self, MigrationStep::Scripted { .. })
    }
}

/// A complete migration plan.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Schema the store currently conforms to.
    pub start: Arc<Schema>,
    /// Schema the store will conform to after the last step.
    pub target: Arc<Schema>,
    /// Ordered list of migration steps.
    pub steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    /// Get the number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Check if the store already matches the target.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Computes migration plans.
pub struct MigrationPlanner;

impl MigrationPlanner {
    /// Plan the steps taking a store at `fingerprint` to `target`.
    #[instrument(skip_all, fields(target = %target.version, chain = chain.len()))]
    pub fn plan(
        fingerprint: &StoreFingerprint,
        target: &Arc<Schema>,
        chain: &VersionChain,
    ) -> Result<MigrationPlan, MigrationError> {
        Self::check_versions(target, chain)?;

        let (start, steps) = Self::resolve(fingerprint, target, chain.entries())?;
        debug!(
            start = %start.version,
            steps = steps.len(),
            "planned migration"
        );

        Ok(MigrationPlan {
            start,
            target: Arc::clone(target),
            steps,
        })
    }

    fn check_versions(target: &Schema, chain: &VersionChain) -> Result<(), MigrationError> {
        let mut seen = HashSet::new();
        for version in chain.versions().chain(std::iter::once(target.version.as_str())) {
            if !seen.insert(version) {
                return Err(MigrationError::DuplicateVersionIdentifier {
                    version: version.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Newest-to-oldest search; steps come back oldest first.
    fn resolve(
        fingerprint: &StoreFingerprint,
        target: &Arc<Schema>,
        chain: &[ChainEntry],
    ) -> Result<(Arc<Schema>, Vec<MigrationStep>), MigrationError> {
        if target.fingerprint() == *fingerprint {
            return Ok((Arc::clone(target), Vec::new()));
        }

        let Some((previous, earlier)) = chain.split_last() else {
            return Err(MigrationError::NoCompatibleVersion {
                fingerprint: fingerprint.to_string(),
            });
        };

        let (start, mut steps) = Self::resolve(fingerprint, &previous.schema, earlier)?;
        steps.extend(Self::transition(&previous.schema, &previous.migration, target)?);
        Ok((start, steps))
    }

    /// Steps for one transition between adjacent versions.
    pub fn transition(
        source: &Schema,
        migration: &MigrationDescriptor,
        target: &Arc<Schema>,
    ) -> Result<Vec<MigrationStep>, MigrationError> {
        if migration.source_version != source.version {
            return Err(MigrationError::MismatchedMigrationSource {
                to_version: target.version.clone(),
                declared: migration.source_version.clone(),
                expected: source.version.clone(),
            });
        }

        let diff = SchemaDiff::compute(source, target).map_err(|e| MigrationError::Diff {
            from_version: source.version.clone(),
            to_version: target.version.clone(),
            source: e,
        })?;
        let report = CompatibilityReport::grade(&diff, target);

        let lightweight = MigrationStep::Lightweight {
            source_version: source.version.clone(),
            target: Arc::clone(target),
        };

        match &migration.script {
            Some(script) => {
                let mut steps = vec![MigrationStep::Scripted {
                    source_version: source.version.clone(),
                    target_version: target.version.clone(),
                    script: script.clone(),
                    idempotent: migration.idempotent,
                }];
                if report.structural_change || source.fingerprint() != target.fingerprint() {
                    steps.push(lightweight);
                }
                Ok(steps)
            }
            None if report.requires_script() => Err(MigrationError::MissingRequiredScript {
                from_version: source.version.clone(),
                to_version: target.version.clone(),
                requirements: report.requirements,
            }),
            None => Ok(vec![lightweight]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Attribute, EntityDeclaration, ScalarType, SchemaBuilder};

    fn item(version: &str, attrs: &[(&str, ScalarType)]) -> Schema {
        let decl = attrs.iter().fold(EntityDeclaration::new("Item"), |d, (name, ty)| {
            d.with_attribute(Attribute::optional(*name, *ty))
        });
        SchemaBuilder::new(version).with_entity(decl).build().unwrap()
    }

    fn chain_of(n: usize) -> (VersionChain, Arc<Schema>) {
        let mut chain = VersionChain::new();
        let mut attrs = Vec::new();
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        for i in 0..n {
            chain.push(
                item(&format!("v{i}"), &attrs),
                MigrationDescriptor::lightweight(format!("v{i}")),
            );
            attrs.push((names[i], ScalarType::Int64));
        }
        (chain, Arc::new(item(&format!("v{n}"), &attrs)))
    }

    #[test]
    fn test_store_at_target_needs_no_steps() {
        let (chain, target) = chain_of(3);
        let plan = MigrationPlanner::plan(&target.fingerprint(), &target, &chain).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.start.version, "v3");
    }

    #[test]
    fn test_steps_from_each_version() {
        let (chain, target) = chain_of(4);
        for (k, entry) in chain.iter().enumerate() {
            let plan = MigrationPlanner::plan(&entry.schema.fingerprint(), &target, &chain).unwrap();
            assert_eq!(plan.step_count(), 4 - k);
            assert_eq!(plan.start.version, format!("v{k}"));
            assert!(plan.steps.iter().all(MigrationStep::is_lightweight));

            let targets: Vec<String> = plan
                .steps
                .iter()
                .map(|s| match s {
                    MigrationStep::Lightweight { target, .. } => target.version.clone(),
                    MigrationStep::Scripted { .. } => unreachable!(),
                })
                .collect();
            let expected: Vec<String> = (k + 1..=4).map(|i| format!("v{i}")).collect();
            assert_eq!(targets, expected);
        }
    }

    #[test]
    fn test_unknown_fingerprint() {
        let (chain, target) = chain_of(2);
        let err = MigrationPlanner::plan(&StoreFingerprint([9; 32]), &target, &chain).unwrap_err();
        assert!(matches!(err, MigrationError::NoCompatibleVersion { .. }));
    }

    #[test]
    fn test_duplicate_versions() {
        let mut chain = VersionChain::new();
        chain.push(item("v1", &[]), MigrationDescriptor::lightweight("v1"));
        let target = Arc::new(item("v1", &[("a", ScalarType::Bool)]));

        let err = MigrationPlanner::plan(&target.fingerprint(), &target, &chain).unwrap_err();
        assert!(
            matches!(err, MigrationError::DuplicateVersionIdentifier { version } if version == "v1")
        );
    }

    #[test]
    fn test_mismatched_source() {
        let mut chain = VersionChain::new();
        let v1 = item("v1", &[]);
        let fp = v1.fingerprint();
        chain.push(v1, MigrationDescriptor::lightweight("v0"));
        let target = Arc::new(item("v2", &[("a", ScalarType::Bool)]));

        let err = MigrationPlanner::plan(&fp, &target, &chain).unwrap_err();
        assert!(matches!(err, MigrationError::MismatchedMigrationSource { .. }));
    }

    #[test]
    fn test_missing_required_script() {
        let v1 = item("v1", &[("a", ScalarType::Int64)]);
        let fp = v1.fingerprint();
        let chain = VersionChain::new().with_version(v1, MigrationDescriptor::lightweight("v1"));
        let target = Arc::new(item("v2", &[("a", ScalarType::String)]));

        let err = MigrationPlanner::plan(&fp, &target, &chain).unwrap_err();
        match err {
            MigrationError::MissingRequiredScript {
                from_version,
                to_version,
                requirements,
            } => {
                assert_eq!(from_version, "v1");
                assert_eq!(to_version, "v2");
                assert_eq!(requirements.len(), 1);
                assert_eq!(requirements[0].property.as_deref(), Some("a"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_script_with_structural_change() {
        let v1 = item("v1", &[("a", ScalarType::Int64)]);
        let fp = v1.fingerprint();
        let chain = VersionChain::new().with_version(
            v1,
            MigrationDescriptor::scripted("v1", |_ctx| Ok(())),
        );
        let target = Arc::new(item("v2", &[("a", ScalarType::String)]));

        let plan = MigrationPlanner::plan(&fp, &target, &chain).unwrap();
        assert_eq!(plan.step_count(), 2);
        assert!(plan.steps[0].is_scripted());
        assert!(plan.steps[1].is_lightweight());
        assert_eq!(plan.steps[0].marker_name().as_deref(), Some("script:v1->v2"));
        assert_eq!(plan.steps[0].description(), "script v1 -> v2");
    }

    #[test]
    fn test_script_without_structural_change() {
        let v1 = item("v1", &[("a", ScalarType::Int64)]);
        let fp = v1.fingerprint();
        let chain = VersionChain::new().with_version(
            v1,
            MigrationDescriptor::scripted("v1", |_ctx| Ok(())).idempotent(),
        );
        let target = Arc::new(item("v2", &[("a", ScalarType::Int64)]));

        // Same shape, so the store already matches the target.
        let plan = MigrationPlanner::plan(&fp, &target, &chain).unwrap();
        assert!(plan.is_empty());

        let steps = MigrationPlanner::transition(&chain.entries()[0].schema, &chain.entries()[0].migration, &target)
            .unwrap();
        assert_eq!(steps.len(), 1);
        assert!(steps[0].is_scripted());
        assert_eq!(steps[0].marker_name(), None);
    }
}
