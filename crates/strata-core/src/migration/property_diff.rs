//! Property-level and collection-level structural differences.
//!
//! A difference only ever reports structural fields: names, declared types,
//! storage kinds, optionality, cardinality ranges, related entities and
//! inverse names. Documentation, defaults, delete behaviors and query specs
//! never show up here.

use super::error::DiffError;
use crate::catalog::{
    Attribute, CardinalityRange, EntityDescriptor, PropertyDescriptor, PropertyKind,
    Relationship, ScalarType, StorageKind,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// One structural change to a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyChange {
    NameChanged { from: String, to: String },
    KindChanged { from: PropertyKind, to: PropertyKind },
    TypeChanged { from: ScalarType, to: ScalarType },
    StorageChanged { from: StorageKind, to: StorageKind },
    OptionalityChanged { from: bool, to: bool },
    CardinalityChanged { from: CardinalityRange, to: CardinalityRange },
    RelatedEntityChanged { from: String, to: String },
    InverseNameChanged { from: String, to: String },
}

/// Tag of a [`PropertyChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    NameChanged,
    KindChanged,
    TypeChanged,
    StorageChanged,
    OptionalityChanged,
    CardinalityChanged,
    RelatedEntityChanged,
    InverseNameChanged,
}

/// Non-empty set of changes between two versions of one property.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet(Vec<PropertyChange>);

impl PropertyChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            PropertyChange::NameChanged { .. } => ChangeKind::NameChanged,
            PropertyChange::KindChanged { .. } => ChangeKind::KindChanged,
            PropertyChange::TypeChanged { .. } => ChangeKind::TypeChanged,
            PropertyChange::StorageChanged { .. } => ChangeKind::StorageChanged,
            PropertyChange::OptionalityChanged { .. } => ChangeKind::OptionalityChanged,
            PropertyChange::CardinalityChanged { .. } => ChangeKind::CardinalityChanged,
            PropertyChange::RelatedEntityChanged { .. } => ChangeKind::RelatedEntityChanged,
            PropertyChange::InverseNameChanged { .. } => ChangeKind::InverseNameChanged,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> String {
        match self {
            PropertyChange::NameChanged { from, to } => format!("renamed {} -> {}", from, to),
            PropertyChange::KindChanged { from, to } => format!("kind {} -> {}", from, to),
            PropertyChange::TypeChanged { from, to } => format!("type {} -> {}", from, to),
            PropertyChange::StorageChanged { from, to } => format!("storage {} -> {}", from, to),
            PropertyChange::OptionalityChanged { to, .. } => {
                if *to {
                    "now optional".to_string()
                } else {
                    "now required".to_string()
                }
            }
            PropertyChange::CardinalityChanged { from, to } => {
                format!("cardinality {} -> {}", from, to)
            }
            PropertyChange::RelatedEntityChanged { from, to } => {
                format!("related entity {} -> {}", from, to)
            }
            PropertyChange::InverseNameChanged { from, to } => {
                format!("inverse {} -> {}", from, to)
            }
        }
    }
}

impl ChangeSet {
    fn from_changes(changes: Vec<PropertyChange>) -> Option<Self> {
        (!changes.is_empty()).then_some(Self(changes))
    }

    pub fn changes(&self) -> &[PropertyChange] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyChange> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Change tags in report order.
    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.0.iter().map(PropertyChange::kind).collect()
    }

    pub fn contains(&self, kind: ChangeKind) -> bool {
        self.0.iter().any(|c| c.kind() == kind)
    }
}

/// Something with a name and an optional rename marker.
pub trait Lineage {
    fn name(&self) -> &str;
    fn rename_from(&self) -> Option<&str>;
}

/// A difference that can be compared with its rename stripped.
pub trait Difference: Clone + PartialEq {
    /// The same difference without the name change, or `None` if nothing
    /// else differs.
    fn without_rename(&self) -> Option<Self>;
}

impl Difference for ChangeSet {
    fn without_rename(&self) -> Option<Self> {
        Self::from_changes(
            self.0
                .iter()
                .filter(|c| c.kind() != ChangeKind::NameChanged)
                .cloned()
                .collect(),
        )
    }
}

impl Lineage for Attribute {
    fn name(&self) -> &str {
        &self.name
    }

    fn rename_from(&self) -> Option<&str> {
        self.rename_from.as_deref()
    }
}

impl Lineage for Relationship {
    fn name(&self) -> &str {
        &self.name
    }

    fn rename_from(&self) -> Option<&str> {
        self.rename_from.as_deref()
    }
}

impl Lineage for EntityDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn rename_from(&self) -> Option<&str> {
        self.rename_from.as_deref()
    }
}

fn push_if_changed<T: PartialEq + Clone>(
    changes: &mut Vec<PropertyChange>,
    from: &T,
    to: &T,
    make: fn(T, T) -> PropertyChange,
) {
    if from != to {
        changes.push(make(from.clone(), to.clone()));
    }
}

/// Compare two versions of an attribute.
pub fn diff_attribute(old: &Attribute, new: &Attribute) -> Option<ChangeSet> {
    let mut changes = Vec::new();
    push_if_changed(&mut changes, &old.name, &new.name, |from, to| {
        PropertyChange::NameChanged { from, to }
    });
    push_if_changed(&mut changes, &old.scalar_type, &new.scalar_type, |from, to| {
        PropertyChange::TypeChanged { from, to }
    });
    push_if_changed(&mut changes, &old.storage, &new.storage, |from, to| {
        PropertyChange::StorageChanged { from, to }
    });
    push_if_changed(&mut changes, &old.optional, &new.optional, |from, to| {
        PropertyChange::OptionalityChanged { from, to }
    });
    ChangeSet::from_changes(changes)
}

/// Compare two versions of a relationship.
pub fn diff_relationship(old: &Relationship, new: &Relationship) -> Option<ChangeSet> {
    let mut changes = Vec::new();
    push_if_changed(&mut changes, &old.name, &new.name, |from, to| {
        PropertyChange::NameChanged { from, to }
    });
    push_if_changed(&mut changes, &old.range, &new.range, |from, to| {
        PropertyChange::CardinalityChanged { from, to }
    });
    push_if_changed(&mut changes, &old.related_entity, &new.related_entity, |from, to| {
        PropertyChange::RelatedEntityChanged { from, to }
    });
    push_if_changed(&mut changes, &old.inverse_name, &new.inverse_name, |from, to| {
        PropertyChange::InverseNameChanged { from, to }
    });
    ChangeSet::from_changes(changes)
}

/// Compare two versions of any property.
///
/// Properties of different kinds report only a name and kind change.
pub fn diff_property(old: &PropertyDescriptor, new: &PropertyDescriptor) -> Option<ChangeSet> {
    match (old, new) {
        (PropertyDescriptor::Attribute(a), PropertyDescriptor::Attribute(b)) => {
            diff_attribute(a, b)
        }
        (PropertyDescriptor::Relationship(a), PropertyDescriptor::Relationship(b)) => {
            diff_relationship(a, b)
        }
        _ => {
            let mut changes = Vec::new();
            if old.name() != new.name() {
                changes.push(PropertyChange::NameChanged {
                    from: old.name().to_string(),
                    to: new.name().to_string(),
                });
            }
            if old.kind() != new.kind() {
                changes.push(PropertyChange::KindChanged {
                    from: old.kind(),
                    to: new.kind(),
                });
            }
            ChangeSet::from_changes(changes)
        }
    }
}

/// Difference between two named collections.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDiff<C> {
    /// New names with no counterpart in the old collection.
    pub added: BTreeSet<String>,
    /// Old names with no counterpart in the new collection.
    pub removed: BTreeSet<String>,
    /// Paired entries that differ, keyed by new name.
    pub modified: BTreeMap<String, C>,
    /// Paired entries whose name changed: new name -> old name.
    pub renamed: BTreeMap<String, String>,
}

impl<C> Default for CollectionDiff<C> {
    fn default() -> Self {
        Self {
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
            modified: BTreeMap::new(),
            renamed: BTreeMap::new(),
        }
    }
}

impl<C> CollectionDiff<C> {
    /// Check if there are any changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Name in the old collection of the entry now called `new_name`, if the
    /// entry existed before.
    pub fn old_name_of<'a>(&'a self, new_name: &'a str) -> Option<&'a str> {
        if self.added.contains(new_name) {
            return None;
        }
        Some(
            self.renamed
                .get(new_name)
                .map(String::as_str)
                .unwrap_or(new_name),
        )
    }
}

/// Diff two collections with rename tracking.
///
/// Entries in `new` whose rename marker names another entry are paired with
/// that old entry; remaining entries pair by name. When several new entries
/// rename from the same old entry, their differences against it (ignoring the
/// name change) must agree; the first in order continues the old entry and the
/// rest are additions. An unmarked entry reusing a name vacated by a rename is
/// an addition.
pub fn diff_collection<'a, T, C, F>(
    old: impl IntoIterator<Item = &'a T>,
    new: impl IntoIterator<Item = &'a T>,
    diff: F,
) -> Result<CollectionDiff<C>, DiffError>
where
    T: Lineage + 'a,
    C: Difference,
    F: Fn(&T, &T) -> Result<Option<C>, DiffError>,
{
    let old: Vec<&T> = old.into_iter().collect();
    let new: Vec<&T> = new.into_iter().collect();
    let old_by_name: HashMap<&str, &T> = old.iter().map(|o| (o.name(), *o)).collect();

    let mut marked: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
    let mut unmarked = Vec::new();
    for entry in &new {
        match entry.rename_from() {
            Some(from) if from != entry.name() => {
                if !old_by_name.contains_key(from) {
                    return Err(DiffError::UnknownRenameTarget {
                        old_name: from.to_string(),
                        new_name: entry.name().to_string(),
                    });
                }
                marked.entry(from).or_default().push(*entry);
            }
            _ => unmarked.push(*entry),
        }
    }

    let mut pairs: Vec<(&T, &T)> = Vec::new();
    for (old_name, candidates) in &marked {
        let base = old_by_name[old_name];
        if let Some((first, rest)) = candidates.split_first() {
            if !rest.is_empty() {
                let lineage = diff(base, *first)?.and_then(|c| c.without_rename());
                for other in rest {
                    if diff(base, *other)?.and_then(|c| c.without_rename()) != lineage {
                        return Err(DiffError::AmbiguousRename {
                            old_name: old_name.to_string(),
                            candidates: candidates.iter().map(|c| c.name().to_string()).collect(),
                        });
                    }
                }
            }
            pairs.push((base, *first));
        }
    }
    for entry in unmarked {
        if marked.contains_key(entry.name()) {
            continue;
        }
        if let Some(base) = old_by_name.get(entry.name()) {
            pairs.push((*base, entry));
        }
    }

    let mut result = CollectionDiff::default();
    let mut paired_old = HashSet::new();
    let mut paired_new = HashSet::new();
    for (before, after) in pairs {
        paired_old.insert(before.name());
        paired_new.insert(after.name());
        if before.name() != after.name() {
            result
                .renamed
                .insert(after.name().to_string(), before.name().to_string());
        }
        if let Some(change) = diff(before, after)? {
            result.modified.insert(after.name().to_string(), change);
        }
    }

    result.added = new
        .iter()
        .filter(|n| !paired_new.contains(n.name()))
        .map(|n| n.name().to_string())
        .collect();
    result.removed = old
        .iter()
        .filter(|o| !paired_old.contains(o.name()))
        .map(|o| o.name().to_string())
        .collect();

    Ok(result)
}

/// Diff two attribute lists.
pub fn diff_attributes(
    old: &[Attribute],
    new: &[Attribute],
) -> Result<CollectionDiff<ChangeSet>, DiffError> {
    diff_collection(old, new, |a, b| Ok(diff_attribute(a, b)))
}

/// Diff two relationship lists.
pub fn diff_relationships(
    old: &[Relationship],
    new: &[Relationship],
) -> Result<CollectionDiff<ChangeSet>, DiffError> {
    diff_collection(old, new, |a, b| Ok(diff_relationship(a, b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QuerySpec;

    fn attr(name: &str, ty: ScalarType) -> Attribute {
        Attribute::new(name, ty)
    }

    #[test]
    fn test_identical_attributes() {
        let a = attr("age", ScalarType::Int32);
        let b = a.clone().with_documentation("ignored");
        assert_eq!(diff_attribute(&a, &b), None);
    }

    #[test]
    fn test_attribute_changes() {
        let old = attr("age", ScalarType::Int32);
        let new = Attribute::optional("years", ScalarType::Int64);
        let changes = diff_attribute(&old, &new).unwrap();

        assert_eq!(
            changes.kinds(),
            vec![
                ChangeKind::NameChanged,
                ChangeKind::TypeChanged,
                ChangeKind::OptionalityChanged
            ]
        );
        assert!(changes.contains(ChangeKind::TypeChanged));
        assert!(!changes.contains(ChangeKind::StorageChanged));
    }

    #[test]
    fn test_relationship_changes() {
        let old = Relationship::to_one("place", "Place", "occupants");
        let new = Relationship::to_many("place", "Place", "residents")
            .with_on_delete(crate::catalog::DeleteBehavior::Cascade);
        let changes = diff_relationship(&old, &new).unwrap();

        assert_eq!(
            changes.kinds(),
            vec![ChangeKind::CardinalityChanged, ChangeKind::InverseNameChanged]
        );
    }

    #[test]
    fn test_property_kind_change() {
        let old: PropertyDescriptor = attr("owner", ScalarType::String).into();
        let new: PropertyDescriptor = Relationship::to_one("owner", "Person", "pets").into();
        let changes = diff_property(&old, &new).unwrap();
        assert_eq!(changes.kinds(), vec![ChangeKind::KindChanged]);

        let q1: PropertyDescriptor = QuerySpec::new("q", "A", "x").into();
        let q2: PropertyDescriptor = QuerySpec::new("q", "A", "y").into();
        assert_eq!(diff_property(&q1, &q2), None);
    }

    #[test]
    fn test_collection_add_remove_modify() {
        let old = vec![attr("a", ScalarType::Int32), attr("b", ScalarType::String)];
        let new = vec![attr("a", ScalarType::Float64), attr("c", ScalarType::Bool)];
        let diff = diff_attributes(&old, &new).unwrap();

        assert_eq!(diff.added, BTreeSet::from(["c".to_string()]));
        assert_eq!(diff.removed, BTreeSet::from(["b".to_string()]));
        assert_eq!(diff.modified["a"].kinds(), vec![ChangeKind::TypeChanged]);
        assert!(diff.renamed.is_empty());
        assert_eq!(diff.change_count(), 3);
    }

    #[test]
    fn test_rename_round_trip() {
        let old = vec![attr("a", ScalarType::Int32)];
        let new = vec![Attribute::optional("b", ScalarType::Int32).renamed_from("a")];
        let diff = diff_attributes(&old, &new).unwrap();

        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(
            diff.modified["b"].kinds(),
            vec![ChangeKind::NameChanged, ChangeKind::OptionalityChanged]
        );
        assert_eq!(diff.renamed["b"], "a");
        assert_eq!(diff.old_name_of("b"), Some("a"));
    }

    #[test]
    fn test_unknown_rename_target() {
        let old = vec![attr("a", ScalarType::Int32)];
        let new = vec![attr("b", ScalarType::Int32).renamed_from("z")];
        let err = diff_attributes(&old, &new).unwrap_err();

        assert_eq!(
            err,
            DiffError::UnknownRenameTarget {
                old_name: "z".into(),
                new_name: "b".into(),
            }
        );
    }

    #[test]
    fn test_marker_naming_itself_is_ignored() {
        let old = vec![attr("a", ScalarType::Int32)];
        let new = vec![attr("a", ScalarType::Int32).renamed_from("a")];
        let diff = diff_attributes(&old, &new).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_rename_and_reintroduce() {
        let old = vec![attr("a", ScalarType::Int32)];
        let new = vec![
            attr("b", ScalarType::Int32).renamed_from("a"),
            attr("a", ScalarType::String),
        ];
        let diff = diff_attributes(&old, &new).unwrap();

        assert_eq!(diff.added, BTreeSet::from(["a".to_string()]));
        assert!(diff.removed.is_empty());
        assert_eq!(diff.modified["b"].kinds(), vec![ChangeKind::NameChanged]);
    }

    #[test]
    fn test_consistent_multi_rename() {
        let old = vec![attr("a", ScalarType::Int32)];
        let new = vec![
            attr("b", ScalarType::Int64).renamed_from("a"),
            attr("c", ScalarType::Int64).renamed_from("a"),
        ];
        let diff = diff_attributes(&old, &new).unwrap();

        assert_eq!(diff.renamed["b"], "a");
        assert_eq!(diff.added, BTreeSet::from(["c".to_string()]));
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_divergent_multi_rename() {
        let old = vec![attr("a", ScalarType::Int32)];
        let new = vec![
            attr("b", ScalarType::Int64).renamed_from("a"),
            attr("c", ScalarType::String).renamed_from("a"),
        ];
        let err = diff_attributes(&old, &new).unwrap_err();

        assert_eq!(
            err,
            DiffError::AmbiguousRename {
                old_name: "a".into(),
                candidates: vec!["b".into(), "c".into()],
            }
        );
    }

    #[test]
    fn test_partition_property() {
        let old = vec![
            attr("keep", ScalarType::Int32),
            attr("change", ScalarType::Int32),
            attr("drop", ScalarType::Int32),
            attr("move", ScalarType::Int32),
        ];
        let new = vec![
            attr("keep", ScalarType::Int32),
            attr("change", ScalarType::String),
            attr("moved", ScalarType::Int32).renamed_from("move"),
            attr("fresh", ScalarType::Bool),
        ];
        let diff = diff_attributes(&old, &new).unwrap();

        let old_names: BTreeSet<String> = old.iter().map(|a| a.name.clone()).collect();
        let new_names: BTreeSet<String> = new.iter().map(|a| a.name.clone()).collect();
        let modified: BTreeSet<String> = diff.modified.keys().cloned().collect();
        let unchanged: BTreeSet<String> = old_names
            .intersection(&new_names)
            .filter(|n| !modified.contains(*n))
            .cloned()
            .collect();

        let rebuilt_new: BTreeSet<String> = diff
            .added
            .iter()
            .chain(&modified)
            .chain(&unchanged)
            .cloned()
            .collect();
        assert_eq!(rebuilt_new, new_names);

        let continued: BTreeSet<String> = new_names
            .iter()
            .filter_map(|n| diff.old_name_of(n).map(str::to_string))
            .collect();
        let rebuilt_old: BTreeSet<String> = diff.removed.union(&continued).cloned().collect();
        assert_eq!(rebuilt_old, old_names);
        assert!(diff.added.is_disjoint(&modified));
        assert!(diff.removed.is_disjoint(&continued));
    }
}
