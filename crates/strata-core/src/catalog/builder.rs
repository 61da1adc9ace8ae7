//! Schema graph construction.
//!
//! Turns an ordered list of [`EntityDeclaration`]s into a validated [`Schema`]:
//! parents are resolved into a tree, relationship inverses are wired (found on
//! the related entity or synthesized from the inverse detail), query targets
//! are resolved, and each entity's property namespace is flattened over its
//! ancestors.

use super::error::{InverseProblem, SchemaError};
use super::{
    Attribute, EntityDeclaration, EntityDescriptor, PropertyDescriptor, QuerySpec, Relationship,
    Schema,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Builder collecting entity declarations for one schema version.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    version: String,
    declarations: Vec<EntityDeclaration>,
}

/// Properties of one entity split by kind.
#[derive(Debug, Clone, Default)]
struct Parts {
    attributes: Vec<Attribute>,
    relationships: Vec<Relationship>,
    queries: Vec<QuerySpec>,
}

enum Found<'a> {
    Relationship(&'a Relationship),
    Other,
}

struct Assembly<'a> {
    declarations: &'a [EntityDeclaration],
    parts: &'a [Parts],
    children: &'a [Vec<usize>],
}

impl SchemaBuilder {
    /// Start a schema with the given version identifier.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            declarations: Vec::new(),
        }
    }

    /// Add an entity declaration.
    pub fn with_entity(mut self, declaration: EntityDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Add several entity declarations.
    pub fn with_entities(mut self, declarations: impl IntoIterator<Item = EntityDeclaration>) -> Self {
        self.declarations.extend(declarations);
        self
    }

    /// Validate the declarations and build the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let declarations = self.declarations;

        let mut index = HashMap::with_capacity(declarations.len());
        for (i, decl) in declarations.iter().enumerate() {
            if index.insert(decl.name.as_str(), i).is_some() {
                return Err(SchemaError::DuplicateEntityName {
                    entity: decl.name.clone(),
                });
            }
        }

        let mut parents = Vec::with_capacity(declarations.len());
        for decl in &declarations {
            let parent = match &decl.parent {
                Some(name) => Some(*index.get(name.as_str()).ok_or_else(|| {
                    SchemaError::UnknownParentEntity {
                        entity: decl.name.clone(),
                        parent: name.clone(),
                    }
                })?),
                None => None,
            };
            parents.push(parent);
        }
        check_acyclic(&declarations, &parents)?;

        let mut parts = declarations
            .iter()
            .map(Parts::split)
            .collect::<Result<Vec<_>, _>>()?;

        for (decl, own) in declarations.iter().zip(&parts) {
            let targets = own
                .relationships
                .iter()
                .map(|r| (&r.name, &r.related_entity))
                .chain(own.queries.iter().map(|q| (&q.name, &q.target_entity)));
            for (property, target) in targets {
                if !index.contains_key(target.as_str()) {
                    return Err(SchemaError::UnknownRelatedEntity {
                        entity: decl.name.clone(),
                        property: property.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        // Only declared relationships are wired; synthesized ones point back
        // at a relationship that has already been checked.
        let declared: Vec<(usize, usize)> = parts
            .iter()
            .enumerate()
            .flat_map(|(i, p)| (0..p.relationships.len()).map(move |r| (i, r)))
            .collect();

        for (source, r) in declared {
            let rel = parts[source].relationships[r].clone();
            let owner = &declarations[source].name;
            let target = index[rel.related_entity.as_str()];
            let problem = |reason| SchemaError::MissingOrDuplicateInverse {
                entity: owner.clone(),
                relationship: rel.name.clone(),
                inverse: rel.inverse_name.clone(),
                reason,
            };

            match lookup(&parts, &parents, target, &rel.inverse_name) {
                Some(Found::Relationship(inverse)) => {
                    if rel.inverse.is_some() {
                        return Err(problem(InverseProblem::Duplicate));
                    }
                    let points_back = inverse.inverse_name == rel.name
                        && lineage(&parents, source)
                            .any(|i| declarations[i].name == inverse.related_entity);
                    if !points_back {
                        return Err(problem(InverseProblem::Mismatched));
                    }
                }
                Some(Found::Other) => return Err(problem(InverseProblem::NotARelationship)),
                None => {
                    let synthesized = rel
                        .synthesize_inverse(owner)
                        .ok_or_else(|| problem(InverseProblem::Missing))?;
                    parts[target].relationships.push(synthesized);
                }
            }
        }

        for own in parts.iter_mut() {
            for rel in own.relationships.iter_mut() {
                rel.inverse = None;
            }
        }

        let mut children = vec![Vec::new(); declarations.len()];
        for (i, parent) in parents.iter().enumerate() {
            if let Some(p) = parent {
                children[*p].push(i);
            }
        }
        for list in children.iter_mut() {
            list.sort_by(|a, b| declarations[*a].name.cmp(&declarations[*b].name));
        }

        let assembly = Assembly {
            declarations: &declarations,
            parts: &parts,
            children: &children,
        };
        let mut entities = BTreeMap::new();
        for root in (0..declarations.len()).filter(|i| parents[*i].is_none()) {
            assembly.fold(root, &Parts::default(), &mut entities)?;
        }

        debug!(
            version = %self.version,
            entities = entities.len(),
            "built schema"
        );

        let order = declarations.iter().map(|d| d.name.clone()).collect();
        Ok(Schema {
            version: self.version,
            entities,
            order,
        })
    }
}

impl Parts {
    fn split(decl: &EntityDeclaration) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut parts = Parts::default();
        for property in &decl.properties {
            if !seen.insert(property.name()) {
                return Err(SchemaError::DuplicatePropertyName {
                    entity: decl.name.clone(),
                    property: property.name().to_string(),
                });
            }
            match property {
                PropertyDescriptor::Attribute(a) => {
                    if a.default.is_some() && a.initial_value().is_none() {
                        return Err(SchemaError::InvalidDefault {
                            entity: decl.name.clone(),
                            attribute: a.name.clone(),
                            scalar_type: a.scalar_type.to_string(),
                        });
                    }
                    parts.attributes.push(a.clone());
                }
                PropertyDescriptor::Relationship(r) => {
                    let ranges = std::iter::once((&r.name, r.range))
                        .chain(r.inverse.map(|detail| (&r.inverse_name, detail.range)));
                    for (name, range) in ranges {
                        if !range.is_satisfiable() {
                            return Err(SchemaError::InvalidRange {
                                entity: decl.name.clone(),
                                relationship: name.clone(),
                                range: range.to_string(),
                            });
                        }
                    }
                    parts.relationships.push(r.clone());
                }
                PropertyDescriptor::Query(q) => parts.queries.push(q.clone()),
            }
        }
        Ok(parts)
    }

    fn find(&self, name: &str) -> Option<Found<'_>> {
        if let Some(rel) = self.relationships.iter().find(|r| r.name == name) {
            return Some(Found::Relationship(rel));
        }
        let other = self.attributes.iter().any(|a| a.name == name)
            || self.queries.iter().any(|q| q.name == name);
        other.then_some(Found::Other)
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.relationships.iter().map(|r| r.name.as_str()))
            .chain(self.queries.iter().map(|q| q.name.as_str()))
    }

    fn extended(&self, own: &Parts) -> Parts {
        let mut out = self.clone();
        out.attributes.extend(own.attributes.iter().cloned());
        out.relationships.extend(own.relationships.iter().cloned());
        out.queries.extend(own.queries.iter().cloned());
        out
    }
}

impl Assembly<'_> {
    /// Post-order fold: the inherited namespace flows down, descriptors are
    /// emitted once every child has been assembled.
    fn fold(
        &self,
        idx: usize,
        inherited: &Parts,
        out: &mut BTreeMap<String, EntityDescriptor>,
    ) -> Result<(), SchemaError> {
        let decl = &self.declarations[idx];
        let own = &self.parts[idx];

        let taken: HashSet<&str> = inherited.names().collect();
        if let Some(name) = own.names().find(|n| taken.contains(n)) {
            return Err(SchemaError::DuplicatePropertyName {
                entity: decl.name.clone(),
                property: name.to_string(),
            });
        }

        let flattened = inherited.extended(own);
        for &child in &self.children[idx] {
            self.fold(child, &flattened, out)?;
        }

        let subentities = self.children[idx]
            .iter()
            .map(|&c| self.declarations[c].name.clone())
            .collect();
        out.insert(
            decl.name.clone(),
            EntityDescriptor {
                name: decl.name.clone(),
                is_abstract: decl.is_abstract,
                parent: decl.parent.clone(),
                subentities,
                attributes: flattened.attributes,
                relationships: flattened.relationships,
                queries: flattened.queries,
                rename_from: decl.rename_from.clone(),
            },
        );
        Ok(())
    }
}

/// `start` followed by its ancestors, nearest first. Parents must be acyclic.
fn lineage(parents: &[Option<usize>], start: usize) -> impl Iterator<Item = usize> + '_ {
    std::iter::successors(Some(start), move |&i| parents[i])
}

fn lookup<'a>(
    parts: &'a [Parts],
    parents: &[Option<usize>],
    entity: usize,
    name: &str,
) -> Option<Found<'a>> {
    lineage(parents, entity).find_map(|i| parts[i].find(name))
}

fn check_acyclic(
    declarations: &[EntityDeclaration],
    parents: &[Option<usize>],
) -> Result<(), SchemaError> {
    for (start, decl) in declarations.iter().enumerate() {
        let mut seen = HashSet::new();
        let mut current = Some(start);
        while let Some(i) = current {
            if !seen.insert(i) {
                return Err(SchemaError::InheritanceCycle {
                    entity: decl.name.clone(),
                });
            }
            current = parents[i];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CardinalityRange, DefaultValue, DeleteBehavior, ScalarType};

    fn person_place() -> SchemaBuilder {
        SchemaBuilder::new("v2")
            .with_entity(
                EntityDeclaration::new("Person")
                    .with_attribute(Attribute::new("name", ScalarType::String))
                    .with_relationship(Relationship::to_one("place", "Place", "occupants")),
            )
            .with_entity(
                EntityDeclaration::new("Place")
                    .with_attribute(Attribute::new("name", ScalarType::String))
                    .with_relationship(Relationship::to_many("occupants", "Person", "place")),
            )
    }

    #[test]
    fn test_explicit_inverses() {
        let schema = person_place().build().unwrap();

        let person = schema.get_entity("Person").unwrap();
        let place = schema.get_entity("Place").unwrap();
        assert_eq!(person.get_relationship("place").unwrap().inverse_name, "occupants");
        assert!(place.get_relationship("occupants").unwrap().is_to_many());
    }

    #[test]
    fn test_synthesized_inverse() {
        let schema = SchemaBuilder::new("v1")
            .with_entity(EntityDeclaration::new("Book").with_relationship(
                Relationship::to_one("author", "Author", "books")
                    .with_inverse(CardinalityRange::to_many(), DeleteBehavior::Cascade),
            ))
            .with_entity(EntityDeclaration::new("Author"))
            .build()
            .unwrap();

        let books = schema.get_entity("Author").unwrap().get_relationship("books").unwrap();
        assert_eq!(books.related_entity, "Book");
        assert_eq!(books.inverse_name, "author");
        assert_eq!(books.on_delete, DeleteBehavior::Cascade);
        assert!(books.inverse.is_none());

        let author = schema.get_entity("Book").unwrap().get_relationship("author").unwrap();
        assert!(author.inverse.is_none());
    }

    #[test]
    fn test_missing_inverse() {
        let err = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Book")
                    .with_relationship(Relationship::to_one("author", "Author", "books")),
            )
            .with_entity(EntityDeclaration::new("Author"))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            SchemaError::MissingOrDuplicateInverse {
                entity: "Book".into(),
                relationship: "author".into(),
                inverse: "books".into(),
                reason: InverseProblem::Missing,
            }
        );
    }

    #[test]
    fn test_duplicate_inverse() {
        let err = SchemaBuilder::new("v1")
            .with_entity(EntityDeclaration::new("Book").with_relationship(
                Relationship::to_one("author", "Author", "books")
                    .with_inverse(CardinalityRange::to_many(), DeleteBehavior::SetNull),
            ))
            .with_entity(
                EntityDeclaration::new("Author")
                    .with_relationship(Relationship::to_many("books", "Book", "author")),
            )
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            SchemaError::MissingOrDuplicateInverse {
                reason: InverseProblem::Duplicate,
                ..
            }
        ));
    }

    #[test]
    fn test_inverse_not_a_relationship() {
        let err = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Book")
                    .with_relationship(Relationship::to_one("author", "Author", "books")),
            )
            .with_entity(
                EntityDeclaration::new("Author")
                    .with_attribute(Attribute::new("books", ScalarType::Int32)),
            )
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            SchemaError::MissingOrDuplicateInverse {
                reason: InverseProblem::NotARelationship,
                ..
            }
        ));
    }

    #[test]
    fn test_mismatched_inverse() {
        let err = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Book")
                    .with_relationship(Relationship::to_one("author", "Author", "books")),
            )
            .with_entity(
                EntityDeclaration::new("Author")
                    .with_relationship(Relationship::to_many("books", "Book", "writer")),
            )
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            SchemaError::MissingOrDuplicateInverse {
                reason: InverseProblem::Mismatched,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_related_entity() {
        let err = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Book")
                    .with_relationship(Relationship::to_one("author", "Author", "books")),
            )
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            SchemaError::UnknownRelatedEntity {
                entity: "Book".into(),
                property: "author".into(),
                target: "Author".into(),
            }
        );
    }

    #[test]
    fn test_unknown_query_target() {
        let err = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Shelf").with_query(QuerySpec::new("novels", "Novel", "")),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, SchemaError::UnknownRelatedEntity { target, .. } if target == "Novel"));
    }

    #[test]
    fn test_duplicate_entity_name() {
        let err = SchemaBuilder::new("v1")
            .with_entity(EntityDeclaration::new("Book"))
            .with_entity(EntityDeclaration::new("Book"))
            .build()
            .unwrap_err();

        assert_eq!(err, SchemaError::DuplicateEntityName { entity: "Book".into() });
    }

    #[test]
    fn test_inheritance_flattening() {
        let schema = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Dog")
                    .with_parent("Animal")
                    .with_attribute(Attribute::new("breed", ScalarType::String)),
            )
            .with_entity(
                EntityDeclaration::new("Animal")
                    .with_abstract()
                    .with_attribute(Attribute::new("name", ScalarType::String)),
            )
            .with_entity(EntityDeclaration::new("Cat").with_parent("Animal"))
            .build()
            .unwrap();

        let dog = schema.get_entity("Dog").unwrap();
        let names: Vec<_> = dog.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["name", "breed"]);
        assert!(!dog.is_abstract);

        let animal = schema.get_entity("Animal").unwrap();
        assert!(animal.is_abstract);
        assert_eq!(animal.subentities, vec!["Cat".to_string(), "Dog".to_string()]);
        assert_eq!(schema.get_entity("Cat").unwrap().attributes.len(), 1);
    }

    #[test]
    fn test_child_redeclares_ancestor_property() {
        let err = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Animal")
                    .with_attribute(Attribute::new("name", ScalarType::String)),
            )
            .with_entity(
                EntityDeclaration::new("Dog")
                    .with_parent("Animal")
                    .with_attribute(Attribute::optional("name", ScalarType::String)),
            )
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            SchemaError::DuplicatePropertyName {
                entity: "Dog".into(),
                property: "name".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_property_in_declaration() {
        let err = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Book")
                    .with_attribute(Attribute::new("title", ScalarType::String))
                    .with_query(QuerySpec::new("title", "Book", "")),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, SchemaError::DuplicatePropertyName { .. }));
    }

    #[test]
    fn test_unknown_parent_and_cycle() {
        let err = SchemaBuilder::new("v1")
            .with_entity(EntityDeclaration::new("Dog").with_parent("Animal"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownParentEntity { .. }));

        let err = SchemaBuilder::new("v1")
            .with_entity(EntityDeclaration::new("A").with_parent("B"))
            .with_entity(EntityDeclaration::new("B").with_parent("A"))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::InheritanceCycle { entity: "A".into() });
    }

    #[test]
    fn test_inverse_on_ancestor() {
        let schema = SchemaBuilder::new("v1")
            .with_entity(
                EntityDeclaration::new("Vehicle")
                    .with_abstract()
                    .with_relationship(Relationship::to_one("garage", "Garage", "vehicles")),
            )
            .with_entity(EntityDeclaration::new("Car").with_parent("Vehicle"))
            .with_entity(
                EntityDeclaration::new("Garage")
                    .with_relationship(Relationship::to_many("vehicles", "Vehicle", "garage")),
            )
            .build()
            .unwrap();

        assert!(schema.get_entity("Car").unwrap().get_relationship("garage").is_some());
    }

    #[test]
    fn test_synthesized_inverse_collides_with_subentity() {
        let err = SchemaBuilder::new("v1")
            .with_entity(EntityDeclaration::new("Tag").with_relationship(
                Relationship::to_one("item", "Item", "tags")
                    .with_inverse(CardinalityRange::to_many(), DeleteBehavior::SetNull),
            ))
            .with_entity(EntityDeclaration::new("Item"))
            .with_entity(
                EntityDeclaration::new("Gadget")
                    .with_parent("Item")
                    .with_attribute(Attribute::new("tags", ScalarType::String)),
            )
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            SchemaError::DuplicatePropertyName {
                entity: "Gadget".into(),
                property: "tags".into(),
            }
        );
    }

    #[test]
    fn test_empty_range_is_rejected() {
        let err = SchemaBuilder::new("v1")
            .with_entity(EntityDeclaration::new("Book").with_relationship(
                Relationship::to_one("shelf", "Shelf", "books")
                    .with_inverse(CardinalityRange::new(2, Some(1)), DeleteBehavior::SetNull),
            ))
            .with_entity(EntityDeclaration::new("Shelf"))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            SchemaError::InvalidRange {
                entity: "Book".into(),
                relationship: "books".into(),
                range: "2..1".into(),
            }
        );
    }

    #[test]
    fn test_mismatched_default_is_rejected() {
        let err = SchemaBuilder::new("v1")
            .with_entity(EntityDeclaration::new("Book").with_attribute(
                Attribute::new("pages", ScalarType::Int32).with_default(DefaultValue::String("many".into())),
            ))
            .build()
            .unwrap_err();

        assert!(matches!(err, SchemaError::InvalidDefault { attribute, .. } if attribute == "pages"));
    }
}
