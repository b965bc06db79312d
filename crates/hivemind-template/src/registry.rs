//! The template registry: meta-schema validation, activation, lookups.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use crate::schema::CompiledSchema;
use crate::types::{FolderMappingRule, RelationshipTypeDef, Template};
use crate::{EntityTypeDef, TemplateError};

lazy_static! {
    static ref TEMPLATE_ID_RE: Regex = Regex::new(r"^[a-z0-9-]+$").expect("static regex");
    static ref VERSION_RE: Regex = Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex");
    static ref TYPE_NAME_RE: Regex = Regex::new(r"^[a-z_]+$").expect("static regex");
}

/// Where a registered template came from; carried for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Builtin,
    Inline,
    File(PathBuf),
}

struct ActiveTemplate {
    template: Arc<Template>,
    entity_types: HashMap<String, usize>,
    relationship_types: HashMap<String, usize>,
    schemas: HashMap<String, Arc<CompiledSchema>>,
}

/// Holds every registered template and the single active one.
///
/// Registration is all-or-nothing: a template that fails any meta-schema
/// rule leaves the registry untouched. Lookups go through maps built at
/// activation, so the hot paths are O(1).
#[derive(Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, (Arc<Template>, TemplateSource)>,
    active: Option<ActiveTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a template. Fails without mutating state on
    /// duplicate ids, duplicate entity-type names, or any meta-schema
    /// violation.
    pub fn register(
        &mut self,
        template: Template,
        source: TemplateSource,
    ) -> Result<(), TemplateError> {
        if self.templates.contains_key(&template.id) {
            return Err(TemplateError::DuplicateTemplate(template.id));
        }
        check_duplicates(&template)?;
        check_meta_schema(&template)?;

        info!(template = %template.id, version = %template.version, "registered template");
        self.templates
            .insert(template.id.clone(), (Arc::new(template), source));
        Ok(())
    }

    /// Replace a registered template wholesale (standalone template files
    /// override inline definitions with the same id). Same validation as
    /// [`register`](Self::register), minus the duplicate-id check.
    pub fn register_override(
        &mut self,
        template: Template,
        source: TemplateSource,
    ) -> Result<(), TemplateError> {
        check_duplicates(&template)?;
        check_meta_schema(&template)?;
        info!(template = %template.id, "registered template (override)");
        self.templates
            .insert(template.id.clone(), (Arc::new(template), source));
        Ok(())
    }

    /// Make a registered template the active one and compile its
    /// per-entity schemas.
    pub fn activate(&mut self, template_id: &str) -> Result<(), TemplateError> {
        let (template, _) = self
            .templates
            .get(template_id)
            .ok_or_else(|| TemplateError::UnknownTemplate(template_id.to_string()))?;
        let template = Arc::clone(template);

        let entity_types = template
            .entity_types
            .iter()
            .enumerate()
            .map(|(i, et)| (et.name.clone(), i))
            .collect();
        let relationship_types = template
            .relationship_types
            .iter()
            .enumerate()
            .map(|(i, rt)| (rt.id.clone(), i))
            .collect();
        let schemas = template
            .entity_types
            .iter()
            .map(|et| (et.name.clone(), Arc::new(CompiledSchema::compile(et))))
            .collect();

        info!(template = %template.id, "activated template");
        self.active = Some(ActiveTemplate {
            template,
            entity_types,
            relationship_types,
            schemas,
        });
        Ok(())
    }

    pub fn is_registered(&self, template_id: &str) -> bool {
        self.templates.contains_key(template_id)
    }

    /// The active template, if any.
    pub fn active_template(&self) -> Option<&Template> {
        self.active.as_ref().map(|a| a.template.as_ref())
    }

    fn active(&self) -> Result<&ActiveTemplate, TemplateError> {
        self.active.as_ref().ok_or(TemplateError::NoActiveTemplate)
    }

    pub fn get_entity_type(&self, name: &str) -> Result<&EntityTypeDef, TemplateError> {
        let active = self.active()?;
        active
            .entity_types
            .get(name)
            .map(|&i| &active.template.entity_types[i])
            .ok_or_else(|| TemplateError::UnknownEntityType(name.to_string()))
    }

    pub fn entity_types(&self) -> Result<&[EntityTypeDef], TemplateError> {
        Ok(&self.active()?.template.entity_types)
    }

    pub fn has_entity_type(&self, name: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.entity_types.contains_key(name))
    }

    pub fn get_relationship_type(&self, id: &str) -> Result<&RelationshipTypeDef, TemplateError> {
        let active = self.active()?;
        active
            .relationship_types
            .get(id)
            .map(|&i| &active.template.relationship_types[i])
            .ok_or_else(|| TemplateError::UnknownRelationship(id.to_string()))
    }

    pub fn relationship_types(&self) -> Result<&[RelationshipTypeDef], TemplateError> {
        Ok(&self.active()?.template.relationship_types)
    }

    pub fn folder_mappings(&self) -> Result<&[FolderMappingRule], TemplateError> {
        Ok(&self.active()?.template.folder_mappings)
    }

    /// Relationship types whose allow-sets admit the given endpoint
    /// types, in declaration order.
    pub fn valid_relationships(
        &self,
        source_type: &str,
        target_type: &str,
    ) -> Result<Vec<&RelationshipTypeDef>, TemplateError> {
        Ok(self
            .active()?
            .template
            .relationship_types
            .iter()
            .filter(|rt| rt.source_types.allows(source_type) && rt.target_types.allows(target_type))
            .collect())
    }

    /// The compiled validator for an entity type.
    pub fn schema_for(&self, entity_type: &str) -> Result<Arc<CompiledSchema>, TemplateError> {
        let active = self.active()?;
        active
            .schemas
            .get(entity_type)
            .cloned()
            .ok_or_else(|| TemplateError::UnknownEntityType(entity_type.to_string()))
    }
}

fn check_duplicates(template: &Template) -> Result<(), TemplateError> {
    let mut seen = std::collections::HashSet::new();
    for et in &template.entity_types {
        if !seen.insert(et.name.as_str()) {
            return Err(TemplateError::DuplicateEntityType {
                template: template.id.clone(),
                name: et.name.clone(),
            });
        }
    }
    let mut seen = std::collections::HashSet::new();
    for rt in &template.relationship_types {
        if !seen.insert(rt.id.as_str()) {
            return Err(TemplateError::DuplicateRelationship {
                template: template.id.clone(),
                id: rt.id.clone(),
            });
        }
    }
    Ok(())
}

fn check_meta_schema(template: &Template) -> Result<(), TemplateError> {
    let mut problems = Vec::new();

    if !TEMPLATE_ID_RE.is_match(&template.id) {
        problems.push(format!(
            "id: '{}' must be lowercase alphanumeric plus hyphens",
            template.id
        ));
    }
    if !VERSION_RE.is_match(&template.version) {
        problems.push(format!(
            "version: '{}' must be three dot-separated integers",
            template.version
        ));
    }

    for (i, et) in template.entity_types.iter().enumerate() {
        if !TYPE_NAME_RE.is_match(&et.name) {
            problems.push(format!(
                "entityTypes[{i}].name: '{}' must be lowercase plus underscores",
                et.name
            ));
        }
        for (j, field) in et.fields.iter().enumerate() {
            if field.kind == crate::FieldKind::Enum && field.values.is_empty() {
                problems.push(format!(
                    "entityTypes[{i}].fields[{j}].values: enum field '{}' lists no values",
                    field.name
                ));
            }
        }
    }

    for (i, rt) in template.relationship_types.iter().enumerate() {
        if !TYPE_NAME_RE.is_match(&rt.id) {
            problems.push(format!(
                "relationshipTypes[{i}].id: '{}' must be lowercase plus underscores",
                rt.id
            ));
        }
        if rt.bidirectional {
            match &rt.reverse_id {
                None => problems.push(format!(
                    "relationshipTypes[{i}].reverseId: bidirectional '{}' names no reverse",
                    rt.id
                )),
                Some(reverse) => {
                    if template.relationship_type(reverse).is_none() {
                        problems.push(format!(
                            "relationshipTypes[{i}].reverseId: reverse '{reverse}' is not a declared relationship type"
                        ));
                    }
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(TemplateError::TemplateInvalid {
            template: template.id.clone(),
            problems,
        })
    }
}
