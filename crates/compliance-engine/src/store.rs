//! Registered templates with their patterns compiled up front

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared_types::{Requirement, Template};
use tracing::info;

use crate::checks::CompiledCheck;
use crate::error::ComplianceError;
use crate::patterns::CompiledPattern;

#[derive(Debug, Clone)]
pub struct CompiledRequirement {
    pub requirement: Requirement,
    pub patterns: Vec<CompiledPattern>,
    pub checks: Vec<CompiledCheck>,
}

/// A template that passed validation at registration
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub template: Template,
    pub requirements: Vec<CompiledRequirement>,
}

impl CompiledTemplate {
    fn compile(template: Template) -> Result<Self, ComplianceError> {
        let id = template.id.as_str();
        if id.trim().is_empty() {
            return Err(ComplianceError::invalid(id, "template id is empty"));
        }
        if template.requirements.is_empty() {
            return Err(ComplianceError::invalid(id, "template has no requirements"));
        }

        let mut seen = HashSet::new();
        let mut requirements = Vec::with_capacity(template.requirements.len());
        for requirement in &template.requirements {
            let rid = requirement.id.as_str();
            if rid.trim().is_empty() {
                return Err(ComplianceError::invalid(id, "requirement id is empty"));
            }
            if !seen.insert(rid) {
                return Err(ComplianceError::invalid(
                    id,
                    format!("duplicate requirement id '{}'", rid),
                ));
            }
            if requirement.patterns.is_empty() {
                return Err(ComplianceError::invalid(
                    id,
                    format!("requirement '{}' has no patterns", rid),
                ));
            }
            if !(requirement.weight.is_finite() && requirement.weight > 0.0) {
                return Err(ComplianceError::invalid(
                    id,
                    format!("requirement '{}' has non-positive weight {}", rid, requirement.weight),
                ));
            }

            let patterns = requirement
                .patterns
                .iter()
                .map(|p| {
                    CompiledPattern::compile(p).map_err(|reason| ComplianceError::InvalidPattern {
                        template_id: id.to_string(),
                        requirement_id: rid.to_string(),
                        pattern: p.source().to_string(),
                        reason,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let checks = requirement
                .checks
                .iter()
                .map(|c| {
                    CompiledCheck::compile(c).map_err(|reason| {
                        ComplianceError::invalid(id, format!("requirement '{}': {}", rid, reason))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            requirements.push(CompiledRequirement {
                requirement: requirement.clone(),
                patterns,
                checks,
            });
        }

        Ok(Self { template, requirements })
    }
}

/// Listing entry for a registered template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub requirement_count: usize,
}

/// Registry of review templates.
///
/// Populated at start-up, then shared read-only behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<String, Arc<CompiledTemplate>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the embedded templates
    pub fn with_builtin() -> Result<Self, ComplianceError> {
        let mut store = Self::new();
        for template in crate::builtin::builtin_templates()? {
            store.register_template(template)?;
        }
        Ok(store)
    }

    /// Validate, compile and add a template. Ids are unique.
    pub fn register_template(&mut self, template: Template) -> Result<(), ComplianceError> {
        if self.templates.contains_key(&template.id) {
            return Err(ComplianceError::invalid(
                &template.id,
                "a template with this id is already registered",
            ));
        }
        let compiled = CompiledTemplate::compile(template)?;
        info!(
            template_id = %compiled.template.id,
            version = %compiled.template.version,
            requirements = compiled.requirements.len(),
            "Template registered"
        );
        self.templates
            .insert(compiled.template.id.clone(), Arc::new(compiled));
        Ok(())
    }

    pub fn get_template(&self, id: &str) -> Option<&Template> {
        self.templates.get(id).map(|c| &c.template)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub(crate) fn compiled(&self, id: &str) -> Result<Arc<CompiledTemplate>, ComplianceError> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| ComplianceError::TemplateNotFound {
                template_id: id.to_string(),
            })
    }

    /// Registered templates ordered by id
    pub fn list_templates(&self) -> Vec<TemplateInfo> {
        self.templates
            .values()
            .map(|c| TemplateInfo {
                id: c.template.id.clone(),
                name: c.template.name.clone(),
                version: c.template.version.clone(),
                description: c.template.description.clone(),
                requirement_count: c.requirements.len(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shared_types::{Pattern, Severity};

    fn template(id: &str) -> Template {
        Template::new(id, "Test", "1.0").with_requirement(
            Requirement::new("ce", "CE marking", Severity::High)
                .with_pattern(Pattern::literal("CE")),
        )
    }

    #[test]
    fn test_register_and_get() {
        let mut store = TemplateStore::new();
        store.register_template(template("basic")).unwrap();
        assert!(store.contains("basic"));
        assert_eq!(store.get_template("basic").unwrap().name, "Test");
        assert!(store.get_template("other").is_none());
    }

    #[test]
    fn test_list_is_sorted_by_id() {
        let mut store = TemplateStore::new();
        store.register_template(template("zeta")).unwrap();
        store.register_template(template("alpha")).unwrap();
        let ids: Vec<String> = store.list_templates().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_duplicate_template_rejected() {
        let mut store = TemplateStore::new();
        store.register_template(template("basic")).unwrap();
        let err = store.register_template(template("basic")).unwrap_err();
        assert_eq!(err.kind(), "invalid_template");
    }

    #[test]
    fn test_invalid_regex_rejected_at_registration() {
        let bad = Template::new("bad", "Bad", "1").with_requirement(
            Requirement::new("r1", "R1", Severity::Low).with_pattern(Pattern::regex("([a-z")),
        );
        let err = TemplateStore::new().register_template(bad).unwrap_err();
        match err {
            ComplianceError::InvalidPattern {
                requirement_id,
                pattern,
                ..
            } => {
                assert_eq!(requirement_id, "r1");
                assert_eq!(pattern, "([a-z");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_structural_validation() {
        let no_patterns = Template::new("t", "T", "1")
            .with_requirement(Requirement::new("r", "R", Severity::Low));
        assert!(TemplateStore::new().register_template(no_patterns).is_err());

        let zero_weight = Template::new("t", "T", "1").with_requirement(
            Requirement::new("r", "R", Severity::Low)
                .with_pattern(Pattern::literal("x"))
                .with_weight(0.0),
        );
        assert!(TemplateStore::new().register_template(zero_weight).is_err());

        let duplicate = template("t").with_requirement(
            Requirement::new("ce", "Again", Severity::Low).with_pattern(Pattern::literal("y")),
        );
        assert!(TemplateStore::new().register_template(duplicate).is_err());

        let empty = Template::new("t", "T", "1");
        assert!(TemplateStore::new().register_template(empty).is_err());
    }

    #[test]
    fn test_builtin_store() {
        let store = TemplateStore::with_builtin().unwrap();
        let info = store.list_templates();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].id, crate::builtin::EU_DOC_TEMPLATE_ID);
        assert_eq!(info[0].requirement_count, 9);
    }
}
