//! The template registry.
//!
//! Templates and the parent→child connections between them are declared
//! incrementally through [`Task::add`](crate::Task::add) and stored here,
//! owned by the engine that will compile them. Connections may reference
//! template names that have not been registered yet; such forward references
//! are resolved (and validated) when the connections are materialized at
//! compile time.

use indexmap::IndexMap;

use crate::error::{CompileError, RegistryError};
use crate::template::{OptionTemplate, TemplateName, TemplateSpec};
use crate::value::ArcStr;

#[derive(Debug)]
pub(crate) struct TemplateRegistry {
    templates: IndexMap<TemplateName, OptionTemplate>,
    connections: Vec<(TemplateName, ArcStr)>,
}

impl TemplateRegistry {
    pub(crate) fn new() -> Self {
        let mut templates = IndexMap::new();
        templates.insert(TemplateName::Root, OptionTemplate::root());

        TemplateRegistry {
            templates,
            connections: Vec::new(),
        }
    }

    /// Registers a template and its connection edges.
    ///
    /// `spec` may be `None` only to accumulate additional parents for a name
    /// whose parameters were (or will be) set by another call; re-specifying
    /// parameters for an existing name is an error. An empty `parents` slice
    /// defaults to the implicit root.
    pub(crate) fn add(
        &mut self,
        name: ArcStr,
        parents: &[&str],
        spec: Option<TemplateSpec>,
    ) -> Result<(), RegistryError> {
        let template_name = TemplateName::Named(name.clone());

        if let Some(spec) = spec {
            if self.templates.contains_key(&template_name) {
                return Err(RegistryError::DuplicateParameters { name });
            }
            self.templates.insert(template_name, OptionTemplate::new(spec));
        }

        if parents.is_empty() {
            self.connections.push((TemplateName::Root, name));
        } else {
            for parent in parents {
                self.connections
                    .push((TemplateName::named(*parent), name.clone()));
            }
        }

        Ok(())
    }

    /// Copies every connection edge into its parent template's declared
    /// children. Validates both endpoints, and is idempotent so a failed
    /// compile can be retried after the offending template is registered.
    pub(crate) fn materialize_connections(&mut self) -> Result<(), CompileError> {
        for (parent, child) in &self.connections {
            let child_name = TemplateName::Named(child.clone());
            if !self.templates.contains_key(&child_name) {
                return Err(CompileError::UndefinedTemplate {
                    name: child.clone(),
                });
            }

            let template =
                self.templates
                    .get_mut(parent)
                    .ok_or_else(|| CompileError::UndefinedTemplate {
                        name: match parent {
                            TemplateName::Named(name) => name.clone(),
                            TemplateName::Root => ArcStr::from("ROOT"),
                        },
                    })?;
            template.connect(child);
        }

        Ok(())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&TemplateName, &OptionTemplate)> {
        self.templates.iter()
    }

    /// The implicit root template, present since construction.
    pub(crate) fn root(&self) -> &OptionTemplate {
        &self.templates[&TemplateName::Root]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::template::OptionHandle;

    fn leaf() -> TemplateSpec {
        TemplateSpec::leaf(["object"], |_| Ok(Arc::new(()) as OptionHandle))
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let mut registry = TemplateRegistry::new();
        registry.add(ArcStr::from("x"), &[], Some(leaf())).unwrap();

        let err = registry
            .add(ArcStr::from("x"), &[], Some(leaf()))
            .unwrap_err();

        assert!(matches!(err, RegistryError::DuplicateParameters { .. }));
    }

    #[test]
    fn repeated_add_accumulates_parents() {
        let mut registry = TemplateRegistry::new();
        registry.add(ArcStr::from("a"), &[], Some(leaf())).unwrap();
        registry.add(ArcStr::from("b"), &[], Some(leaf())).unwrap();
        registry
            .add(ArcStr::from("x"), &["a"], Some(leaf()))
            .unwrap();
        registry.add(ArcStr::from("x"), &["b"], None).unwrap();

        registry.materialize_connections().unwrap();

        let children: Vec<_> = registry
            .iter()
            .filter(|(_, template)| template.children().contains(&ArcStr::from("x")))
            .map(|(name, _)| name.clone())
            .collect();
        assert_eq!(
            children,
            vec![TemplateName::named("a"), TemplateName::named("b")]
        );
    }

    #[test]
    fn unregistered_child_fails_materialization() {
        let mut registry = TemplateRegistry::new();
        registry.add(ArcStr::from("ghost"), &[], None).unwrap();

        let err = registry.materialize_connections().unwrap_err();

        assert!(matches!(
            err,
            CompileError::UndefinedTemplate { name } if name.as_ref() == "ghost"
        ));
    }

    #[test]
    fn unregistered_parent_fails_materialization() {
        let mut registry = TemplateRegistry::new();
        registry
            .add(ArcStr::from("x"), &["ghost"], Some(leaf()))
            .unwrap();

        let err = registry.materialize_connections().unwrap_err();

        assert!(matches!(err, CompileError::UndefinedTemplate { .. }));
    }

    #[test]
    fn materialization_is_idempotent() {
        let mut registry = TemplateRegistry::new();
        registry.add(ArcStr::from("x"), &[], Some(leaf())).unwrap();

        registry.materialize_connections().unwrap();
        registry.materialize_connections().unwrap();

        let (_, root) = registry.iter().next().unwrap();
        assert_eq!(root.children().len(), 1);
    }
}
