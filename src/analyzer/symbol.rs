//! Scoped symbol table for semantic analysis.

use crate::data::types::ExprType;
use std::collections::HashMap;

/// Symbol kind. A field and a function may share a literal name; keying by
/// namespace keeps them from colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    IndexName,
    FieldName,
    FunctionName,
}

/// Per-query environment mapping (namespace, name) to a type. Scopes chain
/// through `parent`; resolution walks outward.
#[derive(Debug, Clone, Default)]
pub struct TypeEnvironment {
    symbols: HashMap<(Namespace, String), ExprType>,
    parent: Option<Box<TypeEnvironment>>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// New inner scope shadowing this one.
    pub fn extend(self) -> Self {
        Self {
            symbols: HashMap::new(),
            parent: Some(Box::new(self)),
        }
    }

    pub fn define(&mut self, namespace: Namespace, name: impl Into<String>, t: ExprType) {
        self.symbols.insert((namespace, name.into()), t);
    }

    pub fn resolve(&self, namespace: Namespace, name: &str) -> Option<ExprType> {
        match self.symbols.get(&(namespace, name.to_string())) {
            Some(t) => Some(*t),
            None => self.parent.as_ref().and_then(|p| p.resolve(namespace, name)),
        }
    }

    /// All field names visible in this scope chain, innermost first.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .symbols
            .keys()
            .filter(|(ns, _)| *ns == Namespace::FieldName)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        if let Some(parent) = &self.parent {
            for name in parent.field_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}
