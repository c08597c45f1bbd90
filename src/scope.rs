use std::collections::HashMap;

use crate::{ast::Construct, token::Span, util::intern::Name};

/// Stable index of a [`TypeTable`] inside [`Scopes`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

/// What a scope entry refers to. Tables hold these descriptors instead of
/// pointers into the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub construct: Construct,
    /// Span of the definition's identifier.
    pub span: Span,
    /// Body scope of the bound definition.
    pub scope: ScopeId,
}

/// Identifier to definition map of one lexical scope.
#[derive(Debug)]
pub struct TypeTable {
    parent: Option<ScopeId>,
    entries: HashMap<Name, Binding>,
}

impl TypeTable {
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn get(&self, name: Name) -> Option<&Binding> {
        self.entries.get(&name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Arena of every type table of a schema. Children link to their parent,
/// never the reverse.
#[derive(Debug)]
pub struct Scopes {
    tables: Vec<TypeTable>,
}

impl Default for Scopes {
    fn default() -> Self {
        Scopes::with_capacity(16)
    }
}

impl Scopes {
    /// Creates the arena with its (empty) root table.
    pub fn with_capacity(capacity: usize) -> Scopes {
        let mut tables = Vec::with_capacity(capacity.max(1));
        tables.push(TypeTable {
            parent: None,
            entries: HashMap::new(),
        });
        Scopes { tables }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Always false, since the root table exists from the start.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, scope: ScopeId) -> &TypeTable {
        &self.tables[scope.0 as usize]
    }

    /// Opens a fresh, empty scope nested in `parent`.
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        let id = u32::try_from(self.tables.len()).expect("scopes out of capacity");
        self.tables.push(TypeTable {
            parent: Some(parent),
            entries: HashMap::new(),
        });
        ScopeId(id)
    }

    /// Binds `name` in `scope`.
    ///
    /// On collision the first binding is kept and returned as the error.
    pub fn insert(&mut self, scope: ScopeId, name: Name, binding: Binding) -> Result<(), Binding> {
        use std::collections::hash_map::Entry;

        match self.tables[scope.0 as usize].entries.entry(name) {
            Entry::Occupied(entry) => Err(*entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(binding);
                Ok(())
            }
        }
    }

    /// Looks `name` up in `scope` and then through its ancestors, returning
    /// the innermost binding.
    pub fn resolve(&self, scope: ScopeId, name: Name) -> Option<&Binding> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            let table = self.table(scope);
            if let Some(binding) = table.get(name) {
                return Some(binding);
            }
            current = table.parent;
        }
        None
    }
}

#[derive(Debug, PartialEq)]
pub struct PropertyEntry {
    pub name: Name,
    pub value: Box<str>,
    pub span: Span,
}

/// Flat, top-level `name = "value"` table. Keeps source order.
#[derive(Debug, Default)]
pub struct PropertyTable {
    entries: Vec<PropertyEntry>,
    index: HashMap<Name, usize>,
}

impl PropertyTable {
    /// Records a property. On collision the first entry is kept and its span
    /// is returned as the error.
    pub fn insert(&mut self, name: Name, value: Box<str>, span: Span) -> Result<(), Span> {
        if let Some(&i) = self.index.get(&name) {
            return Err(self.entries[i].span);
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(PropertyEntry { name, value, span });
        Ok(())
    }

    pub fn get(&self, name: Name) -> Option<&str> {
        let &i = self.index.get(&name)?;
        Some(&self.entries[i].value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, PartialEq)]
pub struct ImportEntry {
    pub path: Box<str>,
    pub span: Span,
}

/// Imported schema paths, in source order.
#[derive(Debug, Default)]
pub struct ImportTable {
    entries: Vec<ImportEntry>,
}

impl ImportTable {
    pub fn push(&mut self, path: Box<str>, span: Span) {
        self.entries.push(ImportEntry { path, span });
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
