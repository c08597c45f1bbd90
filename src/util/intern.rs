use std::{collections::HashMap, fmt, num::NonZeroU32, rc::Rc};

/// A handle to an interned identifier. To retrieve the `&str`, use
/// [`Names::get`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    // Here we use a NonZeroU32 to leverage niche layout optimization.
    handle: NonZeroU32,
}

impl Name {
    /// The empty identifier, used by anonymous definitions and by nodes whose
    /// identifier could not be parsed. Always registered by [`Names::new`].
    pub const EMPTY: Name = Name::unchecked_new(1);

    const fn unchecked_new(handle: u32) -> Name {
        match NonZeroU32::new(handle) {
            Some(handle) => Name { handle },
            None => panic!("name handle must be non-zero"),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Name::EMPTY
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.handle)
    }
}

/// Identifier interner shared by every stage of one compilation.
pub struct Names {
    map: HashMap<Rc<str>, Name>,
    vec: Vec<Rc<str>>,
}

impl fmt::Debug for Names {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, interned) in self.vec.iter().enumerate() {
            map.entry(&(i + 1), &interned);
        }
        map.finish()
    }
}

impl Default for Names {
    fn default() -> Self {
        Names::with_capacity(64)
    }
}

impl Names {
    pub fn new() -> Self {
        Names::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut names = Names {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        };
        let empty = names.intern("");
        assert_eq!(empty, Name::EMPTY);
        names
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    /// Always false, since the empty name is pre-registered.
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Interns the provided identifier, returning a handle which can be used
    /// to retrieve it later.
    pub fn intern(&mut self, value: &str) -> Name {
        if let Some(name) = self.map.get(value) {
            return *name;
        }
        let key: Rc<str> = Rc::from(value);
        let len = u32::try_from(self.vec.len()).expect("interned out of capacity");
        let name = Name::unchecked_new(len + 1);
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, name);
        name
    }

    /// Returns the handle of an already interned identifier.
    pub fn lookup(&self, value: &str) -> Option<Name> {
        self.map.get(value).copied()
    }

    /// Returns the corresponding identifier for the provided handle.
    /// Panics if not found.
    pub fn get(&self, name: impl Into<Name>) -> &str {
        let name: Name = name.into();
        let index = name.handle.get() - 1;
        &self.vec[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        let mut names = Names::with_capacity(3);

        let data1 = names.intern("Data");
        let field1 = names.intern("field");
        let data2 = names.intern("Data");

        assert_eq!(data1, data2);
        assert_ne!(data1, field1);
        assert_eq!(names.get(data1), "Data");
        assert_eq!(names.get(field1), "field");
        assert_eq!(names.lookup("field"), Some(field1));
        assert_eq!(names.lookup("missing"), None);
    }

    #[test]
    fn empty_name_is_preregistered() {
        let mut names = Names::new();
        assert_eq!(names.len(), 1);
        assert_eq!(names.intern(""), Name::EMPTY);
        assert_eq!(names.get(Name::EMPTY), "");
        assert!(Name::EMPTY.is_empty());
    }
}
