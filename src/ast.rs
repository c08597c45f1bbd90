// schema      ::= (property | import | message | service)* EOF
// property    ::= ID '=' STRING
// import      ::= 'import' STRING
// message     ::= 'message' ID type-body
// service     ::= 'service' ID '{' (rpc | message)* '}'
// type-body   ::= struct-body | union-body | enum-body
// struct-body ::= 'struct' type-params? '{' (field | message)* '}'
// union-body  ::= 'union' type-params? '{' (option | message)* '}'
// enum-body   ::= 'enum' '{' case* '}'
// type-params ::= '(' ID* ')'
// field       ::= ('required' | 'optional' | 'deprecated') ID ORD type-ref ';'+
// option      ::= ORD type-ref ';'+
// case        ::= ORD ID ';'+
// rpc         ::= 'rpc' ORD ID '(' type-ref ')' 'returns' '(' type-ref ')' ';'*
// type-ref    ::= ('[' INTEGER? ']')* (ID type-args? | struct-body | union-body | enum-body)
// type-args   ::= '(' type-ref* ')'

use std::fmt;

use crate::{scope::ScopeId, token::Span, types::Normalized, util::intern::Name};

#[derive(Debug, PartialEq, Default)]
pub struct Schema {
    pub definitions: Vec<Definition>,
}

#[derive(Debug, PartialEq)]
pub struct Definition {
    /// Empty for anonymous (inline) definitions.
    pub ident: Ident,
    pub span: Span,
    /// Set when the payload is partial due to a syntax error.
    pub poisoned: bool,
    /// Type table of this definition's body. Attached by the checker.
    pub scope: Option<ScopeId>,
    pub kind: DefinitionKind,
}

impl Definition {
    /// A node with no identifier yet, starting at `lo`. Parse routines build
    /// these up front so that a partial node survives a syntax error.
    pub fn new(lo: usize, kind: DefinitionKind) -> Definition {
        Definition {
            ident: Ident::empty(lo),
            span: Span::new_of_length(lo, 0),
            poisoned: false,
            scope: None,
            kind,
        }
    }

    pub fn construct(&self) -> Construct {
        match self.kind {
            DefinitionKind::Property(_) => Construct::Property,
            DefinitionKind::Import(_) => Construct::Import,
            DefinitionKind::Struct(_) => Construct::Struct,
            DefinitionKind::Union(_) => Construct::Union,
            DefinitionKind::Enum(_) => Construct::Enum,
            DefinitionKind::Service(_) => Construct::Service,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.ident.name.is_empty()
    }

    /// Nested `message` definitions of this definition's body.
    pub fn local_defs(&self) -> &[Definition] {
        match &self.kind {
            DefinitionKind::Struct(s) => &s.local_defs,
            DefinitionKind::Union(u) => &u.local_defs,
            DefinitionKind::Service(s) => &s.local_defs,
            DefinitionKind::Property(_) | DefinitionKind::Import(_) | DefinitionKind::Enum(_) => {
                &[]
            }
        }
    }

    pub fn local_defs_mut(&mut self) -> Option<&mut Vec<Definition>> {
        match &mut self.kind {
            DefinitionKind::Struct(s) => Some(&mut s.local_defs),
            DefinitionKind::Union(u) => Some(&mut u.local_defs),
            DefinitionKind::Service(s) => Some(&mut s.local_defs),
            DefinitionKind::Property(_) | DefinitionKind::Import(_) | DefinitionKind::Enum(_) => {
                None
            }
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum DefinitionKind {
    Property(Property),
    Import(Import),
    Struct(Struct),
    Union(Union),
    Enum(Enum),
    Service(Service),
}

#[derive(Debug, PartialEq, Default)]
pub struct Property {
    /// Decoded string value.
    pub value: Box<str>,
}

#[derive(Debug, PartialEq, Default)]
pub struct Import {
    pub path: Box<str>,
    pub path_span: Span,
}

#[derive(Debug, PartialEq, Default)]
pub struct Struct {
    pub params: Vec<Ident>,
    pub fields: Vec<Member<Field>>,
    pub local_defs: Vec<Definition>,
}

#[derive(Debug, PartialEq, Default)]
pub struct Union {
    pub params: Vec<Ident>,
    pub options: Vec<Member<Variant>>,
    pub local_defs: Vec<Definition>,
}

#[derive(Debug, PartialEq, Default)]
pub struct Enum {
    pub cases: Vec<Member<Case>>,
}

#[derive(Debug, PartialEq, Default)]
pub struct Service {
    pub rpcs: Vec<Member<Rpc>>,
    pub local_defs: Vec<Definition>,
}

/// A field, option, case or rpc: the children of a definition which carry an
/// ordinal.
#[derive(Debug, PartialEq)]
pub struct Member<K> {
    /// Zero if the ordinal could not be parsed.
    pub ordinal: u32,
    pub ordinal_span: Span,
    pub ident: Ident,
    pub span: Span,
    pub poisoned: bool,
    pub kind: K,
}

impl<K: Default> Member<K> {
    pub fn new(lo: usize) -> Member<K> {
        Member {
            ordinal: 0,
            ordinal_span: Span::new_of_length(lo, 0),
            ident: Ident::empty(lo),
            span: Span::new_of_length(lo, 0),
            poisoned: false,
            kind: K::default(),
        }
    }
}

/// Member payloads.
pub trait MemberKind {
    const CONSTRUCT: Construct;

    fn type_refs(&self) -> impl Iterator<Item = &TypeRef>;

    fn type_refs_mut(&mut self) -> impl Iterator<Item = &mut TypeRef>;
}

#[derive(Debug, PartialEq, Default)]
pub struct Field {
    pub modifier: Modifier,
    pub ty: TypeRef,
}

impl MemberKind for Field {
    const CONSTRUCT: Construct = Construct::Field;

    fn type_refs(&self) -> impl Iterator<Item = &TypeRef> {
        std::iter::once(&self.ty)
    }

    fn type_refs_mut(&mut self) -> impl Iterator<Item = &mut TypeRef> {
        std::iter::once(&mut self.ty)
    }
}

/// A union option. Its identifier is the one of its type (empty for inline
/// types).
#[derive(Debug, PartialEq, Default)]
pub struct Variant {
    pub ty: TypeRef,
}

impl MemberKind for Variant {
    const CONSTRUCT: Construct = Construct::Option;

    fn type_refs(&self) -> impl Iterator<Item = &TypeRef> {
        std::iter::once(&self.ty)
    }

    fn type_refs_mut(&mut self) -> impl Iterator<Item = &mut TypeRef> {
        std::iter::once(&mut self.ty)
    }
}

#[derive(Debug, PartialEq, Default)]
pub struct Case;

impl MemberKind for Case {
    const CONSTRUCT: Construct = Construct::Case;

    fn type_refs(&self) -> impl Iterator<Item = &TypeRef> {
        std::iter::empty()
    }

    fn type_refs_mut(&mut self) -> impl Iterator<Item = &mut TypeRef> {
        std::iter::empty()
    }
}

#[derive(Debug, PartialEq, Default)]
pub struct Rpc {
    pub arg: TypeRef,
    pub ret: TypeRef,
}

impl MemberKind for Rpc {
    const CONSTRUCT: Construct = Construct::Rpc;

    fn type_refs(&self) -> impl Iterator<Item = &TypeRef> {
        [&self.arg, &self.ret].into_iter()
    }

    fn type_refs_mut(&mut self) -> impl Iterator<Item = &mut TypeRef> {
        [&mut self.arg, &mut self.ret].into_iter()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    Required,
    Optional,
    Deprecated,
}

impl Modifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Modifier::Required => "required",
            Modifier::Optional => "optional",
            Modifier::Deprecated => "deprecated",
        }
    }
}

#[derive(Debug, PartialEq, Default)]
pub struct TypeRef {
    pub span: Span,
    /// Outermost dimension first: `[4][]T` is an array of 4 slices of `T`.
    pub dims: Vec<Dim>,
    pub kind: TypeKind,
}

impl TypeRef {
    /// Whether an inline definition somewhere in this type failed to parse.
    pub fn is_poisoned(&self) -> bool {
        match &self.kind {
            TypeKind::Named(named) => named.args.iter().flatten().any(TypeRef::is_poisoned),
            TypeKind::Inline(def) => def.poisoned,
            TypeKind::Missing => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dim {
    Sized(u32),
    Unsized,
}

#[derive(Debug, PartialEq, Default)]
pub enum TypeKind {
    Named(NamedType),
    /// An anonymous `struct`, `union` or `enum` body.
    Inline(Box<Definition>),
    /// The type could not be parsed.
    #[default]
    Missing,
}

#[derive(Debug, PartialEq)]
pub struct NamedType {
    pub ident: Ident,
    /// `None` when no argument list was written; `T()` is `Some(vec![])`.
    pub args: Option<Vec<TypeRef>>,
    /// Set by the checker.
    pub normalized: Option<Normalized>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Name,
    pub span: Span,
}

impl Ident {
    pub fn empty(lo: usize) -> Ident {
        Ident {
            name: Name::EMPTY,
            span: Span::new_of_length(lo, 0),
        }
    }
}

impl From<Ident> for Name {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Name {
    fn from(value: &Ident) -> Self {
        value.name
    }
}

/// The grammar production (or enclosing definition) a diagnostic refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Construct {
    Schema,
    Property,
    Import,
    Message,
    Struct,
    Union,
    Enum,
    Service,
    Field,
    Option,
    Case,
    Rpc,
    TypeRef,
    TypeParams,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Construct::Schema => "schema",
            Construct::Property => "property",
            Construct::Import => "import",
            Construct::Message => "message",
            Construct::Struct => "struct",
            Construct::Union => "union",
            Construct::Enum => "enum",
            Construct::Service => "service",
            Construct::Field => "field",
            Construct::Option => "option",
            Construct::Case => "case",
            Construct::Rpc => "rpc",
            Construct::TypeRef => "type",
            Construct::TypeParams => "type parameters",
        })
    }
}
