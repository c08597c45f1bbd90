use std::collections::HashMap;

use crate::{
    ast::{
        Construct, Definition, DefinitionKind, Ident, Member, MemberKind, Schema, TypeKind,
        TypeRef,
    },
    scope::{Binding, ImportTable, PropertyTable, ScopeId, Scopes},
    token::{Span, Spanned},
    types::{self, Normalized},
    util::intern::{Name, Names},
};

/// Suffix every import path must carry.
pub const IMPORT_EXTENSION: &str = ".brpc";

pub type CheckResult = Result<Analysis, (Analysis, Vec<Spanned<Error>>)>;

/// A schema annotated with its scopes and normalized types, plus the tables
/// the emitter consumes.
#[derive(Debug)]
pub struct Analysis {
    pub schema: Schema,
    pub scopes: Scopes,
    pub properties: PropertyTable,
    pub imports: ImportTable,
}

pub struct Checker<'names> {
    names: &'names Names,
    scopes: Scopes,
    properties: PropertyTable,
    imports: ImportTable,
    errors: Vec<Spanned<Error>>,
}

impl Checker<'_> {
    pub fn with_capacity(names: &Names, capacity: usize) -> Checker<'_> {
        Checker {
            names,
            scopes: Scopes::with_capacity(capacity),
            properties: PropertyTable::default(),
            imports: ImportTable::default(),
            errors: Vec::new(),
        }
    }

    /// Annotates the schema, then validates it in two passes: member lists
    /// (ordinals and names) and type references.
    pub fn check(mut self, mut schema: Schema) -> CheckResult {
        for def in &mut schema.definitions {
            self.annotate(def);
        }
        // Only once every table exists, so that forward references resolve.
        for def in &mut schema.definitions {
            self.normalize_definition(def);
        }
        for def in &mut schema.definitions {
            self.check_members(def);
        }
        for def in &schema.definitions {
            self.check_references(def);
        }

        let analysis = Analysis {
            schema,
            scopes: self.scopes,
            properties: self.properties,
            imports: self.imports,
        };
        if self.errors.is_empty() {
            Ok(analysis)
        } else {
            Err((analysis, self.errors))
        }
    }

    fn annotate(&mut self, def: &mut Definition) {
        match &def.kind {
            DefinitionKind::Property(property) => {
                if def.poisoned {
                    return;
                }
                let name = def.ident.name;
                let value = property.value.clone();
                if let Err(first) = self.properties.insert(name, value, def.ident.span) {
                    let kind = ErrorKind::Redefined { name, first };
                    self.error(def.ident.span, kind, Construct::Property);
                }
            }
            DefinitionKind::Import(import) => {
                if def.poisoned {
                    return;
                }
                if !import.path.ends_with(IMPORT_EXTENSION) {
                    self.error(import.path_span, ErrorKind::ImportPath, Construct::Import);
                }
                self.imports.push(import.path.clone(), import.path_span);
            }
            _ => self.bind(ScopeId::ROOT, Construct::Schema, def),
        }
    }

    /// Binds `def` in `scope` (unless anonymous) and opens its body scope,
    /// which holds its type parameters and nested definitions.
    fn bind(&mut self, scope: ScopeId, owner: Construct, def: &mut Definition) {
        let body = self.scopes.push(scope);
        def.scope = Some(body);

        if !def.is_anonymous() {
            let binding = Binding {
                construct: def.construct(),
                span: def.ident.span,
                scope: body,
            };
            self.insert(scope, def.ident, binding, owner);
        }

        let inside = def.construct();
        let params = match &def.kind {
            DefinitionKind::Struct(s) => s.params.as_slice(),
            DefinitionKind::Union(u) => u.params.as_slice(),
            _ => &[],
        };
        for &param in params {
            let binding = Binding {
                construct: Construct::TypeParams,
                span: param.span,
                scope: body,
            };
            self.insert(body, param, binding, inside);
        }

        if let Some(local_defs) = def.local_defs_mut() {
            for local in local_defs {
                self.bind(body, inside, local);
            }
        }
        for_each_type_ref_mut(def, |ty| self.bind_inline(body, inside, ty));
    }

    fn bind_inline(&mut self, scope: ScopeId, owner: Construct, ty: &mut TypeRef) {
        match &mut ty.kind {
            TypeKind::Inline(def) => self.bind(scope, owner, def),
            TypeKind::Named(named) => {
                for arg in named.args.iter_mut().flatten() {
                    self.bind_inline(scope, owner, arg);
                }
            }
            TypeKind::Missing => (),
        }
    }

    fn insert(&mut self, scope: ScopeId, ident: Ident, binding: Binding, owner: Construct) {
        if let Err(first) = self.scopes.insert(scope, ident.name, binding) {
            let kind = ErrorKind::Redefined {
                name: ident.name,
                first: first.span,
            };
            self.error(ident.span, kind, owner);
        }
    }

    fn normalize_definition(&mut self, def: &mut Definition) {
        let scope = def.scope.unwrap_or(ScopeId::ROOT);
        if let Some(local_defs) = def.local_defs_mut() {
            for local in local_defs {
                self.normalize_definition(local);
            }
        }
        for_each_type_ref_mut(def, |ty| self.normalize_type(scope, ty));
    }

    /// A user definition visible from the reference site takes precedence
    /// over a primitive of the same spelling.
    fn normalize_type(&mut self, scope: ScopeId, ty: &mut TypeRef) {
        match &mut ty.kind {
            TypeKind::Named(named) => {
                let name = named.ident.name;
                let normalized = if self.scopes.resolve(scope, name).is_some() {
                    Normalized::User(name)
                } else if let Some(primitive) = types::normalize(self.names.get(name)) {
                    Normalized::Primitive(primitive)
                } else {
                    Normalized::User(name)
                };
                named.normalized = Some(normalized);
                for arg in named.args.iter_mut().flatten() {
                    self.normalize_type(scope, arg);
                }
            }
            TypeKind::Inline(def) => self.normalize_definition(def),
            TypeKind::Missing => (),
        }
    }

    /// First pass: sorts every member list by ordinal and checks that it
    /// reads `1..=N` with unique names.
    fn check_members(&mut self, def: &mut Definition) {
        if def.poisoned {
            return;
        }
        let inside = def.construct();
        match &mut def.kind {
            DefinitionKind::Property(_) | DefinitionKind::Import(_) => return,
            DefinitionKind::Struct(s) => self.check_member_list(&mut s.fields, inside),
            DefinitionKind::Union(u) => self.check_member_list(&mut u.options, inside),
            DefinitionKind::Enum(e) => self.check_member_list(&mut e.cases, inside),
            DefinitionKind::Service(s) => self.check_member_list(&mut s.rpcs, inside),
        }
        if let Some(local_defs) = def.local_defs_mut() {
            for local in local_defs {
                self.check_members(local);
            }
        }
        for_each_type_ref_mut(def, |ty| self.check_members_in_type(ty));
    }

    fn check_members_in_type(&mut self, ty: &mut TypeRef) {
        match &mut ty.kind {
            TypeKind::Inline(def) => self.check_members(def),
            TypeKind::Named(named) => {
                for arg in named.args.iter_mut().flatten() {
                    self.check_members_in_type(arg);
                }
            }
            TypeKind::Missing => (),
        }
    }

    fn check_member_list<K>(&mut self, members: &mut [Member<K>], inside: Construct) {
        members.sort_by_key(|m| m.ordinal);

        // The ordinal of a poisoned member is unknown, so the sequence can't
        // be judged.
        if !members.iter().any(|m| m.poisoned) {
            let mut expected = 1;
            for m in members.iter() {
                if m.ordinal != expected {
                    let kind = if expected == 1 {
                        ErrorKind::FirstOrdinal { got: m.ordinal }
                    } else {
                        ErrorKind::Ordinal {
                            expected,
                            got: m.ordinal,
                        }
                    };
                    self.error(m.ordinal_span, kind, inside);
                    break;
                }
                expected += 1;
            }
        }

        let mut seen = HashMap::<Name, Span>::with_capacity(members.len());
        for m in members.iter().filter(|m| !m.poisoned && !m.ident.name.is_empty()) {
            if let Some(&first) = seen.get(&m.ident.name) {
                let kind = ErrorKind::Redefined {
                    name: m.ident.name,
                    first,
                };
                self.error(m.ident.span, kind, inside);
            } else {
                seen.insert(m.ident.name, m.ident.span);
            }
        }
    }

    /// Second pass: every user type reference must resolve from the scope of
    /// the definition which holds it.
    fn check_references(&mut self, def: &Definition) {
        if def.poisoned {
            return;
        }
        let scope = def.scope.unwrap_or(ScopeId::ROOT);
        let inside = def.construct();
        match &def.kind {
            DefinitionKind::Property(_) | DefinitionKind::Import(_) | DefinitionKind::Enum(_) => {
                return;
            }
            DefinitionKind::Struct(s) => self.check_member_refs(scope, &s.fields, inside),
            DefinitionKind::Union(u) => self.check_member_refs(scope, &u.options, inside),
            DefinitionKind::Service(s) => self.check_member_refs(scope, &s.rpcs, inside),
        }
        for local in def.local_defs() {
            self.check_references(local);
        }
    }

    fn check_member_refs<K: MemberKind>(
        &mut self,
        scope: ScopeId,
        members: &[Member<K>],
        inside: Construct,
    ) {
        for m in members.iter().filter(|m| !m.poisoned) {
            for ty in m.kind.type_refs() {
                self.check_type(scope, ty, inside);
            }
        }
    }

    fn check_type(&mut self, scope: ScopeId, ty: &TypeRef, inside: Construct) {
        match &ty.kind {
            TypeKind::Named(named) => {
                if let Some(Normalized::User(name)) = named.normalized {
                    if self.scopes.resolve(scope, name).is_none() {
                        self.error(named.ident.span, ErrorKind::Undefined(name), inside);
                    }
                }
                for arg in named.args.iter().flatten() {
                    self.check_type(scope, arg, inside);
                }
            }
            TypeKind::Inline(def) => self.check_references(def),
            TypeKind::Missing => (),
        }
    }

    fn error(&mut self, span: Span, kind: ErrorKind, inside: Construct) {
        self.errors.push(span.wrap(Error { kind, inside }));
    }
}

/// Calls `f` on the type of every member of `def` which has one.
fn for_each_type_ref_mut(def: &mut Definition, mut f: impl FnMut(&mut TypeRef)) {
    fn each<K: MemberKind>(members: &mut [Member<K>], f: &mut impl FnMut(&mut TypeRef)) {
        for m in members {
            m.kind.type_refs_mut().for_each(&mut *f);
        }
    }
    match &mut def.kind {
        DefinitionKind::Struct(s) => each(&mut s.fields, &mut f),
        DefinitionKind::Union(u) => each(&mut u.options, &mut f),
        DefinitionKind::Service(s) => each(&mut s.rpcs, &mut f),
        DefinitionKind::Property(_) | DefinitionKind::Import(_) | DefinitionKind::Enum(_) => (),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    /// The definition (or table) the error was found in.
    pub inside: Construct,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Redefined { name: Name, first: Span },
    Undefined(Name),
    FirstOrdinal { got: u32 },
    Ordinal { expected: u32, got: u32 },
    ImportPath,
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    use super::*;
    use crate::parser::test_utils::parse_schema;

    fn check(src: &str) -> (Names, Analysis) {
        let (names, schema) = parse_schema(src);
        let analysis = Checker::with_capacity(&names, 16)
            .check(schema)
            .expect("failed to check");
        (names, analysis)
    }

    #[test]
    fn test_tables_follow_nesting() {
        let src = "message A struct { message B struct { message C enum {} } } service S {}";
        let (names, analysis) = check(src);
        let scopes = &analysis.scopes;
        let name = |s| names.lookup(s).unwrap();

        let a = &analysis.schema.definitions[0];
        let a_scope = a.scope.unwrap();
        let b = &a.local_defs()[0];
        let b_scope = b.scope.unwrap();
        let c_scope = b.local_defs()[0].scope.unwrap();

        assert_eq!(scopes.table(a_scope).parent(), Some(ScopeId::ROOT));
        assert_eq!(scopes.table(b_scope).parent(), Some(a_scope));
        assert_eq!(scopes.table(c_scope).parent(), Some(b_scope));

        let root = scopes.table(ScopeId::ROOT);
        assert_eq!(root.len(), 2);
        assert_eq!(root.get(name("A")).unwrap().scope, a_scope);
        assert_eq!(root.get(name("S")).unwrap().construct, Construct::Service);
        assert!(root.get(name("B")).is_none());

        // C is visible from its own body, through the chain.
        assert_eq!(scopes.resolve(c_scope, name("C")).unwrap().scope, c_scope);
        assert!(scopes.resolve(ScopeId::ROOT, name("C")).is_none());
    }

    #[test]
    fn test_properties_and_imports_are_collected() {
        let src = r#"package = "demo" import "a.brpc" version = "1\t2" import "b.brpc""#;
        let (names, analysis) = check(src);

        let properties: Vec<_> = analysis
            .properties
            .iter()
            .map(|p| (names.get(p.name), &*p.value))
            .collect();
        assert_eq!(properties, [("package", "demo"), ("version", "1\t2")]);

        let imports: Vec<_> = analysis.imports.iter().map(|i| &*i.path).collect();
        assert_eq!(imports, ["a.brpc", "b.brpc"]);
    }

    #[test]
    fn test_member_lists_are_sorted() {
        let (names, analysis) = check("message E enum { @3 C; @1 A; @2 B; }");
        let DefinitionKind::Enum(e) = &analysis.schema.definitions[0].kind else {
            panic!("expected enum");
        };
        let cases: Vec<_> = e.cases.iter().map(|c| (c.ordinal, names.get(c.ident))).collect();
        assert_eq!(cases, [(1, "A"), (2, "B"), (3, "C")]);
    }

    tree_tests!(
        use checker;

        fn test_primitive_struct() {
            let schema = "message Data struct { required a @1 int9; required b @2 int65; }";
            let tree_ok = "
                struct Data (0..64)
                  field required a @1 (22..41)
                    type int9 (36..40 %: int16)
                  field required b @2 (42..62)
                    type int65 (56..61 %: BigInt)
            ";
        }

        fn test_union_sorted_with_undefined_option() {
            let schema = "message U union { @2 B; @1 A; message B struct{ required x @1 bool; } }";
            let tree_error = "
                union U (0..71)
                  option A @1 (24..29)
                    type A (27..28 %: ref A)
                  option B @2 (18..23)
                    type B (21..22 %: ref B)
                  struct B (30..69)
                    field required x @1 (48..67)
                      type bool (62..66 %: bool)
            ";
            let expected_errors = &["test.brpc:27:28: type A is not defined while inside union"];
        }

        fn test_ordinal_gap() {
            let schema = "message E enum { @1 One; @3 Two; }";
            let expected_errors = &["test.brpc:25:27: expected ordinal 2, but got 3 while inside enum"];
        }

        fn test_first_ordinal() {
            let schema = "service S { rpc @2 Get (bool) returns (bool) }";
            let expected_errors = &["test.brpc:16:18: first ordinal must be 1, but got 2 while inside service"];
        }

        fn test_duplicate_ordinal() {
            let schema = "message E enum { @1 A; @1 B; }";
            let expected_errors = &["test.brpc:23:25: expected ordinal 2, but got 1 while inside enum"];
        }

        fn test_duplicate_field_names() {
            let schema = "message S struct { required x @1 bool; required x @2 bool; }";
            let expected_errors = &["test.brpc:48:49: x is already defined at 28..29 while inside struct"];
        }

        fn test_recovery_yields_single_diagnostic() {
            let schema = "message A struct { required one @1abc int8; required two @2 int8; }";
            let expected_errors = &["test.brpc:32:37: malformed ordinal while parsing field"];
        }

        fn test_bad_escape_inserts_no_property() {
            let schema = r#"package = "a\q" package = "b""#;
            let expected_errors = &[r"test.brpc:10:15: invalid escape sequence `\q` while parsing property"];
        }

        fn test_duplicate_definitions_and_properties() {
            let schema = r#"a = "1" a = "2" message M enum {} message M enum {}"#;
            let expected_errors = &[
                "test.brpc:8:9: a is already defined at 0..1 while inside property",
                "test.brpc:42:43: M is already defined at 24..25 while inside schema",
            ];
        }

        fn test_import_extension() {
            let schema = r#"import "common.proto""#;
            let expected_errors = &["test.brpc:7:21: import path must end with .brpc while inside import"];
        }

        fn test_scoped_resolution() {
            let schema = "message A struct { required b @1 B; message B struct { required c @1 C; } } message C enum { @1 X; } message D struct { required b @1 B; }";
            let tree_error = "
                struct A (0..75)
                  field required b @1 (19..35)
                    type B (33..34 %: ref B)
                  struct B (36..73)
                    field required c @1 (55..71)
                      type C (69..70 %: ref C)
                enum C (76..100)
                  case X @1 (93..98)
                struct D (101..138)
                  field required b @1 (120..136)
                    type B (134..135 %: ref B)
            ";
            let expected_errors = &["test.brpc:134:135: type B is not defined while inside struct"];
        }

        fn test_user_definition_shadows_primitive() {
            let schema = "message int8 enum { @1 X; } message S struct { required a @1 int8; required b @2 int16; }";
            let tree_ok = "
                enum int8 (0..27)
                  case X @1 (20..25)
                struct S (28..89)
                  field required a @1 (47..66)
                    type int8 (61..65 %: ref int8)
                  field required b @2 (67..87)
                    type int16 (81..86 %: int16)
            ";
        }

        fn test_type_params_are_in_scope() {
            let schema = "message P struct (K V) { required m @1 Map(K []V Q); } message Map struct (K V) {}";
            let expected_errors = &["test.brpc:49:50: type Q is not defined while inside struct"];
        }

        fn test_inline_definitions_see_enclosing_scope() {
            let schema = "message O struct { required u @1 union { @1 Inner; @2 Outer; }; message Inner struct {} }";
            let expected_errors = &["test.brpc:54:59: type Outer is not defined while inside union"];
        }
    );
}
