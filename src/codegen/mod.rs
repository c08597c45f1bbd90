use std::{
    collections::HashMap,
    fmt::{self, Write},
    format_args as f,
    path::Path,
};

use check_keyword::CheckKeyword;
use heck::{ToPascalCase, ToShoutySnakeCase, ToSnakeCase};

use crate::{
    ast::{
        Construct, Definition, DefinitionKind, Dim, Ident, Member, Modifier, TypeKind, TypeRef,
        Variant,
    },
    checker::Analysis,
    scope::{ScopeId, Scopes},
    types::{Normalized, Primitive},
    util::intern::{Name, Names},
};

#[cfg(test)]
mod tests;

const DEFAULT_CODE_CAPACITY: usize = 8 * 1024; // 8 KiB

/// Emits a Rust module for a checked schema.
///
/// Must only be called on an analysis without diagnostics; poisoned
/// definitions are skipped regardless.
pub fn generate(analysis: &Analysis, names: &Names, package: &str) -> String {
    CodeGen::new(names, &analysis.scopes).gen(analysis, package)
}

struct CodeGen<'a> {
    names: &'a Names,
    scopes: &'a Scopes,
    code: String,
    /// Rust name of every definition, keyed by its body scope.
    paths: HashMap<ScopeId, String>,
    /// Type parameters of enclosing definitions which a definition uses,
    /// directly or through the types it refers to. Keyed by body scope.
    inherited: HashMap<ScopeId, Vec<Name>>,
}

/// How a definition uses what its enclosing definitions declare.
struct Usage {
    scope: ScopeId,
    /// Visible parameters of enclosing definitions, outermost first.
    candidates: Vec<Name>,
    /// Inherited parameters named by the definition's own members.
    direct: Vec<Name>,
    /// Body scopes of the definitions its members refer to.
    refs: Vec<ScopeId>,
}

impl<'a> CodeGen<'a> {
    fn new(names: &'a Names, scopes: &'a Scopes) -> CodeGen<'a> {
        CodeGen {
            names,
            scopes,
            code: String::with_capacity(DEFAULT_CODE_CAPACITY),
            paths: HashMap::with_capacity(scopes.len()),
            inherited: HashMap::new(),
        }
    }

    fn gen(mut self, analysis: &Analysis, package: &str) -> String {
        self.emit(f!("// Generated from package `{package}`. Do not edit.\n"));

        if !analysis.properties.is_empty() {
            self.emit(f!("\n"));
        }
        for property in analysis.properties.iter() {
            let name = self.names.get(property.name).to_shouty_snake_case();
            self.emit(f!("pub const {name}: &str = {:?};\n", property.value));
        }

        if !analysis.imports.is_empty() {
            self.emit(f!("\n"));
        }
        for import in analysis.imports.iter() {
            let stem = Path::new(&*import.path)
                .file_stem()
                .map_or_else(|| import.path.to_string(), |s| s.to_string_lossy().into_owned());
            let module = safe(stem.to_snake_case());
            self.emit(f!("pub use super::{module}::*;\n"));
        }

        let defs = definitions(&analysis.schema.definitions);
        for def in defs.clone() {
            let path = self.claim(self.names.get(def.ident).to_pascal_case());
            self.assign_paths(def, path);
        }
        self.infer_inherited(defs.clone());
        for def in defs {
            self.gen_definition(def);
        }

        self.code
    }

    /// Names `def` and, recursively, everything defined inside it.
    fn assign_paths(&mut self, def: &Definition, path: String) {
        for local in definitions(def.local_defs()) {
            let name = self.names.get(local.ident).to_pascal_case();
            let local_path = self.claim(format!("{path}{name}"));
            self.assign_paths(local, local_path);
        }
        for (label, ty) in self.member_types(def) {
            for (suffix, inline) in inline_definitions(ty) {
                let inline_path = self.claim(format!("{path}{label}{suffix}"));
                self.assign_paths(inline, inline_path);
            }
        }
        if let Some(scope) = def.scope {
            self.paths.insert(scope, path);
        }
    }

    /// Returns `path`, or the first free `path{n}` if some other definition
    /// already took it.
    fn claim(&self, path: String) -> String {
        let path = safe(path);
        let taken = |candidate: &String| self.paths.values().any(|p| p == candidate);
        if !taken(&path) {
            return path;
        }
        (2..)
            .map(|n| format!("{path}{n}"))
            .find(|candidate| !taken(candidate))
            .expect("some suffix is free")
    }

    /// Flattened definitions can't see the type parameters of the definitions
    /// they were nested in, so the ones they need are added to their own.
    fn infer_inherited<'d>(&mut self, defs: impl Iterator<Item = &'d Definition>) {
        let mut usages = Vec::new();
        for def in defs {
            self.collect_usage(def, &[], &mut usages);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for usage in &usages {
                let mut needed = self.inherited.get(&usage.scope).cloned().unwrap_or_default();
                let before = needed.len();
                let referenced = usage
                    .refs
                    .iter()
                    .filter_map(|scope| self.inherited.get(scope))
                    .flatten();
                for &name in usage.direct.iter().chain(referenced) {
                    if usage.candidates.contains(&name) && !needed.contains(&name) {
                        needed.push(name);
                    }
                }
                if needed.len() != before {
                    changed = true;
                    self.inherited.insert(usage.scope, needed);
                }
            }
        }

        for usage in &usages {
            if let Some(needed) = self.inherited.get_mut(&usage.scope) {
                needed.sort_by_key(|name| usage.candidates.iter().position(|c| c == name));
            }
        }
    }

    fn collect_usage(&self, def: &Definition, enclosing: &[Name], usages: &mut Vec<Usage>) {
        let scope = self.scope(def);
        let own: Vec<Name> = type_params(def).iter().map(|p| p.name).collect();
        let candidates: Vec<Name> = enclosing
            .iter()
            .filter(|name| !own.contains(name))
            .copied()
            .collect();

        let mut usage = Usage {
            scope,
            candidates,
            direct: Vec::new(),
            refs: Vec::new(),
        };
        let member_types = self.member_types(def);
        for (_, ty) in &member_types {
            self.collect_type_usage(scope, ty, &mut usage);
        }

        let mut visible = usage.candidates.clone();
        visible.extend(own);
        usages.push(usage);

        for local in definitions(def.local_defs()) {
            self.collect_usage(local, &visible, usages);
        }
        for (_, ty) in member_types {
            for (_, inline) in inline_definitions(ty) {
                self.collect_usage(inline, &visible, usages);
            }
        }
    }

    fn collect_type_usage(&self, scope: ScopeId, ty: &TypeRef, usage: &mut Usage) {
        match &ty.kind {
            TypeKind::Named(named) => {
                if let Some(Normalized::User(name)) = named.normalized {
                    match self.scopes.resolve(scope, name) {
                        Some(binding) if binding.construct == Construct::TypeParams => {
                            if binding.scope != scope {
                                usage.direct.push(name);
                            }
                        }
                        Some(binding) => usage.refs.push(binding.scope),
                        None => (),
                    }
                }
                for arg in named.args.iter().flatten() {
                    self.collect_type_usage(scope, arg, usage);
                }
            }
            TypeKind::Inline(def) => usage.refs.extend(def.scope),
            TypeKind::Missing => (),
        }
    }

    fn gen_definition(&mut self, def: &Definition) {
        match &def.kind {
            DefinitionKind::Struct(_) => self.gen_struct(def),
            DefinitionKind::Union(_) => self.gen_union(def),
            DefinitionKind::Enum(_) => self.gen_enum(def),
            DefinitionKind::Service(_) => self.gen_service(def),
            DefinitionKind::Property(_) | DefinitionKind::Import(_) => return,
        }
        for (_, ty) in self.member_types(def) {
            for (_, inline) in inline_definitions(ty) {
                self.gen_definition(inline);
            }
        }
        for local in definitions(def.local_defs()) {
            self.gen_definition(local);
        }
    }

    fn gen_struct(&mut self, def: &Definition) {
        let DefinitionKind::Struct(s) = &def.kind else {
            unreachable!()
        };
        let name = self.path(def);
        let generics = self.generics(def);
        let scope = self.scope(def);
        let fields = complete(&s.fields);
        let idents = self.member_names(&fields, |name| name.to_snake_case(), "_");

        self.emit(f!("\n#[derive(Clone, Debug, PartialEq)]\n"));
        self.emit(f!("pub struct {name}{generics} {{\n"));
        for (field, ident) in fields.into_iter().zip(idents.into_iter().map(safe)) {
            let ty = self.rust_type(scope, &field.kind.ty);
            match field.kind.modifier {
                Modifier::Required => self.emit(f!("    pub {ident}: {ty},\n")),
                Modifier::Optional => self.emit(f!("    pub {ident}: Option<{ty}>,\n")),
                Modifier::Deprecated => {
                    self.emit(f!("    #[deprecated]\n"));
                    self.emit(f!("    pub {ident}: Option<{ty}>,\n"));
                }
            }
        }
        self.emit(f!("}}\n"));
    }

    fn gen_union(&mut self, def: &Definition) {
        let DefinitionKind::Union(u) = &def.kind else {
            unreachable!()
        };
        let name = self.path(def);
        let generics = self.generics(def);
        let scope = self.scope(def);
        let options = complete(&u.options);
        let variants = self.variant_names(&options);

        self.emit(f!("\n#[derive(Clone, Debug, PartialEq)]\n"));
        self.emit(f!("pub enum {name}{generics} {{\n"));
        for (option, variant) in options.iter().zip(&variants) {
            let ty = self.rust_type(scope, &option.kind.ty);
            self.emit(f!("    {variant}({ty}),\n"));
        }
        self.emit(f!("}}\n"));

        self.emit(f!("\nimpl{generics} {name}{generics} {{\n"));
        self.emit(f!("    /// Ordinal of the active option.\n"));
        self.emit(f!("    pub fn ordinal(&self) -> u32 {{\n"));
        self.emit(f!("        match *self {{\n"));
        for (option, variant) in options.iter().zip(&variants) {
            self.emit(f!("            Self::{variant}(_) => {},\n", option.ordinal));
        }
        self.emit(f!("        }}\n    }}\n}}\n"));
    }

    fn gen_enum(&mut self, def: &Definition) {
        let DefinitionKind::Enum(e) = &def.kind else {
            unreachable!()
        };
        let name = self.path(def);

        self.emit(f!("\n#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]\n"));
        self.emit(f!("pub struct {name}(pub u32);\n"));
        self.emit(f!("\nimpl {name} {{\n"));
        let cases = complete(&e.cases);
        let constants = self.member_names(&cases, |name| name.to_shouty_snake_case(), "_");
        for (case, constant) in cases.into_iter().zip(constants.into_iter().map(safe)) {
            let ordinal = case.ordinal;
            self.emit(f!("    pub const {constant}: {name} = {name}({ordinal});\n"));
        }
        self.emit(f!("}}\n"));
    }

    fn gen_service(&mut self, def: &Definition) {
        let DefinitionKind::Service(s) = &def.kind else {
            unreachable!()
        };
        let name = self.path(def);
        let scope = self.scope(def);

        self.emit(f!("\npub trait {name} {{\n"));
        let rpcs = complete(&s.rpcs);
        let methods = self.member_names(&rpcs, |name| name.to_snake_case(), "_");
        for (rpc, method) in rpcs.into_iter().zip(methods.into_iter().map(safe)) {
            let arg = self.rust_type(scope, &rpc.kind.arg);
            let ret = self.rust_type(scope, &rpc.kind.ret);
            self.emit(f!("    fn {method}(&self, arg: {arg}) -> {ret};\n"));
        }
        self.emit(f!("}}\n"));
    }

    /// Spells a type reference as seen from `scope`.
    fn rust_type(&self, scope: ScopeId, ty: &TypeRef) -> String {
        let mut rust = match &ty.kind {
            TypeKind::Named(named) => {
                let mut args = Vec::new();
                let base = match named.normalized {
                    Some(Normalized::Primitive(primitive)) => primitive_type(primitive).to_owned(),
                    Some(Normalized::User(_)) | None => {
                        self.user_type(scope, named.ident, &mut args)
                    }
                };
                args.extend(named.args.iter().flatten().map(|arg| self.rust_type(scope, arg)));
                with_args(base, &args)
            }
            TypeKind::Inline(def) => {
                let args = self.inherited_params(self.scope(def));
                with_args(self.path(def), &args)
            }
            TypeKind::Missing => unreachable!("only complete members are emitted"),
        };
        for dim in ty.dims.iter().rev() {
            rust = match dim {
                Dim::Sized(size) => format!("[{rust}; {size}]"),
                Dim::Unsized => format!("Vec<{rust}>"),
            };
        }
        rust
    }

    /// Spells a user type, pushing the parameters it inherits onto `args`.
    fn user_type(&self, scope: ScopeId, ident: Ident, args: &mut Vec<String>) -> String {
        let name = self.names.get(ident);
        match self.scopes.resolve(scope, ident.name) {
            Some(binding) if binding.construct == Construct::TypeParams => name.to_owned(),
            Some(binding) => match self.paths.get(&binding.scope) {
                Some(path) => {
                    args.extend(self.inherited_params(binding.scope));
                    path.clone()
                }
                None => name.to_pascal_case(),
            },
            None => name.to_pascal_case(),
        }
    }

    fn inherited_params(&self, scope: ScopeId) -> Vec<String> {
        self.inherited
            .get(&scope)
            .map(|names| names.iter().map(|&n| self.names.get(n).to_owned()).collect())
            .unwrap_or_default()
    }

    /// Re-cases member names. Names which collide once re-cased get their
    /// ordinal appended.
    fn member_names<K>(
        &self,
        members: &[&Member<K>],
        recase: impl Fn(&str) -> String,
        sep: &str,
    ) -> Vec<String> {
        let names: Vec<_> = members
            .iter()
            .map(|m| recase(self.names.get(m.ident)))
            .collect();
        dedup(names, members, sep)
    }

    fn variant_names(&self, options: &[&Member<Variant>]) -> Vec<String> {
        let names = options
            .iter()
            .map(|option| variant_name(self.names, option.ident, option.ordinal))
            .collect();
        dedup(names, options, "").into_iter().map(safe).collect()
    }

    /// Every complete member type of `def`, labelled with the name part an
    /// inline definition there would get.
    fn member_types<'d>(&self, def: &'d Definition) -> Vec<(String, &'d TypeRef)> {
        let mut types = Vec::new();
        match &def.kind {
            DefinitionKind::Struct(s) => {
                let fields = complete(&s.fields);
                let labels = self.member_names(&fields, |name| name.to_pascal_case(), "");
                for (field, label) in fields.into_iter().zip(labels) {
                    types.push((label, &field.kind.ty));
                }
            }
            DefinitionKind::Union(u) => {
                let options = complete(&u.options);
                let labels = self.variant_names(&options);
                for (option, label) in options.into_iter().zip(labels) {
                    types.push((label, &option.kind.ty));
                }
            }
            DefinitionKind::Service(s) => {
                let rpcs = complete(&s.rpcs);
                let labels = self.member_names(&rpcs, |name| name.to_pascal_case(), "");
                for (rpc, label) in rpcs.into_iter().zip(labels) {
                    types.push((format!("{label}Arg"), &rpc.kind.arg));
                    types.push((format!("{label}Ret"), &rpc.kind.ret));
                }
            }
            DefinitionKind::Property(_) | DefinitionKind::Import(_) | DefinitionKind::Enum(_) => {}
        }
        types
    }

    /// Inherited parameters first, then the definition's own.
    fn generics(&self, def: &Definition) -> String {
        let mut params = self.inherited_params(self.scope(def));
        params.extend(type_params(def).iter().map(|p| self.names.get(p).to_owned()));
        with_args(String::new(), &params)
    }

    fn path(&self, def: &Definition) -> String {
        self.paths[&self.scope(def)].clone()
    }

    fn scope(&self, def: &Definition) -> ScopeId {
        def.scope.expect("checked definitions have a scope")
    }
}

// Utility functions.
impl CodeGen<'_> {
    fn emit(&mut self, f: fmt::Arguments<'_>) {
        self.code
            .write_fmt(f)
            .expect("code emit should be infallible");
    }
}

/// Complete definitions of a list.
fn definitions(defs: &[Definition]) -> impl Iterator<Item = &Definition> + Clone {
    defs.iter().filter(|def| !def.poisoned)
}

/// Complete members of a list.
fn complete<K>(members: &[Member<K>]) -> Vec<&Member<K>> {
    members.iter().filter(|m| !m.poisoned).collect()
}

fn type_params(def: &Definition) -> &[Ident] {
    match &def.kind {
        DefinitionKind::Struct(s) => &s.params,
        DefinitionKind::Union(u) => &u.params,
        _ => &[],
    }
}

/// Appends the ordinal of every member whose name is not unique.
fn dedup<K>(names: Vec<String>, members: &[&Member<K>], sep: &str) -> Vec<String> {
    names
        .iter()
        .zip(members)
        .map(|(name, m)| {
            if names.iter().filter(|other| *other == name).count() > 1 {
                format!("{name}{sep}{}", m.ordinal)
            } else {
                name.clone()
            }
        })
        .collect()
}

/// `base<args, ...>`, or just `base` without arguments.
fn with_args(mut base: String, args: &[String]) -> String {
    if !args.is_empty() {
        base.push('<');
        base.push_str(&args.join(", "));
        base.push('>');
    }
    base
}

/// Inline definitions held by a type, with the name suffix each one gets.
/// Type arguments are numbered from 1.
fn inline_definitions(ty: &TypeRef) -> Vec<(String, &Definition)> {
    match &ty.kind {
        TypeKind::Inline(def) if !def.poisoned => vec![(String::new(), &**def)],
        TypeKind::Named(named) => {
            let args = named.args.as_deref().unwrap_or_default();
            let mut inlines = Vec::new();
            for (i, arg) in args.iter().enumerate() {
                for (suffix, def) in inline_definitions(arg) {
                    inlines.push((format!("Arg{}{suffix}", i + 1), def));
                }
            }
            inlines
        }
        TypeKind::Inline(_) | TypeKind::Missing => Vec::new(),
    }
}

/// Union options are named after their type, or after their ordinal when
/// the type is inline.
fn variant_name(names: &Names, ident: Ident, ordinal: u32) -> String {
    if ident.name.is_empty() {
        format!("Variant{ordinal}")
    } else {
        names.get(ident).to_pascal_case()
    }
}

fn primitive_type(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::String => "String",
        Primitive::Bool => "bool",
        Primitive::Float32 => "f32",
        Primitive::Float64 => "f64",
        Primitive::Int8 => "i8",
        Primitive::Int16 => "i16",
        Primitive::Int32 => "i32",
        Primitive::Int64 => "i64",
        Primitive::BigInt => "num_bigint::BigInt",
    }
}

/// Makes `name` usable as a Rust identifier.
fn safe(name: String) -> String {
    if ["crate", "self", "super", "Self"].contains(&name.as_str()) {
        // Not allowed as raw identifiers.
        format!("{name}_")
    } else if name.is_keyword() {
        format!("r#{name}")
    } else {
        name
    }
}
