use std::io::Write;

use crate::{
    ast::*,
    util::intern::{Name, Names},
};

const INDENT_WIDTH: usize = 2;

pub fn print_schema_string(names: &Names, schema: &Schema) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_schema(&mut buf, names, schema).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_schema(w: &mut impl Write, names: &Names, schema: &Schema) -> std::io::Result<()> {
    for def in &schema.definitions {
        print_definition(w, names, 0, def)?;
    }
    Ok(())
}

fn print_definition(
    w: &mut impl Write,
    names: &Names,
    i: usize,
    def: &Definition,
) -> std::io::Result<()> {
    sp(w, i)?;
    write!(w, "{}", def.construct())?;
    name(w, names, def.ident.name)?;
    match &def.kind {
        DefinitionKind::Property(Property { value }) if !def.poisoned => {
            write!(w, " = {value:?}")?;
        }
        DefinitionKind::Import(Import { path, .. }) if !def.poisoned => write!(w, " {path:?}")?,
        DefinitionKind::Struct(Struct { params, .. }) | DefinitionKind::Union(Union { params, .. })
            if !params.is_empty() =>
        {
            write!(w, " (")?;
            for (idx, param) in params.iter().enumerate() {
                if idx > 0 {
                    write!(w, " ")?;
                }
                write!(w, "{}", names.get(param))?;
            }
            write!(w, ")")?;
        }
        _ => (),
    }
    end(w, def.poisoned, def.span)?;

    match &def.kind {
        DefinitionKind::Property(_) | DefinitionKind::Import(_) => (),
        DefinitionKind::Struct(s) => {
            for field in &s.fields {
                let modifier = field.kind.modifier.keyword();
                print_member(w, names, i + 1, &format!("field {modifier}"), field)?;
            }
        }
        DefinitionKind::Union(u) => {
            for option in &u.options {
                print_member(w, names, i + 1, "option", option)?;
            }
        }
        DefinitionKind::Enum(e) => {
            for case in &e.cases {
                print_member(w, names, i + 1, "case", case)?;
            }
        }
        DefinitionKind::Service(s) => {
            for rpc in &s.rpcs {
                print_member(w, names, i + 1, "rpc", rpc)?;
            }
        }
    }
    for local in def.local_defs() {
        print_definition(w, names, i + 1, local)?;
    }
    Ok(())
}

fn print_member<K: MemberKind>(
    w: &mut impl Write,
    names: &Names,
    i: usize,
    label: &str,
    member: &Member<K>,
) -> std::io::Result<()> {
    sp(w, i)?;
    write!(w, "{label}")?;
    name(w, names, member.ident.name)?;
    write!(w, " @{}", member.ordinal)?;
    end(w, member.poisoned, member.span)?;
    for ty in member.kind.type_refs() {
        print_type(w, names, i + 1, ty)?;
    }
    Ok(())
}

fn print_type(w: &mut impl Write, names: &Names, i: usize, ty: &TypeRef) -> std::io::Result<()> {
    if matches!(ty.kind, TypeKind::Missing) {
        return Ok(());
    }
    sp(w, i)?;
    write!(w, "type")?;
    if !ty.dims.is_empty() || matches!(ty.kind, TypeKind::Named(_)) {
        write!(w, " ")?;
    }
    for dim in &ty.dims {
        match dim {
            Dim::Sized(size) => write!(w, "[{size}]")?,
            Dim::Unsized => write!(w, "[]")?,
        }
    }
    match &ty.kind {
        TypeKind::Named(named) => {
            write!(w, "{}", names.get(named.ident))?;
            let args = named.args.as_deref();
            if args.is_some_and(<[_]>::is_empty) {
                write!(w, "()")?;
            }
            write!(w, " ({}", ty.span)?;
            if let Some(normalized) = named.normalized {
                let marker = if normalized.is_primitive() { "" } else { "ref " };
                write!(w, " %: {marker}{}", normalized.canonical_name(names))?;
            }
            writeln!(w, ")")?;
            for arg in args.unwrap_or_default() {
                print_type(w, names, i + 1, arg)?;
            }
        }
        TypeKind::Inline(def) => {
            writeln!(w, " ({})", ty.span)?;
            print_definition(w, names, i + 1, def)?;
        }
        TypeKind::Missing => unreachable!(),
    }
    Ok(())
}

fn name(w: &mut impl Write, names: &Names, name: Name) -> std::io::Result<()> {
    if !name.is_empty() {
        write!(w, " {}", names.get(name))?;
    }
    Ok(())
}

fn end(w: &mut impl Write, poisoned: bool, span: crate::token::Span) -> std::io::Result<()> {
    if poisoned {
        write!(w, " (poisoned)")?;
    }
    writeln!(w, " ({span})")
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:1$}", "", i * INDENT_WIDTH)
}
