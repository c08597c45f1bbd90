//! Renders a schema back to source text.
//!
//! Only complete nodes are printed: poisoned definitions and members are left
//! out, so the output of a tree with errors is a valid (smaller) schema.

use std::fmt::Write;

use crate::{ast::*, util::intern::Names};

const INDENT: &str = "    ";

pub fn print_schema_string(names: &Names, schema: &Schema) -> String {
    let mut p = Printer {
        names,
        out: String::with_capacity(1024),
        depth: 0,
    };
    p.schema(schema);
    p.out
}

struct Printer<'a> {
    names: &'a Names,
    out: String,
    depth: usize,
}

impl Printer<'_> {
    fn schema(&mut self, schema: &Schema) {
        let mut prev_was_header = None;
        for def in schema.definitions.iter().filter(|def| !def.poisoned) {
            let is_header = matches!(
                def.kind,
                DefinitionKind::Property(_) | DefinitionKind::Import(_)
            );
            // Headers are packed together; every message or service is set
            // apart by a blank line.
            if prev_was_header.is_some_and(|prev| !(prev && is_header)) {
                self.out.push('\n');
            }
            prev_was_header = Some(is_header);
            self.top_level(def);
        }
    }

    fn top_level(&mut self, def: &Definition) {
        let name = self.names.get(def.ident);
        match &def.kind {
            DefinitionKind::Property(Property { value }) => {
                self.line(format_args!("{name} = {}", quote(value)));
            }
            DefinitionKind::Import(Import { path, .. }) => {
                self.line(format_args!("import {}", quote(path)));
            }
            _ => self.message(def),
        }
    }

    fn message(&mut self, def: &Definition) {
        self.indent();
        let name = self.names.get(def.ident);
        match &def.kind {
            DefinitionKind::Service(_) => write!(self.out, "service {name} "),
            _ => write!(self.out, "message {name} "),
        }
        .unwrap();
        self.body(def);
        self.out.push('\n');
    }

    /// Writes `struct (T) { ... }` (or the like) from the current position.
    fn body(&mut self, def: &Definition) {
        match &def.kind {
            DefinitionKind::Struct(Struct { params, .. }) => {
                self.out.push_str("struct ");
                self.params(params);
            }
            DefinitionKind::Union(Union { params, .. }) => {
                self.out.push_str("union ");
                self.params(params);
            }
            DefinitionKind::Enum(_) => self.out.push_str("enum "),
            DefinitionKind::Service(_) => (),
            DefinitionKind::Property(_) | DefinitionKind::Import(_) => {
                unreachable!("{:?} has no body", def.construct())
            }
        }

        let is_empty = match &def.kind {
            DefinitionKind::Struct(s) => s.fields.is_empty() && s.local_defs.is_empty(),
            DefinitionKind::Union(u) => u.options.is_empty() && u.local_defs.is_empty(),
            DefinitionKind::Enum(e) => e.cases.is_empty(),
            DefinitionKind::Service(s) => s.rpcs.is_empty() && s.local_defs.is_empty(),
            _ => true,
        };
        if is_empty {
            self.out.push_str("{}");
            return;
        }

        self.out.push_str("{\n");
        self.depth += 1;
        match &def.kind {
            DefinitionKind::Struct(s) => {
                for field in s.fields.iter().filter(|m| !m.poisoned) {
                    self.indent();
                    let modifier = field.kind.modifier.keyword();
                    let name = self.names.get(field.ident);
                    write!(self.out, "{modifier} {name} @{} ", field.ordinal).unwrap();
                    self.type_ref(&field.kind.ty);
                    self.out.push_str(";\n");
                }
            }
            DefinitionKind::Union(u) => {
                for option in u.options.iter().filter(|m| !m.poisoned) {
                    self.indent();
                    write!(self.out, "@{} ", option.ordinal).unwrap();
                    self.type_ref(&option.kind.ty);
                    self.out.push_str(";\n");
                }
            }
            DefinitionKind::Enum(e) => {
                for case in e.cases.iter().filter(|m| !m.poisoned) {
                    let name = self.names.get(case.ident);
                    self.line(format_args!("@{} {name};", case.ordinal));
                }
            }
            DefinitionKind::Service(s) => {
                for rpc in s.rpcs.iter().filter(|m| !m.poisoned) {
                    self.indent();
                    let name = self.names.get(rpc.ident);
                    write!(self.out, "rpc @{} {name} (", rpc.ordinal).unwrap();
                    self.type_ref(&rpc.kind.arg);
                    self.out.push_str(") returns (");
                    self.type_ref(&rpc.kind.ret);
                    self.out.push_str(");\n");
                }
            }
            DefinitionKind::Property(_) | DefinitionKind::Import(_) => unreachable!(),
        }
        for local in def.local_defs().iter().filter(|def| !def.poisoned) {
            self.message(local);
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
    }

    fn params(&mut self, params: &[Ident]) {
        if params.is_empty() {
            return;
        }
        self.out.push('(');
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.out.push(' ');
            }
            self.out.push_str(self.names.get(param));
        }
        self.out.push_str(") ");
    }

    fn type_ref(&mut self, ty: &TypeRef) {
        for dim in &ty.dims {
            match dim {
                Dim::Sized(size) => write!(self.out, "[{size}]").unwrap(),
                Dim::Unsized => self.out.push_str("[]"),
            }
        }
        match &ty.kind {
            TypeKind::Named(named) => {
                self.out.push_str(self.names.get(named.ident));
                if let Some(args) = &named.args {
                    self.out.push('(');
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            self.out.push(' ');
                        }
                        self.type_ref(arg);
                    }
                    self.out.push(')');
                }
            }
            TypeKind::Inline(def) => self.body(def),
            TypeKind::Missing => unreachable!("complete members always have a type"),
        }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        self.indent();
        self.out.write_fmt(args).unwrap();
        self.out.push('\n');
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }
}

/// Quotes a string, escaping it the way the lexer decodes it.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str(r"\\"),
            '"' => quoted.push_str(r#"\""#),
            '\n' => quoted.push_str(r"\n"),
            '\t' => quoted.push_str(r"\t"),
            '\u{c}' => quoted.push_str(r"\f"),
            '\r' => quoted.push_str(r"\r"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::test_utils::parse_schema;

    fn print(src: &str) -> String {
        let (names, schema) = parse_schema(src);
        print_schema_string(&names, &schema)
    }

    const SOURCE: &str = indoc! {r#"
        // A comment, which is dropped.
        package="demo"  version = "a\tb\"c"
        import "common.brpc"
        message Point struct (T) { required x @1 T; optional tags @2 [][4]string;;
          deprecated meta @3 Map(string []T); message Inner enum { @1 A; @2 B; } }
        message Shape union { @1 Point(int32); @2 struct { required r @1 float64; }; }
        service Draw { rpc @1 Render (Shape) returns ([]int8) rpc @2 Ping (E()) returns (E); }
        message Empty struct {}
    "#};

    #[test]
    fn test_canonical_form() {
        let expected = indoc! {r#"
            package = "demo"
            version = "a\tb\"c"
            import "common.brpc"

            message Point struct (T) {
                required x @1 T;
                optional tags @2 [][4]string;
                deprecated meta @3 Map(string []T);
                message Inner enum {
                    @1 A;
                    @2 B;
                }
            }

            message Shape union {
                @1 Point(int32);
                @2 struct {
                    required r @1 float64;
                };
            }

            service Draw {
                rpc @1 Render (Shape) returns ([]int8);
                rpc @2 Ping (E()) returns (E);
            }

            message Empty struct {}
        "#};
        assert_eq!(print(SOURCE), expected);
    }

    #[test]
    fn test_printing_is_idempotent() {
        let once = print(SOURCE);
        let twice = print(&once);
        assert_eq!(once, twice);

        let (names, first) = parse_schema(SOURCE);
        let first = shape(&names, &first);
        let (names, second) = parse_schema(&once);
        assert_eq!(first, shape(&names, &second));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\\b\n\u{c}\r"), r#""a\\b\n\f\r""#);
    }

    /// The tree dump, without positions.
    fn shape(names: &Names, schema: &Schema) -> String {
        let tree = crate::util::fmt::tree::print_schema_string(names, schema);
        tree.lines()
            .map(|line| line.rsplit_once(" (").map_or(line, |(node, _)| node))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
