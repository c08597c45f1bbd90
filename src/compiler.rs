use crate::{
    checker::{self, Analysis, Checker},
    lexer,
    parser::{self, ParseOptions},
    token::{Span, Spanned},
    util::{
        fmt::{Context, Show},
        intern::Names,
    },
};

/// Any error found while compiling a schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    Syntax(Spanned<parser::Error>),
    Semantic(Spanned<checker::Error>),
}

impl Diagnostic {
    pub fn span(&self) -> Span {
        match self {
            Diagnostic::Syntax(e) => e.span,
            Diagnostic::Semantic(e) => e.span,
        }
    }
}

impl Show for Diagnostic {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::Syntax(e) => e.show(f, ctx),
            Diagnostic::Semantic(e) => e.show(f, ctx),
        }
    }
}

/// The analysis is returned even on failure, mostly for debugging.
pub type CompileResult = Result<Analysis, (Analysis, Vec<Diagnostic>)>;

/// Lexes, parses and checks a schema. Diagnostics of both stages are merged
/// and sorted by position.
pub fn compile(src: &str, names: &mut Names, options: ParseOptions) -> CompileResult {
    let tokens = &mut Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    let mut diagnostics = Vec::new();

    let schema = match parser::parse_schema(src, tokens, names, options) {
        Ok(schema) => schema,
        Err((schema, errors)) => {
            diagnostics.extend(errors.into_iter().map(Diagnostic::Syntax));
            schema
        }
    };

    let checker = Checker::with_capacity(names, 64);
    let analysis = match checker.check(schema) {
        Ok(analysis) => analysis,
        Err((analysis, errors)) => {
            diagnostics.extend(errors.into_iter().map(Diagnostic::Semantic));
            analysis
        }
    };

    if diagnostics.is_empty() {
        Ok(analysis)
    } else {
        // Stable, so errors at the same offset keep their stage order.
        diagnostics.sort_by_key(|d| d.span().lo);
        Err((analysis, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::TEST_FILE;

    fn diagnostics(src: &str) -> Vec<String> {
        let names = &mut Names::new();
        match compile(src, names, ParseOptions::default()) {
            Ok(_) => vec![],
            Err((_, diagnostics)) => {
                let ctx = Context {
                    names,
                    file: TEST_FILE,
                };
                diagnostics
                    .iter()
                    .map(|d| format!("{:#}", d.display(&ctx)))
                    .collect()
            }
        }
    }

    #[test]
    fn test_clean_schema() {
        let names = &mut Names::new();
        let src = r#"package = "x" message A struct { required b @1 []A; }"#;
        let analysis = compile(src, names, ParseOptions::default()).unwrap();
        assert_eq!(analysis.schema.definitions.len(), 2);
        assert_eq!(analysis.properties.len(), 1);
    }

    #[test]
    fn test_benchmark_input_is_clean() {
        let src = include_str!("../bench/data/big.brpc");
        assert_eq!(diagnostics(src), Vec::<String>::new());
    }

    #[test]
    fn test_diagnostics_are_sorted_by_position() {
        let src = "message A struct { required a @1 B; } message C struct { required x @1abc int8; }";
        assert_eq!(
            diagnostics(src),
            [
                "test.brpc:33:34: type B is not defined while inside struct",
                "test.brpc:68:73: malformed ordinal while parsing field",
            ]
        );
    }

    #[test]
    fn test_recovery_reports_once() {
        let src = "message A struct { required one @1abc int8; required two @2 int8; }";
        assert_eq!(diagnostics(src).len(), 1);
    }

    #[test]
    fn test_plain_rendering() {
        let names = &mut Names::new();
        let src = "message E enum { @1 One; @3 Two; }";
        let Err((_, diagnostics)) = compile(src, names, ParseOptions::default()) else {
            panic!("expected diagnostics");
        };
        let ctx = Context { names, file: "e.brpc" };
        assert_eq!(
            diagnostics[0].display(&ctx).to_string(),
            "expected ordinal 2, but got 3 while inside enum"
        );
        assert_eq!(diagnostics[0].span(), Span::new_of_bounds(25..27));
    }
}
