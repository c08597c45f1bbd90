use crate::{
    checker::Checker,
    parser::{self, ParseOptions},
    token::Spanned,
    util::{
        fmt::{tree, Context, Show},
        intern::Names,
    },
};

pub const TEST_FILE: &str = "test.brpc";

pub fn format_errors<E>(names: &Names, e: &[Spanned<E>]) -> Vec<String>
where
    Spanned<E>: Show,
{
    let ctx = Context {
        names,
        file: TEST_FILE,
    };
    e.iter().map(|e| format!("{:#}", e.display(&ctx))).collect()
}

/// Each variant contains the input.
pub enum Test {
    Parser(&'static str, ParseOptions),
    Checker(&'static str, ParseOptions),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the pipeline up to the given stage, returning the printed tree and
/// every formatted error (syntax errors first).
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let tokens_buf = &mut Vec::with_capacity(1024);
    let names = &mut Names::with_capacity(128);

    let (input, options, check) = match test {
        Test::Parser(input, options) => (input, options, false),
        Test::Checker(input, options) => (input, options, true),
    };

    let (schema, errors) = match parser::parse_schema(input, tokens_buf, names, options) {
        Ok(schema) => (schema, vec![]),
        Err((schema, errors)) => (schema, errors),
    };
    let mut fmt_errors = format_errors(names, &errors);
    if !check {
        return (tree::print_schema_string(names, &schema), fmt_errors);
    }

    let checker = Checker::with_capacity(names, 32);
    let (analysis, errors) = match checker.check(schema) {
        Ok(analysis) => (analysis, vec![]),
        Err((analysis, errors)) => (analysis, errors),
    };
    fmt_errors.extend(format_errors(names, &errors));
    (tree::print_schema_string(names, &analysis.schema), fmt_errors)
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, schema), $source:expr) => {
        crate::util::test_utils::Test::Parser($source, crate::parser::ParseOptions::default())
    };
    (@@get_test(parser, strict_schema), $source:expr) => {
        crate::util::test_utils::Test::Parser(
            $source,
            crate::parser::ParseOptions { strict_identifiers: true },
        )
    };
    (@@get_test(checker, schema), $source:expr) => {
        crate::util::test_utils::Test::Checker($source, crate::parser::ParseOptions::default())
    };
    (@@get_test(checker, strict_schema), $source:expr) => {
        crate::util::test_utils::Test::Checker(
            $source,
            crate::parser::ParseOptions { strict_identifiers: true },
        )
    };
}
pub(crate) use tree_tests;
