/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST. Syntax
/// errors poison the enclosing node and parsing resumes at the next sentinel.
pub mod parser;

/// The checker binds definitions into scope tables, normalizes type
/// references and validates member lists.
pub mod checker;

/// Runs every stage over a source file, collecting all diagnostics.
pub mod compiler;

/// The code generator maps a checked schema into a Rust module.
pub mod codegen;

pub mod ast;
pub mod scope;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt;
    pub mod intern;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
