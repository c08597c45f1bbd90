use crate::{
    checker, parser,
    token::{LexError, Span, Spanned},
    util::fmt::{Context, Show},
};

/// In the alternate form, diagnostics are prefixed by `file:lo:hi: `.
fn prefix(f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>, span: Span) -> std::fmt::Result {
    if f.alternate() {
        write!(f, "{}:{}:{}: ", ctx.file, span.lo, span.hi())?;
    }
    Ok(())
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;
        prefix(f, ctx, *span)?;

        use parser::ErrorKind::*;
        match &error.kind {
            Unexpected { actual, expected } => match &expected[..] {
                [single] => write!(f, "expected token {single:?}, but got {actual:?}")?,
                _ => write!(f, "expected one of {expected:?}, but got {actual:?}")?,
            },
            EscapeSequence(c) => write!(f, "invalid escape sequence `\\{c}`")?,
            Integer => write!(f, "malformed integer literal")?,
            Ordinal => write!(f, "malformed ordinal")?,
            Identifier { uppercase: true } => {
                write!(f, "identifier must start with an uppercase letter")?;
            }
            Identifier { uppercase: false } => {
                write!(f, "identifier must start with a lowercase letter")?;
            }
            Lexer(LexError::String) => write!(f, "unterminated string")?,
            Lexer(LexError::Comment) => write!(f, "malformed comment")?,
            Lexer(LexError::Character) => write!(f, "unexpected character")?,
            Lexer(LexError::Integer | LexError::Ordinal) => {
                unreachable!("reported as a literal error")
            }
        }
        write!(f, " while parsing {}", error.construct)
    }
}

impl Show for Spanned<checker::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let n = ctx.names;
        let Spanned { span, inner: error } = self;
        prefix(f, ctx, *span)?;

        use checker::ErrorKind::*;
        match &error.kind {
            Redefined { name, first } => {
                let name = n.get(*name);
                write!(f, "{name} is already defined at {first}")?;
            }
            Undefined(name) => write!(f, "type {} is not defined", n.get(*name))?,
            FirstOrdinal { got } => write!(f, "first ordinal must be 1, but got {got}")?,
            Ordinal { expected, got } => write!(f, "expected ordinal {expected}, but got {got}")?,
            ImportPath => write!(f, "import path must end with {}", checker::IMPORT_EXTENSION)?,
        }
        write!(f, " while inside {}", error.inside)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ast::Construct, token::TokenKind, util::intern::Names};

    use super::*;

    #[test]
    fn plain_form_has_no_location() {
        let names = &Names::new();
        let ctx = Context { names, file: "a.brpc" };
        let error = Span::new_of_length(3, 2).wrap(parser::Error {
            kind: parser::ErrorKind::Lexer(LexError::String),
            construct: Construct::Property,
        });
        assert_eq!(
            error.display(&ctx).to_string(),
            "unterminated string while parsing property"
        );
        assert_eq!(
            format!("{:#}", error.display(&ctx)),
            "a.brpc:3:5: unterminated string while parsing property"
        );
    }

    #[test]
    fn expected_sets() {
        let names = &Names::new();
        let ctx = Context { names, file: "a.brpc" };
        let unexpected = |expected: &[TokenKind]| {
            let error = Span::new_of_length(0, 1).wrap(parser::Error {
                kind: parser::ErrorKind::Unexpected {
                    actual: TokenKind::Comma,
                    expected: expected.into(),
                },
                construct: Construct::Rpc,
            });
            let shown = error.display(&ctx).to_string();
            shown
        };
        assert_eq!(
            unexpected(&[TokenKind::LParen]),
            "expected token LParen, but got Comma while parsing rpc"
        );
        assert_eq!(
            unexpected(&[TokenKind::LParen, TokenKind::Returns]),
            "expected one of [LParen, Returns], but got Comma while parsing rpc"
        );
    }
}
