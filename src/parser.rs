use crate::{
    ast::{
        self, Construct, Definition, DefinitionKind, Dim, Field, Ident, Member, Modifier,
        NamedType, Schema, TypeKind, TypeRef, Variant,
    },
    lexer::{self, extract},
    token::{LexError, Span, Spanned, Token, TokenKind},
    util::intern::Names,
};

/// The error side carries the offending token, which has already been
/// reported.
type Result<T, E = Token> = std::result::Result<T, E>;

/// The tree is always produced; on failure, it comes with the errors and may
/// contain poisoned nodes.
pub type ParseResult<T> = std::result::Result<T, (T, Vec<Spanned<Error>>)>;

#[derive(Copy, Clone, Debug, Default)]
pub struct ParseOptions {
    /// Require type names to start with an uppercase letter and field names
    /// with a lowercase one.
    pub strict_identifiers: bool,
}

pub fn parse_schema(
    src: &str,
    tokens: &mut Vec<Token>,
    names: &mut Names,
    options: ParseOptions,
) -> ParseResult<Schema> {
    assert!(tokens.is_empty());

    lexer::lex(src, tokens);
    let mut p = Parser::new(src, tokens, names, options);
    let schema = p.parse_schema();

    if p.errors.is_empty() {
        Ok(schema)
    } else {
        Err((schema, p.errors))
    }
}

struct Parser<'src, 'tok, 'names> {
    src: &'src str,
    tokens: &'tok [Token],
    names: &'names mut Names,
    options: ParseOptions,
    cursor: usize,
    /// End of the last consumed token.
    prev_hi: usize,
    errors: Vec<Spanned<Error>>,
    /// Set once an error has been reported at the end of input.
    eof_reported: bool,
}

impl Parser<'_, '_, '_> {
    fn parse_schema(&mut self) -> Schema {
        use TokenKind::*;

        let mut definitions = Vec::with_capacity(8);
        loop {
            match self.peek().kind {
                Eof => break,
                Identifier => definitions.push(self.parse_property()),
                Import => definitions.push(self.parse_import()),
                Message => definitions.push(self.parse_message()),
                Service => definitions.push(self.parse_service()),
                _ => {
                    let expected = &[Identifier, Import, Message, Service];
                    self.unexpected_in_body(expected, Construct::Schema);
                }
            }
        }
        Schema { definitions }
    }

    fn parse_property(&mut self) -> Definition {
        let lo = self.peek().span().lo;
        let node = Definition::new(lo, DefinitionKind::Property(ast::Property::default()));
        self.build(node, |p, def| {
            def.ident = p.parse_ident(Construct::Property)?;
            p.consume(TokenKind::Equal, Construct::Property)?;
            if let Some(value) = p.parse_string(def, Construct::Property)? {
                def.kind = DefinitionKind::Property(ast::Property { value });
            }
            Ok(())
        })
    }

    fn parse_import(&mut self) -> Definition {
        let lo = self.peek().span().lo;
        let node = Definition::new(lo, DefinitionKind::Import(ast::Import::default()));
        self.build(node, |p, def| {
            p.consume(TokenKind::Import, Construct::Import)?;
            let path_span = p.peek().span();
            if let Some(path) = p.parse_string(def, Construct::Import)? {
                def.kind = DefinitionKind::Import(ast::Import { path, path_span });
            }
            Ok(())
        })
    }

    /// Parses a string literal. An invalid escape sequence poisons `def` but
    /// is not a syntax error, so parsing goes on without recovery.
    fn parse_string(
        &mut self,
        def: &mut Definition,
        construct: Construct,
    ) -> Result<Option<Box<str>>> {
        let token = self.consume(TokenKind::String, construct)?;
        match extract::string(token, self.src) {
            Ok(value) => Ok(Some(value)),
            Err(escape) => {
                self.error(token.span(), ErrorKind::EscapeSequence(escape), construct);
                def.poisoned = true;
                Ok(None)
            }
        }
    }

    fn parse_message(&mut self) -> Definition {
        let lo = self.peek().span().lo;
        let node = Definition::new(lo, DefinitionKind::Struct(ast::Struct::default()));
        self.build(node, |p, def| {
            use TokenKind::*;

            p.consume(Message, Construct::Message)?;
            match p.parse_type_name(Construct::Message) {
                Ok(ident) => def.ident = ident,
                Err(offending) => {
                    p.header_recovery(def, offending, &[Struct, Union, Enum])?;
                }
            }
            p.parse_type_body(def, Construct::Message)
        })
    }

    /// After a malformed definition name, the body is still parsed if it
    /// follows, so that it doesn't leak into the enclosing one.
    fn header_recovery(
        &mut self,
        def: &mut Definition,
        offending: Token,
        body_start: &[TokenKind],
    ) -> Result<()> {
        def.poisoned = true;
        if !offending.is_eof() && !offending.kind.is_recovery_stop() {
            self.advance();
        }
        if body_start.contains(&self.peek().kind) {
            Ok(())
        } else {
            Err(offending)
        }
    }

    /// Parses an anonymous `struct`, `union` or `enum` used as a type.
    fn parse_inline_definition(&mut self) -> Definition {
        let lo = self.peek().span().lo;
        let node = Definition::new(lo, DefinitionKind::Struct(ast::Struct::default()));
        self.build(node, |p, def| p.parse_type_body(def, Construct::TypeRef))
    }

    fn parse_type_body(&mut self, def: &mut Definition, construct: Construct) -> Result<()> {
        use TokenKind::*;

        match self.peek().kind {
            Struct => self.parse_struct_body(def),
            Union => self.parse_union_body(def),
            Enum => self.parse_enum_body(def),
            _ => Err(self.unexpected(&[Struct, Union, Enum], construct)),
        }
    }

    fn parse_struct_body(&mut self, def: &mut Definition) -> Result<()> {
        use TokenKind::*;
        const C: Construct = Construct::Struct;

        self.consume(Struct, C)?;
        def.kind = DefinitionKind::Struct(ast::Struct::default());
        let DefinitionKind::Struct(body) = &mut def.kind else {
            unreachable!()
        };
        body.params = self.parse_type_params()?;
        self.consume(LBrace, C)?;
        loop {
            match self.peek().kind {
                RBrace => break,
                Required | Optional | Deprecated => body.fields.push(self.parse_field()),
                Message => body.local_defs.push(self.parse_message()),
                Eof => return Err(self.unexpected(&[RBrace], C)),
                _ => self.unexpected_in_body(&[Required, Optional, Deprecated, Message, RBrace], C),
            }
        }
        self.consume(RBrace, C)?;
        Ok(())
    }

    fn parse_union_body(&mut self, def: &mut Definition) -> Result<()> {
        use TokenKind::*;
        const C: Construct = Construct::Union;

        self.consume(Union, C)?;
        def.kind = DefinitionKind::Union(ast::Union::default());
        let DefinitionKind::Union(body) = &mut def.kind else {
            unreachable!()
        };
        body.params = self.parse_type_params()?;
        self.consume(LBrace, C)?;
        loop {
            match self.peek().kind {
                RBrace => break,
                Ordinal => body.options.push(self.parse_option()),
                Message => body.local_defs.push(self.parse_message()),
                Eof => return Err(self.unexpected(&[RBrace], C)),
                _ => self.unexpected_in_body(&[Ordinal, Message, RBrace], C),
            }
        }
        self.consume(RBrace, C)?;
        Ok(())
    }

    fn parse_enum_body(&mut self, def: &mut Definition) -> Result<()> {
        use TokenKind::*;
        const C: Construct = Construct::Enum;

        self.consume(Enum, C)?;
        def.kind = DefinitionKind::Enum(ast::Enum::default());
        let DefinitionKind::Enum(body) = &mut def.kind else {
            unreachable!()
        };
        self.consume(LBrace, C)?;
        loop {
            match self.peek().kind {
                RBrace => break,
                Ordinal => body.cases.push(self.parse_case()),
                Eof => return Err(self.unexpected(&[RBrace], C)),
                _ => self.unexpected_in_body(&[Ordinal, RBrace], C),
            }
        }
        self.consume(RBrace, C)?;
        Ok(())
    }

    fn parse_service(&mut self) -> Definition {
        use TokenKind::*;
        const C: Construct = Construct::Service;

        let lo = self.peek().span().lo;
        let node = Definition::new(lo, DefinitionKind::Service(ast::Service::default()));
        self.build(node, |p, def| {
            p.consume(Service, C)?;
            match p.parse_type_name(C) {
                Ok(ident) => def.ident = ident,
                Err(offending) => p.header_recovery(def, offending, &[LBrace])?,
            }
            let DefinitionKind::Service(body) = &mut def.kind else {
                unreachable!()
            };
            p.consume(LBrace, C)?;
            loop {
                match p.peek().kind {
                    RBrace => break,
                    Rpc => body.rpcs.push(p.parse_rpc()),
                    Message => body.local_defs.push(p.parse_message()),
                    Eof => return Err(p.unexpected(&[RBrace], C)),
                    _ => p.unexpected_in_body(&[Rpc, Message, RBrace], C),
                }
            }
            p.consume(RBrace, C)?;
            Ok(())
        })
    }

    /// Parses `'(' ID* ')'`, if present.
    fn parse_type_params(&mut self) -> Result<Vec<Ident>> {
        const C: Construct = Construct::TypeParams;

        if !self.take(TokenKind::LParen) {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        while self.is(TokenKind::Identifier) {
            params.push(self.parse_type_name(C)?);
        }
        self.consume(TokenKind::RParen, C)?;
        Ok(params)
    }

    fn parse_field(&mut self) -> Member<Field> {
        const C: Construct = Construct::Field;

        let lo = self.peek().span().lo;
        self.build(Member::new(lo), |p, m| {
            m.kind.modifier = match p.advance().kind {
                TokenKind::Required => Modifier::Required,
                TokenKind::Optional => Modifier::Optional,
                TokenKind::Deprecated => Modifier::Deprecated,
                other => unreachable!("field can't start with {other:?}"),
            };
            m.ident = p.parse_field_name()?;
            p.parse_ordinal(m, C)?;
            m.kind.ty = p.parse_type_ref()?;
            if m.kind.ty.is_poisoned() {
                // Recovery already happened inside the inline definition.
                m.poisoned = true;
                return Ok(());
            }
            p.terminate(C)
        })
    }

    fn parse_option(&mut self) -> Member<Variant> {
        const C: Construct = Construct::Option;

        let lo = self.peek().span().lo;
        self.build(Member::new(lo), |p, m| {
            p.parse_ordinal(m, C)?;
            m.kind.ty = p.parse_type_ref()?;
            if let TypeKind::Named(named) = &m.kind.ty.kind {
                m.ident = named.ident;
            } else {
                m.ident = Ident::empty(m.kind.ty.span.lo);
            }
            if m.kind.ty.is_poisoned() {
                m.poisoned = true;
                return Ok(());
            }
            p.terminate(C)
        })
    }

    fn parse_case(&mut self) -> Member<ast::Case> {
        const C: Construct = Construct::Case;

        let lo = self.peek().span().lo;
        self.build(Member::new(lo), |p, m| {
            p.parse_ordinal(m, C)?;
            m.ident = p.parse_ident(C)?;
            p.terminate(C)
        })
    }

    fn parse_rpc(&mut self) -> Member<ast::Rpc> {
        use TokenKind::*;
        const C: Construct = Construct::Rpc;

        let lo = self.peek().span().lo;
        self.build(Member::new(lo), |p, m| {
            p.consume(Rpc, C)?;
            p.parse_ordinal(m, C)?;
            m.ident = p.parse_ident(C)?;

            p.consume(LParen, C)?;
            m.kind.arg = p.parse_type_ref()?;
            if m.kind.arg.is_poisoned() {
                m.poisoned = true;
                return Ok(());
            }
            p.consume(RParen, C)?;

            p.consume(Returns, C)?;

            p.consume(LParen, C)?;
            m.kind.ret = p.parse_type_ref()?;
            if m.kind.ret.is_poisoned() {
                m.poisoned = true;
                return Ok(());
            }
            p.consume(RParen, C)?;

            p.eat_semicolons();
            Ok(())
        })
    }

    /// Parses `('[' INTEGER? ']')* (ID type-args? | struct-body | union-body | enum-body)`.
    fn parse_type_ref(&mut self) -> Result<TypeRef> {
        use TokenKind::*;
        const C: Construct = Construct::TypeRef;

        let lo = self.peek().span().lo;
        let mut dims = Vec::new();
        while self.take(LBrack) {
            if self.is(Integer) {
                let token = self.advance();
                match extract::integer(token, self.src) {
                    Ok(size) if size > 0 => dims.push(Dim::Sized(size)),
                    _ => {
                        self.error(token.span(), ErrorKind::Integer, C);
                        return Err(token);
                    }
                }
            } else {
                dims.push(Dim::Unsized);
            }
            self.consume(RBrack, C)?;
        }

        let kind = match self.peek().kind {
            Identifier => {
                let ident = self.parse_ident(C)?;
                let args = if self.is(LParen) {
                    Some(self.parse_type_args()?)
                } else {
                    None
                };
                TypeKind::Named(NamedType {
                    ident,
                    args,
                    normalized: None,
                })
            }
            Struct | Union | Enum => TypeKind::Inline(Box::new(self.parse_inline_definition())),
            _ => return Err(self.unexpected(&[LBrack, Identifier, Struct, Union, Enum], C)),
        };

        Ok(TypeRef {
            span: Span::new_of_bounds(lo..self.prev_hi.max(lo)),
            dims,
            kind,
        })
    }

    /// Parses `'(' type-ref* ')'`.
    fn parse_type_args(&mut self) -> Result<Vec<TypeRef>> {
        self.consume(TokenKind::LParen, Construct::TypeRef)?;
        let mut args = Vec::new();
        while !self.is(TokenKind::RParen) {
            let arg = self.parse_type_ref()?;
            let poisoned = arg.is_poisoned();
            args.push(arg);
            if poisoned {
                return Ok(args);
            }
        }
        self.consume(TokenKind::RParen, Construct::TypeRef)?;
        Ok(args)
    }

    fn parse_ordinal<K>(&mut self, m: &mut Member<K>, construct: Construct) -> Result<()> {
        let token = self.consume(TokenKind::Ordinal, construct)?;
        m.ordinal_span = token.span();
        let Ok(ordinal) = extract::ordinal(token, self.src) else {
            self.error(token.span(), ErrorKind::Ordinal, construct);
            return Err(token);
        };
        m.ordinal = ordinal;
        Ok(())
    }

    fn parse_ident(&mut self, construct: Construct) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier, construct)?;
        Ok(Ident {
            name: self.names.intern(extract::ident(token, self.src)),
            span: token.span(),
        })
    }

    /// Parses the name of a message, service or type parameter.
    fn parse_type_name(&mut self, construct: Construct) -> Result<Ident> {
        let ident = self.parse_ident(construct)?;
        self.check_case(ident, true, construct);
        Ok(ident)
    }

    fn parse_field_name(&mut self) -> Result<Ident> {
        let ident = self.parse_ident(Construct::Field)?;
        self.check_case(ident, false, Construct::Field);
        Ok(ident)
    }

    /// Identifier casing is a lint: it reports, but never poisons.
    fn check_case(&mut self, ident: Ident, uppercase: bool, construct: Construct) {
        if !self.options.strict_identifiers {
            return;
        }
        let first = self.names.get(ident).bytes().next();
        let ok = if uppercase {
            first.is_some_and(|c| c.is_ascii_uppercase())
        } else {
            first.is_some_and(|c| c.is_ascii_lowercase())
        };
        if !ok {
            self.error(ident.span, ErrorKind::Identifier { uppercase }, construct);
        }
    }

    /// Consumes the `';'+` which ends a member.
    fn terminate(&mut self, construct: Construct) -> Result<()> {
        self.consume(TokenKind::Semicolon, construct)?;
        self.eat_semicolons();
        Ok(())
    }
}

/// Nodes which carry a poisoned flag and a span.
trait Node {
    fn close(&mut self, hi: usize);

    fn poison(&mut self, hi: usize);
}

impl Node for Definition {
    fn close(&mut self, hi: usize) {
        self.span = self.span.with_hi(hi);
    }

    fn poison(&mut self, hi: usize) {
        self.poisoned = true;
        self.close(hi);
    }
}

impl<K> Node for Member<K> {
    fn close(&mut self, hi: usize) {
        self.span = self.span.with_hi(hi);
    }

    fn poison(&mut self, hi: usize) {
        self.poisoned = true;
        self.close(hi);
    }
}

impl<'src, 'tok, 'names> Parser<'src, 'tok, 'names> {
    fn new(
        src: &'src str,
        tokens: &'tok [Token],
        names: &'names mut Names,
        options: ParseOptions,
    ) -> Self {
        Parser {
            src,
            tokens,
            names,
            options,
            cursor: 0,
            prev_hi: 0,
            errors: Vec::with_capacity(8),
            eof_reported: false,
        }
    }

    /// Runs a production over a pre-allocated node. On failure, the node is
    /// poisoned up to the offending token and the parser skips to the next
    /// sentinel. The (possibly partial) node is always returned.
    fn build<N: Node>(
        &mut self,
        mut node: N,
        f: impl FnOnce(&mut Self, &mut N) -> Result<()>,
    ) -> N {
        match f(self, &mut node) {
            Ok(()) => node.close(self.prev_hi),
            Err(offending) => {
                node.poison(offending.span().hi());
                self.skip_until_sentinel();
            }
        }
        node
    }

    /// Records an error. Once an error was reported at the end of input,
    /// every later one is a cascade and gets dropped.
    fn error(&mut self, span: Span, kind: ErrorKind, construct: Construct) {
        if self.eof_reported {
            return;
        }
        if span.lo >= self.src.len() {
            self.eof_reported = true;
        }
        self.errors.push(span.wrap(Error { kind, construct }));
    }

    /// Reports the current token as unexpected and returns it.
    fn unexpected(&mut self, expected: &[TokenKind], construct: Construct) -> Token {
        let c = self.peek();
        let kind = match c.kind {
            TokenKind::Error(LexError::Integer) => ErrorKind::Integer,
            TokenKind::Error(LexError::Ordinal) => ErrorKind::Ordinal,
            TokenKind::Error(other) => ErrorKind::Lexer(other),
            actual => ErrorKind::Unexpected {
                actual,
                expected: Box::from(expected),
            },
        };
        self.error(c.span(), kind, construct);
        c
    }

    /// Reports a token which can't start anything in the current body, then
    /// skips it (and whatever follows, up to a sentinel).
    fn unexpected_in_body(&mut self, expected: &[TokenKind], construct: Construct) {
        self.unexpected(expected, construct);
        self.advance();
        self.skip_until_sentinel();
    }

    /// Advances until a token which may start (or close) a construct, which
    /// is left in place, or past a `;`.
    fn skip_until_sentinel(&mut self) {
        loop {
            let c = self.peek();
            if c.is_eof() || c.kind.is_recovery_stop() {
                break;
            }
            self.advance();
            if c.kind == TokenKind::Semicolon {
                self.eat_semicolons();
                break;
            }
        }
    }

    /// Returns the current token. Past the end, this is always the same
    /// [`TokenKind::Eof`] token.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            None => Token::eof_for(self.src),
        }
    }

    /// Returns the current token and advances. Never moves past the end.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if !c.is_eof() {
            self.cursor += 1;
            self.prev_hi = c.span().hi();
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_semicolons(&mut self) {
        while self.take(TokenKind::Semicolon) {}
    }

    /// Advances if the current token matches the provided one. If not,
    /// records an error and returns the offending token.
    fn consume(&mut self, expect: TokenKind, construct: Construct) -> Result<Token> {
        if self.is(expect) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&[expect], construct))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    /// The production being parsed.
    pub construct: Construct,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Unexpected {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    EscapeSequence(char),
    /// Malformed, zero or out of range integer.
    Integer,
    /// Malformed or out of range ordinal.
    Ordinal,
    /// Identifier with the wrong initial letter case.
    Identifier {
        uppercase: bool,
    },
    /// Any other lexer error token.
    Lexer(LexError),
}
