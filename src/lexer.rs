use std::num::ParseIntError;

use crate::token::{LexError, Span, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// The buffer always ends with exactly one [`TokenKind::Eof`] token.
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    Lexer::new(src, tokens).lex();
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens);
    tokens
}

/// The schema lexer. Operates on bytes; non-ASCII input is only meaningful
/// inside comments and string literals.
struct Lexer<'src, 'tok> {
    text: &'src str,
    src: &'src [u8],
    cursor: usize,
    current_lo: usize,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    ///
    /// Tokens are written into the provided tokens buffer.
    fn lex(mut self) {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            let Some(next) = self.scan_token_kind() else {
                // Trivia (whitespace or comment), which produces no token.
                continue;
            };
            let is_eof = next == TokenKind::Eof;
            self.produce(next);
            if is_eof {
                break;
            }
        }
    }

    /// Tries to scan the current character. Returns `None` for trivia.
    fn scan_token_kind(&mut self) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match self.mark_advance() {
            None => Eof,
            Some(c) if is_whitespace(c) => {
                self.whitespace();
                return None;
            }
            Some(b'{') => LBrace,
            Some(b'}') => RBrace,
            Some(b'(') => LParen,
            Some(b')') => RParen,
            Some(b'[') => LBrack,
            Some(b']') => RBrack,
            Some(b';') => Semicolon,
            Some(b',') => Comma,
            Some(b'=') => Equal,
            Some(b'|') => Pipe,
            Some(b'@') => self.ordinal(),
            Some(b'"') => self.string(),
            Some(b'/') => return self.comment(),
            Some(c) if c.is_ascii_digit() => self.integer(),
            Some(c) if is_identifier_body(c) => self.identifier_or_keyword(),
            Some(c) => self.unexpected_character(c),
        };
        Some(kind)
    }

    fn whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            self.advance();
        }
    }

    /// Scans a `//` comment up to (not including) the line break.
    fn comment(&mut self) -> Option<TokenKind> {
        if self.peek() != Some(b'/') {
            self.advance_to_delimiter();
            return Some(TokenKind::Error(LexError::Comment));
        }
        while self.peek().is_some_and(|c| c != b'\n') {
            self.advance();
        }
        None
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while self.peek().is_some_and(is_identifier_body) {
            self.advance();
        }
        let substr = self.span().substr(self.text);
        KEYWORDS
            .get(substr)
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn integer(&mut self) -> TokenKind {
        self.digits(TokenKind::Integer, LexError::Integer)
    }

    /// Scans an ordinal. The `@` has already been consumed.
    fn ordinal(&mut self) -> TokenKind {
        if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance_to_delimiter();
            return TokenKind::Error(LexError::Ordinal);
        }
        self.digits(TokenKind::Ordinal, LexError::Ordinal)
    }

    /// Scans a digit run which must be immediately followed by a delimiter.
    /// Otherwise, the error token spans up to the next delimiter.
    fn digits(&mut self, ok: TokenKind, error: LexError) -> TokenKind {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.at_delimiter() {
            ok
        } else {
            self.advance_to_delimiter();
            TokenKind::Error(error)
        }
    }

    /// Scans a string literal. The opening quote has already been consumed.
    ///
    /// The lexer only finds the closing quote; escape sequences are validated
    /// and decoded by [`extract::string`].
    fn string(&mut self) -> TokenKind {
        loop {
            match self.advance() {
                None => return TokenKind::Error(LexError::String),
                Some(b'"') => return TokenKind::String,
                Some(b'\\') => {
                    // Whatever follows the backslash belongs to the escape.
                    if self.advance().is_none() {
                        return TokenKind::Error(LexError::String);
                    }
                }
                Some(_) => (),
            }
        }
    }

    fn unexpected_character(&mut self, lead: u8) -> TokenKind {
        // Keep the span on a character boundary.
        if !lead.is_ascii() {
            while self.peek().is_some_and(|c| c & 0b1100_0000 == 0b1000_0000) {
                self.advance();
            }
        }
        TokenKind::Error(LexError::Character)
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            text: src,
            src: src.as_bytes(),
            cursor: 0,
            current_lo: 0,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the cursor.
    fn mark_advance(&mut self) -> Option<u8> {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next byte and advances the cursor.
    fn advance(&mut self) -> Option<u8> {
        let c = self.src.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(c)
    }

    /// Returns the next byte without advancing the cursor.
    fn peek(&self) -> Option<u8> {
        self.src.get(self.cursor).copied()
    }

    /// Whether the next byte ends a numeric lexeme.
    fn at_delimiter(&self) -> bool {
        self.peek().is_none_or(is_delimiter)
    }

    fn advance_to_delimiter(&mut self) {
        while !self.at_delimiter() {
            self.advance();
        }
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        let span = self.span();
        self.tokens.push(Token::new(kind, span));
    }
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c')
}

fn is_control(c: u8) -> bool {
    matches!(
        c,
        b'=' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b';' | b',' | b'|' | b'@'
    )
}

fn is_delimiter(c: u8) -> bool {
    is_whitespace(c) || is_control(c)
}

fn is_identifier_body(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

pub mod extract {
    use super::*;

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.lexeme(src)
    }

    pub fn integer(token: Token, src: &str) -> Result<u32, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Integer);
        token.lexeme(src).parse()
    }

    pub fn ordinal(token: Token, src: &str) -> Result<u32, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Ordinal);
        token.span().offset(1, 0).substr(src).parse()
    }

    /// Decodes a string token, stripping its quotes. On failure, returns the
    /// first character which does not form a valid escape sequence.
    pub fn string(token: Token, src: &str) -> Result<Box<str>, char> {
        debug_assert_eq!(token.kind, TokenKind::String);
        let raw = token.span().offset(1, -1).substr(src);
        if raw.contains('\\') {
            perform_escape(raw).map(String::into_boxed_str)
        } else {
            Ok(raw.into())
        }
    }
}

fn perform_escape(raw: &str) -> Result<String, char> {
    let mut buf = String::with_capacity(raw.len());
    let mut escaped = false;
    for char in raw.chars() {
        let char = match (escaped, char) {
            (true, '\\') => '\\',
            (true, 'n') => '\n',
            (true, 't') => '\t',
            (true, 'f') => '\x0c', // form feed
            (true, 'r') => '\r',
            (true, '"') => '"',
            (true, other) => return Err(other),
            (false, '\\') => {
                escaped = true;
                continue;
            }
            (false, char) => char,
        };
        escaped = false;
        buf.push(char);
    }
    // The lexer never ends a string token on a dangling backslash.
    debug_assert!(!escaped);
    buf.shrink_to_fit();
    Ok(buf)
}
