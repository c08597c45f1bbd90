use std::{fmt, ops::Range};

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    /// Returns a synthetic end-of-file token positioned at the end of `src`.
    pub fn eof_for(src: &str) -> Token {
        Token::new(TokenKind::Eof, Span::new_of_length(src.len(), 0))
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// The source text this token was scanned from.
    pub fn lexeme<'src>(&self, src: &'src str) -> &'src str {
        self.span().substr(src)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap())
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns this span with its end moved to `hi`.
    pub fn with_hi(self, hi: usize) -> Span {
        Span::new_of_bounds(self.lo..hi.max(self.lo))
    }

    /// Shrinks (or grows) the span by the given amounts on each side.
    pub fn offset(self, lo: isize, hi: isize) -> Span {
        let new_lo = self.lo.checked_add_signed(lo).unwrap();
        let new_hi = self.hi().checked_add_signed(hi).unwrap();
        Span::new_of_bounds(new_lo..new_hi)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Message,
    Service,
    Required,
    Optional,
    Deprecated,
    Struct,
    Union,
    Enum,
    Rpc,
    Returns,
    Import,

    Semicolon,
    Comma,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBrack,
    RBrack,
    Equal,
    Pipe,

    Identifier,
    Integer,
    /// `@` followed by digits.
    Ordinal,
    /// Raw string literal, quotes included. Escapes are decoded by the parser.
    String,

    Eof,
    /// A malformed lexeme. Carries the kind the scanner was trying to produce.
    Error(LexError),
}

impl TokenKind {
    pub fn is_error(&self) -> bool {
        matches!(self, TokenKind::Error(_))
    }

    /// Tokens which begin a member or definition, or delimit a body. Error
    /// recovery stops in front of these.
    pub fn is_recovery_stop(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            LBrace
                | RBrace
                | Service
                | Rpc
                | Required
                | Optional
                | Deprecated
                | Message
                | Struct
                | Union
                | Enum
        )
    }
}

/// The token kind the lexer was trying to produce when it found a malformed
/// lexeme.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LexError {
    Integer,
    Ordinal,
    /// Unterminated string literal.
    String,
    /// A `/` which does not start a `//` comment.
    Comment,
    /// A character outside every character class.
    Character,
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "message" => TokenKind::Message,
    "service" => TokenKind::Service,
    "required" => TokenKind::Required,
    "optional" => TokenKind::Optional,
    "deprecated" => TokenKind::Deprecated,
    "struct" => TokenKind::Struct,
    "union" => TokenKind::Union,
    "enum" => TokenKind::Enum,
    "rpc" => TokenKind::Rpc,
    "returns" => TokenKind::Returns,
    "import" => TokenKind::Import,
};
