use core::fmt;

pub use logos::Span;
use logos::{Lexer, Logos};

fn unterminated_string(_: &mut Lexer<TokenKind>) -> Result<(), LexerError> {
    Err(LexerError::UnterminatedString)
}

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexerError {
    #[default]
    #[error("Unexpected character.")]
    UnexpectedCharacter,
    #[error("Unterminated string.")]
    UnterminatedString,
}

/// Lexical categories of Lox.
///
/// `Error` and `Eof` are never produced by logos itself, the [`Scanner`]
/// synthesizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Logos)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token(";")]
    Semicolon,
    #[token("/")]
    Slash,
    #[token("*")]
    Star,

    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,

    #[regex("[a-zA-Z_][a-zA-Z0-9_]*")]
    Identifier,
    // Lox strings have no escapes and may span lines
    #[regex(r#""[^"]*""#)]
    #[regex(r#""[^"]*"#, unterminated_string)]
    String,
    #[regex(r"[0-9]+")]
    #[regex(r"[0-9]+\.[0-9]+")]
    Number,

    #[token("and")]
    And,
    #[token("class")]
    Class,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("fun")]
    Fun,
    #[token("if")]
    If,
    #[token("nil")]
    Nil,
    #[token("or")]
    Or,
    #[token("print")]
    Print,
    #[token("return")]
    Return,
    #[token("super")]
    Super,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    Error,
    Eof,
}

impl TokenKind {
    /// The upper-case name used in token dumps, e.g. `LEFT_PAREN`.
    pub fn name(self) -> &'static str {
        match self {
            Self::LeftParen => "LEFT_PAREN",
            Self::RightParen => "RIGHT_PAREN",
            Self::LeftBrace => "LEFT_BRACE",
            Self::RightBrace => "RIGHT_BRACE",
            Self::Comma => "COMMA",
            Self::Dot => "DOT",
            Self::Minus => "MINUS",
            Self::Plus => "PLUS",
            Self::Semicolon => "SEMICOLON",
            Self::Slash => "SLASH",
            Self::Star => "STAR",
            Self::Bang => "BANG",
            Self::BangEqual => "BANG_EQUAL",
            Self::Equal => "EQUAL",
            Self::EqualEqual => "EQUAL_EQUAL",
            Self::Greater => "GREATER",
            Self::GreaterEqual => "GREATER_EQUAL",
            Self::Less => "LESS",
            Self::LessEqual => "LESS_EQUAL",
            Self::Identifier => "IDENTIFIER",
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::And => "AND",
            Self::Class => "CLASS",
            Self::Else => "ELSE",
            Self::False => "FALSE",
            Self::For => "FOR",
            Self::Fun => "FUN",
            Self::If => "IF",
            Self::Nil => "NIL",
            Self::Or => "OR",
            Self::Print => "PRINT",
            Self::Return => "RETURN",
            Self::Super => "SUPER",
            Self::This => "THIS",
            Self::True => "TRUE",
            Self::Var => "VAR",
            Self::While => "WHILE",
            Self::Error => "ERROR",
            Self::Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tokens borrow their lexeme from the source they were scanned from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub lexeme: &'src str,
    pub span: Span,
    /// 1-based line the token ends on
    pub line: u32,
    /// Only set for [`TokenKind::Error`]
    pub error: Option<LexerError>,
}

impl<'src> Token<'src> {
    /// A token that exists only to seed the parser before the first `advance`.
    pub(crate) fn synthetic(line: u32) -> Self {
        Self {
            kind: TokenKind::Eof,
            lexeme: "",
            span: 0..0,
            line,
            error: None,
        }
    }
}

/// Pulls tokens out of the source one at a time, tracking line numbers.
///
/// Once the input is exhausted every call yields an `Eof` token.
pub struct Scanner<'src> {
    source: &'src str,
    lexer: Lexer<'src, TokenKind>,
    line: u32,
    // end of the last span whose newlines were counted
    counted: usize,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            lexer: TokenKind::lexer(source),
            line: 1,
            counted: 0,
        }
    }

    fn advance_line(&mut self, to: usize) {
        let newlines = self.source[self.counted..to]
            .bytes()
            .filter(|b| *b == b'\n')
            .count();
        self.line += u32::try_from(newlines).unwrap_or(u32::MAX);
        self.counted = to;
    }

    pub fn next_token(&mut self) -> Token<'src> {
        match self.lexer.next() {
            Some(result) => {
                let span = self.lexer.span();
                self.advance_line(span.end);
                let lexeme = &self.source[span.clone()];
                match result {
                    Ok(kind) => Token {
                        kind,
                        lexeme,
                        span,
                        line: self.line,
                        error: None,
                    },
                    Err(err) => Token {
                        kind: TokenKind::Error,
                        lexeme,
                        span,
                        line: self.line,
                        error: Some(err),
                    },
                }
            }
            None => {
                let end = self.source.len();
                self.advance_line(end);
                Token {
                    kind: TokenKind::Eof,
                    lexeme: "",
                    span: end..end,
                    line: self.line,
                    error: None,
                }
            }
        }
    }
}

impl<'src> Iterator for Scanner<'src> {
    type Item = Token<'src>;

    /// Like [`Scanner::next_token`], but stops instead of yielding `Eof`.
    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        (token.kind != TokenKind::Eof).then_some(token)
    }
}
