use log::trace;
use std::{
    fmt::{self, Display, Formatter},
    ops::Range,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Illegal,
    EOF,

    Identifier,
    Int,
    Float,
    String,

    Assign,
    Plus,
    Minus,
    Bang,
    Asterisk,
    Slash,
    Percent,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,
    Arrow,
    Pipeline,

    Comma,
    Colon,
    Question,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftSquare,
    RightSquare,

    Proc,
    Cons,
    Supp,
    ESupp,
    If,
    Then,
    Else,
    For,
    In,
    Match,
    Is,
    Default,
    Fail,
    True,
    False,
    Nil,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Proc
                | TokenKind::Cons
                | TokenKind::Supp
                | TokenKind::ESupp
                | TokenKind::If
                | TokenKind::Then
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::In
                | TokenKind::Match
                | TokenKind::Is
                | TokenKind::Default
                | TokenKind::Fail
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
        )
    }

    pub fn is_literal(self) -> bool {
        matches!(self, TokenKind::Int | TokenKind::Float | TokenKind::String)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::EOF => "EOF",
            TokenKind::Identifier => "IDENT",
            TokenKind::Int => "INT",
            TokenKind::Float => "FLOAT",
            TokenKind::String => "STRING",
            TokenKind::Assign => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Bang => "!",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::LessEqual => "<=",
            TokenKind::GreaterEqual => ">=",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Arrow => "->",
            TokenKind::Pipeline => "|>",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Question => "?",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftSquare => "[",
            TokenKind::RightSquare => "]",
            TokenKind::Proc => "PROC",
            TokenKind::Cons => "CONS",
            TokenKind::Supp => "SUPP",
            TokenKind::ESupp => "ESUPP",
            TokenKind::If => "IF",
            TokenKind::Then => "THEN",
            TokenKind::Else => "ELSE",
            TokenKind::For => "FOR",
            TokenKind::In => "IN",
            TokenKind::Match => "MATCH",
            TokenKind::Is => "IS",
            TokenKind::Default => "DEFAULT",
            TokenKind::Fail => "FAIL",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::Nil => "NIL",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub span: Range<usize>,
}

impl Token {
    fn new(kind: TokenKind, literal: impl Into<String>, span: Range<usize>) -> Self {
        Token {
            kind,
            literal: literal.into(),
            span,
        }
    }
}

/// Keyword or identifier, decided by the fixed keyword table.
pub fn lookup_identifier(word: &[u8]) -> TokenKind {
    match word {
        b"proc" => TokenKind::Proc,
        b"cons" => TokenKind::Cons,
        b"supp" => TokenKind::Supp,
        b"esupp" => TokenKind::ESupp,
        b"if" => TokenKind::If,
        b"then" => TokenKind::Then,
        b"else" => TokenKind::Else,
        b"for" => TokenKind::For,
        b"in" => TokenKind::In,
        b"match" => TokenKind::Match,
        b"is" => TokenKind::Is,
        b"default" => TokenKind::Default,
        b"fail" => TokenKind::Fail,
        b"true" => TokenKind::True,
        b"false" => TokenKind::False,
        b"nil" => TokenKind::Nil,
        _ => TokenKind::Identifier,
    }
}

/// Lazy token stream over an immutable source buffer.
pub struct Lexer<'a> {
    source: &'a str,
    cursor: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            cursor: 0,
            done: false,
        }
    }

    /// Returns the next token; once the input is exhausted every call yields `EOF`.
    pub fn next_token(&mut self) -> Token {
        let bytes = self.source.as_bytes();
        let n = bytes.len();

        while self.cursor < n && bytes[self.cursor].is_ascii_whitespace() {
            self.cursor += 1;
        }

        let start = self.cursor;
        if start >= n {
            return Token::new(TokenKind::EOF, "", n..n);
        }

        if start + 1 < n {
            let kind = match &bytes[start..start + 2] {
                b"->" => Some(TokenKind::Arrow),
                b"|>" => Some(TokenKind::Pipeline),
                b"==" => Some(TokenKind::EqualEqual),
                b"!=" => Some(TokenKind::BangEqual),
                b"<=" => Some(TokenKind::LessEqual),
                b">=" => Some(TokenKind::GreaterEqual),
                _ => None,
            };

            if let Some(kind) = kind {
                return self.emit(kind, start, start + 2);
            }
        }

        let kind = match bytes[start] {
            b'=' => Some(TokenKind::Assign),
            b'+' => Some(TokenKind::Plus),
            b'-' => Some(TokenKind::Minus),
            b'!' => Some(TokenKind::Bang),
            b'*' => Some(TokenKind::Asterisk),
            b'/' => Some(TokenKind::Slash),
            b'%' => Some(TokenKind::Percent),
            b'<' => Some(TokenKind::Less),
            b'>' => Some(TokenKind::Greater),
            b',' => Some(TokenKind::Comma),
            b':' => Some(TokenKind::Colon),
            b'?' => Some(TokenKind::Question),
            b'(' => Some(TokenKind::LeftParen),
            b')' => Some(TokenKind::RightParen),
            b'{' => Some(TokenKind::LeftBrace),
            b'}' => Some(TokenKind::RightBrace),
            b'[' => Some(TokenKind::LeftSquare),
            b']' => Some(TokenKind::RightSquare),
            _ => None,
        };

        if let Some(kind) = kind {
            return self.emit(kind, start, start + 1);
        }

        if bytes[start] == b'"' {
            return self.read_string(start);
        }

        if bytes[start].is_ascii_digit() {
            let mut end = start;
            while end < n && bytes[end].is_ascii_digit() {
                end += 1;
            }

            if end + 1 < n && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
                end += 1;
                while end < n && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                return self.emit(TokenKind::Float, start, end);
            }

            return self.emit(TokenKind::Int, start, end);
        }

        if bytes[start].is_ascii_alphabetic() || bytes[start] == b'_' {
            let mut end = start + 1;
            while end < n && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                end += 1;
            }

            return self.emit(lookup_identifier(&bytes[start..end]), start, end);
        }

        let width = self.source[start..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        trace!("illegal character at byte {}", start);
        self.emit(TokenKind::Illegal, start, start + width)
    }

    fn emit(&mut self, kind: TokenKind, start: usize, end: usize) -> Token {
        self.cursor = end;
        Token::new(kind, &self.source[start..end], start..end)
    }

    fn read_string(&mut self, start: usize) -> Token {
        let bytes = self.source.as_bytes();
        let n = bytes.len();
        let mut end = start + 1;
        let mut escaped = false;

        while end < n && (escaped || bytes[end] != b'"') {
            escaped = !escaped && bytes[end] == b'\\';
            end += 1;
        }

        if end >= n {
            trace!("unterminated string starting at byte {}", start);
            return self.emit(TokenKind::Illegal, start, n);
        }

        let quoted = &self.source[start..end + 1];
        self.cursor = end + 1;

        match snailquote::unescape(quoted) {
            Ok(text) => Token::new(TokenKind::String, text, start..end + 1),
            Err(err) => {
                trace!("bad string escape at byte {}: {:?}", start, err);
                Token::new(TokenKind::Illegal, quoted, start..end + 1)
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }

        let token = self.next_token();
        if token.kind == TokenKind::EOF {
            self.done = true;
            None
        } else {
            Some(token)
        }
    }
}

/// Collects every token of `source`, excluding the trailing `EOF`.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}
