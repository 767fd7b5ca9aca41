use std::fmt;

use serde::{Deserialize, Serialize};

use super::QueryParseError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Term,
    Quoted,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Caret,
    Tilde,
    Plus,
    Minus,
    Not,
    And,
    Or,
    To,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TokenKind::Term => "TERM",
            TokenKind::Quoted => "QUOTED",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBracket => "LBRACKET",
            TokenKind::RBracket => "RBRACKET",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::Colon => "COLON",
            TokenKind::Caret => "CARET",
            TokenKind::Tilde => "TILDE",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Not => "NOT",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::To => "TO",
            TokenKind::Eof => "EOF",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Unescaped text; empty for punctuation.
    pub text: String,
    pub line: usize,
    pub column: usize,
    /// Contains an unescaped `*` or `?`.
    pub wildcard: bool,
}

/// Characters with a meaning in the query syntax.
fn is_special(c: char) -> bool {
    match c {
        '+' | '-' | '!' | '(' | ')' | ':' | '^' | '[' | ']' | '"' | '{' | '}' | '~' | '\\' => true,
        _ => false,
    }
}

fn ends_term(c: char) -> bool {
    c.is_whitespace() || (is_special(c) && c != '+' && c != '-' && c != '\\')
}

/// Escapes `text` so it parses as one literal term.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    if keyword(text).is_some() {
        out.push('\\');
    }
    for c in text.chars() {
        if is_special(c) || c.is_whitespace() || c == '*' || c == '?' || c == '&' || c == '|' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn keyword(text: &str) -> Option<TokenKind> {
    match text {
        "AND" => Some(TokenKind::And),
        "OR" => Some(TokenKind::Or),
        "NOT" => Some(TokenKind::Not),
        "TO" => Some(TokenKind::To),
        _ => None,
    }
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// The whole input, ending with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, QueryParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if eof {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: &str) -> QueryParseError {
        QueryParseError {
            last_token: None,
            expected: Vec::new(),
            line,
            column,
            message: message.to_string(),
        }
    }

    fn next_token(&mut self) -> Result<Token, QueryParseError> {
        while self.chars.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.bump();
        }
        let (line, column) = (self.line, self.column);
        let punct = |kind| Token {
            kind,
            text: String::new(),
            line,
            column,
            wildcard: false,
        };
        let c = match self.chars.peek() {
            Some(c) => *c,
            None => return Ok(punct(TokenKind::Eof)),
        };
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ':' => TokenKind::Colon,
            '^' => TokenKind::Caret,
            '~' => TokenKind::Tilde,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '!' => TokenKind::Not,
            '"' => return self.quoted(line, column),
            '&' | '|' => {
                self.bump();
                if self.chars.peek() == Some(&c) {
                    self.bump();
                    let kind = if c == '&' { TokenKind::And } else { TokenKind::Or };
                    return Ok(punct(kind));
                }
                return self.term(c.to_string(), line, column);
            }
            _ => return self.term(String::new(), line, column),
        };
        self.bump();
        Ok(punct(kind))
    }

    fn quoted(&mut self, line: usize, column: usize) -> Result<Token, QueryParseError> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some(c) => text.push(c),
                    None => return Err(self.error(line, column, "unterminated quoted phrase")),
                },
                Some(c) => text.push(c),
                None => return Err(self.error(line, column, "unterminated quoted phrase")),
            }
        }
        Ok(Token {
            kind: TokenKind::Quoted,
            text,
            line,
            column,
            wildcard: false,
        })
    }

    fn term(&mut self, mut text: String, line: usize, column: usize) -> Result<Token, QueryParseError> {
        let mut wildcard = false;
        let mut escaped = false;
        while let Some(&c) = self.chars.peek() {
            if c == '\\' {
                self.bump();
                match self.bump() {
                    Some(c) => text.push(c),
                    None => {
                        return Err(self.error(self.line, self.column, "escape at end of input"))
                    }
                }
                escaped = true;
                continue;
            }
            if ends_term(c) {
                break;
            }
            wildcard |= c == '*' || c == '?';
            text.push(c);
            self.bump();
        }
        let kind = match keyword(&text) {
            Some(kind) if !escaped => kind,
            _ => TokenKind::Term,
        };
        Ok(Token {
            kind,
            text,
            line,
            column,
            wildcard,
        })
    }
}
