//! Recursive descent parser for Lucene style query strings.
//!
//! ```text
//! query     := modifier? clause (conjunction? modifier? clause)*
//! clause    := (TERM ':')? ( '(' query ')' ('^' boost)? | term )
//! term      := TERM ('~' distance?)? ('^' boost)?
//!            | QUOTED ('~' slop)? ('^' boost)?
//!            | ('[' | '{') bound TO bound (']' | '}') ('^' boost)?
//! ```

use log::warn;

use super::lexer::{escape, Lexer, Token, TokenKind};
use super::{Clause, Occur, Operator, Query, QueryParseError, Term};
use crate::analysis::{lowercase, Analyzer, UAX29Analyzer};
use crate::config::IndexConfig;
use crate::document::URI_FIELD;

const CLAUSE_START: &[TokenKind] = &[
    TokenKind::Term,
    TokenKind::Quoted,
    TokenKind::LParen,
    TokenKind::LBracket,
    TokenKind::LBrace,
];

const DEFAULT_FUZZY_DISTANCE: u32 = 2;
const MAX_FUZZY_DISTANCE: u32 = 2;

#[derive(Clone, Copy, PartialEq)]
enum Conjunction {
    None,
    And,
    Or,
}

#[derive(Clone, Copy, PartialEq)]
enum Modifier {
    None,
    Required,
    Prohibited,
}

/// Turns query strings into `Query` trees.
///
/// Text terms go through the same analyzer the index uses. A term that
/// analyzes to several tokens becomes a phrase, one that analyzes to nothing
/// is dropped.
#[derive(Clone, Debug)]
pub struct QueryParser {
    default_field: String,
    default_operator: Operator,
    analyzer: Box<dyn Analyzer>,
    keyword_fields: Vec<String>,
}

impl QueryParser {
    pub fn new<F: Into<String>>(default_field: F, analyzer: Box<dyn Analyzer>) -> QueryParser {
        QueryParser {
            default_field: default_field.into(),
            default_operator: Operator::Or,
            analyzer,
            keyword_fields: Vec::new(),
        }
    }

    pub fn for_config(config: &IndexConfig, analyzer: Box<dyn Analyzer>) -> QueryParser {
        QueryParser::new(config.default_field.clone(), analyzer)
            .with_default_operator(config.default_operator)
            .with_keyword_fields(config.keyword_fields.clone())
    }

    pub fn with_default_operator(mut self, operator: Operator) -> QueryParser {
        self.default_operator = operator;
        self
    }

    pub fn with_keyword_fields(mut self, fields: Vec<String>) -> QueryParser {
        self.keyword_fields = fields;
        self
    }

    pub fn parse(&self, input: &str) -> Result<Query, QueryParseError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parse = Parse {
            parser: self,
            tokens,
            pos: 0,
        };
        let query = parse.query(&self.default_field)?;
        parse.expect(TokenKind::Eof)?;
        Ok(query.unwrap_or_else(|| Query::boolean(Vec::new())))
    }

    /// Like `parse`, but on a syntax error searches for the words of the
    /// input taken literally. Never fails; input without any searchable word
    /// gives a query matching nothing.
    pub fn parse_lenient(&self, input: &str) -> Query {
        match self.parse(input) {
            Ok(query) => query,
            Err(e) => {
                warn!("query {:?} does not parse ({}), searching its words instead", input, e);
                let escaped: Vec<String> = input.split_whitespace().map(escape).collect();
                self.parse(&escaped.join(" "))
                    .unwrap_or_else(|_| Query::boolean(Vec::new()))
            }
        }
    }

    fn is_keyword_field(&self, field: &str) -> bool {
        field == URI_FIELD || self.keyword_fields.iter().any(|f| f == field)
    }

    fn text_query(&self, field: &str, text: &str, slop: u32) -> Option<Query> {
        if self.is_keyword_field(field) {
            return Some(Query::term(field, text));
        }
        let mut tokens: Vec<String> = self.analyzer.analyze(text).map(|t| t.into_owned()).collect();
        match tokens.len() {
            0 => None,
            1 => tokens.pop().map(|token| Query::term(field, token)),
            _ => Some(Query::Phrase {
                field: field.to_string(),
                terms: tokens,
                slop,
                boost: 1.0,
            }),
        }
    }

    /// Expanded terms skip analysis and are only lowercased.
    fn expansion_text(&self, field: &str, text: &str) -> String {
        if self.is_keyword_field(field) {
            text.to_string()
        } else {
            lowercase(text).into_owned()
        }
    }
}

impl Default for QueryParser {
    fn default() -> QueryParser {
        QueryParser::new("text", Box::new(UAX29Analyzer))
    }
}

struct Parse<'p> {
    parser: &'p QueryParser,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'p> Parse<'p> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: &[TokenKind]) -> QueryParseError {
        let token = self.peek();
        let last_token = match self.pos {
            0 => None,
            pos => self.tokens.get(pos - 1).map(|t| match t.kind {
                TokenKind::Term | TokenKind::Quoted => t.text.clone(),
                kind => kind.to_string(),
            }),
        };
        QueryParseError {
            last_token,
            expected: expected.to_vec(),
            line: token.line,
            column: token.column,
            message: format!("unexpected {}", token.kind),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, QueryParseError> {
        if self.peek_kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.error(&[kind]))
        }
    }

    /// A number directly attached to the previous token, as in `~2` or `^3`.
    fn attached_number(&mut self) -> Option<Token> {
        let prev = &self.tokens[self.pos - 1];
        let (line, column) = (prev.line, prev.column);
        let next = self.peek();
        let attached = next.kind == TokenKind::Term
            && next.line == line
            && next.column == column + 1
            && next.text.parse::<f32>().is_ok();
        if attached {
            Some(self.bump())
        } else {
            None
        }
    }

    fn query(&mut self, field: &str) -> Result<Option<Query>, QueryParseError> {
        let mut clauses = Vec::new();
        let modifier = self.modifier();
        let first = self.clause(field)?;
        let bare = modifier == Modifier::None;
        let single = if bare { first.clone() } else { None };
        self.add_clause(&mut clauses, Conjunction::None, modifier, first);
        let mut count = 1;
        loop {
            match self.peek_kind() {
                TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Term
                | TokenKind::Quoted
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace => (),
                _ => break,
            }
            let conjunction = self.conjunction();
            let modifier = self.modifier();
            let query = self.clause(field)?;
            self.add_clause(&mut clauses, conjunction, modifier, query);
            count += 1;
        }
        if count == 1 && bare {
            return Ok(single);
        }
        match clauses.len() {
            0 => Ok(None),
            1 if clauses[0].occur == Occur::Should => Ok(clauses.pop().map(|c| c.query)),
            _ => Ok(Some(Query::boolean(clauses))),
        }
    }

    fn conjunction(&mut self) -> Conjunction {
        match self.peek_kind() {
            TokenKind::And => {
                self.bump();
                Conjunction::And
            }
            TokenKind::Or => {
                self.bump();
                Conjunction::Or
            }
            _ => Conjunction::None,
        }
    }

    fn modifier(&mut self) -> Modifier {
        match self.peek_kind() {
            TokenKind::Plus => {
                self.bump();
                Modifier::Required
            }
            TokenKind::Minus | TokenKind::Not => {
                self.bump();
                Modifier::Prohibited
            }
            _ => Modifier::None,
        }
    }

    fn add_clause(
        &self,
        clauses: &mut Vec<Clause>,
        conjunction: Conjunction,
        modifier: Modifier,
        query: Option<Query>,
    ) {
        let operator = self.parser.default_operator;
        // `a AND b` makes `a` required, `a OR b` under the AND operator
        // makes it optional.
        if let Some(last) = clauses.last_mut() {
            if last.occur != Occur::MustNot {
                if conjunction == Conjunction::And {
                    last.occur = Occur::Must;
                } else if operator == Operator::And && conjunction == Conjunction::Or {
                    last.occur = Occur::Should;
                }
            }
        }
        let query = match query {
            Some(query) => query,
            None => return,
        };
        let prohibited = modifier == Modifier::Prohibited;
        let required = match operator {
            Operator::Or => {
                modifier == Modifier::Required || (conjunction == Conjunction::And && !prohibited)
            }
            Operator::And => !prohibited && conjunction != Conjunction::Or,
        };
        let occur = if prohibited {
            Occur::MustNot
        } else if required {
            Occur::Must
        } else {
            Occur::Should
        };
        clauses.push(Clause { occur, query });
    }

    fn clause(&mut self, field: &str) -> Result<Option<Query>, QueryParseError> {
        let mut field = field.to_string();
        let fielded = self.peek_kind() == TokenKind::Term
            && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::Colon);
        if fielded {
            let name = self.bump();
            self.bump();
            if name.text == "*" && self.peek().text == "*" && self.peek_kind() == TokenKind::Term {
                self.bump();
                let boost = self.boost()?;
                return Ok(Some(Query::MatchAll { boost }));
            }
            field = name.text;
        }
        match self.peek_kind() {
            TokenKind::LParen => {
                self.bump();
                let query = self.query(&field)?;
                self.expect(TokenKind::RParen)?;
                let boost = self.boost()?;
                Ok(query.map(|q| boosted(q, boost)))
            }
            TokenKind::Term => self.term(&field),
            TokenKind::Quoted => self.phrase(&field),
            TokenKind::LBracket | TokenKind::LBrace => self.range(&field),
            _ => Err(self.error(CLAUSE_START)),
        }
    }

    fn boost(&mut self) -> Result<f32, QueryParseError> {
        if self.peek_kind() != TokenKind::Caret {
            return Ok(1.0);
        }
        self.bump();
        let token = self.expect(TokenKind::Term)?;
        token.text.parse::<f32>().map_err(|_| QueryParseError {
            last_token: Some(token.text.clone()),
            expected: Vec::new(),
            line: token.line,
            column: token.column,
            message: format!("invalid boost {:?}", token.text),
        })
    }

    fn term(&mut self, field: &str) -> Result<Option<Query>, QueryParseError> {
        let token = self.bump();
        let mut fuzzy = None;
        if self.peek_kind() == TokenKind::Tilde {
            self.bump();
            fuzzy = Some(self.fuzzy_distance(&token.text)?);
        }
        let boost = self.boost()?;
        let parser = self.parser;
        let query = if let Some(distance) = fuzzy {
            Some(Query::Fuzzy {
                term: Term::new(field, parser.expansion_text(field, &token.text)),
                distance,
                boost: 1.0,
            })
        } else if token.wildcard {
            let text = parser.expansion_text(field, &token.text);
            let prefix_len = text.len() - 1;
            if text.ends_with('*') && !text[..prefix_len].contains(|c| c == '*' || c == '?') {
                Some(Query::Prefix {
                    term: Term::new(field, &text[..prefix_len]),
                    boost: 1.0,
                })
            } else {
                Some(Query::Wildcard {
                    term: Term::new(field, text),
                    boost: 1.0,
                })
            }
        } else {
            parser.text_query(field, &token.text, 0)
        };
        Ok(query.map(|q| boosted(q, boost)))
    }

    /// `~N` is an edit distance, `~0.N` a minimum similarity scaled by the
    /// term length. Both are capped at two edits.
    fn fuzzy_distance(&mut self, text: &str) -> Result<u32, QueryParseError> {
        let token = match self.attached_number() {
            Some(token) => token,
            None => return Ok(DEFAULT_FUZZY_DISTANCE),
        };
        let distance = if let Ok(n) = token.text.parse::<u32>() {
            n
        } else {
            match token.text.parse::<f32>() {
                Ok(similarity) if (0.0..1.0).contains(&similarity) => {
                    ((1.0 - similarity) * text.chars().count() as f32) as u32
                }
                _ => {
                    return Err(QueryParseError {
                        last_token: Some(token.text.clone()),
                        expected: Vec::new(),
                        line: token.line,
                        column: token.column,
                        message: format!("invalid fuzzy distance {:?}", token.text),
                    })
                }
            }
        };
        Ok(distance.min(MAX_FUZZY_DISTANCE))
    }

    fn phrase(&mut self, field: &str) -> Result<Option<Query>, QueryParseError> {
        let token = self.bump();
        let mut slop = 0;
        if self.peek_kind() == TokenKind::Tilde {
            self.bump();
            if let Some(n) = self.attached_number().and_then(|n| n.text.parse::<f32>().ok()) {
                slop = n as u32;
            }
        }
        let boost = self.boost()?;
        let query = self.parser.text_query(field, &token.text, slop);
        Ok(query.map(|q| boosted(q, boost)))
    }

    fn range(&mut self, field: &str) -> Result<Option<Query>, QueryParseError> {
        let include_lower = self.bump().kind == TokenKind::LBracket;
        let lower = self.bound(field)?;
        self.expect(TokenKind::To)?;
        let upper = self.bound(field)?;
        let include_upper = match self.peek_kind() {
            TokenKind::RBracket => true,
            TokenKind::RBrace => false,
            _ => return Err(self.error(&[TokenKind::RBracket, TokenKind::RBrace])),
        };
        self.bump();
        let boost = self.boost()?;
        Ok(Some(Query::Range {
            field: field.to_string(),
            lower,
            upper,
            include_lower,
            include_upper,
            boost,
        }))
    }

    fn bound(&mut self, field: &str) -> Result<Option<String>, QueryParseError> {
        match self.peek_kind() {
            TokenKind::Term => {
                let token = self.bump();
                if token.wildcard && token.text == "*" {
                    Ok(None)
                } else {
                    Ok(Some(self.parser.expansion_text(field, &token.text)))
                }
            }
            TokenKind::Quoted => {
                let token = self.bump();
                Ok(Some(self.parser.expansion_text(field, &token.text)))
            }
            _ => Err(self.error(&[TokenKind::Term, TokenKind::Quoted])),
        }
    }
}

fn boosted(query: Query, boost: f32) -> Query {
    if (boost - 1.0).abs() > std::f32::EPSILON {
        query.with_boost(boost)
    } else {
        query
    }
}
