//! Query clause trees and the query string parser.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod lexer;
mod parser;

pub use self::lexer::{escape, TokenKind};
pub use self::parser::QueryParser;

/// A token of a field.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new<F: Into<String>, T: Into<String>>(field: F, text: T) -> Term {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.field, escape(&self.text))
    }
}

/// How adjacent clauses without `AND`/`OR` are combined.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Or,
    And,
}

impl Default for Operator {
    fn default() -> Operator {
        Operator::Or
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Clause {
    pub occur: Occur,
    pub query: Query,
}

impl Clause {
    pub fn must(query: Query) -> Clause {
        Clause {
            occur: Occur::Must,
            query,
        }
    }

    pub fn should(query: Query) -> Clause {
        Clause {
            occur: Occur::Should,
            query,
        }
    }

    pub fn must_not(query: Query) -> Clause {
        Clause {
            occur: Occur::MustNot,
            query,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Query {
    Term {
        term: Term,
        boost: f32,
    },
    /// Terms at consecutive positions, allowing `slop` moves in total.
    Phrase {
        field: String,
        terms: Vec<String>,
        slop: u32,
        boost: f32,
    },
    /// Open ends are `None`.
    Range {
        field: String,
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
        boost: f32,
    },
    Prefix {
        term: Term,
        boost: f32,
    },
    /// `*` matches any run of characters, `?` a single one.
    Wildcard {
        term: Term,
        boost: f32,
    },
    Fuzzy {
        term: Term,
        distance: u32,
        boost: f32,
    },
    Boolean {
        clauses: Vec<Clause>,
        boost: f32,
    },
    MatchAll {
        boost: f32,
    },
}

impl Query {
    pub fn term<F: Into<String>, T: Into<String>>(field: F, text: T) -> Query {
        Query::Term {
            term: Term::new(field, text),
            boost: 1.0,
        }
    }

    pub fn phrase<F: Into<String>>(field: F, terms: &[&str], slop: u32) -> Query {
        Query::Phrase {
            field: field.into(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            slop,
            boost: 1.0,
        }
    }

    pub fn boolean(clauses: Vec<Clause>) -> Query {
        Query::Boolean {
            clauses,
            boost: 1.0,
        }
    }

    pub fn boost(&self) -> f32 {
        match *self {
            Query::Term { boost, .. }
            | Query::Phrase { boost, .. }
            | Query::Range { boost, .. }
            | Query::Prefix { boost, .. }
            | Query::Wildcard { boost, .. }
            | Query::Fuzzy { boost, .. }
            | Query::Boolean { boost, .. }
            | Query::MatchAll { boost } => boost,
        }
    }

    pub fn with_boost(mut self, value: f32) -> Query {
        match self {
            Query::Term { ref mut boost, .. }
            | Query::Phrase { ref mut boost, .. }
            | Query::Range { ref mut boost, .. }
            | Query::Prefix { ref mut boost, .. }
            | Query::Wildcard { ref mut boost, .. }
            | Query::Fuzzy { ref mut boost, .. }
            | Query::Boolean { ref mut boost, .. }
            | Query::MatchAll { ref mut boost } => *boost = value,
        }
        self
    }
}

fn write_boost(f: &mut fmt::Formatter, boost: f32) -> fmt::Result {
    if (boost - 1.0).abs() > std::f32::EPSILON {
        write!(f, "^{}", boost)?;
    }
    Ok(())
}

fn write_bound(f: &mut fmt::Formatter, bound: &Option<String>) -> fmt::Result {
    match bound {
        Some(ref text) => write!(f, "{}", escape(text)),
        None => write!(f, "*"),
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Query::Term { term, boost } => {
                write!(f, "{}", term)?;
                write_boost(f, *boost)
            }
            Query::Phrase {
                field,
                terms,
                slop,
                boost,
            } => {
                let text: Vec<String> = terms.iter().map(|t| t.replace('"', "\\\"")).collect();
                write!(f, "{}:\"{}\"", field, text.join(" "))?;
                if *slop > 0 {
                    write!(f, "~{}", slop)?;
                }
                write_boost(f, *boost)
            }
            Query::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
                boost,
            } => {
                write!(f, "{}:{}", field, if *include_lower { '[' } else { '{' })?;
                write_bound(f, lower)?;
                write!(f, " TO ")?;
                write_bound(f, upper)?;
                write!(f, "{}", if *include_upper { ']' } else { '}' })?;
                write_boost(f, *boost)
            }
            Query::Prefix { term, boost } => {
                write!(f, "{}*", term)?;
                write_boost(f, *boost)
            }
            Query::Wildcard { term, boost } => {
                write!(f, "{}:{}", term.field, term.text)?;
                write_boost(f, *boost)
            }
            Query::Fuzzy {
                term,
                distance,
                boost,
            } => {
                write!(f, "{}~{}", term, distance)?;
                write_boost(f, *boost)
            }
            Query::Boolean { clauses, boost } => {
                let nested = (*boost - 1.0).abs() > std::f32::EPSILON;
                if nested {
                    write!(f, "(")?;
                }
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match clause.occur {
                        Occur::Must => write!(f, "+")?,
                        Occur::MustNot => write!(f, "-")?,
                        Occur::Should => (),
                    }
                    match clause.query {
                        Query::Boolean { .. } => write!(f, "({})", clause.query)?,
                        ref query => write!(f, "{}", query)?,
                    }
                }
                if nested {
                    write!(f, ")")?;
                }
                write_boost(f, *boost)
            }
            Query::MatchAll { boost } => {
                write!(f, "*:*")?;
                write_boost(f, *boost)
            }
        }
    }
}

/// A malformed query string.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} at line {line} column {column}", describe(.expected, .message))]
pub struct QueryParseError {
    /// Text of the last token consumed before the error.
    pub last_token: Option<String>,
    /// Token kinds that would have been accepted.
    pub expected: Vec<TokenKind>,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

fn describe(expected: &[TokenKind], message: &str) -> String {
    if expected.is_empty() {
        return message.to_string();
    }
    let kinds: Vec<String> = expected.iter().map(|k| k.to_string()).collect();
    format!("expected one of: {}", kinds.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_lucene_syntax() {
        let query = Query::boolean(vec![
            Clause::must(Query::term("title", "rust")),
            Clause::must_not(Query::phrase("body", &["hello", "world"], 2)),
            Clause::should(Query::term("uri", "file:///a b").with_boost(2.0)),
        ]);
        assert_eq!(
            "+title:rust -body:\"hello world\"~2 uri:file\\:///a\\ b^2",
            query.to_string()
        );
        let range = Query::Range {
            field: "size".to_string(),
            lower: None,
            upper: Some("5".to_string()),
            include_lower: true,
            include_upper: false,
            boost: 1.0,
        };
        assert_eq!("size:[* TO 5}", range.to_string());
    }

    #[test]
    fn parse_error_lists_expected_kinds() {
        let error = QueryParseError {
            last_token: Some("AND".to_string()),
            expected: vec![TokenKind::Term, TokenKind::Quoted, TokenKind::LParen],
            line: 1,
            column: 14,
            message: "unexpected EOF".to_string(),
        };
        assert_eq!(
            "expected one of: TERM, QUOTED, LPAREN at line 1 column 14",
            error.to_string()
        );
    }

    #[test]
    fn operator_from_json() {
        let op: Operator = serde_json::from_str("\"and\"").unwrap();
        assert_eq!(Operator::And, op);
    }
}
