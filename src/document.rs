use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::Analyzer;
use crate::query::Term;

/// Every document carries its uri in this keyword field.
pub const URI_FIELD: &str = "uri";

const DATE_FORMAT: &str = "%Y%m%d%H%M%S";
const DATE_WIDTH: usize = 14;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Kept in the stored fields only.
    Stored,
    /// Tokenized by the analyzer.
    Text,
    /// Indexed as a single untouched token.
    Keyword,
    Date,
    Number,
}

impl FieldKind {
    pub fn is_indexed(self) -> bool {
        self != FieldKind::Stored
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bytes(Vec<u8>),
    Date(DateTime<Utc>),
    Number(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(ref s) => Some(s),
            _ => None,
        }
    }

    /// The single token a non-tokenized value is indexed as.
    pub fn keyword_token(&self) -> Cow<str> {
        match self {
            FieldValue::Text(ref s) => Cow::Borrowed(s),
            FieldValue::Bytes(ref b) => String::from_utf8_lossy(b),
            FieldValue::Date(ref d) => Cow::Owned(encode_date(d)),
            FieldValue::Number(n) => Cow::Owned(encode_number(*n)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub kind: FieldKind,
    pub stored: bool,
}

impl Field {
    pub fn tokens<'a>(&'a self, analyzer: &dyn Analyzer) -> Vec<Cow<'a, str>> {
        match self.kind {
            FieldKind::Stored => Vec::new(),
            FieldKind::Text => match self.value {
                FieldValue::Text(ref s) => analyzer.analyze(s).collect(),
                ref other => vec![other.keyword_token()],
            },
            FieldKind::Keyword | FieldKind::Date | FieldKind::Number => {
                vec![self.value.keyword_token()]
            }
        }
    }
}

/// An ordered bag of typed fields plus the reserved uri.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    uri: String,
    fields: Vec<Field>,
}

impl Document {
    pub fn new<U: Into<String>>(uri: U) -> Document {
        Document {
            uri: uri.into(),
            fields: Vec::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn add_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    fn with<N: Into<String>>(self, name: N, value: FieldValue, kind: FieldKind, stored: bool) -> Self {
        self.add_field(Field {
            name: name.into(),
            value,
            kind,
            stored,
        })
    }

    /// Tokenized and stored.
    pub fn text<N: Into<String>, V: Into<String>>(self, name: N, value: V) -> Self {
        self.with(name, FieldValue::Text(value.into()), FieldKind::Text, true)
    }

    /// Tokenized, not stored. Used for extracted body text.
    pub fn unstored_text<N: Into<String>, V: Into<String>>(self, name: N, value: V) -> Self {
        self.with(name, FieldValue::Text(value.into()), FieldKind::Text, false)
    }

    pub fn keyword<N: Into<String>, V: Into<String>>(self, name: N, value: V) -> Self {
        self.with(name, FieldValue::Text(value.into()), FieldKind::Keyword, true)
    }

    pub fn date<N: Into<String>>(self, name: N, value: DateTime<Utc>) -> Self {
        self.with(name, FieldValue::Date(value), FieldKind::Date, true)
    }

    pub fn number<N: Into<String>>(self, name: N, value: i64) -> Self {
        self.with(name, FieldValue::Number(value), FieldKind::Number, true)
    }

    pub fn stored<N: Into<String>>(self, name: N, value: FieldValue) -> Self {
        self.with(name, value, FieldKind::Stored, true)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Whether indexing this document would produce `term`.
    pub fn contains_term(&self, term: &Term, analyzer: &dyn Analyzer) -> bool {
        if term.field == URI_FIELD {
            return self.uri == term.text;
        }
        self.fields
            .iter()
            .filter(|f| f.name == term.field)
            .any(|f| f.tokens(analyzer).iter().any(|t| *t == term.text))
    }

    pub fn to_stored(&self) -> StoredDocument {
        StoredDocument {
            uri: self.uri.clone(),
            fields: self
                .fields
                .iter()
                .filter(|f| f.stored)
                .map(|f| (f.name.clone(), f.value.clone()))
                .collect(),
        }
    }
}

/// The stored part of a document as read back from a segment.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredDocument {
    pub uri: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl StoredDocument {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.0 == name).map(|f| &f.1)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields.iter().filter(move |f| f.0 == name).map(|f| &f.1)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }
}

pub fn encode_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Sign bit flipped so the hex strings sort like the numbers.
pub fn encode_number(n: i64) -> String {
    format!("{:016x}", (n as u64) ^ (1u64 << 63))
}

pub fn decode_number(s: &str) -> Option<i64> {
    if s.len() != 16 {
        return None;
    }
    u64::from_str_radix(s, 16)
        .ok()
        .map(|v| (v ^ (1u64 << 63)) as i64)
}

/// Whether `text` names a period coarser than a second, like `2024` or
/// `2024-03-01`.
pub fn is_partial_date(text: &str) -> bool {
    let digits = text.chars().filter(char::is_ascii_digit).count();
    digits > 0
        && digits < DATE_WIDTH
        && text.chars().all(|c| c.is_ascii_digit() || "-:T ".contains(c))
}

/// Turns a user supplied date like `2024-03` into a bound comparable with
/// encoded dates. Missing digits become the lowest or highest value.
pub fn normalize_date_bound(bound: &str, upper: bool) -> String {
    let mut digits: String = bound.chars().filter(char::is_ascii_digit).collect();
    digits.truncate(DATE_WIDTH);
    let fill = if upper { '9' } else { '0' };
    while digits.len() < DATE_WIDTH {
        digits.push(fill);
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::UAX29Analyzer;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn dates_encode_in_utc_order() {
        let d = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
        assert_eq!("20060102150405", encode_date(&d));
    }

    #[test]
    fn date_bounds_are_padded() {
        assert_eq!("20240300000000", normalize_date_bound("2024-03", false));
        assert_eq!("20240399999999", normalize_date_bound("2024-03", true));
        assert!(is_partial_date("2024-03"));
        assert!(!is_partial_date("20240301000000"));
        assert!(!is_partial_date("march"));
    }

    #[test]
    fn finds_terms_in_fields() {
        let doc = Document::new("file:///a.txt")
            .text("title", "Beagle Search")
            .number("size", 12);
        let a = UAX29Analyzer;
        assert!(doc.contains_term(&Term::new("title", "beagle"), &a));
        assert!(doc.contains_term(&Term::new("uri", "file:///a.txt"), &a));
        assert!(doc.contains_term(&Term::new("size", encode_number(12)), &a));
        assert!(!doc.contains_term(&Term::new("title", "Beagle"), &a));
    }

    #[test]
    fn unstored_fields_are_not_stored() {
        let doc = Document::new("u").unstored_text("body", "x").keyword("mime", "text/plain");
        let stored = doc.to_stored();
        assert_eq!(None, stored.get("body"));
        assert_eq!(Some("text/plain"), stored.get_text("mime"));
    }

    proptest! {
        #[test]
        fn number_encoding_preserves_order(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(a.cmp(&b), encode_number(a).cmp(&encode_number(b)));
            prop_assert_eq!(Some(a), decode_number(&encode_number(a)));
        }
    }
}
