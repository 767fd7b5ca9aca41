use std::borrow::Cow;
use std::fmt::Debug;
use std::iter;

use unicode_segmentation::UnicodeSegmentation;

/// Turns a field value into the tokens that get indexed. Token positions are
/// the order in which tokens are yielded.
pub trait Analyzer: AnalyzerClone + Send + Sync + Debug {
    fn analyzer_type(&self) -> &'static str;
    fn analyze<'a>(&self, value: &'a str) -> Box<dyn Iterator<Item = Cow<'a, str>> + 'a>;
}

pub fn for_name(name: &str) -> Option<Box<dyn Analyzer>> {
    match name {
        "uax29" => Some(Box::new(UAX29Analyzer)),
        "whitespace" => Some(Box::new(WhiteSpaceAnalyzer)),
        "keyword" | "noop" => Some(Box::new(KeywordAnalyzer)),
        _ => None,
    }
}

pub trait AnalyzerClone {
    fn clone_box(&self) -> Box<dyn Analyzer>;
}

impl<T> AnalyzerClone for T
where
    T: 'static + Analyzer + Clone,
{
    fn clone_box(&self) -> Box<dyn Analyzer> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Analyzer> {
    fn clone(&self) -> Box<dyn Analyzer> {
        self.clone_box()
    }
}

/// Unicode word boundaries, lowercased. Tokens without a letter or digit are
/// dropped.
#[derive(Clone, Debug, Default)]
pub struct UAX29Analyzer;

impl Analyzer for UAX29Analyzer {
    fn analyzer_type(&self) -> &'static str {
        "uax29"
    }

    fn analyze<'a>(&self, value: &'a str) -> Box<dyn Iterator<Item = Cow<'a, str>> + 'a> {
        Box::new(
            value
                .split_word_bounds()
                .filter(|token| token.chars().any(char::is_alphanumeric))
                .map(lowercase),
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct WhiteSpaceAnalyzer;

impl Analyzer for WhiteSpaceAnalyzer {
    fn analyzer_type(&self) -> &'static str {
        "whitespace"
    }

    fn analyze<'a>(&self, value: &'a str) -> Box<dyn Iterator<Item = Cow<'a, str>> + 'a> {
        Box::new(value.split_whitespace().map(Cow::Borrowed))
    }
}

/// The whole value is one token.
#[derive(Clone, Debug, Default)]
pub struct KeywordAnalyzer;

impl Analyzer for KeywordAnalyzer {
    fn analyzer_type(&self) -> &'static str {
        "keyword"
    }

    fn analyze<'a>(&self, value: &'a str) -> Box<dyn Iterator<Item = Cow<'a, str>> + 'a> {
        Box::new(iter::once(Cow::Borrowed(value)))
    }
}

pub fn lowercase(token: &str) -> Cow<str> {
    if token.chars().any(char::is_uppercase) {
        Cow::Owned(token.to_lowercase())
    } else {
        Cow::Borrowed(token)
    }
}
