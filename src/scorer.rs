//! Per segment evaluation of queries.
//!
//! A `Query` is first turned into a `Weight` using statistics of the whole
//! reader, then each segment gets a tree of `Scorer`s walking its postings.

use std::collections::BTreeSet;

use crate::document::{encode_number, is_partial_date, normalize_date_bound, FieldKind};
use crate::error::Result;
use crate::postings::PostingsIter;
use crate::query::{Occur, Query, Term};
use crate::segment::{FieldNorms, SegmentReader};
use crate::similarity::{coord, idf, length_norm, phrase_freq, tf};
use crate::DocId;

/// Iterates matching documents of one segment in increasing order.
pub trait Scorer {
    fn doc(&self) -> Option<DocId>;

    fn next_doc(&mut self) -> Result<Option<DocId>>;

    /// Moves to the first document at or after `target`. Stays put when the
    /// current document already qualifies.
    fn advance(&mut self, target: DocId) -> Result<Option<DocId>> {
        if let Some(doc) = self.doc() {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        loop {
            match self.next_doc()? {
                Some(doc) if doc < target => continue,
                other => return Ok(other),
            }
        }
    }

    /// Score of the current document.
    fn score(&mut self) -> Result<f32>;
}

/// Collection wide statistics and dictionary access for building weights.
pub struct SearchContext<'a> {
    segments: &'a [SegmentReader],
    num_docs: u64,
}

impl<'a> SearchContext<'a> {
    pub fn new(segments: &'a [SegmentReader]) -> SearchContext<'a> {
        SearchContext {
            segments,
            num_docs: segments.iter().map(|s| s.num_docs()).sum(),
        }
    }

    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    pub fn doc_freq(&self, field: &str, text: &str) -> Result<u64> {
        let mut doc_freq = 0;
        for segment in self.segments {
            doc_freq += segment.live_doc_freq(field, text)?;
        }
        Ok(doc_freq)
    }

    pub fn idf(&self, field: &str, text: &str) -> Result<f32> {
        Ok(idf(self.doc_freq(field, text)?, self.num_docs))
    }

    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.segments
            .iter()
            .filter_map(|s| s.core().field_kind(field))
            .next()
    }

    fn range_bound(&self, field: &str, bound: &Option<String>, upper: bool) -> Option<String> {
        let bound = bound.as_ref()?;
        Some(match self.field_kind(field) {
            Some(FieldKind::Number) => match bound.parse::<i64>() {
                Ok(n) => encode_number(n),
                Err(_) => bound.clone(),
            },
            Some(FieldKind::Date) => normalize_date_bound(bound, upper),
            _ => bound.clone(),
        })
    }

    /// Dictionary terms matched by a range, prefix, wildcard or fuzzy
    /// query, over all segments.
    pub fn expand(&self, query: &Query) -> Result<Vec<String>> {
        let mut terms = BTreeSet::new();
        match query {
            Query::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
                ..
            } => {
                let lower = self.range_bound(field, lower, false);
                let upper = self.range_bound(field, upper, true);
                for index in self.segments.iter().filter_map(|s| s.core().field(field)) {
                    terms.extend(index.terms_range(
                        lower.as_deref(),
                        upper.as_deref(),
                        *include_lower,
                        *include_upper,
                    ));
                }
            }
            Query::Prefix { term, .. } => {
                for index in self.segments.iter().filter_map(|s| s.core().field(&term.field)) {
                    terms.extend(index.terms_prefix(&term.text));
                }
            }
            Query::Wildcard { term, .. } => {
                for index in self.segments.iter().filter_map(|s| s.core().field(&term.field)) {
                    terms.extend(index.terms_wildcard(&term.text)?);
                }
            }
            Query::Fuzzy { term, distance, .. } => {
                for index in self.segments.iter().filter_map(|s| s.core().field(&term.field)) {
                    terms.extend(index.terms_fuzzy(&term.text, *distance));
                }
            }
            _ => (),
        }
        Ok(terms.into_iter().collect())
    }
}

/// A query with its collection level factors folded in.
#[derive(Debug, Clone, PartialEq)]
pub enum Weight {
    Term {
        field: String,
        text: String,
        value: f32,
    },
    Phrase {
        field: String,
        terms: Vec<String>,
        slop: u32,
        value: f32,
    },
    Boolean {
        clauses: Vec<(Occur, Weight)>,
        /// Expanded multi-term queries do not scale by the matched fraction.
        coord: bool,
    },
    MatchAll {
        value: f32,
    },
    /// Matches nothing.
    Empty,
}

impl Weight {
    pub fn build(query: &Query, ctx: &SearchContext) -> Result<Weight> {
        Weight::build_boosted(query, ctx, 1.0)
    }

    fn build_boosted(query: &Query, ctx: &SearchContext, factor: f32) -> Result<Weight> {
        let boost = query.boost() * factor;
        Ok(match query {
            Query::Term { term, .. } => match ctx.field_kind(&term.field) {
                Some(FieldKind::Number) => {
                    let text = match term.text.parse::<i64>() {
                        Ok(n) => encode_number(n),
                        Err(_) => term.text.clone(),
                    };
                    Weight::term(ctx, &term.field, text, boost)?
                }
                Some(FieldKind::Date) if is_partial_date(&term.text) => {
                    // A partial date matches the whole period.
                    let period = Query::Range {
                        field: term.field.clone(),
                        lower: Some(term.text.clone()),
                        upper: Some(term.text.clone()),
                        include_lower: true,
                        include_upper: true,
                        boost: query.boost(),
                    };
                    Weight::build_boosted(&period, ctx, factor)?
                }
                _ => Weight::term(ctx, &term.field, term.text.clone(), boost)?,
            },
            Query::Phrase {
                field, terms, slop, ..
            } if terms.len() > 1 => match ctx.field_kind(field) {
                // "2024-03" analyzed into pieces
                Some(FieldKind::Date) | Some(FieldKind::Number) => {
                    let joined = Query::Term {
                        term: Term::new(field.as_str(), terms.concat()),
                        boost: query.boost(),
                    };
                    Weight::build_boosted(&joined, ctx, factor)?
                }
                _ => Weight::phrase(ctx, field, terms, *slop, boost)?,
            },
            Query::Phrase { field, terms, .. } => match terms.first() {
                Some(text) => Weight::term(ctx, field, text.clone(), boost)?,
                None => Weight::Empty,
            },
            Query::Range { field, .. } => Weight::expanded(ctx, field, ctx.expand(query)?, boost)?,
            Query::Prefix { term, .. } | Query::Wildcard { term, .. } | Query::Fuzzy { term, .. } => {
                Weight::expanded(ctx, &term.field, ctx.expand(query)?, boost)?
            }
            Query::Boolean { clauses, .. } => {
                if clauses.is_empty() {
                    Weight::Empty
                } else {
                    let mut weights = Vec::with_capacity(clauses.len());
                    for clause in clauses {
                        weights.push((
                            clause.occur,
                            Weight::build_boosted(&clause.query, ctx, boost)?,
                        ));
                    }
                    Weight::Boolean {
                        clauses: weights,
                        coord: true,
                    }
                }
            }
            Query::MatchAll { .. } => Weight::MatchAll { value: boost },
        })
    }

    fn phrase(ctx: &SearchContext, field: &str, terms: &[String], slop: u32, boost: f32) -> Result<Weight> {
        let mut sum = 0.0;
        for text in terms {
            sum += ctx.idf(field, text)?;
        }
        Ok(Weight::Phrase {
            field: field.to_string(),
            terms: terms.to_vec(),
            slop,
            value: sum * sum * boost,
        })
    }

    fn term(ctx: &SearchContext, field: &str, text: String, boost: f32) -> Result<Weight> {
        let idf = ctx.idf(field, &text)?;
        Ok(Weight::Term {
            field: field.to_string(),
            text,
            value: idf * idf * boost,
        })
    }

    fn expanded(ctx: &SearchContext, field: &str, terms: Vec<String>, boost: f32) -> Result<Weight> {
        if terms.is_empty() {
            return Ok(Weight::Empty);
        }
        let mut clauses = Vec::with_capacity(terms.len());
        for text in terms {
            clauses.push((Occur::Should, Weight::term(ctx, field, text, boost)?));
        }
        Ok(Weight::Boolean {
            clauses,
            coord: false,
        })
    }

    /// `None` when nothing in the segment can match.
    pub fn scorer<'a>(&self, segment: &'a SegmentReader) -> Result<Option<Box<dyn Scorer + 'a>>> {
        Ok(match self {
            Weight::Term { field, text, value } => match segment.term_docs(field, text)? {
                Some(postings) => boxed(TermScorer {
                    postings,
                    value: *value,
                    norms: segment.core().norms(field),
                }),
                None => None,
            },
            Weight::Phrase {
                field,
                terms,
                slop,
                value,
            } => {
                let mut postings = Vec::with_capacity(terms.len());
                for text in terms {
                    match segment.term_docs(field, text)? {
                        Some(p) => postings.push(p),
                        None => return Ok(None),
                    }
                }
                boxed(PhraseScorer {
                    postings,
                    slop: *slop,
                    value: *value,
                    norms: segment.core().norms(field),
                    doc: None,
                    freq: 0.0,
                })
            }
            Weight::Boolean { clauses, coord } => {
                let mut required = Vec::new();
                let mut optional = Vec::new();
                let mut prohibited = Vec::new();
                let mut total = 0;
                for (occur, weight) in clauses {
                    if *occur != Occur::MustNot {
                        total += 1;
                    }
                    match (occur, weight.scorer(segment)?) {
                        (Occur::Must, None) => return Ok(None),
                        (Occur::Must, Some(s)) => required.push(s),
                        (Occur::Should, Some(s)) => optional.push(s),
                        (Occur::MustNot, Some(s)) => prohibited.push(s),
                        (_, None) => (),
                    }
                }
                if required.is_empty() && optional.is_empty() {
                    return Ok(None);
                }
                boxed(BooleanScorer {
                    required: if required.is_empty() {
                        None
                    } else {
                        Some(ConjunctionScorer::new(required))
                    },
                    optional: DisjunctionScorer::new(optional),
                    prohibited: if prohibited.is_empty() {
                        None
                    } else {
                        Some(DisjunctionScorer::new(prohibited))
                    },
                    total: if *coord { Some(total) } else { None },
                    doc: None,
                })
            }
            Weight::MatchAll { value } => boxed(MatchAllScorer {
                max_doc: segment.max_doc(),
                doc: None,
                value: *value,
            }),
            Weight::Empty => None,
        })
    }
}

fn boxed<'a, S: Scorer + 'a>(scorer: S) -> Option<Box<dyn Scorer + 'a>> {
    Some(Box::new(scorer))
}

fn norm(norms: &Option<FieldNorms>, doc: DocId) -> f32 {
    match norms {
        Some(norms) => length_norm(norms.length(doc)),
        None => 1.0,
    }
}

pub struct TermScorer<'a> {
    postings: PostingsIter<'a>,
    value: f32,
    norms: Option<FieldNorms<'a>>,
}

impl<'a> Scorer for TermScorer<'a> {
    fn doc(&self) -> Option<DocId> {
        self.postings.doc()
    }

    fn next_doc(&mut self) -> Result<Option<DocId>> {
        self.postings.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<Option<DocId>> {
        self.postings.advance(target)
    }

    fn score(&mut self) -> Result<f32> {
        let doc = match self.postings.doc() {
            Some(doc) => doc,
            None => return Ok(0.0),
        };
        Ok(tf(self.postings.freq() as f32) * self.value * norm(&self.norms, doc))
    }
}

/// Documents holding every term, then checked for positions.
pub struct PhraseScorer<'a> {
    postings: Vec<PostingsIter<'a>>,
    slop: u32,
    value: f32,
    norms: Option<FieldNorms<'a>>,
    doc: Option<DocId>,
    freq: f32,
}

impl<'a> PhraseScorer<'a> {
    fn align(&mut self, mut target: DocId) -> Result<Option<DocId>> {
        'outer: loop {
            for postings in self.postings.iter_mut() {
                match postings.advance(target)? {
                    Some(doc) if doc == target => (),
                    Some(doc) => {
                        target = doc;
                        continue 'outer;
                    }
                    None => return Ok(None),
                }
            }
            return Ok(Some(target));
        }
    }

    fn search(&mut self, mut candidate: Option<DocId>) -> Result<Option<DocId>> {
        loop {
            let doc = match candidate {
                Some(doc) => self.align(doc)?,
                None => None,
            };
            let doc = match doc {
                Some(doc) => doc,
                None => {
                    self.doc = None;
                    return Ok(None);
                }
            };
            let mut positions = Vec::with_capacity(self.postings.len());
            for postings in &self.postings {
                positions.push(postings.positions()?);
            }
            let freq = phrase_freq(&positions, self.slop);
            if freq > 0.0 {
                self.doc = Some(doc);
                self.freq = freq;
                return Ok(Some(doc));
            }
            candidate = self.postings[0].next_doc()?;
        }
    }
}

impl<'a> Scorer for PhraseScorer<'a> {
    fn doc(&self) -> Option<DocId> {
        self.doc
    }

    fn next_doc(&mut self) -> Result<Option<DocId>> {
        let candidate = self.postings[0].next_doc()?;
        self.search(candidate)
    }

    fn advance(&mut self, target: DocId) -> Result<Option<DocId>> {
        if let Some(doc) = self.doc {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        let candidate = self.postings[0].advance(target)?;
        self.search(candidate)
    }

    fn score(&mut self) -> Result<f32> {
        Ok(match self.doc {
            Some(doc) => tf(self.freq) * self.value * norm(&self.norms, doc),
            None => 0.0,
        })
    }
}

/// Documents matched by every sub scorer; scores add up.
pub struct ConjunctionScorer<'a> {
    subs: Vec<Box<dyn Scorer + 'a>>,
    doc: Option<DocId>,
}

impl<'a> ConjunctionScorer<'a> {
    pub fn new(subs: Vec<Box<dyn Scorer + 'a>>) -> ConjunctionScorer<'a> {
        ConjunctionScorer { subs, doc: None }
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    fn align(&mut self, candidate: Option<DocId>) -> Result<Option<DocId>> {
        let mut target = match candidate {
            Some(doc) => doc,
            None => {
                self.doc = None;
                return Ok(None);
            }
        };
        'outer: loop {
            for sub in self.subs.iter_mut() {
                match sub.advance(target)? {
                    Some(doc) if doc == target => (),
                    Some(doc) => {
                        target = doc;
                        continue 'outer;
                    }
                    None => {
                        self.doc = None;
                        return Ok(None);
                    }
                }
            }
            self.doc = Some(target);
            return Ok(Some(target));
        }
    }
}

impl<'a> Scorer for ConjunctionScorer<'a> {
    fn doc(&self) -> Option<DocId> {
        self.doc
    }

    fn next_doc(&mut self) -> Result<Option<DocId>> {
        let candidate = self.subs[0].next_doc()?;
        self.align(candidate)
    }

    fn advance(&mut self, target: DocId) -> Result<Option<DocId>> {
        if let Some(doc) = self.doc {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        let candidate = self.subs[0].advance(target)?;
        self.align(candidate)
    }

    fn score(&mut self) -> Result<f32> {
        let mut sum = 0.0;
        for sub in self.subs.iter_mut() {
            sum += sub.score()?;
        }
        Ok(sum)
    }
}

/// Documents matched by any sub scorer; scores of the matching ones add up.
pub struct DisjunctionScorer<'a> {
    subs: Vec<Box<dyn Scorer + 'a>>,
    doc: Option<DocId>,
    started: bool,
    matched: usize,
}

impl<'a> DisjunctionScorer<'a> {
    pub fn new(subs: Vec<Box<dyn Scorer + 'a>>) -> DisjunctionScorer<'a> {
        DisjunctionScorer {
            subs,
            doc: None,
            started: false,
            matched: 0,
        }
    }

    /// Sub scorers matching the current document, as of the last `score`.
    pub fn matched(&self) -> usize {
        self.matched
    }

    fn update(&mut self) -> Option<DocId> {
        self.doc = self.subs.iter().filter_map(|s| s.doc()).min();
        self.doc
    }
}

impl<'a> Scorer for DisjunctionScorer<'a> {
    fn doc(&self) -> Option<DocId> {
        self.doc
    }

    fn next_doc(&mut self) -> Result<Option<DocId>> {
        if !self.started {
            self.started = true;
            for sub in self.subs.iter_mut() {
                sub.next_doc()?;
            }
        } else {
            let current = match self.doc {
                Some(doc) => doc,
                None => return Ok(None),
            };
            for sub in self.subs.iter_mut() {
                if sub.doc() == Some(current) {
                    sub.next_doc()?;
                }
            }
        }
        Ok(self.update())
    }

    fn advance(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.started {
            match self.doc {
                Some(doc) if doc >= target => return Ok(Some(doc)),
                None => return Ok(None),
                _ => (),
            }
        }
        self.started = true;
        for sub in self.subs.iter_mut() {
            if sub.doc().map(|d| d < target).unwrap_or(true) {
                sub.advance(target)?;
            }
        }
        Ok(self.update())
    }

    fn score(&mut self) -> Result<f32> {
        let mut sum = 0.0;
        self.matched = 0;
        let current = match self.doc {
            Some(doc) => doc,
            None => return Ok(0.0),
        };
        for sub in self.subs.iter_mut() {
            if sub.doc() == Some(current) {
                sum += sub.score()?;
                self.matched += 1;
            }
        }
        Ok(sum)
    }
}

/// `Must` clauses intersect, `Should` clauses add to the score,
/// `MustNot` clauses exclude.
pub struct BooleanScorer<'a> {
    required: Option<ConjunctionScorer<'a>>,
    optional: DisjunctionScorer<'a>,
    prohibited: Option<DisjunctionScorer<'a>>,
    /// Number of scoring clauses, `None` to skip coordination.
    total: Option<usize>,
    doc: Option<DocId>,
}

impl<'a> BooleanScorer<'a> {
    fn next_candidate(&mut self) -> Result<Option<DocId>> {
        match self.required {
            Some(ref mut required) => required.next_doc(),
            None => self.optional.next_doc(),
        }
    }

    fn skip_prohibited(&mut self, mut candidate: Option<DocId>) -> Result<Option<DocId>> {
        loop {
            let doc = match candidate {
                Some(doc) => doc,
                None => {
                    self.doc = None;
                    return Ok(None);
                }
            };
            let excluded = match self.prohibited {
                Some(ref mut prohibited) => prohibited.advance(doc)? == Some(doc),
                None => false,
            };
            if !excluded {
                self.doc = Some(doc);
                return Ok(Some(doc));
            }
            candidate = self.next_candidate()?;
        }
    }
}

impl<'a> Scorer for BooleanScorer<'a> {
    fn doc(&self) -> Option<DocId> {
        self.doc
    }

    fn next_doc(&mut self) -> Result<Option<DocId>> {
        let candidate = self.next_candidate()?;
        self.skip_prohibited(candidate)
    }

    fn advance(&mut self, target: DocId) -> Result<Option<DocId>> {
        if let Some(doc) = self.doc {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        let candidate = match self.required {
            Some(ref mut required) => required.advance(target)?,
            None => self.optional.advance(target)?,
        };
        self.skip_prohibited(candidate)
    }

    fn score(&mut self) -> Result<f32> {
        let doc = match self.doc {
            Some(doc) => doc,
            None => return Ok(0.0),
        };
        let mut sum = 0.0;
        let mut matched = 0;
        match self.required {
            Some(ref mut required) => {
                sum += required.score()?;
                matched += required.len();
                if self.optional.advance(doc)? == Some(doc) {
                    sum += self.optional.score()?;
                    matched += self.optional.matched();
                }
            }
            None => {
                sum += self.optional.score()?;
                matched += self.optional.matched();
            }
        }
        Ok(match self.total {
            Some(total) => sum * coord(matched, total),
            None => sum,
        })
    }
}

pub struct MatchAllScorer {
    max_doc: u64,
    doc: Option<DocId>,
    value: f32,
}

impl Scorer for MatchAllScorer {
    fn doc(&self) -> Option<DocId> {
        self.doc
    }

    fn next_doc(&mut self) -> Result<Option<DocId>> {
        let next = match self.doc {
            Some(doc) => doc + 1,
            None => 0,
        };
        self.doc = if next < self.max_doc { Some(next) } else { None };
        // Once exhausted, stay exhausted.
        if self.doc.is_none() {
            self.max_doc = 0;
        }
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<Option<DocId>> {
        if let Some(doc) = self.doc {
            if doc >= target {
                return Ok(Some(doc));
            }
        }
        self.doc = if target < self.max_doc { Some(target) } else { None };
        if self.doc.is_none() {
            self.max_doc = 0;
        }
        Ok(self.doc)
    }

    fn score(&mut self) -> Result<f32> {
        Ok(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::UAX29Analyzer;
    use crate::document::Document;
    use crate::generation::SegmentEntry;
    use crate::query::{Clause, Term};
    use crate::segment::write_segment;
    use tempfile::TempDir;

    fn segment(dir: &TempDir, texts: &[&str]) -> SegmentReader {
        let docs: Vec<Document> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Document::new(format!("file:///{}", i)).text("body", *t).number("size", i as i64))
            .collect();
        write_segment(dir.path(), "_0", &docs, &UAX29Analyzer, 6).unwrap();
        let entry = SegmentEntry {
            name: "_0".to_string(),
            doc_count: docs.len() as u64,
            del_gen: 0,
        };
        SegmentReader::open(dir.path(), &entry).unwrap()
    }

    fn matches(segment: &SegmentReader, query: &Query) -> Vec<(DocId, f32)> {
        let segments = [segment.clone()];
        let ctx = SearchContext::new(&segments);
        let weight = Weight::build(query, &ctx).unwrap();
        let mut out = Vec::new();
        if let Some(mut scorer) = weight.scorer(segment).unwrap() {
            while let Some(doc) = scorer.next_doc().unwrap() {
                out.push((doc, scorer.score().unwrap()));
            }
        }
        out
    }

    fn docs(segment: &SegmentReader, query: &Query) -> Vec<DocId> {
        matches(segment, query).into_iter().map(|(d, _)| d).collect()
    }

    fn body(text: &str) -> Query {
        Query::term("body", text)
    }

    #[test]
    fn boolean_occurrences() {
        let dir = TempDir::new().unwrap();
        let seg = segment(&dir, &["a b", "a c", "b c", "a b c"]);
        let and = Query::boolean(vec![Clause::must(body("a")), Clause::must(body("b"))]);
        assert_eq!(vec![0, 3], docs(&seg, &and));
        let or = Query::boolean(vec![Clause::should(body("a")), Clause::should(body("b"))]);
        assert_eq!(vec![0, 1, 2, 3], docs(&seg, &or));
        let not = Query::boolean(vec![Clause::should(body("a")), Clause::must_not(body("c"))]);
        assert_eq!(vec![0], docs(&seg, &not));
        let only_not = Query::boolean(vec![Clause::must_not(body("c"))]);
        assert!(docs(&seg, &only_not).is_empty());
        let missing = Query::boolean(vec![Clause::must(body("a")), Clause::must(body("zzz"))]);
        assert!(docs(&seg, &missing).is_empty());
        let required_and_optional =
            Query::boolean(vec![Clause::must(body("c")), Clause::should(body("a"))]);
        let scored = matches(&seg, &required_and_optional);
        assert_eq!(vec![1, 2, 3], scored.iter().map(|(d, _)| *d).collect::<Vec<_>>());
        // matching the optional clause ranks higher
        assert!(scored[0].1 > scored[1].1);
    }

    #[test]
    fn coord_rewards_more_matches() {
        let dir = TempDir::new().unwrap();
        let seg = segment(&dir, &["a x", "a b"]);
        let or = Query::boolean(vec![Clause::should(body("a")), Clause::should(body("b"))]);
        let scored = matches(&seg, &or);
        assert!(scored[1].1 > scored[0].1);
    }

    #[test]
    fn phrases_check_positions() {
        let dir = TempDir::new().unwrap();
        let seg = segment(&dir, &["quick brown fox", "brown quick fox", "quick red brown fox"]);
        assert_eq!(vec![0], docs(&seg, &Query::phrase("body", &["quick", "brown"], 0)));
        assert_eq!(vec![0, 2], docs(&seg, &Query::phrase("body", &["quick", "brown"], 1)));
        assert_eq!(vec![0, 1, 2], docs(&seg, &Query::phrase("body", &["quick", "brown"], 2)));
        assert!(docs(&seg, &Query::phrase("body", &["quick", "cat"], 5)).is_empty());
    }

    #[test]
    fn term_frequency_raises_score() {
        let dir = TempDir::new().unwrap();
        let seg = segment(&dir, &["a b b b", "a a b b", "a a a b"]);
        let scored = matches(&seg, &body("a"));
        assert!(scored[0].1 < scored[1].1);
        assert!(scored[1].1 < scored[2].1);
    }

    #[test]
    fn expansions() {
        let dir = TempDir::new().unwrap();
        let seg = segment(&dir, &["apple", "apply", "banana", "applesauce"]);
        let prefix = Query::Prefix {
            term: Term::new("body", "appl"),
            boost: 1.0,
        };
        assert_eq!(vec![0, 1, 3], docs(&seg, &prefix));
        let wildcard = Query::Wildcard {
            term: Term::new("body", "appl?"),
            boost: 1.0,
        };
        assert_eq!(vec![0, 1], docs(&seg, &wildcard));
        let fuzzy = Query::Fuzzy {
            term: Term::new("body", "banan"),
            distance: 1,
            boost: 1.0,
        };
        assert_eq!(vec![2], docs(&seg, &fuzzy));
        let nothing = Query::Prefix {
            term: Term::new("body", "zz"),
            boost: 1.0,
        };
        assert!(docs(&seg, &nothing).is_empty());
    }

    #[test]
    fn numeric_ranges_and_terms() {
        let dir = TempDir::new().unwrap();
        let seg = segment(&dir, &["a"; 12]);
        let range = Query::Range {
            field: "size".to_string(),
            lower: Some("2".to_string()),
            upper: Some("10".to_string()),
            include_lower: true,
            include_upper: false,
            boost: 1.0,
        };
        assert_eq!((2..10).collect::<Vec<DocId>>(), docs(&seg, &range));
        assert_eq!(vec![7], docs(&seg, &Query::term("size", "7")));
    }

    #[test]
    fn match_all() {
        let dir = TempDir::new().unwrap();
        let seg = segment(&dir, &["a", "b", "c"]);
        assert_eq!(vec![0, 1, 2], docs(&seg, &Query::MatchAll { boost: 1.0 }));
        let not_b = Query::boolean(vec![
            Clause::must(Query::MatchAll { boost: 1.0 }),
            Clause::must_not(body("b")),
        ]);
        assert_eq!(vec![0, 2], docs(&seg, &not_b));
    }
}
