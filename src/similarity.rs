//! Classic TF-IDF scoring.
//!
//! A term contributes `tf(freq) * idf^2 * boost * norm(field_length)`.
//! Document frequencies and the document count only see live documents, so
//! merging segments or purging deletions leaves scores unchanged.

/// Term frequency factor.
pub fn tf(freq: f32) -> f32 {
    freq.sqrt()
}

pub fn idf(doc_freq: u64, num_docs: u64) -> f32 {
    1.0 + (num_docs.max(1) as f32 / (doc_freq as f32 + 1.0)).ln()
}

/// Shorter fields weigh more. An empty field (or a document without the
/// field) gets the weight of a one token field.
pub fn length_norm(length: u32) -> f32 {
    1.0 / (length.max(1) as f32).sqrt()
}

/// Contribution of one phrase occurrence spread over `distance` positions.
pub fn sloppy_freq(distance: u32) -> f32 {
    1.0 / (distance as f32 + 1.0)
}

/// Fraction of the scoring clauses of a boolean query a document matched.
pub fn coord(matched: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        matched as f32 / total as f32
    }
}

/// Summed `sloppy_freq` of all windows holding every phrase term within
/// `slop` moves. `positions[i]` are the positions of the i-th phrase term,
/// ascending. Slop 0 counts exact occurrences.
pub fn phrase_freq(positions: &[Vec<u32>], slop: u32) -> f32 {
    if positions.is_empty() || positions.iter().any(|p| p.is_empty()) {
        return 0.0;
    }
    // Shift each term back by its index so an exact phrase lines up on one
    // position.
    let shifted = |term: usize, idx: usize| positions[term][idx] as i64 - term as i64;
    let mut idx = vec![0usize; positions.len()];
    let mut freq = 0.0;
    loop {
        let mut min_term = 0;
        let mut min = shifted(0, idx[0]);
        let mut max = min;
        for term in 1..positions.len() {
            let pos = shifted(term, idx[term]);
            if pos < min {
                min = pos;
                min_term = term;
            }
            max = max.max(pos);
        }
        let distance = (max - min) as u64;
        if distance <= slop as u64 {
            freq += sloppy_freq(distance as u32);
        }
        idx[min_term] += 1;
        if idx[min_term] >= positions[min_term].len() {
            return freq;
        }
    }
}
