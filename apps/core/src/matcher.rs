use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::diacritics::{fold_char, normalize_for_match};
use crate::pinyin_match;

const TIER_CHAR_WEIGHT: i64 = 16;
const EXACT_BASE: i64 = 100;
const PREFIX_BASE: i64 = 20;
const PREFIX_BONUS: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub is_match: bool,
    pub score: i64,
}

impl MatchResult {
    pub const NO_MATCH: Self = Self {
        is_match: false,
        score: 0,
    };

    fn matched(score: i64) -> Self {
        Self {
            is_match: true,
            score,
        }
    }
}

/// Constants for the subsequence tier. The defaults were tuned against
/// launcher titles; only relative ordering between results is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchTuning {
    pub match_bonus: i64,
    pub first_char_bonus: i64,
    pub boundary_bonus: i64,
    pub camel_bonus: i64,
    pub consecutive_bonus: i64,
    pub gap_start_penalty: i64,
    pub gap_extension_penalty: i64,
    pub leading_gap_penalty: i64,
    pub max_leading_gap_penalty: i64,
    pub trailing_gap_penalty: i64,
    pub max_trailing_gap_penalty: i64,
    pub coverage_bonus: i64,
    pub lookahead_window: usize,
    pub short_pattern_len: usize,
    pub sparse_threshold_factor: f64,
    pub dense_threshold_factor: f64,
}

impl Default for MatchTuning {
    fn default() -> Self {
        Self {
            match_bonus: 16,
            first_char_bonus: 10,
            boundary_bonus: 8,
            camel_bonus: 7,
            consecutive_bonus: 6,
            gap_start_penalty: 3,
            gap_extension_penalty: 1,
            leading_gap_penalty: 3,
            max_leading_gap_penalty: 9,
            trailing_gap_penalty: 1,
            max_trailing_gap_penalty: 5,
            coverage_bonus: 20,
            lookahead_window: 10,
            short_pattern_len: 3,
            sparse_threshold_factor: 1.0,
            dense_threshold_factor: 0.5,
        }
    }
}

/// Scores `candidate` against `pattern` with the default tuning.
pub fn match_text(candidate: &str, pattern: &str, use_pinyin: bool) -> MatchResult {
    match_with_tuning(candidate, pattern, use_pinyin, &MatchTuning::default())
}

pub fn match_with_tuning(
    candidate: &str,
    pattern: &str,
    use_pinyin: bool,
    tuning: &MatchTuning,
) -> MatchResult {
    if pattern.is_empty() {
        return MatchResult::matched(0);
    }
    if candidate.is_empty() {
        return MatchResult::NO_MATCH;
    }

    let normalized_candidate = normalize_for_match(candidate);
    let normalized_pattern = normalize_for_match(pattern);
    if normalized_pattern.is_empty() {
        return MatchResult::matched(0);
    }
    let pattern_len = normalized_pattern.chars().count() as i64;

    if normalized_candidate == normalized_pattern {
        return MatchResult::matched(EXACT_BASE + pattern_len * TIER_CHAR_WEIGHT);
    }

    if normalized_candidate.starts_with(&normalized_pattern) {
        return MatchResult::matched(PREFIX_BASE + pattern_len * TIER_CHAR_WEIGHT + PREFIX_BONUS);
    }

    if let Some(score) = subsequence_score(candidate, pattern, tuning) {
        let ceiling = PREFIX_BASE + pattern_len * TIER_CHAR_WEIGHT + PREFIX_BONUS - 1;
        return MatchResult::matched(score.clamp(pattern_len + 1, ceiling));
    }

    if use_pinyin && pinyin_match::contains_cjk(candidate) {
        if let Some(score) = pinyin_match::match_pinyin(candidate, &normalized_pattern) {
            return MatchResult::matched(score);
        }
    }

    if normalized_candidate.contains(&normalized_pattern) {
        return MatchResult::matched(pattern_len);
    }

    MatchResult::NO_MATCH
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '-' | '_' | '.' | '/' | '\\' | ':' | ',' | ';' | '(' | ')' | '[' | ']' | '{' | '}' | '<'
                | '>'
        )
}

fn is_camel_transition(candidate: &[char], position: usize) -> bool {
    position > 0 && candidate[position - 1].is_lowercase() && candidate[position].is_uppercase()
}

fn is_boundary(candidate: &[char], position: usize) -> bool {
    position == 0
        || is_delimiter(candidate[position - 1])
        || is_camel_transition(candidate, position)
}

fn can_finish(folded: &[char], pattern: &[char], mut start: usize) -> bool {
    for &needle in pattern {
        match folded[start.min(folded.len())..]
            .iter()
            .position(|&c| c == needle)
        {
            Some(offset) => start += offset + 1,
            None => return false,
        }
    }
    true
}

/// Picks one candidate position per pattern character. Earliest positions are
/// the baseline; a non-boundary, non-consecutive hit is traded for a boundary
/// hit inside the lookahead window if the rest of the pattern still fits.
fn align(
    candidate: &[char],
    folded: &[char],
    pattern: &[char],
    lookahead: usize,
) -> Option<Vec<usize>> {
    if !can_finish(folded, pattern, 0) {
        return None;
    }

    let mut positions: Vec<usize> = Vec::with_capacity(pattern.len());
    let mut start = 0;
    for (index, &needle) in pattern.iter().enumerate() {
        let first = (start..folded.len()).find(|&p| folded[p] == needle)?;
        let consecutive = positions.last().is_some_and(|&prev| prev + 1 == first);
        let mut chosen = first;

        if !consecutive && !is_boundary(candidate, first) {
            let limit = first.saturating_add(lookahead).min(folded.len() - 1);
            for later in (first + 1)..=limit {
                if folded[later] == needle
                    && is_boundary(candidate, later)
                    && can_finish(folded, &pattern[index + 1..], later + 1)
                {
                    chosen = later;
                    break;
                }
            }
        }

        positions.push(chosen);
        start = chosen + 1;
    }

    Some(positions)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Alignment {
    score: i64,
    anchored: bool,
}

fn score_alignment(candidate: &[char], positions: &[usize], tuning: &MatchTuning) -> Alignment {
    let mut bonus = 0_i64;
    let mut penalty = 0_i64;
    let mut anchored = false;

    for (index, &position) in positions.iter().enumerate() {
        if position == 0 {
            bonus += tuning.first_char_bonus;
            anchored = true;
        } else if is_delimiter(candidate[position - 1]) {
            bonus += tuning.boundary_bonus;
            anchored = true;
        } else if is_camel_transition(candidate, position) {
            bonus += tuning.camel_bonus;
            anchored = true;
        }

        if index == 0 {
            penalty += (position as i64 * tuning.leading_gap_penalty)
                .min(tuning.max_leading_gap_penalty);
            continue;
        }

        let previous = positions[index - 1];
        if position == previous + 1 {
            bonus += tuning.consecutive_bonus;
            anchored = true;
        } else {
            let gap = (position - previous - 1) as i64;
            penalty += tuning.gap_start_penalty + gap * tuning.gap_extension_penalty;
        }
    }

    if let Some(&last) = positions.last() {
        let trailing = (candidate.len() - 1 - last) as i64;
        penalty += (trailing * tuning.trailing_gap_penalty).min(tuning.max_trailing_gap_penalty);
    }

    let matched = positions.len() as i64;
    let coverage = tuning.coverage_bonus * matched / candidate.len().max(1) as i64;
    Alignment {
        score: matched * tuning.match_bonus + bonus - penalty + coverage,
        anchored,
    }
}

fn passes_threshold(
    alignment: Alignment,
    pattern_len: usize,
    candidate_len: usize,
    tuning: &MatchTuning,
) -> bool {
    let base = pattern_len as i64 * tuning.match_bonus;
    // Short patterns need at least one boundary, camel or consecutive hit.
    if pattern_len <= tuning.short_pattern_len {
        return alignment.anchored && alignment.score * 2 >= base;
    }

    let coverage = pattern_len as f64 / candidate_len.max(1) as f64;
    let t = ((coverage - 0.1) / 0.4).clamp(0.0, 1.0);
    let factor = tuning.sparse_threshold_factor
        + (tuning.dense_threshold_factor - tuning.sparse_threshold_factor) * t;
    alignment.score as f64 >= base as f64 * factor
}

fn subsequence_score(candidate: &str, pattern: &str, tuning: &MatchTuning) -> Option<i64> {
    let original: Vec<char> = candidate.chars().collect();
    let folded: Vec<char> = original.iter().map(|&c| fold_char(c)).collect();
    let needle: Vec<char> = pattern
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(fold_char)
        .collect();
    if needle.is_empty() || needle.len() > folded.len() {
        return None;
    }

    let positions = align(&original, &folded, &needle, tuning.lookahead_window)?;
    let alignment = score_alignment(&original, &positions, tuning);
    passes_threshold(alignment, needle.len(), original.len(), tuning).then_some(alignment.score)
}

type MemoKey = (String, String, bool);

/// Owned matcher with a bounded memo of recent results. Shared between
/// dispatcher threads behind an `Arc`.
pub struct Matcher {
    tuning: MatchTuning,
    memo: Mutex<LruCache<MemoKey, MatchResult>>,
}

impl Matcher {
    pub fn new(tuning: MatchTuning, memo_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(memo_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            tuning,
            memo: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn tuning(&self) -> &MatchTuning {
        &self.tuning
    }

    pub fn matches(&self, candidate: &str, pattern: &str, use_pinyin: bool) -> MatchResult {
        if pattern.is_empty() {
            return MatchResult::matched(0);
        }

        let key = (candidate.to_string(), pattern.to_string(), use_pinyin);
        if let Some(hit) = self.memo.lock().get(&key) {
            return *hit;
        }

        let result = match_with_tuning(candidate, pattern, use_pinyin, &self.tuning);
        self.memo.lock().put(key, result);
        result
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatchTuning::default(), 4096)
    }
}
