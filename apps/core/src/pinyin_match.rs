use std::cmp::Reverse;
use std::collections::HashMap;

use pinyin::ToPinyinMulti;

use crate::diacritics::{fold_char, normalize_for_match};

const MAX_READINGS: usize = 16;
const MAX_READINGS_PER_CHAR: usize = 3;
const MAX_SKIPPED_BETWEEN: usize = 3;
const MIN_PARTIAL_LEN: usize = 2;

const PINYIN_BASE: i64 = 10;
const SYLLABLE_WEIGHT: i64 = 8;
const NO_SKIP_BONUS: i64 = 4;
const EXACT_BONUS: i64 = 2;
const SPELLED_BONUS: i64 = 1;

pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF
    )
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Matches an already-normalized pattern against the pinyin spellings of
/// `candidate`. Every reading combination is tried and the best one kept.
pub fn match_pinyin(candidate: &str, normalized_pattern: &str) -> Option<i64> {
    let pattern: String = normalized_pattern
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if pattern.is_empty() {
        return None;
    }

    let options = syllable_options(candidate);
    if options.is_empty() {
        return None;
    }

    expand_readings(&options)
        .iter()
        .filter_map(|syllables| match_syllables(syllables, &pattern))
        .max_by_key(Tally::rank)
        .map(|tally| tally.score())
}

fn readings_for(c: char) -> Vec<String> {
    let mut readings: Vec<String> = Vec::new();
    if let Some(multi) = c.to_pinyin_multi() {
        for reading in multi {
            let plain = normalize_for_match(reading.plain());
            if !readings.contains(&plain) {
                readings.push(plain);
            }
            if readings.len() >= MAX_READINGS_PER_CHAR {
                break;
            }
        }
    }
    readings
}

fn flush_run(run: &mut String, options: &mut Vec<Vec<String>>) {
    if !run.is_empty() {
        options.push(vec![std::mem::take(run)]);
    }
}

/// One entry per source syllable: every CJK character contributes its
/// readings, a run of other letters or digits contributes itself.
fn syllable_options(candidate: &str) -> Vec<Vec<String>> {
    let mut options = Vec::new();
    let mut run = String::new();

    for c in candidate.chars() {
        if is_cjk(c) {
            flush_run(&mut run, &mut options);
            let readings = readings_for(c);
            if !readings.is_empty() {
                options.push(readings);
            }
        } else if c.is_alphanumeric() {
            run.push(fold_char(c));
        } else {
            flush_run(&mut run, &mut options);
        }
    }
    flush_run(&mut run, &mut options);

    options
}

fn expand_readings(options: &[Vec<String>]) -> Vec<Vec<&str>> {
    let mut combos: Vec<Vec<&str>> = vec![Vec::with_capacity(options.len())];
    for choices in options {
        let mut next = Vec::with_capacity(combos.len().min(MAX_READINGS));
        'fill: for combo in &combos {
            for choice in choices {
                if next.len() >= MAX_READINGS {
                    break 'fill;
                }
                let mut extended = combo.clone();
                extended.push(choice.as_str());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tally {
    matched: usize,
    skipped: usize,
    exact: bool,
    // Some syllable was typed past its initial.
    spelled: bool,
}

impl Tally {
    fn rank(&self) -> (usize, Reverse<usize>, bool, bool) {
        (self.matched, Reverse(self.skipped), self.exact, self.spelled)
    }

    fn score(&self) -> i64 {
        let mut score = PINYIN_BASE + SYLLABLE_WEIGHT * self.matched as i64;
        if self.skipped == 0 {
            score += NO_SKIP_BONUS;
        }
        if self.exact && self.skipped == 0 {
            score += EXACT_BONUS;
        }
        if self.spelled {
            score += SPELLED_BONUS;
        }
        score
    }
}

fn keep_best(best: &mut Option<Tally>, candidate: Tally) {
    if best.map_or(true, |current| candidate.rank() > current.rank()) {
        *best = Some(candidate);
    }
}

fn match_syllables(syllables: &[&str], pattern: &str) -> Option<Tally> {
    let initials: String = syllables.iter().filter_map(|s| s.chars().next()).collect();
    let by_initials = initials.starts_with(pattern).then(|| Tally {
        matched: pattern.chars().count(),
        skipped: 0,
        exact: initials == pattern,
        spelled: false,
    });

    let mut search = SequenceSearch {
        syllables,
        pattern,
        memo: HashMap::new(),
    };
    let by_sequence = search.solve(0, 0, 0, false);

    let mut best = None;
    for tally in [by_initials, by_sequence].into_iter().flatten() {
        keep_best(&mut best, tally);
    }
    best
}

/// Full syllables consumed left to right. Whole syllables may be skipped
/// (freely before the first hit, at most three in a row after it) and the
/// pattern may end inside a syllable once at least two letters of it are
/// typed. A single-letter tail after a full syllable is not accepted.
struct SequenceSearch<'a> {
    syllables: &'a [&'a str],
    pattern: &'a str,
    memo: HashMap<(usize, usize, usize, bool), Option<Tally>>,
}

impl SequenceSearch<'_> {
    fn solve(&mut self, index: usize, position: usize, gap: usize, started: bool) -> Option<Tally> {
        if position == self.pattern.len() {
            return Some(Tally {
                matched: 0,
                skipped: 0,
                exact: index == self.syllables.len(),
                spelled: false,
            });
        }
        if index == self.syllables.len() {
            return None;
        }

        let key = (index, position, gap, started);
        if let Some(cached) = self.memo.get(&key) {
            return *cached;
        }

        let syllable = self.syllables[index];
        let rest = &self.pattern[position..];
        let mut best = None;

        if rest.starts_with(syllable) {
            if let Some(tail) = self.solve(index + 1, position + syllable.len(), 0, true) {
                keep_best(
                    &mut best,
                    Tally {
                        matched: tail.matched + 1,
                        spelled: tail.spelled || syllable.len() > 1,
                        ..tail
                    },
                );
            }
        } else if syllable.starts_with(rest)
            && (!started || rest.chars().count() >= MIN_PARTIAL_LEN)
        {
            keep_best(
                &mut best,
                Tally {
                    matched: 1,
                    skipped: 0,
                    exact: false,
                    spelled: rest.len() > 1,
                },
            );
        }

        if !started || gap < MAX_SKIPPED_BETWEEN {
            let next_gap = if started { gap + 1 } else { 0 };
            if let Some(tail) = self.solve(index + 1, position, next_gap, started) {
                keep_best(
                    &mut best,
                    Tally {
                        skipped: tail.skipped + 1,
                        ..tail
                    },
                );
            }
        }

        self.memo.insert(key, best);
        best
    }
}
