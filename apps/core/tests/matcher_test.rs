use sift_core::matcher::{match_text, Matcher, MatchTuning};

#[test]
fn empty_pattern_matches_everything_with_zero_score() {
    for candidate in ["", "Terminal", "你好", "café"] {
        let result = match_text(candidate, "", false);
        assert!(result.is_match, "{candidate:?}");
        assert_eq!(result.score, 0);
    }
}

#[test]
fn exact_match_beats_every_strict_prefix() {
    let candidate = "Calculator";
    let exact = match_text(candidate, candidate, false);
    assert!(exact.is_match);

    for end in 1..candidate.len() {
        let prefix = match_text(candidate, &candidate[..end], false);
        assert!(prefix.is_match, "prefix {:?}", &candidate[..end]);
        assert!(exact.score > prefix.score, "prefix {:?}", &candidate[..end]);
    }
}

#[test]
fn prefix_beats_inner_occurrence() {
    let prefix = match_text("Terminal", "Term", false);
    let inner = match_text("myTerminal", "Term", false);
    assert!(prefix.is_match && inner.is_match);
    assert!(prefix.score > inner.score);
}

#[test]
fn diacritics_fold_in_both_directions() {
    assert!(match_text("café", "cafe", false).is_match);
    assert!(match_text("resume", "résumé", false).is_match);
    assert!(match_text("Smørrebrød", "smorre", false).is_match);
}

#[test]
fn acronyms_match_word_boundaries() {
    assert!(match_text("getProcessById", "gpb", false).is_match);
    assert!(match_text("user_profile_settings", "ups", false).is_match);
}

#[test]
fn scattered_letters_over_unrelated_text_are_rejected() {
    assert!(!match_text("Microsoft Remote Desktop", "test", false).is_match);
}

#[test]
fn short_pattern_passes_on_a_consecutive_run() {
    assert!(match_text("requests", "qst", false).is_match);
    assert!(match_text("latest", "tst", false).is_match);
}

#[test]
fn short_pattern_without_boundary_or_run_is_rejected() {
    assert!(!match_text("abcdefgh", "bdf", false).is_match);
}

#[test]
fn missing_pattern_letter_is_no_match() {
    let result = match_text("Terminal", "termz", false);
    assert!(!result.is_match);
    assert_eq!(result.score, 0);
}

#[test]
fn pinyin_full_and_initial_spellings_match() {
    assert!(match_text("你好", "nihao", true).is_match);
    assert!(match_text("你好", "nh", true).is_match);
}

#[test]
fn pinyin_full_spelling_ranks_above_initials() {
    let spelled = match_text("你好", "nihao", true);
    let initials = match_text("你好", "nh", true);
    assert!(spelled.score > initials.score);
}

#[test]
fn pinyin_is_off_unless_requested() {
    assert!(!match_text("你好", "nihao", false).is_match);
}

#[test]
fn pinyin_rejects_mixed_full_and_initial_spelling() {
    assert!(!match_text("你好", "nih", true).is_match);
}

#[test]
fn pinyin_rejects_matches_spread_too_far_apart() {
    assert!(match_text("一二三四五", "yiwu", true).is_match);
    assert!(!match_text("一二三四五六", "yiliu", true).is_match);
}

#[test]
fn matching_is_deterministic() {
    let cases = [
        ("Visual Studio Code", "vsc", false),
        ("你好世界", "nhsj", true),
        ("café", "cafe", false),
        ("Microsoft Remote Desktop", "test", false),
    ];
    for (candidate, pattern, pinyin) in cases {
        assert_eq!(
            match_text(candidate, pattern, pinyin),
            match_text(candidate, pattern, pinyin)
        );
    }
}

#[test]
fn memoized_matcher_agrees_with_free_function() {
    let matcher = Matcher::new(MatchTuning::default(), 2);
    let cases = [
        ("Terminal", "term"),
        ("myTerminal", "term"),
        ("getProcessById", "gpb"),
        ("Terminal", "term"),
    ];
    for (candidate, pattern) in cases {
        assert_eq!(
            matcher.matches(candidate, pattern, false),
            match_text(candidate, pattern, false)
        );
    }
}

#[test]
fn custom_tuning_keeps_tier_ordering() {
    let tuning = MatchTuning {
        boundary_bonus: 20,
        camel_bonus: 20,
        ..MatchTuning::default()
    };
    let matcher = Matcher::new(tuning, 16);
    let prefix = matcher.matches("Terminal", "Term", false);
    let inner = matcher.matches("myTerminal", "Term", false);
    assert!(prefix.score > inner.score);
}
