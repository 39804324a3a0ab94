/// Latin letters with diacritics folded to their base letter. Entries are
/// lower-case; callers lower-case before looking up.
const FOLD_TABLE: &[(char, &str)] = &[
    ('à', "a"),
    ('á', "a"),
    ('â', "a"),
    ('ã', "a"),
    ('ä', "a"),
    ('å', "a"),
    ('ā', "a"),
    ('ă', "a"),
    ('ą', "a"),
    ('ǎ', "a"),
    ('æ', "ae"),
    ('ç', "c"),
    ('ć', "c"),
    ('ĉ', "c"),
    ('ċ', "c"),
    ('č', "c"),
    ('ď', "d"),
    ('đ', "d"),
    ('ð', "d"),
    ('è', "e"),
    ('é', "e"),
    ('ê', "e"),
    ('ë', "e"),
    ('ē', "e"),
    ('ĕ', "e"),
    ('ė', "e"),
    ('ę', "e"),
    ('ě', "e"),
    ('ĝ', "g"),
    ('ğ', "g"),
    ('ġ', "g"),
    ('ģ', "g"),
    ('ĥ', "h"),
    ('ħ', "h"),
    ('ì', "i"),
    ('í', "i"),
    ('î', "i"),
    ('ï', "i"),
    ('ĩ', "i"),
    ('ī', "i"),
    ('ĭ', "i"),
    ('į', "i"),
    ('ı', "i"),
    ('ǐ', "i"),
    ('ĵ', "j"),
    ('ķ', "k"),
    ('ĺ', "l"),
    ('ļ', "l"),
    ('ľ', "l"),
    ('ŀ', "l"),
    ('ł', "l"),
    ('ñ', "n"),
    ('ń', "n"),
    ('ņ', "n"),
    ('ň', "n"),
    ('ò', "o"),
    ('ó', "o"),
    ('ô', "o"),
    ('õ', "o"),
    ('ö', "o"),
    ('ø', "o"),
    ('ō', "o"),
    ('ŏ', "o"),
    ('ő', "o"),
    ('ǒ', "o"),
    ('œ', "oe"),
    ('ŕ', "r"),
    ('ŗ', "r"),
    ('ř', "r"),
    ('ś', "s"),
    ('ŝ', "s"),
    ('ş', "s"),
    ('š', "s"),
    ('ș', "s"),
    ('ß', "ss"),
    ('ţ', "t"),
    ('ť', "t"),
    ('ŧ', "t"),
    ('ț', "t"),
    ('ù', "u"),
    ('ú', "u"),
    ('û', "u"),
    ('ü', "u"),
    ('ũ', "u"),
    ('ū', "u"),
    ('ŭ', "u"),
    ('ů', "u"),
    ('ű', "u"),
    ('ų', "u"),
    ('ǔ', "u"),
    ('ǖ', "u"),
    ('ǘ', "u"),
    ('ǚ', "u"),
    ('ǜ', "u"),
    ('ŵ', "w"),
    ('ý', "y"),
    ('ÿ', "y"),
    ('ŷ', "y"),
    ('ź', "z"),
    ('ż', "z"),
    ('ž', "z"),
    ('þ', "th"),
];

fn lookup(c: char) -> Option<&'static str> {
    if c.is_ascii() {
        return None;
    }
    FOLD_TABLE
        .iter()
        .find(|(key, _)| *key == c)
        .map(|(_, folded)| *folded)
}

fn lower(c: char) -> char {
    if c.is_ascii() {
        return c.to_ascii_lowercase();
    }
    c.to_lowercase().next().unwrap_or(c)
}

/// Case- and diacritic-folds a single character to one comparison character.
///
/// Multi-letter expansions (`æ`, `ß`) collapse to their first letter here so
/// that positions in the original text stay one-to-one with folded ones.
pub fn fold_char(c: char) -> char {
    let lowered = lower(c);
    match lookup(lowered) {
        Some(folded) => folded.chars().next().unwrap_or(lowered),
        None => lowered,
    }
}

/// Compares two characters ignoring case and diacritics.
pub fn equal_rune(a: char, b: char) -> bool {
    a == b || fold_char(a) == fold_char(b)
}

/// Lower-cases and folds every character, expanding ligatures in full.
pub fn normalize_for_match(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        for lowered in c.to_lowercase() {
            match lookup(lowered) {
                Some(folded) => out.push_str(folded),
                None => out.push(lowered),
            }
        }
    }
    out
}
