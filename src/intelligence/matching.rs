//! Name matching shared by the rule engine and the reconciler.

/// Lowercase, trim and collapse inner whitespace.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Case-insensitive containment in either direction. An empty name never matches.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    normalized_match(&a, &b)
}

/// [`names_match`] for inputs already passed through [`normalize`].
pub(crate) fn normalized_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// Shortest partial name accepted when a keyword contains the term.
const MIN_PARTIAL_LEN: usize = 4;

/// Rule-engine match of a normalized medicine term against a normalized
/// keyword. A term containing the keyword always matches. The reverse
/// direction, for abbreviated names, needs the term to start a word of the
/// keyword, and never applies to drug-class names: "iron" must not match
/// "spironolactone", nor "calcium" the class "calcium channel blockers".
pub(crate) fn term_matches_keyword(term: &str, keyword: &str, keyword_is_class: bool) -> bool {
    if term.is_empty() || keyword.is_empty() {
        return false;
    }
    if term.contains(keyword) {
        return true;
    }
    !keyword_is_class && term.chars().count() >= MIN_PARTIAL_LEN && starts_a_word(keyword, term)
}

fn starts_a_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        haystack[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}
