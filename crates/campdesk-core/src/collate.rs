//! Locale-aware string ordering for display names.
//!
//! Approximates root-locale collation in three levels: base letters compared
//! case- and accent-insensitively, then accents, then case with lowercase
//! first. Equal strings under all three levels fall back to byte order.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

fn primary_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn secondary_key(s: &str) -> String {
    s.nfd().flat_map(char::to_lowercase).collect()
}

fn tertiary_cmp(a: &str, b: &str) -> Ordering {
    let case = |c: char| (c.to_lowercase().next().unwrap_or(c), c.is_uppercase());
    a.nfd().map(case).cmp(b.nfd().map(case))
}

/// Compare two strings the way a name-sorted list should read.
pub fn compare(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| secondary_key(a).cmp(&secondary_key(b)))
        .then_with(|| tertiary_cmp(a, b))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut names: Vec<&str>) -> Vec<&str> {
        names.sort_by(|a, b| compare(a, b));
        names
    }

    #[test]
    fn ignores_case_at_primary_level() {
        assert_eq!(sorted(vec!["banana", "Apple", "cherry"]), vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn accented_letters_sort_with_their_base() {
        assert_eq!(sorted(vec!["Zebra", "Éclair", "Dental"]), vec!["Dental", "Éclair", "Zebra"]);
        assert_eq!(compare("e", "é"), Ordering::Less);
        assert_eq!(compare("é", "f"), Ordering::Less);
    }

    #[test]
    fn lowercase_precedes_uppercase_on_tie() {
        assert_eq!(compare("a", "A"), Ordering::Less);
        assert_eq!(compare("Dental", "dental"), Ordering::Greater);
    }

    #[test]
    fn equal_only_for_identical_strings() {
        assert_eq!(compare("Implants", "Implants"), Ordering::Equal);
        assert_ne!(compare("e\u{301}", "\u{e9}"), Ordering::Equal);
    }
}
