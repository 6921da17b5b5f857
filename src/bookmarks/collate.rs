//! Text collation for sort keys.
//!
//! Ordering rules, in order of strength:
//! 1. Character class: whitespace, then punctuation and symbols, then digits,
//!    then letters (and everything else).
//! 2. Runs of ASCII digits compare by numeric value, so `"file2"` sorts
//!    before `"file10"`.
//! 3. Letters compare by their lowercase form with diacritics removed, so
//!    `É` sorts with `E` and `Ñ` with `N`.
//! 4. Only in case-sensitive mode, and only when 1–3 found no difference:
//!    unaccented before accented, then the first position whose case
//!    differs decides, uppercase first.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::CharIndices;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Class {
    Space,
    Punct,
    Digit,
    Letter,
}

fn class_of(c: char) -> Class {
    if c.is_whitespace() {
        Class::Space
    } else if c.is_ascii_digit() {
        Class::Digit
    } else if c.is_alphanumeric() {
        Class::Letter
    } else {
        Class::Punct
    }
}

/// A collation unit: a whole run of digits or a single other character.
#[derive(Debug, Clone, Copy)]
enum Chunk<'a> {
    Number(&'a str),
    Char(char),
}

impl Chunk<'_> {
    fn class(&self) -> Class {
        match self {
            Chunk::Number(_) => Class::Digit,
            Chunk::Char(c) => class_of(*c),
        }
    }
}

struct Chunks<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Chunks<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (start, c) = self.chars.next()?;
        if !c.is_ascii_digit() {
            return Some(Chunk::Char(c));
        }
        let mut end = start + c.len_utf8();
        while let Some(&(i, d)) = self.chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            end = i + d.len_utf8();
            self.chars.next();
        }
        Some(Chunk::Number(&self.text[start..end]))
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_chunks(a: Chunk<'_>, b: Chunk<'_>) -> Ordering {
    a.class().cmp(&b.class()).then_with(|| match (a, b) {
        (Chunk::Number(x), Chunk::Number(y)) => compare_numbers(x, y),
        (Chunk::Char(x), Chunk::Char(y)) => x.to_lowercase().cmp(y.to_lowercase()),
        _ => Ordering::Equal,
    })
}

/// Compare ignoring case entirely.
fn compare_base(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match compare_chunks(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Tiebreak for strings that are equal ignoring case: uppercase first.
fn compare_case(a: &str, b: &str) -> Ordering {
    for (x, y) in a.chars().zip(b.chars()) {
        if x == y {
            continue;
        }
        match (x.is_uppercase(), y.is_uppercase()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }
    Ordering::Equal
}

/// `text` decomposed with its combining marks dropped.
fn strip_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Combining marks attached to each base character of `text`.
fn accents(text: &str) -> Vec<Vec<char>> {
    let mut out: Vec<Vec<char>> = Vec::new();
    for c in text.nfd() {
        if !is_combining_mark(c) {
            out.push(Vec::new());
        } else if let Some(marks) = out.last_mut() {
            marks.push(c);
        }
    }
    out
}

/// Locale-style comparison of two sort-key strings.
pub fn compare_text(a: &str, b: &str, case_insensitive: bool) -> Ordering {
    let (base_a, base_b) = (strip_accents(a), strip_accents(b));
    let base = compare_base(&base_a, &base_b);
    if base != Ordering::Equal || case_insensitive {
        return base;
    }
    accents(a)
        .cmp(&accents(b))
        .then_with(|| compare_case(&base_a, &base_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut items: Vec<&str>, case_insensitive: bool) -> Vec<&str> {
        items.sort_by(|a, b| compare_text(a, b, case_insensitive));
        items
    }

    #[test]
    fn numeric_runs_compare_by_value() {
        assert_eq!(
            sorted(vec!["file10", "file2", "file1"], true),
            vec!["file1", "file2", "file10"]
        );
        assert_eq!(compare_text("v007", "v7", true), Ordering::Equal);
    }

    #[test]
    fn case_insensitive_ignores_case() {
        assert_eq!(compare_text("abc", "ABC", true), Ordering::Equal);
        assert_eq!(compare_text("Abc", "abd", true), Ordering::Less);
    }

    #[test]
    fn case_sensitive_breaks_ties_uppercase_first() {
        assert_eq!(
            sorted(vec!["abc", "Abc", "ABC"], false),
            vec!["ABC", "Abc", "abc"]
        );
        // Base letters still decide before case does.
        assert_eq!(compare_text("abc", "ABD", false), Ordering::Less);
    }

    #[test]
    fn classes_order_space_punct_digit_letter() {
        assert_eq!(
            sorted(vec!["b", "1", "#", " a"], true),
            vec![" a", "#", "1", "b"]
        );
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(compare_text("Test", "Testing", false), Ordering::Less);
        assert_eq!(compare_text("", "a", false), Ordering::Less);
    }

    #[test]
    fn non_ascii_letters_fold_case() {
        assert_eq!(compare_text("Émile", "émile", true), Ordering::Equal);
        assert_eq!(compare_text("Émile", "émile", false), Ordering::Less);
    }

    #[test]
    fn accented_letters_sort_with_their_base_letter() {
        assert_eq!(
            sorted(vec!["Zoo", "École", "Eagle", "Ñandu", "Nube", "Ōsaka", "Paris"], true),
            vec!["Eagle", "École", "Ñandu", "Nube", "Ōsaka", "Paris", "Zoo"]
        );
        assert_eq!(compare_text("École", "Ecole", true), Ordering::Equal);
    }

    #[test]
    fn accent_breaks_ties_before_case() {
        assert_eq!(compare_text("Ecole", "École", false), Ordering::Less);
        assert_eq!(compare_text("ecole", "École", false), Ordering::Less);
        assert_eq!(
            sorted(vec!["école", "Ecole", "École", "ecole"], false),
            vec!["Ecole", "ecole", "École", "école"]
        );
    }
}
