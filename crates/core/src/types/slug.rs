//! URL slugs derived from product names.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Turn a display name into a URL slug.
///
/// Lowercases, strips diacritics, collapses every run of characters outside
/// `[a-z0-9]` into a single `-` and trims dashes from both ends.
///
/// ```rust
/// # use sgtprepper_core::slugify;
/// assert_eq!(slugify("Crème Brûlée  Kit!"), "creme-brulee-kit");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.to_lowercase().nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Water Filter 2000"), "water-filter-2000");
    }

    #[test]
    fn test_slugify_trims_and_collapses() {
        assert_eq!(slugify("  --Hello,   World--  "), "hello-world");
    }

    #[test]
    fn test_slugify_strips_diacritics() {
        assert_eq!(slugify("Café Niño"), "cafe-nino");
    }

    #[test]
    fn test_slugify_drops_non_latin_letters() {
        // Danish letters without a decomposition are dropped like any symbol
        assert_eq!(slugify("Rød grød"), "r-d-gr-d");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }
}
