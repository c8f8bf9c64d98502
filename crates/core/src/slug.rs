//! Slug derivation.
//!
//! Slugs are computed explicitly at creation time (when the caller does not
//! supply one) rather than by a hidden persistence hook.

/// Derive a URL slug from a title.
///
/// Lowercases, keeps ASCII alphanumerics, and collapses every other run of
/// characters into a single hyphen. Leading/trailing hyphens are stripped.
///
/// ```
/// use verdant_core::slugify;
///
/// assert_eq!(slugify("Organic Cotton Tee"), "organic-cotton-tee");
/// assert_eq!(slugify("  Hemp -- Tote!  "), "hemp-tote");
/// ```
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("Recycled Wool Scarf"), "recycled-wool-scarf");
    }

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(slugify("Hemp -- & -- Linen"), "hemp-linen");
    }

    #[test]
    fn strips_edge_hyphens() {
        assert_eq!(slugify("  !Tote!  "), "tote");
    }

    #[test]
    fn empty_and_symbol_only_input_yields_empty_slug() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn keeps_digits() {
        assert_eq!(slugify("Denim 501 Classic"), "denim-501-classic");
    }
}
