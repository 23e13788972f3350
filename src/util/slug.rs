//! Filesystem- and cache-safe identifiers derived from display names.

/// Normalize a name into a lowercase, filesystem-safe slug.
///
/// Strips everything except alphanumerics, whitespace, and hyphens, then
/// collapses whitespace/hyphen runs into single underscores. The mapping
/// is deterministic so slugs can participate in cache keys.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut cleaned = String::with_capacity(value.len());
    for ch in value.trim().chars() {
        if ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() || ch == '-' {
            cleaned.push(ch);
        }
    }

    let mut slug = String::with_capacity(cleaned.len());
    let mut pending_separator = false;
    for ch in cleaned.chars() {
        if ch.is_whitespace() || ch == '-' {
            if !slug.is_empty() {
                pending_separator = true;
            }
            continue;
        }
        if pending_separator {
            slug.push('_');
            pending_separator = false;
        }
        for lower in ch.to_lowercase() {
            slug.push(lower);
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_names() {
        assert_eq!(slugify("Cape Town"), "cape_town");
        assert_eq!(slugify("Port-au-Prince"), "port_au_prince");
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(slugify("St. John's, NL"), "st_johns_nl");
    }

    #[test]
    fn trims_and_collapses() {
        assert_eq!(slugify("  Upper   Hutt  "), "upper_hutt");
        assert_eq!(slugify("a - b"), "a_b");
    }

    #[test]
    fn deterministic() {
        assert_eq!(slugify("Wellington"), slugify("Wellington"));
    }
}
