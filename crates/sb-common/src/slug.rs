use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static RE_VALID_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

pub const MAX_SLUG_LEN: usize = 80;

/// URL slug for a display name.
///
/// Diacritics are stripped (`Cà phê Đà Lạt` → `ca-phe-da-lat`), anything that
/// is not an ASCII letter or digit collapses into a single `-`. Returns an
/// empty string when nothing usable remains.
pub fn slugify(name: &str) -> String {
    let folded: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' | 'Đ' => 'd',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();

    let dashed = RE_NON_SLUG.replace_all(&folded, "-");
    let mut slug = dashed.trim_matches('-').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    slug
}

pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= MAX_SLUG_LEN && RE_VALID_SLUG.is_match(slug)
}

/// `base`, or `base-N` with the smallest N >= 2 not present in `taken`.
pub fn next_free_slug<'a>(base: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let taken: std::collections::HashSet<&str> = taken.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_vietnamese_diacritics() {
        assert_eq!(slugify("Cà phê Đà Lạt"), "ca-phe-da-lat");
        assert_eq!(slugify("Nhà hàng Phở 24"), "nha-hang-pho-24");
    }

    #[test]
    fn collapses_punctuation_and_trims() {
        assert_eq!(slugify("  --Acme & Sons, Ltd.--  "), "acme-sons-ltd");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn truncates_long_names_without_trailing_dash() {
        let name = "a".repeat(79) + " b";
        let slug = slugify(&name);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn validates_slugs() {
        assert!(is_valid_slug("acme-2"));
        assert!(!is_valid_slug("Acme"));
        assert!(!is_valid_slug("acme--2"));
        assert!(!is_valid_slug("-acme"));
    }

    #[test]
    fn picks_next_free_suffix() {
        assert_eq!(next_free_slug("acme", []), "acme");
        assert_eq!(next_free_slug("acme", ["acme", "acme-2"]), "acme-3");
        assert_eq!(next_free_slug("acme", ["acme-2"]), "acme");
    }
}
