use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Default character n-gram size for the n-gram name index.
pub const DEFAULT_NGRAM_SIZE: usize = 4;

/// True for characters that separate words inside a name: ASCII and
/// Unicode punctuation plus symbols. Combining marks are kept because
/// several scripts (Sinhala, Arabic) carry vowels in them.
pub fn is_separator(c: char) -> bool {
    if c.is_ascii_punctuation() {
        return true;
    }
    !(c.is_alphanumeric() || c.is_whitespace() || is_combining_mark(c))
}

/// Replace any run of whitespace with a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace punctuation and symbols with spaces, then collapse whitespace.
pub fn replace_punctuation(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if is_separator(c) { ' ' } else { c })
        .collect();
    collapse_whitespace(&replaced)
}

/// NFKC-compose, replace punctuation with spaces and collapse whitespace.
/// Case is kept.
pub fn normalize_surface(text: &str) -> String {
    let composed: String = text.nfkc().collect();
    replace_punctuation(&composed)
}

/// Canonical form used for name comparison: [`normalize_surface`] plus
/// lowercasing.
pub fn normalize_name(text: &str) -> String {
    normalize_surface(text).to_lowercase()
}

/// Case-insensitive key that keeps punctuation (exact name matching).
pub fn name_key(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
}

/// Character n-grams of `text`. Shorter strings yield a single gram.
pub fn ngrams(text: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if n == 0 || chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= n {
        return vec![chars.iter().collect()];
    }
    chars.windows(n).map(|w| w.iter().collect()).collect()
}

/// Initials of each whitespace-separated word, uppercased.
pub fn initials(text: &str) -> String {
    text.split_whitespace()
        .filter_map(|w| w.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// An all-caps string of at least `min_len` characters with at least one
/// letter, e.g. "UNICEF" or "AU".
pub fn looks_like_acronym(text: &str, min_len: usize) -> bool {
    text.chars().count() >= min_len
        && text.chars().any(char::is_alphabetic)
        && text.to_uppercase() == text
        && text.to_lowercase() != text
}

/// True if every character is ASCII.
pub fn is_ascii(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii())
}
