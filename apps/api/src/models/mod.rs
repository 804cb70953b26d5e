pub mod match_result;
pub mod profile;
pub mod skill;

use unicode_normalization::UnicodeNormalization;

/// Folds free text into the form used for case-insensitive comparison and cache keys:
/// NFKC, lowercase, trimmed, inner whitespace collapsed to single spaces.
pub fn fold_key(text: &str) -> String {
    let folded: String = text.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
