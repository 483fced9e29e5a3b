//! Slug normalization and uniqueness for agent identifiers.
//!
//! A slug is the URL-safe handle an agent is reachable under
//! (`/api/public/agents/{slug}`). Normalization is idempotent, so values
//! arriving from a URL can be re-normalized before lookup without drift.

use thiserror::Error;

pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 100;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must have at least {MIN_SLUG_LEN} characters")]
    TooShort,
    #[error("slug cannot exceed {MAX_SLUG_LEN} characters")]
    TooLong,
    #[error("slug may only contain lowercase letters, digits, and single hyphens")]
    InvalidFormat,
}

/// Lowercase, strip accents, and collapse everything else into single hyphens.
///
/// The result matches `^[a-z0-9]+(-[a-z0-9]+)*$` or is empty when the input
/// carries no usable characters.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut push = |ch: char, out: &mut String| {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            out.push(lower);
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    };

    for ch in input.chars() {
        match fold_accent(ch) {
            Some(folded) => {
                for f in folded.chars() {
                    push(f, &mut out);
                }
            }
            None => push(ch, &mut out),
        }
    }

    out.trim_matches('-').to_string()
}

/// Check a slug against the canonical format and length bounds.
pub fn validate(slug: &str) -> Result<(), SlugError> {
    if slug.is_empty() {
        return Err(SlugError::Empty);
    }
    if slug.chars().count() < MIN_SLUG_LEN {
        return Err(SlugError::TooShort);
    }
    if slug.chars().count() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong);
    }

    let mut previous = '-';
    for ch in slug.chars() {
        let allowed = ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-';
        if !allowed || (ch == '-' && previous == '-') {
            return Err(SlugError::InvalidFormat);
        }
        previous = ch;
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(SlugError::InvalidFormat);
    }

    Ok(())
}

/// Produce a slug absent from `existing` by appending `-1`, `-2`, ...
pub fn generate_unique(base: &str, existing: &[String]) -> String {
    let normalized = normalize(base);

    if !existing.iter().any(|slug| *slug == normalized) {
        return normalized;
    }

    let mut counter = 1u32;
    loop {
        let candidate = format!("{normalized}-{counter}");
        if !existing.iter().any(|slug| *slug == candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Fold the Latin-1 / Latin Extended-A accents that show up in agent names.
/// Characters outside the table fall through to the plain per-char handling
/// in `normalize`, which keeps ASCII alphanumerics and drops the rest.
fn fold_accent(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => "e",
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => "i",
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => "o",
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => "u",
        'ç' | 'Ç' => "c",
        'ñ' | 'Ñ' => "n",
        'ý' | 'ÿ' | 'Ý' => "y",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        'ß' => "ss",
        'ø' | 'Ø' => "o",
        'š' | 'Š' => "s",
        'ž' | 'Ž' => "z",
        _ => return None,
    };
    Some(folded)
}
