//! Slugs and short-link codes.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{Error, Result};
use crate::validation::is_http_url;

/// Longest slug produced by [`slugify`].
pub const MAX_SLUG_LEN: usize = 60;
/// Length of generated short-link codes.
pub const SHORT_CODE_LEN: usize = 7;
/// Longest accepted target URL.
pub const MAX_URL_LEN: usize = 2048;

/// Aliases that would shadow server routes.
const RESERVED_ALIASES: &[&str] = &[
    "api", "admin", "s", "health", "login", "logout", "register", "public", "static", "assets", "app",
    "www",
];

/// Lowercase `text` and join its ASCII alphanumeric runs with `-`.
///
/// Falls back to `"form"` when nothing usable remains.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len().min(MAX_SLUG_LEN));
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
            if slug.len() >= MAX_SLUG_LEN {
                break;
            }
        } else {
            pending_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "form".to_string()
    } else {
        slug.to_string()
    }
}

/// `base` with a numeric suffix, shortened so the result stays within [`MAX_SLUG_LEN`].
pub fn with_suffix(base: &str, n: u32) -> String {
    let suffix = format!("-{n}");
    let keep = MAX_SLUG_LEN.saturating_sub(suffix.len()).min(base.len());
    format!("{}{suffix}", base[..keep].trim_end_matches('-'))
}

/// Whether `slug` is a well-formed slug: lowercase alphanumeric runs joined by single dashes.
pub fn is_valid_slug(slug: &str) -> bool {
    (2..=MAX_SLUG_LEN).contains(&slug.len())
        && slug
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
}

/// Random alphanumeric short-link code.
pub fn generate_short_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Check a custom short-link alias.
pub fn validate_alias(alias: &str) -> Result<()> {
    if !(3..=32).contains(&alias.len()) {
        return Err(Error::Validation("alias must be 3 to 32 characters".to_string()));
    }
    if !alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::Validation(
            "alias may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }
    if RESERVED_ALIASES.contains(&alias.to_ascii_lowercase().as_str()) {
        return Err(Error::Validation(format!("alias {alias:?} is reserved")));
    }
    Ok(())
}

/// Check a short-link target.
pub fn validate_target_url(url: &str) -> Result<()> {
    if url.len() > MAX_URL_LEN {
        return Err(Error::Validation(format!(
            "target URL is longer than {MAX_URL_LEN} characters"
        )));
    }
    if !is_http_url(url) {
        return Err(Error::Validation("target URL must be an http(s) URL".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Customer Survey 2024!"), "customer-survey-2024");
        assert_eq!(slugify("  --Hello,   World--  "), "hello-world");
        assert_eq!(slugify("Ünïcode only ✓"), "n-code-only");
        assert_eq!(slugify("!!!"), "form");
        assert!(slugify(&"a".repeat(200)).len() <= MAX_SLUG_LEN);
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("contact", 2), "contact-2");
        let long = "x".repeat(MAX_SLUG_LEN);
        let suffixed = with_suffix(&long, 12);
        assert_eq!(suffixed.len(), MAX_SLUG_LEN);
        assert!(suffixed.ends_with("-12"));
    }

    #[test]
    fn test_valid_slug() {
        assert!(is_valid_slug("acme-corp"));
        assert!(!is_valid_slug("Acme"));
        assert!(!is_valid_slug("acme--corp"));
        assert!(!is_valid_slug("-acme"));
        assert!(!is_valid_slug("a"));
    }

    #[test]
    fn test_short_code() {
        let code = generate_short_code();
        assert_eq!(code.len(), SHORT_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_alias_rules() {
        assert!(validate_alias("spring-sale_24").is_ok());
        assert!(validate_alias("ab").is_err());
        assert!(validate_alias("has space").is_err());
        assert!(validate_alias("API").is_err());
        assert!(validate_alias(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_target_url() {
        assert!(validate_target_url("https://example.com/forms/1").is_ok());
        assert!(validate_target_url("javascript:alert(1)").is_err());
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        assert!(validate_target_url(&long).is_err());
    }
}
