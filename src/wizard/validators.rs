//! Answer validators
//!
//! A [`Validator`] maps a raw answer to a normalized one or rejects it with a
//! reason for the operator. Leaf validators live here as constructors;
//! [`Validator::sequence`], [`Validator::any_of`] and [`Validator::or_custom`]
//! compose them.

use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::ValidationError;
use crate::snapshot::HttpClient;

type ValidateFn = dyn Fn(&str) -> Result<String, ValidationError> + Send + Sync;

/// Composable answer check
#[derive(Clone)]
pub struct Validator {
    check: Arc<ValidateFn>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

impl Validator {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&str) -> Result<String, ValidationError> + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
        }
    }

    pub fn validate(&self, input: &str) -> Result<String, ValidationError> {
        (self.check)(input)
    }

    // ========================================================================
    // Combinators
    // ========================================================================

    /// Apply in order, feeding each output into the next; the first failure wins.
    pub fn sequence(validators: Vec<Validator>) -> Self {
        Self::new(move |input| {
            validators
                .iter()
                .try_fold(input.to_string(), |value, v| v.validate(&value))
        })
    }

    /// Accept whatever `first` accepts, otherwise whatever `second` accepts.
    pub fn any_of(first: Validator, second: Validator) -> Self {
        Self::new(move |input| first.validate(input).or_else(|_| second.validate(input)))
    }

    /// Normalize through `inner` when it accepts, pass the raw answer through otherwise.
    pub fn or_custom(inner: Validator) -> Self {
        Self::new(move |input| Ok(inner.validate(input).unwrap_or_else(|_| input.to_string())))
    }

    // ========================================================================
    // Leaf validators
    // ========================================================================

    /// Accept an option key or its 1-based display index; indices become keys.
    pub fn enum_range(choices: Vec<String>) -> Self {
        Self::new(move |input| pick_choice(&choices, input))
    }

    pub fn required() -> Self {
        Self::new(|input| {
            if input.trim().is_empty() {
                Err(ValidationError::new("Please provide this required option."))
            } else {
                Ok(input.to_string())
            }
        })
    }

    /// Existing regular file; `~/` is expanded. Empty input passes.
    pub fn filepath() -> Self {
        Self::new(|input| {
            if input.is_empty() {
                return Ok(String::new());
            }
            let expanded = expand_home(input);
            if Path::new(&expanded).is_file() {
                Ok(expanded)
            } else {
                Err(ValidationError::new("Please input a valid file path."))
            }
        })
    }

    /// Existing directory. Empty input passes.
    pub fn dirpath() -> Self {
        Self::new(|input| {
            if input.is_empty() || Path::new(input).is_dir() {
                Ok(input.to_string())
            } else {
                Err(ValidationError::new("Please input a valid path to a directory."))
            }
        })
    }

    /// URL answering a HEAD request. With `suffix`, the suffix is appended as
    /// a path segment before probing, and the full URL is returned.
    pub fn reachable_url(client: Arc<dyn HttpClient>, suffix: Option<&str>) -> Self {
        let suffix = suffix.map(str::to_string);
        Self::new(move |input| {
            let url = full_url(input.trim(), suffix.as_deref());
            match client.content_length(&url) {
                Ok(_) => Ok(url),
                Err(err) => {
                    tracing::debug!(%url, error = %err, "URL probe failed");
                    Err(ValidationError::new(format!(
                        "{} is unreachable. Please input a valid URL.",
                        url
                    )))
                }
            }
        })
    }

    pub fn secret_key() -> Self {
        regex_validator(
            secret_key_regex,
            "The input doesn't match the format for a Tezos secret key: \
             {encrypted, unencrypted}:<base58 encoded string with length 54 or 88>\n\
             Please check the input and try again.",
        )
    }

    pub fn signer_uri() -> Self {
        regex_validator(
            signer_uri_regex,
            "The input doesn't match the format for a remote signer URI: \
             (tcp|unix|https|http)://<host address>/<public key address>\n\
             Please check the input and try again.",
        )
    }

    pub fn derivation_path() -> Self {
        regex_validator(
            derivation_path_regex,
            "The input doesn't match the format for a derivation path: [0-9]+h/[0-9]+h\n\
             Please check the input and try again.",
        )
    }

    pub fn protocol_hash() -> Self {
        regex_validator(
            protocol_hash_regex,
            "The input doesn't match the format for a protocol hash: \
             P followed by 50 base58 characters\n\
             Please check the input and try again.",
        )
    }

    pub fn address() -> Self {
        regex_validator(
            address_regex,
            "The input doesn't match the format for a Tezos address: tz1, tz2 or tz3 \
             followed by 33 characters\nPlease check the input and try again.",
        )
    }
}

fn pick_choice(choices: &[String], input: &str) -> Result<String, ValidationError> {
    let input = input.trim();
    if let Ok(index) = input.parse::<usize>() {
        if (1..=choices.len()).contains(&index) {
            return Ok(choices[index - 1].clone());
        }
    }
    if choices.iter().any(|c| c == input) {
        return Ok(input.to_string());
    }
    Err(ValidationError::new(
        "Please choose one of the provided values or use their respective numbers.",
    ))
}

fn regex_validator(pattern: fn() -> &'static Regex, message: &'static str) -> Validator {
    Validator::new(move |input| {
        let trimmed = input.trim();
        if pattern().is_match(trimmed) {
            Ok(trimmed.to_string())
        } else {
            Err(ValidationError::new(message))
        }
    })
}

fn expand_home(input: &str) -> String {
    match (input.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => input.to_string(),
    }
}

/// `base` with `suffix` appended as the last path segment.
pub fn full_url(base: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{}/{}", base.trim_end_matches('/'), suffix),
        None => base.to_string(),
    }
}

// ============================================================================
// Patterns
// ============================================================================

macro_rules! anchored {
    ($name:ident, $pattern:expr) => {
        pub fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| {
                Regex::new(concat!("^(?:", $pattern, ")$")).expect("static pattern compiles")
            })
        }
    };
}

anchored!(secret_key_regex, r"(encrypted|unencrypted):(?:\w{54}|\w{88})");
anchored!(address_regex, r"tz[123]\w{33}");
anchored!(
    protocol_hash_regex,
    r"P[123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz]{50}"
);
anchored!(ledger_regex, r"ledger://[\w\-]+/[\w\-]+/[\w']+/[\w']+");
anchored!(derivation_path_regex, r"[0-9]+h/[0-9]+h");
anchored!(signer_uri_regex, r"((?:tcp|unix|https|http)://.+)/(tz[123]\w{33})/?");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::http::tests::MockHttpClient;

    fn choices() -> Vec<String> {
        vec!["rolling".into(), "full".into(), "archive".into()]
    }

    #[test]
    fn test_enum_range_index_and_key() {
        let v = Validator::enum_range(choices());
        assert_eq!(v.validate("2").unwrap(), "full");
        assert_eq!(v.validate("archive").unwrap(), "archive");
        assert_eq!(v.validate(" 1 ").unwrap(), "rolling");
        assert!(v.validate("0").is_err());
        assert!(v.validate("4").is_err());
        assert!(v.validate("experimental").is_err());
    }

    #[test]
    fn test_required() {
        assert!(Validator::required().validate("   ").is_err());
        assert_eq!(Validator::required().validate("x").unwrap(), "x");
    }

    #[test]
    fn test_sequence_stops_at_first_failure() {
        let upper = Validator::new(|s| Ok(s.to_uppercase()));
        let v = Validator::sequence(vec![Validator::required(), upper.clone()]);
        assert_eq!(v.validate("abc").unwrap(), "ABC");
        let err = v.validate("").unwrap_err();
        assert_eq!(err.0, "Please provide this required option.");
    }

    #[test]
    fn test_any_of() {
        let v = Validator::any_of(Validator::secret_key(), Validator::signer_uri());
        let key = format!("unencrypted:edsk{}", "a".repeat(50));
        assert_eq!(v.validate(&key).unwrap(), key);
        let uri = format!("tcp://10.0.0.1:7732/tz1{}", "b".repeat(33));
        assert_eq!(v.validate(&uri).unwrap(), uri);
        assert!(v.validate("nonsense").is_err());
    }

    #[test]
    fn test_or_custom_passes_raw_input() {
        let v = Validator::or_custom(Validator::enum_range(choices()));
        assert_eq!(v.validate("3").unwrap(), "archive");
        assert_eq!(v.validate("custom-value").unwrap(), "custom-value");
    }

    #[test]
    fn test_filepath_and_dirpath() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("node.snapshot");
        std::fs::write(&file, b"data").unwrap();
        let file = file.to_string_lossy().into_owned();
        let dir_str = dir.path().to_string_lossy().into_owned();

        assert_eq!(Validator::filepath().validate(&file).unwrap(), file);
        assert!(Validator::filepath().validate(&dir_str).is_err());
        assert_eq!(Validator::filepath().validate("").unwrap(), "");
        assert!(Validator::dirpath().validate(&dir_str).is_ok());
        assert!(Validator::dirpath().validate(&file).is_err());
    }

    #[test]
    fn test_regex_validators() {
        assert!(Validator::derivation_path().validate("44h/1729h").is_ok());
        assert!(Validator::derivation_path().validate("44/1729").is_err());
        let proto = format!("P{}", "t".repeat(50));
        assert!(Validator::protocol_hash().validate(&proto).is_ok());
        assert!(Validator::protocol_hash().validate("Pt0").is_err());
        let address = format!("tz3{}", "c".repeat(33));
        assert!(Validator::address().validate(&address).is_ok());
        assert!(Validator::address().validate("tz4abc").is_err());
        assert!(ledger_regex().is_match("ledger://happy-cat-dog-fish/ed25519/0h/1h"));
    }

    #[test]
    fn test_reachable_url() {
        let client = Arc::new(
            MockHttpClient::default().with_body("https://snap.example/tezos-snapshots.json", "[]"),
        );
        let direct = Validator::reachable_url(client.clone(), None);
        assert!(direct.validate("https://snap.example/none").is_err());

        let with_suffix = Validator::reachable_url(client, Some("tezos-snapshots.json"));
        assert_eq!(
            with_suffix.validate("https://snap.example/").unwrap(),
            "https://snap.example/tezos-snapshots.json"
        );
    }
}
