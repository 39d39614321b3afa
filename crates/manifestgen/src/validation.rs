// Checks for identifiers which end up in generated Kubernetes objects. Kubernetes enforces
// these rules on admission, so anything accepted here is also accepted by the API server.
// See apimachinery/pkg/util/validation/validation.go in the Kubernetes source.

use std::{fmt::Display, sync::LazyLock};

use const_format::concatcp;
use regex::Regex;
use snafu::Snafu;

/// Application and resource names are lowercase labels, the same as Kubernetes Service names.
const RESOURCE_NAME_MAX_LENGTH: usize = 63;
const RESOURCE_NAME_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const RESOURCE_NAME_ERROR_MSG: &str = "a resource name must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character";

const RFC_1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const RFC_1123_SUBDOMAIN_FMT: &str =
    concatcp!(RESOURCE_NAME_FMT, "(\\.", RESOURCE_NAME_FMT, ")*");
const RFC_1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

// IANA service names, which Kubernetes uses for named ports
const PORT_NAME_MAX_LENGTH: usize = 15;
const PORT_NAME_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const PORT_NAME_LETTER_FMT: &str = "[a-z]";
const PORT_NAME_ERROR_MSG: &str = "a port name must consist of lower case alphanumeric characters or '-', must start and end with an alphanumeric character and must contain at least one letter";

const ENV_VAR_NAME_FMT: &str = "[-._a-zA-Z][-._a-zA-Z0-9]*";
const ENV_VAR_NAME_ERROR_MSG: &str = "a valid environment variable name must consist of alphabetic characters, digits, '_', '-', or '.', and must not start with a digit";

const LABEL_VALUE_MAX_LENGTH: usize = 63;
const LABEL_VALUE_FMT: &str = "(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?";
const LABEL_VALUE_ERROR_MSG: &str = "a valid label value must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

const QUALIFIED_NAME_MAX_LENGTH: usize = 63;
const QUALIFIED_NAME_FMT: &str = "[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?";
const QUALIFIED_NAME_ERROR_MSG: &str = "a qualified name must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

static RESOURCE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RESOURCE_NAME_FMT}$")).expect("failed to compile resource name regex")
});

static RFC_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile RFC 1123 subdomain regex")
});

static PORT_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{PORT_NAME_FMT}$")).expect("failed to compile port name regex")
});

static PORT_NAME_LETTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(PORT_NAME_LETTER_FMT).expect("failed to compile port name letter regex")
});

static ENV_VAR_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{ENV_VAR_NAME_FMT}$"))
        .expect("failed to compile environment variable name regex")
});

static LABEL_VALUE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{LABEL_VALUE_FMT}$")).expect("failed to compile label value regex")
});

static QUALIFIED_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{QUALIFIED_NAME_FMT}$"))
        .expect("failed to compile qualified name regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation.
#[derive(Debug)]
pub struct Errors(Vec<Error>);

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Regex { source: RegexError },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },

    #[snafu(display("input must not be empty"))]
    Empty,
}

#[derive(Debug)]
pub struct RegexError {
    /// The primary error message.
    msg: &'static str,

    /// The regex that the input must match.
    regex: &'static str,

    /// Examples of valid inputs (if non-empty).
    examples: &'static [&'static str],
}

impl Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            msg,
            regex,
            examples,
        } = self;
        write!(f, "{msg} (")?;
        for (i, example) in examples.iter().enumerate() {
            let prefix = match i {
                0 => "e.g.",
                _ => "or",
            };
            write!(f, "{prefix} {example:?}, ")?;
        }
        write!(f, "regex used for validation is {regex:?})")
    }
}

impl std::error::Error for RegexError {}

fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
    examples: &'static [&'static str],
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
            examples,
        }
        .into())
    }
}

fn validate_not_empty(value: &str) -> Result<(), Error> {
    if value.is_empty() {
        EmptySnafu.fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(|res| res.err())
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Tests for a lowercase DNS label (RFC 1123) of at most 63 characters. Application names and
/// the names of every generated object must pass this check.
pub fn is_resource_name(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RESOURCE_NAME_MAX_LENGTH),
        validate_str_regex(
            value,
            &RESOURCE_NAME_REGEX,
            RESOURCE_NAME_ERROR_MSG,
            &["my-app", "app-123"],
        ),
    ])
}

/// Tests for a lowercase DNS subdomain (RFC 1123), used for hosts and API groups.
pub fn is_rfc_1123_subdomain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_SUBDOMAIN_REGEX,
            RFC_1123_SUBDOMAIN_ERROR_MSG,
            &["example.com"],
        ),
    ])
}

/// Tests for an IANA service name as used by named container ports.
pub fn is_port_name(value: &str) -> Result {
    let letter = if PORT_NAME_LETTER_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: PORT_NAME_ERROR_MSG,
            regex: PORT_NAME_LETTER_FMT,
            examples: &["http", "grpc-1"],
        }
        .into())
    };

    validate_all([
        validate_str_length(value, PORT_NAME_MAX_LENGTH),
        validate_str_regex(
            value,
            &PORT_NAME_REGEX,
            PORT_NAME_ERROR_MSG,
            &["http", "grpc-1"],
        ),
        letter,
    ])
}

pub fn is_env_var_name(value: &str) -> Result {
    validate_all([validate_str_regex(
        value,
        &ENV_VAR_NAME_REGEX,
        ENV_VAR_NAME_ERROR_MSG,
        &["MY_ENV", "MY.ENV"],
    )])
}

pub fn is_label_value(value: &str) -> Result {
    validate_all([
        validate_str_length(value, LABEL_VALUE_MAX_LENGTH),
        validate_str_regex(
            value,
            &LABEL_VALUE_REGEX,
            LABEL_VALUE_ERROR_MSG,
            &["1.0.0", "my_value"],
        ),
    ])
}

/// Tests for a label or annotation key of the form `(<prefix>/)<name>`.
pub fn is_qualified_key(value: &str) -> Result {
    let (prefix, name) = match value.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, value),
    };

    let mut validations = vec![
        validate_not_empty(name),
        validate_str_length(name, QUALIFIED_NAME_MAX_LENGTH),
        validate_str_regex(
            name,
            &QUALIFIED_NAME_REGEX,
            QUALIFIED_NAME_ERROR_MSG,
            &["name", "app.kubernetes.io/name"],
        ),
    ];

    if let Some(prefix) = prefix {
        validations.push(validate_str_length(prefix, RFC_1123_SUBDOMAIN_MAX_LENGTH));
        validations.push(validate_str_regex(
            prefix,
            &RFC_1123_SUBDOMAIN_REGEX,
            RFC_1123_SUBDOMAIN_ERROR_MSG,
            &["example.com"],
        ));
    }

    validate_all(validations)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("a")]
    #[case("my-app")]
    #[case("1-app-1")]
    #[case("a23456789012345678901234567890123456789012345678901234567890123")]
    fn valid_resource_names(#[case] value: &str) {
        assert!(is_resource_name(value).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("-")]
    #[case("a-")]
    #[case("-a")]
    #[case("My-App")]
    #[case("my_app")]
    #[case("my.app")]
    #[case("a b")]
    #[case("a234567890123456789012345678901234567890123456789012345678901234")]
    fn invalid_resource_names(#[case] value: &str) {
        assert!(is_resource_name(value).is_err());
    }

    #[rstest]
    #[case("http", true)]
    #[case("grpc-1", true)]
    #[case("8080", false)]
    #[case("HTTP", false)]
    #[case("a-very-long-port-name", false)]
    fn port_names(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_port_name(value).is_ok(), valid);
    }

    #[rstest]
    #[case("MY_ENV", true)]
    #[case("my.env", true)]
    #[case("_X", true)]
    #[case("1ENV", false)]
    #[case("MY ENV", false)]
    #[case("", false)]
    fn env_var_names(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_env_var_name(value).is_ok(), valid);
    }

    #[rstest]
    #[case("", true)]
    #[case("1.0.0-SNAPSHOT", true)]
    #[case("unset", true)]
    #[case("<<unset>>", false)]
    #[case("-1.0", false)]
    fn label_values(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_label_value(value).is_ok(), valid);
    }

    #[rstest]
    #[case("app", true)]
    #[case("app.kubernetes.io/name", true)]
    #[case("prometheus.io/scrape", true)]
    #[case("/name", false)]
    #[case("example.com/", false)]
    #[case("Example_.com/name", false)]
    fn qualified_keys(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_qualified_key(value).is_ok(), valid);
    }

    #[test]
    fn all_errors_are_reported() {
        let errors = is_resource_name(&"A".repeat(64)).expect_err("name is invalid");
        let message = errors.to_string();

        assert!(message.contains("must be no more than 63"), "{message}");
        assert!(message.contains("lower case alphanumeric"), "{message}");
    }
}
