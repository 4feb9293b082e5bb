//! Package specification newtype for marketplace downloads.
//!
//! A [`PackageSpec`] names one extension build: `publisher.name`, a version,
//! and an optional target platform. Every component is validated against a
//! conservative character set at construction so that the marketplace URL and
//! the fallback filename can be built by plain formatting.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between the publisher and the extension name.
const IDENTIFIER_SEPARATOR: char = '.';

/// Separator between identifier, version, and platform in the textual form.
const FIELD_SEPARATOR: char = '@';

/// Errors arising from invalid package specifications.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// The identifier is not of the form `publisher.name`.
    #[error("invalid extension identifier \"{value}\": {reason}")]
    InvalidIdentifier {
        /// The rejected identifier.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The version is empty or contains unsupported characters.
    #[error("invalid version \"{value}\": {reason}")]
    InvalidVersion {
        /// The rejected version string.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The target platform contains unsupported characters.
    #[error("invalid target platform \"{value}\": {reason}")]
    InvalidPlatform {
        /// The rejected platform string.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The textual form does not have two or three `@`-separated fields.
    #[error("invalid package spec \"{value}\"; expected publisher.name@version[@platform]")]
    Malformed {
        /// The rejected input.
        value: String,
    },
}

/// A validated request for one extension package.
///
/// # Examples
///
/// ```
/// use vsix_fetch::artefact::spec::PackageSpec;
///
/// let spec = PackageSpec::new("acme.widget", "1.2.3", Some("linux-x64"))
///     .expect("valid spec");
/// assert_eq!(spec.publisher(), "acme");
/// assert_eq!(spec.name(), "widget");
/// assert_eq!(spec.to_string(), "acme.widget@1.2.3@linux-x64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    identifier: String,
    version: String,
    target_platform: Option<String>,
}

impl PackageSpec {
    /// Validate and build a specification.
    ///
    /// A blank platform is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] naming the first component that fails
    /// validation.
    pub fn new(
        identifier: &str,
        version: &str,
        target_platform: Option<&str>,
    ) -> Result<Self, SpecError> {
        validate_identifier(identifier)?;
        validate_version(version)?;
        let target_platform = match target_platform.map(str::trim) {
            Some(platform) if !platform.is_empty() => {
                validate_platform(platform)?;
                Some(platform.to_owned())
            }
            _ => None,
        };
        Ok(Self {
            identifier: identifier.to_owned(),
            version: version.to_owned(),
            target_platform,
        })
    }

    /// Return the full `publisher.name` identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Return the publisher component.
    #[must_use]
    pub fn publisher(&self) -> &str {
        self.split_identifier().0
    }

    /// Return the extension name component.
    #[must_use]
    pub fn name(&self) -> &str {
        self.split_identifier().1
    }

    /// Return the requested version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Return the target platform, if any.
    #[must_use]
    pub fn target_platform(&self) -> Option<&str> {
        self.target_platform.as_deref()
    }

    fn split_identifier(&self) -> (&str, &str) {
        // Validated at construction, so the separator is always present.
        self.identifier
            .split_once(IDENTIFIER_SEPARATOR)
            .unwrap_or((self.identifier.as_str(), ""))
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{FIELD_SEPARATOR}{}", self.identifier, self.version)?;
        if let Some(platform) = &self.target_platform {
            write!(f, "{FIELD_SEPARATOR}{platform}")?;
        }
        Ok(())
    }
}

impl Serialize for PackageSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for PackageSpec {
    type Err = SpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = value.trim().split(FIELD_SEPARATOR).collect();
        match fields.as_slice() {
            [identifier, version] => Self::new(identifier, version, None),
            [identifier, version, platform] => Self::new(identifier, version, Some(platform)),
            _ => Err(SpecError::Malformed {
                value: value.to_owned(),
            }),
        }
    }
}

fn is_component_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn validate_identifier(value: &str) -> Result<(), SpecError> {
    let invalid = |reason: &str| SpecError::InvalidIdentifier {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };
    let Some((publisher, name)) = value.split_once(IDENTIFIER_SEPARATOR) else {
        return Err(invalid("expected publisher.name"));
    };
    if name.contains(IDENTIFIER_SEPARATOR) {
        return Err(invalid("expected exactly one '.' separator"));
    }
    if publisher.is_empty() || name.is_empty() {
        return Err(invalid("publisher and name must both be non-empty"));
    }
    if let Some(bad) = value
        .chars()
        .find(|&c| c != IDENTIFIER_SEPARATOR && !is_component_char(c))
    {
        return Err(SpecError::InvalidIdentifier {
            value: value.to_owned(),
            reason: format!("unsupported character '{bad}'"),
        });
    }
    Ok(())
}

fn validate_version(value: &str) -> Result<(), SpecError> {
    if value.is_empty() {
        return Err(SpecError::InvalidVersion {
            value: value.to_owned(),
            reason: "version must not be empty".to_owned(),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|&c| !is_component_char(c) && c != '.' && c != '+')
    {
        return Err(SpecError::InvalidVersion {
            value: value.to_owned(),
            reason: format!("unsupported character '{bad}'"),
        });
    }
    if value.contains("..") {
        return Err(SpecError::InvalidVersion {
            value: value.to_owned(),
            reason: "version must not contain '..'".to_owned(),
        });
    }
    Ok(())
}

fn validate_platform(value: &str) -> Result<(), SpecError> {
    if let Some(bad) = value.chars().find(|&c| !is_component_char(c)) {
        return Err(SpecError::InvalidPlatform {
            value: value.to_owned(),
            reason: format!("unsupported character '{bad}'"),
        });
    }
    Ok(())
}
