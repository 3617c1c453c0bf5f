//! Directory login name type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`LoginName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginNameError {
    /// The input is not of the form `user@domain`.
    #[error("user loginName is not an email address: {0}")]
    NotAnEmail(String),
    /// The part before the @ is empty.
    #[error("login name has an empty user part: {0}")]
    EmptyUser(String),
    /// The part after the @ is empty.
    #[error("login name has an empty domain: {0}")]
    EmptyDomain(String),
}

/// A directory login name (`user@domain`).
///
/// Splitting on `@` must give exactly two non-empty parts. The part before the
/// `@` is the name the SMC knows the administrator by.
///
/// ## Examples
///
/// ```
/// use smc_connector_core::LoginName;
///
/// let login = LoginName::parse("jdoe@corp.example.com").unwrap();
/// assert_eq!(login.smc_name(), "jdoe");
/// assert_eq!(login.domain(), "corp.example.com");
///
/// assert!(LoginName::parse("not-an-email").is_err());
/// assert!(LoginName::parse("a@b@c").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct LoginName {
    user: String,
    domain: String,
}

impl LoginName {
    /// Parse a `LoginName` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error unless the input splits on `@` into exactly two
    /// non-empty parts.
    pub fn parse(s: &str) -> Result<Self, LoginNameError> {
        let mut parts = s.split('@');
        let (Some(user), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(LoginNameError::NotAnEmail(s.to_owned()));
        };

        if user.is_empty() {
            return Err(LoginNameError::EmptyUser(s.to_owned()));
        }
        if domain.is_empty() {
            return Err(LoginNameError::EmptyDomain(s.to_owned()));
        }

        Ok(Self {
            user: user.to_owned(),
            domain: domain.to_owned(),
        })
    }

    /// The SMC administrator name (the part before the @).
    #[must_use]
    pub fn smc_name(&self) -> &str {
        &self.user
    }

    /// The directory domain (the part after the @).
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for LoginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.domain)
    }
}

impl std::str::FromStr for LoginName {
    type Err = LoginNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LoginName {
    type Error = LoginNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LoginName> for String {
    fn from(value: LoginName) -> Self {
        value.to_string()
    }
}
