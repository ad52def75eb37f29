use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::HeaderValue;

use crate::{ApiError, Result};

/// Authentication material injected into every request of a client.
#[derive(Clone, Default, Eq, PartialEq)]
pub enum Credential {
    #[default]
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `Authorization: Basic <base64(user:password)>`.
    Basic { user: String, password: String },
}

impl Credential {
    /// Creates a bearer credential.
    ///
    /// A leading `Bearer ` prefix on `token` is tolerated and stripped.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        let trimmed = token.as_ref().trim();
        let token = match trimmed.get(..7) {
            Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim_start(),
            _ => trimmed,
        };
        Self::Bearer(token.to_owned())
    }

    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Renders the `Authorization` header value, `None` when no credential is set.
    pub fn authorization(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Bearer(token) => Some(format!("Bearer {token}")),
            Self::Basic { user, password } => {
                Some(format!("Basic {}", STANDARD.encode(format!("{user}:{password}"))))
            }
        }
    }

    pub(crate) fn header_value(&self) -> Result<Option<HeaderValue>> {
        let Some(value) = self.authorization() else {
            return Ok(None);
        };
        let mut header = HeaderValue::from_str(&value).map_err(|err| {
            ApiError::Config(format!("credential is not a valid header value: {err}"))
        })?;
        header.set_sensitive(true);
        Ok(Some(header))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
            Self::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Credential;

    #[test]
    fn bearer_renders_prefix() {
        assert_eq!(
            Credential::bearer("abc123").authorization().as_deref(),
            Some("Bearer abc123")
        );
    }

    #[test]
    fn bearer_strips_existing_prefix() {
        assert_eq!(Credential::bearer("bEaReR abc123"), Credential::Bearer("abc123".to_owned()));
    }

    #[test]
    fn basic_encodes_user_and_password() {
        assert_eq!(
            Credential::basic("Aladdin", "open sesame").authorization().as_deref(),
            Some("Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==")
        );
    }

    #[test]
    fn none_has_no_header() {
        assert!(Credential::None.header_value().unwrap().is_none());
    }

    #[test]
    fn header_value_is_sensitive() {
        let header = Credential::bearer("t").header_value().unwrap().unwrap();
        assert!(header.is_sensitive());
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!(
            "{:?} {:?}",
            Credential::bearer("secret-token"),
            Credential::basic("kit", "hunter2")
        );
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("kit"));
    }
}
