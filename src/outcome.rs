use std::fmt;

/// Closed set of API failures recognized by status code.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    RequestEntityTooLarge,
    /// The only kind that may carry a detail string parsed from the body.
    InvalidRequest,
    TooManyRequests,
    GatewayTimeout,
}

impl ErrorKind {
    /// Every recognized kind, in status-code order.
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::BadRequest,
        ErrorKind::Unauthorized,
        ErrorKind::PaymentRequired,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::RequestEntityTooLarge,
        ErrorKind::InvalidRequest,
        ErrorKind::TooManyRequests,
        ErrorKind::GatewayTimeout,
    ];

    /// Maps a status code to its kind. Success and unknown codes yield `None`.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            402 => Some(Self::PaymentRequired),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            413 => Some(Self::RequestEntityTooLarge),
            422 => Some(Self::InvalidRequest),
            429 => Some(Self::TooManyRequests),
            504 => Some(Self::GatewayTimeout),
            _ => None,
        }
    }

    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::PaymentRequired => 402,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::RequestEntityTooLarge => 413,
            Self::InvalidRequest => 422,
            Self::TooManyRequests => 429,
            Self::GatewayTimeout => 504,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::PaymentRequired => "Payment Required",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::RequestEntityTooLarge => "Request Entity Too Large",
            Self::InvalidRequest => "Invalid Request",
            Self::TooManyRequests => "Too Many Requests",
            Self::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// Canned human-readable explanation.
    pub fn message(self) -> &'static str {
        match self {
            Self::BadRequest => "The request was malformed or missing a required parameter.",
            Self::Unauthorized => "The supplied credentials are missing or invalid.",
            Self::PaymentRequired => "The account has no remaining credit for this request.",
            Self::Forbidden => "The credentials do not grant access to this resource.",
            Self::NotFound => "The requested resource does not exist.",
            Self::RequestEntityTooLarge => {
                "The request payload exceeds the size accepted by the server."
            }
            Self::InvalidRequest => "The request was well-formed but contained invalid values.",
            Self::TooManyRequests => "Too many requests were sent in a given amount of time.",
            Self::GatewayTimeout => "The upstream server did not respond in time.",
        }
    }

    /// Whether the classifier reads the response body for this kind.
    pub fn carries_detail(self) -> bool {
        matches!(self, Self::InvalidRequest)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One classified API failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorOutcome {
    pub kind: ErrorKind,
    pub status_code: u16,
    pub name: &'static str,
    pub message: &'static str,
    /// Server-provided explanation, only ever set for [`ErrorKind::InvalidRequest`].
    pub detail: Option<String>,
}

impl ErrorOutcome {
    /// Builds the canned outcome for `kind` with no detail.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            status_code: kind.status_code(),
            name: kind.name(),
            message: kind.message(),
            detail: None,
        }
    }

    /// Attaches a detail string. Ignored for kinds that never carry one.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        if self.kind.carries_detail() {
            self.detail = Some(detail.into());
        }
        self
    }
}

impl From<ErrorKind> for ErrorOutcome {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for ErrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status_code, self.name, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorOutcome {}

/// Result of the typed pipeline: a decoded body or a classified failure.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(ErrorOutcome),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Converts into a plain `Result`, with the outcome as the error.
    pub fn into_result(self) -> std::result::Result<T, ErrorOutcome> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(outcome) => Err(outcome),
        }
    }
}
