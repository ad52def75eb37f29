use reqwest::{Response, StatusCode};

use crate::{wire::ErrorEnvelope, ApiError, ErrorKind, ErrorOutcome, Outcome, Result};

/// Classifies a response into success (`Ok(None)`) or one recognized failure.
///
/// The body is only consumed for 422, where it may contain a detail message,
/// and for unrecognized statuses, where it is attached to the returned
/// [`ApiError::UnrecognizedStatus`].
pub async fn classify(response: Response) -> Result<Option<ErrorOutcome>> {
    match resolve(response, false).await? {
        Outcome::Success(_) => Ok(None),
        Outcome::Failure(outcome) => Ok(Some(outcome)),
    }
}

/// Like [`classify`], but hands back the body text on success.
pub async fn classify_text(response: Response) -> Result<Outcome<String>> {
    resolve(response, true).await
}

async fn resolve(response: Response, read_success_body: bool) -> Result<Outcome<String>> {
    let outcome = match outcome_for_status(response.status()) {
        Ok(outcome) => outcome,
        Err(ApiError::UnrecognizedStatus { status, .. }) => {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::UnrecognizedStatus { status, body });
        }
        Err(err) => return Err(err),
    };

    match outcome {
        None if read_success_body => {
            let body = response.text().await.map_err(ApiError::Transport)?;
            Ok(Outcome::Success(body))
        }
        None => Ok(Outcome::Success(String::new())),
        Some(outcome) if outcome.kind.carries_detail() => {
            // An unreadable body degrades to "no detail" like a malformed one.
            let body = response.text().await.unwrap_or_default();
            Ok(Outcome::Failure(with_parsed_detail(outcome, &body)))
        }
        Some(outcome) => Ok(Outcome::Failure(outcome)),
    }
}

/// Status-only classification. Never reads a body, so a 422 outcome comes back
/// without detail.
pub fn outcome_for_status(status: StatusCode) -> Result<Option<ErrorOutcome>> {
    if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    match ErrorKind::from_status(status.as_u16()) {
        Some(kind) => Ok(Some(ErrorOutcome::new(kind))),
        None => {
            #[cfg(feature = "tracing")]
            tracing::warn!(status = status.as_u16(), "unrecognized http status");

            Err(ApiError::UnrecognizedStatus {
                status: status.as_u16(),
                body: String::new(),
            })
        }
    }
}

/// Extracts `error.message` from a 422 body, provided `error.type` is present.
pub fn parse_detail(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let error = envelope.error?;
    error.kind.and(error.message)
}

fn with_parsed_detail(outcome: ErrorOutcome, body: &str) -> ErrorOutcome {
    match parse_detail(body) {
        Some(detail) => outcome.with_detail(detail),
        None => outcome,
    }
}
