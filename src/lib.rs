//! `formapi-http` is an async foundation for JSON/form based web APIs.
//!
//! It covers the parts every binding needs:
//! - [`Transport`] injects credentials and retries rate-limited (429) requests
//!   with exponential backoff
//! - [`classify`] turns a response into success or a typed [`ErrorOutcome`]
//! - [`ApiClient`] validates arguments, builds URLs through [`Endpoint`] hooks
//!   and form-encodes request content

mod classify;
mod client;
mod credential;
mod error;
mod form;
mod options;
mod outcome;
mod query;
mod transport;
mod wire;

pub use classify::{classify, classify_text, outcome_for_status, parse_detail};
pub use client::{ApiClient, Endpoint};
pub use credential::Credential;
pub use error::ApiError;
pub use form::{encode_form, flatten_form, FORM_CONTENT_TYPE};
pub use options::{ClientOptions, RetryPolicy, BACKOFF_FACTOR, MAX_RETRIES, MIN_BASE_DELAY_MS};
pub use outcome::{ErrorKind, ErrorOutcome, Outcome};
pub use query::{append_query, merge_query};
pub use transport::{HttpSend, Transport};

pub use reqwest::{Method, Url};

pub type Result<T> = std::result::Result<T, ApiError>;
