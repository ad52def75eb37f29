use std::fmt;

use reqwest::{
    header::{self, HeaderValue},
    Method, Request, Response, Url,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    classify::classify_text,
    form::{encode_form, FORM_CONTENT_TYPE},
    transport::HttpSend,
    ApiError, ClientOptions, Credential, Outcome, Result, Transport,
};

/// Request arguments of one API operation.
///
/// Both hooks are supplied by the API binding built on top of this crate.
pub trait Endpoint {
    /// Checks the arguments before any network activity.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Builds the target URL. Called exactly once per request; the result is
    /// used as-is.
    fn target_uri(&self, base_url: &Url) -> Url;
}

/// Request pipeline: validates arguments, builds the request and hands it to
/// the retry-aware [`Transport`].
///
/// The pipeline does not classify responses. Use [`crate::classify`] on the
/// returned response, or the typed helpers [`ApiClient::fetch_json`] and
/// [`ApiClient::get_text`] which do it for you.
pub struct ApiClient<S = reqwest::Client> {
    base_url: Url,
    credential: Credential,
    transport: Transport<S>,
}

impl<S> fmt::Debug for ApiClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("credential", &self.credential)
            .field("transport", &self.transport)
            .finish()
    }
}

impl ApiClient {
    /// Creates a client with default [`ClientOptions`].
    pub fn new(base_url: impl AsRef<str>, credential: Credential) -> Result<Self> {
        let base_url = parse_base_url(base_url.as_ref())?;
        let transport = Transport::new(&credential, &ClientOptions::default())?;
        Ok(Self {
            base_url,
            credential,
            transport,
        })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `FORMAPI_BASE_URL` — API root URL
    /// - `FORMAPI_TOKEN` — bearer token, or
    /// - `FORMAPI_USER` and `FORMAPI_PASSWORD` — basic credentials
    ///
    /// Without any credential variables the client sends no `Authorization`
    /// header.
    pub fn from_env() -> Result<Self> {
        let base_url = non_empty_env("FORMAPI_BASE_URL")?.ok_or_else(|| {
            ApiError::Config("missing FORMAPI_BASE_URL environment variable".to_owned())
        })?;

        let credential = credential_from_parts(
            non_empty_env("FORMAPI_TOKEN")?,
            non_empty_env("FORMAPI_USER")?,
            non_empty_env("FORMAPI_PASSWORD")?,
        )?;

        Self::new(base_url, credential)
    }

    /// Rebuilds the underlying transport with new options.
    ///
    /// Consumes the client, so options can only change before it is shared.
    pub fn with_options(self, opts: ClientOptions) -> Result<Self> {
        let transport = Transport::new(&self.credential, &opts)?;
        Ok(Self { transport, ..self })
    }
}

impl<S: HttpSend> ApiClient<S> {
    /// Builds a client around an existing transport.
    ///
    /// `credential` is the one the transport's sender injects. It is only kept
    /// for `Debug` and for [`ApiClient::with_options`].
    pub fn with_transport(
        base_url: impl AsRef<str>,
        credential: Credential,
        transport: Transport<S>,
    ) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url.as_ref())?,
            credential,
            transport,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    /// Sends a request without body and returns the raw response.
    pub async fn send<A>(&self, args: &A, method: Method) -> Result<Response>
    where
        A: Endpoint + ?Sized,
    {
        self.build_and_send(args, method, None::<&()>).await
    }

    /// Sends `content` as a form-urlencoded body and returns the raw response.
    ///
    /// `content` must serialize to a flat object; see [`crate::encode_form`].
    pub async fn send_form<A, C>(&self, args: &A, method: Method, content: &C) -> Result<Response>
    where
        A: Endpoint + ?Sized,
        C: Serialize + ?Sized,
    {
        self.build_and_send(args, method, Some(content)).await
    }

    /// Issues a GET and returns the body on success, or the classified
    /// failure rendered as text.
    pub async fn get_text<A>(&self, args: &A) -> Result<String>
    where
        A: Endpoint + ?Sized,
    {
        let response = self.send(args, Method::GET).await?;
        match classify_text(response).await? {
            Outcome::Success(body) => Ok(body),
            Outcome::Failure(outcome) => Ok(outcome.to_string()),
        }
    }

    /// Typed pipeline: sends the request, form-encoding `content` when
    /// present, and decodes a JSON response or returns the classified failure.
    ///
    /// Empty success bodies (e.g. 204) decode like JSON `null`.
    pub async fn send_json<T, A, C>(
        &self,
        args: &A,
        method: Method,
        content: Option<&C>,
    ) -> Result<Outcome<T>>
    where
        T: DeserializeOwned,
        A: Endpoint + ?Sized,
        C: Serialize + ?Sized,
    {
        let response = self.build_and_send(args, method, content).await?;
        decode_outcome(response).await
    }

    /// [`ApiClient::send_json`] without a body.
    pub async fn fetch_json<T, A>(&self, args: &A, method: Method) -> Result<Outcome<T>>
    where
        T: DeserializeOwned,
        A: Endpoint + ?Sized,
    {
        self.send_json(args, method, None::<&()>).await
    }

    /// [`ApiClient::send_json`] with a form body.
    pub async fn send_form_json<T, A, C>(
        &self,
        args: &A,
        method: Method,
        content: &C,
    ) -> Result<Outcome<T>>
    where
        T: DeserializeOwned,
        A: Endpoint + ?Sized,
        C: Serialize + ?Sized,
    {
        self.send_json(args, method, Some(content)).await
    }

    async fn build_and_send<A, C>(
        &self,
        args: &A,
        method: Method,
        content: Option<&C>,
    ) -> Result<Response>
    where
        A: Endpoint + ?Sized,
        C: Serialize + ?Sized,
    {
        let request = self.build_request(args, method, content)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(method = %request.method(), url = %request.url(), "sending request");

        self.transport.send(request).await
    }

    fn build_request<A, C>(&self, args: &A, method: Method, content: Option<&C>) -> Result<Request>
    where
        A: Endpoint + ?Sized,
        C: Serialize + ?Sized,
    {
        args.validate().map_err(ApiError::Validation)?;
        let url = args.target_uri(&self.base_url);

        let mut request = Request::new(method, url);
        if let Some(content) = content {
            let body = encode_form(content)?;
            request
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
            *request.body_mut() = Some(body.into());
        }
        Ok(request)
    }
}

async fn decode_outcome<T: DeserializeOwned>(response: Response) -> Result<Outcome<T>> {
    match classify_text(response).await? {
        Outcome::Success(body) => {
            // 204 and other empty bodies decode like JSON `null`.
            let text = if body.trim().is_empty() { "null" } else { body.as_str() };
            serde_json::from_str(text).map(Outcome::Success).map_err(|err| {
                ApiError::Decode(format!("invalid JSON response: {err}; body: {body}"))
            })
        }
        Outcome::Failure(outcome) => Ok(Outcome::Failure(outcome)),
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    Url::parse(base_url.trim())
        .map_err(|err| ApiError::Config(format!("invalid base url '{base_url}': {err}")))
}

/// Picks bearer over basic. A user without password, or the reverse, is a
/// configuration error.
fn credential_from_parts(
    token: Option<String>,
    user: Option<String>,
    password: Option<String>,
) -> Result<Credential> {
    match (token, user, password) {
        (Some(token), _, _) => Ok(Credential::bearer(token)),
        (None, Some(user), Some(password)) => Ok(Credential::basic(user, password)),
        (None, Some(_), None) => Err(ApiError::Config(
            "FORMAPI_USER is set but FORMAPI_PASSWORD is missing".to_owned(),
        )),
        (None, None, Some(_)) => Err(ApiError::Config(
            "FORMAPI_PASSWORD is set but FORMAPI_USER is missing".to_owned(),
        )),
        (None, None, None) => Ok(Credential::None),
    }
}

fn non_empty_env(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => {
            Err(ApiError::Config(format!("{name} is set but empty")))
        }
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(ApiError::Config(format!("{name} is not valid unicode")))
        }
    }
}
