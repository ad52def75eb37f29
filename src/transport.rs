use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Body, Method, Request, Response, StatusCode, Url,
};
use tokio::time::sleep;

use crate::{ApiError, ClientOptions, Credential, Result, RetryPolicy};

/// Plain HTTP sender wrapped by [`Transport`].
///
/// Implemented for [`reqwest::Client`]; other implementations can stand in
/// for it, e.g. to record traffic.
pub trait HttpSend: Send + Sync {
    fn send(&self, request: Request) -> impl Future<Output = reqwest::Result<Response>> + Send;
}

impl HttpSend for reqwest::Client {
    fn send(&self, request: Request) -> impl Future<Output = reqwest::Result<Response>> + Send {
        self.execute(request)
    }
}

/// Sender with credential injection and a bounded rate-limit retry loop.
///
/// The transport owns its sender; dropping the transport releases pooled
/// connections. Dropping a `send` future cancels the request together with
/// any pending backoff sleep, so deadlines and cancellation compose with
/// `tokio::time::timeout` or `tokio::select!`.
pub struct Transport<S = reqwest::Client> {
    sender: S,
    policy: RetryPolicy,
}

impl<S> fmt::Debug for Transport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Builds a `reqwest` backed transport.
    ///
    /// The credential and static headers become default headers of the
    /// underlying client, set once here and read-only afterwards.
    pub fn new(credential: &Credential, options: &ClientOptions) -> Result<Self> {
        let headers = default_headers(credential, &options.headers)?;
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(options.timeout_ms))
            .build()
            .map_err(|err| ApiError::Config(format!("could not build http client: {err}")))?;
        Ok(Self::with_sender(http, options.retry.clone()))
    }
}

impl<S: HttpSend> Transport<S> {
    /// Wraps an arbitrary sender. Authentication is the sender's concern.
    pub fn with_sender(sender: S, policy: RetryPolicy) -> Self {
        Self { sender, policy }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request`, retrying on 429 according to the transport's policy.
    ///
    /// Always returns the last response received, including a final 429 once
    /// retries are exhausted. Transport failures are returned immediately.
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_policy(request, &self.policy).await
    }

    /// Like [`Transport::send`] with a per-call policy override.
    pub async fn send_with_policy(
        &self,
        request: Request,
        policy: &RetryPolicy,
    ) -> Result<Response> {
        let resend = Resend::capture(&request);

        let mut response = self
            .sender
            .send(request)
            .await
            .map_err(ApiError::Transport)?;
        let mut retries = 0usize;

        while policy.enabled()
            && response.status() == StatusCode::TOO_MANY_REQUESTS
            && retries < policy.max_retries()
        {
            let Some(resend) = resend.as_ref() else {
                #[cfg(feature = "tracing")]
                tracing::warn!("rate limited but request body is a stream; not retrying");
                break;
            };

            let delay = policy.delay_for_retry(retries);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                url = %resend.url,
                retry = retries + 1,
                "rate limited; retrying after {} ms",
                delay.as_millis()
            );

            sleep(delay).await;
            response = self
                .sender
                .send(resend.build())
                .await
                .map_err(ApiError::Transport)?;
            retries += 1;
        }

        #[cfg(feature = "tracing")]
        {
            if response.status() == StatusCode::TOO_MANY_REQUESTS && retries > 0 {
                tracing::warn!(retries, "still rate limited after exhausting retries");
            }
        }

        Ok(response)
    }
}

/// Everything needed to resend a request verbatim.
struct Resend {
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl Resend {
    /// Buffers the body before the first send. Returns `None` for streaming
    /// bodies, which cannot be replayed.
    fn capture(request: &Request) -> Option<Self> {
        let body = match request.body() {
            None => None,
            Some(body) => Some(body.as_bytes()?.to_vec()),
        };
        Some(Self {
            method: request.method().clone(),
            url: request.url().clone(),
            body,
            timeout: request.timeout().copied(),
        })
    }

    /// Fresh request with the same method, URL and body. A body is always
    /// resent as JSON, whatever the original content type was.
    fn build(&self) -> Request {
        let mut request = Request::new(self.method.clone(), self.url.clone());
        *request.timeout_mut() = self.timeout;
        if let Some(body) = &self.body {
            request.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            *request.body_mut() = Some(Body::from(body.clone()));
        }
        request
    }
}

fn default_headers(credential: &Credential, extra: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(value) = credential.header_value()? {
        headers.insert(header::AUTHORIZATION, value);
    }
    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| ApiError::Config(format!("invalid header name '{name}': {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| ApiError::Config(format!("invalid value for header '{name}': {err}")))?;
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, future::Future, sync::Mutex, time::Duration};

    use reqwest::{header, Body, Method, Request, Response, StatusCode, Url};
    use tokio::time::Instant;

    use super::{default_headers, HttpSend, Transport};
    use crate::{ApiError, Credential, RetryPolicy};

    struct Sent {
        at: Instant,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        content_type: Option<String>,
    }

    /// Answers with queued statuses, then with `fallback` forever.
    struct ScriptedSender {
        statuses: Mutex<VecDeque<u16>>,
        fallback: u16,
        sent: Mutex<Vec<Sent>>,
    }

    impl ScriptedSender {
        fn new(statuses: impl IntoIterator<Item = u16>, fallback: u16) -> Self {
            Self {
                statuses: Mutex::new(statuses.into_iter().collect()),
                fallback,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn always(status: u16) -> Self {
            Self::new(std::iter::empty(), status)
        }
    }

    impl HttpSend for ScriptedSender {
        fn send(
            &self,
            request: Request,
        ) -> impl Future<Output = reqwest::Result<Response>> + Send {
            self.sent.lock().unwrap().push(Sent {
                at: Instant::now(),
                method: request.method().clone(),
                url: request.url().clone(),
                body: request
                    .body()
                    .and_then(|body| body.as_bytes())
                    .map(<[u8]>::to_vec),
                content_type: request
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned),
            });
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.fallback);
            let response: Response = http::Response::builder()
                .status(status)
                .body(String::new())
                .unwrap()
                .into();
            async move { Ok(response) }
        }
    }

    fn form_post() -> Request {
        let mut request = Request::new(
            Method::POST,
            Url::parse("https://api.test/v1/items?page=2").unwrap(),
        );
        request.headers_mut().insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        *request.body_mut() = Some("name=kit&size=2".into());
        request
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_429_sends_four_times_with_doubling_delays() {
        let transport = Transport::with_sender(ScriptedSender::always(429), RetryPolicy::default());

        let response = transport.send(form_post()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let sent = transport.sender().sent.lock().unwrap();
        assert_eq!(sent.len(), 4);

        let expected = [2_000u64, 4_000, 8_000];
        for (pair, expected_ms) in sent.windows(2).zip(expected) {
            let gap = pair[1].at - pair[0].at;
            assert!(
                gap >= Duration::from_millis(expected_ms)
                    && gap < Duration::from_millis(expected_ms + 10),
                "gap {gap:?} should be about {expected_ms} ms"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_policy_returns_429_after_single_send() {
        let transport =
            Transport::with_sender(ScriptedSender::always(429), RetryPolicy::disabled());
        let start = Instant::now();

        let response = transport.send(form_post()).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(transport.sender().sent.lock().unwrap().len(), 1);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_retrying_once_rate_limit_clears() {
        let transport =
            Transport::with_sender(ScriptedSender::new([429, 429], 200), RetryPolicy::default());

        let response = transport.send(form_post()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.sender().sent.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_are_not_retried() {
        for status in [500, 503, 504, 400] {
            let transport =
                Transport::with_sender(ScriptedSender::always(status), RetryPolicy::default());
            let response = transport.send(form_post()).await.unwrap();
            assert_eq!(response.status().as_u16(), status);
            assert_eq!(transport.sender().sent.lock().unwrap().len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resend_is_byte_identical_and_json_typed() {
        let transport =
            Transport::with_sender(ScriptedSender::new([429], 200), RetryPolicy::default());

        transport.send(form_post()).await.unwrap();

        let sent = transport.sender().sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, sent[1].body);
        assert_eq!(sent[1].body.as_deref(), Some(&b"name=kit&size=2"[..]));
        assert_eq!(sent[1].method, Method::POST);
        assert_eq!(sent[1].url, sent[0].url);
        assert_eq!(
            sent[0].content_type.as_deref(),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(sent[1].content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test(start_paused = true)]
    async fn bodiless_retry_sets_no_content_type() {
        let transport =
            Transport::with_sender(ScriptedSender::new([429], 204), RetryPolicy::default());
        let request = Request::new(Method::GET, Url::parse("https://api.test/v1/items").unwrap());

        transport.send(request).await.unwrap();

        let sent = transport.sender().sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].body, None);
        assert_eq!(sent[1].content_type, None);
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_policy_overrides_transport_policy() {
        let transport = Transport::with_sender(ScriptedSender::always(429), RetryPolicy::default());

        transport
            .send_with_policy(form_post(), &RetryPolicy::disabled())
            .await
            .unwrap();

        assert_eq!(transport.sender().sent.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sends_keep_separate_retry_counters() {
        let transport = Transport::with_sender(ScriptedSender::always(429), RetryPolicy::default());

        let (first, second) = tokio::join!(
            transport.send(form_post()),
            transport.send(form_post())
        );

        assert_eq!(first.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(transport.sender().sent.lock().unwrap().len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_body_is_sent_once() {
        let transport = Transport::with_sender(ScriptedSender::always(429), RetryPolicy::default());
        let upstream: Response = http::Response::builder()
            .status(200)
            .body("chunk")
            .unwrap()
            .into();
        let url = Url::parse("https://api.test/upload").unwrap();
        let mut request = Request::new(Method::POST, url);
        *request.body_mut() = Some(Body::from(upstream));

        let response = transport.send(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(transport.sender().sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn default_headers_carry_credential_and_extras() {
        let headers = default_headers(
            &Credential::bearer("abc"),
            &[("X-Api-Version".to_owned(), "2".to_owned())],
        )
        .unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
        assert_eq!(headers["x-api-version"], "2");
    }

    #[test]
    fn invalid_header_name_is_config_error() {
        let err = default_headers(&Credential::None, &[("bad name".to_owned(), "v".to_owned())])
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
