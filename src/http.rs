//! Transport primitives for token endpoint exchanges.
//!
//! [`TokenHttpClient`] is the crate's only dependency on an HTTP stack. The
//! exchange path needs exactly one request shape, a form-encoded POST to the
//! token endpoint, so the trait exposes that single operation and reports the
//! status, `Retry-After` hint, and raw body back to the provider for error
//! classification.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
use url::form_urlencoded;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`TokenHttpClient::post_form`].
pub type TokenHttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<FormResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of posting form-encoded token
/// requests.
///
/// Implementations must be `Send + Sync + 'static` so a credential object can
/// be shared across in-flight requests without extra wrappers. Timeouts are
/// the transport's responsibility: configure the underlying client with one so
/// a stuck exchange is bounded and surfaces as a retryable error.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Posts `form` to `endpoint` as `application/x-www-form-urlencoded` and
	/// returns the response regardless of status; only transport-level
	/// failures are errors.
	fn post_form<'a>(&'a self, endpoint: &'a Url, form: &'a [(&'a str, &'a str)])
	-> TokenHttpFuture<'a>;
}

/// Raw token endpoint response captured for downstream error mapping.
#[derive(Clone, Debug)]
pub struct FormResponse {
	/// HTTP status code returned by the token endpoint.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl FormResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Encodes form pairs into an `application/x-www-form-urlencoded` body.
pub fn encode_form(form: &[(&str, &str)]) -> String {
	let mut serializer = form_urlencoded::Serializer::new(String::new());

	for (key, value) in form {
		serializer.append_pair(key, value);
	}

	serializer.finish()
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one
/// place. Token requests should not follow redirects, matching OAuth 2.0
/// guidance that token endpoints return results directly; configure any custom
/// [`ReqwestClient`] accordingly, and give it a request timeout to bound stuck
/// exchanges.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	fn post_form<'a>(
		&'a self,
		endpoint: &'a Url,
		form: &'a [(&'a str, &'a str)],
	) -> TokenHttpFuture<'a> {
		let client = self.0.clone();
		let endpoint = endpoint.clone();
		let body = encode_form(form);

		Box::pin(async move {
			let response = client
				.post(endpoint.as_str())
				.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
				.body(body)
				.send()
				.await
				.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(FormResponse { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
