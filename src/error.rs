//! Crate-level error types shared across discovery, signing, and token exchange.
//!
//! Discovery absence is deliberately not modeled here: the discovery APIs return
//! `Ok(None)` when no credential document is configured, so "not found" stays a
//! value rather than an error (callers may fall back to other strategies).

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential document could not be read or parsed.
	#[error(transparent)]
	Parse(#[from] ParseError),
	/// Assertion could not be signed with the configured key.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Token endpoint interaction failed.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Failures raised while reading or parsing a credential document.
#[derive(Debug, ThisError)]
pub enum ParseError {
	/// Credential document could not be read from the filesystem.
	#[error("Credential document could not be read{}.", fmt_path(.path))]
	Io {
		/// Path of the document, when one was involved.
		path: Option<PathBuf>,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Credential document contains malformed or incomplete JSON. The error path
	/// names the offending field (e.g. a missing `client_email`).
	#[error("Credential document is malformed.")]
	Json {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The `private_key` field does not contain a usable RSA PEM key.
	#[error("Credential document contains an invalid private key.")]
	InvalidPrivateKey {
		/// Underlying key parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// A required field is present but empty.
	#[error("Credential document field `{field}` must not be empty.")]
	EmptyField {
		/// Name of the offending field.
		field: &'static str,
	},
}
impl ParseError {
	/// Wraps an IO failure with optional path context.
	pub fn io(path: Option<PathBuf>, source: std::io::Error) -> Self {
		Self::Io { path, source }
	}
}

fn fmt_path(path: &Option<PathBuf>) -> String {
	path.as_ref().map(|p| format!(" from `{}`", p.display())).unwrap_or_default()
}

/// Failures raised while signing an assertion.
///
/// Signing errors are fatal for the current request only; the key material is
/// immutable and later requests may still succeed.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// The JWT library rejected the signing operation.
	#[error("Assertion could not be signed.")]
	Encode {
		/// Underlying JWT encoding failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
}

/// Failures raised by the token endpoint during an assertion exchange.
///
/// Callers compose retry policy externally; nothing in this crate retries
/// automatically. [`ExchangeError::Endpoint`] carries the upstream status and
/// Retry-After hint for that purpose.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Endpoint rejected the assertion grant (e.g. bad signature or issuer).
	#[error("Token endpoint rejected the grant: {reason}.")]
	InvalidGrant {
		/// Endpoint-supplied reason string.
		reason: String,
	},
	/// Endpoint rejected the client identity.
	#[error("Token endpoint rejected the client: {reason}.")]
	InvalidClient {
		/// Endpoint-supplied reason string.
		reason: String,
	},
	/// Endpoint returned an unexpected response; safe to retry with backoff.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Endpoint- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Endpoint returned a non-positive `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parse_error_includes_path_context() {
		let err = ParseError::io(
			Some(PathBuf::from("/etc/creds.json")),
			std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
		);

		assert!(err.to_string().contains("/etc/creds.json"));

		let err = ParseError::io(None, std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));

		assert_eq!(err.to_string(), "Credential document could not be read.");
	}

	#[test]
	fn exchange_errors_surface_reasons() {
		let err = Error::from(ExchangeError::InvalidGrant { reason: "assertion expired".into() });

		assert!(err.to_string().contains("assertion expired"));

		let err = Error::from(ExchangeError::Endpoint {
			message: "internal error".into(),
			status: Some(503),
			retry_after: Some(Duration::seconds(5)),
		});

		assert!(matches!(
			err,
			Error::Exchange(ExchangeError::Endpoint { status: Some(503), .. })
		));
	}
}
