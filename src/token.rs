//! Bearer token model: request targets, redacted secrets, and cached tokens.

// self
use crate::_prelude::*;

/// Safety skew subtracted from a token's expiry before it is considered usable.
///
/// A token within this window of its expiry is treated as already expired so
/// it is never attached to a request that would arrive stale.
pub const EXPIRY_SKEW: Duration = Duration::seconds(60);

/// The scope or audience a token request is issued for.
///
/// Exactly one of the two governs a given request; the per-call audience
/// override in request metadata replaces the instance-level target for that
/// call only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
	/// Space-delimited OAuth2 permission scope list.
	Scope(String),
	/// Single intended recipient service URI.
	Audience(String),
}
impl Target {
	/// Creates a scope target from a space-delimited scope list.
	pub fn scope(value: impl Into<String>) -> Self {
		Self::Scope(value.into())
	}

	/// Creates an audience target from a recipient service URI.
	pub fn audience(value: impl Into<String>) -> Self {
		Self::Audience(value.into())
	}

	/// Returns the raw scope or audience string.
	///
	/// Cached tokens are keyed by this value, so one credential object may hold
	/// concurrently valid tokens for several distinct targets.
	pub fn value(&self) -> &str {
		match self {
			Self::Scope(value) | Self::Audience(value) => value,
		}
	}

	/// Returns `true` for audience targets.
	pub fn is_audience(&self) -> bool {
		matches!(self, Self::Audience(_))
	}
}
impl Display for Target {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.value())
	}
}

/// Redacted secret wrapper keeping bearer values out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Immutable cached bearer token for a single target.
///
/// Acquisition replaces a cached token wholesale; nothing mutates a token in
/// place once it has been handed out.
#[derive(Clone, Debug)]
pub struct BearerToken {
	/// Bearer value presented on requests; callers must avoid logging it.
	pub value: TokenSecret,
	/// Expiry instant reported by (or derived for) the token.
	pub expires_at: OffsetDateTime,
	/// Target the token was issued for.
	pub target: Target,
}
impl BearerToken {
	/// Builds a token from its bearer value, expiry, and owning target.
	pub fn new(value: impl Into<String>, expires_at: OffsetDateTime, target: Target) -> Self {
		Self { value: TokenSecret::new(value), expires_at, target }
	}

	/// Returns `true` while the token may still be attached to requests.
	pub fn is_usable_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at - EXPIRY_SKEW
	}

	/// Formats the value for a bearer authorization metadata entry.
	pub fn authorization_value(&self) -> String {
		format!("Bearer {}", self.value.expose())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn usability_honors_the_expiry_skew() {
		let expires = macros::datetime!(2025-06-01 01:00 UTC);
		let token = BearerToken::new("value", expires, Target::scope("email profile"));

		assert!(token.is_usable_at(macros::datetime!(2025-06-01 00:30 UTC)));
		assert!(!token.is_usable_at(expires - EXPIRY_SKEW));
		assert!(!token.is_usable_at(expires));
	}

	#[test]
	fn target_value_is_the_cache_key() {
		let scope = Target::scope("a b");
		let audience = Target::audience("https://api.example.com/myservice");

		assert_eq!(scope.value(), "a b");
		assert_eq!(audience.value(), "https://api.example.com/myservice");
		assert!(audience.is_audience());
		assert!(!scope.is_audience());
		assert_eq!(audience.to_string(), "https://api.example.com/myservice");
	}

	#[test]
	fn authorization_value_uses_the_bearer_prefix() {
		let token = BearerToken::new(
			"tok",
			macros::datetime!(2025-06-01 01:00 UTC),
			Target::audience("https://svc"),
		);

		assert_eq!(token.authorization_value(), "Bearer tok");
	}
}
