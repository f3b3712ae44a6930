//! Signed JWT assertions vouching for a service identity.
//!
//! An assertion is a self-issued JWT: `iss` and `sub` both name the service
//! identity, validity is bounded by [`ASSERTION_LIFETIME`], and exactly one of
//! the `scope` / `aud` claims is set depending on the request [`Target`]. The
//! JWT encode/verify primitive itself is delegated to [`jsonwebtoken`].

// crates.io
use jsonwebtoken::{Algorithm, Header};
// self
use crate::{_prelude::*, error::SigningError, key::KeyMaterial, token::Target};

/// Validity window granted to a freshly built assertion.
pub const ASSERTION_LIFETIME: Duration = Duration::hours(1);

/// Claim set carried by a signed assertion.
///
/// Also used to decode assertions in tests and by callers that verify tokens
/// with the issuer's public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Issuer: the service identity email.
	pub iss: String,
	/// Subject: identical to `iss` for self-issued assertions.
	pub sub: String,
	/// Space-delimited permission scopes; absent for audience-targeted tokens.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Intended recipient URI; absent for scope-targeted tokens.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aud: Option<String>,
	/// Issued-at instant as a unix timestamp.
	pub iat: i64,
	/// Expiry instant as a unix timestamp.
	pub exp: i64,
}
impl AssertionClaims {
	/// Computes the claim set for a key, target, and issue instant.
	pub fn new(key: &KeyMaterial, target: &Target, now: OffsetDateTime) -> Self {
		let (scope, aud) = match target {
			Target::Scope(value) => (Some(value.clone()), None),
			Target::Audience(value) => (None, Some(value.clone())),
		};

		Self {
			iss: key.issuer().to_owned(),
			sub: key.issuer().to_owned(),
			scope,
			aud,
			iat: now.unix_timestamp(),
			exp: (now + ASSERTION_LIFETIME).unix_timestamp(),
		}
	}
}

/// Builds signed assertions for one service identity.
#[derive(Clone, Debug, Default)]
pub struct AssertionBuilder;
impl AssertionBuilder {
	/// Signs an assertion for the target, valid from `now` for
	/// [`ASSERTION_LIFETIME`].
	///
	/// The output is deterministic for a fixed key, target, and instant.
	/// Signing failures are fatal for this request only; the key material
	/// remains valid for later calls.
	pub fn build(
		&self,
		key: &KeyMaterial,
		target: &Target,
		now: OffsetDateTime,
	) -> Result<String, SigningError> {
		let claims = AssertionClaims::new(key, target, now);
		let mut header = Header::new(Algorithm::RS256);

		header.kid = key.key_id().map(str::to_owned);

		jsonwebtoken::encode(&header, &claims, key.signing_key())
			.map_err(|source| SigningError::Encode { source })
	}
}
