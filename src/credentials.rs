//! Public credential facade: apply bearer tokens to request metadata.
//!
//! [`ServiceAccountCredentials`] wraps a [`TokenProvider`] and exposes the
//! request-facing operations: a destructive [`apply_in_place`], a
//! non-destructive [`apply`] that augments a copy, and a reusable [`updater`]
//! callable for clients that register one hook per connection. The facade is
//! cheap to clone and safe to share across concurrently issued requests.
//!
//! [`apply_in_place`]: ServiceAccountCredentials::apply_in_place
//! [`apply`]: ServiceAccountCredentials::apply
//! [`updater`]: ServiceAccountCredentials::updater

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	discovery::{Discovery, ExplicitSource},
	error::ParseError,
	http::TokenHttpClient,
	key::KeyMaterial,
	obs::{self, StageKind, StageOutcome, StageSpan},
	provider::TokenProvider,
	token::Target,
};

/// Metadata key receiving the bearer authorization value (`Bearer <token>`).
pub const AUTH_METADATA_KEY: &str = "authorization";
/// Transient metadata key supplying a per-call target audience.
///
/// When present, the entry is consumed (removed) and its value overrides the
/// instance-level target for that call only; it never appears in augmented
/// metadata.
pub const AUDIENCE_METADATA_KEY: &str = "x-jwt-audience";

/// Caller-owned request metadata (header name to header value).
pub type RequestMetadata = HashMap<String, String>;

/// Boxed future returned by [`ServiceAccountCredentials::updater`] callables.
pub type MetadataFuture = Pin<Box<dyn Future<Output = Result<RequestMetadata>> + Send>>;

#[cfg(feature = "reqwest")]
/// Credentials specialized for the crate's default reqwest transport.
pub type ReqwestCredentials = ServiceAccountCredentials<ReqwestHttpClient>;

/// Bearer credentials for one service identity and target.
///
/// Shares one [`TokenProvider`] across clones, so every clone and every
/// [`updater`](Self::updater) callable sees the same token cache.
pub struct ServiceAccountCredentials<C>
where
	C: ?Sized + TokenHttpClient,
{
	provider: Arc<TokenProvider<C>>,
	target: Target,
}
impl<C> ServiceAccountCredentials<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Returns the instance-level target used when no per-call override is
	/// present.
	pub fn target(&self) -> &Target {
		&self.target
	}

	/// Returns the key material backing these credentials.
	pub fn key(&self) -> &KeyMaterial {
		self.provider.key()
	}

	/// Adds a bearer authorization entry to the metadata in place.
	///
	/// Consumes the [`AUDIENCE_METADATA_KEY`] entry, if present, to override
	/// the target for this call. The result carries exactly one bearer entry
	/// and never the signaling key. May trigger token acquisition (a network
	/// call in exchange mode); within a cached token's validity window it is
	/// pure and returns the identical bearer value.
	pub async fn apply_in_place(&self, metadata: &mut RequestMetadata) -> Result<()> {
		const KIND: StageKind = StageKind::Apply;

		let span = StageSpan::new(KIND, "apply_in_place");

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				let target = match metadata.remove(AUDIENCE_METADATA_KEY) {
					Some(audience) => Target::audience(audience),
					None => self.target.clone(),
				};
				let token = self.provider.acquire(&target).await?;

				metadata.insert(AUTH_METADATA_KEY.to_owned(), token.authorization_value());

				Ok(())
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(KIND, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(KIND, StageOutcome::Failure),
		}

		result
	}

	/// Returns an augmented copy of the metadata, leaving the original exactly
	/// as passed in (the audience override is consumed from the copy only).
	pub async fn apply(&self, metadata: &RequestMetadata) -> Result<RequestMetadata> {
		let mut augmented = metadata.clone();

		self.apply_in_place(&mut augmented).await?;

		Ok(augmented)
	}

	/// Returns a reusable callable equivalent to [`apply`](Self::apply).
	///
	/// The callable captures a clone of these credentials (sharing the token
	/// cache), so one registered hook can serve every outgoing request without
	/// re-deriving the credential object.
	pub fn updater(
		&self,
	) -> impl Fn(&RequestMetadata) -> MetadataFuture + Clone + Send + Sync + 'static {
		let credentials = self.clone();

		move |metadata: &RequestMetadata| {
			let credentials = credentials.clone();
			let metadata = metadata.clone();

			Box::pin(async move { credentials.apply(&metadata).await })
		}
	}
}
impl<C> Clone for ServiceAccountCredentials<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self { provider: self.provider.clone(), target: self.target.clone() }
	}
}
impl<C> Debug for ServiceAccountCredentials<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceAccountCredentials")
			.field("provider", &self.provider)
			.field("target", &self.target)
			.finish()
	}
}

/// Builder assembling credentials from key material and a target.
///
/// Without a token endpoint the credentials run in self-signed mode: the
/// signed assertion itself is the bearer value. Configuring
/// [`token_uri`](Builder::token_uri) switches scope-targeted requests to
/// exchange mode; audience-targeted requests (including per-call overrides)
/// always use the self-signed assertion, which is never a JWT-bearer grant.
#[derive(Debug)]
pub struct Builder {
	key: KeyMaterial,
	target: Target,
	token_uri: Option<Url>,
}
impl Builder {
	/// Creates a builder from parsed key material and an instance target.
	pub fn new(key: KeyMaterial, target: Target) -> Self {
		Self { key, target, token_uri: None }
	}

	/// Parses an explicit credential source; parse failures are fatal.
	pub fn from_explicit(source: ExplicitSource, target: Target) -> Result<Self, ParseError> {
		Ok(Self::new(Discovery::new().from_explicit(source)?, target))
	}

	/// Loads credentials from the discovery environment variable.
	///
	/// `Ok(None)` when the variable is unset; errors when it names a missing
	/// or malformed document.
	pub fn from_env(target: Target) -> Result<Option<Self>, ParseError> {
		Ok(Discovery::new().from_env()?.map(|key| Self::new(key, target)))
	}

	/// Loads credentials from the well-known path; `Ok(None)` when absent.
	pub fn from_well_known_path(target: Target) -> Result<Option<Self>, ParseError> {
		Ok(Discovery::new().from_well_known_path()?.map(|key| Self::new(key, target)))
	}

	/// Runs the full discovery resolution order.
	pub fn discover(
		explicit: Option<ExplicitSource>,
		target: Target,
	) -> Result<Option<Self>, ParseError> {
		Ok(Discovery::new().discover(explicit)?.map(|key| Self::new(key, target)))
	}

	/// Sets the token endpoint, switching scope-targeted requests to exchange
	/// mode.
	pub fn token_uri(mut self, token_uri: Url) -> Self {
		self.token_uri = Some(token_uri);

		self
	}

	/// Builds credentials using a caller-provided transport.
	///
	/// Configure the transport with a request timeout to bound stuck
	/// exchanges; this crate never retries or cancels on its own.
	pub fn build_with_http_client<C>(
		self,
		http_client: impl Into<Arc<C>>,
	) -> ServiceAccountCredentials<C>
	where
		C: ?Sized + TokenHttpClient,
	{
		let provider = match self.token_uri {
			Some(token_uri) => TokenProvider::exchange(self.key, token_uri, http_client),
			None => TokenProvider::self_signed(self.key),
		};

		ServiceAccountCredentials { provider: Arc::new(provider), target: self.target }
	}

	#[cfg(feature = "reqwest")]
	/// Builds credentials using the crate's default reqwest transport.
	pub fn build(self) -> ReqwestCredentials {
		self.build_with_http_client(ReqwestHttpClient::default())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use rsa::{
		RsaPrivateKey,
		pkcs8::{EncodePrivateKey, LineEnding},
	};
	// self
	use super::*;
	use crate::http::TokenHttpFuture;

	struct NoopClient;
	impl TokenHttpClient for NoopClient {
		fn post_form<'a>(&'a self, _: &'a Url, _: &'a [(&'a str, &'a str)]) -> TokenHttpFuture<'a> {
			unreachable!("Self-signed credentials never touch the transport.");
		}
	}

	fn key_material() -> KeyMaterial {
		let mut rng = rand::thread_rng();
		let private_pem = RsaPrivateKey::new(&mut rng, 2048)
			.expect("RSA key generation should succeed for credentials tests.")
			.to_pkcs8_pem(LineEnding::LF)
			.expect("Private key should encode to PKCS#8 PEM.")
			.to_string();
		let document = serde_json::json!({
			"type": "service_account",
			"client_email": "app@developer.example.com",
			"private_key": private_pem
		});

		KeyMaterial::from_slice(document.to_string().as_bytes())
			.expect("Credential fixture should parse successfully.")
	}

	#[tokio::test]
	async fn apply_in_place_consumes_the_audience_override() {
		let credentials = Builder::new(key_material(), Target::scope("email"))
			.build_with_http_client(NoopClient);
		let mut metadata = RequestMetadata::from([
			("foo".to_owned(), "bar".to_owned()),
			(AUDIENCE_METADATA_KEY.to_owned(), "https://api.example.com/svc".to_owned()),
		]);

		credentials
			.apply_in_place(&mut metadata)
			.await
			.expect("Destructive apply should succeed.");

		assert!(metadata.get(AUTH_METADATA_KEY).is_some_and(|v| v.starts_with("Bearer ")));
		assert!(!metadata.contains_key(AUDIENCE_METADATA_KEY));
		assert_eq!(metadata.get("foo").map(String::as_str), Some("bar"));
		assert_eq!(metadata.len(), 2);
	}

	#[tokio::test]
	async fn apply_never_mutates_its_input() {
		let credentials = Builder::new(key_material(), Target::scope("email"))
			.build_with_http_client(NoopClient);
		let metadata = RequestMetadata::from([(
			AUDIENCE_METADATA_KEY.to_owned(),
			"https://api.example.com/svc".to_owned(),
		)]);
		let snapshot = metadata.clone();
		let augmented =
			credentials.apply(&metadata).await.expect("Non-destructive apply should succeed.");

		assert_eq!(metadata, snapshot);
		assert!(augmented.contains_key(AUTH_METADATA_KEY));
		assert!(!augmented.contains_key(AUDIENCE_METADATA_KEY));
	}

	#[tokio::test]
	async fn builder_without_token_uri_is_self_signed() {
		let credentials = Builder::new(key_material(), Target::scope("email"))
			.build_with_http_client(NoopClient);
		let fmt = format!("{credentials:?}");

		assert!(fmt.contains("self_signed"));
		assert!(fmt.contains("<redacted>"));
	}
}
