//! Token acquisition state machine with per-target caching + singleflight.
//!
//! A [`TokenProvider`] owns the parsed key material and decides, once at
//! construction, whether the signed assertion itself is the bearer credential
//! (self-signed mode) or must be exchanged at a token endpoint for an opaque
//! access token (exchange mode). Acquired tokens are cached per target string,
//! so one provider can serve several audiences or scope sets concurrently. A
//! per-target singleflight guard ensures concurrent cache misses for the same
//! target perform a single acquisition instead of stampeding the signer or the
//! token endpoint.
//!
//! Acquisition failures surface to the caller and leave any previously cached
//! token untouched; a later retry may succeed. Nothing here retries
//! automatically.

// self
use crate::{
	_prelude::*,
	assertion::{ASSERTION_LIFETIME, AssertionBuilder},
	error::ExchangeError,
	http::{FormResponse, TokenHttpClient},
	key::KeyMaterial,
	obs::{self, StageKind, StageOutcome, StageSpan},
	token::{BearerToken, Target},
};

/// Grant type identifier posted to the token endpoint in exchange mode.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

enum Mode<C>
where
	C: ?Sized + TokenHttpClient,
{
	SelfSigned,
	Exchange { token_uri: Url, http_client: Arc<C> },
}

/// Acquires and caches bearer tokens for one service identity.
pub struct TokenProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	key: KeyMaterial,
	assertions: AssertionBuilder,
	mode: Mode<C>,
	cache: RwLock<HashMap<String, BearerToken>>,
	guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}
impl<C> TokenProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a provider whose assertions are used directly as bearer values.
	pub fn self_signed(key: KeyMaterial) -> Self {
		Self {
			key,
			assertions: AssertionBuilder,
			mode: Mode::SelfSigned,
			cache: RwLock::new(HashMap::new()),
			guards: Mutex::new(HashMap::new()),
		}
	}

	/// Creates a provider that exchanges assertions at `token_uri` for opaque
	/// access tokens.
	pub fn exchange(key: KeyMaterial, token_uri: Url, http_client: impl Into<Arc<C>>) -> Self {
		Self {
			key,
			assertions: AssertionBuilder,
			mode: Mode::Exchange { token_uri, http_client: http_client.into() },
			cache: RwLock::new(HashMap::new()),
			guards: Mutex::new(HashMap::new()),
		}
	}

	/// Returns the key material backing this provider.
	pub fn key(&self) -> &KeyMaterial {
		&self.key
	}

	/// Returns a usable bearer token for the target, acquiring one on cache
	/// miss or expiry.
	pub async fn acquire(&self, target: &Target) -> Result<BearerToken> {
		self.acquire_at(target, OffsetDateTime::now_utc()).await
	}

	async fn acquire_at(&self, target: &Target, now: OffsetDateTime) -> Result<BearerToken> {
		let kind = if self.uses_exchange(target) { StageKind::Exchange } else { StageKind::SelfSigned };
		let span = StageSpan::new(kind, "acquire");

		obs::record_stage_outcome(kind, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				let guard = self.guard_for(target.value());
				let _singleflight = guard.lock().await;

				if let Some(token) = self.cached(target.value(), now) {
					return Ok(token);
				}

				let token = match (&self.mode, target) {
					// Audience-targeted tokens are always the assertion itself;
					// the JWT-bearer grant only ever carries scope assertions.
					(Mode::SelfSigned, _) | (_, Target::Audience(_)) =>
						self.mint_self_signed(target, now)?,
					(Mode::Exchange { token_uri, http_client }, _) =>
						self.exchange_assertion(token_uri, http_client.as_ref(), target, now)
							.await?,
				};

				self.cache.write().insert(target.value().to_owned(), token.clone());

				Ok(token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(kind, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(kind, StageOutcome::Failure),
		}

		result
	}

	fn uses_exchange(&self, target: &Target) -> bool {
		matches!(&self.mode, Mode::Exchange { .. }) && !target.is_audience()
	}

	fn cached(&self, key: &str, now: OffsetDateTime) -> Option<BearerToken> {
		self.cache.read().get(key).filter(|token| token.is_usable_at(now)).cloned()
	}

	// Returns (and creates on demand) the singleflight guard for a target.
	fn guard_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn mint_self_signed(&self, target: &Target, now: OffsetDateTime) -> Result<BearerToken> {
		let assertion = self.assertions.build(&self.key, target, now)?;

		Ok(BearerToken::new(assertion, now + ASSERTION_LIFETIME, target.clone()))
	}

	async fn exchange_assertion(
		&self,
		token_uri: &Url,
		http_client: &C,
		target: &Target,
		now: OffsetDateTime,
	) -> Result<BearerToken> {
		let assertion = self.assertions.build(&self.key, target, now)?;
		let form = [("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion.as_str())];
		let response = http_client.post_form(token_uri, &form).await?;

		if !response.is_success() {
			return Err(map_endpoint_failure(&response));
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&response.body);
		let payload: TokenEndpointResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ExchangeError::ResponseParse {
				source,
				status: Some(response.status),
			})?;
		let expires_in = payload.expires_in.ok_or(ExchangeError::MissingExpiresIn)?;

		if expires_in <= 0 {
			return Err(ExchangeError::NonPositiveExpiresIn.into());
		}

		Ok(BearerToken::new(
			payload.access_token,
			now + Duration::seconds(expires_in),
			target.clone(),
		))
	}
}
impl<C> Debug for TokenProvider<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProvider")
			.field("key", &self.key)
			.field(
				"mode",
				match &self.mode {
					Mode::SelfSigned => &"self_signed",
					Mode::Exchange { .. } => &"exchange",
				},
			)
			.finish()
	}
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	#[serde(default)]
	expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenEndpointErrorBody {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

fn map_endpoint_failure(response: &FormResponse) -> Error {
	let body: Option<TokenEndpointErrorBody> = serde_json::from_slice(&response.body).ok();
	let code = body.as_ref().and_then(|body| body.error.clone());
	let message = body
		.as_ref()
		.and_then(|body| body.error_description.clone())
		.or_else(|| code.clone())
		.map(|detail| format!("Token endpoint returned an OAuth error: {detail}"))
		.unwrap_or_else(|| format!("Token endpoint returned HTTP {}", response.status));

	match code.as_deref() {
		Some("invalid_grant") => ExchangeError::InvalidGrant { reason: message }.into(),
		Some("invalid_client" | "unauthorized_client") =>
			ExchangeError::InvalidClient { reason: message }.into(),
		_ => ExchangeError::Endpoint {
			message,
			status: Some(response.status),
			retry_after: response.retry_after,
		}
		.into(),
	}
}
