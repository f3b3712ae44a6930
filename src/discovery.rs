//! Credential document discovery.
//!
//! Resolution order, first success wins:
//!
//! 1. An explicit source (path or in-memory bytes); parse failures are fatal.
//! 2. The [`CREDENTIALS_ENV_VAR`] environment variable holding a filesystem
//!    path; an unset variable falls through, but a set variable pointing at a
//!    missing or malformed document is fatal; there is no silent fallback.
//! 3. The fixed [`WELL_KNOWN_PATH`] under the home directory; absence here is
//!    a legitimate terminal state and yields `Ok(None)`, since zero-config
//!    deployments may rely on other credential strategies.
//!
//! Steps 2 and 3 are asymmetric: a misconfigured environment variable is an
//! operator error that must surface, while a missing well-known file is the
//! normal "nothing configured" state.
//!
//! All environment and filesystem access flows through [`SystemProvider`] so
//! discovery is deterministically testable without mutating the process
//! environment.

// self
use crate::{
	_prelude::*,
	error::ParseError,
	key::KeyMaterial,
	obs::{StageKind, StageSpan},
};

/// Environment variable holding an absolute path to a credential document.
pub const CREDENTIALS_ENV_VAR: &str = "SERVICE_ACCOUNT_CREDENTIALS";
/// Relative path under the home directory checked when nothing else is
/// configured.
pub const WELL_KNOWN_PATH: &str = ".config/service_account/application_credentials.json";

/// Injectable environment and filesystem access used by discovery.
pub trait SystemProvider
where
	Self: Send + Sync,
{
	/// Reads an environment variable, `None` when unset or not unicode.
	fn read_env(&self, name: &str) -> Option<String>;

	/// Reads a file's full contents.
	fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;

	/// Returns the user's home directory, if one is known.
	fn home_dir(&self) -> Option<PathBuf> {
		self.read_env("HOME").map(PathBuf::from)
	}
}

/// [`SystemProvider`] backed by the real process environment and filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsSystem;
impl SystemProvider for OsSystem {
	fn read_env(&self, name: &str) -> Option<String> {
		std::env::var(name).ok()
	}

	fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
		std::fs::read(path)
	}
}

/// Caller-supplied credential source taking precedence over the environment.
#[derive(Clone, Copy, Debug)]
pub enum ExplicitSource<'a> {
	/// Filesystem path to a credential document.
	Path(&'a Path),
	/// In-memory credential document bytes (e.g. from a secret manager).
	Bytes(&'a [u8]),
}
impl<'a> From<&'a Path> for ExplicitSource<'a> {
	fn from(path: &'a Path) -> Self {
		Self::Path(path)
	}
}
impl<'a> From<&'a [u8]> for ExplicitSource<'a> {
	fn from(bytes: &'a [u8]) -> Self {
		Self::Bytes(bytes)
	}
}

/// Locates and parses credential documents.
#[derive(Clone, Debug, Default)]
pub struct Discovery<S = OsSystem> {
	system: S,
}
impl Discovery {
	/// Creates a discovery backed by the real environment and filesystem.
	pub fn new() -> Self {
		Self::default()
	}
}
impl<S> Discovery<S>
where
	S: SystemProvider,
{
	/// Creates a discovery backed by a caller-supplied [`SystemProvider`].
	pub fn with_system(system: S) -> Self {
		Self { system }
	}

	/// Parses a credential document from an explicit source.
	pub fn from_explicit(&self, source: ExplicitSource) -> Result<KeyMaterial, ParseError> {
		match source {
			ExplicitSource::Path(path) => self.from_path(path),
			ExplicitSource::Bytes(bytes) => KeyMaterial::from_slice(bytes),
		}
	}

	/// Parses the credential document at `path`.
	pub fn from_path(&self, path: &Path) -> Result<KeyMaterial, ParseError> {
		let bytes = self
			.system
			.read_file(path)
			.map_err(|source| ParseError::io(Some(path.to_owned()), source))?;

		KeyMaterial::from_slice(&bytes)
	}

	/// Loads credentials from the path named by [`CREDENTIALS_ENV_VAR`].
	///
	/// An unset variable is `Ok(None)`. A set variable pointing at a missing
	/// or malformed document is an error; it is never treated as "not found".
	pub fn from_env(&self) -> Result<Option<KeyMaterial>, ParseError> {
		let Some(path) = self.system.read_env(CREDENTIALS_ENV_VAR) else {
			return Ok(None);
		};

		self.from_path(Path::new(&path)).map(Some)
	}

	/// Loads credentials from [`WELL_KNOWN_PATH`] under the home directory.
	///
	/// A missing home directory or absent file is `Ok(None)`; a present but
	/// malformed document is an error.
	pub fn from_well_known_path(&self) -> Result<Option<KeyMaterial>, ParseError> {
		let Some(home) = self.system.home_dir() else {
			return Ok(None);
		};
		let path = home.join(WELL_KNOWN_PATH);

		match self.system.read_file(&path) {
			Ok(bytes) => KeyMaterial::from_slice(&bytes).map(Some),
			Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(source) => Err(ParseError::io(Some(path), source)),
		}
	}

	/// Runs the full resolution order; `Ok(None)` means no credentials are
	/// configured anywhere.
	pub fn discover(
		&self,
		explicit: Option<ExplicitSource>,
	) -> Result<Option<KeyMaterial>, ParseError> {
		let _guard = StageSpan::new(StageKind::Discovery, "discover").entered();

		if let Some(source) = explicit {
			return self.from_explicit(source).map(Some);
		}
		if let Some(material) = self.from_env()? {
			return Ok(Some(material));
		}

		self.from_well_known_path()
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

	#[derive(Default)]
	struct FakeSystem {
		env: HashMap<String, String>,
		files: HashMap<PathBuf, Vec<u8>>,
	}
	impl FakeSystem {
		fn with_env(mut self, name: &str, value: &str) -> Self {
			self.env.insert(name.into(), value.into());

			self
		}

		fn with_file(mut self, path: &str, bytes: Vec<u8>) -> Self {
			self.files.insert(PathBuf::from(path), bytes);

			self
		}
	}
	impl SystemProvider for FakeSystem {
		fn read_env(&self, name: &str) -> Option<String> {
			self.env.get(name).cloned()
		}

		fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
			self.files.get(path).cloned().ok_or_else(|| {
				std::io::Error::new(std::io::ErrorKind::NotFound, "no such file")
			})
		}
	}

	fn credential_document() -> Vec<u8> {
		let mut rng = rand::thread_rng();
		let private_pem = RsaPrivateKey::new(&mut rng, 2048)
			.expect("RSA key generation should succeed for discovery tests.")
			.to_pkcs8_pem(LineEnding::LF)
			.expect("Private key should encode to PKCS#8 PEM.")
			.to_string();

		serde_json::json!({
			"type": "service_account",
			"client_email": "app@developer.example.com",
			"private_key": private_pem,
			"private_key_id": "discovery-test-kid",
			"client_id": "app.apps.example.com"
		})
		.to_string()
		.into_bytes()
	}

	#[test]
	fn from_env_is_none_when_variable_is_unset() {
		let discovery = Discovery::with_system(FakeSystem::default());

		assert!(
			discovery.from_env().expect("Unset variable should not be an error.").is_none()
		);
	}

	#[test]
	fn from_env_fails_when_path_does_not_exist() {
		let system = FakeSystem::default().with_env(CREDENTIALS_ENV_VAR, "/does/not/exist");
		let discovery = Discovery::with_system(system);
		let err = discovery
			.from_env()
			.expect_err("A set variable pointing at a missing file should be fatal.");

		assert!(matches!(err, ParseError::Io { .. }));
	}

	#[test]
	fn from_env_loads_a_valid_document() {
		let system = FakeSystem::default()
			.with_env(CREDENTIALS_ENV_VAR, "/secrets/creds.json")
			.with_file("/secrets/creds.json", credential_document());
		let discovery = Discovery::with_system(system);
		let material = discovery
			.from_env()
			.expect("Valid document should parse.")
			.expect("Credentials should be found via the environment.");

		assert_eq!(material.issuer(), "app@developer.example.com");
		assert_eq!(material.key_id(), Some("discovery-test-kid"));
	}

	#[test]
	fn well_known_path_is_none_when_file_is_absent() {
		let system = FakeSystem::default().with_env("HOME", "/home/svc");
		let discovery = Discovery::with_system(system);

		assert!(
			discovery
				.from_well_known_path()
				.expect("Absent well-known file should not be an error.")
				.is_none()
		);
	}

	#[test]
	fn well_known_path_is_none_without_a_home_directory() {
		let discovery = Discovery::with_system(FakeSystem::default());

		assert!(
			discovery
				.from_well_known_path()
				.expect("Missing home directory should not be an error.")
				.is_none()
		);
	}

	#[test]
	fn well_known_path_loads_a_valid_document() {
		let path = format!("/home/svc/{WELL_KNOWN_PATH}");
		let system = FakeSystem::default()
			.with_env("HOME", "/home/svc")
			.with_file(&path, credential_document());
		let discovery = Discovery::with_system(system);
		let material = discovery
			.from_well_known_path()
			.expect("Valid document should parse.")
			.expect("Credentials should be found at the well-known path.");

		assert_eq!(material.issuer(), "app@developer.example.com");
	}

	#[test]
	fn explicit_source_takes_precedence_and_parse_failures_are_fatal() {
		let system = FakeSystem::default()
			.with_env(CREDENTIALS_ENV_VAR, "/secrets/creds.json")
			.with_file("/secrets/creds.json", credential_document());
		let discovery = Discovery::with_system(system);
		let garbage: &[u8] = b"{\"type\":\"service_account\"}";

		// A malformed explicit source must not fall through to the (valid)
		// environment variable.
		discovery
			.discover(Some(ExplicitSource::from(garbage)))
			.expect_err("Malformed explicit sources should be fatal.");

		let document = credential_document();
		let material = discovery
			.discover(Some(ExplicitSource::from(document.as_slice())))
			.expect("Explicit bytes should parse.")
			.expect("Explicit bytes should yield credentials.");

		assert_eq!(material.issuer(), "app@developer.example.com");
	}

	#[test]
	fn discover_falls_back_through_env_to_well_known_path() {
		let path = format!("/home/svc/{WELL_KNOWN_PATH}");
		let system = FakeSystem::default()
			.with_env("HOME", "/home/svc")
			.with_file(&path, credential_document());
		let discovery = Discovery::with_system(system);
		let material = discovery
			.discover(None)
			.expect("Fallback discovery should succeed.")
			.expect("Credentials should be found at the well-known path.");

		assert_eq!(material.issuer(), "app@developer.example.com");

		let empty = Discovery::with_system(FakeSystem::default());

		assert!(
			empty
				.discover(None)
				.expect("Zero-config discovery should not be an error.")
				.is_none()
		);
	}
}
