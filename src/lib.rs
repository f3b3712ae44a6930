//! Self-issued JWT bearer credentials for service identities. Discover service account keys,
//! mint signed assertions, and apply cached bearer tokens to request metadata.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod assertion;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod http;
pub mod key;
pub mod obs;
pub mod provider;
pub mod token;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		credentials::{Builder, ServiceAccountCredentials},
		http::ReqwestHttpClient,
		key::KeyMaterial,
		token::Target,
	};

	/// Credentials type alias used by reqwest-backed integration tests.
	pub type ReqwestTestCredentials = ServiceAccountCredentials<ReqwestHttpClient>;

	/// Parses a credential document and returns a facade builder for the given target.
	///
	/// Panics on malformed documents so test fixtures fail loudly.
	pub fn test_credentials_builder(document: &[u8], target: Target) -> Builder {
		let key = KeyMaterial::from_slice(document)
			.expect("Test credential document should parse successfully.");

		Builder::new(key, target)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, rand as _, rsa as _, tempfile as _};
