//! Error handling subsystem. Implements a custom Error type.

use axum::{Json, http::StatusCode, response::IntoResponse};

use crate::prelude::*;
use crate::types::ErrorResponse;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	// Core errors
	NotFound,
	Unauthorized, // 401 - signature or token rejected
	DbError,
	Parse,

	// Input validation and constraints
	ValidationError(String), // 400 - invalid input data
	/// Route payload failed validation. Kept on the 500 path because
	/// deployed agents depend on the original behavior.
	RouteValidation(String),
	/// Attempted to claim a label owned by another user. Surfaced as 500
	/// with the message, matching the original wire behavior.
	DomainNotOwned(String),

	// System and configuration
	ConfigError(String),        // Missing or invalid configuration
	ServiceUnavailable(String), // 503 - CA not initialized, store down
	Internal(String),           // Internal invariant violations, for debugging

	// Processing
	CryptoError(String), // Certificate/key handling failures

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, message) = match self {
			Error::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
			Error::Unauthorized => {
				(StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
			}
			Error::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
			Error::RouteValidation(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
			Error::DomainNotOwned(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
			Error::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
			Error::CryptoError(msg) => (StatusCode::BAD_REQUEST, msg),
			// Infrastructure errors carry their message; this is an
			// internal control plane (see the propagation policy).
			Error::DbError => {
				(StatusCode::INTERNAL_SERVER_ERROR, "Store operation failed".to_string())
			}
			Error::Internal(msg) => {
				warn!("internal error: {}", msg);
				(StatusCode::INTERNAL_SERVER_ERROR, msg)
			}
			Error::Parse => {
				(StatusCode::INTERNAL_SERVER_ERROR, "Internal parse error".to_string())
			}
			Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
			Error::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
		};

		(status, Json(ErrorResponse::new(message))).into_response()
	}
}

impl From<std::num::ParseIntError> for Error {
	fn from(err: std::num::ParseIntError) -> Self {
		warn!("parse int error: {}", err);
		Error::Parse
	}
}

impl From<std::time::SystemTimeError> for Error {
	fn from(err: std::time::SystemTimeError) -> Self {
		warn!("system time error: {}", err);
		Error::ServiceUnavailable("system time error".into())
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		warn!("json error: {}", err);
		Error::Parse
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		warn!("tokio join error: {}", err);
		Error::ServiceUnavailable("task execution failed".into())
	}
}

impl From<pem::PemError> for Error {
	fn from(err: pem::PemError) -> Self {
		warn!("pem error: {}", err);
		Error::CryptoError("PEM parsing error".into())
	}
}

impl From<rcgen::Error> for Error {
	fn from(err: rcgen::Error) -> Self {
		warn!("rcgen error: {}", err);
		Error::CryptoError(format!("certificate generation error: {}", err))
	}
}

impl From<x509_parser::asn1_rs::Err<x509_parser::error::X509Error>> for Error {
	fn from(err: x509_parser::asn1_rs::Err<x509_parser::error::X509Error>) -> Self {
		warn!("x509 error: {}", err);
		Error::CryptoError("X.509 certificate error".into())
	}
}

impl From<axum::http::Error> for Error {
	fn from(err: axum::http::Error) -> Self {
		warn!("http error: {}", err);
		Error::Internal("http response error".into())
	}
}

/// Helper macro for locking mutexes with automatic internal error handling.
///
/// Converts lock poisoning into `Error::Internal`, optionally tagged with
/// a context string naming the poisoned lock.
#[macro_export]
macro_rules! lock {
	($mutex:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal("mutex poisoned".into()))
	};
	($mutex:expr, $context:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal(format!("mutex poisoned: {}", $context)))
	};
}

// vim: ts=4
