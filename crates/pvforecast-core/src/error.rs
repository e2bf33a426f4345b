// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Error types for the forecast fetcher and cache

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The API rejected the key (HTTP 401/403)
    #[error("invalid API key")]
    InvalidCredentials,

    /// Connection refused, DNS failure, timeout, or a broken body stream
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// Any other non-200 response
    #[error("remote error: HTTP {status}")]
    RemoteError { status: u16 },

    /// HTTP 200 whose body is not a JSON object
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Whether the failure is worth retrying on the next scheduled refresh.
    /// Bad credentials will not fix themselves.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidCredentials)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL: it carries the API key in its query string
        Self::ConnectionFailure(err.without_url().to_string())
    }
}

/// A single forecast entry that could not be decoded.
///
/// Never fatal: the entry is dropped and the rest of the series is kept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartialDataError {
    #[error("invalid timestamp '{key}'")]
    InvalidTimestamp { key: String },

    #[error("timestamp '{key}' is not on the hour")]
    UnalignedTimestamp { key: String },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, FetchError>;
