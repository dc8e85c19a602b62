//! Extractors that report malformed input as [`ServerError::Validation`]
//! instead of axum's plain-text rejections.

use crate::error::ServerError;
use axum::extract::{FromRequest, FromRequestParts};

/// `axum::Json` with structured validation errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ValidJson<T>(pub T);

/// `axum::extract::Query` with structured validation errors.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServerError))]
pub struct ValidQuery<T>(pub T);
