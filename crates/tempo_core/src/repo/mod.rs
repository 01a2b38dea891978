//! Repositories mapping domain operations onto the document store.
//!
//! # Responsibility
//! - Scope every call to the signed-in user.
//! - Convert between typed models and loosely typed documents, including
//!   legacy field aliases.
//!
//! # Invariants
//! - Writes without a signed-in user fail with `RepoError::Unauthenticated`.
//! - Reads without a signed-in user, or after a store failure, return empty
//!   values instead of errors.
//! - A malformed document is skipped and logged; it never aborts a batch.

use crate::db::DbError;
use crate::model::ModelValidationError;
use crate::store::StoreError;
use log::{debug, error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod fields;
pub mod profile_repo;
pub mod session_repo;
pub mod task_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for write paths.
#[derive(Debug)]
pub enum RepoError {
    Unauthenticated,
    Validation(ModelValidationError),
    Store(StoreError),
    NotFound(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "user is not signed in"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid stored document: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(path) => Self::NotFound(path),
            other => Self::Store(other),
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Store(StoreError::Db(value))
    }
}

/// Runs a write, logging failures before handing them back to the caller.
pub(crate) fn log_write<T>(
    operation: &'static str,
    run: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T> {
    let result = run();
    match &result {
        Ok(_) => debug!("event={operation} module=repo status=ok"),
        Err(RepoError::Unauthenticated) => {
            warn!("event={operation} module=repo status=error error_code=unauthenticated")
        }
        Err(err) => error!("event={operation} module=repo status=error error={err}"),
    }
    result
}

/// Runs a read, degrading any failure to the type's empty value.
pub(crate) fn read_or_empty<T: Default>(
    operation: &'static str,
    run: impl FnOnce() -> RepoResult<T>,
) -> T {
    match run() {
        Ok(value) => value,
        Err(RepoError::Unauthenticated) => {
            debug!("event={operation} module=repo status=skipped reason=unauthenticated");
            T::default()
        }
        Err(err) => {
            warn!("event={operation} module=repo status=degraded error={err}");
            T::default()
        }
    }
}
