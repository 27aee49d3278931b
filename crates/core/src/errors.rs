//! Error types for the admigrate core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
///
/// Configuration errors are always fatal and abort before any mutation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// The directory connection settings read from the auth config are
    /// unusable (no servers, bad certificate, ...).
    #[error("invalid directory settings: {0}")]
    InvalidDirectorySettings(String),

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Directory lookup errors
// ---------------------------------------------------------------------------

/// Errors from directory (LDAP) searches and GUID decoding.
///
/// A lookup error during the index build aborts the whole batch: the build
/// is all-or-nothing.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The LDAP connection could not be established or the bind failed.
    #[error("LDAP connection failed: {0}")]
    ConnectionFailed(String),

    /// The underlying LDAP operation failed.
    #[error("LDAP search failed: {0}")]
    SearchFailed(#[from] ldap3::LdapError),

    /// A search returned zero entries for the given subject.
    #[error("no directory entry found for {subject}")]
    NotFound {
        subject: String,
    },

    /// The entry is missing the objectGUID attribute.
    #[error("directory entry '{dn}' has no objectGUID attribute")]
    MissingGuid {
        dn: String,
    },

    /// The raw objectGUID attribute is not a valid 16-byte GUID.
    #[error("invalid objectGUID ({0})")]
    InvalidGuid(String),
}

// ---------------------------------------------------------------------------
// Management API errors
// ---------------------------------------------------------------------------

/// Errors from the backing management API.
///
/// Persistence failures abort the run but leave prior successful
/// per-resource changes intact; there is no compensating rollback.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("management API HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("management API error (HTTP {status}) on {resource}: {body}")]
    StatusError {
        status: u16,
        resource: String,
        body: String,
    },

    /// JSON deserialization failure.
    #[error("management API response parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Migration errors
// ---------------------------------------------------------------------------

/// Errors from the rename/update engine itself.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A resource was acted upon before both its DN and GUID were resolved.
    /// The index build resolves both forms up front, so hitting this means
    /// the resource bypassed the build.
    #[error("principal '{0}' has no resolved counterpart form")]
    Unresolved(String),

    /// A lookup failure during the index build.
    #[error("index build failed: {0}")]
    BuildFailed(#[from] LookupError),

    /// A persistence failure while applying a rename.
    #[error("renaming principal '{principal}' failed: {source}")]
    RenameFailed {
        principal: String,
        #[source]
        source: ApiError,
    },
}
