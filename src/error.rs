use thiserror::Error;

/// The manifest page could not be retrieved. Fatal to a run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The document does not contain the launch table at all.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("anchor #{0} not found in document")]
    AnchorNotFound(String),

    #[error("no table follows anchor #{0}")]
    TableNotFound(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("store I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store contents invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store document at {0} is not a JSON object")]
    NotAnObject(String),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write token to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {what}: {source}")]
    Malformed {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("client secrets list no redirect URI")]
    NoRedirectUri,

    #[error("authorization required, visit {url} and run `launch_sync authorize`")]
    AuthorizationRequired { url: String },

    #[error("token endpoint: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint answered {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("stored token has expired and carries no refresh token")]
    NoRefreshToken,

    #[error("failed to read authorization code: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("invalid url {0}")]
    Url(String),
}

/// A single calendar API call failed.
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("calendar API answered {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid calendar url: {0}")]
    Url(String),
}

/// Why a manifest row produced no record. Never fails the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowSkip {
    #[error("row has {found} cells, layout needs {expected}")]
    ShapeMismatch { found: usize, expected: usize },

    #[error("unparseable date {0:?}")]
    BadDate(String),
}
