//! Fatal error taxonomy for a check run.
//!
//! Reconciliation discrepancies (missing or diverged entries, contextCSN
//! mismatch) are not errors; they are the diagnostic output of the run.
//! Everything here aborts the run immediately with no partial result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    /// Rejected before any connection is attempted.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failed to initialize the connection or bind to a server.
    #[error("failed to connect to {uri}: {source}")]
    Connection {
        uri: String,
        #[source]
        source: ldap3::LdapError,
    },

    /// A search failed mid-fetch.
    #[error("search failed on {uri}: {source}")]
    Search {
        uri: String,
        #[source]
        source: ldap3::LdapError,
    },
}

impl CheckError {
    /// True for failures of the directory exchange itself. These map to
    /// the "unknown" service status in Nagios mode, as opposed to
    /// configuration mistakes which are plain usage errors.
    pub fn is_directory_failure(&self) -> bool {
        matches!(
            self,
            CheckError::Connection { .. } | CheckError::Search { .. }
        )
    }
}
