//! Rendering a reconciliation result as monitoring output or as warnings
//! for a human operator.

use colored::Colorize;
use log::warn;

use super::compare::{Divergence, Reconciliation};

/// Nagios service status with its process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceStatus {
    Ok,
    Critical,
    Unknown,
}

impl ServiceStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            ServiceStatus::Ok => 0,
            ServiceStatus::Critical => 2,
            ServiceStatus::Unknown => 3,
        }
    }
}

/// Single status line for Nagios mode. Every problem category present is
/// surfaced in the one message; none suppresses another.
pub fn nagios_status(result: &Reconciliation, consumer: &str) -> (ServiceStatus, String) {
    let mut problems = Vec::new();

    if result.context_csn_mismatch {
        problems.push(format!(
            "contextCSN of {consumer} not the same as on provider"
        ));
    }
    if !result.missing_on_consumer.is_empty() {
        problems.push(format!(
            "{} not found object(s) on consumer",
            result.missing_on_consumer.len()
        ));
    }
    if !result.missing_on_provider.is_empty() {
        problems.push(format!(
            "{} not found object(s) on provider",
            result.missing_on_provider.len()
        ));
    }
    if !result.diverged.is_empty() {
        problems.push(format!(
            "{} not synchronized object(s) on consumer",
            result.diverged.len()
        ));
    }

    if problems.is_empty() {
        (
            ServiceStatus::Ok,
            "OK : consumer and provider are synchronized".to_string(),
        )
    } else {
        (
            ServiceStatus::Critical,
            format!("CRITICAL : {}", problems.join(", ")),
        )
    }
}

/// Warning blocks for interactive mode, grouped by server and category.
/// Every affected DN is listed; nothing is truncated. Returns true when
/// nothing was reported.
pub fn log_warnings(result: &Reconciliation, provider: &str, consumer: &str) -> bool {
    let mut clean = true;

    if result.context_csn_mismatch {
        warn!("contextCSN of {consumer} not the same as on provider");
        clean = false;
    }
    if !result.missing_on_consumer.is_empty() {
        warn!(
            "Not found objects on {consumer}:\n  - {}",
            result.missing_on_consumer.join("\n  - ")
        );
        clean = false;
    }
    if !result.missing_on_provider.is_empty() {
        warn!(
            "Not found objects on {provider}:\n  - {}",
            result.missing_on_provider.join("\n  - ")
        );
        clean = false;
    }
    if !result.diverged.is_empty() {
        let lines: Vec<String> = result.diverged.iter().map(describe_divergence).collect();
        warn!("Not sync objects on {consumer}:\n  - {}", lines.join("\n  - "));
        clean = false;
    }

    clean
}

/// One-line colored verdict for interactive runs.
pub fn summary_line(result: &Reconciliation) -> String {
    if result.in_sync() {
        format!("{}", "No sync problem detected".green())
    } else {
        format!("{}", "Replication problems detected".red().bold())
    }
}

fn describe_divergence(divergence: &Divergence) -> String {
    match &divergence.attributes {
        Some(attrs) => format!("{} ({})", divergence.dn, attrs.join(",")),
        None => divergence.dn.clone(),
    }
}
