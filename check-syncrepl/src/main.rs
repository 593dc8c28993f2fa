//! check_syncrepl: audit syncrepl replication consistency between an LDAP
//! provider and consumer.
//!
//! The two servers' subtrees are fetched concurrently, reconciled entry by
//! entry (by entryCSN or by full attribute comparison), and the result is
//! rendered either as a Nagios status line with a severity exit code or as
//! warnings for a human operator.

mod check;
mod cli;
mod error;
mod ldap;

use std::process::ExitCode;

use clap::Parser;
use log::{LevelFilter, error, info};

use crate::check::report::ServiceStatus;
use crate::check::{CheckMode, Reconciliation, Snapshot, compare, fetch_snapshot, report};
use crate::cli::Cli;
use crate::error::CheckError;
use crate::ldap::LdapClient;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_logging(&args);

    match run(&args).await {
        Ok(result) => {
            if args.nagios {
                let (status, line) = report::nagios_status(&result, &args.consumer);
                println!("{line}");
                ExitCode::from(status.exit_code())
            } else {
                report::log_warnings(&result, &args.provider, &args.consumer);
                if !args.quiet {
                    println!("{}", report::summary_line(&result));
                }
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            if args.nagios && err.is_directory_failure() {
                println!("UNKNOWN - {err}");
                ExitCode::from(ServiceStatus::Unknown.exit_code())
            } else {
                error!("{err}");
                ExitCode::from(1)
            }
        }
    }
}

/// Fetch both snapshots concurrently and reconcile them.
async fn run(args: &Cli) -> Result<Reconciliation, CheckError> {
    let password = args.resolve_password()?;
    let mode = if args.attrs {
        CheckMode::Attributes
    } else {
        CheckMode::EntryCsn
    };
    let check_context_csn = !args.no_check_context_csn;

    let (provider, consumer) = futures::try_join!(
        fetch_endpoint(&args.provider, args, password.as_deref(), mode, check_context_csn),
        fetch_endpoint(&args.consumer, args, password.as_deref(), mode, check_context_csn),
    )?;

    info!(
        "Checking if entries are synchronized (by comparing {})",
        match mode {
            CheckMode::EntryCsn => "entryCSN",
            CheckMode::Attributes => "attribute values",
        }
    );
    Ok(compare(&provider, &consumer, check_context_csn))
}

/// Connect to one server and take its snapshot.
async fn fetch_endpoint(
    uri: &str,
    args: &Cli,
    password: Option<&str>,
    mode: CheckMode,
    want_context_csn: bool,
) -> Result<Snapshot, CheckError> {
    info!("Connecting to {uri}");
    let mut client = LdapClient::connect(
        uri,
        args.dn.as_deref(),
        password,
        !args.no_check_certificate,
    )
    .await?;

    let snapshot = fetch_snapshot(
        &mut client,
        &args.basedn,
        &args.filter,
        mode,
        want_context_csn,
    )
    .await?;

    client.unbind().await;
    Ok(snapshot)
}

/// Verbosity policy: debug wins, Nagios mode logs errors only, quiet keeps
/// warnings, the default is informational progress.
fn init_logging(args: &Cli) {
    let level = if args.debug {
        LevelFilter::Debug
    } else if args.nagios {
        LevelFilter::Error
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();
}
