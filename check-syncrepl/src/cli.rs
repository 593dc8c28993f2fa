//! Command-line surface of the checker.

use clap::Parser;

use crate::error::CheckError;

/// Check LDAP syncrepl replication state between two servers.
///
/// One server is considered the provider and the other the consumer.
/// Replication state is checked either by comparing the entryCSN of every
/// entry of the directory on both servers, or by comparing all attribute
/// values of every entry. In both cases the contextCSN of the servers can
/// be compared and entries missing on either side are reported.
#[derive(Debug, Parser)]
#[command(name = "check_syncrepl", version, about)]
pub struct Cli {
    /// LDAP provider URI (example: ldaps://ldapmaster.foo:636)
    #[arg(short = 'p', long)]
    pub provider: String,

    /// LDAP consumer URI (example: ldaps://ldapslave.foo:636)
    #[arg(short = 'c', long)]
    pub consumer: String,

    /// LDAP bind DN (anonymous bind when omitted)
    #[arg(short = 'D', long)]
    pub dn: Option<String>,

    /// LDAP bind password (prompted for when --dn is given without it)
    #[arg(short = 'P', long)]
    pub pwd: Option<String>,

    /// LDAP base DN (example: o=example)
    #[arg(short = 'b', long)]
    pub basedn: String,

    /// LDAP search filter
    #[arg(short = 'f', long, default_value = "(objectClass=*)")]
    pub filter: String,

    /// Compare all attribute values instead of only entryCSN
    #[arg(short = 'a', long)]
    pub attrs: bool,

    /// Don't check the server certificate
    #[arg(long = "no-check-certificate")]
    pub no_check_certificate: bool,

    /// Don't compare the contextCSN of the servers
    #[arg(long = "no-check-contextCSN")]
    pub no_check_context_csn: bool,

    /// Nagios check plugin mode
    #[arg(short = 'n', long)]
    pub nagios: bool,

    /// Debug mode
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Quiet mode
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Cli {
    /// Bind password to use, prompting interactively when a bind DN was
    /// given without one. A password without a DN is ignored by the bind.
    pub fn resolve_password(&self) -> Result<Option<String>, CheckError> {
        match (&self.dn, &self.pwd) {
            (Some(_), None) => {
                let pwd = rpassword::prompt_password("Enter DN Password: ").map_err(|e| {
                    CheckError::Config(format!("failed to read bind password: {e}"))
                })?;
                Ok(Some(pwd))
            }
            (_, pwd) => Ok(pwd.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(argv)
    }

    #[test]
    fn test_minimal_invocation() {
        let cli = parse(&[
            "check_syncrepl",
            "-p",
            "ldap://provider",
            "-c",
            "ldap://consumer",
            "-b",
            "o=example",
        ])
        .unwrap();

        assert_eq!(cli.provider, "ldap://provider");
        assert_eq!(cli.consumer, "ldap://consumer");
        assert_eq!(cli.basedn, "o=example");
        assert_eq!(cli.filter, "(objectClass=*)");
        assert!(!cli.attrs);
        assert!(!cli.nagios);
        assert!(!cli.no_check_certificate);
        assert!(!cli.no_check_context_csn);
    }

    #[test]
    fn test_missing_required_arguments_rejected() {
        assert!(parse(&["check_syncrepl", "-p", "ldap://provider"]).is_err());
        assert!(parse(&["check_syncrepl", "-b", "o=example"]).is_err());
    }

    #[test]
    fn test_long_flags() {
        let cli = parse(&[
            "check_syncrepl",
            "--provider",
            "ldaps://master:636",
            "--consumer",
            "ldaps://slave:636",
            "--basedn",
            "o=example",
            "--filter",
            "(objectClass=person)",
            "--attrs",
            "--nagios",
            "--no-check-certificate",
            "--no-check-contextCSN",
        ])
        .unwrap();

        assert_eq!(cli.filter, "(objectClass=person)");
        assert!(cli.attrs);
        assert!(cli.nagios);
        assert!(cli.no_check_certificate);
        assert!(cli.no_check_context_csn);
    }

    #[test]
    fn test_explicit_password_is_kept() {
        let cli = parse(&[
            "check_syncrepl",
            "-p",
            "ldap://provider",
            "-c",
            "ldap://consumer",
            "-b",
            "o=example",
            "-D",
            "uid=nagios,ou=sysaccounts,o=example",
            "-P",
            "secret",
        ])
        .unwrap();

        assert_eq!(cli.resolve_password().unwrap().as_deref(), Some("secret"));
    }

    #[test]
    fn test_no_dn_means_no_prompt() {
        let cli = parse(&[
            "check_syncrepl",
            "-p",
            "ldap://provider",
            "-c",
            "ldap://consumer",
            "-b",
            "o=example",
        ])
        .unwrap();

        assert_eq!(cli.resolve_password().unwrap(), None);
    }
}
