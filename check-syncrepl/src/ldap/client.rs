//! ldap3-backed directory client.
//!
//! Wraps connection establishment (TLS policy, optional simple bind) and
//! exposes the two search shapes the checker needs: a fully drained paged
//! subtree search and a base-scope point read of the contextCSN.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use log::{debug, warn};
use url::Url;

use crate::error::CheckError;

/// Page size for subtree searches. Servers commonly cap result sets at 500
/// entries, so paging at that size drains without tripping the size limit.
const PAGE_SIZE: i32 = 500;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Attribute map of a single entry: name to values in retrieval order.
pub type AttrMap = BTreeMap<String, Vec<String>>;

/// Search capability consumed by the snapshot fetcher.
#[async_trait]
pub trait DirectorySearch {
    /// Endpoint label used in log and report messages.
    fn endpoint(&self) -> &str;

    /// One subtree search under `base`, draining all result pages.
    async fn search_subtree(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<(String, AttrMap)>, CheckError>;

    /// First contextCSN value at `base`, or None when the attribute is
    /// not returned.
    async fn context_csn(&mut self, base: &str) -> Result<Option<String>, CheckError>;
}

pub struct LdapClient {
    uri: String,
    ldap: Ldap,
}

impl LdapClient {
    /// Open a connection to `uri` and bind. Without a bind DN the
    /// connection stays anonymous; a password alone is ignored.
    pub async fn connect(
        uri: &str,
        bind_dn: Option<&str>,
        password: Option<&str>,
        verify_tls: bool,
    ) -> Result<Self, CheckError> {
        Url::parse(uri)
            .map_err(|e| CheckError::Config(format!("invalid LDAP URI '{uri}': {e}")))?;

        let settings = LdapConnSettings::new()
            .set_conn_timeout(CONNECT_TIMEOUT)
            .set_no_tls_verify(!verify_tls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, uri)
            .await
            .map_err(|e| CheckError::Connection {
                uri: uri.to_string(),
                source: e,
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection driver error: {e}");
            }
        });

        if let Some(dn) = bind_dn {
            debug!("Binding to {uri} as {dn}");
            ldap.simple_bind(dn, password.unwrap_or(""))
                .await
                .and_then(|r| r.success())
                .map_err(|e| CheckError::Connection {
                    uri: uri.to_string(),
                    source: e,
                })?;
        }

        Ok(Self {
            uri: uri.to_string(),
            ldap,
        })
    }

    /// Best-effort unbind; failures are only logged.
    pub async fn unbind(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!("Unbind from {} failed: {e}", self.uri);
        }
    }

    fn search_error(&self, source: ldap3::LdapError) -> CheckError {
        CheckError::Search {
            uri: self.uri.clone(),
            source,
        }
    }

    /// Split a result entry into its DN and attribute map. Values that are
    /// not valid UTF-8 arrive separately and are folded in base64-encoded,
    /// after the textual values of the same attribute, so they still take
    /// part in attribute comparison.
    fn into_parts(entry: SearchEntry) -> (String, AttrMap) {
        let SearchEntry {
            dn,
            attrs,
            bin_attrs,
        } = entry;

        let mut map: AttrMap = attrs.into_iter().collect();
        for (name, values) in bin_attrs {
            let encoded = values.iter().map(|v| BASE64.encode(v));
            map.entry(name).or_default().extend(encoded);
        }
        (dn, map)
    }
}

#[async_trait]
impl DirectorySearch for LdapClient {
    fn endpoint(&self) -> &str {
        &self.uri
    }

    async fn search_subtree(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<(String, AttrMap)>, CheckError> {
        let attrs: Vec<String> = attrs.iter().map(|a| a.to_string()).collect();
        let adapters: Vec<Box<dyn Adapter<'_, String, Vec<String>>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(PAGE_SIZE)),
        ];

        let mut search = self
            .ldap
            .streaming_search_with(adapters, base, Scope::Subtree, filter, attrs)
            .await
            .map_err(|e| self.search_error(e))?;

        let mut entries = Vec::new();
        loop {
            let entry = match search.next().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(self.search_error(e)),
            };
            entries.push(Self::into_parts(SearchEntry::construct(entry)));
        }

        // The stream must report success, otherwise a page was dropped.
        search
            .finish()
            .await
            .success()
            .map_err(|e| self.search_error(e))?;

        Ok(entries)
    }

    async fn context_csn(&mut self, base: &str) -> Result<Option<String>, CheckError> {
        let (entries, _res) = self
            .ldap
            .search(base, Scope::Base, "(objectClass=*)", vec!["contextCSN"])
            .await
            .and_then(|r| r.success())
            .map_err(|e| self.search_error(e))?;

        Ok(entries.into_iter().next().and_then(|e| {
            let entry = SearchEntry::construct(e);
            entry
                .attrs
                .get("contextCSN")
                .and_then(|values| values.first().cloned())
        }))
    }
}
