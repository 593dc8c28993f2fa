//! Snapshot fetching: one server's view of the replicated subtree.
//!
//! A snapshot is built by a single fully drained subtree search, keyed by
//! entry DN, and optionally carries the server's contextCSN. It is
//! immutable once fetched; a failed search never yields a partial one.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::error::CheckError;
use crate::ldap::{AttrMap, DirectorySearch};

const ENTRY_CSN: &str = "entryCSN";

/// Comparison strategy, selected once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckMode {
    /// Compare the entryCSN change marker of every entry.
    EntryCsn,
    /// Compare every attribute value of every entry.
    Attributes,
}

/// Replication-relevant state of a single entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// The entry's change marker.
    Csn(String),
    /// All user attributes, values in retrieval order.
    Attributes(AttrMap),
}

/// One server's view of the subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// URI label of the server this snapshot was taken from.
    pub endpoint: String,
    /// Top-level change marker; None when not requested or not returned.
    pub context_csn: Option<String>,
    /// Entry DN to entry state, each DN at most once.
    pub entries: BTreeMap<String, EntryState>,
}

/// Fetch a snapshot of `base` from one server.
///
/// In entryCSN mode only the change marker is requested; in attribute mode
/// all user attributes are. With `want_context_csn` the server's top-level
/// marker is read first with a separate point search.
pub async fn fetch_snapshot(
    client: &mut impl DirectorySearch,
    base: &str,
    filter: &str,
    mode: CheckMode,
    want_context_csn: bool,
) -> Result<Snapshot, CheckError> {
    let endpoint = client.endpoint().to_string();

    let context_csn = if want_context_csn {
        let csn = client.context_csn(base).await?;
        match &csn {
            Some(value) => info!("contextCSN of {endpoint}: {value}"),
            None => warn!("contextCSN not available on {endpoint}"),
        }
        csn
    } else {
        None
    };

    info!("Listing entries from {endpoint}");
    let attrs: &[&str] = match mode {
        CheckMode::EntryCsn => &[ENTRY_CSN],
        CheckMode::Attributes => &["*"],
    };
    let raw = client.search_subtree(base, filter, attrs).await?;

    let mut entries = BTreeMap::new();
    for (dn, attr_map) in raw {
        debug!("Found on {endpoint}: {dn}");
        let state = match mode {
            CheckMode::EntryCsn => EntryState::Csn(extract_entry_csn(&endpoint, &dn, attr_map)),
            CheckMode::Attributes => EntryState::Attributes(attr_map),
        };
        entries.insert(dn, state);
    }
    info!("{} entries found on {endpoint}", entries.len());

    Ok(Snapshot {
        endpoint,
        context_csn,
        entries,
    })
}

/// First entryCSN value of an entry. Every OpenLDAP entry carries one; an
/// entry without it is recorded with an empty marker so the comparison can
/// still flag it when the other side disagrees.
fn extract_entry_csn(endpoint: &str, dn: &str, mut attrs: AttrMap) -> String {
    let first = attrs
        .remove(ENTRY_CSN)
        .and_then(|mut values| (!values.is_empty()).then(|| values.remove(0)));
    match first {
        Some(csn) => {
            debug!("entryCSN of {dn}: {csn}");
            csn
        }
        None => {
            warn!("Entry {dn} on {endpoint} has no entryCSN");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeDirectory {
        endpoint: String,
        entries: Vec<(String, AttrMap)>,
        context_csn: Option<String>,
        context_csn_requested: bool,
        requested_attrs: Vec<String>,
    }

    impl FakeDirectory {
        fn new(entries: Vec<(String, AttrMap)>, context_csn: Option<&str>) -> Self {
            Self {
                endpoint: "ldap://fake".to_string(),
                entries,
                context_csn: context_csn.map(str::to_string),
                context_csn_requested: false,
                requested_attrs: vec![],
            }
        }
    }

    #[async_trait]
    impl DirectorySearch for FakeDirectory {
        fn endpoint(&self) -> &str {
            &self.endpoint
        }

        async fn search_subtree(
            &mut self,
            _base: &str,
            _filter: &str,
            attrs: &[&str],
        ) -> Result<Vec<(String, AttrMap)>, CheckError> {
            self.requested_attrs = attrs.iter().map(|a| a.to_string()).collect();
            Ok(self.entries.clone())
        }

        async fn context_csn(&mut self, _base: &str) -> Result<Option<String>, CheckError> {
            self.context_csn_requested = true;
            Ok(self.context_csn.clone())
        }
    }

    fn entry(dn: &str, attrs: &[(&str, &[&str])]) -> (String, AttrMap) {
        let map = attrs
            .iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect();
        (dn.to_string(), map)
    }

    #[tokio::test]
    async fn test_csn_mode_keys_entries_by_dn() {
        let mut client = FakeDirectory::new(
            vec![
                entry("uid=a,o=example", &[("entryCSN", &["csn-a"])]),
                entry("uid=b,o=example", &[("entryCSN", &["csn-b", "ignored"])]),
            ],
            None,
        );

        let snapshot = fetch_snapshot(
            &mut client,
            "o=example",
            "(objectClass=*)",
            CheckMode::EntryCsn,
            false,
        )
        .await
        .unwrap();

        assert_eq!(client.requested_attrs, vec!["entryCSN"]);
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(
            snapshot.entries.get("uid=a,o=example"),
            Some(&EntryState::Csn("csn-a".to_string()))
        );
        // Only the first marker value counts.
        assert_eq!(
            snapshot.entries.get("uid=b,o=example"),
            Some(&EntryState::Csn("csn-b".to_string()))
        );
    }

    #[tokio::test]
    async fn test_attribute_mode_keeps_full_maps() {
        let mut client = FakeDirectory::new(
            vec![entry(
                "uid=a,o=example",
                &[("cn", &["Alice"]), ("mail", &["a@example.org"])],
            )],
            None,
        );

        let snapshot = fetch_snapshot(
            &mut client,
            "o=example",
            "(objectClass=*)",
            CheckMode::Attributes,
            false,
        )
        .await
        .unwrap();

        assert_eq!(client.requested_attrs, vec!["*"]);
        let state = snapshot.entries.get("uid=a,o=example").unwrap();
        match state {
            EntryState::Attributes(attrs) => {
                assert_eq!(attrs.get("cn"), Some(&vec!["Alice".to_string()]));
                assert_eq!(attrs.get("mail"), Some(&vec!["a@example.org".to_string()]));
            }
            EntryState::Csn(_) => panic!("expected attribute state"),
        }
    }

    #[tokio::test]
    async fn test_missing_entry_csn_records_empty_marker() {
        let mut client =
            FakeDirectory::new(vec![entry("uid=glue,o=example", &[])], None);

        let snapshot = fetch_snapshot(
            &mut client,
            "o=example",
            "(objectClass=*)",
            CheckMode::EntryCsn,
            false,
        )
        .await
        .unwrap();

        assert_eq!(
            snapshot.entries.get("uid=glue,o=example"),
            Some(&EntryState::Csn(String::new()))
        );
    }

    #[tokio::test]
    async fn test_context_csn_fetched_when_wanted() {
        let mut client = FakeDirectory::new(vec![], Some("20240101000000.000000Z#000000#000#000000"));

        let snapshot = fetch_snapshot(
            &mut client,
            "o=example",
            "(objectClass=*)",
            CheckMode::EntryCsn,
            true,
        )
        .await
        .unwrap();

        assert!(client.context_csn_requested);
        assert_eq!(
            snapshot.context_csn.as_deref(),
            Some("20240101000000.000000Z#000000#000#000000")
        );
    }

    #[tokio::test]
    async fn test_context_csn_unavailable_is_none() {
        let mut client = FakeDirectory::new(vec![], None);

        let snapshot = fetch_snapshot(
            &mut client,
            "o=example",
            "(objectClass=*)",
            CheckMode::EntryCsn,
            true,
        )
        .await
        .unwrap();

        assert!(client.context_csn_requested);
        assert_eq!(snapshot.context_csn, None);
    }

    #[tokio::test]
    async fn test_context_csn_skipped_when_not_wanted() {
        let mut client = FakeDirectory::new(vec![], Some("20240101000000.000000Z#000000#000#000000"));

        let snapshot = fetch_snapshot(
            &mut client,
            "o=example",
            "(objectClass=*)",
            CheckMode::EntryCsn,
            false,
        )
        .await
        .unwrap();

        assert!(!client.context_csn_requested);
        assert_eq!(snapshot.context_csn, None);
    }
}
