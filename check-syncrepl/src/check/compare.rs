//! Snapshot reconciliation between provider and consumer.
//!
//! The provider is the source of truth in a push topology: divergence is
//! anchored on the provider's entries and attributes. Values existing only
//! on the consumer show up as entries missing on the provider, never as
//! attribute divergence.

use log::debug;

use super::snapshot::{EntryState, Snapshot};

/// A consumer entry whose state differs from the provider's.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divergence {
    pub dn: String,
    /// Differing attribute names in attribute mode, None in entryCSN mode.
    pub attributes: Option<Vec<String>>,
}

/// Outcome of reconciling two snapshots. Entries in sync appear nowhere.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Present on the provider, absent on the consumer.
    pub missing_on_consumer: Vec<String>,
    /// Present on the consumer, absent on the provider.
    pub missing_on_provider: Vec<String>,
    /// Present on both, different state on the consumer.
    pub diverged: Vec<Divergence>,
    /// The top-level change markers disagree. Always false when the
    /// marker check was disabled.
    pub context_csn_mismatch: bool,
}

impl Reconciliation {
    pub fn in_sync(&self) -> bool {
        self.missing_on_consumer.is_empty()
            && self.missing_on_provider.is_empty()
            && self.diverged.is_empty()
            && !self.context_csn_mismatch
    }
}

/// Reconcile two snapshots.
///
/// Runs one pass over the provider's entries (membership and state
/// comparison) and one over the consumer's (membership only). Both
/// snapshots iterate in DN order, so the result is deterministic for a
/// given pair of inputs.
pub fn compare(
    provider: &Snapshot,
    consumer: &Snapshot,
    check_context_csn: bool,
) -> Reconciliation {
    let mut result = Reconciliation::default();

    if check_context_csn {
        result.context_csn_mismatch = provider.context_csn != consumer.context_csn;
    }

    for (dn, provider_state) in &provider.entries {
        debug!("Checking entry {dn}");
        match consumer.entries.get(dn) {
            None => {
                debug!("Entry {dn}: not found on {}", consumer.endpoint);
                result.missing_on_consumer.push(dn.clone());
            }
            Some(consumer_state) => {
                if let Some(divergence) = diverged_state(dn, provider_state, consumer_state) {
                    result.diverged.push(divergence);
                }
            }
        }
    }

    for dn in consumer.entries.keys() {
        if !provider.entries.contains_key(dn) {
            debug!("Entry {dn}: not found on {}", provider.endpoint);
            result.missing_on_provider.push(dn.clone());
        }
    }

    result
}

/// Compare one entry's state on both sides; Some when they differ.
fn diverged_state(dn: &str, provider: &EntryState, consumer: &EntryState) -> Option<Divergence> {
    match (provider, consumer) {
        (EntryState::Csn(provider_csn), EntryState::Csn(consumer_csn)) => {
            if provider_csn == consumer_csn {
                None
            } else {
                debug!("Entry {dn} not synchronized: {provider_csn} <-> {consumer_csn}");
                Some(Divergence {
                    dn: dn.to_string(),
                    attributes: None,
                })
            }
        }
        (EntryState::Attributes(provider_attrs), EntryState::Attributes(consumer_attrs)) => {
            // Provider-anchored: an attribute absent on the consumer, or
            // whose value sequence differs (length- and order-sensitive),
            // is reported; attributes only on the consumer are not.
            let mut differing = Vec::new();
            for (name, values) in provider_attrs {
                if consumer_attrs.get(name) != Some(values) {
                    differing.push(name.clone());
                }
            }
            if differing.is_empty() {
                None
            } else {
                debug!("Entry {dn} not synchronized: {}", differing.join(","));
                Some(Divergence {
                    dn: dn.to_string(),
                    attributes: Some(differing),
                })
            }
        }
        // States of different kinds cannot happen within one run; report
        // the entry as diverged without attribute detail.
        _ => Some(Divergence {
            dn: dn.to_string(),
            attributes: None,
        }),
    }
}
