//! Directory access: connection establishment and the search capability
//! consumed by the snapshot fetcher.

mod client;

pub use client::{AttrMap, DirectorySearch, LdapClient};
