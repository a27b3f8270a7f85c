//! Borrowed state passed through a single driver resolution.

use crate::cache::CacheStore;
use crate::config::Settings;
use crate::network::Network;
use crate::platform::Platform;

/// Collaborators borrowed by every step of one resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub network: &'a Network,
    pub cache: &'a CacheStore,
    pub settings: &'a Settings,
    pub platform: Platform,
}
