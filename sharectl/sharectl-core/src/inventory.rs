//! Inventory construction: list the owned shared items, resolve each one's
//! path, classify its access entries and emit one snapshot row per item.

use tracing::{debug, info, warn};

use crate::classify::{classify, Classification};
use crate::error::{PathError, ProviderError};
use crate::model::{AccessEntry, Item, SnapshotRow};
use crate::paths::PathResolver;
use crate::provider::CloudProvider;

/// Snapshot of every owned, shared item, sorted by path.
#[derive(Debug, Default)]
pub struct Inventory {
    pub rows: Vec<SnapshotRow>,
    /// Items dropped by per-item failures. The run itself still succeeds.
    pub skipped: usize,
}

/// Builds one inventory per instance. The path cache inside is scoped to
/// that single pass, so hierarchy changes between runs are always observed.
pub struct InventoryBuilder<'a> {
    provider: &'a dyn CloudProvider,
    resolver: PathResolver,
}

impl<'a> InventoryBuilder<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> Self {
        Self {
            provider,
            resolver: PathResolver::new(),
        }
    }

    /// Inventory every shared item the given account owns.
    pub fn build(mut self, owner: &str) -> Result<Inventory, ProviderError> {
        let owner_lower = owner.to_ascii_lowercase();
        let items = self.provider.list_owned_shared_items(owner)?;
        info!(count = items.len(), "inventorying shared items");
        self.resolver.seed(&items);

        let mut inventory = Inventory::default();
        for item in &items {
            let path = match self.resolver.resolve(self.provider, item) {
                Ok(path) => path,
                Err(PathError::UnresolvableParent(parent)) => {
                    debug!(item = %item.id, %parent, "parent not resolvable, item excluded");
                    inventory.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(item = %item.id, error = %e, "path resolution failed, item excluded");
                    inventory.skipped += 1;
                    continue;
                }
            };
            let entries = match self.provider.fetch_access_control(&item.id) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(item = %item.id, error = %e, "access fetch failed, item excluded");
                    inventory.skipped += 1;
                    continue;
                }
            };
            inventory.rows.push(build_row(item, path, &entries, &owner_lower));
        }
        inventory
            .rows
            .sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)));
        Ok(inventory)
    }
}

fn build_row(item: &Item, path: String, entries: &[AccessEntry], owner: &str) -> SnapshotRow {
    let mut row = SnapshotRow::new(item.id.clone(), path, item.kind);
    for entry in entries {
        match classify(entry) {
            Some(Classification::Public) => row.public_link = true,
            Some(Classification::Tier(role)) => {
                let Some(email) = entry.email_address.as_deref() else {
                    debug!(item = %item.id, "entry has no address, skipped");
                    continue;
                };
                // Owner access is implicit and never listed as a grant.
                if email.eq_ignore_ascii_case(owner) {
                    continue;
                }
                row.insert_grant(role, email.to_ascii_lowercase());
            }
            None => {
                debug!(
                    item = %item.id,
                    kind = %entry.kind,
                    role = %entry.role,
                    "unclassified entry skipped"
                );
            }
        }
    }
    row
}
