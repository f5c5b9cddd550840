//! Hierarchical path resolution by walking parent references.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{PathError, ProviderError};
use crate::model::{Item, ItemKind};
use crate::provider::CloudProvider;

/// Depth cap guarding against anomalous parent chains (cycles, corrupt
/// provider data). Well-formed hierarchies stay far below this.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Resolves `"ROOT/seg1/.../title"` paths by climbing parent references.
///
/// One resolver serves one inventory pass. It owns two private caches: a
/// folder-path memo (folders only; files are cheap and referenced once) and
/// a map of already-fetched items seeded from the listing so known parents
/// never cost another round-trip. Neither cache survives the pass: external
/// state may change between runs.
pub struct PathResolver {
    known: HashMap<String, Item>,
    folder_paths: HashMap<String, String>,
    max_depth: usize,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PathResolver {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            known: HashMap::new(),
            folder_paths: HashMap::new(),
            max_depth,
        }
    }

    /// Remember items that are already in hand, so resolving their children
    /// does not re-fetch them.
    pub fn seed<'a>(&mut self, items: impl IntoIterator<Item = &'a Item>) {
        for item in items {
            self.known.insert(item.id.clone(), item.clone());
        }
    }

    /// Resolve the full path of `item`.
    ///
    /// Climbs toward the root until it reaches a root-parented item or a
    /// memoized folder, then unwinds, recording the path of every folder on
    /// the way. Items whose chain leaves the owned hierarchy fail with
    /// [`PathError::UnresolvableParent`]; chains longer than the depth cap
    /// fail with [`PathError::PathTooDeep`].
    pub fn resolve(
        &mut self,
        provider: &dyn CloudProvider,
        item: &Item,
    ) -> Result<String, PathError> {
        if item.kind == ItemKind::Folder {
            if let Some(path) = self.folder_paths.get(&item.id) {
                return Ok(path.clone());
            }
        }

        let mut chain: Vec<Item> = Vec::new();
        let mut current = item.clone();
        let base: String;
        loop {
            if chain.len() >= self.max_depth {
                return Err(PathError::PathTooDeep {
                    id: item.id.clone(),
                    limit: self.max_depth,
                });
            }
            let parent = match &current.parent {
                None => return Err(PathError::UnresolvableParent(current.id.clone())),
                Some(p) => p.clone(),
            };
            if parent.is_root {
                chain.push(current);
                base = String::from("ROOT");
                break;
            }
            if let Some(path) = self.folder_paths.get(&parent.id) {
                base = path.clone();
                chain.push(current);
                break;
            }
            let next = self.lookup(provider, &parent.id)?;
            chain.push(current);
            current = next;
        }

        let mut path = base;
        for link in chain.iter().rev() {
            path.push('/');
            path.push_str(&link.title);
            if link.kind == ItemKind::Folder {
                self.folder_paths.insert(link.id.clone(), path.clone());
            }
        }
        Ok(path)
    }

    fn lookup(&mut self, provider: &dyn CloudProvider, id: &str) -> Result<Item, PathError> {
        if let Some(item) = self.known.get(id) {
            return Ok(item.clone());
        }
        debug!(id, "fetching parent item");
        match provider.get_item(id) {
            Ok(item) => {
                self.known.insert(id.to_string(), item.clone());
                Ok(item)
            }
            Err(ProviderError::NotFound(_)) | Err(ProviderError::Forbidden(_)) => {
                Err(PathError::UnresolvableParent(id.to_string()))
            }
            Err(source) => Err(PathError::Provider {
                id: id.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParentRef;
    use crate::provider::MemoryProvider;

    fn item(id: &str, title: &str, kind: ItemKind, parent: Option<(&str, bool)>) -> Item {
        Item {
            id: id.into(),
            title: title.into(),
            kind,
            parent: parent.map(|(pid, is_root)| ParentRef {
                id: pid.into(),
                is_root,
            }),
            shared: true,
        }
    }

    fn folder(id: &str, title: &str, parent: Option<(&str, bool)>) -> Item {
        item(id, title, ItemKind::Folder, parent)
    }

    fn file(id: &str, title: &str, parent: Option<(&str, bool)>) -> Item {
        item(id, title, ItemKind::File, parent)
    }

    #[test]
    fn root_parented_item_resolves_directly() {
        let provider = MemoryProvider::new("me@x.com");
        let mut resolver = PathResolver::new();
        let doc = file("f1", "notes.txt", Some(("root", true)));
        assert_eq!(resolver.resolve(&provider, &doc).unwrap(), "ROOT/notes.txt");
    }

    #[test]
    fn nested_chain_resolves_through_parents() {
        let provider = MemoryProvider::new("me@x.com");
        provider.add_item(folder("a", "projects", Some(("root", true))));
        provider.add_item(folder("b", "2024", Some(("a", false))));
        let doc = file("f1", "plan.md", Some(("b", false)));

        let mut resolver = PathResolver::new();
        assert_eq!(
            resolver.resolve(&provider, &doc).unwrap(),
            "ROOT/projects/2024/plan.md"
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let provider = MemoryProvider::new("me@x.com");
        provider.add_item(folder("a", "projects", Some(("root", true))));
        let doc = file("f1", "plan.md", Some(("a", false)));

        let mut resolver = PathResolver::new();
        let first = resolver.resolve(&provider, &doc).unwrap();
        let second = resolver.resolve(&provider, &doc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn folder_paths_are_computed_once() {
        let provider = MemoryProvider::new("me@x.com");
        provider.add_item(folder("shared", "shared", Some(("root", true))));
        let one = file("f1", "one.txt", Some(("shared", false)));
        let two = file("f2", "two.txt", Some(("shared", false)));

        let mut resolver = PathResolver::new();
        resolver.resolve(&provider, &one).unwrap();
        resolver.resolve(&provider, &two).unwrap();
        // Second resolution hits the folder-path memo, not the provider.
        assert_eq!(provider.get_item_calls("shared"), 1);
    }

    #[test]
    fn seeded_items_are_never_fetched() {
        let provider = MemoryProvider::new("me@x.com");
        let parent = folder("a", "docs", Some(("root", true)));
        provider.add_item(parent.clone());
        let doc = file("f1", "readme.md", Some(("a", false)));

        let mut resolver = PathResolver::new();
        resolver.seed([&parent, &doc]);
        assert_eq!(resolver.resolve(&provider, &doc).unwrap(), "ROOT/docs/readme.md");
        assert_eq!(provider.get_item_calls("a"), 0);
    }

    #[test]
    fn missing_parent_reference_is_unresolvable() {
        let provider = MemoryProvider::new("me@x.com");
        let orphan = file("f1", "lost.txt", None);
        let mut resolver = PathResolver::new();
        match resolver.resolve(&provider, &orphan) {
            Err(PathError::UnresolvableParent(id)) => assert_eq!(id, "f1"),
            other => panic!("expected UnresolvableParent, got {other:?}"),
        }
    }

    #[test]
    fn foreign_parent_is_unresolvable() {
        // The parent exists on the provider side but is not reachable for
        // this account, e.g. a shared subfolder of someone else's tree.
        let provider = MemoryProvider::new("me@x.com");
        let doc = file("f1", "guest.txt", Some(("foreign", false)));
        let mut resolver = PathResolver::new();
        match resolver.resolve(&provider, &doc) {
            Err(PathError::UnresolvableParent(id)) => assert_eq!(id, "foreign"),
            other => panic!("expected UnresolvableParent, got {other:?}"),
        }
    }

    #[test]
    fn overlong_chain_hits_the_depth_cap() {
        let provider = MemoryProvider::new("me@x.com");
        provider.add_item(folder("d0", "d0", Some(("root", true))));
        for i in 1..6 {
            provider.add_item(folder(
                &format!("d{i}"),
                &format!("d{i}"),
                Some((&format!("d{}", i - 1), false)),
            ));
        }
        let doc = file("f1", "deep.txt", Some(("d5", false)));

        let mut resolver = PathResolver::with_max_depth(4);
        match resolver.resolve(&provider, &doc) {
            Err(PathError::PathTooDeep { limit, .. }) => assert_eq!(limit, 4),
            other => panic!("expected PathTooDeep, got {other:?}"),
        }
    }

    #[test]
    fn self_referencing_parent_is_caught_by_the_cap() {
        let provider = MemoryProvider::new("me@x.com");
        provider.add_item(folder("loop", "loop", Some(("loop", false))));
        let doc = file("f1", "stuck.txt", Some(("loop", false)));

        let mut resolver = PathResolver::new();
        assert!(matches!(
            resolver.resolve(&provider, &doc),
            Err(PathError::PathTooDeep { .. })
        ));
    }
}
