//! Data model for share inventories and permission mutations.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel principal for "anyone with the link" shares, as the provider
/// spells it.
pub const ANYONE_WITH_LINK: &str = "anyoneWithLink";

/// Kinds of items the storage provider exposes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Folder => "folder",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file" => Some(ItemKind::File),
            "folder" => Some(ItemKind::Folder),
            _ => None,
        }
    }
}

/// Reference to an item's parent folder.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParentRef {
    pub id: String,
    pub is_root: bool,
}

/// Read-only projection of one provider-side file or folder.
///
/// `parent` is `None` only for the hierarchy root; anything else without a
/// parent reference cannot be placed in the tree and is excluded from
/// inventories.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
    pub parent: Option<ParentRef>,
    pub shared: bool,
}

/// Access tier granted to a principal, ordered by privilege:
/// `Reader < Commenter < Editor`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Reader,
    Commenter,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Commenter => "commenter",
            Role::Editor => "editor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grantee identity: a named account or the public link sentinel.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Principal {
    /// An account, identified by its lowercased email address.
    User(String),
    /// Anyone holding the link.
    Anyone,
}

impl Principal {
    /// Build a named principal, normalizing the email address.
    pub fn user(email: &str) -> Self {
        Principal::User(email.to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Principal::User(email) => email,
            Principal::Anyone => ANYONE_WITH_LINK,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw access-control entry as the provider returns it. The classifier maps
/// these onto [`Role`] tiers; unrecognized combinations are skipped.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessEntry {
    /// Provider-assigned id of the entry, needed to delete it.
    pub id: Option<String>,
    /// Grantee type: `user`, `group`, `domain` or `anyone`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Base role: `owner`, `writer` or `reader`.
    pub role: String,
    /// Capability add-ons on top of the base role, e.g. `commenter`.
    pub additional_roles: Vec<String>,
    pub email_address: Option<String>,
    pub with_link: bool,
}

/// Body of a permission insertion.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    #[serde(rename = "type")]
    pub kind: String,
    /// Email address for named grantees; absent for public shares.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub role: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_roles: Vec<String>,
    pub with_link: bool,
}

/// One inventory row: an item, its resolved path and its classified grants.
///
/// The three role sets are pairwise disjoint; a principal holds exactly one
/// tier per item. Public link sharing is a flag, not a tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRow {
    pub id: String,
    pub path: String,
    pub kind: ItemKind,
    pub public_link: bool,
    pub readers: BTreeSet<String>,
    pub commenters: BTreeSet<String>,
    pub editors: BTreeSet<String>,
}

impl SnapshotRow {
    pub fn new(id: impl Into<String>, path: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            kind,
            public_link: false,
            readers: BTreeSet::new(),
            commenters: BTreeSet::new(),
            editors: BTreeSet::new(),
        }
    }

    pub fn role_set(&self, role: Role) -> &BTreeSet<String> {
        match role {
            Role::Reader => &self.readers,
            Role::Commenter => &self.commenters,
            Role::Editor => &self.editors,
        }
    }

    /// Record a grant, keeping the role sets disjoint: any previous tier the
    /// principal held on this row is dropped first.
    pub fn insert_grant(&mut self, role: Role, email: impl Into<String>) {
        let email = email.into();
        self.readers.remove(&email);
        self.commenters.remove(&email);
        self.editors.remove(&email);
        match role {
            Role::Reader => self.readers.insert(email),
            Role::Commenter => self.commenters.insert(email),
            Role::Editor => self.editors.insert(email),
        };
    }

    /// Whether the principal holds any tier on this row.
    pub fn holds(&self, email: &str) -> bool {
        self.readers.contains(email)
            || self.commenters.contains(email)
            || self.editors.contains(email)
    }
}

/// A single permission mutation, produced by reconciliation and consumed
/// exactly once by the mutator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationOp {
    pub item_id: String,
    pub principal: Principal,
    pub kind: OpKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Grant(Role),
    Revoke,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OpKind::Grant(role) => {
                write!(f, "grant {} as {} on {}", self.principal, role, self.item_id)
            }
            OpKind::Revoke => write!(f, "revoke {} on {}", self.principal, self.item_id),
        }
    }
}
