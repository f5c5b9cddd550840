//! Maps raw access-control entries onto the closed role model.

use crate::model::{AccessEntry, Role, ANYONE_WITH_LINK};

/// Outcome of classifying one raw entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Anyone-with-the-link share; a flag on the item, not a role tier.
    Public,
    /// A named grantee at the given tier.
    Tier(Role),
}

/// Classify a raw entry. First matching rule wins:
///
/// 1. the public-link sentinel is `Public`,
/// 2. base role `writer` is [`Role::Editor`],
/// 3. a `commenter` capability add-on is [`Role::Commenter`],
/// 4. base role `reader` is [`Role::Reader`],
/// 5. anything else (including `owner` entries) is `None`.
///
/// Pure; callers log and skip unclassified entries rather than failing the
/// run over them.
pub fn classify(entry: &AccessEntry) -> Option<Classification> {
    if entry.kind == "anyone" || entry.id.as_deref() == Some(ANYONE_WITH_LINK) {
        return Some(Classification::Public);
    }
    if entry.role == "writer" {
        return Some(Classification::Tier(Role::Editor));
    }
    if entry.additional_roles.iter().any(|r| r == "commenter") {
        return Some(Classification::Tier(Role::Commenter));
    }
    if entry.role == "reader" {
        return Some(Classification::Tier(Role::Reader));
    }
    None
}
