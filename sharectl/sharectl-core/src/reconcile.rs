//! Reconciliation: diff a desired snapshot (the edited table) against the
//! live one and produce the minimal mutation batch, plus warnings for
//! everything deliberately withheld.
//!
//! The diff is pure; nothing here talks to the provider. Within one item
//! every revoke is ordered before every grant, so an interrupted batch can
//! only leave a principal with less access than before, never more.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::model::{MutationOp, OpKind, Principal, Role, SnapshotRow};

#[derive(Debug, Default)]
pub struct Reconciliation {
    pub ops: Vec<MutationOp>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The table references an item the live snapshot no longer has.
    MissingItem { id: String, path: String },
    /// The row contradicts itself and is ignored wholesale.
    MalformedExport { id: String, reason: String },
    /// The table asks for a lower tier than the live one. Downgrades are
    /// never applied silently; the operator revokes explicitly instead.
    DowngradeConflict {
        id: String,
        principal: String,
        current: Role,
        desired: Role,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingItem { id, path } => {
                write!(f, "item {id} ({path}) no longer exists; row ignored")
            }
            Warning::MalformedExport { id, reason } => {
                write!(f, "row for {id} is malformed: {reason}; row ignored")
            }
            Warning::DowngradeConflict {
                id,
                principal,
                current,
                desired,
            } => write!(
                f,
                "{principal} holds {current} on {id} but the table wants {desired}; \
                 downgrade not applied"
            ),
        }
    }
}

/// Diff the desired rows against the live ones.
///
/// Live items absent from the table are left untouched; table rows for
/// vanished items only warn. Mutations come out in a deterministic order.
pub fn reconcile(desired: &[SnapshotRow], current: &[SnapshotRow]) -> Reconciliation {
    let live: HashMap<&str, &SnapshotRow> = current.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut out = Reconciliation::default();
    let mut seen: HashSet<&str> = HashSet::new();
    for want in desired {
        if !seen.insert(want.id.as_str()) {
            out.warnings.push(Warning::MalformedExport {
                id: want.id.clone(),
                reason: "duplicate row for this item".into(),
            });
            continue;
        }
        match live.get(want.id.as_str()) {
            Some(have) => reconcile_item(want, have, &mut out),
            None => out.warnings.push(Warning::MissingItem {
                id: want.id.clone(),
                path: want.path.clone(),
            }),
        }
    }
    for have in current {
        if !seen.contains(have.id.as_str()) {
            debug!(item = %have.id, "live item missing from the table, left untouched");
        }
    }
    out
}

fn reconcile_item(want: &SnapshotRow, have: &SnapshotRow, out: &mut Reconciliation) {
    // Collapse the desired row into one tier per principal. A principal in
    // two columns makes the row ambiguous and the whole row is rejected.
    let mut final_roles: BTreeMap<&str, Role> = BTreeMap::new();
    for role in [Role::Reader, Role::Commenter, Role::Editor] {
        for email in want.role_set(role) {
            if final_roles.insert(email.as_str(), role).is_some() {
                out.warnings.push(Warning::MalformedExport {
                    id: want.id.clone(),
                    reason: format!("{email} appears in multiple role columns"),
                });
                return;
            }
        }
    }

    let mut revokes = Vec::new();
    let mut grants = Vec::new();
    let mut handled: HashSet<&str> = HashSet::new();

    for tier in [Role::Reader, Role::Commenter, Role::Editor] {
        for email in have.role_set(tier) {
            handled.insert(email.as_str());
            match final_roles.get(email.as_str()) {
                None => revokes.push(op(want, Principal::user(email), OpKind::Revoke)),
                Some(&desired) if desired > tier => {
                    revokes.push(op(want, Principal::user(email), OpKind::Revoke));
                    grants.push(op(want, Principal::user(email), OpKind::Grant(desired)));
                }
                Some(&desired) if desired < tier => {
                    out.warnings.push(Warning::DowngradeConflict {
                        id: want.id.clone(),
                        principal: email.clone(),
                        current: tier,
                        desired,
                    });
                }
                Some(_) => {}
            }
        }
    }

    for (&email, &role) in &final_roles {
        if !handled.contains(email) {
            grants.push(op(want, Principal::user(email), OpKind::Grant(role)));
        }
    }

    if want.public_link && !have.public_link {
        grants.push(op(want, Principal::Anyone, OpKind::Grant(Role::Reader)));
    } else if !want.public_link && have.public_link {
        revokes.push(op(want, Principal::Anyone, OpKind::Revoke));
    }

    out.ops.extend(revokes);
    out.ops.extend(grants);
}

fn op(row: &SnapshotRow, principal: Principal, kind: OpKind) -> MutationOp {
    MutationOp {
        item_id: row.id.clone(),
        principal,
        kind,
    }
}
