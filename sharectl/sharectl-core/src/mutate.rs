//! Applying mutation batches to the provider, with a dry-run mode that
//! narrates instead of writing.

use tracing::{debug, info, warn};

use crate::error::{MutateError, ProviderError};
use crate::model::{
    AccessEntry, GrantRequest, MutationOp, OpKind, Principal, Role, ANYONE_WITH_LINK,
};
use crate::provider::CloudProvider;

/// Whether a batch writes to the provider or only reports what it would do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyMode {
    DryRun,
    Commit,
}

/// Outcome counts for one batch. A failed operation never stops the batch;
/// re-running after fixing the cause is safe because satisfied operations
/// degrade to no-ops.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub already_satisfied: usize,
    pub failed: Vec<String>,
}

pub struct PermissionMutator<'a> {
    provider: &'a dyn CloudProvider,
    mode: ApplyMode,
}

impl<'a> PermissionMutator<'a> {
    pub fn new(provider: &'a dyn CloudProvider, mode: ApplyMode) -> Self {
        Self { provider, mode }
    }

    /// Apply a single mutation. `PermissionNotFound` on a revoke means the
    /// live state already satisfies it.
    pub fn apply(&self, op: &MutationOp) -> Result<(), MutateError> {
        if self.mode == ApplyMode::DryRun {
            info!(%op, "dry run");
            return Ok(());
        }
        match op.kind {
            OpKind::Revoke => self.revoke(op)?,
            OpKind::Grant(role) => self.grant(op, role)?,
        }
        info!(%op, "applied");
        Ok(())
    }

    /// Run every operation, isolating failures per operation.
    pub fn apply_batch(&self, ops: &[MutationOp]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for op in ops {
            match self.apply(op) {
                Ok(()) => report.applied += 1,
                Err(MutateError::PermissionNotFound { .. }) => {
                    debug!(%op, "already satisfied");
                    report.already_satisfied += 1;
                }
                Err(e) => {
                    warn!(%op, error = %e, "operation failed, batch continues");
                    report.failed.push(format!("{op}: {e}"));
                }
            }
        }
        report
    }

    fn revoke(&self, op: &MutationOp) -> Result<(), MutateError> {
        let entries = self.provider.fetch_access_control(&op.item_id)?;
        let entry_id = entries
            .iter()
            .find(|e| entry_matches(e, &op.principal))
            .and_then(|e| e.id.as_deref())
            .ok_or_else(|| MutateError::PermissionNotFound {
                item_id: op.item_id.clone(),
                principal: op.principal.clone(),
            })?;
        self.provider.delete_access_control(&op.item_id, entry_id)?;
        Ok(())
    }

    fn grant(&self, op: &MutationOp, role: Role) -> Result<(), MutateError> {
        let request = grant_request(&op.principal, role);
        match self.provider.insert_access_control(&op.item_id, &request) {
            Ok(()) => Ok(()),
            Err(ProviderError::Api { status, message }) if (400..500).contains(&status) => {
                Err(MutateError::GrantRejected {
                    item_id: op.item_id.clone(),
                    principal: op.principal.clone(),
                    reason: format!("{status}: {message}"),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn entry_matches(entry: &AccessEntry, principal: &Principal) -> bool {
    match principal {
        Principal::Anyone => {
            entry.kind == "anyone" || entry.id.as_deref() == Some(ANYONE_WITH_LINK)
        }
        Principal::User(email) => match &entry.email_address {
            Some(addr) => addr.eq_ignore_ascii_case(email),
            None => false,
        },
    }
}

/// Wire form of a grant. The commenter tier rides on the reader role with a
/// capability add-on; the public grant targets the link audience.
pub fn grant_request(principal: &Principal, role: Role) -> GrantRequest {
    let (wire_role, additional) = match role {
        Role::Editor => ("writer", vec![]),
        Role::Commenter => ("reader", vec!["commenter".to_string()]),
        Role::Reader => ("reader", vec![]),
    };
    match principal {
        Principal::User(email) => GrantRequest {
            kind: "user".into(),
            value: Some(email.clone()),
            role: wire_role.into(),
            additional_roles: additional,
            with_link: false,
        },
        Principal::Anyone => GrantRequest {
            kind: "anyone".into(),
            value: None,
            role: wire_role.into(),
            additional_roles: additional,
            with_link: true,
        },
    }
}
