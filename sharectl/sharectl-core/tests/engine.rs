//! End-to-end runs against the in-memory provider: inventory, export,
//! re-import, reconcile and apply.

use sharectl_core::export;
use sharectl_core::inventory::InventoryBuilder;
use sharectl_core::model::{AccessEntry, Item, ItemKind, OpKind, ParentRef, Role, ANYONE_WITH_LINK};
use sharectl_core::mutate::{ApplyMode, PermissionMutator};
use sharectl_core::provider::MemoryProvider;
use sharectl_core::reconcile::reconcile;

fn item(id: &str, title: &str, kind: ItemKind, parent: Option<(&str, bool)>, shared: bool) -> Item {
    Item {
        id: id.into(),
        title: title.into(),
        kind,
        parent: parent.map(|(id, is_root)| ParentRef {
            id: id.into(),
            is_root,
        }),
        shared,
    }
}

fn user_entry(email: &str, role: &str, additional: &[&str]) -> AccessEntry {
    AccessEntry {
        id: Some(format!("perm-{email}")),
        kind: "user".into(),
        role: role.into(),
        additional_roles: additional.iter().map(|s| s.to_string()).collect(),
        email_address: Some(email.into()),
        with_link: false,
    }
}

fn anyone_entry() -> AccessEntry {
    AccessEntry {
        id: Some(ANYONE_WITH_LINK.into()),
        kind: "anyone".into(),
        role: "reader".into(),
        with_link: true,
        ..Default::default()
    }
}

/// A small owned tree: a shared folder with a shared file inside, plus an
/// unshared file that must stay out of the inventory.
fn scenario() -> MemoryProvider {
    let provider = MemoryProvider::new("owner@x.com");
    provider.add_item(item(
        "d1",
        "projects",
        ItemKind::Folder,
        Some(("root-id", true)),
        true,
    ));
    provider.add_item(item("f1", "plan.md", ItemKind::File, Some(("d1", false)), true));
    provider.add_item(item("f2", "notes.txt", ItemKind::File, Some(("d1", false)), false));
    provider.set_acl(
        "d1",
        vec![
            user_entry("owner@x.com", "owner", &[]),
            user_entry("alice@x.com", "reader", &[]),
        ],
    );
    provider.set_acl(
        "f1",
        vec![
            user_entry("owner@x.com", "owner", &[]),
            user_entry("bob@x.com", "writer", &[]),
            user_entry("carol@x.com", "reader", &["commenter"]),
            anyone_entry(),
        ],
    );
    provider
}

#[test]
fn exported_snapshot_reimports_and_reconciles_to_nothing() {
    let provider = scenario();
    let inventory = InventoryBuilder::new(&provider).build("owner@x.com").unwrap();
    assert_eq!(inventory.rows.len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.csv");
    export::write_snapshot(&path, &inventory.rows).unwrap();

    let import = export::read_snapshot(&path).unwrap();
    assert!(import.skipped.is_empty());
    assert_eq!(import.rows, inventory.rows);

    let plan = reconcile(&import.rows, &inventory.rows);
    assert!(plan.ops.is_empty());
    assert!(plan.warnings.is_empty());
}

#[test]
fn edited_table_converges_the_live_state() {
    let provider = scenario();
    let before = InventoryBuilder::new(&provider).build("owner@x.com").unwrap();

    // Drop alice, bring in dave as editor, close the public link and
    // promote carol.
    let mut desired = before.rows.clone();
    desired[0].readers.remove("alice@x.com");
    desired[0].insert_grant(Role::Editor, "dave@x.com");
    desired[1].public_link = false;
    desired[1].insert_grant(Role::Editor, "carol@x.com");

    let plan = reconcile(&desired, &before.rows);
    assert!(!plan.ops.is_empty());
    assert!(plan.warnings.is_empty());

    let report = PermissionMutator::new(&provider, ApplyMode::Commit).apply_batch(&plan.ops);
    assert!(report.failed.is_empty());
    assert_eq!(report.applied, plan.ops.len());

    let after = InventoryBuilder::new(&provider).build("owner@x.com").unwrap();
    let check = reconcile(&desired, &after.rows);
    assert!(check.ops.is_empty(), "still pending: {:?}", check.ops);
    assert!(check.warnings.is_empty());
}

#[test]
fn reapplying_a_batch_changes_nothing_further() {
    let provider = scenario();
    let before = InventoryBuilder::new(&provider).build("owner@x.com").unwrap();

    let mut desired = before.rows.clone();
    desired[0].readers.remove("alice@x.com");
    desired[1].insert_grant(Role::Reader, "dave@x.com");

    let plan = reconcile(&desired, &before.rows);
    let mutator = PermissionMutator::new(&provider, ApplyMode::Commit);

    let first = mutator.apply_batch(&plan.ops);
    assert!(first.failed.is_empty());
    let settled = InventoryBuilder::new(&provider).build("owner@x.com").unwrap();

    let second = mutator.apply_batch(&plan.ops);
    assert!(second.failed.is_empty());
    let revokes = plan
        .ops
        .iter()
        .filter(|op| op.kind == OpKind::Revoke)
        .count();
    assert_eq!(second.already_satisfied, revokes);

    let resettled = InventoryBuilder::new(&provider).build("owner@x.com").unwrap();
    assert_eq!(resettled.rows, settled.rows);
}

#[test]
fn dry_run_plans_without_touching_live_state() {
    let provider = scenario();
    let before = InventoryBuilder::new(&provider).build("owner@x.com").unwrap();

    let mut desired = before.rows.clone();
    desired[0].insert_grant(Role::Editor, "eve@x.com");
    desired[1].public_link = false;

    let plan = reconcile(&desired, &before.rows);
    let report = PermissionMutator::new(&provider, ApplyMode::DryRun).apply_batch(&plan.ops);
    assert_eq!(report.applied, plan.ops.len());
    assert!(report.failed.is_empty());

    let after = InventoryBuilder::new(&provider).build("owner@x.com").unwrap();
    assert_eq!(after.rows, before.rows);
}
