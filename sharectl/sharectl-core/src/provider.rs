//! Narrow interface to the storage provider, plus an in-memory
//! implementation used for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ProviderError;
use crate::model::{AccessEntry, GrantRequest, Item, ANYONE_WITH_LINK};

/// Operations the engine needs from the storage provider. All calls are
/// blocking; a run issues them strictly sequentially.
pub trait CloudProvider {
    /// Email address of the authenticated account.
    fn current_user_email(&self) -> Result<String, ProviderError>;

    /// Untrashed items the given account owns and has shared with at least
    /// one other principal.
    fn list_owned_shared_items(&self, owner: &str) -> Result<Vec<Item>, ProviderError>;

    /// Fetch a single item by id. Parents of shared items may live outside
    /// the owned tree; those come back as `NotFound` or `Forbidden`.
    fn get_item(&self, id: &str) -> Result<Item, ProviderError>;

    /// The raw access-control list of an item.
    fn fetch_access_control(&self, item_id: &str) -> Result<Vec<AccessEntry>, ProviderError>;

    /// Insert a new access-control entry.
    fn insert_access_control(
        &self,
        item_id: &str,
        grant: &GrantRequest,
    ) -> Result<(), ProviderError>;

    /// Delete an access-control entry by its provider-assigned id.
    fn delete_access_control(&self, item_id: &str, entry_id: &str) -> Result<(), ProviderError>;
}

/// In-memory provider used for testing. Mirrors the parts of the live
/// service the engine relies on: permission inserts replace any previous
/// entry for the same grantee, deletes are by entry id, and malformed email
/// addresses are rejected.
pub struct MemoryProvider {
    user_email: String,
    items: Mutex<HashMap<String, Item>>,
    acls: Mutex<HashMap<String, Vec<AccessEntry>>>,
    get_item_calls: Mutex<HashMap<String, usize>>,
    next_entry_id: Mutex<u64>,
}

impl MemoryProvider {
    pub fn new(user_email: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            items: Mutex::new(HashMap::new()),
            acls: Mutex::new(HashMap::new()),
            get_item_calls: Mutex::new(HashMap::new()),
            next_entry_id: Mutex::new(1),
        }
    }

    pub fn add_item(&self, item: Item) {
        let mut items = self.items.lock().unwrap();
        items.insert(item.id.clone(), item);
    }

    /// Replace an item's access-control list wholesale.
    pub fn set_acl(&self, item_id: &str, entries: Vec<AccessEntry>) {
        let mut acls = self.acls.lock().unwrap();
        acls.insert(item_id.to_string(), entries);
    }

    /// Current access-control list, for assertions.
    pub fn acl(&self, item_id: &str) -> Vec<AccessEntry> {
        let acls = self.acls.lock().unwrap();
        acls.get(item_id).cloned().unwrap_or_default()
    }

    /// How many times `get_item` was called for the given id.
    pub fn get_item_calls(&self, id: &str) -> usize {
        let calls = self.get_item_calls.lock().unwrap();
        calls.get(id).copied().unwrap_or(0)
    }

    fn same_grantee(entry: &AccessEntry, grant: &GrantRequest) -> bool {
        if grant.kind == "anyone" {
            return entry.kind == "anyone" || entry.id.as_deref() == Some(ANYONE_WITH_LINK);
        }
        match (&entry.email_address, &grant.value) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl CloudProvider for MemoryProvider {
    fn current_user_email(&self) -> Result<String, ProviderError> {
        Ok(self.user_email.clone())
    }

    fn list_owned_shared_items(&self, _owner: &str) -> Result<Vec<Item>, ProviderError> {
        let items = self.items.lock().unwrap();
        Ok(items.values().filter(|i| i.shared).cloned().collect())
    }

    fn get_item(&self, id: &str) -> Result<Item, ProviderError> {
        let mut calls = self.get_item_calls.lock().unwrap();
        *calls.entry(id.to_string()).or_insert(0) += 1;
        drop(calls);
        let items = self.items.lock().unwrap();
        items
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("item {id}")))
    }

    fn fetch_access_control(&self, item_id: &str) -> Result<Vec<AccessEntry>, ProviderError> {
        let items = self.items.lock().unwrap();
        if !items.contains_key(item_id) {
            return Err(ProviderError::NotFound(format!("item {item_id}")));
        }
        drop(items);
        Ok(self.acl(item_id))
    }

    fn insert_access_control(
        &self,
        item_id: &str,
        grant: &GrantRequest,
    ) -> Result<(), ProviderError> {
        let items = self.items.lock().unwrap();
        if !items.contains_key(item_id) {
            return Err(ProviderError::NotFound(format!("item {item_id}")));
        }
        drop(items);
        if grant.kind != "anyone" {
            match &grant.value {
                Some(email) if email.contains('@') => {}
                other => {
                    return Err(ProviderError::Api {
                        status: 400,
                        message: format!("invalid grantee address {other:?}"),
                    });
                }
            }
        }
        let mut next_id = self.next_entry_id.lock().unwrap();
        let entry_id = if grant.kind == "anyone" {
            ANYONE_WITH_LINK.to_string()
        } else {
            let id = format!("perm{}", *next_id);
            *next_id += 1;
            id
        };
        drop(next_id);
        let entry = AccessEntry {
            id: Some(entry_id),
            kind: grant.kind.clone(),
            role: grant.role.clone(),
            additional_roles: grant.additional_roles.clone(),
            email_address: grant.value.clone(),
            with_link: grant.with_link,
        };
        let mut acls = self.acls.lock().unwrap();
        let list = acls.entry(item_id.to_string()).or_default();
        list.retain(|e| !Self::same_grantee(e, grant));
        list.push(entry);
        Ok(())
    }

    fn delete_access_control(&self, item_id: &str, entry_id: &str) -> Result<(), ProviderError> {
        let mut acls = self.acls.lock().unwrap();
        let list = acls
            .get_mut(item_id)
            .ok_or_else(|| ProviderError::NotFound(format!("item {item_id}")))?;
        let before = list.len();
        list.retain(|e| e.id.as_deref() != Some(entry_id));
        if list.len() == before {
            return Err(ProviderError::NotFound(format!(
                "permission {entry_id} on {item_id}"
            )));
        }
        Ok(())
    }
}
