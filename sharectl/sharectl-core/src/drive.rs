//! Blocking client for the Drive v2 REST endpoints the engine consumes:
//! account metadata, file listing and retrieval, and the per-file
//! permission collection.

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::model::{AccessEntry, GrantRequest, Item, ItemKind, ParentRef};
use crate::provider::CloudProvider;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v2";
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

const PAGE_SIZE: &str = "1000";

pub struct DriveClient {
    http: Client,
    base: String,
    token: String,
}

impl DriveClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base(access_token, DEFAULT_API_BASE)
    }

    /// Point the client at a different endpoint, e.g. a local test server.
    pub fn with_base(access_token: impl Into<String>, base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            http: Client::new(),
            base,
            token: access_token.into(),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{path}", self.base))
            .bearer_auth(&self.token)
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, ProviderError> {
        let response = checked(request.send()?, what)?;
        Ok(response.json()?)
    }
}

/// Map an error status onto the provider error taxonomy. Missing and
/// inaccessible resources keep a short caller-supplied description; other
/// failures carry the response body.
fn checked(response: Response, what: &str) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        404 => Err(ProviderError::NotFound(what.to_string())),
        403 => Err(ProviderError::Forbidden(what.to_string())),
        code => {
            let message = response.text().unwrap_or_default();
            Err(ProviderError::Api {
                status: code,
                message,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    title: String,
    mime_type: String,
    #[serde(default)]
    parents: Vec<ParentResource>,
    #[serde(default)]
    shared: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentResource {
    id: String,
    #[serde(default)]
    is_root: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    items: Vec<FileResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct About {
    user: AboutUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutUser {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct PermissionList {
    #[serde(default)]
    items: Vec<AccessEntry>,
}

impl From<FileResource> for Item {
    fn from(file: FileResource) -> Self {
        let kind = if file.mime_type == FOLDER_MIME {
            ItemKind::Folder
        } else {
            ItemKind::File
        };
        Item {
            id: file.id,
            title: file.title,
            kind,
            // Multi-parented items are placed under their first parent.
            parent: file.parents.into_iter().next().map(|p| ParentRef {
                id: p.id,
                is_root: p.is_root,
            }),
            shared: file.shared,
        }
    }
}

impl CloudProvider for DriveClient {
    fn current_user_email(&self) -> Result<String, ProviderError> {
        let about: About = self.fetch(self.get("/about"), "account metadata")?;
        Ok(about.user.email_address)
    }

    fn list_owned_shared_items(&self, owner: &str) -> Result<Vec<Item>, ProviderError> {
        let query = format!("'{owner}' in owners and trashed=false");
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let mut request = self
                .get("/files")
                .query(&[("q", query.as_str()), ("maxResults", PAGE_SIZE)]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }
            let page: FileList = self.fetch(request, "file listing")?;
            pages += 1;
            // The listing covers everything owned; only shared items make
            // it into the inventory.
            items.extend(page.items.into_iter().map(Item::from).filter(|i| i.shared));
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        debug!(pages, count = items.len(), "listed owned shared items");
        Ok(items)
    }

    fn get_item(&self, id: &str) -> Result<Item, ProviderError> {
        let file: FileResource =
            self.fetch(self.get(&format!("/files/{id}")), &format!("item {id}"))?;
        Ok(file.into())
    }

    fn fetch_access_control(&self, item_id: &str) -> Result<Vec<AccessEntry>, ProviderError> {
        let list: PermissionList = self.fetch(
            self.get(&format!("/files/{item_id}/permissions")),
            &format!("item {item_id}"),
        )?;
        Ok(list.items)
    }

    fn insert_access_control(
        &self,
        item_id: &str,
        grant: &GrantRequest,
    ) -> Result<(), ProviderError> {
        let request = self
            .http
            .post(format!("{}/files/{item_id}/permissions", self.base))
            .bearer_auth(&self.token)
            .json(grant);
        checked(request.send()?, &format!("item {item_id}"))?;
        Ok(())
    }

    fn delete_access_control(&self, item_id: &str, entry_id: &str) -> Result<(), ProviderError> {
        let request = self
            .http
            .delete(format!(
                "{}/files/{item_id}/permissions/{entry_id}",
                self.base
            ))
            .bearer_auth(&self.token);
        checked(request.send()?, &format!("entry {entry_id} on item {item_id}"))?;
        Ok(())
    }
}
