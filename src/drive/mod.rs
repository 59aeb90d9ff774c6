//! Google Drive, Docs and Sheets integration
//!
//! Creates documents and spreadsheets inside a shared folder over the REST
//! APIs. Requests carry the bearer access token from [`DriveConfig`].

use crate::config::DriveConfig;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const FIRST_CELL: &str = "Sheet1!A1";

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Invalid Google Drive folder URL. Ensure it is a shared folder link: {0}")]
    InvalidFolderUrl(String),

    #[error("Folder not set. Set a shared folder URL first")]
    FolderNotSet,

    #[error("No Google access token configured")]
    MissingToken,

    #[error("Google API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DriveResult<T> = Result<T, DriveError>;

/// Extract the folder id from a shared folder link.
///
/// Accepts `.../folders/<id>` paths and `?id=<id>` query links.
pub fn parse_folder_url(url: &str) -> DriveResult<String> {
    static FOLDER_PATH: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = FOLDER_PATH.get_or_init(|| Regex::new(r"/folders/([a-zA-Z0-9_-]+)").ok());

    if let Some(id) = pattern
        .as_ref()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
    {
        return Ok(id.as_str().to_string());
    }

    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(key, value)| key == "id" && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        })
        .ok_or_else(|| DriveError::InvalidFolderUrl(url.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFolder {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Set for folders on a shared drive
    #[serde(default)]
    pub drive_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

pub struct DriveClient {
    client: Client,
    config: DriveConfig,
    folder: Option<DriveFolder>,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> DriveResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DriveError::Network(e.to_string()))?;
        Ok(Self {
            client,
            config,
            folder: None,
        })
    }

    pub fn folder(&self) -> Option<&DriveFolder> {
        self.folder.as_ref()
    }

    pub fn share_email(&self) -> Option<&str> {
        self.config.share_email.as_deref()
    }

    /// Point the client at a shared folder and look up its drive
    pub async fn set_folder(&mut self, url: &str) -> DriveResult<&DriveFolder> {
        let folder_id = parse_folder_url(url)?;
        debug!("Folder ID extracted: {}", folder_id);

        let request = self
            .client
            .get(format!("{}/files/{}", self.config.api_base_url, folder_id))
            .query(&[("supportsAllDrives", "true"), ("fields", "id,name,driveId")]);
        let metadata = self.send(request).await?;
        let folder: DriveFolder =
            serde_json::from_value(metadata).map_err(|e| DriveError::Serialization(e.to_string()))?;

        info!("Drive folder set: {} (drive {:?})", folder.id, folder.drive_id);
        Ok(&*self.folder.insert(folder))
    }

    /// Create a Google Doc holding `text`; returns its edit URL
    pub async fn create_document(&self, title: &str, text: &str, share_email: Option<&str>) -> DriveResult<String> {
        let folder = self.require_folder()?;
        let doc_id = self.create_file(folder, title, DOCUMENT_MIME).await?;
        info!("Document created: {} (ID: {})", title, doc_id);

        if !text.is_empty() {
            let request = self
                .client
                .post(format!("{}/documents/{}:batchUpdate", self.config.docs_base_url, doc_id))
                .json(&json!({
                    "requests": [{"insertText": {"location": {"index": 1}, "text": text}}]
                }));
            self.send(request).await?;
            debug!("Text inserted into document {}", doc_id);
        }

        if let Some(email) = share_email {
            self.share(&doc_id, email).await?;
        }

        Ok(format!("https://docs.google.com/document/d/{}/edit", doc_id))
    }

    /// Create a Google Sheet with `rows` written from the first cell; returns its edit URL
    pub async fn create_spreadsheet(
        &self,
        title: &str,
        rows: &[Vec<Value>],
        share_email: Option<&str>,
    ) -> DriveResult<String> {
        let folder = self.require_folder()?;
        let sheet_id = self.create_file(folder, title, SPREADSHEET_MIME).await?;
        info!("Spreadsheet created: {} (ID: {})", title, sheet_id);

        if !rows.is_empty() {
            let request = self
                .client
                .put(format!(
                    "{}/spreadsheets/{}/values/{}",
                    self.config.sheets_base_url, sheet_id, FIRST_CELL
                ))
                .query(&[("valueInputOption", "RAW")])
                .json(&json!({ "range": FIRST_CELL, "values": rows }));
            self.send(request).await?;
            debug!("{} rows written to spreadsheet {}", rows.len(), sheet_id);
        }

        if let Some(email) = share_email {
            self.share(&sheet_id, email).await?;
        }

        Ok(format!("https://docs.google.com/spreadsheets/d/{}/edit", sheet_id))
    }

    /// List up to ten files of the folder
    pub async fn check_folder_access(&self) -> DriveResult<Vec<DriveFile>> {
        #[derive(Deserialize)]
        struct FileList {
            #[serde(default)]
            files: Vec<DriveFile>,
        }

        let folder = self.require_folder()?;
        let query = format!("'{}' in parents and trashed = false", folder.id);
        let request = self.client.get(format!("{}/files", self.config.api_base_url)).query(&[
            ("q", query.as_str()),
            ("spaces", "drive"),
            ("fields", "files(id,name)"),
            ("includeItemsFromAllDrives", "true"),
            ("supportsAllDrives", "true"),
            ("pageSize", "10"),
        ]);
        let list: FileList = serde_json::from_value(self.send(request).await?)
            .map_err(|e| DriveError::Serialization(e.to_string()))?;

        info!("Folder accessible, {} files listed", list.files.len());
        Ok(list.files)
    }

    /// Grant `email` writer access to a file
    pub async fn share(&self, file_id: &str, email: &str) -> DriveResult<()> {
        let request = self
            .client
            .post(format!("{}/files/{}/permissions", self.config.api_base_url, file_id))
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&json!({"type": "user", "role": "writer", "emailAddress": email}));
        self.send(request).await?;
        info!("File {} shared with {}", file_id, email);
        Ok(())
    }

    fn require_folder(&self) -> DriveResult<&DriveFolder> {
        self.folder.as_ref().ok_or(DriveError::FolderNotSet)
    }

    async fn create_file(&self, folder: &DriveFolder, title: &str, mime_type: &str) -> DriveResult<String> {
        let request = self
            .client
            .post(format!("{}/files", self.config.api_base_url))
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({"name": title, "parents": [folder.id], "mimeType": mime_type}));
        let created = self.send(request).await?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DriveError::Serialization("created file has no id".to_string()))
    }

    async fn send(&self, request: RequestBuilder) -> DriveResult<Value> {
        let token = self.config.access_token.as_deref().ok_or(DriveError::MissingToken)?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DriveError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(DriveError::Api {
                status: status.as_u16(),
                message,
            });
        }

        resp.json()
            .await
            .map_err(|e| DriveError::Serialization(e.to_string()))
    }
}
