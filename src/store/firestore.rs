//! Firestore REST API client

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::value::{decode_fields, encode_fields};
use super::{Document, DocumentStore, Fields, StoreError};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const LIST_PAGE_SIZE: u32 = 300;

/// Connection settings for a Firestore project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Web API key, sent as the `key` query parameter
    pub api_key: Option<String>,
    /// Override for the emulator (`http://localhost:8080/v1`)
    pub base_url: Option<String>,
}

/// Firestore client for the game's lobby documents
#[derive(Clone)]
pub struct FirestoreClient {
    client: Client,
    documents_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    next_page_token: Option<String>,
}

impl FirestoreClient {
    pub fn new(config: &FirestoreConfig) -> Self {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');

        Self {
            client: Client::new(),
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                base, config.project_id
            ),
            api_key: config.api_key.clone(),
        }
    }

    /// Get the REST URL for a document or collection path
    fn doc_url(&self, path: &str) -> String {
        format!("{}/{}", self.documents_url, path.trim_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("key", key.as_str())]),
            None => request,
        }
    }

    /// Turn a non-success response into an API error
    async fn check(response: Response) -> Result<Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }

    fn into_document(raw: RawDocument) -> Result<Document, StoreError> {
        let id = raw
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Ok(Document {
            id,
            fields: decode_fields(&raw.fields)?,
        })
    }
}

impl DocumentStore for FirestoreClient {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
        let response = self
            .authorize(self.client.get(self.doc_url(path)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: RawDocument = Self::check(response).await?.json().await?;
        Self::into_document(raw).map(Some)
    }

    async fn set(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        // PATCH without an update mask replaces the whole document
        let response = self
            .authorize(self.client.patch(self.doc_url(path)))
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        let mut query: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let response = self
            .authorize(self.client.patch(self.doc_url(path)))
            .query(&query)
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }

        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.delete(self.doc_url(path)))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = LIST_PAGE_SIZE.to_string();

        loop {
            let mut request = self
                .authorize(self.client.get(self.doc_url(collection)))
                .query(&[("pageSize", page_size.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListResponse = Self::check(request.send().await?).await?.json().await?;
            for raw in page.documents {
                documents.push(Self::into_document(raw)?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        // Deterministic peer order regardless of server paging
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }
}
