use async_trait::async_trait;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client, RequestBuilder, Response,
};
use serde_json::Value;
use shared::{
    domain::{BearerToken, Record, RecordId},
    protocol::{ListQuery, LookupItem, PageResponse},
};
use tracing::debug;
use url::Url;

use crate::{config::parse_base_url, error::ClientError};

/// Authenticated calls against the `/api/<resource>` family of endpoints.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn fetch_page(
        &self,
        resource: &str,
        query: &ListQuery,
        token: &BearerToken,
    ) -> Result<PageResponse, ClientError>;
    async fn create(
        &self,
        resource: &str,
        body: &Value,
        token: &BearerToken,
    ) -> Result<Record, ClientError>;
    /// `None` when the backend acknowledged the update without echoing it.
    async fn update(
        &self,
        resource: &str,
        id: RecordId,
        body: &Value,
        token: &BearerToken,
    ) -> Result<Option<Record>, ClientError>;
    async fn delete(
        &self,
        resource: &str,
        id: RecordId,
        token: &BearerToken,
    ) -> Result<(), ClientError>;
    async fn fetch_lookup(
        &self,
        path: &str,
        token: &BearerToken,
    ) -> Result<Vec<LookupItem>, ClientError>;
}

#[derive(Clone)]
pub struct HttpApiClient {
    http: Client,
    base_url: Url,
}

impl HttpApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self::with_client(Client::new(), parse_base_url(base_url)?))
    }

    pub fn with_client(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(&format!("api/{path}"))?)
    }

    fn authorized(&self, request: RequestBuilder, token: &BearerToken) -> RequestBuilder {
        request
            .header(AUTHORIZATION, token.header_value())
            .header(CONTENT_TYPE, "application/json")
    }
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::from_response(status.as_u16(), &body))
}

async fn optional_record(response: Response) -> Result<Option<Record>, ClientError> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))?;
    Ok(Record::try_from(value).ok())
}

#[async_trait]
impl ResourceApi for HttpApiClient {
    async fn fetch_page(
        &self,
        resource: &str,
        query: &ListQuery,
        token: &BearerToken,
    ) -> Result<PageResponse, ClientError> {
        let url = self.endpoint(resource)?;
        debug!(%url, page = query.page, sort = %query.sort, "fetching page");
        let response = self
            .authorized(self.http.get(url), token)
            .query(query)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn create(
        &self,
        resource: &str,
        body: &Value,
        token: &BearerToken,
    ) -> Result<Record, ClientError> {
        let url = self.endpoint(&format!("{resource}/create"))?;
        let response = self
            .authorized(self.http.post(url), token)
            .json(body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        optional_record(response)
            .await?
            .ok_or_else(|| ClientError::Decode("create response carried no record".into()))
    }

    async fn update(
        &self,
        resource: &str,
        id: RecordId,
        body: &Value,
        token: &BearerToken,
    ) -> Result<Option<Record>, ClientError> {
        let url = self.endpoint(&format!("{resource}/update/{id}"))?;
        let response = self
            .authorized(self.http.put(url), token)
            .json(body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        optional_record(response).await
    }

    async fn delete(
        &self,
        resource: &str,
        id: RecordId,
        token: &BearerToken,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("{resource}/{id}"))?;
        let response = self
            .authorized(self.http.delete(url), token)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn fetch_lookup(
        &self,
        path: &str,
        token: &BearerToken,
    ) -> Result<Vec<LookupItem>, ClientError> {
        let url = self.endpoint(path)?;
        let response = self
            .authorized(self.http.get(url), token)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}
