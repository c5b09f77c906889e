use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;

use crate::config::Config;

pub const DEFAULT_SERVER_URL: &str = "https://cloud.seatable.io";

/// Read-only client for the SeaTable API. The long-lived API token is
/// exchanged for a per-base access token before any table data is read.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    server: Url,
    api_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseAccess {
    pub access_token: String,
    pub dtable_uuid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct RowsEnvelope {
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct DownloadLinkEnvelope {
    download_link: String,
}

impl Client {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let server = Url::parse(&config.server).context("parse server url")?;
        if server.scheme() != "http" && server.scheme() != "https" {
            anyhow::bail!("server url must be http/https: {server}");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;

        Ok(Self {
            http,
            server,
            api_token: config.api_token.clone(),
        })
    }

    pub async fn base_access(&self) -> anyhow::Result<BaseAccess> {
        let url = self.endpoint("/api/v2.1/dtable/app-access-token/")?;
        let request = self.http.get(url).header(AUTHORIZATION, self.token_auth());
        self.send_json(request, "app-access-token").await
    }

    pub async fn metadata(&self, base: &BaseAccess) -> anyhow::Result<Metadata> {
        let url = self.endpoint(&format!(
            "/dtable-server/api/v1/dtables/{}/metadata/",
            base.dtable_uuid
        ))?;
        let request = self.http.get(url).bearer_auth(&base.access_token);
        let envelope: MetadataEnvelope = self.send_json(request, "metadata").await?;
        Ok(envelope.metadata)
    }

    pub async fn rows(
        &self,
        base: &BaseAccess,
        table_name: &str,
        view_name: Option<&str>,
    ) -> anyhow::Result<Vec<serde_json::Map<String, serde_json::Value>>> {
        let url = self.endpoint(&format!(
            "/dtable-server/api/v1/dtables/{}/rows/",
            base.dtable_uuid
        ))?;
        let mut request = self
            .http
            .get(url)
            .bearer_auth(&base.access_token)
            .query(&[("table_name", table_name)]);
        if let Some(view_name) = view_name {
            request = request.query(&[("view_name", view_name)]);
        }
        let envelope: RowsEnvelope = self.send_json(request, "rows").await?;
        Ok(envelope.rows)
    }

    /// Downloads one image. Asset URLs belonging to the configured server go
    /// through the download-link API first; anything else is fetched as-is.
    /// Returns the bytes and the bare media type from `Content-Type`, if any.
    pub async fn fetch_image(&self, url: &Url) -> anyhow::Result<(Vec<u8>, Option<String>)> {
        let target = match self.asset_path(url) {
            Some(path) => self
                .download_link(&path)
                .await
                .context("resolve asset download link")?,
            None => url.clone(),
        };

        let response = self
            .http
            .get(target.clone())
            .send()
            .await
            .with_context(|| format!("GET {target}"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("image fetch failed ({status}): {url}");
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("read image bytes: {url}"))?;

        Ok((bytes.to_vec(), content_type))
    }

    pub async fn download_link(&self, asset_path: &str) -> anyhow::Result<Url> {
        let url = self.endpoint("/api/v2.1/dtable/app-download-link/")?;
        let request = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.token_auth())
            .query(&[("path", asset_path)]);
        let envelope: DownloadLinkEnvelope = self.send_json(request, "app-download-link").await?;
        Url::parse(&envelope.download_link).context("parse download link url")
    }

    /// The part of an asset URL's path after `/asset/`, when the URL belongs
    /// to the configured server. That suffix is what the download-link API
    /// expects as its `path` parameter.
    fn asset_path(&self, url: &Url) -> Option<String> {
        if url.host_str() != self.server.host_str()
            || url.port_or_known_default() != self.server.port_or_known_default()
        {
            return None;
        }
        let (_, rest) = url.path().split_once("/asset/")?;
        if rest.is_empty() {
            return None;
        }
        Some(rest.to_owned())
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        self.server
            .join(path)
            .with_context(|| format!("build endpoint url: {path}"))
    }

    fn token_auth(&self) -> String {
        format!("Token {}", self.api_token)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> anyhow::Result<T> {
        let response = request.send().await.with_context(|| format!("GET {what}"))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .with_context(|| format!("read {what} response body"))?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("seatable api error ({status}) for {what}: {message}");
        }

        serde_json::from_str(&raw).with_context(|| format!("parse {what} response"))
    }
}

pub fn find_table<'a>(metadata: &'a Metadata, name: Option<&str>) -> anyhow::Result<&'a Table> {
    match name {
        Some(name) => metadata
            .tables
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| {
                let known = metadata
                    .tables
                    .iter()
                    .map(|table| table.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                anyhow::anyhow!("table {name:?} not found; base has: {known}")
            }),
        None => metadata
            .tables
            .first()
            .ok_or_else(|| anyhow::anyhow!("base has no tables")),
    }
}

/// The catalog needs exactly one image-typed column. Not finding one is a
/// configuration error, and the message lists what the table does expose so
/// the mismatch is diagnosable from the log alone.
pub fn find_image_column(table: &Table) -> anyhow::Result<&Column> {
    if let Some(column) = table.columns.iter().find(|c| c.column_type == "image") {
        return Ok(column);
    }

    let mut found = table
        .columns
        .iter()
        .map(|c| c.column_type.as_str())
        .collect::<Vec<_>>();
    found.sort_unstable();
    found.dedup();
    anyhow::bail!(
        "table {:?} has no image column; found column types: {}",
        table.name,
        found.join(", ")
    );
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error_msg")?.as_str()?.to_owned();
    Some(message)
}
