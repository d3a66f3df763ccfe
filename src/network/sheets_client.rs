use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::DataSource;
use super::SettingsSource;
use crate::column_letter;
use crate::config::invalid;
use crate::sheet_range;
use crate::RangeRef;
use crate::Result;
use crate::SourceConfig;
use crate::SourceError;
use crate::Table;

const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(Debug, Deserialize)]
struct ValueRange {
    /// Absent when the range holds no data
    #[serde(default)]
    values: Table,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Google Sheets v4 API client: `values` reads and writes plus the few
/// spreadsheet-level calls the stats sheet needs
#[derive(Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    access_token: String,
    settings_range: String,
    request_timeout: Duration,
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("base_url", &self.base_url.as_str())
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish()
    }
}

impl SheetsClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| invalid(format!("source.base_url '{}' is invalid: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid(format!("source.base_url '{}' cannot be a base", config.base_url)));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(SourceError::Request)?;

        Ok(Self {
            client,
            base_url,
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token: config.access_token.clone(),
            settings_range: config.settings_range.clone(),
            request_timeout: config.request_timeout(),
        })
    }

    fn api_url(
        &self,
        segments: &[&str],
    ) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::MalformedRange(segments.join("/")))?
            .pop_if_empty()
            .push("spreadsheets")
            .extend(segments);
        Ok(url)
    }

    fn values_url(
        &self,
        range: &str,
    ) -> Result<Url> {
        self.api_url(&[self.spreadsheet_id.as_str(), "values", range])
    }

    async fn post(
        &self,
        url: Url,
        body: Value,
    ) -> Result<reqwest::Response> {
        trace!(%url, "POST");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        check_status(response).await
    }

    async fn sheet_titles(&self) -> Result<Vec<String>> {
        let mut url = self.api_url(&[self.spreadsheet_id.as_str()])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");
        trace!(%url, "GET spreadsheet");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = check_status(response).await?;

        let body: Spreadsheet = response
            .json()
            .await
            .map_err(|e| SourceError::UnexpectedResponse(format!("spreadsheet body: {e}")))?;
        Ok(body.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    fn request_error(
        &self,
        e: reqwest::Error,
    ) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.request_timeout)
        } else {
            SourceError::Request(e)
        }
    }

    async fn read_range(
        &self,
        range: &str,
    ) -> Result<Table> {
        let url = self.values_url(range)?;
        trace!(%url, "GET values");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = check_status(response).await?;

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| SourceError::UnexpectedResponse(format!("values body for {range}: {e}")))?;
        debug!(range, rows = body.values.len(), "read range");
        Ok(body.values)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SourceError::Http {
        status: status.as_u16(),
        body,
    }
    .into())
}

#[async_trait]
impl DataSource for SheetsClient {
    async fn get_table(
        &self,
        sheet: &str,
    ) -> Result<Table> {
        self.read_range(&sheet_range(sheet)).await
    }

    async fn update_range(
        &self,
        range: &RangeRef,
        values: Vec<Vec<String>>,
    ) -> Result<()> {
        let range = range.to_string();
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut().append_pair("valueInputOption", VALUE_INPUT_OPTION);
        trace!(%url, "PUT values");

        let body: Value = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        check_status(response).await?;

        debug!(%range, "range updated");
        Ok(())
    }

    async fn ensure_sheet(
        &self,
        sheet: &str,
    ) -> Result<()> {
        if self.sheet_titles().await?.iter().any(|t| t == sheet) {
            return Ok(());
        }

        let batch_update = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.api_url(&[batch_update.as_str()])?;
        let body = json!({
            "requests": [{"addSheet": {"properties": {"title": sheet}}}],
        });
        self.post(url, body).await?;
        info!(sheet, "sheet created");
        Ok(())
    }

    async fn clear_columns(
        &self,
        sheet: &str,
        first: usize,
        last: usize,
    ) -> Result<()> {
        let range = format!(
            "{}!{}:{}",
            sheet_range(sheet),
            column_letter(first + 1),
            column_letter(last + 1)
        );
        let url = self.values_url(&format!("{range}:clear"))?;
        self.post(url, json!({})).await?;
        debug!(%range, "range cleared");
        Ok(())
    }
}

#[async_trait]
impl SettingsSource for SheetsClient {
    async fn fetch_settings(&self) -> Result<Table> {
        self.read_range(&self.settings_range).await
    }
}
