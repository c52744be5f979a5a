//! Report endpoints

use reqwest::Client;

use crate::data::types::{ReportId, ReportList, ReportPayload, ReportSummary};
use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder};

/// Client for the report endpoints; every call needs a session token
#[derive(Debug, Clone)]
pub struct ReportsClient {
    url: String,
    client: Client,
    client_info: String,
}

impl ReportsClient {
    pub(crate) fn new(url: &str, client: Client, client_info: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
            client_info: client_info.to_string(),
        }
    }

    fn get(&self, path: &str, token: &str) -> FetchBuilder<'_> {
        Fetch::get(&self.client, &format!("{}{}", self.url, path))
            .header("X-Client-Info", &self.client_info)
            .token_auth(token)
    }

    /// Summaries for the report selector
    pub async fn list_summaries(&self, token: &str) -> Result<Vec<ReportSummary>, Error> {
        let list = self
            .get("/reports/", token)
            .query("selector", "true")
            .execute::<ReportList>()
            .await?;
        Ok(list.reports)
    }

    /// The most recent dashboard, with its `has_data` signal
    pub async fn latest_dashboard(&self, token: &str) -> Result<ReportPayload, Error> {
        self.get("/latest-dashboard/", token)
            .execute::<ReportPayload>()
            .await
    }

    /// Full detail of one report
    pub async fn report(&self, id: ReportId, token: &str) -> Result<ReportPayload, Error> {
        self.get(&format!("/reports/{}/", id), token)
            .execute::<ReportPayload>()
            .await
    }
}
