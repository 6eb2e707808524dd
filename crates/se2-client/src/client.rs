//! SE2 HTTP client.

use std::sync::Arc;

use database::{Account, LogRow, Task};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, ORIGIN, REFERER, SET_COOKIE, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::Se2Config;
use crate::credentials::{parse_set_cookies, CredentialStore};
use crate::error::Se2Error;
use crate::types::{
    accounts_payload, task_log_payload, tasks_payload, AccountDetail, Envelope, Paged, TaskFilter,
    TaskMetadata, ACCOUNTS_ENDPOINT, ACCOUNT_ENDPOINT, REFRESH_ENDPOINT, TASKS_ENDPOINT,
    TASK_INFO_ENDPOINT, TASK_LOG_ENDPOINT,
};

const BROWSER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// Client for the SE2 campaign API.
///
/// Every request is a JSON `POST` carrying the session cookie from the
/// credential store.
#[derive(Clone)]
pub struct Se2Client {
    http: Client,
    config: Se2Config,
    credentials: Arc<dyn CredentialStore>,
}

impl Se2Client {
    /// Build a client. Fails if the CA certificate cannot be loaded.
    pub fn new(config: Se2Config, credentials: Arc<dyn CredentialStore>) -> Result<Self, Se2Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
        let origin = HeaderValue::from_str(&config.base_url)
            .map_err(|e| Se2Error::Config(format!("Invalid SE2 base URL: {}", e)))?;
        headers.insert(ORIGIN, origin.clone());
        headers.insert(REFERER, origin);

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers);

        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                Se2Error::Config(format!("Cannot read CA certificate {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build()?;
        info!(base_url = %config.base_url, "SE2 client ready");

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Se2Config {
        &self.config
    }

    /// POST `payload` once and return the decoded JSON body.
    pub async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, Se2Error> {
        let cookie = self.credentials.load().await?;
        let mut cookie_header = HeaderValue::from_str(cookie.expose_secret())
            .map_err(|e| Se2Error::Credential(format!("invalid cookie header: {}", e)))?;
        cookie_header.set_sensitive(true);

        let url = self.config.endpoint(endpoint);
        debug!(endpoint = %endpoint, "POST");

        let response = self
            .http
            .post(&url)
            .header(COOKIE, cookie_header)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Se2Error::AuthExpired(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Se2Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// POST once, logging and swallowing any failure.
    pub async fn send_post(&self, endpoint: &str, payload: &Value) -> Option<Value> {
        match self.post(endpoint, payload).await {
            Ok(body) => Some(body),
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Upstream request failed");
                None
            }
        }
    }

    /// POST; on failure refresh the session cookie once and retry once.
    pub async fn send_with_auth_retry(&self, endpoint: &str, payload: &Value) -> Option<Value> {
        let first = match self.post(endpoint, payload).await {
            Ok(body) => return Some(body),
            Err(e) => e,
        };
        warn!(endpoint = %endpoint, error = %first, "Upstream request failed, refreshing session");

        if let Err(e) = self.refresh_token().await {
            error!(error = %e, "Session refresh failed");
            return None;
        }

        self.send_post(endpoint, payload).await
    }

    /// Walk `page_sn` from 1 until a short page, an empty page or a failure.
    pub async fn fetch_paged(&self, endpoint: &str, template: &Value) -> Paged {
        let record_page = template
            .get("record_page")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        let mut records = Vec::new();
        let mut page_sn: u64 = 1;

        loop {
            tokio::time::sleep(self.config.page_delay).await;

            let mut payload = template.clone();
            payload["page_sn"] = Value::from(page_sn);

            let Some(body) = self.send_with_auth_retry(endpoint, &payload).await else {
                warn!(endpoint = %endpoint, page_sn, fetched = records.len(), "Paged fetch stopped early");
                return Paged {
                    records,
                    complete: false,
                };
            };

            let page = match body.get("data") {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            if page.is_empty() {
                break;
            }

            let short = page.len() < record_page;
            records.extend(page);
            if short {
                break;
            }
            page_sn += 1;
        }

        debug!(endpoint = %endpoint, total = records.len(), "Paged fetch complete");
        Paged {
            records,
            complete: true,
        }
    }

    /// List tasks. `None` when the listing could not be fetched completely.
    pub async fn fetch_tasks(&self, filter: TaskFilter) -> Option<Vec<Task>> {
        let paged = self.fetch_paged(TASKS_ENDPOINT, &tasks_payload(filter)).await;
        decode_complete(TASKS_ENDPOINT, paged)
    }

    /// Recipients of one task. `None` when the log could not be fetched
    /// completely.
    pub async fn fetch_task_log(&self, sendtask_uuid: &str) -> Option<Vec<LogRow>> {
        let paged = self
            .fetch_paged(TASK_LOG_ENDPOINT, &task_log_payload(sendtask_uuid))
            .await;
        decode_complete(TASK_LOG_ENDPOINT, paged)
    }

    /// Pause flag and stop-time override of one task.
    pub async fn fetch_task_metadata(&self, sendtask_uuid: &str) -> Option<TaskMetadata> {
        let payload = serde_json::json!({ "sendtask_uuid": sendtask_uuid });
        let body = self.send_with_auth_retry(TASK_INFO_ENDPOINT, &payload).await?;
        decode_data(TASK_INFO_ENDPOINT, body)
    }

    /// Enabled accounts with their organization ids. `None` if the listing or
    /// any account's organizations could not be fetched.
    pub async fn fetch_accounts(&self) -> Option<Vec<Account>> {
        let paged = self.fetch_paged(ACCOUNTS_ENDPOINT, &accounts_payload()).await;
        if !paged.complete {
            return None;
        }

        let mut accounts = Vec::with_capacity(paged.records.len());
        for mut record in paged.records {
            let acct_uuid = record
                .get("acct_uuid")
                .and_then(Value::as_str)
                .map(str::to_string)?;
            let orgs = self.fetch_account_orgs(&acct_uuid).await?;
            record["orgs"] = Value::from(orgs);

            match serde_json::from_value::<Account>(record) {
                Ok(account) => accounts.push(account.canonicalize()),
                Err(e) => {
                    error!(acct_uuid = %acct_uuid, error = %e, "Malformed account record");
                    return None;
                }
            }
        }
        Some(accounts)
    }

    async fn fetch_account_orgs(&self, acct_uuid: &str) -> Option<Vec<String>> {
        let payload = serde_json::json!({ "acct_uuid": acct_uuid });
        let body = self.send_with_auth_retry(ACCOUNT_ENDPOINT, &payload).await?;
        let detail: AccountDetail = decode_data(ACCOUNT_ENDPOINT, body)?;
        Some(detail.orgs.into_iter().map(|org| org.uuid).collect())
    }

    /// Exchange the stored cookie for fresh session cookies and persist them.
    pub async fn refresh_token(&self) -> Result<(), Se2Error> {
        info!("Refreshing SE2 session token...");
        let cookie = self.credentials.load().await?;
        let mut cookie_header = HeaderValue::from_str(cookie.expose_secret())
            .map_err(|e| Se2Error::Credential(format!("invalid cookie header: {}", e)))?;
        cookie_header.set_sensitive(true);

        let response = self
            .http
            .post(self.config.endpoint(REFRESH_ENDPOINT))
            .header(COOKIE, cookie_header)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        let headers: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        let refreshed = parse_set_cookies(headers.iter().map(String::as_str), &self.config.cookie_names)
            .ok_or(Se2Error::MissingCookie)
            .inspect_err(|_| warn!(status = status.as_u16(), "Refresh response carried no session cookie"))?;

        self.credentials.persist(SecretString::from(refreshed)).await?;
        info!("SE2 session token refreshed and saved");
        Ok(())
    }
}

impl std::fmt::Debug for Se2Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Se2Client")
            .field("config", &self.config)
            .finish()
    }
}

fn decode_complete<T: DeserializeOwned>(endpoint: &str, paged: Paged) -> Option<Vec<T>> {
    if !paged.complete {
        return None;
    }
    paged
        .records
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .inspect_err(|e| error!(endpoint = %endpoint, error = %e, "Malformed upstream record"))
        .ok()
}

fn decode_data<T: DeserializeOwned>(endpoint: &str, body: Value) -> Option<T> {
    serde_json::from_value::<Envelope>(body)
        .and_then(|envelope| serde_json::from_value(envelope.data))
        .inspect_err(|e| error!(endpoint = %endpoint, error = %e, "Malformed upstream response"))
        .ok()
}
