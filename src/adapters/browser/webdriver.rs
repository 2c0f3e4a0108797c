use crate::adapters::browser::{BrowserFactory, BrowserPage, ElementHandle, Locator};
use crate::utils::error::{IssueError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

// W3C WebDriver element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const DOWNLOAD_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One live WebDriver session. Created by [`WebDriverFactory`], closed by the
/// owning gateway in its cleanup step.
pub struct WebDriverBrowser {
    http: Client,
    base_url: String,
    session_id: String,
    download_dir: PathBuf,
    started_at: SystemTime,
}

impl WebDriverBrowser {
    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, path)
    }

    /// Unwraps the `value` envelope every WebDriver response carries, turning
    /// non-2xx responses into a `WebDriver` error with the remote message.
    async fn unwrap_value(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response.json().await?;
        if status.is_success() {
            Ok(body.get("value").cloned().unwrap_or(Value::Null))
        } else {
            let message = body
                .pointer("/value/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown WebDriver failure")
                .to_string();
            Err(IssueError::WebDriver { message })
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .http
            .post(self.session_url(path))
            .json(&body)
            .send()
            .await?;
        Self::unwrap_value(response).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self.http.get(self.session_url(path)).send().await?;
        Self::unwrap_value(response).await
    }

    fn element_arg(element: &ElementHandle) -> Value {
        json!({ (ELEMENT_KEY): element.0 })
    }

    async fn execute_with_args(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.post("/execute/sync", json!({ "script": script, "args": args }))
            .await
    }
}

#[async_trait]
impl BrowserPage for WebDriverBrowser {
    async fn goto(&self, url: &str) -> Result<()> {
        self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.get("/url").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| IssueError::WebDriver {
                message: "current URL missing from response".to_string(),
            })
    }

    async fn find(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let response = self
            .http
            .post(self.session_url("/element"))
            .json(&json!({ "using": locator.using(), "value": locator.value() }))
            .send()
            .await?;

        // "no such element" comes back as 404 and is a routine miss, not an error.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let value = Self::unwrap_value(response).await?;
        let id = value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| IssueError::WebDriver {
                message: "element reference missing from response".to_string(),
            })?;
        Ok(Some(ElementHandle(id.to_string())))
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.post(&format!("/element/{}/click", element.0), json!({}))
            .await?;
        Ok(())
    }

    async fn click_js(&self, element: &ElementHandle) -> Result<()> {
        self.execute_with_args("arguments[0].click();", vec![Self::element_arg(element)])
            .await?;
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<()> {
        self.post(&format!("/element/{}/clear", element.0), json!({}))
            .await?;
        self.post(
            &format!("/element/{}/value", element.0),
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        let value = self.get(&format!("/element/{}/text", element.0)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attr(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let value = self
            .get(&format!("/element/{}/attribute/{}", element.0, name))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn page_text(&self) -> Result<String> {
        let value = self
            .execute_with_args("return document.body ? document.body.innerText : '';", vec![])
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_checked(&self, element: &ElementHandle) -> Result<bool> {
        let value = self
            .get(&format!("/element/{}/property/checked", element.0))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn set_checked(&self, element: &ElementHandle, checked: bool) -> Result<()> {
        // Toggle via click so the page's own change handlers still run.
        self.execute_with_args(
            "if (arguments[0].checked !== arguments[1]) { arguments[0].click(); }",
            vec![Self::element_arg(element), json!(checked)],
        )
        .await?;
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        self.execute_with_args(script, vec![]).await
    }

    async fn await_download(&self, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut entries = tokio::fs::read_dir(&self.download_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                // Chrome writes in-flight downloads with a .crdownload suffix.
                if path.extension().and_then(|e| e.to_str()) == Some("crdownload") {
                    continue;
                }
                let metadata = entry.metadata().await?;
                if !metadata.is_file() || metadata.len() == 0 {
                    continue;
                }
                let fresh = metadata
                    .modified()
                    .map(|m| m >= self.started_at)
                    .unwrap_or(false);
                if fresh {
                    tracing::debug!(
                        "Download complete: {} ({} bytes)",
                        path.display(),
                        metadata.len()
                    );
                    return Ok(tokio::fs::read(&path).await?);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(IssueError::WebDriver {
                    message: format!("no download appeared within {:?}", timeout),
                });
            }
            tokio::time::sleep(DOWNLOAD_POLL_INTERVAL).await;
        }
    }

    async fn close(&self) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/session/{}", self.base_url, self.session_id))
            .send()
            .await?;
        Self::unwrap_value(response).await?;
        Ok(())
    }
}

/// Launches fresh headless-Chrome sessions against a WebDriver endpoint
/// (chromedriver or a Selenium hub).
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    http: Client,
    base_url: String,
    download_dir: PathBuf,
    headless: bool,
}

impl WebDriverFactory {
    pub fn new(base_url: impl Into<String>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            download_dir: download_dir.into(),
            headless: true,
        }
    }

    /// Headful mode, needed when manual login is expected.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    fn capabilities(&self) -> Value {
        let mut args = vec!["--disable-gpu".to_string(), "--window-size=1280,960".to_string()];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "download.default_directory": self.download_dir.to_string_lossy(),
                            "download.prompt_for_download": false,
                            "plugins.always_open_pdf_externally": true
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl BrowserFactory for WebDriverFactory {
    type Page = WebDriverBrowser;

    async fn launch(&self) -> Result<WebDriverBrowser> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let response = self
            .http
            .post(format!("{}/session", self.base_url))
            .json(&self.capabilities())
            .send()
            .await?;
        let value = WebDriverBrowser::unwrap_value(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| IssueError::WebDriver {
                message: "session id missing from new-session response".to_string(),
            })?
            .to_string();

        tracing::debug!("WebDriver session started: {}", session_id);
        Ok(WebDriverBrowser {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            session_id,
            download_dir: self.download_dir.clone(),
            started_at: SystemTime::now(),
        })
    }
}
