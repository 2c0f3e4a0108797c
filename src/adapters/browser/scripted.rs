//! Scripted in-memory `BrowserPage` used by the protocol and gateway tests.
//! Elements are keyed by locator value; interactions are recorded so tests
//! can assert what the protocol actually did.

use crate::adapters::browser::{BrowserPage, ElementHandle, Locator};
use crate::utils::error::{IssueError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct ScriptedState {
    elements: HashMap<String, String>,
    attrs: HashMap<(String, String), String>,
    checked: HashMap<String, bool>,
    page_text: String,
    url: String,
    download: Option<Vec<u8>>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    fail_click: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct ScriptedPage {
    state: Arc<Mutex<ScriptedState>>,
    close_calls: Arc<AtomicUsize>,
    fail_close: Arc<Mutex<bool>>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an element under a locator value, with the text `text()`
    /// should return for it.
    pub fn add_element(&self, selector: &str, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.elements.insert(selector.to_string(), text.to_string());
    }

    pub fn remove_element(&self, selector: &str) {
        self.state.lock().unwrap().elements.remove(selector);
    }

    pub fn set_attr(&self, selector: &str, name: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .attrs
            .insert((selector.to_string(), name.to_string()), value.to_string());
    }

    pub fn set_page_text(&self, text: &str) {
        self.state.lock().unwrap().page_text = text.to_string();
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().unwrap().url = url.to_string();
    }

    pub fn set_download(&self, data: Vec<u8>) {
        self.state.lock().unwrap().download = Some(data);
    }

    pub fn clear_download(&self) {
        self.state.lock().unwrap().download = None;
    }

    /// Makes native clicks on this element fail, forcing the JS fallback.
    pub fn fail_click_on(&self, selector: &str) {
        self.state.lock().unwrap().fail_click.insert(selector.to_string());
    }

    pub fn fail_close(&self) {
        *self.fail_close.lock().unwrap() = true;
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn checked(&self, selector: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .checked
            .get(selector)
            .copied()
            .unwrap_or(false)
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.state.lock().unwrap().url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .elements
            .contains_key(locator.value())
            .then(|| ElementHandle(locator.value().to_string())))
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_click.contains(&element.0) {
            return Err(IssueError::WebDriver {
                message: format!("element click intercepted: {}", element.0),
            });
        }
        state.clicks.push(element.0.clone());
        Ok(())
    }

    async fn click_js(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.clicks.push(format!("js:{}", element.0));
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fills.push((element.0.clone(), text.to_string()));
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state.elements.get(&element.0).cloned().unwrap_or_default())
    }

    async fn attr(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .attrs
            .get(&(element.0.clone(), name.to_string()))
            .cloned())
    }

    async fn page_text(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().page_text.clone())
    }

    async fn is_checked(&self, element: &ElementHandle) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .checked
            .get(&element.0)
            .copied()
            .unwrap_or(false))
    }

    async fn set_checked(&self, element: &ElementHandle, checked: bool) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .checked
            .insert(element.0.clone(), checked);
        Ok(())
    }

    async fn execute_script(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn await_download(&self, timeout: Duration) -> Result<Vec<u8>> {
        match self.state.lock().unwrap().download.clone() {
            Some(data) => Ok(data),
            None => Err(IssueError::WebDriver {
                message: format!("no download appeared within {:?}", timeout),
            }),
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_close.lock().unwrap() {
            return Err(IssueError::WebDriver {
                message: "session already gone".to_string(),
            });
        }
        Ok(())
    }
}

/// Factory that hands out clones of one scripted page, so the test keeps a
/// handle for assertions after the gateway is done with it.
#[derive(Clone)]
pub struct ScriptedFactory {
    page: ScriptedPage,
    fail_launch: bool,
}

impl ScriptedFactory {
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page,
            fail_launch: false,
        }
    }

    pub fn failing_launch(page: ScriptedPage) -> Self {
        Self {
            page,
            fail_launch: true,
        }
    }
}

#[async_trait]
impl crate::adapters::browser::BrowserFactory for ScriptedFactory {
    type Page = ScriptedPage;

    async fn launch(&self) -> Result<ScriptedPage> {
        if self.fail_launch {
            return Err(IssueError::WebDriver {
                message: "could not start browser session".to_string(),
            });
        }
        Ok(self.page.clone())
    }
}
