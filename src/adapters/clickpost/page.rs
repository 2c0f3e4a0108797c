//! ClickPost portal interaction sequence. One linear flow: login → single
//! shipment form → fill → confirm → pay → print agreement → download →
//! extract tracking number. The portal has no API, so every step drives the
//! rendered page through ordered selector fallback chains; the first entries
//! match the markup we integrated against, later ones the variations seen
//! since.

use crate::adapters::browser::{find_any, wait_for_any, BrowserPage, ElementHandle, Locator};
use crate::config::{AutomationConfig, CarrierCredentials};
use crate::domain::model::Order;
use crate::utils::error::{IssueError, Result};
use regex::Regex;
use std::sync::OnceLock;

const HOME_URL: &str = "https://clickpost.jp/";
const SINGLE_FORM_URL: &str = "https://clickpost.jp/procedures/regist";

/// Portal-side limit per address line.
pub(crate) const ADDRESS_LINE_MAX: usize = 20;

pub(crate) const LOGIN_WITH_YAHOO: &[Locator] = &[
    Locator::Css("a#yahoo_login"),
    Locator::Css("a[href*='login.yahoo.co.jp']"),
    Locator::XPath("//a[contains(., 'Yahoo! JAPAN ID')]"),
];
pub(crate) const LOGIN_ID: &[Locator] = &[
    Locator::Css("input#login_handle"),
    Locator::Css("input[name='handle']"),
];
const LOGIN_ID_NEXT: &[Locator] = &[
    Locator::Css("button#btnNext"),
    Locator::Css("button[type='submit']"),
];
pub(crate) const LOGIN_PASSWORD: &[Locator] = &[
    Locator::Css("input#password"),
    Locator::Css("input[name='passwd']"),
];
const LOGIN_SUBMIT: &[Locator] = &[
    Locator::Css("button#btnSubmit"),
    Locator::Css("button[type='submit']"),
];
pub(crate) const LOGGED_IN_MARKER: &[Locator] = &[
    Locator::Css("a[href*='/procedures/regist']"),
    Locator::Css(".mypage-menu"),
];
pub(crate) const VERIFICATION_SCREEN: &[Locator] = &[
    Locator::Css("input#code"),
    Locator::Css("input[name='verify_code']"),
    Locator::XPath("//*[contains(text(), '確認コード')]"),
];

pub(crate) const SINGLE_APPLY: &[Locator] = &[
    Locator::Css("a#single_apply"),
    Locator::Css("a[href='/procedures/regist']"),
    Locator::XPath("//a[contains(., '1件申込')]"),
];
pub(crate) const POSTAL_CODE: &[Locator] = &[
    Locator::Css("input#postal_code"),
    Locator::Css("input[name='zip_code']"),
];
pub(crate) const ADDRESS_LINE1: &[Locator] = &[
    Locator::Css("input#address1"),
    Locator::Css("input[name='address_line1']"),
];
pub(crate) const ADDRESS_LINE2: &[Locator] = &[
    Locator::Css("input#address2"),
    Locator::Css("input[name='address_line2']"),
];
pub(crate) const RECIPIENT_NAME: &[Locator] = &[
    Locator::Css("input#name"),
    Locator::Css("input[name='recipient_name']"),
];
pub(crate) const SAVE_ADDRESS: &[Locator] = &[
    Locator::Css("input#save_address"),
    Locator::Css("input[name='address_book']"),
];
pub(crate) const CONTENT_DESCRIPTION: &[Locator] = &[
    Locator::Css("input#content_name"),
    Locator::Css("input[name='item_name']"),
];
pub(crate) const NEXT_BUTTON: &[Locator] = &[
    Locator::Css("button#next"),
    Locator::Css("input[type='submit'][value='次へ']"),
    Locator::XPath("//button[contains(., '次へ')]"),
];

pub(crate) const PAYMENT_OPEN: &[Locator] = &[
    Locator::Css("button.payment-button"),
    Locator::Css("input[type='submit'][value='お支払い手続きへ']"),
];
pub(crate) const PAYMENT_CONFIRM: &[Locator] = &[
    Locator::Css("button#payment_confirm"),
    Locator::XPath("//button[contains(., '支払う')]"),
];
pub(crate) const PAYMENT_FINAL: &[Locator] = &[
    Locator::Css("button#confirm_payment"),
    Locator::XPath("//button[contains(., '確定')]"),
];
pub(crate) const PRINT_CONSENT: &[Locator] = &[
    Locator::Css("input#print_agree"),
    Locator::Css("input[name='agreement']"),
];
pub(crate) const PRINT_BUTTON: &[Locator] = &[
    Locator::Css("button#print"),
    Locator::XPath("//button[contains(., '印字')]"),
];
pub(crate) const TRACKING_NUMBER: &[Locator] = &[
    Locator::Css("span.tracking-number"),
    Locator::Css("#tracking_no"),
    Locator::Css("td.tracking"),
];

const CONFIRMATION_TEXTS: &[&str] = &["お支払い手続き", "内容を確認"];
const CONFIRMATION_URL_FRAGMENTS: &[&str] = &["/procedures/confirm", "/payment"];
const VALIDATION_ERROR_TEXTS: &[&str] = &["入力内容に誤りがあります", "エラーが発生しました"];

fn tracking_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{4}-\d{4}-\d{4}").expect("tracking pattern is valid"))
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Raw fields scraped from a completed ClickPost flow.
#[derive(Debug, Clone)]
pub struct ClickPostIssue {
    pub pdf_data: Vec<u8>,
    pub tracking_number: String,
}

pub struct ClickPostPage<'a, P: BrowserPage> {
    page: &'a P,
    credentials: &'a CarrierCredentials,
    automation: &'a AutomationConfig,
}

impl<'a, P: BrowserPage> ClickPostPage<'a, P> {
    pub fn new(
        page: &'a P,
        credentials: &'a CarrierCredentials,
        automation: &'a AutomationConfig,
    ) -> Self {
        Self {
            page,
            credentials,
            automation,
        }
    }

    pub async fn issue_label(&self, order: &Order) -> Result<ClickPostIssue> {
        self.login().await?;
        self.open_single_shipment_form().await?;
        self.fill_order(order).await?;
        self.wait_for_confirmation().await?;

        if self.automation.dry_run {
            tracing::info!("Dry run: confirmation screen reached, stopping before payment");
            return Err(IssueError::DryRunStop);
        }

        self.submit_payment().await?;
        self.agree_to_print().await?;
        let pdf_data = self.download_document().await?;
        let tracking_number = self.extract_tracking_number().await?;

        Ok(ClickPostIssue {
            pdf_data,
            tracking_number,
        })
    }

    async fn find_required(
        &self,
        candidates: &[Locator],
        stage: &'static str,
        what: &str,
    ) -> Result<ElementHandle> {
        find_any(self.page, candidates, self.automation.per_locator_timeout)
            .await?
            .ok_or_else(|| IssueError::stage(stage, format!("{} not found", what)))
    }

    /// Native click first; some portal buttons sit behind delegated handlers
    /// that swallow synthetic clicks, so fall back to a script dispatch.
    async fn click_with_fallback(&self, element: &ElementHandle) -> Result<()> {
        if let Err(e) = self.page.click(element).await {
            tracing::debug!("Native click failed, retrying via script: {}", e);
            self.page.click_js(element).await?;
        }
        Ok(())
    }

    async fn login(&self) -> Result<()> {
        tracing::info!("ClickPost: opening portal");
        self.page.goto(HOME_URL).await?;

        if let Some(button) = find_any(
            self.page,
            LOGIN_WITH_YAHOO,
            self.automation.per_locator_timeout,
        )
        .await?
        {
            self.click_with_fallback(&button).await?;
        }

        if let Some((username, password)) = self.credentials.provided() {
            self.login_with_credentials(username, password).await
        } else if self.automation.manual_login {
            self.wait_for_manual_login().await
        } else {
            Err(IssueError::stage(
                "login",
                "no credentials configured and manual login is disabled",
            ))
        }
    }

    async fn login_with_credentials(&self, username: &str, password: &str) -> Result<()> {
        let id_field = wait_for_any(
            self.page,
            LOGIN_ID,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .ok_or_else(|| IssueError::stage("login", "login id field not found"))?;
        self.page.fill(&id_field, username).await?;

        // Two-step login form: id first, password on the next screen.
        if let Some(next) = find_any(
            self.page,
            LOGIN_ID_NEXT,
            self.automation.per_locator_timeout,
        )
        .await?
        {
            self.click_with_fallback(&next).await?;
        }

        let password_field = wait_for_any(
            self.page,
            LOGIN_PASSWORD,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .ok_or_else(|| IssueError::stage("login", "password field not found"))?;
        self.page.fill(&password_field, password).await?;

        let submit = self
            .find_required(LOGIN_SUBMIT, "login", "login submit button")
            .await?;
        self.click_with_fallback(&submit).await?;

        wait_for_any(
            self.page,
            LOGGED_IN_MARKER,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .ok_or_else(|| IssueError::stage("login", "login did not complete"))?;

        tracing::info!("ClickPost: logged in");
        Ok(())
    }

    /// No credentials: a human drives the login (including any one-time code
    /// screen) while we poll for the authenticated landing state.
    async fn wait_for_manual_login(&self) -> Result<()> {
        tracing::info!("ClickPost: waiting for manual login");
        let deadline = tokio::time::Instant::now() + self.automation.manual_login_timeout;
        let mut verification_logged = false;

        loop {
            if find_any(
                self.page,
                LOGGED_IN_MARKER,
                self.automation.per_locator_timeout,
            )
            .await?
            .is_some()
            {
                tracing::info!("ClickPost: manual login completed");
                return Ok(());
            }

            if !verification_logged
                && find_any(
                    self.page,
                    VERIFICATION_SCREEN,
                    self.automation.per_locator_timeout,
                )
                .await?
                .is_some()
            {
                tracing::info!("ClickPost: verification code screen detected, waiting for input");
                verification_logged = true;
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(IssueError::stage(
                    "login",
                    format!(
                        "manual login did not complete within {:?}",
                        self.automation.manual_login_timeout
                    ),
                ));
            }
            tokio::time::sleep(self.automation.poll_interval).await;
        }
    }

    async fn open_single_shipment_form(&self) -> Result<()> {
        if let Some(button) = find_any(
            self.page,
            SINGLE_APPLY,
            self.automation.per_locator_timeout,
        )
        .await?
        {
            if let Err(e) = self.click_with_fallback(&button).await {
                tracing::debug!("Single-apply click failed, will navigate directly: {}", e);
            }
        }

        // The menu → form transition can keep the same URL, so arrival is
        // verified by a known form field, never by the address bar.
        if wait_for_any(
            self.page,
            POSTAL_CODE,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .is_some()
        {
            return Ok(());
        }

        tracing::debug!("ClickPost: form field not visible, navigating to form URL");
        self.page.goto(SINGLE_FORM_URL).await?;
        wait_for_any(
            self.page,
            POSTAL_CODE,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .ok_or_else(|| IssueError::stage("open_form", "single-shipment form not reached"))?;
        Ok(())
    }

    async fn fill_order(&self, order: &Order) -> Result<()> {
        tracing::info!("ClickPost: filling order {}", order.id);

        let postal = self
            .find_required(POSTAL_CODE, "fill", "postal code field")
            .await?;
        self.page.fill(&postal, &order.buyer.postal_code).await?;

        let line1 = self
            .find_required(ADDRESS_LINE1, "fill", "address line 1 field")
            .await?;
        self.page
            .fill(&line1, &truncate_chars(&order.buyer.address_line1, ADDRESS_LINE_MAX))
            .await?;

        // Line 2 carries the building name, and only when there is one.
        if let Some(building) = &order.buyer.building {
            let line2 = self
                .find_required(ADDRESS_LINE2, "fill", "address line 2 field")
                .await?;
            self.page
                .fill(&line2, &truncate_chars(building, ADDRESS_LINE_MAX))
                .await?;
        }

        let name = self
            .find_required(RECIPIENT_NAME, "fill", "recipient name field")
            .await?;
        self.page.fill(&name, &order.buyer.name).await?;

        // Persist the address for next time. set_checked is idempotent, so an
        // already-checked box stays checked.
        if let Some(save) = find_any(
            self.page,
            SAVE_ADDRESS,
            self.automation.per_locator_timeout,
        )
        .await?
        {
            self.page.set_checked(&save, true).await?;
        }

        let content = self
            .find_required(CONTENT_DESCRIPTION, "fill", "content description field")
            .await?;
        self.page.fill(&content, &order.product.description).await?;

        let next = find_any(self.page, NEXT_BUTTON, self.automation.per_locator_timeout)
            .await?
            .ok_or_else(|| IssueError::stage("fill", "next button not found"))?;
        self.click_with_fallback(&next).await?;
        Ok(())
    }

    async fn wait_for_confirmation(&self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.automation.stage_timeout;
        let mut validation_warned = false;

        loop {
            if find_any(self.page, PAYMENT_OPEN, self.automation.poll_interval)
                .await?
                .is_some()
            {
                tracing::info!("ClickPost: confirmation screen reached");
                return Ok(());
            }

            let text = self.page.page_text().await?;
            if CONFIRMATION_TEXTS.iter().any(|t| text.contains(t)) {
                tracing::info!("ClickPost: confirmation screen reached");
                return Ok(());
            }
            let url = self.page.current_url().await?;
            if CONFIRMATION_URL_FRAGMENTS.iter().any(|f| url.contains(f)) {
                tracing::info!("ClickPost: confirmation screen reached");
                return Ok(());
            }

            // Inline validation text is not fatal: the operator may still be
            // able to complete the flow by hand.
            if !validation_warned && VALIDATION_ERROR_TEXTS.iter().any(|t| text.contains(t)) {
                tracing::warn!("ClickPost: page shows validation errors, continuing to wait");
                validation_warned = true;
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(IssueError::stage(
                    "confirmation",
                    "confirmation screen not detected",
                ));
            }
            tokio::time::sleep(self.automation.poll_interval).await;
        }
    }

    /// Payment is three controls in a row: open the widget, confirm, final
    /// confirm. Each has its own candidate list and script fallback.
    async fn submit_payment(&self) -> Result<()> {
        tracing::info!("ClickPost: submitting payment");

        let open = wait_for_any(
            self.page,
            PAYMENT_OPEN,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .ok_or_else(|| IssueError::stage("payment", "payment button not found"))?;
        self.click_with_fallback(&open).await?;

        let confirm = wait_for_any(
            self.page,
            PAYMENT_CONFIRM,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .ok_or_else(|| IssueError::stage("payment", "payment confirmation button not found"))?;
        self.click_with_fallback(&confirm).await?;

        let final_confirm = wait_for_any(
            self.page,
            PAYMENT_FINAL,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .ok_or_else(|| IssueError::stage("payment", "final payment confirmation not found"))?;
        self.click_with_fallback(&final_confirm).await?;
        Ok(())
    }

    async fn agree_to_print(&self) -> Result<()> {
        let consent = wait_for_any(
            self.page,
            PRINT_CONSENT,
            self.automation.stage_timeout,
            self.automation.poll_interval,
        )
        .await?
        .ok_or_else(|| IssueError::stage("print", "print consent checkbox not found"))?;

        // Script toggle first; a plain click is the fallback.
        if self.page.set_checked(&consent, true).await.is_err() && !self.page.is_checked(&consent).await?
        {
            self.page.click(&consent).await?;
        }

        let print = self
            .find_required(PRINT_BUTTON, "print", "print button")
            .await?;
        self.click_with_fallback(&print).await?;
        Ok(())
    }

    async fn download_document(&self) -> Result<Vec<u8>> {
        tracing::info!("ClickPost: waiting for label download");
        let data = self
            .page
            .await_download(self.automation.download_timeout)
            .await
            .map_err(|e| IssueError::stage("download", e.to_string()))?;
        if data.is_empty() {
            return Err(IssueError::stage("download", "downloaded document is empty"));
        }
        Ok(data)
    }

    async fn extract_tracking_number(&self) -> Result<String> {
        if let Some(element) = find_any(
            self.page,
            TRACKING_NUMBER,
            self.automation.per_locator_timeout,
        )
        .await?
        {
            let text = self.page.text(&element).await?;
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }

        // Last resort: scan the whole page for the dashed numeric pattern.
        let text = self.page.page_text().await?;
        if let Some(m) = tracking_pattern().find(&text) {
            return Ok(m.as_str().to_string());
        }

        Err(IssueError::stage(
            "extract",
            "tracking number not found on result page",
        ))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::adapters::browser::scripted::ScriptedPage;

    /// Scripted page on which the whole ClickPost flow succeeds.
    pub(crate) fn success_page() -> ScriptedPage {
        let page = ScriptedPage::new();
        page.add_element(LOGIN_WITH_YAHOO[0].value(), "");
        page.add_element(LOGIN_ID[0].value(), "");
        page.add_element(LOGIN_PASSWORD[0].value(), "");
        page.add_element(LOGIN_SUBMIT[0].value(), "");
        page.add_element(LOGGED_IN_MARKER[0].value(), "");
        page.add_element(SINGLE_APPLY[0].value(), "");
        page.add_element(POSTAL_CODE[0].value(), "");
        page.add_element(ADDRESS_LINE1[0].value(), "");
        page.add_element(ADDRESS_LINE2[0].value(), "");
        page.add_element(RECIPIENT_NAME[0].value(), "");
        page.add_element(SAVE_ADDRESS[0].value(), "");
        page.add_element(CONTENT_DESCRIPTION[0].value(), "");
        page.add_element(NEXT_BUTTON[0].value(), "");
        page.add_element(PAYMENT_OPEN[0].value(), "");
        page.add_element(PAYMENT_CONFIRM[0].value(), "");
        page.add_element(PAYMENT_FINAL[0].value(), "");
        page.add_element(PRINT_CONSENT[0].value(), "");
        page.add_element(PRINT_BUTTON[0].value(), "");
        page.add_element(TRACKING_NUMBER[0].value(), "1234-5678-9012");
        page.set_download(b"%PDF-1.4 label".to_vec());
        page
    }
}
