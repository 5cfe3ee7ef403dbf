//! SitafeWeb 门户实现
//!
//! 页面结构写在 `PortalSelectors` 中，核心流程只看到 `SessionDriver` / `CertificatePortal`。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{CdaError, RetrievalError};
use crate::infrastructure::{Locator, PageDriver};
use crate::models::{CertificateId, Credentials};
use crate::services::{CertificatePortal, SessionDriver};

/// 点击下载按钮前的停顿（等待滚动完成）
const PRE_CLICK_PAUSE: Duration = Duration::from_millis(200);

/// 门户页面元素的选择器（XPath 或 CSS）
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PortalSelectors {
    pub username_input: String,
    pub password_input: String,
    pub login_button: String,
    /// 登录成功后才会出现的元素
    pub login_marker: String,
    /// 登录失败时的提示框
    pub login_error: String,
    pub projudi_tile: String,
    pub cda_page_link: String,
    pub cda_input: String,
    pub search_button: String,
    pub download_button: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            username_input: r#"input[name="username"]"#.to_string(),
            password_input: r#"input[name="password"]"#.to_string(),
            login_button: "//button[contains(text(), 'Entrar')]".to_string(),
            login_marker: "//h6[contains(text(), 'PROJUDI')]".to_string(),
            login_error: "//div[contains(@class, 'alert')]".to_string(),
            projudi_tile: "//div[contains(@class, 'text-orange')]//h6[contains(text(), 'PROJUDI')]"
                .to_string(),
            cda_page_link: "//a[contains(., 'CDA')]".to_string(),
            cda_input: r#"input[name="PA_NU_CDA"]"#.to_string(),
            search_button: "//button[contains(text(), 'Pesquisar')]".to_string(),
            download_button: "//button[contains(text(), 'Imprimir')]".to_string(),
        }
    }
}

/// 解析后的定位器
#[derive(Clone, Debug)]
struct Locators {
    username_input: Locator,
    password_input: Locator,
    login_button: Locator,
    login_marker: Locator,
    login_error: Locator,
    projudi_tile: Locator,
    cda_page_link: Locator,
    cda_input: Locator,
    search_button: Locator,
    download_button: Locator,
}

impl From<&PortalSelectors> for Locators {
    fn from(s: &PortalSelectors) -> Self {
        Self {
            username_input: Locator::parse(&s.username_input),
            password_input: Locator::parse(&s.password_input),
            login_button: Locator::parse(&s.login_button),
            login_marker: Locator::parse(&s.login_marker),
            login_error: Locator::parse(&s.login_error),
            projudi_tile: Locator::parse(&s.projudi_tile),
            cda_page_link: Locator::parse(&s.cda_page_link),
            cda_input: Locator::parse(&s.cda_input),
            search_button: Locator::parse(&s.search_button),
            download_button: Locator::parse(&s.download_button),
        }
    }
}

/// SitafeWeb 会话驱动
pub struct SitafeDriver {
    driver: PageDriver,
    login_url: String,
    locators: Locators,
}

impl SitafeDriver {
    pub fn new(driver: PageDriver, login_url: impl Into<String>, selectors: &PortalSelectors) -> Self {
        Self {
            driver,
            login_url: login_url.into(),
            locators: Locators::from(selectors),
        }
    }

    async fn login_failure_reason(&self) -> String {
        match self.driver.text_of(&self.locators.login_error).await {
            Some(text) => text,
            None => "CPF 或密码错误，或登录后页面无法识别".to_string(),
        }
    }
}

#[async_trait]
impl SessionDriver for SitafeDriver {
    type Session = SitafeSession;

    async fn authenticate(&self, credentials: &Credentials) -> Result<SitafeSession, CdaError> {
        info!("🔐 正在登录 SitafeWeb...");

        self.driver
            .goto(&self.login_url)
            .await
            .map_err(|e| CdaError::Browser(format!("无法打开 {}: {}", self.login_url, e)))?;

        let login_form = async {
            let username = self.driver.wait_visible(&self.locators.username_input).await?;
            self.driver.fill(&username, &credentials.username).await?;
            let password = self.driver.wait_visible(&self.locators.password_input).await?;
            self.driver.fill(&password, &credentials.password).await?;
            let button = self.driver.wait_clickable(&self.locators.login_button).await?;
            self.driver.click(&button).await
        };
        login_form
            .await
            .map_err(|e| CdaError::AuthenticationFailure(format!("登录表单不可用: {}", e)))?;

        if let Err(e) = self.driver.wait_present(&self.locators.login_marker).await {
            debug!("登录标志未出现: {}", e);
            let reason = self.login_failure_reason().await;
            warn!("❌ 登录失败: {}", reason);
            return Err(CdaError::AuthenticationFailure(reason));
        }

        info!("✓ 登录成功");
        Ok(SitafeSession {
            driver: self.driver.clone(),
            locators: self.locators.clone(),
        })
    }

    async fn navigate_to_submission_page(&self, session: &SitafeSession) -> Result<(), CdaError> {
        let navigate = async {
            let tile = session.driver.wait_clickable(&session.locators.projudi_tile).await?;
            session.driver.click(&tile).await?;
            let link = session.driver.wait_present(&session.locators.cda_page_link).await?;
            session.driver.js_click(&link).await?;
            session.driver.wait_visible(&session.locators.cda_input).await?;
            Ok::<(), RetrievalError>(())
        };
        navigate
            .await
            .map_err(|e| CdaError::Navigation(e.to_string()))?;

        info!("✓ 已进入 CDA 打印页面");
        Ok(())
    }
}

/// 位于 CDA 打印页面的已登录会话
pub struct SitafeSession {
    driver: PageDriver,
    locators: Locators,
}

#[async_trait]
impl CertificatePortal for SitafeSession {
    async fn submit_identifier(&self, id: &CertificateId) -> Result<(), RetrievalError> {
        let input = self.driver.wait_visible(&self.locators.cda_input).await?;
        self.driver.fill(&input, id.as_str()).await
    }

    async fn trigger_search(&self) -> Result<(), RetrievalError> {
        let button = self.driver.wait_clickable(&self.locators.search_button).await?;
        self.driver.click(&button).await
    }

    async fn trigger_retrieval(&self) -> Result<(), RetrievalError> {
        let button = self.driver.wait_clickable(&self.locators.download_button).await?;
        self.driver.scroll_into_view(&button).await?;
        sleep(PRE_CLICK_PAUSE).await;
        self.driver.js_click(&button).await
    }
}
