//! 页面驱动 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"查找 / 等待 / 输入 / 点击"的能力

use std::fmt::{self, Display};
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::{Element, Page};
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::RetrievalError;

/// 轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const IS_VISIBLE_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none';
}"#;

const IS_CLICKABLE_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none'
        && !this.disabled;
}"#;

const CLEAR_VALUE_JS: &str = r#"function() {
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
}"#;

const CLICK_JS: &str = "function() { this.click(); }";

const SCROLL_INTO_VIEW_JS: &str = "function() { this.scrollIntoView(true); }";

/// 元素定位方式
///
/// 以 `/` 或 `(` 开头的按 XPath 处理，其余按 CSS 选择器处理。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with('/') || raw.starts_with('(') {
            Locator::XPath(raw.to_string())
        } else {
            Locator::Css(raw.to_string())
        }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) | Locator::XPath(s) => f.write_str(s),
        }
    }
}

/// 等待的就绪条件
#[derive(Debug, Clone, Copy)]
enum Readiness {
    Present,
    Visible,
    Clickable,
}

/// 页面驱动
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 所有等待都有上限，超时返回 `ElementTimeout`
/// - 不认识 CDA / 台账
#[derive(Clone)]
pub struct PageDriver {
    page: Page,
    timeout: Duration,
}

impl PageDriver {
    pub fn new(page: Page, timeout: Duration) -> Self {
        Self { page, timeout }
    }

    /// 打开页面并等待 `document.readyState` 变为 `complete`（最多等待一个超时周期）
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;

        let deadline = Instant::now() + self.timeout;
        while !self.document_ready().await? {
            if Instant::now() >= deadline {
                debug!("页面未在 {:?} 内加载完成，继续执行", self.timeout);
                break;
            }
            sleep(POLL_INTERVAL).await;
        }

        debug!("已导航到: {}", url);
        Ok(())
    }

    async fn document_ready(&self) -> Result<bool> {
        let state = self.eval("document.readyState").await?;
        Ok(state.as_str() == Some("complete"))
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 立即查找，不等待
    pub async fn find(&self, locator: &Locator) -> Option<Element> {
        let found = match locator {
            Locator::Css(selector) => self.page.find_element(selector.as_str()).await,
            Locator::XPath(xpath) => self.page.find_xpath(xpath.as_str()).await,
        };
        found.ok()
    }

    pub async fn wait_present(&self, locator: &Locator) -> Result<Element, RetrievalError> {
        self.wait_for(locator, Readiness::Present).await
    }

    pub async fn wait_visible(&self, locator: &Locator) -> Result<Element, RetrievalError> {
        self.wait_for(locator, Readiness::Visible).await
    }

    pub async fn wait_clickable(&self, locator: &Locator) -> Result<Element, RetrievalError> {
        self.wait_for(locator, Readiness::Clickable).await
    }

    /// 清空输入框后逐字输入
    pub async fn fill(&self, element: &Element, text: &str) -> Result<(), RetrievalError> {
        element
            .call_js_fn(CLEAR_VALUE_JS, false)
            .await
            .map_err(|e| RetrievalError::browser("clear", e))?;
        element
            .focus()
            .await
            .map_err(|e| RetrievalError::browser("focus", e))?;
        element
            .type_str(text)
            .await
            .map_err(|e| RetrievalError::browser("type", e))?;
        Ok(())
    }

    /// 原生点击（模拟鼠标）
    pub async fn click(&self, element: &Element) -> Result<(), RetrievalError> {
        element
            .click()
            .await
            .map_err(|e| RetrievalError::browser("click", e))?;
        Ok(())
    }

    /// 通过 JS 点击，绕过遮挡层
    pub async fn js_click(&self, element: &Element) -> Result<(), RetrievalError> {
        element
            .call_js_fn(CLICK_JS, false)
            .await
            .map_err(|e| RetrievalError::browser("js click", e))?;
        Ok(())
    }

    pub async fn scroll_into_view(&self, element: &Element) -> Result<(), RetrievalError> {
        element
            .call_js_fn(SCROLL_INTO_VIEW_JS, false)
            .await
            .map_err(|e| RetrievalError::browser("scroll", e))?;
        Ok(())
    }

    /// 读取元素文本，找不到或为空时返回 `None`
    pub async fn text_of(&self, locator: &Locator) -> Option<String> {
        let element = self.find(locator).await?;
        element
            .inner_text()
            .await
            .ok()
            .flatten()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        readiness: Readiness,
    ) -> Result<Element, RetrievalError> {
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(element) = self.find(locator).await {
                if is_ready(&element, readiness).await {
                    return Ok(element);
                }
            }

            if Instant::now() >= deadline {
                debug!("等待 {:?} 超时: {}", readiness, locator);
                return Err(RetrievalError::ElementTimeout {
                    selector: locator.to_string(),
                    timeout: self.timeout,
                });
            }

            sleep(POLL_INTERVAL).await;
        }
    }
}

async fn is_ready(element: &Element, readiness: Readiness) -> bool {
    let check = match readiness {
        Readiness::Present => return true,
        Readiness::Visible => IS_VISIBLE_JS,
        Readiness::Clickable => IS_CLICKABLE_JS,
    };

    element
        .call_js_fn(check, false)
        .await
        .ok()
        .and_then(|ret| ret.result.value)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_parse() {
        assert_eq!(
            Locator::parse("//button[contains(text(), 'Pesquisar')]"),
            Locator::XPath("//button[contains(text(), 'Pesquisar')]".to_string())
        );
        assert_eq!(
            Locator::parse("(//a)[1]"),
            Locator::XPath("(//a)[1]".to_string())
        );
        assert_eq!(
            Locator::parse(" input[name=username] "),
            Locator::Css("input[name=username]".to_string())
        );
        assert_eq!(Locator::parse("#login").to_string(), "#login");
    }
}
