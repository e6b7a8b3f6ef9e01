//! Chromium rendering for sites that block or script-build their pages.
//!
//! One browser per fetch, torn down afterwards. A headless fetch that
//! still looks blocked is retried once with a visible window, since a
//! few hosting platforms fingerprint headless Chrome specifically.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::CrawlError;
use crate::config::CrawlerConfig;

/// Anchor/button text that hides the machine-readable file behind a
/// click on some hospital sites.
const DISCLOSURE_CLICK_SCRIPT: &str = r#"
    (() => {
        const patterns = [
            /machine[- ]?readable/i,
            /standard charges/i,
            /price transparency/i,
        ];
        let clicked = 0;
        for (const el of document.querySelectorAll('a, button')) {
            if (clicked >= 3) break;
            const text = (el.textContent || '').trim();
            if (patterns.some((p) => p.test(text))) {
                try { el.click(); clicked += 1; } catch (e) {}
            }
        }
        return clicked;
    })()
"#;

const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Render a page with a real browser and return the final HTML.
pub async fn render(config: &CrawlerConfig, url: &str) -> Result<String, CrawlError> {
    match render_with(config, url, true).await {
        Ok(html) if !looks_blocked(&html) => Ok(html),
        Ok(_) => {
            info!("Headless render of {} looks blocked, retrying with head", url);
            render_with(config, url, false).await
        }
        Err(e) => {
            warn!("Headless render of {} failed ({}), retrying with head", url, e);
            render_with(config, url, false).await
        }
    }
}

async fn render_with(
    config: &CrawlerConfig,
    url: &str,
    headless: bool,
) -> Result<String, CrawlError> {
    let chrome_path = find_chrome()?;

    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--disable-gpu");

    // with_head means NOT headless, confusingly.
    if !headless {
        builder = builder.with_head();
    }

    let browser_config = builder
        .build()
        .map_err(|e| CrawlError::Browser(format!("config: {e}")))?;

    let (mut browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| CrawlError::Browser(format!("launch: {e}")))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    let result = render_on(&browser, config, url).await;

    let _ = browser.close().await;
    handler_task.abort();

    result
}

async fn render_on(
    browser: &Browser,
    config: &CrawlerConfig,
    url: &str,
) -> Result<String, CrawlError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| CrawlError::Browser(format!("new page: {e}")))?;

    let result = render_page(&page, config, url).await;
    let _ = page.close().await;
    result
}

async fn render_page(page: &Page, config: &CrawlerConfig, url: &str) -> Result<String, CrawlError> {
    page.execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
        .await
        .map_err(|e| CrawlError::Browser(format!("user agent: {e}")))?;

    let timeout = Duration::from_secs(config.timeout_secs);
    tokio::time::timeout(timeout, page.goto(url))
        .await
        .map_err(|_| CrawlError::Browser(format!("navigation timed out for {url}")))?
        .map_err(|e| CrawlError::Browser(format!("navigation failed: {e}")))?;

    wait_for_ready(page, config.timeout_secs).await;
    tokio::time::sleep(Duration::from_millis(config.browser_wait_ms)).await;

    // Bounded scrolling to trigger lazy-loaded content.
    for _ in 0..config.max_scrolls {
        if page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .is_err()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    // Expand collapsed disclosure sections.
    match page.evaluate(DISCLOSURE_CLICK_SCRIPT).await {
        Ok(result) => {
            let clicked: i64 = result.into_value().unwrap_or(0);
            if clicked > 0 {
                debug!("Clicked {} disclosure controls on {}", clicked, url);
                tokio::time::sleep(Duration::from_millis(config.browser_wait_ms)).await;
            }
        }
        Err(e) => debug!("Disclosure click script failed on {}: {}", url, e),
    }

    page.content()
        .await
        .map_err(|e| CrawlError::Browser(format!("content: {e}")))
}

async fn wait_for_ready(page: &Page, timeout_secs: u64) {
    let timeout = Duration::from_secs(timeout_secs);
    match tokio::time::timeout(timeout, page.evaluate(WAIT_FOR_READY_SCRIPT)).await {
        Ok(Ok(result)) => {
            let state: String = result.into_value().unwrap_or_else(|_| "unknown".to_string());
            debug!("Page ready state: {}", state);
        }
        Ok(Err(e)) => debug!("Could not check ready state: {}", e),
        Err(_) => warn!("Timeout waiting for page ready state"),
    }
}

/// Whether rendered content still looks like a bot-block page.
fn looks_blocked(html: &str) -> bool {
    let lower = html.to_lowercase();
    html.len() < 1024
        || lower.contains("access denied")
        || lower.contains("verify you are human")
        || lower.contains("enable javascript and cookies")
}

fn find_chrome() -> Result<std::path::PathBuf, CrawlError> {
    if let Ok(path) = std::env::var("CHROME_PATH") {
        return Ok(std::path::PathBuf::from(path));
    }

    for cmd in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Ok(std::path::PathBuf::from(path));
                }
            }
        }
    }

    Err(CrawlError::Browser(
        "Chrome/Chromium not found; install it or set CHROME_PATH".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_page_detection() {
        assert!(looks_blocked("<html>Access Denied</html>"));
        assert!(looks_blocked(&format!(
            "<html>{} Please verify you are human</html>",
            "x".repeat(2000)
        )));
        assert!(!looks_blocked(&format!(
            "<html><body>{}<a href=\"/prices\">Standard Charges</a></body></html>",
            "x".repeat(2000)
        )));
    }
}
