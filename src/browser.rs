//! Browser Session Management
//!
//! Creates and configures the Chrome WebDriver session: window size,
//! headless mode, download preferences pinned to the run's data directory
//! and an optional authenticated-proxy extension.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use thirtyfour::prelude::*;
use tracing::warn;

use crate::config::Config;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct Browser {
    driver: WebDriver,
    wait_timeout: Duration,
}

impl Browser {
    /// Connect to the WebDriver endpoint and start a configured session.
    pub async fn launch(config: &Config, root: &Path, download_dir: &Path) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();

        let mut args = vec![
            "--window-size=1920,1080".to_string(),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
        ];
        if config.headless {
            args.push("--headless=new".to_string());
        }
        if config.use_proxy {
            let ext_dir = root.join("extensions");
            write_proxy_extension(&ext_dir, config)?;
            args.push(format!("--load-extension={}", ext_dir.display()));
        }
        caps.add_chrome_option("args", args)?;

        if let Some(binary) = &config.chrome_binary {
            caps.add_chrome_option("binary", binary)?;
        }

        caps.add_chrome_option("excludeSwitches", vec!["enable-automation"])?;
        caps.add_chrome_option(
            "prefs",
            serde_json::json!({
                "profile.default_content_setting_values.notifications": 2,
                "download.default_directory": download_dir.to_string_lossy(),
                "download.prompt_for_download": false,
                "download.directory_upgrade": true,
                "download_restrictions": 0,
                "safebrowsing.enabled": false,
                "safebrowsing.disable_download_protection": true,
            }),
        )?;

        let driver = WebDriver::new(&config.webdriver_url, caps)
            .await
            .context("Failed to connect to ChromeDriver")?;

        Ok(Self {
            driver,
            wait_timeout: Duration::from_secs(config.wait_timeout),
        })
    }

    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.driver
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))
    }

    /// Explicit wait for an element, polling until `timeout` elapses.
    pub async fn wait_for_element(
        &self,
        by: By,
        timeout: Option<Duration>,
    ) -> Result<WebElement> {
        let timeout = timeout.unwrap_or(self.wait_timeout);
        let description = format!("{:?}", by);
        self.driver
            .query(by)
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await
            .with_context(|| {
                format!(
                    "Element {} not found after {} seconds",
                    description,
                    timeout.as_secs()
                )
            })
    }

    /// Quit the session, tolerating a browser that already went away.
    pub async fn quit(self) {
        if let Err(e) = self.driver.quit().await {
            warn!("Error while closing browser: {}", e);
        }
    }
}

/// Generate the MV3 proxy extension (manifest + service worker) used to
/// route traffic through an authenticated HTTP proxy.
pub fn write_proxy_extension(ext_dir: &Path, config: &Config) -> Result<()> {
    let host = config
        .proxy_address
        .as_deref()
        .context("proxy_address is required when use_proxy is set")?;
    let port = config
        .proxy_port
        .context("proxy_port is required when use_proxy is set")?;
    let username = config.proxy_username.as_deref().unwrap_or("");
    let password = config.proxy_password.as_deref().unwrap_or("");

    // Clear stale extension files from a previous run.
    if ext_dir.exists() {
        for entry in fs::read_dir(ext_dir).context("Failed to list extension directory")? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
    }
    fs::create_dir_all(ext_dir).context("Failed to create extension directory")?;

    let manifest = serde_json::json!({
        "version": "1.0.0",
        "manifest_version": 3,
        "name": "Chrome Proxy",
        "permissions": ["proxy", "webRequest", "webRequestAuthProvider"],
        "host_permissions": ["<all_urls>"],
        "background": {"service_worker": "service-worker.js"},
        "minimum_chrome_version": "108"
    });
    fs::write(
        ext_dir.join("manifest.json"),
        serde_json::to_string_pretty(&manifest)?,
    )
    .context("Failed to write extension manifest")?;

    let worker_js = format!(
        r#"var config = {{
    mode: "fixed_servers",
    rules: {{
        singleProxy: {{
            scheme: "http",
            host: "{host}",
            port: {port}
        }},
        bypassList: ["localhost"]
    }}
}};

chrome.proxy.settings.set({{value: config, scope: "regular"}}, function() {{}});

function callbackFn(details) {{
    return {{
        authCredentials: {{
            username: "{username}",
            password: "{password}"
        }}
    }};
}}

chrome.webRequest.onAuthRequired.addListener(
    callbackFn,
    {{urls: ["<all_urls>"]}},
    ['blocking']
);
"#
    );
    fs::write(ext_dir.join("service-worker.js"), worker_js)
        .context("Failed to write extension service worker")?;

    Ok(())
}
