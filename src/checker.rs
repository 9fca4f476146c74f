//! Lookup Orchestration
//!
//! Drives one portal page through the fill -> captcha -> submit -> scrape
//! cycle for every input code. Captcha solving retries up to a bounded
//! number of attempts; solved and failed captcha images are archived for
//! later retraining.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use thirtyfour::error::WebDriverError;
use thirtyfour::By;
use tracing::{error, info};

use crate::browser::Browser;
use crate::captcha::CaptchaSolver;
use crate::config::Config;
use crate::portal::{PortalKind, QueryField, WRONG_CAPTCHA_MESSAGE};
use crate::scrape;
use crate::screenshot;
use crate::types::{LookupResult, ResultTable, RunReport};

/// The error paragraph appears quickly after submit; anything longer
/// means the submit went through.
const ERROR_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// The result table renders shortly after a successful submit.
const RESULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TaxLookup {
    browser: Browser,
    solver: CaptchaSolver,
    portal: PortalKind,
    query_field: QueryField,
    root: PathBuf,
    data_dir: PathBuf,
    max_retries: u32,
    max_captcha_attempts: u32,
}

impl TaxLookup {
    pub fn new(
        browser: Browser,
        solver: CaptchaSolver,
        config: &Config,
        root: &Path,
        data_dir: &Path,
    ) -> Self {
        Self {
            browser,
            solver,
            portal: config.portal,
            query_field: config.query_field,
            root: root.to_path_buf(),
            data_dir: data_dir.to_path_buf(),
            max_retries: config.max_retries,
            max_captcha_attempts: config.max_captcha_attempts,
        }
    }

    /// Process every code sequentially. A failed code is logged and
    /// skipped; the run continues with the next one.
    pub async fn process_codes(&mut self, codes: &[String]) -> Result<RunReport> {
        let field = self.portal.form_field(self.query_field)?;

        self.browser.goto(self.portal.url()).await?;
        // Wait for the form before touching anything else.
        self.browser
            .wait_for_element(By::Name(field), None)
            .await
            .context("Lookup form did not load")?;

        let mut results: Vec<(String, ResultTable)> = Vec::new();
        let mut screenshots: Vec<(String, PathBuf)> = Vec::new();
        let total = codes.len();

        for (idx, code) in codes.iter().enumerate() {
            match self.process_code(code).await {
                Ok(result) => {
                    screenshots.push((code.clone(), result.screenshot));
                    results.push((code.clone(), result.table));
                }
                Err(e) => error!("Failed to process {}: {:#}", code, e),
            }
            info!("Processed {}/{} codes", idx + 1, total);
        }

        let table = scrape::merge_tables(&results, self.portal.code_column());
        Ok(RunReport { table, screenshots })
    }

    async fn process_code(&mut self, code: &str) -> Result<LookupResult> {
        let field = self.portal.form_field(self.query_field)?;

        self.fill_field(field, code).await?;
        self.solve_captcha().await?;

        let table = self.wait_for_result(code).await?;
        let screenshot = self.take_screenshot(code).await?;

        Ok(LookupResult {
            code: code.to_string(),
            table,
            screenshot,
        })
    }

    /// Fill a form field, retrying when the element goes stale under us.
    async fn fill_field(&self, name: &'static str, value: &str) -> Result<()> {
        for attempt in 0..self.max_retries {
            let element = self.browser.wait_for_element(By::Name(name), None).await?;

            let filled: Result<(), WebDriverError> = async {
                element.clear().await?;
                element.send_keys(value).await?;
                Ok(())
            }
            .await;

            match filled {
                Ok(()) => return Ok(()),
                Err(WebDriverError::NoSuchElement(_))
                    if attempt + 1 < self.max_retries =>
                {
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to fill field '{}'", name))
                }
            }
        }
        bail!("Field '{}' kept going stale after {} attempts", name, self.max_retries)
    }

    /// Capture, predict and submit the captcha until the portal accepts it.
    async fn solve_captcha(&mut self) -> Result<()> {
        let captcha_dir = self.root.join("captcha");
        fs::create_dir_all(&captcha_dir).context("Failed to create captcha directory")?;

        for attempt in 0..self.max_captcha_attempts {
            match self.captcha_attempt(&captcha_dir, attempt).await {
                Ok(true) => return Ok(()),
                Ok(false) => continue,
                Err(e) => {
                    error!("Captcha attempt {} failed: {:#}", attempt + 1, e);
                }
            }
        }
        bail!(
            "Failed to solve captcha after {} attempts",
            self.max_captcha_attempts
        )
    }

    /// One full captcha round. Returns true when the portal accepted the
    /// answer, false when it asked for a new one.
    async fn captcha_attempt(&mut self, captcha_dir: &Path, attempt: u32) -> Result<bool> {
        let image = self
            .browser
            .wait_for_element(By::XPath(self.portal.captcha_xpath()), None)
            .await?;

        let capfile = captcha_dir.join(format!("captcha_{}.png", attempt));
        let png = image
            .screenshot_as_png()
            .await
            .context("Failed to capture captcha image")?;
        fs::write(&capfile, &png)
            .with_context(|| format!("Failed to save captcha image to {:?}", capfile))?;

        let guess = self.solver.predict(&capfile)?;
        info!("Predicted captcha: {}", guess);

        let input = self.browser.wait_for_element(By::Id("captcha"), None).await?;
        input.clear().await?;
        input.send_keys(guess.as_str()).await?;

        let submit = self
            .browser
            .wait_for_element(By::ClassName("subBtn"), None)
            .await?;
        submit.click().await?;

        match self
            .browser
            .wait_for_element(
                By::XPath(self.portal.error_xpath()),
                Some(ERROR_CHECK_TIMEOUT),
            )
            .await
        {
            Ok(message) => {
                let text = message.text().await.unwrap_or_default();
                if text.trim() == WRONG_CAPTCHA_MESSAGE {
                    archive_captcha(&capfile, captcha_dir, "capcha_error", &guess, true)?;
                    return Ok(false);
                }
                // Some other validation message; re-run the round with a
                // fresh captcha.
                Ok(false)
            }
            // No error message within the window: the submit went through.
            Err(_) => {
                archive_captcha(&capfile, captcha_dir, "capcha_ok", &guess, false)?;
                Ok(true)
            }
        }
    }

    async fn wait_for_result(&self, code: &str) -> Result<ResultTable> {
        let element = self
            .browser
            .wait_for_element(By::ClassName("ta_border"), Some(RESULT_TIMEOUT))
            .await
            .context("Timeout waiting for result table")?;

        let html = element
            .attr("outerHTML")
            .await
            .context("Failed to read result table HTML")?
            .context("Result table has no outerHTML")?;

        let mut table = scrape::parse_result_table(&html)
            .context("Error parsing result table")?;
        scrape::apply_no_result(&mut table, self.portal.code_column(), code);
        Ok(table)
    }

    async fn take_screenshot(&self, code: &str) -> Result<PathBuf> {
        let screenshot_dir = self.data_dir.join("screenshot");
        fs::create_dir_all(&screenshot_dir)
            .context("Failed to create screenshot directory")?;

        let filename = format!("{}_{}.png", code, Local::now().format("%d%m%Y"));
        let dest = screenshot_dir.join(filename);
        screenshot::capture_full_page(self.browser.driver(), &dest).await?;
        Ok(dest)
    }

    pub async fn shutdown(self) {
        self.browser.quit().await;
    }
}

/// Move a predicted captcha image into its archive directory. Failed
/// predictions get a timestamp suffix so retries never collide.
fn archive_captcha(
    capfile: &Path,
    captcha_dir: &Path,
    subdir: &str,
    guess: &str,
    timestamped: bool,
) -> Result<()> {
    let dir = captcha_dir.join(subdir);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create archive directory {:?}", dir))?;

    let filename = if timestamped {
        format!("{}_{}.png", guess, Local::now().format("%Y%m%d_%H%M%S"))
    } else {
        format!("{}.png", guess)
    };

    fs::rename(capfile, dir.join(&filename))
        .with_context(|| format!("Failed to archive captcha image as {}", filename))?;
    Ok(())
}
