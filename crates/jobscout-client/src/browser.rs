use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use jobscout_core::error::AppError;
use jobscout_core::site::SiteProfile;
use jobscout_core::traits::{PageDriver, ReadyProbe, Readiness};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{BrowserSettings, Credentials};
use crate::{script, wait};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);
const EVALUATE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_MODAL_WAIT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const SCROLL_PAUSE: Duration = Duration::from_millis(500);
const CHALLENGE_TIMEOUT: Duration = Duration::from_secs(300);

fn browser_err(context: &str) -> impl Fn(chromiumoxide::error::CdpError) -> AppError + '_ {
    move |e| AppError::BrowserError(format!("{context}: {e}"))
}

/// One Chromium process with one reused tab, driven over CDP.
///
/// Owned by a single pipeline run. Call [`BrowserSession::close`] on every
/// exit path; dropping the session only kills the process.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch the browser with a persistent profile and open the working tab.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&settings.user_data_dir)
            .await
            .map_err(|e| {
                AppError::ConfigError(format!(
                    "Cannot create browser profile dir {}: {e}",
                    settings.user_data_dir.display()
                ))
            })?;

        let mut builder = BrowserConfig::builder()
            .disable_default_args()
            .user_data_dir(&settings.user_data_dir);
        if !settings.headless {
            builder = builder.with_head();
        }
        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(bin) = settings.executable_path.clone().or_else(find_chrome_binary) {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        if settings.headless {
            builder = builder.arg("--headless=new");
        }
        if settings.disable_gpu {
            builder = builder.arg("--disable-gpu");
        }
        if settings.disable_images {
            builder = builder.arg("--blink-settings=imagesEnabled=false");
        }
        if settings.disable_extensions {
            builder = builder.arg("--disable-extensions");
        }
        let config = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--window-size=1366,900")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(browser_err("Failed to launch browser"))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_err("Failed to open tab"))?;

        tracing::info!(headless = settings.headless, "Browser session started");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Make sure the session is signed in, logging in if needed.
    ///
    /// A verification challenge is handed to the operator when a terminal
    /// is attached; otherwise it fails with [`AppError::AuthChallenge`].
    pub async fn login(
        &self,
        credentials: &Credentials,
        profile: &SiteProfile,
    ) -> Result<(), AppError> {
        self.goto(&profile.login_url()).await?;
        match self.wait_ready(&profile.login_probe()).await? {
            Readiness::Content => {
                tracing::info!("Session already authenticated");
                return Ok(());
            }
            Readiness::Challenge => return self.resolve_challenge(profile).await,
            Readiness::LoginRequired => {}
            Readiness::ErrorSurface | Readiness::TimedOut => {
                return Err(AppError::AuthFailed("login page did not render".into()));
            }
        }

        let login = &profile.login;
        self.type_into(&login.username, &credentials.email).await?;
        self.type_into(&login.password, &credentials.password).await?;
        self.page
            .find_element(login.submit.as_str())
            .await
            .map_err(browser_err("Login submit button not found"))?
            .click()
            .await
            .map_err(browser_err("Failed to submit login"))?;

        match self.wait_ready(&profile.login_result_probe()).await? {
            Readiness::Content => {
                tracing::info!("Logged in");
                Ok(())
            }
            Readiness::Challenge => self.resolve_challenge(profile).await,
            Readiness::ErrorSurface => Err(AppError::AuthFailed("credentials rejected".into())),
            Readiness::LoginRequired | Readiness::TimedOut => {
                Err(AppError::AuthFailed("login did not complete".into()))
            }
        }
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), AppError> {
        self.evaluate(&script::clear_input(selector)).await?;
        self.page
            .find_element(selector)
            .await
            .map_err(browser_err("Login field not found"))?
            .click()
            .await
            .map_err(browser_err("Failed to focus login field"))?
            .type_str(text)
            .await
            .map_err(browser_err("Failed to type into login field"))?;
        Ok(())
    }

    async fn resolve_challenge(&self, profile: &SiteProfile) -> Result<(), AppError> {
        if !std::io::stdin().is_terminal() {
            return Err(AppError::AuthChallenge(
                "verification required and no terminal is attached".into(),
            ));
        }

        tracing::warn!("Login verification required");
        eprintln!(
            "\nVerification required: complete the challenge in the browser window, then press Enter."
        );
        wait::operator_confirmation(CHALLENGE_TIMEOUT).await?;

        match self.wait_ready(&profile.login_result_probe()).await? {
            Readiness::Content => {
                tracing::info!("Verification completed");
                Ok(())
            }
            other => Err(AppError::AuthChallenge(format!(
                "still not signed in after verification ({other:?})"
            ))),
        }
    }

    /// Tear down the browser process and its CDP handler.
    pub async fn close(mut self) -> Result<(), AppError> {
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(browser_err("Failed to close browser"));
        if let Err(e) = self.browser.wait().await {
            tracing::warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler.abort();
        tracing::info!("Browser session closed");
        result
    }

    async fn is_present(&self, selectors: &[String]) -> bool {
        matches!(
            self.evaluate(&script::any_present(selectors)).await,
            Ok(serde_json::Value::Bool(true))
        )
    }

    fn chrome_candidates() -> &'static [&'static str] {
        &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ]
    }
}

/// First installed Chrome/Chromium binary, if any.
///
/// The snap wrapper at `/snap/bin/chromium` strips unknown flags and breaks
/// headless mode, so the real binary inside the snap is preferred. `None`
/// lets `chromiumoxide` do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    BrowserSession::chrome_candidates()
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str) -> Result<(), AppError> {
        match tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::BrowserError(format!("Failed to navigate to {url}: {e}"))),
            Err(_) => Err(AppError::NavigationTimeout {
                url: url.to_string(),
                secs: NAVIGATION_TIMEOUT.as_secs(),
            }),
        }
    }

    async fn wait_ready(&self, probe: &ReadyProbe) -> Result<Readiness, AppError> {
        let js = script::readiness(probe);
        Ok(wait::poll_readiness(probe, || self.evaluate(&js)).await)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AppError> {
        match tokio::time::timeout(EVALUATE_TIMEOUT, self.page.evaluate(script.to_string())).await
        {
            Ok(Ok(result)) => Ok(result.value().cloned().unwrap_or(serde_json::Value::Null)),
            Ok(Err(e)) => Err(AppError::BrowserError(format!("Script evaluation failed: {e}"))),
            Err(_) => Err(AppError::Timeout(EVALUATE_TIMEOUT.as_secs())),
        }
    }

    async fn content(&self) -> Result<String, AppError> {
        self.page
            .content()
            .await
            .map_err(browser_err("Failed to read page content"))
    }

    async fn expand_all(&self, selectors: &[String]) -> Result<usize, AppError> {
        let clicked = self.evaluate(&script::click_all(selectors)).await?;
        Ok(clicked.as_u64().unwrap_or(0) as usize)
    }

    async fn scroll_through(&self) -> Result<(), AppError> {
        self.evaluate(script::SCROLL_TO_BOTTOM).await?;
        tokio::time::sleep(SCROLL_PAUSE).await;
        self.evaluate(script::SCROLL_TO_TOP).await?;
        Ok(())
    }

    async fn open_modal(
        &self,
        openers: &[String],
        modal: &[String],
        timeout: Duration,
    ) -> Result<bool, AppError> {
        let clicked = self.evaluate(&script::click_first(openers)).await?;
        if clicked != serde_json::Value::Bool(true) {
            return Ok(false);
        }

        let deadline = Instant::now() + timeout.min(MAX_MODAL_WAIT);
        loop {
            if self.is_present(modal).await {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
