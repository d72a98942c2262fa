/// Smoke-test for `BrowserSession`.
///
/// Launches Chromium with the configured profile, signs in with
/// `LINKEDIN_EMAIL` / `LINKEDIN_PASSWORD`, opens one search page and prints
/// how it settled and how many posting links it shows.
///
/// Run with:
///   cargo run -p jobscout-client --example login_smoke --features browser
use jobscout_client::{BrowserSession, BrowserSettings, Credentials, DomExtractor};
use jobscout_core::site::SiteProfile;
use jobscout_core::traits::{PageDriver, PageExtractor};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = BrowserSettings::from_env()?;
    let credentials = Credentials::from_env()?;
    let profile = Arc::new(SiteProfile::default());

    println!("Launching browser (headless: {})", settings.headless);
    let session = BrowserSession::launch(&settings).await?;

    let outcome = async {
        session.login(&credentials, &profile).await?;

        let url = profile.search_url("rust developer", "Denmark", 0)?;
        println!("Opening {url}");
        session.goto(&url).await?;
        let readiness = session.wait_ready(&profile.search_probe()).await?;
        let html = session.content().await?;
        let links = DomExtractor::new(profile.clone()).search_results(&html);

        println!("Search page settled as {readiness:?} with {} posting links", links.len());
        for link in links.iter().take(5) {
            println!("  {link}");
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    session.close().await?;
    outcome
}
