use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adwatch_core::traits::Extractor;
use adwatch_core::{AppError, FailureKind, FetchOutcome, Listing};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;

use crate::listing::ListingParser;

/// Headless-Chromium extractor for classified-ad pages.
///
/// Listing sites render price blocks with JavaScript, so a plain HTTP GET
/// returns a shell page; this extractor drives a real browser over the
/// Chrome DevTools Protocol instead. One Chromium process is shared across
/// all clones; each fetch opens a tab, waits for the body to render, grabs
/// the DOM and closes the tab.
#[derive(Clone)]
pub struct BrowserExtractor {
    browser: Arc<Browser>,
    parser: ListingParser,
}

impl BrowserExtractor {
    /// Launch a headless Chromium with the default listing selectors.
    pub async fn launch() -> Result<Self, AppError> {
        Self::with_parser(ListingParser::new()?).await
    }

    /// Launch a headless Chromium using the given field parser.
    pub async fn with_parser(parser: ListingParser) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        if let Some(bin) = chrome_binary() {
            tracing::info!(path = %bin.display(), "using chrome binary");
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::Config(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::Generic(format!("failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection
        // to stay alive.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!(?event, "browser connection lost");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            parser,
        })
    }

    /// Navigate to the page and return its fully rendered DOM.
    async fn capture(&self, url: &str) -> Result<String, AppError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| AppError::Generic(format!("navigating to {url}: {e}")))?;

        // Wait for <body>: the minimal signal that the page rendered.
        page.find_element("body")
            .await
            .map_err(|e| AppError::Generic(format!("page did not render body: {e}")))?;

        let html = page
            .content()
            .await
            .map_err(|e| AppError::Generic(format!("reading page content: {e}")))?;

        // Free the tab; a failure here leaks one tab, not the fetch.
        let _ = page.close().await;

        Ok(html)
    }
}

impl Extractor for BrowserExtractor {
    async fn fetch(&self, url: &str, deadline: Duration) -> FetchOutcome {
        let html = match tokio::time::timeout(deadline, self.capture(url)).await {
            Err(_) => {
                return FetchOutcome::Failure {
                    url: url.to_string(),
                    kind: FailureKind::Generic(format!(
                        "deadline of {}s exceeded",
                        deadline.as_secs()
                    )),
                };
            }
            Ok(Err(err)) => {
                tracing::debug!(%url, %err, "page capture failed");
                return FetchOutcome::Failure {
                    url: url.to_string(),
                    kind: FailureKind::TargetUnavailable { raw_html: None },
                };
            }
            Ok(Ok(html)) => html,
        };

        match self.parser.parse(&html) {
            Ok((title, price)) => FetchOutcome::Success(Listing {
                url: url.to_string(),
                title,
                price,
            }),
            Err(err) => {
                // Expected fields absent: keep the capture so the markup
                // drift can be inspected offline.
                tracing::debug!(%url, %err, "field extraction failed");
                FetchOutcome::Failure {
                    url: url.to_string(),
                    kind: FailureKind::TargetUnavailable {
                        raw_html: Some(html),
                    },
                }
            }
        }
    }
}

/// Locate a usable Chrome/Chromium binary.
///
/// Snap's chromium wrapper strips unknown CLI flags and breaks headless
/// mode, so the real binary inside the snap is preferred over whatever is
/// on `$PATH`. `CHROME_BIN` overrides the lookup entirely; returning `None`
/// leaves discovery to chromiumoxide.
fn chrome_binary() -> Option<PathBuf> {
    if let Ok(overridden) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&overridden);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(%overridden, "CHROME_BIN does not exist, falling back to lookup");
    }

    [
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}
