//! System-browser surface with a loopback relay
//!
//! A terminal has no embedded web view, so the sign-in page is opened in the
//! user's browser instead. The provider's redirect URI points at a small
//! HTTP server bound on the loopback address; the page it serves posts the
//! browser's full location (fragment included, which never reaches a
//! server otherwise) back to the process, where it becomes a
//! [`SurfaceEvent::Navigated`].
//!
//! ```text
//! browser ── GET /any/path#id_token=... ──▶ relay page
//! relay page ── POST /__idgate/navigated (location.href) ──▶ Navigated(url)
//! ```
//!
//! Ctrl-C while the surface is shown is reported as [`SurfaceEvent::Closed`].

use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::post;
use axum::Router;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{IdgateError, Result};
use crate::surface::{Surface, SurfaceEvent, SurfaceFactory, SurfaceOptions};

/// Path the relay page posts navigations to.
pub const NAVIGATED_PATH: &str = "/__idgate/navigated";

const RELAY_PAGE: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>idgate</title></head>
  <body>
    <p id="status">Completing sign-in&hellip;</p>
    <script>
      fetch("/__idgate/navigated", { method: "POST", body: window.location.href })
        .then(function () {
          document.getElementById("status").textContent =
            "Done. You can close this window and return to the terminal.";
        });
    </script>
  </body>
</html>
"#;

/// Creates [`LoopbackSurface`]s bound on one address.
#[derive(Debug, Clone)]
pub struct LoopbackSurfaceFactory {
    addr: SocketAddr,
    open_browser: bool,
}

impl LoopbackSurfaceFactory {
    /// `addr` must match the host and port of the configured redirect URIs.
    pub fn new(addr: SocketAddr, open_browser: bool) -> Self {
        Self { addr, open_browser }
    }
}

impl SurfaceFactory for LoopbackSurfaceFactory {
    fn create(&self, options: SurfaceOptions) -> Result<Box<dyn Surface>> {
        Ok(Box::new(LoopbackSurface::new(
            options,
            self.addr,
            self.open_browser,
        )))
    }
}

#[derive(Debug, Default)]
struct Running {
    target: Option<Url>,
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    interrupt: Option<JoinHandle<()>>,
}

/// A browser tab plus the relay server that observes it.
#[derive(Debug)]
pub struct LoopbackSurface {
    options: SurfaceOptions,
    addr: SocketAddr,
    open_browser: bool,
    events: broadcast::Sender<SurfaceEvent>,
    running: Mutex<Running>,
}

impl LoopbackSurface {
    pub fn new(options: SurfaceOptions, addr: SocketAddr, open_browser: bool) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            options,
            addr,
            open_browser,
            events,
            running: Mutex::new(Running::default()),
        }
    }

    /// Address the relay actually bound, once loading has started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().ok().and_then(|running| running.local_addr)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Running>> {
        self.running
            .lock()
            .map_err(|_| IdgateError::Surface("loopback surface state poisoned".to_string()).into())
    }
}

#[async_trait]
impl Surface for LoopbackSurface {
    async fn load_url(&self, url: &Url) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await.map_err(|e| {
            IdgateError::Surface(format!(
                "failed to bind redirect relay on {}: {e}. Is another process using the port?",
                self.addr
            ))
        })?;
        let local_addr = listener.local_addr()?;

        let app = Router::new()
            .route(NAVIGATED_PATH, post(navigated))
            .fallback(relay_page)
            .with_state(self.events.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::warn!("Redirect relay stopped with error: {e}");
            }
        });

        {
            let mut running = self.lock()?;
            running.target = Some(url.clone());
            running.local_addr = Some(local_addr);
            if let Some(previous) = running.shutdown.replace(shutdown_tx) {
                let _ = previous.send(());
            }
        }

        tracing::debug!(
            "'{}' relay listening on http://{local_addr}",
            self.options.title
        );
        let _ = self.events.send(SurfaceEvent::Ready);
        Ok(())
    }

    fn show(&self) -> Result<()> {
        let mut running = self.lock()?;
        let target = running
            .target
            .clone()
            .ok_or_else(|| IdgateError::Surface("show called before load_url".to_string()))?;

        eprintln!("{}: open this URL in your browser if it did not open:", self.options.title);
        eprintln!("  {target}");
        if self.open_browser {
            try_open_browser(target.as_str());
        }

        let events = self.events.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = events.send(SurfaceEvent::Closed);
            }
        });
        if let Some(previous) = running.interrupt.replace(interrupt) {
            previous.abort();
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut running = self.lock()?;
        if let Some(shutdown) = running.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(interrupt) = running.interrupt.take() {
            interrupt.abort();
        }
        running.target = None;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }
}

async fn navigated(
    State(events): State<broadcast::Sender<SurfaceEvent>>,
    body: String,
) -> StatusCode {
    let url = body.trim().to_string();
    if url.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    let _ = events.send(SurfaceEvent::Navigated(url));
    StatusCode::NO_CONTENT
}

async fn relay_page() -> Html<&'static str> {
    Html(RELAY_PAGE)
}

/// Best-effort launch of the system browser.
fn try_open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let spawned = std::process::Command::new("open").arg(url).spawn();
    #[cfg(target_os = "linux")]
    let spawned = std::process::Command::new("xdg-open").arg(url).spawn();
    #[cfg(target_os = "windows")]
    let spawned = std::process::Command::new("cmd")
        .args(["/C", "start", "", url])
        .spawn();
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    let spawned: std::io::Result<std::process::Child> = Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "no known browser launcher",
    ));

    if let Err(e) = spawned {
        tracing::warn!("Could not open browser: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_page_posts_to_navigated_path() {
        assert!(RELAY_PAGE.contains(NAVIGATED_PATH));
        assert!(RELAY_PAGE.contains("window.location.href"));
    }

    #[test]
    fn test_show_before_load_fails() {
        let surface = LoopbackSurface::new(
            SurfaceOptions::modal(
                "Sign in",
                crate::config::SurfaceSize {
                    width: 1,
                    height: 1,
                },
            ),
            "127.0.0.1:0".parse().unwrap(),
            false,
        );
        assert!(surface.show().is_err());
        assert!(surface.local_addr().is_none());
    }

    // Served-page and relay scenarios live in tests/loopback_surface_test.rs
}
