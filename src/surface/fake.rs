//! In-process fake surface for unit and integration tests
//!
//! [`FakeSurfaceFactory`] hands out [`FakeSurface`]s that play a scripted
//! sequence of [`SurfaceEvent`]s instead of rendering anything:
//!
//! - on [`Surface::load_url`] the `on_load` script is played (by default a
//!   single [`SurfaceEvent::Ready`]);
//! - on [`Surface::show`] the `on_show` script is played, each event after
//!   its own delay, measured with the Tokio clock so paused-time tests can
//!   advance it.
//!
//! Every command is recorded in a shared [`FakeSurfaceLog`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use idgate::surface::fake::FakeSurfaceFactory;
//! use idgate::surface::{Surface, SurfaceEvent, SurfaceFactory, SurfaceOptions};
//! use idgate::config::SurfaceSize;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let factory = FakeSurfaceFactory::new().on_show(vec![(
//!     Duration::from_millis(10),
//!     SurfaceEvent::Navigated("http://localhost:3000/cb#id_token=a.b.c".to_string()),
//! )]);
//!
//! let surface = factory
//!     .create(SurfaceOptions::modal("Sign in", SurfaceSize { width: 490, height: 366 }))
//!     .unwrap();
//! let mut events = surface.subscribe();
//! surface.load_url(&url::Url::parse("https://idp.example.com/authorize").unwrap()).await.unwrap();
//! assert_eq!(events.recv().await.unwrap(), SurfaceEvent::Ready);
//!
//! surface.show().unwrap();
//! assert!(matches!(events.recv().await.unwrap(), SurfaceEvent::Navigated(_)));
//!
//! surface.close().unwrap();
//! assert_eq!(factory.log().closed, 1);
//! # }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{IdgateError, Result};
use crate::surface::{Surface, SurfaceEvent, SurfaceFactory, SurfaceOptions};

/// Everything the fake surfaces were asked to do.
#[derive(Debug, Clone, Default)]
pub struct FakeSurfaceLog {
    /// Options of every surface created, in order.
    pub created: Vec<SurfaceOptions>,
    /// URLs passed to `load_url`, in order.
    pub loaded: Vec<Url>,
    /// Number of `show` calls.
    pub shown: usize,
    /// Number of `close` calls.
    pub closed: usize,
}

/// Factory for [`FakeSurface`]s sharing one script and one log.
#[derive(Debug, Clone)]
pub struct FakeSurfaceFactory {
    on_load: Vec<SurfaceEvent>,
    on_show: Vec<(Duration, SurfaceEvent)>,
    fail_create: bool,
    log: Arc<Mutex<FakeSurfaceLog>>,
}

impl Default for FakeSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSurfaceFactory {
    /// A factory whose surfaces become ready on load and then stay idle.
    pub fn new() -> Self {
        Self {
            on_load: vec![SurfaceEvent::Ready],
            on_show: Vec::new(),
            fail_create: false,
            log: Arc::new(Mutex::new(FakeSurfaceLog::default())),
        }
    }

    /// Replaces the events emitted when a URL is loaded.
    pub fn on_load(mut self, events: Vec<SurfaceEvent>) -> Self {
        self.on_load = events;
        self
    }

    /// Replaces the delayed events emitted once the surface is shown.
    pub fn on_show(mut self, events: Vec<(Duration, SurfaceEvent)>) -> Self {
        self.on_show = events;
        self
    }

    /// Makes `create` fail, as a toolkit without a display would.
    pub fn failing(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Snapshot of the recorded commands.
    pub fn log(&self) -> FakeSurfaceLog {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl SurfaceFactory for FakeSurfaceFactory {
    fn create(&self, options: SurfaceOptions) -> Result<Box<dyn Surface>> {
        if self.fail_create {
            return Err(IdgateError::Surface("fake factory configured to fail".to_string()).into());
        }
        record(&self.log, |log| log.created.push(options));

        let (events, _) = broadcast::channel(32);
        Ok(Box::new(FakeSurface {
            events,
            on_load: self.on_load.clone(),
            on_show: self.on_show.clone(),
            player: Mutex::new(None),
            log: Arc::clone(&self.log),
        }))
    }
}

/// A scripted surface; see the module docs.
#[derive(Debug)]
pub struct FakeSurface {
    events: broadcast::Sender<SurfaceEvent>,
    on_load: Vec<SurfaceEvent>,
    on_show: Vec<(Duration, SurfaceEvent)>,
    player: Mutex<Option<JoinHandle<()>>>,
    log: Arc<Mutex<FakeSurfaceLog>>,
}

fn record(log: &Mutex<FakeSurfaceLog>, f: impl FnOnce(&mut FakeSurfaceLog)) {
    if let Ok(mut log) = log.lock() {
        f(&mut log);
    }
}

#[async_trait]
impl Surface for FakeSurface {
    async fn load_url(&self, url: &Url) -> Result<()> {
        record(&self.log, |log| log.loaded.push(url.clone()));
        for event in &self.on_load {
            let _ = self.events.send(event.clone());
        }
        Ok(())
    }

    fn show(&self) -> Result<()> {
        record(&self.log, |log| log.shown += 1);

        let events = self.events.clone();
        let script = self.on_show.clone();
        let handle = tokio::spawn(async move {
            for (delay, event) in script {
                tokio::time::sleep(delay).await;
                let _ = events.send(event);
            }
        });

        if let Ok(mut player) = self.player.lock() {
            if let Some(previous) = player.replace(handle) {
                previous.abort();
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        record(&self.log, |log| log.closed += 1);
        if let Ok(mut player) = self.player.lock() {
            if let Some(handle) = player.take() {
                handle.abort();
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }
}
