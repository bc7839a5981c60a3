//! Interactive sign-in surfaces
//!
//! A surface is the provider-rendered page the user signs in on: a modal,
//! frameless window in a desktop host, or the system browser when running
//! from the terminal. This module defines the seam between the workflows and
//! whatever toolkit renders it.
//!
//! The [`Surface`] trait has two halves:
//!
//! - command methods: [`load_url`](Surface::load_url),
//!   [`show`](Surface::show), [`close`](Surface::close);
//! - a single subscription: [`subscribe`](Surface::subscribe) yields every
//!   [`SurfaceEvent`] emitted after the call.
//!
//! Implementations live in submodules:
//!
//! - [`loopback::LoopbackSurface`] -- system browser plus a local HTTP relay
//!   that reports navigations back to the process.
//! - [`fake::FakeSurface`] -- in-process fake driven by tests.
//!
//! [`controller::SurfaceController`] builds the sign-in and sign-out URLs and
//! interprets the event stream.

use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use crate::config::SurfaceSize;
use crate::error::Result;

pub mod controller;
pub mod fake;
pub mod loopback;

/// Something that happened on a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The loaded page is ready to be shown.
    Ready,
    /// The surface navigated (or its title changed); carries the resulting URL.
    Navigated(String),
    /// The user closed the surface.
    Closed,
}

/// How a surface should be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub modal: bool,
    pub frameless: bool,
    pub resizable: bool,
    pub always_on_top: bool,
    pub transparent: bool,
}

impl SurfaceOptions {
    /// Modal, frameless, fixed-size, always-on-top options of the given size.
    pub fn modal(title: impl Into<String>, size: SurfaceSize) -> Self {
        Self {
            title: title.into(),
            width: size.width,
            height: size.height,
            modal: true,
            frameless: true,
            resizable: false,
            always_on_top: true,
            transparent: true,
        }
    }
}

/// A single interactive surface instance.
///
/// Surfaces are created hidden. Callers subscribe, load a URL, wait for
/// [`SurfaceEvent::Ready`], then show.
#[async_trait]
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Starts loading `url`. Readiness is reported as [`SurfaceEvent::Ready`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::IdgateError::Surface`] if the surface cannot
    /// start loading.
    async fn load_url(&self, url: &Url) -> Result<()>;

    /// Makes the surface visible.
    fn show(&self) -> Result<()>;

    /// Closes the surface and releases its resources.
    fn close(&self) -> Result<()>;

    /// Subscribes to events emitted from now on.
    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent>;
}

/// Creates hidden surfaces.
pub trait SurfaceFactory: Send + Sync + std::fmt::Debug {
    /// Creates a new, hidden surface.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::IdgateError::Surface`] if the toolkit refuses.
    fn create(&self, options: SurfaceOptions) -> Result<Box<dyn Surface>>;
}
