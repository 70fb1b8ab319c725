//! # atrium-client: Store Facade for Atrium
//!
//! This crate puts the pure store from `atrium-core` behind a shared handle
//! and connects it to the REST backend.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Client Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   Store (shared handle, cheap clone)             │  │
//! │  │                                                                  │  │
//! │  │  Built once at the application root, passed down by reference   │  │
//! │  │  RwLock<Arc<StoreState>> swapped on every dispatch              │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  ModelFacade   │  │ Domain facades │  │      Transport         │    │
//! │  │                │  │                │  │                        │    │
//! │  │ find / get     │  │ bookings       │  │ HttpTransport (reqwest)│    │
//! │  │ get_one / post │  │ carrots        │  │ or any test double     │    │
//! │  │ patch / count  │  │ metrics        │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │     Clock      │  │  ClientConfig  │                                │
//! │  │ System/Manual  │  │  TOML + env    │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`store`] - The shared `Store` handle and its builder
//! - [`facade`] - Per-model reads and fetches
//! - [`domain`] - Bookings, carrots and metrics endpoints
//! - [`transport`] - REST requests and the reqwest transport
//! - [`clock`] - Time source for freshness
//! - [`config`] - Client configuration
//! - [`error`] - Client error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atrium_client::{ClientConfig, Store};
//! use atrium_core::Filter;
//!
//! let config = ClientConfig::load_or_default(None);
//! let store = Store::from_config(&config)?;
//!
//! let open = Filter::new().where_eq("status", "open");
//! let bookings = store.model("booking").get(Some(&open)).await?;
//! println!("{} open bookings", bookings.len());
//!
//! // Served from cache for the next five minutes.
//! let cached = store.model("booking").find(Some(&open));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod facade;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use domain::{Bookings, Carrots, Metrics};
pub use error::{ClientError, ClientResult};
pub use facade::{GetOneOptions, ModelFacade};
pub use store::{Store, StoreBuilder};
pub use transport::{
    filter_query, resource_path, ApiMethod, ApiRequest, HttpTransport, Transport, TransportConfig,
};
