//! binday - Belfast bin collection date publisher
//!
//! Scrapes the Belfast City Council bin collection lookup through a remote
//! WebDriver session and fans the next collection date out to calendars
//! and notifiers.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration loading and environment overlay
//! - [`session`] - WebDriver wire protocol client with connect retry
//! - [`scraper`] - Council lookup navigation and schedule grid parsing
//! - [`schedule`] - Run schedule grammar and cron rendering
//! - [`integrations`] - Calendar and notifier backends
//! - [`fanout`] - Delivery coordination across backends
//! - [`status`] - Read-only REST API exposing the latest date
//! - [`models`] - Core data structures and types
//!
//! # Example
//!
//! ```no_run
//! use binday::config::Config;
//! use binday::scraper::CollectionScraper;
//! use binday::session::RemoteSession;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let session = RemoteSession::connect("127.0.0.1", 9515).await?;
//!     let scraper_config = config.scraper_config();
//!     let scraper = CollectionScraper::new(&session, &scraper_config);
//!     let result = scraper.scrape(&config.address()).await?;
//!     println!("{result}");
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fanout;
pub mod integrations;
pub mod models;
pub mod schedule;
pub mod scraper;
pub mod session;
pub mod status;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{BindayErrorTrait, Error, ErrorCategory, Result};
    pub use crate::fanout::FanoutCoordinator;
    pub use crate::integrations::IntegrationRegistry;
    pub use crate::models::{Address, CollectionAttributes, CollectionResult};
    pub use crate::schedule::ScheduleSpec;
    pub use crate::scraper::{AddressResolver, CollectionScraper};
    pub use crate::session::RemoteSession;
    pub use crate::status::StatusHandle;
}

// Direct re-exports for convenience
pub use models::{Address, CollectionAttributes, CollectionResult};
