//! Municipal lookup-site scraping
//!
//! Drives the address lookup form and the schedule result page through a
//! [`RemoteSession`]. The element identifiers below are the only contract the
//! remote site offers; everything read from it is treated as hostile input.

pub mod collector;
pub mod grid;
pub mod resolver;

pub use collector::CollectionScraper;
pub use resolver::AddressResolver;

use std::time::Duration;

use thiserror::Error;

use crate::session::{Element, SessionError};

/// Default address lookup page
pub const DEFAULT_LOOKUP_URL: &str =
    "https://dof.belfastcity.gov.uk/BinCollectionSchedulesV2/addressLookup.aspx";

/// Fixed element ids on the lookup form and result page
pub mod elements {
    /// Label toggling the form into postcode search mode
    pub const SEARCH_BY_POSTCODE: &str = "label[for='searchBy_radio_1']";
    pub const POSTCODE_TEXTBOX: &str = "#Postcode_textbox";
    pub const ADDRESS_LOOKUP_BUTTON: &str = "#AddressLookup_button";
    pub const ADDRESS_LIST: &str = "#lstAddresses";
    pub const SELECT_ADDRESS_BUTTON: &str = "#SelectAddress_button";
    /// Result panel holding the schedule grid (success path)
    pub const ITEMS_GRID: &str = "#ItemsGrid";
    /// Result panel holding a diagnostic message (no-data path)
    pub const DETAILS_PANEL: &str = "#BinDetailsPnl";
}

/// Message surfaced when the configured address cannot be selected
pub const INCORRECT_ADDRESS_MESSAGE: &str = "The Address Is Incorrect!";

/// Tunables for driving the lookup site
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Address lookup page URL
    pub lookup_url: String,
    /// How long to wait for form elements to appear after navigation
    pub element_wait: Duration,
    /// How long to wait for one of the two result panels
    pub result_wait: Duration,
    /// Poll interval while waiting for a result panel
    pub poll_interval: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            element_wait: Duration::from_secs(10),
            result_wait: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Faults that prevent a scrape attempt from producing any outcome
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport or protocol failure in the remote session
    #[error("session: {0}")]
    Session(#[from] SessionError),

    /// The lookup page is missing an element the flow depends on
    #[error("lookup page element missing: {element}")]
    MissingElement { element: String },
}

impl ScrapeError {
    pub fn missing(element: &str) -> Self {
        Self::MissingElement {
            element: element.to_string(),
        }
    }
}

/// Resolve a lookup for an element the flow cannot proceed without
///
/// Absence and wait-timeout both mean the page did not present the expected
/// form, which the caller reports as a lookup failure rather than a
/// transport fault.
pub(crate) fn required(
    result: Result<Element, SessionError>,
    element: &str,
) -> Result<Element, ScrapeError> {
    match result {
        Ok(found) => Ok(found),
        Err(SessionError::NoSuchElement { .. }) | Err(SessionError::WaitTimeout { .. }) => {
            Err(ScrapeError::missing(element))
        }
        Err(other) => Err(ScrapeError::Session(other)),
    }
}
