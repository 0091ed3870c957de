//! Collection date scrape state machine
//!
//! One scrape drives the form through three states: postcode submitted,
//! address selected, awaiting a result panel. Exactly one of two panels
//! terminates the wait: the schedule grid (date expected) or the details
//! panel (site-reported diagnostic). Every terminal state maps onto a
//! [`CollectionResult`] variant; only transport faults surface as errors.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::{Address, CollectionResult};
use crate::session::{Element, RemoteSession};

use super::resolver::AddressResolver;
use super::{elements, grid, required, ScrapeError, ScraperConfig, INCORRECT_ADDRESS_MESSAGE};

/// Drives one full scrape for a chosen address
pub struct CollectionScraper<'a> {
    session: &'a RemoteSession,
    config: &'a ScraperConfig,
}

enum ResultPanel {
    Grid(Element),
    Details(Element),
}

impl<'a> CollectionScraper<'a> {
    pub fn new(session: &'a RemoteSession, config: &'a ScraperConfig) -> Self {
        Self { session, config }
    }

    /// Scrape the collection date for the given address
    ///
    /// `Err` means the attempt could not run to completion (transport fault,
    /// missing form element); every in-protocol outcome, including failures
    /// to select the address or interpret the result, is a
    /// [`CollectionResult`] variant.
    pub async fn scrape(&self, address: &Address) -> Result<CollectionResult, ScrapeError> {
        let resolver = AddressResolver::new(self.session, self.config);
        resolver.submit_postcode(&address.postcode).await?;

        if !self.select_address(address).await? {
            warn!(address = %address, "address not present in lookup results");
            return Ok(CollectionResult::InvalidAddress(
                INCORRECT_ADDRESS_MESSAGE.to_string(),
            ));
        }

        let submit = required(
            self.session.find(elements::SELECT_ADDRESS_BUTTON).await,
            elements::SELECT_ADDRESS_BUTTON,
        )?;
        self.session.click(&submit).await?;

        match self.await_result_panel().await? {
            Some(ResultPanel::Grid(panel)) => self.read_grid(&panel).await,
            Some(ResultPanel::Details(panel)) => {
                let message = self.session.text(&panel).await?;
                info!(message = %message, "site reported no schedule data");
                Ok(CollectionResult::NoData(message))
            }
            None => Ok(CollectionResult::Timeout(format!(
                "no result panel within {}s",
                self.config.result_wait.as_secs()
            ))),
        }
    }

    /// Select the option matching the address; false when nothing matches
    ///
    /// An id match is attempted first and is authoritative when the address
    /// carries one; exact option text is the fallback.
    async fn select_address(&self, address: &Address) -> Result<bool, ScrapeError> {
        let session = self.session;
        let list = required(
            session
                .wait_for(elements::ADDRESS_LIST, self.config.element_wait)
                .await,
            elements::ADDRESS_LIST,
        )?;
        let options = session.find_all_within(&list, "option").await?;

        if let Some(id) = address.id.as_deref().filter(|v| !v.trim().is_empty()) {
            for option in &options {
                if session.attribute(option, "value").await?.as_deref() == Some(id) {
                    debug!(id, "selecting address by option value");
                    session.click(option).await?;
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        if let Some(text) = address.text.as_deref().filter(|v| !v.trim().is_empty()) {
            for option in &options {
                if session.text(option).await?.trim() == text.trim() {
                    debug!(text, "selecting address by option text");
                    session.click(option).await?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Bounded wait for whichever result panel the postback produces
    async fn await_result_panel(&self) -> Result<Option<ResultPanel>, ScrapeError> {
        let started = Instant::now();
        loop {
            if let Some(panel) = self.session.try_find(elements::ITEMS_GRID).await? {
                return Ok(Some(ResultPanel::Grid(panel)));
            }
            if let Some(panel) = self.session.try_find(elements::DETAILS_PANEL).await? {
                return Ok(Some(ResultPanel::Details(panel)));
            }
            if started.elapsed() >= self.config.result_wait {
                warn!(
                    waited_secs = self.config.result_wait.as_secs(),
                    "no result panel appeared"
                );
                return Ok(None);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn read_grid(&self, panel: &Element) -> Result<CollectionResult, ScrapeError> {
        let rows = self.session.find_all_within(panel, "tr").await?;
        if rows.len() < 2 {
            return Ok(CollectionResult::ParseFailure(format!(
                "schedule grid has {} rows, expected a header and a schedule row",
                rows.len()
            )));
        }

        let row_text = self.session.text(&rows[1]).await?;
        match grid::extract_date(&row_text) {
            Ok(date) => {
                info!(date = %date, "collection date extracted");
                Ok(CollectionResult::Success(date))
            }
            Err(e) => {
                warn!(row = %row_text, error = %e, "schedule row did not yield a date");
                Ok(CollectionResult::ParseFailure(format!(
                    "{e} (row: '{row_text}')"
                )))
            }
        }
    }
}
