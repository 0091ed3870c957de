//! Postcode lookup against the remote address form

use tracing::{debug, info};

use crate::models::Address;
use crate::session::RemoteSession;

use super::{elements, required, ScrapeError, ScraperConfig};

/// Submits a postcode and reads back the candidate address list
pub struct AddressResolver<'a> {
    session: &'a RemoteSession,
    config: &'a ScraperConfig,
}

impl<'a> AddressResolver<'a> {
    pub fn new(session: &'a RemoteSession, config: &'a ScraperConfig) -> Self {
        Self { session, config }
    }

    /// Look up every address the form offers for a postcode
    ///
    /// The returned order matches the remote option order. Placeholder
    /// options ("Select your address...", blank values) are filtered out; an
    /// empty result means the postcode matched nothing.
    pub async fn lookup(&self, postcode: &str) -> Result<Vec<Address>, ScrapeError> {
        self.submit_postcode(postcode).await?;
        let addresses = self.read_options(postcode).await?;
        info!(
            postcode,
            candidates = addresses.len(),
            "address lookup complete"
        );
        Ok(addresses)
    }

    /// Drive the form up to a populated address list
    ///
    /// Shared with the collection scraper, which continues from the list
    /// instead of reading it back.
    pub(crate) async fn submit_postcode(&self, postcode: &str) -> Result<(), ScrapeError> {
        let session = self.session;
        debug!(url = %self.config.lookup_url, "opening lookup page");
        session.navigate(&self.config.lookup_url).await?;

        let mode = required(
            session.find(elements::SEARCH_BY_POSTCODE).await,
            elements::SEARCH_BY_POSTCODE,
        )?;
        session.click(&mode).await?;

        let textbox = required(
            session
                .wait_for(elements::POSTCODE_TEXTBOX, self.config.element_wait)
                .await,
            elements::POSTCODE_TEXTBOX,
        )?;
        session.send_keys(&textbox, postcode).await?;

        let lookup = required(
            session.find(elements::ADDRESS_LOOKUP_BUTTON).await,
            elements::ADDRESS_LOOKUP_BUTTON,
        )?;
        session.click(&lookup).await?;
        Ok(())
    }

    async fn read_options(&self, postcode: &str) -> Result<Vec<Address>, ScrapeError> {
        let session = self.session;
        let list = required(
            session
                .wait_for(elements::ADDRESS_LIST, self.config.element_wait)
                .await,
            elements::ADDRESS_LIST,
        )?;

        let options = session.find_all_within(&list, "option").await?;
        let mut addresses = Vec::new();
        for option in &options {
            let text = session.text(option).await?;
            let value = session.attribute(option, "value").await?.unwrap_or_default();
            if is_placeholder(&text, &value) {
                continue;
            }
            addresses.push(
                Address::from_postcode(postcode)
                    .with_id(value.trim())
                    .with_text(text.trim()),
            );
        }
        Ok(addresses)
    }
}

/// Filter for list entries that are prompts rather than addresses
fn is_placeholder(text: &str, value: &str) -> bool {
    let text = text.trim();
    text.is_empty() || value.trim().is_empty() || text.to_lowercase().contains("select")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_filtering() {
        assert!(is_placeholder("Select your address...", "0"));
        assert!(is_placeholder("SELECT ADDRESS", "1"));
        assert!(is_placeholder("", "190011390"));
        assert!(is_placeholder("1 Example Street", ""));
        assert!(is_placeholder("   ", "  "));
        assert!(!is_placeholder("1 Example Street, Belfast", "190011390"));
    }
}
