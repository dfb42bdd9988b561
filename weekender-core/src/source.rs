use async_trait::async_trait;

use crate::offer::FlightOffer;
use crate::window::CandidateWindow;

/// A price source that can be queried for one travel window.
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// Provider name, as used for recheck history and budgets.
    fn provider(&self) -> &str;

    /// Round-trip offers for the window; an empty list is a valid answer.
    async fn search(
        &self,
        window: &CandidateWindow,
    ) -> Result<Vec<FlightOffer>, Box<dyn std::error::Error + Send + Sync>>;
}
