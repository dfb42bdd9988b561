pub mod window;
pub mod check;
pub mod offer;
pub mod constraints;
pub mod clock;
pub mod observation;
pub mod repository;
pub mod source;

pub use window::{window_key, CandidateWindow, WindowError};
pub use check::{PlannerResult, WindowCheck, WindowCheckUpsert};
pub use offer::{FlightOffer, FlightSegment};
pub use constraints::TripConstraints;
pub use clock::{Clock, FixedClock, SystemClock};
pub use observation::{offer_key, NewPriceObservation, PriceObservation};
pub use repository::{PriceObservationRepository, RepositoryError, WindowCheckRepository};
pub use source::OfferSource;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
