pub mod evaluator;

pub use evaluator::{OfferAssessment, TripEvaluator};
