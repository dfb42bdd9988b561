pub mod generator;
pub mod planner;

pub use generator::TripWindowGenerator;
pub use planner::{PlannerError, WindowCheckPlanner};
