use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Non-negotiable limits and the full-weekend shape an offer must match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripConstraints {
    /// Per direction; 0 means direct flights only.
    pub max_stops: u32,
    pub max_total_duration_minutes_one_way: u32,
    /// `None` means no price cap.
    pub hard_cap_price_pln: Option<i32>,
    /// Destination-local, inclusive.
    pub latest_arrival_on_friday_local: NaiveTime,
    /// Destination-local, inclusive.
    pub earliest_departure_on_sunday_local: NaiveTime,
    pub require_no_flight_on_saturday: bool,
}

impl TripConstraints {
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_total_duration_minutes_one_way == 0 {
            return Err(CoreError::ValidationError(
                "max_total_duration_minutes_one_way must be positive".to_string(),
            ));
        }
        if let Some(cap) = self.hard_cap_price_pln {
            if cap < 0 {
                return Err(CoreError::ValidationError(format!(
                    "hard_cap_price_pln must not be negative, got {}",
                    cap
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints() -> TripConstraints {
        TripConstraints {
            max_stops: 1,
            max_total_duration_minutes_one_way: 480,
            hard_cap_price_pln: Some(2000),
            latest_arrival_on_friday_local: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            earliest_departure_on_sunday_local: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            require_no_flight_on_saturday: true,
        }
    }

    #[test]
    fn test_validate() {
        assert!(constraints().validate().is_ok());

        let mut zero_duration = constraints();
        zero_duration.max_total_duration_minutes_one_way = 0;
        assert!(zero_duration.validate().is_err());

        let mut negative_cap = constraints();
        negative_cap.hard_cap_price_pln = Some(-1);
        assert!(negative_cap.validate().is_err());

        let mut no_cap = constraints();
        no_cap.hard_cap_price_pln = None;
        assert!(no_cap.validate().is_ok());
    }
}
