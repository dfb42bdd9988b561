use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One flown leg. Times carry the local offset of their airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: DateTime<FixedOffset>,
    pub arrival_time: DateTime<FixedOffset>,
}

/// A round-trip offer returned by a price source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOffer {
    pub origin_iata: String,
    pub destination_iata: String,
    pub outbound_segments: Vec<FlightSegment>,
    pub inbound_segments: Vec<FlightSegment>,
    pub price_pln: Option<i32>,
    pub provider: String,
    pub deep_link: String,
}

impl FlightOffer {
    /// Both directions need at least one segment to be evaluated.
    pub fn has_required_segments(&self) -> bool {
        !self.outbound_segments.is_empty() && !self.inbound_segments.is_empty()
    }

    pub fn outbound_stops(&self) -> u32 {
        stops(&self.outbound_segments)
    }

    pub fn inbound_stops(&self) -> u32 {
        stops(&self.inbound_segments)
    }

    pub fn total_stops(&self) -> u32 {
        self.outbound_stops() + self.inbound_stops()
    }

    /// Arrival at the destination.
    pub fn outbound_arrival_time(&self) -> Option<DateTime<FixedOffset>> {
        self.outbound_segments.last().map(|s| s.arrival_time)
    }

    /// Departure from the destination.
    pub fn inbound_departure_time(&self) -> Option<DateTime<FixedOffset>> {
        self.inbound_segments.first().map(|s| s.departure_time)
    }

    /// Arrival back at the origin.
    pub fn inbound_arrival_time(&self) -> Option<DateTime<FixedOffset>> {
        self.inbound_segments.last().map(|s| s.arrival_time)
    }

    pub fn segments(&self) -> impl Iterator<Item = &FlightSegment> {
        self.outbound_segments.iter().chain(self.inbound_segments.iter())
    }
}

fn stops(segments: &[FlightSegment]) -> u32 {
    segments.len().saturating_sub(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(from: &str, to: &str, dep: &str, arr: &str) -> FlightSegment {
        FlightSegment {
            departure_airport: from.to_string(),
            arrival_airport: to.to_string(),
            departure_time: DateTime::parse_from_rfc3339(dep).unwrap(),
            arrival_time: DateTime::parse_from_rfc3339(arr).unwrap(),
        }
    }

    #[test]
    fn test_derived_times_and_stops() {
        let offer = FlightOffer {
            origin_iata: "WAW".to_string(),
            destination_iata: "LIS".to_string(),
            outbound_segments: vec![
                segment("WAW", "FRA", "2026-01-16T08:00:00+01:00", "2026-01-16T10:00:00+01:00"),
                segment("FRA", "LIS", "2026-01-16T11:00:00+01:00", "2026-01-16T13:00:00+00:00"),
            ],
            inbound_segments: vec![segment(
                "LIS",
                "WAW",
                "2026-01-18T14:00:00+00:00",
                "2026-01-18T20:00:00+01:00",
            )],
            price_pln: Some(900),
            provider: "kiwi".to_string(),
            deep_link: "https://example.test/offer".to_string(),
        };

        assert_eq!(offer.outbound_stops(), 1);
        assert_eq!(offer.inbound_stops(), 0);
        assert_eq!(offer.total_stops(), 1);
        assert_eq!(
            offer.outbound_arrival_time().unwrap().to_rfc3339(),
            "2026-01-16T13:00:00+00:00"
        );
        assert_eq!(
            offer.inbound_arrival_time().unwrap().to_rfc3339(),
            "2026-01-18T20:00:00+01:00"
        );
        assert_eq!(offer.segments().count(), 3);
    }

    #[test]
    fn test_empty_directions() {
        let offer = FlightOffer {
            origin_iata: "WAW".to_string(),
            destination_iata: "LIS".to_string(),
            outbound_segments: vec![],
            inbound_segments: vec![],
            price_pln: None,
            provider: "kiwi".to_string(),
            deep_link: String::new(),
        };

        assert!(!offer.has_required_segments());
        assert!(offer.outbound_arrival_time().is_none());
        assert!(offer.inbound_arrival_time().is_none());
        assert_eq!(offer.total_stops(), 0);
    }
}
