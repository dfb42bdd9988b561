use chrono::{DateTime, Datelike, Duration, FixedOffset, Weekday};
use serde::Serialize;
use tracing::debug;
use weekender_core::{FlightOffer, FlightSegment, TripConstraints};

/// Per-offer verdict produced by [`TripEvaluator::assess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferAssessment {
    pub full_days_on_site: u32,
    pub saturday_full: bool,
    pub meets_hard_constraints: bool,
    pub total_stops: u32,
    pub price_pln: Option<i32>,
}

impl OfferAssessment {
    /// Within the hard limits and matching the full-weekend shape.
    pub fn is_acceptable(&self) -> bool {
        self.meets_hard_constraints && self.saturday_full
    }
}

/// Trip shape and hard-limit rules for round-trip offers.
///
/// Every check is total: a missing offer, missing constraints or an offer
/// without segments in either direction yields `0` or `false`.
/// Dates are compared in the destination zone, taken from the offset of the
/// outbound arrival.
#[derive(Debug, Clone, Copy, Default)]
pub struct TripEvaluator;

impl TripEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Calendar days at the destination with no flight on them.
    pub fn full_days_on_site<'a>(&self, offer: impl Into<Option<&'a FlightOffer>>) -> u32 {
        let Some((arrival, departure)) = offer.into().and_then(stay) else {
            return 0;
        };

        let first_full_day = arrival.date_naive() + Duration::days(1);
        let departure_date = departure.date_naive();

        if departure_date > first_full_day {
            (departure_date - first_full_day).num_days() as u32
        } else {
            0
        }
    }

    /// Friday arrival no later than the configured time, Sunday departure no
    /// earlier than the configured time, and optionally nothing flown on
    /// Saturday.
    pub fn is_saturday_full<'a, 'b>(
        &self,
        offer: impl Into<Option<&'a FlightOffer>>,
        constraints: impl Into<Option<&'b TripConstraints>>,
    ) -> bool {
        let (Some(offer), Some(constraints)) = (offer.into(), constraints.into()) else {
            return false;
        };
        let Some((arrival, departure)) = stay(offer) else {
            return false;
        };
        let zone = *arrival.offset();

        let arrives_friday = arrival.weekday() == Weekday::Fri
            && arrival.time() <= constraints.latest_arrival_on_friday_local;
        if !arrives_friday {
            debug!(
                "Outbound arrival {} misses Friday {} cutoff",
                arrival, constraints.latest_arrival_on_friday_local
            );
            return false;
        }

        let leaves_sunday = departure.weekday() == Weekday::Sun
            && departure.time() >= constraints.earliest_departure_on_sunday_local;
        if !leaves_sunday {
            debug!(
                "Inbound departure {} misses Sunday {} start",
                departure, constraints.earliest_departure_on_sunday_local
            );
            return false;
        }

        if constraints.require_no_flight_on_saturday {
            if let Some(segment) = offer
                .segments()
                .find(|segment| touches_saturday(segment, &zone))
            {
                debug!(
                    "Segment {}-{} flies on Saturday",
                    segment.departure_airport, segment.arrival_airport
                );
                return false;
            }
        }

        true
    }

    pub fn meets_hard_constraints<'a, 'b>(
        &self,
        offer: impl Into<Option<&'a FlightOffer>>,
        constraints: impl Into<Option<&'b TripConstraints>>,
    ) -> bool {
        let (Some(offer), Some(constraints)) = (offer.into(), constraints.into()) else {
            return false;
        };
        if !offer.has_required_segments() {
            return false;
        }
        let Some(price) = offer.price_pln else {
            return false;
        };

        if offer.outbound_stops() > constraints.max_stops
            || offer.inbound_stops() > constraints.max_stops
        {
            debug!(
                "Too many stops: out={}, in={}, max={}",
                offer.outbound_stops(),
                offer.inbound_stops(),
                constraints.max_stops
            );
            return false;
        }

        let max_minutes = i64::from(constraints.max_total_duration_minutes_one_way);
        let too_long = [&offer.outbound_segments, &offer.inbound_segments]
            .into_iter()
            .filter_map(|segments| duration_minutes(segments))
            .any(|minutes| minutes > max_minutes);
        if too_long {
            debug!("One-way duration exceeds {} minutes", max_minutes);
            return false;
        }

        match constraints.hard_cap_price_pln {
            Some(cap) if price > cap => {
                debug!("Price {} PLN over cap {} PLN", price, cap);
                false
            }
            _ => true,
        }
    }

    pub fn assess<'a, 'b>(
        &self,
        offer: impl Into<Option<&'a FlightOffer>>,
        constraints: impl Into<Option<&'b TripConstraints>>,
    ) -> OfferAssessment {
        let offer = offer.into();
        let constraints = constraints.into();

        OfferAssessment {
            full_days_on_site: self.full_days_on_site(offer),
            saturday_full: self.is_saturday_full(offer, constraints),
            meets_hard_constraints: self.meets_hard_constraints(offer, constraints),
            total_stops: offer.map_or(0, FlightOffer::total_stops),
            price_pln: offer.and_then(|o| o.price_pln),
        }
    }
}

/// Outbound arrival and inbound departure, both in the destination zone.
fn stay(offer: &FlightOffer) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let arrival = offer.outbound_arrival_time()?;
    let departure = offer.inbound_departure_time()?;
    Some((arrival, departure.with_timezone(arrival.offset())))
}

fn touches_saturday(segment: &FlightSegment, zone: &FixedOffset) -> bool {
    [segment.departure_time, segment.arrival_time]
        .iter()
        .any(|time| time.with_timezone(zone).weekday() == Weekday::Sat)
}

fn duration_minutes(segments: &[FlightSegment]) -> Option<i64> {
    let first = segments.first()?;
    let last = segments.last()?;
    Some((last.arrival_time - first.departure_time).num_minutes())
}
