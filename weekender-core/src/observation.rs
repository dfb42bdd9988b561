use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::offer::FlightOffer;
use crate::window::CandidateWindow;

/// One recorded price for one itinerary, as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub id: i64,
    pub observed_at: DateTime<Utc>,
    pub provider: String,
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: NaiveDate,
    pub full_days: i16,
    /// First day of the departure month.
    pub departure_month: NaiveDate,
    pub window_key: String,
    pub offer_key: String,
    pub price_pln: i32,
}

/// Insert command for [`PriceObservation`]. Observations are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPriceObservation {
    pub observed_at: DateTime<Utc>,
    pub provider: String,
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: NaiveDate,
    pub full_days: i16,
    pub departure_month: NaiveDate,
    pub window_key: String,
    pub offer_key: String,
    pub price_pln: i32,
}

impl NewPriceObservation {
    /// `None` when the offer carries no price.
    pub fn from_offer(
        provider: &str,
        window: &CandidateWindow,
        offer: &FlightOffer,
        observed_at: DateTime<Utc>,
    ) -> Option<Self> {
        let price_pln = offer.price_pln?;
        let depart_date = window.depart_date();
        let departure_month = NaiveDate::from_ymd_opt(depart_date.year(), depart_date.month(), 1)?;

        Some(Self {
            observed_at,
            provider: provider.to_string(),
            origin: window.origin().to_string(),
            destination: window.destination().to_string(),
            depart_date,
            return_date: window.return_date(),
            full_days: i16::try_from(window.full_days()).unwrap_or(i16::MAX),
            departure_month,
            window_key: window.window_key().to_string(),
            offer_key: offer_key(provider, offer),
            price_pln,
        })
    }
}

/// Identity of an itinerary at a provider: every leg with its departure time.
///
/// `kiwi:WAW-LIS@2026-01-16T16:00+00:00|LIS-WAW@2026-01-18T16:00+00:00`
pub fn offer_key(provider: &str, offer: &FlightOffer) -> String {
    let legs: Vec<String> = offer
        .segments()
        .map(|segment| {
            format!(
                "{}-{}@{}",
                segment.departure_airport,
                segment.arrival_airport,
                segment.departure_time.format("%Y-%m-%dT%H:%M%:z")
            )
        })
        .collect();
    format!("{}:{}", provider, legs.join("|"))
}
