use chrono::NaiveTime;
use chrono_tz::Tz;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::Deserialize;
use std::env;
use weekender_core::TripConstraints;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub timezone: String,
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
    pub search: SearchConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    pub saturday_rule: SaturdayRuleConfig,
    pub constraints: ConstraintsConfig,
    pub scan: ScanConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub horizon_days: i64,
    pub full_days_allowed: Vec<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlannerConfig {
    #[serde(default = "default_per_slot")]
    pub max_windows_per_destination_per_depart_date: usize,
    #[serde(default = "default_global")]
    pub max_windows_global: usize,
    #[serde(default = "default_recheck_hours")]
    pub min_recheck_interval_hours: u32,
    #[serde(default = "default_budget")]
    pub daily_budget_per_provider: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_windows_per_destination_per_depart_date: default_per_slot(),
            max_windows_global: default_global(),
            min_recheck_interval_hours: default_recheck_hours(),
            daily_budget_per_provider: default_budget(),
        }
    }
}

fn default_per_slot() -> usize { 3 }
fn default_global() -> usize { 500 }
fn default_recheck_hours() -> u32 { 12 }
fn default_budget() -> usize { 100 }

#[derive(Debug, Deserialize, Clone)]
pub struct SaturdayRuleConfig {
    #[serde(default = "default_true")]
    pub require_no_flight_on_saturday: bool,
    pub latest_arrival_on_friday_local: String, // HH:MM
    pub earliest_departure_on_sunday_local: String, // HH:MM
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConstraintsConfig {
    pub max_stops: u32,
    pub max_total_duration_minutes_one_way: u32,
    pub hard_cap_price_pln: Option<i32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    pub providers: Vec<String>,
    #[serde(default = "default_run_at")]
    pub run_at_local: String, // HH:MM
    #[serde(default)]
    pub run_on_start: bool,
}

fn default_run_at() -> String { "07:10".into() }
fn default_true() -> bool { true }

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Upper bound for `search.horizon_days`.
pub const MAX_HORIZON_DAYS: i64 = 366;

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `WEEKENDER__SEARCH__HORIZON_DAYS=30`, `WEEKENDER__ORIGINS=WAW,KRK`
            .add_source(
                config::Environment::with_prefix("WEEKENDER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("origins")
                    .with_list_parse_key("destinations")
                    .with_list_parse_key("search.full_days_allowed")
                    .with_list_parse_key("scan.providers"),
            );

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects settings the scan cycle cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        self.trip_constraints()?;
        self.run_at()?;

        if self.search.horizon_days <= 0 {
            return Err(invalid("search.horizon_days must be positive"));
        }
        if self.search.horizon_days > MAX_HORIZON_DAYS {
            return Err(invalid(&format!("search.horizon_days must be at most {}", MAX_HORIZON_DAYS)));
        }
        if self.search.full_days_allowed.is_empty() {
            return Err(invalid("search.full_days_allowed must not be empty"));
        }
        if self.search.full_days_allowed.contains(&0) {
            return Err(invalid("search.full_days_allowed values must be at least 1"));
        }
        if self.planner.max_windows_per_destination_per_depart_date == 0 {
            return Err(invalid("planner.max_windows_per_destination_per_depart_date must be positive"));
        }
        if self.planner.max_windows_global == 0 {
            return Err(invalid("planner.max_windows_global must be positive"));
        }
        if self.planner.daily_budget_per_provider == 0 {
            return Err(invalid("planner.daily_budget_per_provider must be positive"));
        }
        if self.scan.providers.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("scan.providers must not contain blank names"));
        }
        for code in self.origins.iter().chain(self.destinations.iter()) {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(invalid(&format!("'{}' is not an IATA airport code", code)));
            }
        }

        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| invalid(&format!("unknown timezone '{}'", self.timezone)))
    }

    /// Local time of day the daily scan starts at.
    pub fn run_at(&self) -> Result<NaiveTime, ConfigError> {
        parse_time("scan.run_at_local", &self.scan.run_at_local)
    }

    pub fn trip_constraints(&self) -> Result<TripConstraints, ConfigError> {
        let constraints = TripConstraints {
            max_stops: self.constraints.max_stops,
            max_total_duration_minutes_one_way: self.constraints.max_total_duration_minutes_one_way,
            hard_cap_price_pln: self.constraints.hard_cap_price_pln,
            latest_arrival_on_friday_local: parse_time(
                "saturday_rule.latest_arrival_on_friday_local",
                &self.saturday_rule.latest_arrival_on_friday_local,
            )?,
            earliest_departure_on_sunday_local: parse_time(
                "saturday_rule.earliest_departure_on_sunday_local",
                &self.saturday_rule.earliest_departure_on_sunday_local,
            )?,
            require_no_flight_on_saturday: self.saturday_rule.require_no_flight_on_saturday,
        };

        constraints
            .validate()
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(constraints)
    }
}

fn parse_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| invalid(&format!("{} '{}' is not HH:MM: {}", key, value, e)))
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Message(message.to_string())
}
