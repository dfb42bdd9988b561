use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use weekender_core::{
    Clock, FlightOffer, NewPriceObservation, OfferSource, PlannerResult, PriceObservationRepository,
    RepositoryError, TripConstraints, WindowCheckRepository,
};
use weekender_eval::{OfferAssessment, TripEvaluator};
use weekender_planner::{PlannerError, TripWindowGenerator, WindowCheckPlanner};
use weekender_store::Config;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Planning failed: {0}")]
    Planning(#[from] PlannerError),
    #[error("Failed to record price observations: {0}")]
    Observations(#[source] RepositoryError),
}

/// What one cycle scans.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
    pub horizon_days: i64,
    pub full_days_allowed: Vec<u32>,
    pub providers: Vec<String>,
}

/// An offer returned for a selected window, with its verdict.
#[derive(Debug, Clone)]
pub struct OfferOutcome {
    pub provider: String,
    pub window_key: String,
    pub offer: FlightOffer,
    pub assessment: OfferAssessment,
}

#[derive(Debug)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub candidate_count: usize,
    /// In configured provider order.
    pub plans: Vec<(String, PlannerResult)>,
    pub outcomes: Vec<OfferOutcome>,
    pub failed_searches: usize,
    pub observations_recorded: usize,
}

impl CycleReport {
    pub fn selected_count(&self) -> usize {
        self.plans.iter().map(|(_, plan)| plan.selected_count()).sum()
    }

    pub fn acceptable_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.assessment.is_acceptable())
            .count()
    }

    pub fn acceptable(&self) -> impl Iterator<Item = &OfferOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.assessment.is_acceptable())
    }
}

/// One generate, plan, search and evaluate pass.
pub struct ScanCycle {
    generator: TripWindowGenerator,
    planner: WindowCheckPlanner,
    evaluator: TripEvaluator,
    observations: Arc<dyn PriceObservationRepository>,
    clock: Arc<dyn Clock>,
    constraints: TripConstraints,
    settings: CycleSettings,
    sources: HashMap<String, Arc<dyn OfferSource>>,
}

impl ScanCycle {
    pub fn new(
        generator: TripWindowGenerator,
        planner: WindowCheckPlanner,
        observations: Arc<dyn PriceObservationRepository>,
        clock: Arc<dyn Clock>,
        constraints: TripConstraints,
        settings: CycleSettings,
    ) -> Self {
        Self {
            generator,
            planner,
            evaluator: TripEvaluator::new(),
            observations,
            clock,
            constraints,
            settings,
            sources: HashMap::new(),
        }
    }

    pub fn from_config(
        config: &Config,
        clock: Arc<dyn Clock>,
        repository: Arc<dyn WindowCheckRepository>,
        observations: Arc<dyn PriceObservationRepository>,
    ) -> Result<Self, config::ConfigError> {
        let generator = TripWindowGenerator::new(
            clock.clone(),
            config.planner.max_windows_per_destination_per_depart_date,
            config.planner.max_windows_global,
        );
        let planner = WindowCheckPlanner::new(
            clock.clone(),
            config.planner.min_recheck_interval_hours,
            config.planner.daily_budget_per_provider,
            repository,
        );
        let settings = CycleSettings {
            origins: config.origins.clone(),
            destinations: config.destinations.clone(),
            horizon_days: config.search.horizon_days,
            full_days_allowed: config.search.full_days_allowed.clone(),
            providers: config.scan.providers.clone(),
        };

        Ok(Self::new(
            generator,
            planner,
            observations,
            clock,
            config.trip_constraints()?,
            settings,
        ))
    }

    /// Registers the search client for one provider. Providers without a
    /// source are still planned, so their budget and history stay current.
    pub fn with_source(mut self, source: Arc<dyn OfferSource>) -> Self {
        self.sources.insert(source.provider().to_string(), source);
        self
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("scan_cycle", %cycle_id);
        self.run(cycle_id).instrument(span).await
    }

    async fn run(&self, cycle_id: Uuid) -> Result<CycleReport, CycleError> {
        info!(
            "Scan started - origins={:?}, destinations={}, horizonDays={}",
            self.settings.origins,
            self.settings.destinations.len(),
            self.settings.horizon_days
        );

        let candidates = self.generator.generate(
            &self.settings.origins,
            &self.settings.destinations,
            self.settings.horizon_days,
            &self.settings.full_days_allowed,
        );

        let plans = try_join_all(self.settings.providers.iter().map(|provider| {
            let candidates = &candidates;
            async move {
                let plan = self.planner.plan(provider, candidates).await?;
                Ok::<_, PlannerError>((provider.clone(), plan))
            }
        }))
        .await?;

        let mut outcomes = Vec::new();
        let mut observations = Vec::new();
        let mut failed_searches = 0;

        for (provider, plan) in &plans {
            let Some(source) = self.sources.get(provider) else {
                debug!("No offer source for {}, planned only", provider);
                continue;
            };

            for window in plan.selected() {
                match source.search(window).await {
                    Ok(offers) => {
                        debug!("{} returned {} offers for {}", provider, offers.len(), window.window_key());
                        for offer in offers {
                            observations.extend(NewPriceObservation::from_offer(
                                provider,
                                window,
                                &offer,
                                self.clock.now(),
                            ));
                            let assessment = self.evaluator.assess(&offer, &self.constraints);
                            outcomes.push(OfferOutcome {
                                provider: provider.clone(),
                                window_key: window.window_key().to_string(),
                                offer,
                                assessment,
                            });
                        }
                    }
                    Err(e) => {
                        warn!("Search failed at {} for {}: {}", provider, window.window_key(), e);
                        failed_searches += 1;
                    }
                }
            }
        }

        self.observations
            .insert_all(&observations)
            .await
            .map_err(CycleError::Observations)?;

        let report = CycleReport {
            cycle_id,
            candidate_count: candidates.len(),
            plans,
            outcomes,
            failed_searches,
            observations_recorded: observations.len(),
        };

        info!(
            "Scan finished - candidates={}, selected={}, offers={}, acceptable={}, failedSearches={}, observations={}",
            report.candidate_count,
            report.selected_count(),
            report.outcomes.len(),
            report.acceptable_count(),
            report.failed_searches,
            report.observations_recorded
        );

        Ok(report)
    }
}
