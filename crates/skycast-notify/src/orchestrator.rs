//! Ties rule, forecast and scheduler together for one location at a time.

use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::center::NotificationCenter;
use crate::content;
use crate::rule::{NotificationRule, RuleError};
use crate::scheduler::TriggerScheduler;
use crate::store::RuleStore;
use crate::trigger::Slot;
use skycast_core::Locale;
use skycast_weather::{ForecastProvider, ForecastSnapshot, Location, WeatherClient, WeatherError};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] RuleError),
    #[error("Failed to store rule: {0:#}")]
    Storage(anyhow::Error),
    #[error("Cancelled")]
    Cancelled,
    #[error(transparent)]
    Weather(#[from] WeatherError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Permission granted; `active` tells whether any slot is now pending.
    Scheduled { active: bool },
    /// Nothing was scheduled; the user has to enable notifications in settings.
    PermissionRequired,
}

pub struct NotificationOrchestrator<P, C> {
    weather: Arc<WeatherClient<P>>,
    scheduler: TriggerScheduler<C>,
    store: Arc<dyn RuleStore>,
    locale: Locale,
    default_rule: NotificationRule,
}

impl<P, C> NotificationOrchestrator<P, C>
where
    P: ForecastProvider,
    C: NotificationCenter,
{
    pub fn new(
        weather: Arc<WeatherClient<P>>,
        scheduler: TriggerScheduler<C>,
        store: Arc<dyn RuleStore>,
        locale: Locale,
    ) -> Self {
        Self {
            weather,
            scheduler,
            store,
            locale,
            default_rule: NotificationRule::default(),
        }
    }

    /// Rule returned by `rule_for` when nothing is stored.
    pub fn with_default_rule(mut self, rule: NotificationRule) -> Self {
        self.default_rule = rule;
        self
    }

    pub fn scheduler(&self) -> &TriggerScheduler<C> {
        &self.scheduler
    }

    /// Stored rule for the location, or the default rule (Daily 20:00
    /// unless overridden).
    pub fn rule_for(&self, location: &Location) -> NotificationRule {
        self.store
            .load(location.id)
            .unwrap_or_else(|| self.default_rule.clone())
    }

    /// Apply `rule` to `location` and persist it.
    ///
    /// Fetches the forecast (a failed fetch only means "no forecast"),
    /// reconciles the rule's slots, saves the rule, then schedules or
    /// cancels the today/tomorrow one-shots.
    #[instrument(skip(self, rule, location, cancel), fields(location = %location.id, kind = ?rule.kind))]
    pub async fn apply(
        &self,
        rule: &NotificationRule,
        location: &Location,
        cancel: &CancellationToken,
    ) -> Result<ApplyOutcome, NotifyError> {
        rule.validate()?;

        let snapshot = self.forecast(location, cancel).await?;
        let granted = self
            .scheduler
            .reconcile(
                rule,
                location.id,
                &location.name,
                snapshot.as_ref(),
                &self.locale,
            )
            .await;

        // Saved even when nothing could be scheduled
        self.store
            .save(location.id, rule)
            .map_err(NotifyError::Storage)?;

        if !granted {
            return Ok(ApplyOutcome::PermissionRequired);
        }

        self.apply_day_slots(rule, location, snapshot.as_ref()).await;

        let active = self.scheduler.is_scheduled(location.id).await;
        tracing::info!("Applied rule for {} (active: {})", location.name, active);
        Ok(ApplyOutcome::Scheduled { active })
    }

    /// Re-evaluate the stored rule against a fresh forecast.
    pub async fn reapply_saved(
        &self,
        location: &Location,
        cancel: &CancellationToken,
    ) -> Result<ApplyOutcome, NotifyError> {
        let rule = self.rule_for(location);
        // Conditional rules read tomorrow from the forecast, so refetch it
        if rule.kind.is_conditional() {
            self.weather.cache().invalidate_forecast(location);
        }
        self.apply(&rule, location, cancel).await
    }

    /// Cancel every slot and forget the rule.
    pub async fn disable(&self, location: &Location) -> Result<(), NotifyError> {
        self.scheduler.cancel_all(location.id).await;
        self.store.remove(location.id).map_err(NotifyError::Storage)?;
        tracing::info!("Disabled notifications for {}", location.name);
        Ok(())
    }

    pub async fn is_scheduled(&self, location: &Location) -> bool {
        self.scheduler.is_scheduled(location.id).await
    }

    async fn forecast(
        &self,
        location: &Location,
        cancel: &CancellationToken,
    ) -> Result<Option<ForecastSnapshot>, NotifyError> {
        match self.weather.fetch_forecast_cancellable(location, cancel).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(WeatherError::Cancelled) => Err(NotifyError::Cancelled),
            Err(e) => {
                tracing::warn!("No forecast for {}: {}", location.name, e);
                Ok(None)
            }
        }
    }

    async fn apply_day_slots(
        &self,
        rule: &NotificationRule,
        location: &Location,
        snapshot: Option<&ForecastSnapshot>,
    ) {
        let name = location.name.as_str();
        let slots = [
            (Slot::Today, rule.today, content::today(name, snapshot, &self.locale)),
            (Slot::Tomorrow, rule.tomorrow, content::tomorrow(name, snapshot, &self.locale)),
        ];
        for (slot, settings, content) in slots {
            if settings.enabled {
                self.scheduler
                    .schedule_slot(location.id, slot, settings.hour, settings.minute, content)
                    .await;
            } else {
                self.scheduler.cancel_slot(location.id, slot).await;
            }
        }
    }
}
