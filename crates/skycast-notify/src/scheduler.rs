//! Keeps a location's registered triggers in line with its rule.

use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::center::{AuthorizationStatus, NotificationCenter, NotificationRequest};
use crate::content::{self, NotificationContent};
use crate::evaluator::{day_slot_plan, evaluate};
use crate::rule::NotificationRule;
use crate::trigger::{all_identifiers, identifier, parse_identifier, ScheduledTrigger, Slot};
use skycast_core::Locale;
use skycast_weather::{ForecastSnapshot, LocationId};

/// Source of local wall-clock time.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Local::now().naive_local())
}

pub struct TriggerScheduler<C> {
    center: Arc<C>,
    clock: Clock,
}

impl<C> Clone for TriggerScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            center: Arc::clone(&self.center),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: NotificationCenter> TriggerScheduler<C> {
    pub fn new(center: Arc<C>) -> Self {
        Self::with_clock(center, system_clock())
    }

    pub fn with_clock(center: Arc<C>, clock: Clock) -> Self {
        Self { center, clock }
    }

    pub fn center(&self) -> &Arc<C> {
        &self.center
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Whether any slot of the location has a pending trigger.
    pub async fn is_scheduled(&self, location_id: LocationId) -> bool {
        self.center
            .pending()
            .await
            .iter()
            .any(|request| matches!(parse_identifier(&request.identifier), Some((id, _)) if id == location_id))
    }

    /// Pending triggers for the location, ordered by slot.
    pub async fn scheduled_triggers(&self, location_id: LocationId) -> Vec<ScheduledTrigger> {
        let mut triggers: Vec<_> = self
            .center
            .pending()
            .await
            .into_iter()
            .filter_map(|request| {
                let (id, slot) = parse_identifier(&request.identifier)?;
                (id == location_id).then_some(ScheduledTrigger {
                    location_id: id,
                    slot,
                    identifier: request.identifier,
                    repeats: request.repeats,
                    fire: request.fire,
                })
            })
            .collect();
        triggers.sort_by_key(|t| t.slot);
        triggers
    }

    /// Remove every slot, pending and delivered. Safe to repeat.
    pub async fn cancel_all(&self, location_id: LocationId) {
        self.remove(&all_identifiers(location_id)).await;
        tracing::info!("Cancelled all notifications for {}", location_id);
    }

    /// Converge the primary and weekday slots to what `rule` implies.
    ///
    /// Returns false only when notification permission is missing or
    /// denied. The today/tomorrow slots are left alone.
    pub async fn reconcile(
        &self,
        rule: &NotificationRule,
        location_id: LocationId,
        location_name: &str,
        snapshot: Option<&ForecastSnapshot>,
        locale: &Locale,
    ) -> bool {
        if !self.ensure_authorized().await {
            tracing::info!("Notifications not authorized; nothing scheduled for {}", location_id);
            return false;
        }

        let rule_ids: Vec<_> = Slot::rule_slots()
            .map(|slot| identifier(location_id, slot))
            .collect();
        self.remove(&rule_ids).await;

        let evaluation = evaluate(rule, snapshot, self.now());
        if !evaluation.condition_met {
            tracing::info!("{:?} condition not met for {}; rule stays inert", rule.kind, location_id);
            return true;
        }

        let content = content::reminder(location_name, snapshot, locale);
        let mut registered = 0;
        for plan in evaluation.plans {
            let request = NotificationRequest {
                identifier: identifier(location_id, plan.slot),
                content: content.clone(),
                fire: plan.fire,
                repeats: plan.repeats,
            };
            if self.register(request).await {
                registered += 1;
            }
        }

        tracing::info!("Scheduled {} {:?} trigger(s) for {}", registered, rule.kind, location_id);
        true
    }

    /// Schedule the today or tomorrow one-shot at hour:minute today.
    ///
    /// Returns false without error when the time has already passed.
    pub async fn schedule_slot(
        &self,
        location_id: LocationId,
        slot: Slot,
        hour: u32,
        minute: u32,
        content: NotificationContent,
    ) -> bool {
        if !slot.is_day_slot() {
            tracing::warn!("{:?} is not a day slot", slot);
            return false;
        }
        let Some(plan) = day_slot_plan(slot, hour, minute, self.now()) else {
            tracing::debug!("{:?} {:02}:{:02} already passed for {}; skipped", slot, hour, minute, location_id);
            return false;
        };
        self.register(NotificationRequest {
            identifier: identifier(location_id, slot),
            content,
            fire: plan.fire,
            repeats: plan.repeats,
        })
        .await
    }

    pub async fn cancel_slot(&self, location_id: LocationId, slot: Slot) {
        self.remove(&[identifier(location_id, slot)]).await;
    }

    async fn ensure_authorized(&self) -> bool {
        match self.center.authorization_status().await {
            AuthorizationStatus::Authorized => true,
            AuthorizationStatus::Denied => false,
            AuthorizationStatus::NotDetermined => match self.center.request_authorization().await {
                Ok(granted) => granted,
                Err(e) => {
                    tracing::warn!("Authorization request failed: {}", e);
                    false
                }
            },
        }
    }

    async fn register(&self, request: NotificationRequest) -> bool {
        let id = request.identifier.clone();
        match self.center.add(request).await {
            Ok(()) => {
                tracing::debug!("Registered {}", id);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to register {}: {}", id, e);
                false
            }
        }
    }

    async fn remove(&self, identifiers: &[String]) {
        self.center.remove_pending(identifiers).await;
        self.center.remove_delivered(identifiers).await;
    }
}
