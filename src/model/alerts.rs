//! Edge-triggered evaluation of threshold rules against one reading.

use crate::domain::{AlertRule, Notification, Reading};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Evaluation {
    pub rules: Vec<AlertRule>,
    pub notifications: Vec<Notification>,
    /// True when any rule differs from its input
    pub rules_changed: bool,
}

/// Runs every rule through its idle/triggered state machine.
///
/// Inactive rules and rules for another location are passed through
/// untouched. A matching rule always gets `last_checked = now`; it emits a
/// notification only on the idle -> triggered edge.
pub fn evaluate(rules: &[AlertRule], reading: &Reading, now: DateTime<Utc>) -> Evaluation {
    let mut notifications = Vec::new();

    let updated: Vec<AlertRule> = rules
        .iter()
        .map(|rule| {
            if !rule.is_active || !rule.matches_location(&reading.name) {
                return rule.clone();
            }

            let current = reading.value_of(rule.parameter);
            let met = rule.condition.check(current, rule.value);
            debug!(
                "Alert {} ({} in {}): current {}{}, met {}, triggered {}",
                rule.id,
                rule.describe(),
                rule.city,
                current,
                rule.unit,
                met,
                rule.triggered
            );

            let mut next = rule.clone();
            next.last_checked = Some(now);

            if met && !rule.triggered {
                info!("Alert {} triggered for {}", rule.id, reading.name);
                notifications.push(Notification {
                    id: uuid::Uuid::new_v4().to_string(),
                    alert_id: rule.id.clone(),
                    message: format!(
                        "Alert: {} in {} is {}{}, which {} {}{}",
                        rule.parameter.label(),
                        reading.name,
                        current,
                        rule.unit,
                        rule.condition,
                        rule.value,
                        rule.unit
                    ),
                    timestamp: now,
                    read: false,
                });
                next.triggered = true;
                next.trigger_count += 1;
                next.last_triggered = Some(now);
            } else if !met && rule.triggered {
                next.triggered = false;
            }

            next
        })
        .collect();

    let rules_changed = updated.iter().zip(rules).any(|(a, b)| a != b);

    Evaluation {
        rules: updated,
        notifications,
        rules_changed,
    }
}
