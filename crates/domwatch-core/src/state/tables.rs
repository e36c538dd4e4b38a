// # Store Tables
//
// Plain in-memory tables shared by `MemoryStore` and `FileStore`.
//
// The tables carry no locking; each store wraps them in its own lock and
// decides how (and whether) to persist them. All invariants of the store
// interface live here so both implementations enforce them identically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::StoreLimits;
use crate::traits::{CheckHistoryEntry, DomainStatus, StatusRecord, Subscription, UserId};
use crate::Error;

/// Subscriptions, status records and history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoreTables {
    /// Active subscriptions in creation order
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    /// Last known status keyed by domain
    #[serde(default)]
    pub statuses: BTreeMap<String, StatusRecord>,
    /// Check history in append order
    #[serde(default)]
    pub history: Vec<CheckHistoryEntry>,
}

impl StoreTables {
    pub fn add_subscription(
        &mut self,
        user_id: UserId,
        domain: &str,
        limits: &StoreLimits,
    ) -> Result<Subscription, Error> {
        let mut held = 0;
        for sub in self.subscriptions.iter().filter(|s| s.user_id == user_id) {
            if sub.domain == domain {
                return Err(Error::already_exists(user_id, domain));
            }
            held += 1;
        }

        if held >= limits.max_subscriptions_per_user {
            return Err(Error::capacity_exceeded(
                user_id,
                limits.max_subscriptions_per_user,
            ));
        }

        let subscription = Subscription {
            user_id,
            domain: domain.to_string(),
            created_at: Utc::now(),
        };
        self.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    pub fn remove_subscription(&mut self, user_id: UserId, domain: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|s| !(s.user_id == user_id && s.domain == domain));
        self.subscriptions.len() != before
    }

    pub fn subscriptions_of(&self, user_id: UserId) -> Vec<Subscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn is_referenced(&self, domain: &str) -> bool {
        self.subscriptions.iter().any(|s| s.domain == domain)
    }

    pub fn set_status(&mut self, domain: &str, status: DomainStatus, checked_at: DateTime<Utc>) {
        self.statuses.insert(
            domain.to_string(),
            StatusRecord {
                domain: domain.to_string(),
                last_status: status,
                last_checked_at: checked_at,
            },
        );
    }

    pub fn append_history(&mut self, entry: &CheckHistoryEntry, limits: &StoreLimits) {
        self.history.push(entry.clone());

        let held = self
            .history
            .iter()
            .filter(|e| e.user_id == entry.user_id)
            .count();
        if held > limits.max_history_per_user {
            // Drop the user's oldest entries
            let mut excess = held - limits.max_history_per_user;
            self.history.retain(|e| {
                if excess > 0 && e.user_id == entry.user_id {
                    excess -= 1;
                    false
                } else {
                    true
                }
            });
        }
    }

    pub fn recent_history(&self, user_id: UserId, limit: usize) -> Vec<CheckHistoryEntry> {
        self.history
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }
}
