//! Account lockout after repeated failed logins.
//!
//! `UNLOCKED -> LOCKED` once `max_attempts` consecutive failures are
//! recorded; `LOCKED -> UNLOCKED` on the next successful login or lazily on
//! the first attempt after `lock_until` has passed. There is no background
//! expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::user::UserRecord;

/// Store update to apply after a password mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedLogin {
    /// The previous lock has expired: counter back to 1, lock cleared
    /// (or re-set when a single failure is already the threshold).
    Restart { lock_until: Option<DateTime<Utc>> },
    /// Counter += 1, setting `lock_until` when the threshold is reached.
    Increment { lock_until: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_duration: Duration,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lock_duration: Duration) -> Self {
        Self {
            max_attempts,
            lock_duration,
        }
    }

    pub fn is_locked(&self, user: &UserRecord, now: DateTime<Utc>) -> bool {
        user.lock_until.is_some_and(|until| until > now)
    }

    pub fn on_failure(&self, user: &UserRecord, now: DateTime<Utc>) -> FailedLogin {
        if user.lock_until.is_some_and(|until| until <= now) {
            return FailedLogin::Restart {
                lock_until: self.lock_if(1, now),
            };
        }
        if self.is_locked(user, now) {
            return FailedLogin::Increment { lock_until: None };
        }
        FailedLogin::Increment {
            lock_until: self.lock_if(user.login_attempts.saturating_add(1), now),
        }
    }

    fn lock_if(&self, attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if attempts < self.max_attempts {
            return None;
        }
        chrono::Duration::from_std(self.lock_duration)
            .ok()
            .map(|d| now + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(attempts: u32, lock_until: Option<DateTime<Utc>>) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            phone_number: "48123456789".into(),
            email: None,
            password_hash: String::new(),
            roles: vec![],
            confirmed: true,
            login_attempts: attempts,
            lock_until,
            last_login: None,
        }
    }

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, Duration::from_secs(60))
    }

    #[test]
    fn failures_below_threshold_only_increment() {
        let now = Utc::now();
        for attempts in 0..4 {
            assert_eq!(
                policy().on_failure(&user(attempts, None), now),
                FailedLogin::Increment { lock_until: None }
            );
        }
    }

    #[test]
    fn fifth_failure_sets_lock() {
        let now = Utc::now();
        assert_eq!(
            policy().on_failure(&user(4, None), now),
            FailedLogin::Increment {
                lock_until: Some(now + chrono::Duration::seconds(60))
            }
        );
    }

    #[test]
    fn active_lock_is_locked_and_expired_lock_is_not() {
        let now = Utc::now();
        let locked = user(5, Some(now + chrono::Duration::seconds(10)));
        let expired = user(5, Some(now - chrono::Duration::seconds(10)));
        assert!(policy().is_locked(&locked, now));
        assert!(!policy().is_locked(&expired, now));
        assert!(!policy().is_locked(&user(3, None), now));
    }

    #[test]
    fn failure_after_expired_lock_restarts_counter() {
        let now = Utc::now();
        let expired = user(5, Some(now - chrono::Duration::seconds(1)));
        assert_eq!(
            policy().on_failure(&expired, now),
            FailedLogin::Restart { lock_until: None }
        );
    }

    #[test]
    fn threshold_of_one_locks_on_restart() {
        let now = Utc::now();
        let strict = LockoutPolicy::new(1, Duration::from_secs(5));
        let expired = user(1, Some(now - chrono::Duration::seconds(1)));
        assert_eq!(
            strict.on_failure(&expired, now),
            FailedLogin::Restart {
                lock_until: Some(now + chrono::Duration::seconds(5))
            }
        );
    }
}
