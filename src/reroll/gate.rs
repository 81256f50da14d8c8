use time::{Duration, OffsetDateTime};

use crate::models::{Payment, User};

/// What let a reroll through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockKind {
    FreeCooldownExpired,
    AdUnlock,
    PaidUnlock,
}

impl UnlockKind {
    /// Monetized unlocks are single-use and get consumed by the reroll.
    pub fn is_monetized(self) -> bool {
        !matches!(self, UnlockKind::FreeCooldownExpired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed(UnlockKind),
    DeniedCooldown(Duration),
    DeniedAlreadyUsed,
}

/// Decides whether `user` may get a new random spot at `now`.
///
/// A monetized unlock is looked at first so a paying user is never held back
/// by the cooldown clock, and a spent unlock never falls through to the free
/// path.
pub fn evaluate(user: &User, payment: Option<&Payment>, now: OffsetDateTime) -> Decision {
    if let Some(payment) = payment.filter(|p| p.is_unlocked()) {
        if payment.used {
            return Decision::DeniedAlreadyUsed;
        }
        let kind = if payment.is_ad_watched {
            UnlockKind::AdUnlock
        } else {
            UnlockKind::PaidUnlock
        };
        return Decision::Allowed(kind);
    }

    match user.cooldown_expires_at {
        Some(expires) if now < expires => Decision::DeniedCooldown(expires - now),
        _ => Decision::Allowed(UnlockKind::FreeCooldownExpired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STATUS_AD_WATCHED;

    fn user_with_cooldown(cooldown: Option<OffsetDateTime>) -> User {
        User {
            cooldown_expires_at: cooldown,
            ..User::new(1, "u1")
        }
    }

    fn payment(status: &str, used: bool, ad: bool) -> Payment {
        Payment {
            id: 10,
            user_id: 1,
            external_id: (!ad).then(|| "abc".to_string()),
            status: status.into(),
            sats: if ad { 0 } else { 1000 },
            invoice_ref: None,
            uri: None,
            used,
            is_ad_watched: ad,
        }
    }

    #[test]
    fn never_rolled_user_is_free() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(
            evaluate(&user_with_cooldown(None), None, now),
            Decision::Allowed(UnlockKind::FreeCooldownExpired)
        );
    }

    #[test]
    fn running_cooldown_reports_remaining_time() {
        let now = OffsetDateTime::now_utc();
        let user = user_with_cooldown(Some(now + Duration::hours(1)));
        assert_eq!(
            evaluate(&user, None, now),
            Decision::DeniedCooldown(Duration::hours(1))
        );
    }

    #[test]
    fn cooldown_ends_exactly_at_expiry() {
        let now = OffsetDateTime::now_utc();
        let user = user_with_cooldown(Some(now));
        assert_eq!(
            evaluate(&user, None, now),
            Decision::Allowed(UnlockKind::FreeCooldownExpired)
        );
    }

    #[test]
    fn pending_payment_does_not_bypass_cooldown() {
        let now = OffsetDateTime::now_utc();
        let user = user_with_cooldown(Some(now + Duration::days(2)));
        let p = payment("pending", false, false);
        assert!(matches!(
            evaluate(&user, Some(&p), now),
            Decision::DeniedCooldown(_)
        ));
    }

    #[test]
    fn paid_payment_bypasses_cooldown() {
        let now = OffsetDateTime::now_utc();
        let user = user_with_cooldown(Some(now + Duration::hours(1)));
        let p = payment("paid", false, false);
        assert_eq!(
            evaluate(&user, Some(&p), now),
            Decision::Allowed(UnlockKind::PaidUnlock)
        );
    }

    #[test]
    fn ad_watch_bypasses_cooldown() {
        let now = OffsetDateTime::now_utc();
        let user = user_with_cooldown(Some(now + Duration::hours(1)));
        let p = payment(STATUS_AD_WATCHED, false, true);
        assert_eq!(
            evaluate(&user, Some(&p), now),
            Decision::Allowed(UnlockKind::AdUnlock)
        );
    }

    #[test]
    fn spent_unlock_is_denied_even_after_cooldown() {
        let now = OffsetDateTime::now_utc();
        let expired = user_with_cooldown(Some(now - Duration::hours(1)));
        let p = payment("paid", true, false);
        assert_eq!(evaluate(&expired, Some(&p), now), Decision::DeniedAlreadyUsed);
        let ad = payment(STATUS_AD_WATCHED, true, true);
        assert_eq!(evaluate(&expired, Some(&ad), now), Decision::DeniedAlreadyUsed);
    }

    #[test]
    fn monetized_kinds() {
        assert!(!UnlockKind::FreeCooldownExpired.is_monetized());
        assert!(UnlockKind::AdUnlock.is_monetized());
        assert!(UnlockKind::PaidUnlock.is_monetized());
    }
}
