use chrono::NaiveDateTime;

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, User};

/// Everything an actor can ask of a booking. Every lifecycle operation
/// funnels through `authorize` so the role table lives in one place.
pub enum BookingAction {
    View,
    SetStatus {
        target: BookingStatus,
        /// A new start_time is being supplied in the same request.
        rescheduling: bool,
    },
    Reschedule,
    Complete,
    Delete,
}

/// Legal edges of the state graph, independent of who asks. Cancelled and
/// completed are terminal for everyone, admins included.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Pending)
            | (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Pending, Completed)
            | (Confirmed, Pending)
            | (Confirmed, Confirmed)
            | (Confirmed, Cancelled)
            | (Confirmed, Completed)
    )
}

pub fn authorize(
    actor: &User,
    booking: &Booking,
    action: &BookingAction,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let is_owner = booking.user_id == actor.id;
    if !actor.is_admin() && !is_owner {
        return Err(AppError::Authorization);
    }

    match action {
        BookingAction::View => Ok(()),

        BookingAction::SetStatus {
            target,
            rescheduling,
        } => {
            if !can_transition(booking.status, *target) {
                return Err(AppError::validation(format!(
                    "cannot change a {} booking to {}",
                    booking.status.as_str(),
                    target.as_str()
                )));
            }
            if !actor.is_admin() {
                let allowed = *target == BookingStatus::Cancelled
                    || (*rescheduling && *target == BookingStatus::Pending);
                if !allowed {
                    return Err(AppError::Authorization);
                }
                if booking.has_started(now) && *target != BookingStatus::Cancelled {
                    return Err(AppError::validation(
                        "cannot change status after booking has started",
                    ));
                }
            }
            Ok(())
        }

        BookingAction::Reschedule => {
            if !actor.is_admin() {
                if !booking.status.is_active() {
                    return Err(AppError::validation(
                        "can only reschedule pending or confirmed bookings",
                    ));
                }
                if booking.has_started(now) {
                    return Err(AppError::validation(
                        "cannot reschedule booking after it has started",
                    ));
                }
            }
            Ok(())
        }

        BookingAction::Complete => {
            if !actor.is_admin() {
                return Err(AppError::Authorization);
            }
            if booking.status.is_terminal() {
                return Err(AppError::validation(format!(
                    "cannot complete a {} booking",
                    booking.status.as_str()
                )));
            }
            Ok(())
        }

        BookingAction::Delete => {
            if actor.is_admin() {
                return Ok(());
            }
            // Owner, checked above.
            if booking.has_started(now) {
                return Err(AppError::validation(
                    "cannot delete booking after it has started",
                ));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: "Test".to_string(),
            email: format!("{id}@example.com"),
            role,
        }
    }

    fn booking(owner: &str, status: BookingStatus, start: &str) -> Booking {
        Booking {
            id: "b1".to_string(),
            user_id: owner.to_string(),
            service_id: "s1".to_string(),
            start_time: dt(start),
            end_time: dt(start) + chrono::Duration::minutes(30),
            status,
            created_at: dt("2025-06-01 00:00:00"),
            updated_at: dt("2025-06-01 00:00:00"),
        }
    }

    const NOW: &str = "2025-06-16 12:00:00";
    const FUTURE: &str = "2025-06-17 10:00:00";
    const PAST: &str = "2025-06-16 10:00:00";

    #[test]
    fn test_terminal_states_admit_no_transitions() {
        use BookingStatus::*;
        for from in [Cancelled, Completed] {
            for to in [Pending, Confirmed, Cancelled, Completed] {
                assert!(!can_transition(from, to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn test_live_states_allow_all_targets() {
        use BookingStatus::*;
        for from in [Pending, Confirmed] {
            for to in [Pending, Confirmed, Cancelled, Completed] {
                assert!(can_transition(from, to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn test_stranger_denied_everything() {
        let stranger = user("u2", Role::User);
        let b = booking("u1", BookingStatus::Pending, FUTURE);
        for action in [
            BookingAction::View,
            BookingAction::SetStatus {
                target: BookingStatus::Cancelled,
                rescheduling: false,
            },
            BookingAction::Reschedule,
            BookingAction::Delete,
        ] {
            let result = authorize(&stranger, &b, &action, dt(NOW));
            assert!(matches!(result, Err(AppError::Authorization)));
        }
    }

    #[test]
    fn test_owner_may_cancel() {
        let owner = user("u1", Role::User);
        let b = booking("u1", BookingStatus::Confirmed, FUTURE);
        let action = BookingAction::SetStatus {
            target: BookingStatus::Cancelled,
            rescheduling: false,
        };
        assert!(authorize(&owner, &b, &action, dt(NOW)).is_ok());
    }

    #[test]
    fn test_owner_may_cancel_after_start() {
        let owner = user("u1", Role::User);
        let b = booking("u1", BookingStatus::Confirmed, PAST);
        let action = BookingAction::SetStatus {
            target: BookingStatus::Cancelled,
            rescheduling: false,
        };
        assert!(authorize(&owner, &b, &action, dt(NOW)).is_ok());
    }

    #[test]
    fn test_owner_cannot_confirm_own_booking() {
        let owner = user("u1", Role::User);
        let b = booking("u1", BookingStatus::Pending, FUTURE);
        let action = BookingAction::SetStatus {
            target: BookingStatus::Confirmed,
            rescheduling: false,
        };
        let result = authorize(&owner, &b, &action, dt(NOW));
        assert!(matches!(result, Err(AppError::Authorization)));
    }

    #[test]
    fn test_owner_cannot_complete() {
        let owner = user("u1", Role::User);
        let b = booking("u1", BookingStatus::Confirmed, FUTURE);
        let result = authorize(&owner, &b, &BookingAction::Complete, dt(NOW));
        assert!(matches!(result, Err(AppError::Authorization)));

        let result = authorize(
            &owner,
            &b,
            &BookingAction::SetStatus {
                target: BookingStatus::Completed,
                rescheduling: false,
            },
            dt(NOW),
        );
        assert!(matches!(result, Err(AppError::Authorization)));
    }

    #[test]
    fn test_owner_may_set_pending_only_while_rescheduling() {
        let owner = user("u1", Role::User);
        let b = booking("u1", BookingStatus::Confirmed, FUTURE);

        let with_reschedule = BookingAction::SetStatus {
            target: BookingStatus::Pending,
            rescheduling: true,
        };
        assert!(authorize(&owner, &b, &with_reschedule, dt(NOW)).is_ok());

        let without = BookingAction::SetStatus {
            target: BookingStatus::Pending,
            rescheduling: false,
        };
        let result = authorize(&owner, &b, &without, dt(NOW));
        assert!(matches!(result, Err(AppError::Authorization)));
    }

    #[test]
    fn test_owner_cannot_reschedule_started_booking() {
        let owner = user("u1", Role::User);
        let b = booking("u1", BookingStatus::Pending, PAST);
        let result = authorize(&owner, &b, &BookingAction::Reschedule, dt(NOW));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_owner_cannot_reschedule_cancelled_booking() {
        let owner = user("u1", Role::User);
        let b = booking("u1", BookingStatus::Cancelled, FUTURE);
        let result = authorize(&owner, &b, &BookingAction::Reschedule, dt(NOW));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_admin_may_reschedule_anything() {
        let admin = user("a1", Role::Admin);
        let b = booking("u1", BookingStatus::Completed, PAST);
        assert!(authorize(&admin, &b, &BookingAction::Reschedule, dt(NOW)).is_ok());
    }

    #[test]
    fn test_admin_bound_by_state_graph() {
        let admin = user("a1", Role::Admin);
        let b = booking("u1", BookingStatus::Cancelled, FUTURE);
        let action = BookingAction::SetStatus {
            target: BookingStatus::Confirmed,
            rescheduling: false,
        };
        let result = authorize(&admin, &b, &action, dt(NOW));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_admin_completes_without_time_restriction() {
        let admin = user("a1", Role::Admin);
        let b = booking("u1", BookingStatus::Confirmed, PAST);
        assert!(authorize(&admin, &b, &BookingAction::Complete, dt(NOW)).is_ok());
    }

    #[test]
    fn test_complete_rejected_on_terminal_booking() {
        let admin = user("a1", Role::Admin);
        for status in [BookingStatus::Cancelled, BookingStatus::Completed] {
            let b = booking("u1", status, PAST);
            let result = authorize(&admin, &b, &BookingAction::Complete, dt(NOW));
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[test]
    fn test_owner_delete_only_before_start() {
        let owner = user("u1", Role::User);

        let upcoming = booking("u1", BookingStatus::Pending, FUTURE);
        assert!(authorize(&owner, &upcoming, &BookingAction::Delete, dt(NOW)).is_ok());

        let started = booking("u1", BookingStatus::Pending, PAST);
        let result = authorize(&owner, &started, &BookingAction::Delete, dt(NOW));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_admin_delete_any_time() {
        let admin = user("a1", Role::Admin);
        let started = booking("u1", BookingStatus::Completed, PAST);
        assert!(authorize(&admin, &started, &BookingAction::Delete, dt(NOW)).is_ok());
    }
}
