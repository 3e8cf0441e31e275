//! Signup state machine tests
//!
//! Drives user and anonymous signups through approval, confirmation,
//! rejection, cancellation and attendance against the in-memory store.

mod helpers;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use helpers::*;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;
use VolunteerHub::database::VolunteerStore;
use VolunteerHub::models::{Actor, SignupStatus};
use VolunteerHub::services::ConfirmationService;
use VolunteerHub::VolunteerHubError;

#[tokio::test]
async fn test_user_signup_is_approved_immediately() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(3)).await;
    let user_id = ctx.add_user("alex@example.org").await;

    let outcome = assert_ok!(
        ctx.services
            .signup_service
            .create_signup(user_signup(project.id, "oneTime", user_id), ctx.now())
            .await
    );

    assert_eq!(outcome.signup.status, SignupStatus::Approved);
    assert!(outcome.anonymous_signup_id.is_none());
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 1);

    let approvals = ctx.mail.messages_with_template("signup_approved").await;
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].to, "alex@example.org");

    let pushed = ctx.calendar.pushed().await;
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].signup_id, outcome.signup.id);
}

#[tokio::test]
async fn test_anonymous_signup_waits_for_confirmation() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(2)).await;

    let outcome = ctx
        .services
        .signup_service
        .create_signup(anonymous_signup(project.id, "oneTime", "Sam@Example.org"), ctx.now())
        .await
        .unwrap();

    assert_eq!(outcome.signup.status, SignupStatus::Pending);
    // Pending signups hold their place
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 1);
    assert!(ctx.calendar.pushed().await.is_empty());

    let anonymous_signup_id = outcome.anonymous_signup_id.unwrap();
    let stored = ctx.anonymous_signup(anonymous_signup_id).await.unwrap();
    assert_eq!(stored.email, "sam@example.org");
    assert_eq!(stored.signup_id, outcome.signup.id);
    assert!(stored.confirmed_at.is_none());

    let confirmations = ctx.mail.messages_with_template("signup_confirmation").await;
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].to, "sam@example.org");

    // The mailed link carries the id and the stored token
    let link = confirmations[0]
        .body
        .split_whitespace()
        .find(|word| word.starts_with("http"))
        .unwrap();
    let (id, token) = ConfirmationService::parse_confirmation_url(link).unwrap();
    assert_eq!(id, anonymous_signup_id);
    assert_eq!(token, stored.token);
}

#[tokio::test]
async fn test_confirming_twice_fails_and_changes_nothing() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(2)).await;

    let outcome = ctx
        .services
        .signup_service
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
        .await
        .unwrap();
    let anonymous_signup_id = outcome.anonymous_signup_id.unwrap();
    let token = ctx.token_for(anonymous_signup_id).await;
    let confirm_at = ctx.now() + Duration::hours(1);

    let confirmed = ctx
        .services
        .signup_service
        .confirm_anonymous(anonymous_signup_id, &token, confirm_at)
        .await
        .unwrap();
    assert_eq!(confirmed.status, SignupStatus::Approved);
    assert_eq!(ctx.calendar.pushed().await.len(), 1);

    let again = ctx
        .services
        .signup_service
        .confirm_anonymous(anonymous_signup_id, &token, confirm_at + Duration::minutes(5))
        .await;
    assert_matches!(again, Err(VolunteerHubError::AlreadyConfirmed));

    let stored = ctx.anonymous_signup(anonymous_signup_id).await.unwrap();
    assert_eq!(stored.confirmed_at, Some(confirm_at));
    let signup = ctx.store.get_signup(outcome.signup.id).await.unwrap().unwrap();
    assert_eq!(signup.status, SignupStatus::Approved);
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 1);
    assert_eq!(ctx.calendar.pushed().await.len(), 1);
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(2)).await;

    let outcome = ctx
        .services
        .signup_service
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
        .await
        .unwrap();
    let anonymous_signup_id = outcome.anonymous_signup_id.unwrap();

    let result = ctx
        .services
        .signup_service
        .confirm_anonymous(anonymous_signup_id, "not-the-token", ctx.now())
        .await;
    assert_matches!(result, Err(VolunteerHubError::InvalidToken));

    let unknown = ctx
        .services
        .signup_service
        .confirm_anonymous(Uuid::new_v4(), "whatever", ctx.now())
        .await;
    assert_matches!(unknown, Err(VolunteerHubError::InvalidToken));

    let signup = ctx.store.get_signup(outcome.signup.id).await.unwrap().unwrap();
    assert_eq!(signup.status, SignupStatus::Pending);
}

#[tokio::test]
async fn test_email_of_registered_account_writes_nothing() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(2)).await;
    ctx.store.register_account("taken@example.org").await;

    let result = ctx
        .services
        .signup_service
        .create_signup(anonymous_signup(project.id, "oneTime", "Taken@Example.org"), ctx.now())
        .await;

    assert_matches!(result, Err(VolunteerHubError::EmailBelongsToAccount { .. }));
    assert_eq!(ctx.store.anonymous_signup_count().await, 0);
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 0);
    let signups = ctx.services.signup_service.list_signups(project.id, None, &[]).await.unwrap();
    assert!(signups.is_empty());
    assert!(ctx.mail.messages().await.is_empty());
}

#[tokio::test]
async fn test_second_signup_for_same_slot_is_duplicate() {
    let ctx = TestContext::new();
    let project = ctx.create_project(multi_day_schedule()).await;
    let user_id = ctx.add_user("alex@example.org").await;
    let signups = &ctx.services.signup_service;

    signups.create_signup(user_signup(project.id, "2030-06-01-0", user_id), ctx.now()).await.unwrap();

    let duplicate = signups.create_signup(user_signup(project.id, "2030-06-01-0", user_id), ctx.now()).await;
    assert_matches!(duplicate, Err(VolunteerHubError::DuplicateActiveSignup { schedule_id }) if schedule_id == "2030-06-01-0");

    // Another slot of the same project is fine
    assert_ok!(signups.create_signup(user_signup(project.id, "2030-06-01-1", user_id), ctx.now()).await);

    // Same email typed differently is the same anonymous identity
    signups.create_signup(anonymous_signup(project.id, "2030-06-02-0", "kim@example.org"), ctx.now()).await.unwrap();
    let again = signups.create_signup(anonymous_signup(project.id, "2030-06-02-0", " KIM@example.org "), ctx.now()).await;
    assert_matches!(again, Err(VolunteerHubError::DuplicateActiveSignup { .. }));
}

#[tokio::test]
async fn test_rejection_is_a_ban_until_unrejected() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(1)).await;
    let alex = ctx.add_user("alex@example.org").await;
    let blair = ctx.add_user("blair@example.org").await;
    let signups = &ctx.services.signup_service;

    let signup = signups.create_signup(user_signup(project.id, "oneTime", alex), ctx.now()).await.unwrap().signup;

    let rejected = signups.reject(ctx.manager_id, signup.id).await.unwrap();
    assert_eq!(rejected.status, SignupStatus::Rejected);
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 0);
    assert_eq!(ctx.mail.messages_with_template("signup_rejected").await.len(), 1);
    assert_eq!(ctx.calendar.removed().await, vec![signup.id]);

    // The rejected record blocks a fresh signup
    let retry = signups.create_signup(user_signup(project.id, "oneTime", alex), ctx.now()).await;
    assert_matches!(retry, Err(VolunteerHubError::AlreadyRejectedBanned { .. }));

    // Someone else takes the freed place
    let other = signups.create_signup(user_signup(project.id, "oneTime", blair), ctx.now()).await.unwrap().signup;

    // Lifting the ban needs room again
    let full = signups.unreject(ctx.manager_id, signup.id).await;
    assert_matches!(full, Err(VolunteerHubError::CapacityExceeded { .. }));
    let still = ctx.store.get_signup(signup.id).await.unwrap().unwrap();
    assert_eq!(still.status, SignupStatus::Rejected);

    signups.cancel_signup(&Actor::User(blair), other.id, ctx.now()).await.unwrap();
    let approved = signups.unreject(ctx.manager_id, signup.id).await.unwrap();
    assert_eq!(approved.status, SignupStatus::Approved);
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 1);
}

#[tokio::test]
async fn test_unrejected_anonymous_signup_still_needs_its_token() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(1)).await;
    let signups = &ctx.services.signup_service;

    let outcome = signups
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
        .await
        .unwrap();
    let anonymous_signup_id = outcome.anonymous_signup_id.unwrap();
    let token = ctx.token_for(anonymous_signup_id).await;

    signups.reject(ctx.manager_id, outcome.signup.id).await.unwrap();
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 0);

    // Back to pending, holding its place again
    let restored = signups.unreject(ctx.manager_id, outcome.signup.id).await.unwrap();
    assert_eq!(restored.status, SignupStatus::Pending);
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 1);
    assert!(ctx.mail.messages_with_template("signup_approved").await.is_empty());
    assert!(ctx.calendar.pushed().await.is_empty());

    let confirmed = signups
        .confirm_anonymous(anonymous_signup_id, &token, ctx.now() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(confirmed.status, SignupStatus::Approved);
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 1);
    assert_eq!(ctx.calendar.pushed().await.len(), 1);
}

#[tokio::test]
async fn test_unrejected_confirmed_anonymous_signup_is_approved() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(1)).await;
    let signups = &ctx.services.signup_service;

    let outcome = signups
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
        .await
        .unwrap();
    let anonymous_signup_id = outcome.anonymous_signup_id.unwrap();
    let token = ctx.token_for(anonymous_signup_id).await;
    signups.confirm_anonymous(anonymous_signup_id, &token, ctx.now()).await.unwrap();

    signups.reject(ctx.manager_id, outcome.signup.id).await.unwrap();
    let restored = signups.unreject(ctx.manager_id, outcome.signup.id).await.unwrap();
    assert_eq!(restored.status, SignupStatus::Approved);
}

#[tokio::test]
async fn test_rejected_anonymous_signup_is_not_stale() {
    let ctx = TestContext::new_with_config(TestConfig {
        anonymous_token_ttl_hours: Some(2),
        ..TestConfig::default()
    });
    let project = ctx.create_project(one_time_schedule(2)).await;
    let signups = &ctx.services.signup_service;

    let outcome = signups
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
        .await
        .unwrap();
    signups.reject(ctx.manager_id, outcome.signup.id).await.unwrap();

    let reconciler = ctx.services.reconciler();
    for hours in [3, 30, 300] {
        let later = ctx.now() + Duration::hours(hours);
        let stale = ctx.store.list_stale_anonymous_signups(later - Duration::hours(2)).await.unwrap();
        assert!(stale.is_empty());
        assert_eq!(reconciler.sweep_expired(later).await.unwrap(), 0);
    }

    // The rejected record stays as the ban
    assert!(ctx.anonymous_signup(outcome.anonymous_signup_id.unwrap()).await.is_some());
    let retry = signups
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now() + Duration::hours(3))
        .await;
    assert_matches!(retry, Err(VolunteerHubError::AlreadyRejectedBanned { .. }));
}

#[tokio::test]
async fn test_only_managers_reject() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(2)).await;
    let alex = ctx.add_user("alex@example.org").await;
    let signups = &ctx.services.signup_service;

    let signup = signups.create_signup(user_signup(project.id, "oneTime", alex), ctx.now()).await.unwrap().signup;

    assert_matches!(signups.reject(alex, signup.id).await, Err(VolunteerHubError::PermissionDenied(_)));

    // Organization admins manage every project
    let admin = ctx.add_user("admin@example.org").await;
    ctx.identity.add_admin(admin).await;
    assert_ok!(signups.reject(admin, signup.id).await);

    // Unrejecting something that is not rejected is a state error
    let fresh = ctx.add_user("fresh@example.org").await;
    let active = signups.create_signup(user_signup(project.id, "oneTime", fresh), ctx.now()).await.unwrap().signup;
    assert_matches!(
        signups.unreject(ctx.manager_id, active.id).await,
        Err(VolunteerHubError::InvalidStateTransition { .. })
    );
}

#[tokio::test]
async fn test_staff_manage_every_project() {
    let staff = Uuid::new_v4();
    let ctx = TestContext::new_with_config(TestConfig {
        staff_user_ids: vec![staff],
        ..TestConfig::default()
    });
    let project = ctx.create_project(one_time_schedule(2)).await;
    let alex = ctx.add_user("alex@example.org").await;

    let signup = ctx
        .services
        .signup_service
        .create_signup(user_signup(project.id, "oneTime", alex), ctx.now())
        .await
        .unwrap()
        .signup;

    let attended = ctx
        .services
        .signup_service
        .mark_attended(staff, signup.id, ctx.now())
        .await
        .unwrap();
    assert_eq!(attended.status, SignupStatus::Attended);
}

#[tokio::test]
async fn test_cancelling_frees_exactly_one_place() {
    let ctx = TestContext::new();
    let project = ctx.create_project(roles_schedule()).await;
    let alex = ctx.add_user("alex@example.org").await;
    let blair = ctx.add_user("blair@example.org").await;
    let signups = &ctx.services.signup_service;

    let first = signups.create_signup(user_signup(project.id, "Registration", alex), ctx.now()).await.unwrap().signup;
    let blocked = signups.create_signup(user_signup(project.id, "Registration", blair), ctx.now()).await;
    assert_matches!(blocked, Err(VolunteerHubError::CapacityExceeded { .. }));

    let cancelled = signups.cancel_signup(&Actor::User(alex), first.id, ctx.now()).await.unwrap();
    assert_eq!(cancelled.id, first.id);
    assert!(ctx.store.get_signup(first.id).await.unwrap().is_none());
    assert_eq!(ctx.reserved(project.id, "Registration").await, 0);
    assert_eq!(ctx.calendar.removed().await, vec![first.id]);

    assert_ok!(signups.create_signup(user_signup(project.id, "Registration", blair), ctx.now()).await);
    assert_eq!(ctx.reserved(project.id, "Registration").await, 1);

    // A cancelled signup is gone, so the same person may sign up again
    let kitchen = signups.create_signup(user_signup(project.id, "Kitchen", alex), ctx.now()).await.unwrap().signup;
    signups.cancel_signup(&Actor::User(alex), kitchen.id, ctx.now()).await.unwrap();
    assert_ok!(signups.create_signup(user_signup(project.id, "Kitchen", alex), ctx.now()).await);
}

#[tokio::test]
async fn test_strangers_cannot_cancel() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(2)).await;
    let alex = ctx.add_user("alex@example.org").await;
    let stranger = ctx.add_user("stranger@example.org").await;
    let signups = &ctx.services.signup_service;

    let signup = signups.create_signup(user_signup(project.id, "oneTime", alex), ctx.now()).await.unwrap().signup;

    assert_matches!(
        signups.cancel_signup(&Actor::User(stranger), signup.id, ctx.now()).await,
        Err(VolunteerHubError::PermissionDenied(_))
    );

    // The project manager may cancel on someone's behalf
    assert_ok!(signups.cancel_signup(&Actor::User(ctx.manager_id), signup.id, ctx.now()).await);
}

#[tokio::test]
async fn test_anonymous_holder_cancels_with_link_token() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(1)).await;
    let signups = &ctx.services.signup_service;

    let outcome = signups
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
        .await
        .unwrap();
    let anonymous_signup_id = outcome.anonymous_signup_id.unwrap();
    let token = ctx.token_for(anonymous_signup_id).await;

    let forged = Actor::AnonymousHolder { anonymous_signup_id, token: "forged".to_string() };
    assert_matches!(
        signups.cancel_signup(&forged, outcome.signup.id, ctx.now()).await,
        Err(VolunteerHubError::PermissionDenied(_))
    );

    let holder = Actor::AnonymousHolder { anonymous_signup_id, token };
    let cancelled = signups.cancel_signup(&holder, outcome.signup.id, ctx.now()).await.unwrap();
    assert_eq!(cancelled.status, SignupStatus::Pending);
    assert_eq!(ctx.store.anonymous_signup_count().await, 0);
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 0);
}

#[tokio::test]
async fn test_attendance_is_final() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(2)).await;
    let alex = ctx.add_user("alex@example.org").await;
    let signups = &ctx.services.signup_service;

    let signup = signups.create_signup(user_signup(project.id, "oneTime", alex), ctx.now()).await.unwrap().signup;
    let during = Utc.with_ymd_and_hms(2030, 6, 1, 10, 0, 0).unwrap();

    let attended = signups.mark_attended(ctx.manager_id, signup.id, during).await.unwrap();
    assert_eq!(attended.status, SignupStatus::Attended);
    assert_eq!(attended.check_in_time, Some(during));

    assert_matches!(
        signups.cancel_signup(&Actor::User(alex), signup.id, during).await,
        Err(VolunteerHubError::InvalidStateTransition { .. })
    );
    assert_matches!(
        signups.reject(ctx.manager_id, signup.id).await,
        Err(VolunteerHubError::InvalidStateTransition { .. })
    );
    assert_matches!(
        signups.mark_attended(ctx.manager_id, signup.id, during).await,
        Err(VolunteerHubError::InvalidStateTransition { .. })
    );

    // Attendance still holds its place
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 1);
    assert_eq!(signups.ledger().committed_count(project.id, "oneTime").await.unwrap(), 1);
}

#[tokio::test]
async fn test_pending_signup_cannot_be_marked_attended() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(2)).await;
    let signups = &ctx.services.signup_service;

    let outcome = signups
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
        .await
        .unwrap();

    let result = signups.mark_attended(ctx.manager_id, outcome.signup.id, ctx.now()).await;
    assert_matches!(result, Err(VolunteerHubError::InvalidStateTransition { from, to }) if from == "pending" && to == "attended");
}

#[tokio::test]
async fn test_signup_gates() {
    let ctx = TestContext::new();
    let signups = &ctx.services.signup_service;
    let alex = ctx.add_user("alex@example.org").await;

    // Unknown slot ids never resolve
    let project = ctx.create_project(multi_day_schedule()).await;
    assert_matches!(
        signups.create_signup(user_signup(project.id, "2030-06-01-5", alex), ctx.now()).await,
        Err(VolunteerHubError::SlotNotFound { .. })
    );
    assert_matches!(
        signups.create_signup(user_signup(Uuid::new_v4(), "oneTime", alex), ctx.now()).await,
        Err(VolunteerHubError::ProjectNotFound { .. })
    );

    // Slots that already ended refuse signups while later ones stay open
    let lunchtime = Utc.with_ymd_and_hms(2030, 6, 1, 12, 30, 0).unwrap();
    assert_matches!(
        signups.create_signup(user_signup(project.id, "2030-06-01-0", alex), lunchtime).await,
        Err(VolunteerHubError::SlotTimeElapsed { .. })
    );
    assert_ok!(signups.create_signup(user_signup(project.id, "2030-06-01-1", alex), lunchtime).await);

    // Past the last slot the project is completed
    let after = Utc.with_ymd_and_hms(2030, 6, 3, 0, 0, 0).unwrap();
    assert_matches!(
        signups.create_signup(user_signup(project.id, "2030-06-02-0", alex), after).await,
        Err(VolunteerHubError::ProjectNotAcceptingSignups { status }) if status == "completed"
    );

    // Paused projects refuse everyone
    let paused = ctx.create_project(one_time_schedule(5)).await;
    ctx.services
        .project_service
        .set_pause_signups(ctx.manager_id, paused.id, true)
        .await
        .unwrap();
    assert_matches!(
        signups.create_signup(user_signup(paused.id, "oneTime", alex), ctx.now()).await,
        Err(VolunteerHubError::PauseActive)
    );
    ctx.services
        .project_service
        .set_pause_signups(ctx.manager_id, paused.id, false)
        .await
        .unwrap();
    assert_ok!(signups.create_signup(user_signup(paused.id, "oneTime", alex), ctx.now()).await);
}

#[tokio::test]
async fn test_login_and_domain_restrictions() {
    let ctx = TestContext::new();
    let signups = &ctx.services.signup_service;

    let mut request = project_request(ctx.manager_id, one_time_schedule(5));
    request.require_login = true;
    let members_only = ctx.services.project_service.create_project(request, ctx.now()).await.unwrap();
    assert_matches!(
        signups.create_signup(anonymous_signup(members_only.id, "oneTime", "sam@example.org"), ctx.now()).await,
        Err(VolunteerHubError::LoginRequired)
    );

    let mut request = project_request(ctx.manager_id, one_time_schedule(5));
    request.restrict_to_org_domains = true;
    request.allowed_domains = vec!["@Acme.org".to_string()];
    let restricted = ctx.services.project_service.create_project(request, ctx.now()).await.unwrap();
    assert_eq!(restricted.allowed_domains, vec!["acme.org".to_string()]);

    let outsider = ctx.add_user("pat@example.org").await;
    assert_matches!(
        signups.create_signup(user_signup(restricted.id, "oneTime", outsider), ctx.now()).await,
        Err(VolunteerHubError::DomainNotAllowed { domain }) if domain == "example.org"
    );

    let insider = ctx.add_user("lee@acme.org").await;
    assert_ok!(signups.create_signup(user_signup(restricted.id, "oneTime", insider), ctx.now()).await);

    assert_matches!(
        signups.create_signup(anonymous_signup(restricted.id, "oneTime", "sam@example.org"), ctx.now()).await,
        Err(VolunteerHubError::DomainNotAllowed { .. })
    );
    assert_ok!(signups.create_signup(anonymous_signup(restricted.id, "oneTime", "sam@acme.org"), ctx.now()).await);
}

#[tokio::test]
async fn test_invalid_anonymous_details() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(5)).await;
    let signups = &ctx.services.signup_service;

    assert_matches!(
        signups.create_signup(anonymous_signup(project.id, "oneTime", "not-an-email"), ctx.now()).await,
        Err(VolunteerHubError::InvalidInput(_))
    );
    assert_eq!(ctx.store.anonymous_signup_count().await, 0);
}

#[tokio::test]
async fn test_mail_and_calendar_failures_do_not_undo_signups() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(3)).await;
    let alex = ctx.add_user("alex@example.org").await;
    ctx.mail.set_failing(true);
    ctx.calendar.set_failing(true);

    let anonymous = assert_ok!(
        ctx.services
            .signup_service
            .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
            .await
    );
    let user = assert_ok!(
        ctx.services
            .signup_service
            .create_signup(user_signup(project.id, "oneTime", alex), ctx.now())
            .await
    );

    assert_eq!(user.signup.status, SignupStatus::Approved);
    assert!(ctx.anonymous_signup(anonymous.anonymous_signup_id.unwrap()).await.is_some());
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 2);

    let stats = ctx.services.notification_service.get_stats().await;
    assert_eq!(stats.total_sent, 0);
    assert_eq!(stats.total_failed, 2);

    // Rejecting still works with both collaborators down
    assert_ok!(ctx.services.signup_service.reject(ctx.manager_id, user.signup.id).await);
}

#[tokio::test]
async fn test_expired_token_cannot_be_redeemed() {
    let ctx = TestContext::new();
    let project = ctx.create_project(one_time_schedule(1)).await;

    let outcome = ctx
        .services
        .signup_service
        .create_signup(anonymous_signup(project.id, "oneTime", "sam@example.org"), ctx.now())
        .await
        .unwrap();
    let anonymous_signup_id = outcome.anonymous_signup_id.unwrap();
    let token = ctx.token_for(anonymous_signup_id).await;

    let late = ctx.now() + Duration::hours(49);
    let result = ctx
        .services
        .signup_service
        .confirm_anonymous(anonymous_signup_id, &token, late)
        .await;
    assert_err!(&result);
    assert_matches!(result, Err(VolunteerHubError::TokenExpired));

    // The sweep removes it and gives the place back
    let reconciler = ctx.services.reconciler();
    assert_eq!(reconciler.sweep_expired(late).await.unwrap(), 1);
    assert!(ctx.anonymous_signup(anonymous_signup_id).await.is_none());
    assert!(ctx.store.get_signup(outcome.signup.id).await.unwrap().is_none());
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 0);

    assert_ok!(
        ctx.services
            .signup_service
            .create_signup(anonymous_signup(project.id, "oneTime", "kim@example.org"), late)
            .await
    );
}

#[tokio::test]
async fn test_sweep_keeps_fresh_and_confirmed_signups() {
    let ctx = TestContext::new_with_config(TestConfig {
        anonymous_token_ttl_hours: Some(2),
        ..TestConfig::default()
    });
    let project = ctx.create_project(one_time_schedule(5)).await;
    let signups = &ctx.services.signup_service;

    let confirmed = signups
        .create_signup(anonymous_signup(project.id, "oneTime", "early@example.org"), ctx.now())
        .await
        .unwrap();
    let confirmed_id = confirmed.anonymous_signup_id.unwrap();
    let token = ctx.token_for(confirmed_id).await;
    signups.confirm_anonymous(confirmed_id, &token, ctx.now() + Duration::hours(1)).await.unwrap();

    signups
        .create_signup(anonymous_signup(project.id, "oneTime", "stale@example.org"), ctx.now())
        .await
        .unwrap();
    let fresh = signups
        .create_signup(anonymous_signup(project.id, "oneTime", "fresh@example.org"), ctx.now() + Duration::hours(2))
        .await
        .unwrap();

    let reconciler = ctx.services.reconciler();
    let swept = reconciler.sweep_expired(ctx.now() + Duration::hours(3)).await.unwrap();
    assert_eq!(swept, 1);
    assert_eq!(ctx.store.anonymous_signup_count().await, 2);
    assert!(ctx.anonymous_signup(fresh.anonymous_signup_id.unwrap()).await.is_some());
    assert_eq!(ctx.reserved(project.id, "oneTime").await, 2);
}

#[tokio::test]
async fn test_slot_availability_counts() {
    let ctx = TestContext::new();
    let project = ctx.create_project(multi_day_schedule()).await;
    let alex = ctx.add_user("alex@example.org").await;
    let signups = &ctx.services.signup_service;

    signups.create_signup(user_signup(project.id, "2030-06-01-0", alex), ctx.now()).await.unwrap();
    signups
        .create_signup(anonymous_signup(project.id, "2030-06-01-0", "sam@example.org"), ctx.now())
        .await
        .unwrap();

    let availability = signups.slot_availability(project.id, ctx.now()).await.unwrap();
    let ids: Vec<&str> = availability.iter().map(|a| a.schedule_id.as_str()).collect();
    assert_eq!(ids, vec!["2030-06-01-0", "2030-06-01-1", "2030-06-02-0"]);

    let first = &availability[0];
    assert_eq!(first.capacity, 2);
    assert_eq!(first.reserved, 2);
    assert_eq!(first.committed, 1);
    assert_eq!(first.remaining, 0);
    assert!(!first.elapsed);

    assert_eq!(availability[2].remaining, 1);
}
