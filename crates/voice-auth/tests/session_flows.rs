//! Session flows against the in-process provider and directory.

use rstest::*;
use std::sync::Arc;
use std::time::Duration;
use voice_auth::{
	Account, AuthService, AuthState, MemoryAuthService, MemoryUserDirectory, Resolution, Session,
	UserDirectory,
};
use voice_core::{BackendKind, Role};

struct Harness {
	auth: Arc<MemoryAuthService>,
	directory: Arc<MemoryUserDirectory>,
	session: Session,
}

#[fixture]
fn harness() -> Harness {
	let auth = Arc::new(
		MemoryAuthService::new().with_federated_identity(
			Account::new("fed-ada", "ada@campus.edu")
				.with_display_name("Ada")
				.with_photo_url("https://img/ada.png"),
		),
	);
	let directory = Arc::new(MemoryUserDirectory::new());
	let session = Session::new(auth.clone(), directory.clone());
	Harness {
		auth,
		directory,
		session,
	}
}

async fn settled(session: &Session, predicate: impl Fn(&AuthState) -> bool) -> AuthState {
	let mut states = session.watch_state();
	tokio::time::timeout(Duration::from_secs(2), states.wait_for(|state| predicate(state)))
		.await
		.expect("state did not settle")
		.expect("session dropped")
		.clone()
}

#[rstest]
#[tokio::test]
async fn test_init_without_principal_is_unauthenticated(harness: Harness) {
	harness.session.init().await;

	assert_eq!(harness.session.state(), AuthState::Unauthenticated);
	assert!(harness.session.is_watching());
}

#[rstest]
#[tokio::test]
async fn test_federated_sign_in_writes_role(harness: Harness) {
	harness.session.init().await;

	let user = harness
		.session
		.sign_in_federated(Role::Admin, Some("EMP-7".into()))
		.await
		.unwrap();

	assert_eq!(user.role, Role::Admin);
	assert_eq!(user.photo_url.as_deref(), Some("https://img/ada.png"));
	assert_eq!(harness.session.backend_kind(), BackendKind::Durable);
	let stored = harness.directory.get("fed-ada").await.unwrap().unwrap();
	assert_eq!(stored.official_id.as_deref(), Some("EMP-7"));

	// The watcher must not undo the sign-in
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(harness.session.current_user(), Some(user));
}

#[rstest]
#[tokio::test]
async fn test_federated_sign_in_overwrites_previous_role(harness: Harness) {
	harness.session.init().await;
	harness
		.session
		.sign_in_federated(Role::Management, Some("M-1".into()))
		.await
		.unwrap();
	harness.session.sign_out().await.unwrap();

	let user = harness.session.sign_in_federated(Role::Student, None).await.unwrap();

	assert_eq!(user.role, Role::Student);
	assert!(user.official_id.is_none());
}

#[rstest]
#[tokio::test]
async fn test_password_sign_in_without_record_is_pending(harness: Harness) {
	harness
		.auth
		.sign_up_password("raw@campus.edu", "secret1", "Raw")
		.await
		.unwrap();
	harness.auth.sign_out().await.unwrap();
	harness.session.init().await;

	let resolution = harness
		.session
		.sign_in_password("raw@campus.edu", "secret1")
		.await
		.unwrap();

	assert!(matches!(resolution, Resolution::NeedsRole(_)));
	assert_eq!(harness.session.state(), AuthState::Unauthenticated);
	assert_eq!(
		harness.session.pending_account().map(|a| a.email),
		Some("raw@campus.edu".to_string())
	);

	let user = harness.session.update_role(Role::Student, None).await.unwrap();

	assert_eq!(harness.session.current_user(), Some(user));
	assert!(harness.session.pending_account().is_none());
}

#[rstest]
#[tokio::test]
async fn test_sign_up_then_sign_in_again(harness: Harness) {
	harness.session.init().await;
	let created = harness
		.session
		.sign_up_password("sam@campus.edu", "secret1", Role::Student, "Sam", Some("x".into()))
		.await
		.unwrap();
	assert!(created.official_id.is_none());
	harness.session.sign_out().await.unwrap();

	let resolution = harness
		.session
		.sign_in_password("sam@campus.edu", "secret1")
		.await
		.unwrap();

	assert_eq!(resolution.user().map(|u| u.uid.clone()), Some(created.uid));
	assert_eq!(resolution.user().map(|u| u.display_name.clone()), Some("Sam".into()));
}

#[rstest]
#[tokio::test]
async fn test_watcher_follows_external_sign_out(harness: Harness) {
	harness.session.init().await;
	harness.session.sign_in_federated(Role::Student, None).await.unwrap();

	harness.auth.sign_out().await.unwrap();

	let state = settled(&harness.session, |s| *s == AuthState::Unauthenticated).await;
	assert_eq!(state, AuthState::Unauthenticated);
}

#[rstest]
#[tokio::test]
async fn test_watcher_resolves_external_sign_in(harness: Harness) {
	harness.session.init().await;
	harness.session.sign_in_federated(Role::Student, None).await.unwrap();
	harness.session.sign_out().await.unwrap();

	harness.auth.sign_in_federated().await.unwrap();

	let state = settled(&harness.session, |s| s.user().is_some()).await;
	assert_eq!(state.user().map(|u| u.role), Some(Role::Student));
}

#[rstest]
#[tokio::test]
async fn test_demo_session_survives_provider_changes(harness: Harness) {
	harness.session.init().await;
	harness.session.sign_in_federated(Role::Student, None).await.unwrap();
	let records_before = harness.directory.len().await;

	let demo = harness.session.sign_in_demo(Role::Student, None).await.unwrap();
	tokio::time::sleep(Duration::from_millis(50)).await;

	assert!(demo.uid.starts_with("demo-user-"));
	assert_eq!(harness.session.backend_kind(), BackendKind::Local);
	assert!(harness.auth.current_account().is_none());
	assert_eq!(harness.directory.len().await, records_before);
	assert!(harness.directory.get(&demo.uid).await.unwrap().is_none());
	assert_eq!(harness.session.current_user(), Some(demo));
}

#[rstest]
#[tokio::test]
async fn test_demo_role_change_in_place(harness: Harness) {
	let demo = harness.session.sign_in_demo(Role::Student, None).await.unwrap();

	let promoted = harness
		.session
		.update_role(Role::Admin, Some("EMP-2".into()))
		.await
		.unwrap();

	assert_eq!(promoted.uid, demo.uid);
	assert_eq!(promoted.role, Role::Admin);
	assert_eq!(harness.session.backend_kind(), BackendKind::Local);
}

#[rstest]
#[tokio::test]
async fn test_provider_outage_restores_state(harness: Harness) {
	harness.session.init().await;
	harness.auth.set_available(false);

	let result = harness.session.sign_in_federated(Role::Student, None).await;

	assert!(matches!(result, Err(voice_core::Error::BackendUnavailable(_))));
	assert_eq!(harness.session.state(), AuthState::Unauthenticated);
}

#[rstest]
#[tokio::test]
async fn test_teardown(harness: Harness) {
	harness.session.init().await;
	harness.session.sign_in_federated(Role::Student, None).await.unwrap();

	harness.session.teardown().await.unwrap();

	assert!(!harness.session.is_watching());
	assert_eq!(harness.session.state(), AuthState::Unauthenticated);
	assert!(harness.auth.current_account().is_none());
}
