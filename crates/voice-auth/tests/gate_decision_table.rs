//! Access Gate Decision Table Tests
//!
//! Every application route evaluated against every authentication state.

use rstest::*;
use voice_auth::{AccessGate, AuthState, Decision, RouteMatch};
use voice_core::{Role, User};

#[fixture]
fn gate() -> AccessGate {
	AccessGate::application()
}

fn signed_in(role: Role) -> AuthState {
	let official_id = role.is_staff().then(|| "EMP-1".to_string());
	AuthState::Authenticated(User::new("u1", "u@campus.edu", "U", role, official_id).unwrap())
}

fn render(name: &str) -> Decision {
	Decision::Render(RouteMatch {
		name: name.to_string(),
		params: Default::default(),
	})
}

fn redirect(to: &str) -> Decision {
	Decision::Redirect(to.to_string())
}

// =============================================================================
// Unauthenticated
// =============================================================================

#[rstest]
#[case("/login", render("login"))]
#[case("/signup", render("signup"))]
#[case("/", redirect("/login"))]
#[case("/dashboard", redirect("/login"))]
#[case("/dashboard/issues/new", redirect("/login"))]
#[case("/dashboard/settings", redirect("/login"))]
#[case("/admin", redirect("/login"))]
#[case("/nowhere", Decision::NotFound)]
fn test_unauthenticated(gate: AccessGate, #[case] path: &str, #[case] expected: Decision) {
	assert_eq!(gate.evaluate(&AuthState::Unauthenticated, path), expected);
}

// =============================================================================
// Authenticating
// =============================================================================

#[rstest]
#[case("/login", Decision::Loading)]
#[case("/dashboard", Decision::Loading)]
#[case("/admin", Decision::Loading)]
#[case("/", redirect("/login"))]
#[case("/missing/page", Decision::NotFound)]
fn test_authenticating(gate: AccessGate, #[case] path: &str, #[case] expected: Decision) {
	assert_eq!(gate.evaluate(&AuthState::Authenticating, path), expected);
}

// =============================================================================
// Authenticated, by role
// =============================================================================

#[rstest]
#[case(Role::Student, "/dashboard", render("dashboard"))]
#[case(Role::Student, "/dashboard/settings", render("settings"))]
#[case(Role::Student, "/admin", redirect("/dashboard"))]
#[case(Role::Student, "/login", redirect("/dashboard"))]
#[case(Role::Student, "/signup", redirect("/dashboard"))]
#[case(Role::Admin, "/admin", render("admin"))]
#[case(Role::Admin, "/dashboard", redirect("/admin"))]
#[case(Role::Admin, "/dashboard/issues/new", redirect("/admin"))]
#[case(Role::Admin, "/login", redirect("/admin"))]
#[case(Role::Management, "/admin", render("admin"))]
#[case(Role::Management, "/dashboard/settings", redirect("/admin"))]
#[case(Role::Management, "/signup", redirect("/admin"))]
fn test_authenticated(
	gate: AccessGate,
	#[case] role: Role,
	#[case] path: &str,
	#[case] expected: Decision,
) {
	assert_eq!(gate.evaluate(&signed_in(role), path), expected);
}

#[rstest]
fn test_edit_route_captures_issue_id(gate: AccessGate) {
	let decision = gate.evaluate(
		&signed_in(Role::Student),
		"/dashboard/issues/6f1c2a/edit/",
	);

	let Decision::Render(matched) = decision else {
		panic!("expected render, got {decision:?}");
	};
	assert_eq!(matched.name, "edit_issue");
	assert_eq!(matched.param("issue_id"), Some("6f1c2a"));
}

#[rstest]
fn test_unknown_paths_regardless_of_state(gate: AccessGate) {
	for state in [
		AuthState::Unauthenticated,
		AuthState::Authenticating,
		signed_in(Role::Student),
		signed_in(Role::Admin),
	] {
		assert_eq!(gate.evaluate(&state, "/dashboard/issues"), Decision::NotFound);
	}
}
