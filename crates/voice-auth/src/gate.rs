//! Access control gate
//!
//! [`AccessGate`] holds the application's route table and decides, for every
//! navigation, whether the current [`AuthState`] may see the requested path.
//!
//! # Architecture
//!
//! - [`RoutePattern`]: a path pattern with `{name}` segments, compiled to an
//!   anchored regex
//! - [`Route`]: a named pattern plus its [`Access`] rule
//! - [`Decision`]: what the navigation resolves to
//!
//! Routes are matched in registration order; the first match wins. A path that
//! matches nothing is [`Decision::NotFound`].

use crate::session::AuthState;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use voice_core::Role;

/// Maximum pattern length in bytes.
const MAX_PATTERN_LENGTH: usize = 512;

/// Maximum number of path segments in a pattern.
const MAX_PATH_SEGMENTS: usize = 16;

/// Route table construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GateError {
	/// The pattern exceeds the length or segment limits.
	#[error("route pattern too large: {0}")]
	PatternTooLarge(String),

	/// The pattern has a malformed `{param}` segment.
	#[error("invalid route pattern {pattern:?}: {reason}")]
	InvalidPattern { pattern: String, reason: String },

	/// Two routes were registered under one name.
	#[error("duplicate route name: {0}")]
	DuplicateName(String),
}

/// A path pattern such as `/dashboard/issues/{issue_id}/edit`.
///
/// `{name}` captures one non-empty segment; everything else matches
/// literally.
#[derive(Debug, Clone)]
pub struct RoutePattern {
	pattern: String,
	regex: regex::Regex,
	param_names: Vec<String>,
}

impl RoutePattern {
	/// Compiles `pattern`.
	///
	/// # Examples
	///
	/// ```
	/// use voice_auth::RoutePattern;
	///
	/// let pattern = RoutePattern::new("/dashboard/issues/{issue_id}/edit").unwrap();
	/// let params = pattern.matches("/dashboard/issues/42/edit").unwrap();
	///
	/// assert_eq!(params.get("issue_id").map(String::as_str), Some("42"));
	/// assert!(pattern.matches("/dashboard/issues//edit").is_none());
	/// ```
	pub fn new(pattern: &str) -> Result<Self, GateError> {
		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(GateError::PatternTooLarge(format!(
				"{} bytes exceeds {MAX_PATTERN_LENGTH}",
				pattern.len()
			)));
		}
		let segment_count = pattern.split('/').count();
		if segment_count > MAX_PATH_SEGMENTS {
			return Err(GateError::PatternTooLarge(format!(
				"{segment_count} segments exceeds {MAX_PATH_SEGMENTS}"
			)));
		}

		let (regex_str, param_names) = compile(pattern)?;
		let regex = regex::Regex::new(&regex_str).map_err(|e| GateError::InvalidPattern {
			pattern: pattern.to_string(),
			reason: e.to_string(),
		})?;

		Ok(Self {
			pattern: pattern.to_string(),
			regex,
			param_names,
		})
	}

	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	pub fn param_names(&self) -> &[String] {
		&self.param_names
	}

	/// Captured parameters if `path` matches.
	pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
		self.regex.captures(path).map(|caps| {
			self.param_names
				.iter()
				.filter_map(|name| caps.name(name).map(|m| (name.clone(), m.as_str().to_string())))
				.collect()
		})
	}

	pub fn is_match(&self, path: &str) -> bool {
		self.regex.is_match(path)
	}
}

fn compile(pattern: &str) -> Result<(String, Vec<String>), GateError> {
	let invalid = |reason: &str| GateError::InvalidPattern {
		pattern: pattern.to_string(),
		reason: reason.to_string(),
	};

	let mut regex_str = String::from("^");
	let mut param_names = Vec::new();
	let mut chars = pattern.chars();

	while let Some(c) = chars.next() {
		if c == '{' {
			let mut name = String::new();
			loop {
				match chars.next() {
					Some('}') => break,
					Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' => name.push(ch),
					Some(_) => return Err(invalid("parameter names are [A-Za-z0-9_]")),
					None => return Err(invalid("unclosed '{'")),
				}
			}
			if name.is_empty() || name.starts_with(|ch: char| ch.is_ascii_digit()) {
				return Err(invalid("parameter name must start with a letter or '_'"));
			}
			if param_names.contains(&name) {
				return Err(invalid("parameter names must be unique"));
			}
			regex_str.push_str(&format!("(?P<{name}>[^/]+)"));
			param_names.push(name);
		} else if c == '}' {
			return Err(invalid("unmatched '}'"));
		} else {
			regex_str.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
		}
	}

	regex_str.push('$');
	Ok((regex_str, param_names))
}

impl PartialEq for RoutePattern {
	fn eq(&self, other: &Self) -> bool {
		self.pattern == other.pattern
	}
}

impl Eq for RoutePattern {}

impl fmt::Display for RoutePattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.pattern)
	}
}

/// Who may see a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
	/// Rendered for everyone
	Public,
	/// Sign-in and sign-up pages; signed-in users are sent home
	GuestOnly,
	/// Signed-in users holding one of the roles
	Roles(Vec<Role>),
	/// Always redirects
	RedirectTo(String),
}

/// A named route.
#[derive(Debug, Clone)]
pub struct Route {
	name: String,
	pattern: RoutePattern,
	access: Access,
}

impl Route {
	pub fn new(name: impl Into<String>, pattern: &str, access: Access) -> Result<Self, GateError> {
		Ok(Self {
			name: name.into(),
			pattern: RoutePattern::new(pattern)?,
			access,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn pattern(&self) -> &RoutePattern {
		&self.pattern
	}

	pub fn access(&self) -> &Access {
		&self.access
	}
}

/// A route selected for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
	pub name: String,
	pub params: HashMap<String, String>,
}

impl RouteMatch {
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name).map(String::as_str)
	}
}

/// Outcome of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
	/// Render the matched route
	Render(RouteMatch),
	/// Identity still resolving; show a placeholder
	Loading,
	/// Navigate elsewhere instead
	Redirect(String),
	/// No route matches
	NotFound,
}

/// Role-gated route table.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
	routes: Vec<Route>,
}

impl AccessGate {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a route after the existing ones.
	pub fn register(&mut self, route: Route) -> Result<(), GateError> {
		if self.routes.iter().any(|r| r.name == route.name) {
			return Err(GateError::DuplicateName(route.name));
		}
		self.routes.push(route);
		Ok(())
	}

	pub fn routes(&self) -> &[Route] {
		&self.routes
	}

	/// The Campus Voice route table.
	pub fn application() -> Self {
		let student = || Access::Roles(vec![Role::Student]);
		let staff = Access::Roles(vec![Role::Admin, Role::Management]);
		let table = [
			("root", "/", Access::RedirectTo("/login".to_string())),
			("login", "/login", Access::GuestOnly),
			("signup", "/signup", Access::GuestOnly),
			("dashboard", "/dashboard", student()),
			("new_issue", "/dashboard/issues/new", student()),
			("edit_issue", "/dashboard/issues/{issue_id}/edit", student()),
			("settings", "/dashboard/settings", student()),
			("admin", "/admin", staff),
		];

		let routes = table
			.into_iter()
			.filter_map(|(name, pattern, access)| match Route::new(name, pattern, access) {
				Ok(route) => Some(route),
				Err(e) => {
					tracing::error!(error = %e, name, "Skipping invalid built-in route");
					None
				}
			})
			.collect();

		Self { routes }
	}

	/// Decides what a navigation to `path` shows for `state`.
	pub fn evaluate(&self, state: &AuthState, path: &str) -> Decision {
		let path = normalize(path);
		let Some((route, params)) = self
			.routes
			.iter()
			.find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
		else {
			return Decision::NotFound;
		};

		let render = || {
			Decision::Render(RouteMatch {
				name: route.name.clone(),
				params: params.clone(),
			})
		};

		let decision = match (&route.access, state) {
			(Access::RedirectTo(target), _) => Decision::Redirect(target.clone()),
			(Access::Public, _) => render(),
			(_, AuthState::Authenticating) => Decision::Loading,
			(Access::GuestOnly, AuthState::Unauthenticated) => render(),
			(Access::GuestOnly, AuthState::Authenticated(user)) => {
				Decision::Redirect(user.role.home_path().to_string())
			}
			(Access::Roles(_), AuthState::Unauthenticated) => Decision::Redirect("/login".to_string()),
			(Access::Roles(roles), AuthState::Authenticated(user)) => {
				if roles.contains(&user.role) {
					render()
				} else {
					Decision::Redirect(user.role.home_path().to_string())
				}
			}
		};

		tracing::trace!(path, route = %route.name, ?decision, "Navigation evaluated");
		decision
	}
}

// Drops query and fragment, and a trailing slash on anything but the root.
fn normalize(path: &str) -> &str {
	let path = path.split(['?', '#']).next().unwrap_or(path);
	match path.strip_suffix('/') {
		Some(trimmed) if !trimmed.is_empty() => trimmed,
		_ => path,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn test_exact_pattern() {
		let pattern = RoutePattern::new("/admin").unwrap();

		assert!(pattern.is_match("/admin"));
		assert!(!pattern.is_match("/admin/users"));
		assert!(pattern.param_names().is_empty());
	}

	#[test]
	fn test_literal_dots_escaped() {
		let pattern = RoutePattern::new("/v1.0/status").unwrap();

		assert!(pattern.is_match("/v1.0/status"));
		assert!(!pattern.is_match("/v1x0/status"));
	}

	#[rstest]
	#[case("/issues/{id")]
	#[case("/issues/id}")]
	#[case("/issues/{}")]
	#[case("/issues/{1st}")]
	#[case("/issues/{a-b}")]
	#[case("/{id}/{id}")]
	fn test_malformed_patterns(#[case] pattern: &str) {
		assert!(matches!(
			RoutePattern::new(pattern),
			Err(GateError::InvalidPattern { .. })
		));
	}

	#[test]
	fn test_pattern_limits() {
		let long = format!("/{}", "a".repeat(MAX_PATTERN_LENGTH));
		let deep = "/s".repeat(MAX_PATH_SEGMENTS + 1);

		assert!(matches!(RoutePattern::new(&long), Err(GateError::PatternTooLarge(_))));
		assert!(matches!(RoutePattern::new(&deep), Err(GateError::PatternTooLarge(_))));
	}

	#[test]
	fn test_duplicate_route_name() {
		let mut gate = AccessGate::new();
		gate.register(Route::new("home", "/", Access::Public).unwrap()).unwrap();

		let result = gate.register(Route::new("home", "/home", Access::Public).unwrap());

		assert_eq!(result, Err(GateError::DuplicateName("home".into())));
	}

	#[rstest]
	#[case("/dashboard/", "/dashboard")]
	#[case("/dashboard?tab=mine", "/dashboard")]
	#[case("/admin#top", "/admin")]
	#[case("/", "/")]
	fn test_normalize(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(normalize(input), expected);
	}

	#[test]
	fn test_application_table_is_complete() {
		let gate = AccessGate::application();
		let names: Vec<_> = gate.routes().iter().map(Route::name).collect();

		assert_eq!(
			names,
			vec!["root", "login", "signup", "dashboard", "new_issue", "edit_issue", "settings", "admin"]
		);
	}
}
