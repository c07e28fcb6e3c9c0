//! Issue model
//!
//! An [`Issue`] is created by a student, voted on by anyone signed in and
//! triaged by staff. Mutations are expressed as an [`IssuePatch`] so every
//! storage backend applies them the same way.

use crate::error::{Error, Result};
use crate::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Issue identifier, generated at creation time.
pub type IssueId = Uuid;

/// Maximum title length in characters.
pub const TITLE_MAX_CHARS: usize = 100;

/// Maximum description length in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

/// Fixed set of issue categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
	BugReport,
	FeatureRequest,
	Infrastructure,
	Academic,
	Facility,
	Other,
}

impl Category {
	/// All categories in display order.
	pub const ALL: [Category; 6] = [
		Category::BugReport,
		Category::FeatureRequest,
		Category::Infrastructure,
		Category::Academic,
		Category::Facility,
		Category::Other,
	];

	/// Kebab-case identifier used on the wire.
	pub fn id(self) -> &'static str {
		match self {
			Category::BugReport => "bug-report",
			Category::FeatureRequest => "feature-request",
			Category::Infrastructure => "infrastructure",
			Category::Academic => "academic",
			Category::Facility => "facility",
			Category::Other => "other",
		}
	}

	/// Human readable label.
	pub fn label(self) -> &'static str {
		match self {
			Category::BugReport => "Bug Report",
			Category::FeatureRequest => "Feature Request",
			Category::Infrastructure => "Infrastructure",
			Category::Academic => "Academic",
			Category::Facility => "Facility",
			Category::Other => "Other",
		}
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.id())
	}
}

impl FromStr for Category {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		let needle = s.trim();
		Category::ALL
			.into_iter()
			.find(|category| category.id() == needle)
			.ok_or_else(|| Error::validation(format!("unknown category: {needle}")))
	}
}

/// Triage status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
	#[default]
	Pending,
	Solved,
}

impl IssueStatus {
	/// Lowercase identifier used on the wire.
	pub fn as_str(self) -> &'static str {
		match self {
			IssueStatus::Pending => "pending",
			IssueStatus::Solved => "solved",
		}
	}
}

impl fmt::Display for IssueStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for IssueStatus {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"pending" => Ok(IssueStatus::Pending),
			"solved" => Ok(IssueStatus::Solved),
			other => Err(Error::validation(format!("unknown status: {other}"))),
		}
	}
}

/// Issue entity.
///
/// Field names serialize in camelCase (`categoryId`, `authorId`, ...) so the
/// stored collection keeps the shape existing clients already read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
	pub id: IssueId,
	pub title: String,
	pub description: String,
	#[serde(rename = "categoryId")]
	pub category: Category,
	/// Author snapshot taken at creation time.
	pub author_id: String,
	pub author_name: String,
	pub author_email: String,
	#[serde(default)]
	pub status: IssueStatus,
	/// Uids currently endorsing this issue.
	#[serde(default)]
	pub votes: BTreeSet<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub admin_notes: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub admin_updated_by: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub admin_updated_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Issue {
	/// Builds a fresh pending issue authored by `author`.
	///
	/// `input` is expected to be validated already (see [`NewIssue::validated`]).
	pub fn new(id: IssueId, input: NewIssue, author: &User, now: DateTime<Utc>) -> Self {
		Self {
			id,
			title: input.title,
			description: input.description,
			category: input.category,
			author_id: author.uid.clone(),
			author_name: author.display_name.clone(),
			author_email: author.email.clone(),
			status: IssueStatus::Pending,
			votes: BTreeSet::new(),
			image_url: input.image_url,
			admin_notes: None,
			admin_updated_by: None,
			admin_updated_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	/// Number of distinct voters.
	pub fn vote_count(&self) -> usize {
		self.votes.len()
	}

	/// Whether `uid` currently endorses this issue.
	pub fn has_voted(&self, uid: &str) -> bool {
		self.votes.contains(uid)
	}

	/// Whether `uid` created this issue.
	pub fn is_authored_by(&self, uid: &str) -> bool {
		self.author_id == uid
	}

	/// Applies a field-level update in place.
	pub fn apply(&mut self, patch: &IssuePatch) {
		if let Some(title) = &patch.title {
			self.title = title.clone();
		}
		if let Some(description) = &patch.description {
			self.description = description.clone();
		}
		if let Some(category) = patch.category {
			self.category = category;
		}
		if let Some(image_url) = &patch.image_url {
			self.image_url = image_url.clone();
		}
		if let Some(status) = patch.status {
			self.status = status;
		}
		if let Some(note) = &patch.admin_note {
			self.admin_notes = Some(note.note.clone());
			self.admin_updated_by = Some(note.updated_by.clone());
			self.admin_updated_at = Some(note.updated_at);
		}
		self.updated_at = patch.updated_at;
	}
}

/// Input for creating an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
	pub title: String,
	pub description: String,
	pub category: Category,
	pub image_url: Option<String>,
}

impl NewIssue {
	/// Creates an input without an image.
	pub fn new(title: impl Into<String>, description: impl Into<String>, category: Category) -> Self {
		Self {
			title: title.into(),
			description: description.into(),
			category,
			image_url: None,
		}
	}

	/// Attaches an image reference.
	pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
		self.image_url = Some(image_url.into());
		self
	}

	/// Trims text fields and checks their lengths.
	///
	/// # Examples
	///
	/// ```
	/// use voice_core::{Category, NewIssue};
	///
	/// let input = NewIssue::new("  Broken AC ", "Room 204 is hot", Category::Facility)
	///     .validated()
	///     .unwrap();
	/// assert_eq!(input.title, "Broken AC");
	///
	/// assert!(NewIssue::new("   ", "text", Category::Other).validated().is_err());
	/// ```
	pub fn validated(mut self) -> Result<Self> {
		self.title = validate_text("title", &self.title, TITLE_MAX_CHARS)?;
		self.description = validate_text("description", &self.description, DESCRIPTION_MAX_CHARS)?;
		self.image_url = self.image_url.filter(|url| !url.trim().is_empty());
		Ok(self)
	}
}

/// Author-editable fields of an issue; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueChanges {
	pub title: Option<String>,
	pub description: Option<String>,
	pub category: Option<Category>,
	/// `Some(None)` removes the image.
	pub image_url: Option<Option<String>>,
}

impl IssueChanges {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn title(mut self, title: impl Into<String>) -> Self {
		self.title = Some(title.into());
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn category(mut self, category: Category) -> Self {
		self.category = Some(category);
		self
	}

	pub fn image_url(mut self, image_url: Option<String>) -> Self {
		self.image_url = Some(image_url);
		self
	}

	/// Whether no field is set.
	pub fn is_empty(&self) -> bool {
		self.title.is_none()
			&& self.description.is_none()
			&& self.category.is_none()
			&& self.image_url.is_none()
	}

	/// Applies the same text rules as [`NewIssue::validated`] to the fields present.
	pub fn validated(mut self) -> Result<Self> {
		if let Some(title) = self.title.take() {
			self.title = Some(validate_text("title", &title, TITLE_MAX_CHARS)?);
		}
		if let Some(description) = self.description.take() {
			self.description = Some(validate_text(
				"description",
				&description,
				DESCRIPTION_MAX_CHARS,
			)?);
		}
		if let Some(image_url) = self.image_url.take() {
			self.image_url = Some(image_url.filter(|url| !url.trim().is_empty()));
		}
		Ok(self)
	}
}

/// Official annotation attached by staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminNote {
	pub note: String,
	pub updated_by: String,
	pub updated_at: DateTime<Utc>,
}

/// Field-level update understood by every storage backend.
///
/// Always carries the new `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuePatch {
	pub title: Option<String>,
	pub description: Option<String>,
	pub category: Option<Category>,
	pub image_url: Option<Option<String>>,
	pub status: Option<IssueStatus>,
	pub admin_note: Option<AdminNote>,
	pub updated_at: DateTime<Utc>,
}

impl IssuePatch {
	/// A patch that only bumps `updated_at`.
	pub fn touch(now: DateTime<Utc>) -> Self {
		Self {
			title: None,
			description: None,
			category: None,
			image_url: None,
			status: None,
			admin_note: None,
			updated_at: now,
		}
	}

	/// Author edits.
	pub fn from_changes(changes: IssueChanges, now: DateTime<Utc>) -> Self {
		Self {
			title: changes.title,
			description: changes.description,
			category: changes.category,
			image_url: changes.image_url,
			..Self::touch(now)
		}
	}

	/// Status change.
	pub fn status(status: IssueStatus, now: DateTime<Utc>) -> Self {
		Self {
			status: Some(status),
			..Self::touch(now)
		}
	}

	/// Staff annotation; `updated_at` follows the note timestamp.
	pub fn note(note: AdminNote) -> Self {
		let now = note.updated_at;
		Self {
			admin_note: Some(note),
			..Self::touch(now)
		}
	}
}

fn validate_text(field: &str, value: &str, max_chars: usize) -> Result<String> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Err(Error::validation(format!("{field} must not be empty")));
	}
	let length = trimmed.chars().count();
	if length > max_chars {
		return Err(Error::validation(format!(
			"{field} is {length} characters, the limit is {max_chars}"
		)));
	}
	Ok(trimmed.to_string())
}
