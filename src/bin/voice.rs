//! Campus Voice CLI
//!
//! Drives a demo session against the local issue cache.
//!
//! ## Usage
//!
//! ```bash
//! voice create "Broken AC" "Room 204 is 35 degrees" --category facility
//! voice list --sort votes --status pending
//! voice vote 0b6c...
//! voice --role admin --official-id EMP-7 status 0b6c... solved
//! voice route /admin
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use voice::App;
use voice::auth::{AuthState, Decision};
use voice::conf::Settings;
use voice::core::{Category, Issue, IssueChanges, IssueId, IssueStatus, NewIssue, Role, User};
use voice::issues::{
	CategoryFilter, IssueQuery, SortOrder, StatusFilter, VoteOutcome, aggregate_stats,
	issues_authored_by, issues_voted_by, user_activity,
};

#[derive(Parser)]
#[command(name = "voice")]
#[command(about = "Campus Voice issue tracker", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// TOML settings file
	#[arg(short, long, value_name = "PATH", global = true)]
	config: Option<PathBuf>,

	/// Role of the demo principal (student, admin, management)
	#[arg(long, global = true)]
	role: Option<Role>,

	/// Official id, required for staff roles
	#[arg(long, value_name = "ID", global = true)]
	official_id: Option<String>,

	/// Display name of the demo principal
	#[arg(long, value_name = "NAME", global = true)]
	name: Option<String>,

	/// Verbosity level (can be repeated)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbosity: u8,
}

#[derive(Subcommand)]
enum Commands {
	/// Report a new issue
	Create {
		title: String,
		description: String,

		#[arg(long, default_value = "other")]
		category: Category,

		#[arg(long, value_name = "URL")]
		image_url: Option<String>,
	},

	/// List issues
	List {
		/// Category id or "all"
		#[arg(long, default_value = "all")]
		category: CategoryFilter,

		/// pending, solved or "all"
		#[arg(long, default_value = "all")]
		status: StatusFilter,

		/// recent or votes
		#[arg(long, default_value = "recent")]
		sort: SortOrder,

		/// Only issues you reported
		#[arg(long)]
		mine: bool,

		/// Only issues you voted for
		#[arg(long, conflicts_with = "mine")]
		voted: bool,
	},

	/// Show one issue in full
	Show { id: IssueId },

	/// Edit an issue you reported
	Edit {
		id: IssueId,

		#[arg(long)]
		title: Option<String>,

		#[arg(long)]
		description: Option<String>,

		#[arg(long)]
		category: Option<Category>,

		#[arg(long, value_name = "URL", conflicts_with = "clear_image")]
		image_url: Option<String>,

		/// Remove the attached image
		#[arg(long)]
		clear_image: bool,
	},

	/// Add your vote, or withdraw it
	Vote { id: IssueId },

	/// Set an issue's status (staff)
	Status { id: IssueId, status: IssueStatus },

	/// Attach an official note (staff)
	Note { id: IssueId, note: String },

	/// Delete an issue you reported
	Delete { id: IssueId },

	/// Collection totals and your own activity
	Stats,

	/// Show where a navigation to PATH ends up
	Route {
		path: String,

		/// Evaluate as a signed-out visitor
		#[arg(long)]
		guest: bool,
	},
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();

	if let Err(e) = run(cli).await {
		eprintln!("{} {:#}", "Error:".red(), e);
		process::exit(1);
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
	if let Some(role) = cli.role {
		settings.demo.role = role;
	}
	if let Some(official_id) = cli.official_id {
		settings.demo.official_id = Some(official_id);
	}
	if let Some(name) = cli.name {
		settings.demo.display_name = name;
	}
	settings.validate()?;

	voice::init_logging(&settings.logging, cli.verbosity).context("failed to install logger")?;

	let app = App::in_memory(settings);
	app.start().await;
	let user = app.sign_in_demo().await.context("demo sign-in failed")?;
	tracing::debug!(uid = %user.uid, role = %user.role, "Acting as demo principal");

	let result = execute(&app, &user, cli.command).await;
	app.shutdown().await?;
	result
}

async fn execute(app: &App, user: &User, command: Commands) -> anyhow::Result<()> {
	let repository = app.repository();

	match command {
		Commands::Create {
			title,
			description,
			category,
			image_url,
		} => {
			let mut input = NewIssue::new(title, description, category);
			if let Some(url) = image_url {
				input = input.with_image_url(url);
			}
			let id = repository.create_issue(input, Some(user)).await?;
			println!("{} {}", "Created".green(), id);
		}
		Commands::List {
			category,
			status,
			sort,
			mine,
			voted,
		} => {
			let mut issues = repository.issues().await?;
			if mine {
				issues = issues_authored_by(issues, &user.uid);
			}
			if voted {
				issues = issues_voted_by(issues, &user.uid);
			}
			let issues = IssueQuery::new()
				.category(category)
				.status(status)
				.sort(sort)
				.apply(issues);

			if issues.is_empty() {
				println!("No issues found.");
			}
			for issue in &issues {
				print_summary(issue, &user.uid);
			}
		}
		Commands::Show { id } => {
			let issue = repository
				.get_issue(id)
				.await?
				.with_context(|| format!("issue {id} not found"))?;
			print_detail(&issue, &user.uid);
		}
		Commands::Edit {
			id,
			title,
			description,
			category,
			image_url,
			clear_image,
		} => {
			let mut changes = IssueChanges::new();
			if let Some(title) = title {
				changes = changes.title(title);
			}
			if let Some(description) = description {
				changes = changes.description(description);
			}
			if let Some(category) = category {
				changes = changes.category(category);
			}
			if clear_image {
				changes = changes.image_url(None);
			} else if image_url.is_some() {
				changes = changes.image_url(image_url);
			}
			if changes.is_empty() {
				bail!("nothing to change: pass --title, --description, --category or an image flag");
			}
			repository.update_issue(id, changes, Some(user)).await?;
			println!("{} {}", "Updated".green(), id);
		}
		Commands::Vote { id } => match repository.toggle_vote(id, Some(user)).await? {
			VoteOutcome::Added => println!("{} {}", "Voted for".green(), id),
			VoteOutcome::Removed => println!("{} {}", "Withdrew vote from".yellow(), id),
			VoteOutcome::Missing => bail!("issue {id} not found"),
		},
		Commands::Status { id, status } => {
			repository.update_status(id, status, Some(user)).await?;
			println!("{} {} is now {}", "Updated".green(), id, status_label(status));
		}
		Commands::Note { id, note } => {
			repository.add_admin_note(id, &note, Some(user)).await?;
			println!("{} {}", "Noted".green(), id);
		}
		Commands::Delete { id } => {
			repository.delete_issue(id, Some(user)).await?;
			println!("{} {}", "Deleted".red(), id);
		}
		Commands::Stats => {
			let issues = repository.issues().await?;
			let stats = aggregate_stats(&issues);
			let activity = user_activity(&issues, &user.uid);

			println!("{}", "Campus".bold());
			println!("  total        {}", stats.total);
			println!("  pending      {}", stats.pending);
			println!("  solved       {}", stats.solved);
			println!("  total votes  {}", stats.total_votes);
			println!("{} ({})", user.display_name.bold(), user.role);
			println!("  posted       {}", activity.issues_posted);
			println!("  votes in     {}", activity.votes_received);
			println!("  voted on     {}", activity.voted_on);
		}
		Commands::Route { path, guest } => {
			let decision = if guest {
				app.gate().evaluate(&AuthState::Unauthenticated, &path)
			} else {
				app.navigate(&path)
			};
			match decision {
				Decision::Render(matched) => {
					print!("{} {}", "render".green(), matched.name);
					let mut params: Vec<_> = matched.params.iter().collect();
					params.sort();
					for (name, value) in params {
						print!(" {name}={value}");
					}
					println!();
				}
				Decision::Redirect(target) => println!("{} {}", "redirect".yellow(), target),
				Decision::Loading => println!("{}", "loading".dimmed()),
				Decision::NotFound => println!("{}", "not found".red()),
			}
		}
	}
	Ok(())
}

fn status_label(status: IssueStatus) -> colored::ColoredString {
	match status {
		IssueStatus::Pending => status.as_str().yellow(),
		IssueStatus::Solved => status.as_str().green(),
	}
}

fn print_summary(issue: &Issue, uid: &str) {
	let marker = if issue.has_voted(uid) { "*" } else { " " };
	println!(
		"{} {} {:>3} {:<8} {:<17} {}",
		issue.id.to_string().dimmed(),
		marker,
		issue.vote_count(),
		status_label(issue.status),
		issue.category.label(),
		issue.title
	);
}

fn print_detail(issue: &Issue, uid: &str) {
	println!("{}", issue.title.bold());
	println!("  id        {}", issue.id);
	println!("  category  {}", issue.category.label());
	println!("  status    {}", status_label(issue.status));
	println!(
		"  votes     {}{}",
		issue.vote_count(),
		if issue.has_voted(uid) { " (including yours)" } else { "" }
	);
	println!("  author    {} <{}>", issue.author_name, issue.author_email);
	println!("  created   {}", issue.created_at.to_rfc3339());
	println!("  updated   {}", issue.updated_at.to_rfc3339());
	if let Some(url) = &issue.image_url {
		println!("  image     {url}");
	}
	println!();
	println!("{}", issue.description);
	if let Some(note) = &issue.admin_notes {
		println!();
		println!(
			"{} {}",
			"Official note".bold(),
			issue
				.admin_updated_by
				.as_deref()
				.map(|by| format!("from {by}"))
				.unwrap_or_default()
		);
		println!("{note}");
	}
}
