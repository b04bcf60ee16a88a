use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::{Input, Password};
use std::path::PathBuf;
use tracing::{error, info, warn};

use voyant_hub::auth;
use voyant_hub::config::Settings;
use voyant_hub::constants::{ENV_SUPERUSER_PASSWORD, GROUP_REVIEWER, GROUP_SUPERADMIN};
use voyant_hub::db::{Database, LocaleFilter, TranslationFilter};
use voyant_hub::exporter::{self, ExportOptions};
use voyant_hub::importer::{self, ImportOptions};
use voyant_hub::logging;
use voyant_hub::metrics;
use voyant_hub::presets::{self, SeedOptions};
use voyant_hub::review::{self, Actor, ReviewAction, ReviewEdit};
use voyant_hub::server::{self, AppState};
use voyant_hub::types::{Provenance, TranslationStatus};

#[derive(Parser)]
#[command(name = "voyant_hub")]
#[command(about = "Translation hub for the Voyant skin strings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations and ensure the workflow groups exist
    Migrate,
    /// Check configuration and database access
    Check {
        /// Also report deployment-safety warnings
        #[arg(long)]
        deploy: bool,
    },
    /// Create a superuser (prompts unless --noinput)
    Createsuperuser {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Take the password from DJANGO_SUPERUSER_PASSWORD instead of prompting
        #[arg(long)]
        noinput: bool,
    },
    /// Change a user's password interactively
    Changepassword { username: String },
    /// Run the HTTP API
    #[command(alias = "runserver")]
    Serve {
        /// Port to listen on (defaults to PORT or 8000)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Seed curated Locale rows (disabled by default)
    SeedLocales {
        /// Preset name (only supported: global_plus_africa_india_chinese)
        #[arg(long)]
        preset: String,
        /// Seed locales with enabled=true
        #[arg(long)]
        enable: bool,
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Import a Voyant CSV as APPROVED / IMPORTED translations
    ImportVoyantCsv {
        /// Path to the Voyant CSV (defaults to the configured import path)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Parse and report counts without persisting
        #[arg(long)]
        dry_run: bool,
        /// Only process the first N valid rows
        #[arg(long)]
        limit: Option<usize>,
        /// Print per-translation actions
        #[arg(long)]
        verbose: bool,
    },
    /// Export one locale to the uniform CSV schema
    ExportLocaleCsv {
        /// Locale code to export (e.g. fr, yo, zh-hans)
        #[arg(long)]
        locale: String,
        #[command(flatten)]
        export: ExportArgs,
    },
    /// Export every enabled locale (or --locales) to the uniform CSV schema
    ExportAllLocales {
        /// Comma-separated locale codes, exported even when disabled
        #[arg(long)]
        locales: Option<String>,
        #[command(flatten)]
        export: ExportArgs,
    },
    /// Locale administration
    Locales {
        #[command(subcommand)]
        command: LocalesCommand,
    },
    /// User, group and locale-assignment administration
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Review workflow
    Translations {
        #[command(subcommand)]
        command: TranslationsCommand,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// Output directory, created if missing (defaults to the configured export dir)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Include the source_updated_on column
    #[arg(long)]
    include_source_updated: bool,
    /// Text written for missing translations
    #[arg(long, default_value = "")]
    missing_marker: String,
    /// Only export rows without an approved translation
    #[arg(long)]
    only_missing: bool,
}

impl ExportArgs {
    fn options(&self) -> ExportOptions {
        ExportOptions {
            include_source_updated: self.include_source_updated,
            missing_marker: self.missing_marker.clone(),
            only_missing: self.only_missing,
        }
    }

    fn out_dir(&self, settings: &Settings) -> PathBuf {
        self.out.clone().unwrap_or_else(|| settings.paths.export_dir.clone())
    }
}

#[derive(Subcommand)]
enum LocalesCommand {
    /// List locales ordered by code
    List {
        #[arg(long)]
        enabled: bool,
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Subcommand)]
enum UsersCommand {
    /// Create a user (password is prompted)
    Create {
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long)]
        superuser: bool,
        /// Create the account without a usable password
        #[arg(long)]
        no_password: bool,
    },
    /// Add a user to a group (L10N_REVIEWER, L10N_SUPERADMIN, ...)
    AddGroup { username: String, group: String },
    /// Assign a locale to a reviewer
    AssignLocale { username: String, locale: String },
    /// List users with their groups and assignments
    List,
}

#[derive(Args)]
struct ActingUser {
    /// Username to act as
    #[arg(long = "as", value_name = "USERNAME")]
    username: String,
}

#[derive(Subcommand)]
enum TranslationsCommand {
    /// List the translations visible to a user
    List {
        #[command(flatten)]
        actor: ActingUser,
        #[arg(long)]
        locale: Option<String>,
        #[arg(long)]
        status: Option<TranslationStatus>,
        #[arg(long)]
        provenance: Option<Provenance>,
        /// Only rows with (true) or without (false) QA warnings
        #[arg(long)]
        has_qa_warnings: Option<bool>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Edit one translation through the review workflow
    Review {
        id: i64,
        #[command(flatten)]
        actor: ActingUser,
        #[arg(long)]
        reviewer_text: Option<String>,
        #[arg(long)]
        approved_text: Option<String>,
        #[arg(long)]
        machine_draft: Option<String>,
        #[arg(long)]
        status: Option<TranslationStatus>,
        #[arg(long)]
        provenance: Option<Provenance>,
    },
    /// Approve the selected translations (super-admins only)
    Approve {
        #[command(flatten)]
        actor: ActingUser,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Set the selected translations to IN_REVIEW
    MarkInReview {
        #[command(flatten)]
        actor: ActingUser,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Set the selected translations to FLAGGED
    Flag {
        #[command(flatten)]
        actor: ActingUser,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Recompute QA flags for every translation
    RefreshQa,
}

fn open_database(settings: &Settings) -> Result<Database> {
    Database::open(&settings.database)
        .with_context(|| format!("Failed to open database {:?}", settings.database))
}

/// Prompt for a new password until it passes validation.
fn prompt_new_password(username: &str) -> Result<String> {
    loop {
        let password = Password::new()
            .with_prompt("Password")
            .with_confirmation("Password (again)", "Error: Your passwords didn't match.")
            .interact()?;
        match auth::validate_password(&password, username) {
            Ok(()) => return Ok(password),
            Err(e) => eprintln!("{e}"),
        }
    }
}

fn create_superuser(
    db: &Database,
    username: Option<String>,
    email: Option<String>,
    noinput: bool,
) -> Result<()> {
    let (username, email, password) = if noinput {
        let Some(username) = username else {
            bail!("You must use --username with --noinput.");
        };
        let password = std::env::var(ENV_SUPERUSER_PASSWORD)
            .ok()
            .filter(|p| !p.is_empty());
        if password.is_none() {
            warn!("{ENV_SUPERUSER_PASSWORD} is not set; the superuser has no usable password");
        }
        (username, email.unwrap_or_default(), password)
    } else {
        let username = match username {
            Some(u) => u,
            None => Input::<String>::new()
                .with_prompt("Username")
                .validate_with(|input: &String| {
                    auth::validate_username(input).map_err(|e| e.to_string())
                })
                .interact_text()?,
        };
        let email = match email {
            Some(e) => e,
            None => Input::<String>::new()
                .with_prompt("Email address")
                .allow_empty(true)
                .interact_text()?,
        };
        let password = prompt_new_password(&username)?;
        (username, email, Some(password))
    };

    auth::create_user(db, &username, &email, password.as_deref(), true)?;
    println!("Superuser created successfully.");
    Ok(())
}

fn run_locales(db: &Database, command: LocalesCommand) -> Result<()> {
    match command {
        LocalesCommand::List { enabled, search } => {
            let locales = db.list_locales(&LocaleFilter {
                enabled_only: enabled,
                search,
            })?;
            for l in &locales {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    l.code,
                    l.bcp47,
                    l.name,
                    l.script.as_deref().unwrap_or("-"),
                    if l.is_rtl { "rtl" } else { "ltr" },
                    if l.enabled { "enabled" } else { "disabled" },
                    l.legacy_column.as_deref().unwrap_or("-"),
                );
            }
            println!("{} locale(s)", locales.len());
        }
    }
    Ok(())
}

fn run_users(db: &Database, command: UsersCommand) -> Result<()> {
    match command {
        UsersCommand::Create {
            username,
            email,
            superuser,
            no_password,
        } => {
            auth::validate_username(&username)?;
            let password = if no_password {
                None
            } else {
                Some(prompt_new_password(&username)?)
            };
            let user = auth::create_user(db, &username, &email, password.as_deref(), superuser)?;
            println!("Created user {} (id {}).", user.username, user.id);
        }
        UsersCommand::AddGroup { username, group } => {
            let user = db
                .get_user_by_username(&username)?
                .with_context(|| format!("Unknown user: {username}"))?;
            if group != GROUP_REVIEWER && group != GROUP_SUPERADMIN {
                warn!(group = %group, "group is not used by the review workflow");
            }
            db.add_user_to_group(user.id, &group)?;
            println!("Added {username} to {group}.");
        }
        UsersCommand::AssignLocale { username, locale } => {
            let user = db
                .get_user_by_username(&username)?
                .with_context(|| format!("Unknown user: {username}"))?;
            let locale = db
                .get_locale_by_code(&locale)?
                .with_context(|| format!("Locale not found: {locale}"))?;
            if db.assign_locale(user.id, locale.id)? {
                println!("Assigned {} to {username}.", locale.code);
            } else {
                println!("{username} is already assigned to {}.", locale.code);
            }
        }
        UsersCommand::List => {
            let assignments = db.list_assignments()?;
            for user in db.list_users()? {
                let groups = db.user_groups(user.id)?;
                let locales: Vec<&str> = assignments
                    .iter()
                    .filter(|a| a.user_id == user.id)
                    .map(|a| a.locale_code.as_str())
                    .collect();
                println!(
                    "{}\t{}\tsuperuser={}\tactive={}\tgroups=[{}]\tlocales=[{}]",
                    user.username,
                    if user.email.is_empty() { "-" } else { user.email.as_str() },
                    user.is_superuser,
                    user.is_active,
                    groups.join(", "),
                    locales.join(", "),
                );
            }
        }
    }
    Ok(())
}

fn run_translations(db: &Database, command: TranslationsCommand) -> Result<()> {
    let (actor, action, ids) = match command {
        TranslationsCommand::List {
            actor,
            locale,
            status,
            provenance,
            has_qa_warnings,
            search,
        } => {
            let actor = Actor::by_username(db, &actor.username)?;
            let rows = review::visible_translations(
                db,
                &actor,
                TranslationFilter {
                    locale_code: locale,
                    status,
                    provenance,
                    has_qa_warnings,
                    search,
                    ..Default::default()
                },
            )?;
            for row in &rows {
                let t = &row.translation;
                println!(
                    "{}\t{}\t{}::{}\t{}\t{}\t{}",
                    t.id,
                    row.locale_code,
                    row.location,
                    row.message_id,
                    t.status,
                    t.provenance,
                    if t.has_qa_warnings() { "QA" } else { "-" },
                );
            }
            println!("{} translation(s)", rows.len());
            return Ok(());
        }
        TranslationsCommand::Review {
            id,
            actor,
            reviewer_text,
            approved_text,
            machine_draft,
            status,
            provenance,
        } => {
            let actor = Actor::by_username(db, &actor.username)?;
            review::visible_translation(db, &actor, id)?;
            let edit = ReviewEdit {
                approved_text,
                reviewer_text,
                machine_draft,
                status,
                provenance,
                ..Default::default()
            };
            let outcome = review::save_review(db, &actor, id, edit)?;
            for field in &outcome.ignored_fields {
                eprintln!("Ignored read-only field: {field}");
            }
            for warning in &outcome.warnings {
                eprintln!("Warning: {warning}");
            }
            let t = &outcome.translation;
            println!("Saved translation {} (status {}).", t.id, t.status);
            for flag in &t.qa_flags {
                println!("- QA {}: {}", flag.code, flag.message);
            }
            return Ok(());
        }
        TranslationsCommand::RefreshQa => {
            let summary = review::refresh_qa(db)?;
            println!(
                "Refreshed QA flags: {} translation(s), {} changed.",
                summary.total, summary.changed
            );
            return Ok(());
        }
        TranslationsCommand::Approve { actor, ids } => (actor, ReviewAction::Approve, ids),
        TranslationsCommand::MarkInReview { actor, ids } => {
            (actor, ReviewAction::MarkInReview, ids)
        }
        TranslationsCommand::Flag { actor, ids } => (actor, ReviewAction::Flag, ids),
    };

    let actor = Actor::by_username(db, &actor.username)?;
    let outcome = review::run_action(db, &actor, action, &ids)?;
    match action {
        ReviewAction::Approve => println!("Approved {} translation(s).", outcome.changed),
        ReviewAction::MarkInReview => {
            println!("Marked {} translation(s) as in review.", outcome.changed)
        }
        ReviewAction::Flag => println!("Flagged {} translation(s).", outcome.changed),
    }
    if outcome.selected < ids.len() {
        eprintln!(
            "Warning: {} selected id(s) are not visible to {}.",
            ids.len() - outcome.selected,
            actor.user.username
        );
    }
    Ok(())
}

fn check(settings: &Settings, deploy: bool) -> Result<()> {
    let db = open_database(settings)?;
    drop(db);

    let issues = if deploy { settings.deploy_warnings() } else { Vec::new() };
    if issues.is_empty() {
        println!("System check identified no issues (0 silenced).");
    } else {
        println!("System check identified some issues:");
        for issue in &issues {
            println!("WARNING: {issue}");
        }
        println!("System check identified {} issue(s) (0 silenced).", issues.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("Failed to load settings")?;

    match cli.command {
        Commands::Migrate => {
            let db = open_database(&settings)?;
            let applied = db.migrate()?;
            if applied.is_empty() {
                println!("No migrations to apply.");
            }
            for name in applied {
                println!("Applying {name}... OK");
            }
        }
        Commands::Check { deploy } => check(&settings, deploy)?,
        Commands::Createsuperuser {
            username,
            email,
            noinput,
        } => {
            let db = open_database(&settings)?;
            create_superuser(&db, username, email, noinput)?;
        }
        Commands::Changepassword { username } => {
            let db = open_database(&settings)?;
            if db.get_user_by_username(&username)?.is_none() {
                bail!("user '{username}' does not exist");
            }
            println!("Changing password for user '{username}'");
            let password = prompt_new_password(&username)?;
            auth::change_password(&db, &username, &password)?;
            println!("Password changed successfully for user '{username}'");
        }
        Commands::Serve { port } => {
            settings.require_secret_key()?;
            let db = open_database(&settings)?;
            let port = port.unwrap_or(settings.port);
            let handle = metrics::init_metrics();
            let state = AppState::new(db, settings, handle);
            if let Err(e) = server::start_server(state, port).await {
                error!("Server failed: {}", e);
                return Err(e.into());
            }
        }
        Commands::SeedLocales {
            preset,
            enable,
            dry_run,
        } => {
            let db = open_database(&settings)?;
            let summary = presets::seed_locales(
                &db,
                &SeedOptions {
                    preset,
                    enable,
                    dry_run,
                },
            )?;
            println!("{summary}");
        }
        Commands::ImportVoyantCsv {
            path,
            dry_run,
            limit,
            verbose,
        } => {
            let db = open_database(&settings)?;
            let path = path.unwrap_or_else(|| settings.paths.import_csv.clone());
            let report = importer::import_voyant_csv(
                &db,
                &ImportOptions {
                    path,
                    dry_run,
                    limit,
                    verbose,
                },
            )?;
            for line in &report.row_actions {
                println!("{line}");
            }
            println!("{}", report.counts);
        }
        Commands::ExportLocaleCsv { locale, export } => {
            let db = open_database(&settings)?;
            let stats = exporter::export_locale_csv(
                &db,
                &locale,
                &export.out_dir(&settings),
                &export.options(),
            )?;
            println!("{stats}");
        }
        Commands::ExportAllLocales { locales, export } => {
            let db = open_database(&settings)?;
            let requested = locales.as_deref().map(exporter::parse_locales_arg);
            let report = exporter::export_all_locales(
                &db,
                &export.out_dir(&settings),
                requested.as_deref(),
                &export.options(),
            )?;
            for code in &report.disabled_requested {
                eprintln!(
                    "Warning: locale {code} is disabled but will be exported due to --locales."
                );
            }
            println!("{report}");
            if !report.missing_requested.is_empty() && !report.exported.is_empty() {
                eprintln!(
                    "Missing locale(s) requested via --locales: {}",
                    report.missing_requested.join(", ")
                );
            }
            report.ensure_complete()?;
        }
        Commands::Locales { command } => {
            let db = open_database(&settings)?;
            run_locales(&db, command)?;
        }
        Commands::Users { command } => {
            let db = open_database(&settings)?;
            run_users(&db, command)?;
        }
        Commands::Translations { command } => {
            let db = open_database(&settings)?;
            run_translations(&db, command)?;
        }
    }

    info!("done");
    Ok(())
}
