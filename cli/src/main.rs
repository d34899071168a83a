//! repoguard: repository access decisions from the command line.
//!
//! Usage:
//!   repoguard check --user 1 --repo Bravo --action read
//!   repoguard check --user 1 --repo Bravo --action read --db forge.db --explain
//!   repoguard scenarios
//!   repoguard init-db forge.db
//!   repoguard show-policy --policy roles.toml
//!
//! `check` exits 0 on allow, 1 on deny, 2 on error.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use repoguard_biscuit::{Attenuation, BiscuitEvaluator, TokenIssuer};
use repoguard_contracts::{
    entity::UserId,
    error::{AuthzError, AuthzResult},
    request::{Credential, Decision, RequestContext, Verdict},
    role::Action,
};
use repoguard_core::{traits::RelationshipStore, Authorizer, ClosureResolver};
use repoguard_policy::RoleActionPolicy;
use repoguard_ref_forge::mock_data::{forge_graph, seed_sqlite};
use repoguard_store::{InMemoryStore, SqliteStore};

use crate::config::Settings;

// ── CLI definition ────────────────────────────────────────────────────────────

/// repoguard: group-closure and role-aggregation access decisions.
#[derive(Parser)]
#[command(
    name = "repoguard",
    about = "Decide whether a user may act on a repo",
    long_about = "Resolves a user's usergroup closure, gathers the role assignments relevant\n\
                  to a repo and its repogroups, and decides an action against a role table."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide one request.
    Check(CheckArgs),
    /// Run every reference forge scenario.
    Scenarios,
    /// Create a SQLite database holding the reference forge.
    InitDb {
        path: PathBuf,
    },
    /// Print a role table and its fingerprint.
    ShowPolicy {
        #[arg(long)]
        policy: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// User id.
    #[arg(long)]
    user: i64,
    /// Repo name.
    #[arg(long)]
    repo: String,
    /// membership, write, or read.
    #[arg(long)]
    action: Action,
    /// SQLite database; the built-in forge is used when absent.
    #[arg(long)]
    db: Option<PathBuf>,
    /// Role table TOML.
    #[arg(long)]
    policy: Option<PathBuf>,
    /// Settings TOML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Present a credential valid for this many seconds.
    #[arg(long)]
    token_ttl: Option<u64>,
    /// Print the request context, fact set, and evaluator trace.
    #[arg(long)]
    explain: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // Set RUST_LOG=debug for per-request pipeline logs.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Check(args) => check(&args).map(|allowed| {
            if allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }),
        Command::Scenarios => repoguard_ref_forge::scenarios::run_all().map(|()| ExitCode::SUCCESS),
        Command::InitDb { path } => init_db(&path).map(|()| ExitCode::SUCCESS),
        Command::ShowPolicy { policy } => show_policy(policy.as_deref()).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

// ── check ─────────────────────────────────────────────────────────────────────

fn check(args: &CheckArgs) -> AuthzResult<bool> {
    let settings = Settings::load(args.config.as_deref())?;
    let database = args.db.as_ref().or(settings.database.as_ref());
    let policy_path = args.policy.as_ref().or(settings.policy.as_ref());
    let ttl = args.token_ttl.or(settings.token_ttl_secs);

    let store: Box<dyn RelationshipStore> = match database {
        Some(path) => Box::new(SqliteStore::open_existing(path, settings.busy_timeout())?),
        None => {
            info!("no database given; serving the reference forge from memory");
            Box::new(InMemoryStore::new(forge_graph()))
        }
    };
    let mut authz = Authorizer::new(store, Box::new(load_policy(policy_path.map(PathBuf::as_path))?));

    let user = UserId(args.user);
    let now = Utc::now();
    let credential = match ttl {
        Some(secs) => {
            let issuer = TokenIssuer::new();
            let evaluator = BiscuitEvaluator::new(issuer.public_key()).with_time_limit(settings.evaluator_time_limit());
            authz = authz.with_evaluator(Box::new(evaluator));
            Some(issue_credential(&issuer, user, secs, now)?)
        }
        None => None,
    };

    let decision = if args.explain {
        let ctx = authz.context(user, &args.repo, args.action)?;
        print_context(&ctx);
        println!("facts:");
        for line in authz.facts(&ctx, now).render().lines() {
            println!("  {}", line);
        }
        let decision = authz.decide(&ctx, credential.as_ref(), now)?;
        if let Some(outcome) = &decision.evaluator {
            println!("evaluator trace:");
            for line in outcome.trace.lines() {
                println!("  {}", line);
            }
        }
        decision
    } else {
        authz.authorize_at(user, &args.repo, args.action, credential.as_ref(), now)?
    };

    print_decision(&decision);
    Ok(decision.is_allowed())
}

fn issue_credential(issuer: &TokenIssuer, user: UserId, secs: u64, now: DateTime<Utc>) -> AuthzResult<Credential> {
    let ttl = i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| AuthzError::ConfigError {
            reason: format!("token ttl of {} seconds is out of range", secs),
        })?;
    let token = issuer.issue(user)?;
    issuer.attenuate(&token, Attenuation::ExpiresAt(now + ttl))
}

fn load_policy(path: Option<&Path>) -> AuthzResult<RoleActionPolicy> {
    match path {
        Some(path) => RoleActionPolicy::from_file(path),
        None => Ok(RoleActionPolicy::standard()),
    }
}

fn print_context(ctx: &RequestContext) {
    let resolver = ClosureResolver::new();
    println!("request {}", ctx.request_id);
    println!("  user:   {} ({})", ctx.user.name, ctx.user.id.namespaced());
    println!("  repo:   {} ({})", ctx.repo.name, ctx.repo.id.namespaced());
    println!("  action: {}", ctx.action);
    println!("  groups:");
    for group in ctx.closure.groups() {
        let via = resolver
            .path_to(&ctx.closure, group)
            .map(|p| p.iter().map(|g| g.namespaced()).collect::<Vec<_>>().join(" > "))
            .unwrap_or_default();
        println!("    {} via {}", group.namespaced(), via);
    }
    println!("  repogroups:");
    for id in ctx.repogroup_ids() {
        println!("    {}", id.namespaced());
    }
    println!("  relevant assignments:");
    for a in &ctx.assignments {
        println!("    {}", a);
    }
}

fn print_decision(decision: &Decision) {
    match &decision.verdict {
        Verdict::Allow { grant } => println!(
            "ALLOW {} {} {} via {}",
            decision.user.name, decision.action, decision.repo.name, grant
        ),
        Verdict::Deny { reason } => println!(
            "DENY {} {} {}: {}",
            decision.user.name, decision.action, decision.repo.name, reason
        ),
    }
    println!("policy {}", decision.policy_version);
}

// ── init-db / show-policy ─────────────────────────────────────────────────────

fn init_db(path: &Path) -> AuthzResult<()> {
    let store = seed_sqlite(path, repoguard_store::DEFAULT_BUSY_TIMEOUT)?;
    let grants: i64 = store.with_connection(|c| {
        c.query_row(
            "SELECT (SELECT COUNT(*) FROM user_repo_roles) + (SELECT COUNT(*) FROM usergroup_repo_roles) \
             + (SELECT COUNT(*) FROM user_repogroup_roles) + (SELECT COUNT(*) FROM usergroup_repogroup_roles)",
            [],
            |r| r.get(0),
        )
    })?;
    println!("initialized {} with the reference forge ({} role grants)", path.display(), grants);
    Ok(())
}

fn show_policy(path: Option<&Path>) -> AuthzResult<()> {
    let policy = load_policy(path)?;
    println!("# version:     {}", policy.name());
    println!("# fingerprint: {}", policy.fingerprint());
    println!();
    print!("{}", policy.to_toml()?);
    Ok(())
}
