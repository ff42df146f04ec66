//! `shelf`: command-line front end for the lending library.
//!
//! Reads `shelf.toml` (or the path given with `--config`), opens the SQLite
//! store and runs one subcommand. Results are printed as pretty JSON.
//!
//! ```text
//! shelf seed
//! shelf add-book --title "Clean Code" --author "Robert C. Martin" --genre Tech --copies 2
//! shelf borrow --user <USER_ID> --book <BOOK_ID>
//! shelf history --user <USER_ID> --status borrowed
//! ```

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use shelf_core::{
  LoanStatus, RequestContext, Role, audit::ActorContext, password::PasswordHasher as _,
};
use shelf_lending::{
  Argon2Hasher, AuthService, BookUpdate, CatalogService, HistoryService, LendingService,
};
use shelf_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(author, version, about = "Shelf lending library")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "shelf.toml")]
  config: PathBuf,

  /// Identifier recorded as the actor in audit fields.
  #[arg(long, global = true)]
  actor: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print the argon2 hash for a password entered on stdin.
  HashPassword,

  /// Create the configured seed accounts that do not exist yet.
  Seed,

  /// Add a book to the catalog.
  AddBook {
    #[arg(long)]
    title:  String,
    #[arg(long)]
    author: String,
    #[arg(long)]
    genre:  String,
    #[arg(long, default_value_t = 1)]
    copies: i64,
  },

  /// Change the title, author or genre of an existing book.
  UpdateBook {
    id:     Uuid,
    #[arg(long)]
    title:  Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    genre:  Option<String>,
  },

  /// Remove a book from the catalog. Its loans are kept.
  DeleteBook { id: Uuid },

  /// Show one book.
  Book { id: Uuid },

  /// List every book by title.
  Books,

  /// Search the catalog by title, author or genre.
  Search {
    query:     Option<String>,
    #[arg(long, default_value_t = 1)]
    page:      i64,
    #[arg(long)]
    page_size: Option<i64>,
  },

  /// Borrow one copy of a book.
  Borrow {
    #[arg(long)]
    user: Uuid,
    #[arg(long)]
    book: Uuid,
  },

  /// Return a loan.
  Return { loan: Uuid },

  /// Show a user's loans, newest first.
  History {
    #[arg(long)]
    user:      Uuid,
    #[arg(long)]
    query:     Option<String>,
    /// `borrowed` or `returned`; omit for both.
    #[arg(long)]
    status:    Option<LoanStatus>,
    #[arg(long, default_value_t = 1)]
    page:      i64,
    #[arg(long)]
    page_size: Option<i64>,
  },

  /// Register an account. The password is read from stdin.
  SignUp {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "reader")]
    role:  Role,
  },

  /// Check credentials. The password is read from stdin.
  SignIn {
    #[arg(long)]
    email: String,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  // Helper mode: needs no config or store.
  if let Command::HashPassword = cli.command {
    return hash_password();
  }

  let cfg = CliConfig::load(&cli.config)?;
  let store_path = cfg.store_path();
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let ctx = RequestContext::for_actor(&ActorContext {
    user_id: cli.actor,
    ..ActorContext::anonymous()
  });

  run(cli.command, &cfg, store, ctx).await
}

async fn run(
  command: Command,
  cfg: &CliConfig,
  store: Arc<SqliteStore>,
  ctx: RequestContext,
) -> anyhow::Result<()> {
  let catalog = CatalogService::new(Arc::clone(&store));
  let lending = LendingService::new(Arc::clone(&store));
  let history = HistoryService::new(Arc::clone(&store));
  let auth = AuthService::new(Arc::clone(&store), Arc::new(Argon2Hasher));

  match command {
    Command::HashPassword => hash_password(),
    Command::Seed => {
      let created = auth.seed_users(ctx, &cfg.seed_users).await?;
      print_json(&json!({ "created": created }))
    }
    Command::AddBook { title, author, genre, copies } => {
      let id = catalog.add_book(ctx, &title, &author, &genre, copies).await?;
      print_json(&json!({ "book_id": id }))
    }
    Command::UpdateBook { id, title, author, genre } => {
      let changes = BookUpdate { title, author, genre };
      print_json(&catalog.update_book(ctx, id, changes).await?)
    }
    Command::DeleteBook { id } => {
      let deleted = catalog.delete_book(ctx, id).await?;
      print_json(&json!({ "book_id": id, "deleted": deleted }))
    }
    Command::Book { id } => print_json(&catalog.get_book(ctx, id).await?),
    Command::Books => print_json(&catalog.list_books(ctx).await?),
    Command::Search { query, page, page_size } => {
      let page_size = page_size.unwrap_or(cfg.default_page_size);
      print_json(&catalog.search(ctx, query.as_deref(), page, page_size).await?)
    }
    Command::Borrow { user, book } => print_json(&lending.borrow(ctx, user, book).await?),
    Command::Return { loan } => {
      let outcome = lending.return_loan(ctx, loan).await?;
      print_json(&json!({ "loan_id": loan, "outcome": outcome, "returned": outcome.returned() }))
    }
    Command::History { user, query, status, page, page_size } => {
      let page_size = page_size.unwrap_or(cfg.default_page_size);
      let items = history
        .history(ctx, user, query.as_deref(), status, page, page_size)
        .await?;
      print_json(&items)
    }
    Command::SignUp { name, email, role } => {
      let password = read_password()?;
      let id = auth.sign_up(ctx, &name, &email, &password, role).await?;
      print_json(&json!({ "user_id": id }))
    }
    Command::SignIn { email } => {
      let password = read_password()?;
      print_json(&auth.sign_in(ctx, &email, &password).await?)
    }
  }
}

fn hash_password() -> anyhow::Result<()> {
  let password = read_password()?;
  println!("{}", Argon2Hasher.hash(&password)?);
  Ok(())
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Read one password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
