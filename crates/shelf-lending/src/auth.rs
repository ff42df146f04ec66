//! Sign-up, sign-in and account seeding.
//!
//! Passwords only ever pass through the [`PasswordHasher`] port; this module
//! never sees or stores a plaintext beyond the call that received it.

use std::sync::Arc;

use serde::Deserialize;
use shelf_core::{
  Error, Identity, LibraryStore, RequestContext, Result, Role, UnitOfWork, User, Work,
  password::PasswordHasher,
};
use tracing::{info, warn};
use uuid::Uuid;

/// An account to create at startup if its email is not yet registered.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAccount {
  pub name:     String,
  pub email:    String,
  pub password: String,
  #[serde(default)]
  pub role:     Role,
}

// ─── Works ───────────────────────────────────────────────────────────────────

struct Register(User);

impl Work for Register {
  type Output = Uuid;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Uuid> {
    if uow.email_exists(self.0.email())? {
      return Err(Error::EmailTaken(self.0.email().to_owned()));
    }
    let id = self.0.id();
    uow.insert(self.0)?;
    uow.commit()?;
    Ok(id)
  }
}

struct FindByEmail(String);

impl Work for FindByEmail {
  type Output = Option<User>;

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Option<User>> { uow.user_by_email(&self.0) }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct AuthService<S, H> {
  store:  Arc<S>,
  hasher: Arc<H>,
}

impl<S, H> Clone for AuthService<S, H> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), hasher: Arc::clone(&self.hasher) }
  }
}

impl<S: LibraryStore, H: PasswordHasher> AuthService<S, H> {
  pub fn new(store: Arc<S>, hasher: Arc<H>) -> Self { Self { store, hasher } }

  /// Register a new account and return its id.
  ///
  /// Fails with [`Error::EmailTaken`] (nothing is inserted) if the email is
  /// already registered, and with [`Error::Validation`] for a blank name,
  /// email or password.
  pub async fn sign_up(
    &self,
    ctx: RequestContext,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
  ) -> Result<Uuid> {
    if password.is_empty() {
      return Err(Error::validation("password is required"));
    }
    let hash = self.hasher.hash(password)?;
    let user = User::create(name, email, &hash, role)?;
    let email = user.email().to_owned();

    match self.store.transact(ctx, Register(user)).await {
      Ok(id) => {
        info!(user_id = %id, %email, %role, "user signed up");
        Ok(id)
      }
      Err(e @ Error::EmailTaken(_)) => {
        warn!(%email, "sign-up rejected: email already registered");
        Err(e)
      }
      Err(e) => Err(e),
    }
  }

  /// Authenticate by email and password.
  ///
  /// An unknown email and a wrong password both yield
  /// [`Error::InvalidCredentials`].
  pub async fn sign_in(&self, ctx: RequestContext, email: &str, password: &str) -> Result<Identity> {
    let user = self
      .store
      .transact(ctx, FindByEmail(email.trim().to_owned()))
      .await?;

    match user {
      Some(user) if self.hasher.verify(user.password_hash(), password) => {
        info!(user_id = %user.id(), "user signed in");
        Ok(user.identity())
      }
      _ => {
        warn!(%email, "sign-in rejected");
        Err(Error::InvalidCredentials)
      }
    }
  }

  /// Create every account whose email is not yet registered. Returns the
  /// ids of the accounts created by this call.
  pub async fn seed_users(&self, ctx: RequestContext, accounts: &[SeedAccount]) -> Result<Vec<Uuid>> {
    let mut created = Vec::new();
    for account in accounts {
      let result = self
        .sign_up(ctx.clone(), &account.name, &account.email, &account.password, account.role)
        .await;
      match result {
        Ok(id) => created.push(id),
        Err(Error::EmailTaken(_)) => {}
        Err(e) => return Err(e),
      }
    }
    Ok(created)
  }
}
