//! Audit metadata and the stamper that fills it in at commit time.
//!
//! Application code never writes these fields. A unit of work calls
//! [`stamp`] once per pending change immediately before flushing, driven by
//! the actor resolved for the current request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Creation and modification metadata embedded in every aggregate.
///
/// `created_at` is `None` until the aggregate's first commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetadata {
  pub created_at:  Option<DateTime<Utc>>,
  pub created_by:  Option<String>,
  pub modified_at: Option<DateTime<Utc>>,
  pub modified_by: Option<String>,
}

/// How a pending change will reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
  Added,
  Modified,
}

/// Apply audit metadata for a change in `state`.
///
/// Added entities get `created_*`; an absent actor keeps whatever
/// `created_by` was already there. Modified entities get `modified_*` and
/// their `created_*` fields are left alone.
pub fn stamp(
  meta: &mut AuditMetadata,
  state: ChangeState,
  actor: Option<&str>,
  now: DateTime<Utc>,
) {
  match state {
    ChangeState::Added => {
      meta.created_at = Some(now);
      if let Some(actor) = actor {
        meta.created_by = Some(actor.to_owned());
      }
    }
    ChangeState::Modified => {
      meta.modified_at = Some(now);
      meta.modified_by = actor.map(str::to_owned);
    }
  }
}

// ─── Current actor ───────────────────────────────────────────────────────────

/// Supplies whatever is known about the caller of the current request.
pub trait CurrentActor {
  fn user_id(&self) -> Option<&str>;
  fn email(&self) -> Option<&str>;
  fn display_name(&self) -> Option<&str>;
}

/// Pick the identifier recorded in audit metadata.
///
/// Fallback chain, in order: user id, then email, then display name. Blank
/// values are skipped. `None` means an anonymous or system actor, which is
/// valid.
pub fn resolve_actor(actor: &impl CurrentActor) -> Option<String> {
  [actor.user_id(), actor.email(), actor.display_name()]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(str::to_owned)
}

/// A plain [`CurrentActor`] built from whatever the transport layer knows.
#[derive(Debug, Clone, Default)]
pub struct ActorContext {
  pub user_id:      Option<String>,
  pub email:        Option<String>,
  pub display_name: Option<String>,
}

impl ActorContext {
  pub fn anonymous() -> Self { Self::default() }

  pub fn user(user_id: impl Into<String>) -> Self {
    Self { user_id: Some(user_id.into()), ..Self::default() }
  }
}

impl CurrentActor for ActorContext {
  fn user_id(&self) -> Option<&str> { self.user_id.as_deref() }

  fn email(&self) -> Option<&str> { self.email.as_deref() }

  fn display_name(&self) -> Option<&str> { self.display_name.as_deref() }
}
