//! The pending-change set a unit of work accumulates before commit.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  aggregate::{Aggregate, AggregateKind, Record},
  audit::{ChangeState, stamp},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
  Insert(Record),
  Update(Record),
  Delete { kind: AggregateKind, id: Uuid },
}

impl Change {
  pub fn kind(&self) -> AggregateKind {
    match self {
      Self::Insert(r) | Self::Update(r) => r.kind(),
      Self::Delete { kind, .. } => *kind,
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Insert(r) | Self::Update(r) => r.id(),
      Self::Delete { id, .. } => *id,
    }
  }
}

/// Staged inserts, updates and deletes, in the order they were made.
///
/// At most one entry exists per aggregate: staging a second change for the
/// same id folds it into the first (an update of a staged insert stays an
/// insert; deleting a staged insert drops it).
#[derive(Debug, Default)]
pub struct ChangeSet {
  changes: Vec<Change>,
}

impl ChangeSet {
  pub fn new() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool { self.changes.is_empty() }

  pub fn len(&self) -> usize { self.changes.len() }

  pub fn insert<A: Aggregate>(&mut self, aggregate: A) {
    let id = aggregate.id();
    self.remove(A::KIND, id);
    self.changes.push(Change::Insert(aggregate.into_record()));
  }

  pub fn update<A: Aggregate>(&mut self, aggregate: A) {
    let id = aggregate.id();
    match self.position(A::KIND, id) {
      Some(i) => {
        let record = aggregate.into_record();
        self.changes[i] = match self.changes[i] {
          Change::Insert(_) => Change::Insert(record),
          _ => Change::Update(record),
        };
      }
      None => self.changes.push(Change::Update(aggregate.into_record())),
    }
  }

  pub fn delete(&mut self, kind: AggregateKind, id: Uuid) {
    match self.remove(kind, id) {
      Some(Change::Insert(_)) => {}
      _ => self.changes.push(Change::Delete { kind, id }),
    }
  }

  /// The staged state of an aggregate.
  ///
  /// `None` if nothing is staged for `id`; `Some(None)` if it is staged for
  /// deletion.
  pub fn staged<A: Aggregate>(&self, id: Uuid) -> Option<Option<A>> {
    let i = self.position(A::KIND, id)?;
    match &self.changes[i] {
      Change::Insert(r) | Change::Update(r) => Some(A::from_record(r.clone())),
      Change::Delete { .. } => Some(None),
    }
  }

  /// `true` if any change touches aggregates of `kind`.
  pub fn touches(&self, kind: AggregateKind) -> bool {
    self.changes.iter().any(|c| c.kind() == kind)
  }

  /// Overlay staged changes of type `A` onto rows read from storage.
  pub fn overlay<A: Aggregate>(&self, mut committed: Vec<A>) -> Vec<A> {
    for change in self.changes.iter().filter(|c| c.kind() == A::KIND) {
      let id = change.id();
      committed.retain(|a| a.id() != id);
      if let Change::Insert(r) | Change::Update(r) = change {
        committed.extend(A::from_record(r.clone()));
      }
    }
    committed
  }

  /// Run the audit stamper over every staged insert and update.
  pub fn stamp(&mut self, actor: Option<&str>, now: DateTime<Utc>) {
    for change in &mut self.changes {
      match change {
        Change::Insert(r) => stamp(r.audit_mut(), ChangeState::Added, actor, now),
        Change::Update(r) => stamp(r.audit_mut(), ChangeState::Modified, actor, now),
        Change::Delete { .. } => {}
      }
    }
  }

  /// Hand the staged changes to the flusher, leaving the set empty.
  pub fn drain(&mut self) -> std::vec::Drain<'_, Change> { self.changes.drain(..) }

  fn position(&self, kind: AggregateKind, id: Uuid) -> Option<usize> {
    self.changes.iter().position(|c| c.kind() == kind && c.id() == id)
  }

  fn remove(&mut self, kind: AggregateKind, id: Uuid) -> Option<Change> {
    self.position(kind, id).map(|i| self.changes.remove(i))
  }
}
