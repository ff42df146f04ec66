//! User accounts and the identity handed back after sign-in.
//!
//! Email uniqueness is a repository concern; the entity only checks that its
//! own fields are present.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, audit::AuditMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Reader,
  Admin,
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Reader => "reader",
      Self::Admin => "admin",
    })
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "reader" => Ok(Self::Reader),
      "admin" => Ok(Self::Admin),
      other => Err(Error::validation(format!("unknown role: {other:?}"))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
  id:            Uuid,
  name:          String,
  email:         String,
  #[serde(skip_serializing)]
  password_hash: String,
  role:          Role,
  audit:         AuditMetadata,
}

impl User {
  pub fn create(name: &str, email: &str, password_hash: &str, role: Role) -> Result<Self> {
    let mut user = Self {
      id: Uuid::new_v4(),
      name: String::new(),
      email: String::new(),
      password_hash: String::new(),
      role,
      audit: AuditMetadata::default(),
    };
    user.set_name(name)?;
    user.set_email(email)?;
    user.set_password_hash(password_hash)?;
    Ok(user)
  }

  pub fn restore(
    id: Uuid,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    audit: AuditMetadata,
  ) -> Result<Self> {
    if id.is_nil() {
      return Err(Error::InvalidReference("user id"));
    }
    let mut user = Self::create(name, email, password_hash, role)?;
    user.id = id;
    user.audit = audit;
    Ok(user)
  }

  pub fn id(&self) -> Uuid { self.id }

  pub fn name(&self) -> &str { &self.name }

  pub fn email(&self) -> &str { &self.email }

  pub fn password_hash(&self) -> &str { &self.password_hash }

  pub fn role(&self) -> Role { self.role }

  pub fn audit(&self) -> &AuditMetadata { &self.audit }

  pub(crate) fn audit_mut(&mut self) -> &mut AuditMetadata { &mut self.audit }

  pub fn set_name(&mut self, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::validation("name is required"));
    }
    self.name = name.to_owned();
    Ok(())
  }

  pub fn set_email(&mut self, email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
      return Err(Error::validation("email is required"));
    }
    self.email = email.to_owned();
    Ok(())
  }

  /// The hash is stored verbatim; only blankness is checked.
  pub fn set_password_hash(&mut self, hash: &str) -> Result<()> {
    if hash.trim().is_empty() {
      return Err(Error::validation("password hash is required"));
    }
    self.password_hash = hash.to_owned();
    Ok(())
  }

  pub fn set_role(&mut self, role: Role) { self.role = role; }

  pub fn identity(&self) -> Identity {
    Identity {
      user_id: self.id,
      name:    self.name.clone(),
      email:   self.email.clone(),
      role:    self.role,
    }
  }
}

/// The authenticated caller, as returned by sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub user_id: Uuid,
  pub name:    String,
  pub email:   String,
  pub role:    Role,
}
