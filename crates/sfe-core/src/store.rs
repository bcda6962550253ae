//! The `SalesStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `sfe-store-sqlite`).
//! Higher layers (`sfe-api`, `sfe-server`) depend on this abstraction, not on
//! any concrete backend.
//!
//! The store is plain data access. Tenant scoping, role checks and status
//! transitions are decided by callers using the types in this crate; the one
//! invariant a backend enforces itself is the single primary contact per
//! customer, because it spans several rows.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  customer::{AbcClass, Contact, Customer, NewContact, NewCustomer},
  notification::{NewNotification, Notification, NotificationPreferences},
  org::{Company, NewCompany, NewTeam, NewTerritory, NewUser, Role, Team, Territory, User},
  visit::{
    CallReport, NewPlan, NewReport, Photo, PlanStatus, PreCallPlan, ReportStatus, Revision,
  },
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`SalesStore::list_users`].
#[derive(Debug, Clone)]
pub struct UserQuery {
  pub company_id:   Uuid,
  pub role:         Option<Role>,
  pub team_id:      Option<Uuid>,
  pub territory_id: Option<Uuid>,
  /// Exclude deactivated users.
  pub active_only:  bool,
}

impl UserQuery {
  pub fn company(company_id: Uuid) -> Self {
    Self { company_id, role: None, team_id: None, territory_id: None, active_only: false }
  }
}

/// Parameters for [`SalesStore::list_customers`].
#[derive(Debug, Clone)]
pub struct CustomerQuery {
  pub company_id:   Uuid,
  pub territory_id: Option<Uuid>,
  pub class:        Option<AbcClass>,
  /// Case-insensitive substring match over name and code.
  pub text:         Option<String>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

impl CustomerQuery {
  pub fn company(company_id: Uuid) -> Self {
    Self { company_id, territory_id: None, class: None, text: None, limit: None, offset: None }
  }
}

/// Parameters for [`SalesStore::list_plans`]. Results are ordered by
/// `scheduled_at`.
#[derive(Debug, Clone)]
pub struct PlanQuery {
  pub company_id:      Uuid,
  pub sr_id:           Option<Uuid>,
  /// Restrict to plans owned by any of these reps (team/territory scoping).
  pub sr_ids:          Option<Vec<Uuid>>,
  pub customer_id:     Option<Uuid>,
  pub status:          Option<PlanStatus>,
  pub scheduled_after: Option<DateTime<Utc>>,
  /// Exclusive upper bound.
  pub scheduled_before: Option<DateTime<Utc>>,
}

impl PlanQuery {
  pub fn company(company_id: Uuid) -> Self {
    Self {
      company_id,
      sr_id: None,
      sr_ids: None,
      customer_id: None,
      status: None,
      scheduled_after: None,
      scheduled_before: None,
    }
  }
}

/// Parameters for [`SalesStore::list_reports`]. Results are ordered newest
/// first by `created_at`.
#[derive(Debug, Clone)]
pub struct ReportQuery {
  pub company_id:     Uuid,
  pub sr_id:          Option<Uuid>,
  pub sr_ids:         Option<Vec<Uuid>>,
  pub customer_id:    Option<Uuid>,
  pub plan_id:        Option<Uuid>,
  pub status:         Option<ReportStatus>,
  pub created_after:  Option<DateTime<Utc>>,
  /// Exclusive upper bound.
  pub created_before: Option<DateTime<Utc>>,
}

impl ReportQuery {
  pub fn company(company_id: Uuid) -> Self {
    Self {
      company_id,
      sr_id: None,
      sr_ids: None,
      customer_id: None,
      plan_id: None,
      status: None,
      created_after: None,
      created_before: None,
    }
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Error type of a [`SalesStore`] backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The write lost a race with another one: a uniqueness constraint
  /// rejected it, or the row no longer matches the revision it was read at.
  fn is_conflict(&self) -> bool;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an SFE storage backend.
///
/// `get_*` methods return `None` for unknown ids; `delete_*` methods return
/// whether a row was removed.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SalesStore: Send + Sync {
  type Error: StoreError;

  // ── Companies ─────────────────────────────────────────────────────────

  fn add_company(
    &self,
    input: NewCompany,
  ) -> impl Future<Output = Result<Company, Self::Error>> + Send + '_;

  fn get_company(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Company>, Self::Error>> + Send + '_;

  fn find_company_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Company>, Self::Error>> + Send + 'a;

  fn update_company<'a>(
    &'a self,
    company: &'a Company,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Territories ───────────────────────────────────────────────────────

  fn add_territory(
    &self,
    company_id: Uuid,
    input: NewTerritory,
  ) -> impl Future<Output = Result<Territory, Self::Error>> + Send + '_;

  fn get_territory(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Territory>, Self::Error>> + Send + '_;

  fn find_territory_by_code<'a>(
    &'a self,
    company_id: Uuid,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<Territory>, Self::Error>> + Send + 'a;

  fn list_territories(
    &self,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Territory>, Self::Error>> + Send + '_;

  fn update_territory<'a>(
    &'a self,
    territory: &'a Territory,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Number of customers, users and teams still assigned to the territory.
  fn count_territory_refs(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn delete_territory(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Teams ─────────────────────────────────────────────────────────────

  fn add_team(
    &self,
    company_id: Uuid,
    input: NewTeam,
  ) -> impl Future<Output = Result<Team, Self::Error>> + Send + '_;

  fn get_team(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Team>, Self::Error>> + Send + '_;

  fn list_teams(
    &self,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Team>, Self::Error>> + Send + '_;

  fn update_team<'a>(
    &'a self,
    team: &'a Team,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete_team(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Usernames are unique across all companies.
  fn find_user_by_username<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  fn list_users<'a>(
    &'a self,
    query: &'a UserQuery,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  /// Persist every field of `user`, including the password hash.
  fn update_user<'a>(
    &'a self,
    user: &'a User,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Customers ─────────────────────────────────────────────────────────

  /// The ABC class is computed from `monthly_revenue`.
  fn add_customer(
    &self,
    company_id: Uuid,
    input: NewCustomer,
  ) -> impl Future<Output = Result<Customer, Self::Error>> + Send + '_;

  fn get_customer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send + '_;

  fn find_customer_by_code<'a>(
    &'a self,
    company_id: Uuid,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send + 'a;

  fn list_customers<'a>(
    &'a self,
    query: &'a CustomerQuery,
  ) -> impl Future<Output = Result<Vec<Customer>, Self::Error>> + Send + 'a;

  fn update_customer<'a>(
    &'a self,
    customer: &'a Customer,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Number of pre-call plans and call reports for the customer.
  fn count_customer_refs(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Removes the customer together with its contacts.
  fn delete_customer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Contacts ──────────────────────────────────────────────────────────

  /// Add a contact. The first contact of a customer is always primary; a
  /// primary contact clears the flag on every sibling in the same
  /// transaction.
  fn add_contact<'a>(
    &'a self,
    customer: &'a Customer,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + 'a;

  fn get_contact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Primary contact first, then by creation time.
  fn list_contacts(
    &self,
    customer_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  /// Persist `contact`; if it is primary, siblings are demoted atomically.
  fn update_contact<'a>(
    &'a self,
    contact: &'a Contact,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Make `id` the only primary contact of its customer. Returns the updated
  /// contact, or `None` if it does not exist.
  fn set_primary_contact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Delete a contact; if it was primary, the oldest remaining contact of the
  /// customer is promoted.
  fn delete_contact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Pre-call plans ────────────────────────────────────────────────────

  /// New plans start in [`PlanStatus::Draft`].
  fn add_plan(
    &self,
    company_id: Uuid,
    sr_id: Uuid,
    input: NewPlan,
  ) -> impl Future<Output = Result<PreCallPlan, Self::Error>> + Send + '_;

  fn get_plan(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<PreCallPlan>, Self::Error>> + Send + '_;

  fn list_plans<'a>(
    &'a self,
    query: &'a PlanQuery,
  ) -> impl Future<Output = Result<Vec<PreCallPlan>, Self::Error>> + Send + 'a;

  /// Write back `plan`, read at `loaded`. Fails with a conflict when the
  /// stored plan has changed since.
  fn update_plan<'a>(
    &'a self,
    plan: &'a PreCallPlan,
    loaded: Revision<PlanStatus>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Only drafts are removed.
  fn delete_plan(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Call reports ──────────────────────────────────────────────────────

  /// New reports start in [`ReportStatus::Draft`] with no check-in.
  fn add_report(
    &self,
    company_id: Uuid,
    sr_id: Uuid,
    input: NewReport,
  ) -> impl Future<Output = Result<CallReport, Self::Error>> + Send + '_;

  fn get_report(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CallReport>, Self::Error>> + Send + '_;

  fn list_reports<'a>(
    &'a self,
    query: &'a ReportQuery,
  ) -> impl Future<Output = Result<Vec<CallReport>, Self::Error>> + Send + 'a;

  /// Write back `report`, read at `loaded`. Fails with a conflict when the
  /// stored report has changed since.
  fn update_report<'a>(
    &'a self,
    report: &'a CallReport,
    loaded: Revision<ReportStatus>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Removes a draft report together with its photo rows.
  fn delete_report(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Photos ────────────────────────────────────────────────────────────

  /// Fails with a conflict unless the report is still a draft.
  fn add_photo<'a>(
    &'a self,
    photo: &'a Photo,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn get_photo(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Photo>, Self::Error>> + Send + '_;

  fn list_photos(
    &self,
    report_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Photo>, Self::Error>> + Send + '_;

  /// Number of photo rows referencing `content_hash`; files are shared
  /// between identical uploads.
  fn count_photos_with_hash<'a>(
    &'a self,
    content_hash: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  fn delete_photo(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn add_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_notifications(
    &self,
    user_id: Uuid,
    unread_only: bool,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  fn count_unread(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Mark one of `user_id`'s notifications read. Returns the updated
  /// notification, or `None` if it does not exist or belongs to someone else.
  fn mark_read(
    &self,
    user_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  /// Returns how many notifications changed.
  fn mark_all_read(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn delete_notification(
    &self,
    user_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Read a user's preferences, creating the default row on first access.
  fn get_preferences(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<NotificationPreferences, Self::Error>> + Send + '_;

  fn update_preferences<'a>(
    &'a self,
    prefs: &'a NotificationPreferences,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
