//! [`SqliteStore`]: the SQLite implementation of [`SalesStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{OptionalExtension as _, Row, params, params_from_iter, types::Value};
use uuid::Uuid;

use sfe_core::{
  customer::{AbcClass, Contact, Customer, NewContact, NewCustomer},
  notification::{NewNotification, Notification, NotificationPreferences},
  org::{Company, NewCompany, NewTeam, NewTerritory, NewUser, Team, Territory, User},
  store::{CustomerQuery, PlanQuery, ReportQuery, SalesStore, UserQuery},
  visit::{
    CallReport, NewPlan, NewReport, Photo, PlanStatus, PreCallPlan, ReportStatus, Revision,
  },
};

use crate::{
  Error, Result,
  encode::{
    COMPANY_COLUMNS, CONTACT_COLUMNS, CUSTOMER_COLUMNS, NOTIFICATION_COLUMNS, PHOTO_COLUMNS,
    PLAN_COLUMNS, PREFERENCES_COLUMNS, REPORT_COLUMNS, RawCompany, RawContact, RawCustomer,
    RawNotification, RawPhoto, RawPlan, RawPreferences, RawReport, RawTeam, RawTerritory,
    RawUser, TEAM_COLUMNS, TERRITORY_COLUMNS, USER_COLUMNS, encode_dt, encode_opt_dt,
    encode_opt_uuid, encode_uuid, encode_uuid_list, like_pattern,
  },
  schema::SCHEMA,
};

/// Current time at the precision timestamps are stored with, so values read
/// back compare equal to the ones returned from inserts.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

type RowFn<R> = fn(&Row<'_>) -> rusqlite::Result<R>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An SFE store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening sqlite store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a statement and return the number of changed rows.
  async fn execute(&self, sql: &'static str, values: Vec<Value>) -> Result<usize> {
    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, params_from_iter(values))?))
      .await?;
    Ok(changed)
  }

  /// Like [`Self::execute`] but fails with [`Error::NotFound`] when no row
  /// matched.
  async fn execute_one(
    &self,
    sql: &'static str,
    values: Vec<Value>,
    entity: &'static str,
    id: Uuid,
  ) -> Result<()> {
    match self.execute(sql, values).await? {
      0 => Err(Error::NotFound { entity, id }),
      _ => Ok(()),
    }
  }

  /// Like [`Self::execute`] but fails with [`Error::Conflict`] when no row
  /// matched, for updates guarded on the state the row was read in.
  async fn execute_guarded(
    &self,
    sql: &'static str,
    values: Vec<Value>,
    entity: &'static str,
    id: Uuid,
  ) -> Result<()> {
    match self.execute(sql, values).await? {
      0 => {
        tracing::debug!(%id, entity, "guarded update matched no row");
        Err(Error::Conflict(format!("{entity} {id} was changed by another request")))
      }
      _ => Ok(()),
    }
  }

  async fn select<R: Send + 'static>(
    &self,
    sql: String,
    values: Vec<Value>,
    map: RowFn<R>,
  ) -> Result<Vec<R>> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(values), map)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn select_opt<R: Send + 'static>(
    &self,
    sql: String,
    values: Vec<Value>,
    map: RowFn<R>,
  ) -> Result<Option<R>> {
    let row = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, params_from_iter(values), map).optional()?))
      .await?;
    Ok(row)
  }

  async fn count(&self, sql: &'static str, values: Vec<Value>) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(sql, params_from_iter(values), |r| r.get(0))?))
      .await?;
    Ok(n.max(0) as u64)
  }

  async fn contact_by_id(&self, id: Uuid) -> Result<Option<Contact>> {
    let raw = self
      .select_opt(
        format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE contact_id = ?1"),
        vec![encode_uuid(id).into()],
        RawContact::from_row,
      )
      .await?;
    raw.map(RawContact::into_contact).transpose()
  }
}

fn opt_text(value: Option<String>) -> Value { value.into() }

fn opt_real(value: Option<f64>) -> Value { value.into() }

fn limit_value(limit: Option<usize>) -> Value {
  // SQLite treats a negative LIMIT as unbounded.
  Value::Integer(limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX)))
}

// ─── SalesStore impl ─────────────────────────────────────────────────────────

impl SalesStore for SqliteStore {
  type Error = Error;

  // ── Companies ─────────────────────────────────────────────────────────────

  async fn add_company(&self, input: NewCompany) -> Result<Company> {
    input.validate()?;
    let at = now();
    let company = Company {
      company_id: Uuid::new_v4(),
      name:       input.name.trim().to_owned(),
      timezone:   input.timezone,
      currency:   input.currency,
      created_at: at,
      updated_at: at,
    };

    self
      .execute(
        "INSERT INTO companies (company_id, name, timezone, currency, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        vec![
          encode_uuid(company.company_id).into(),
          company.name.clone().into(),
          company.timezone.clone().into(),
          company.currency.clone().into(),
          encode_dt(at).into(),
          encode_dt(at).into(),
        ],
      )
      .await?;
    Ok(company)
  }

  async fn get_company(&self, id: Uuid) -> Result<Option<Company>> {
    let raw = self
      .select_opt(
        format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE company_id = ?1"),
        vec![encode_uuid(id).into()],
        RawCompany::from_row,
      )
      .await?;
    raw.map(RawCompany::into_company).transpose()
  }

  async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>> {
    let raw = self
      .select_opt(
        format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE name = ?1"),
        vec![name.trim().to_owned().into()],
        RawCompany::from_row,
      )
      .await?;
    raw.map(RawCompany::into_company).transpose()
  }

  async fn update_company(&self, company: &Company) -> Result<()> {
    self
      .execute_one(
        "UPDATE companies SET name = ?2, timezone = ?3, currency = ?4, updated_at = ?5
         WHERE company_id = ?1",
        vec![
          encode_uuid(company.company_id).into(),
          company.name.clone().into(),
          company.timezone.clone().into(),
          company.currency.clone().into(),
          encode_dt(company.updated_at).into(),
        ],
        "company",
        company.company_id,
      )
      .await
  }

  // ── Territories ───────────────────────────────────────────────────────────

  async fn add_territory(&self, company_id: Uuid, input: NewTerritory) -> Result<Territory> {
    input.validate()?;
    let territory = Territory {
      territory_id: Uuid::new_v4(),
      company_id,
      code: input.code.trim().to_owned(),
      name: input.name.trim().to_owned(),
      description: input.description,
      created_at: now(),
    };

    self
      .execute(
        "INSERT INTO territories (territory_id, company_id, code, name, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        vec![
          encode_uuid(territory.territory_id).into(),
          encode_uuid(company_id).into(),
          territory.code.clone().into(),
          territory.name.clone().into(),
          opt_text(territory.description.clone()),
          encode_dt(territory.created_at).into(),
        ],
      )
      .await?;
    Ok(territory)
  }

  async fn get_territory(&self, id: Uuid) -> Result<Option<Territory>> {
    let raw = self
      .select_opt(
        format!("SELECT {TERRITORY_COLUMNS} FROM territories WHERE territory_id = ?1"),
        vec![encode_uuid(id).into()],
        RawTerritory::from_row,
      )
      .await?;
    raw.map(RawTerritory::into_territory).transpose()
  }

  async fn find_territory_by_code(&self, company_id: Uuid, code: &str) -> Result<Option<Territory>> {
    let raw = self
      .select_opt(
        format!(
          "SELECT {TERRITORY_COLUMNS} FROM territories WHERE company_id = ?1 AND code = ?2"
        ),
        vec![encode_uuid(company_id).into(), code.trim().to_owned().into()],
        RawTerritory::from_row,
      )
      .await?;
    raw.map(RawTerritory::into_territory).transpose()
  }

  async fn list_territories(&self, company_id: Uuid) -> Result<Vec<Territory>> {
    let raws = self
      .select(
        format!(
          "SELECT {TERRITORY_COLUMNS} FROM territories WHERE company_id = ?1 ORDER BY code"
        ),
        vec![encode_uuid(company_id).into()],
        RawTerritory::from_row,
      )
      .await?;
    raws.into_iter().map(RawTerritory::into_territory).collect()
  }

  async fn update_territory(&self, territory: &Territory) -> Result<()> {
    self
      .execute_one(
        "UPDATE territories SET code = ?2, name = ?3, description = ?4 WHERE territory_id = ?1",
        vec![
          encode_uuid(territory.territory_id).into(),
          territory.code.clone().into(),
          territory.name.clone().into(),
          opt_text(territory.description.clone()),
        ],
        "territory",
        territory.territory_id,
      )
      .await
  }

  async fn count_territory_refs(&self, id: Uuid) -> Result<u64> {
    self
      .count(
        "SELECT (SELECT COUNT(*) FROM customers WHERE territory_id = ?1)
              + (SELECT COUNT(*) FROM users     WHERE territory_id = ?1)
              + (SELECT COUNT(*) FROM teams     WHERE territory_id = ?1)",
        vec![encode_uuid(id).into()],
      )
      .await
  }

  async fn delete_territory(&self, id: Uuid) -> Result<bool> {
    let n = self
      .execute("DELETE FROM territories WHERE territory_id = ?1", vec![encode_uuid(id).into()])
      .await?;
    Ok(n > 0)
  }

  // ── Teams ─────────────────────────────────────────────────────────────────

  async fn add_team(&self, company_id: Uuid, input: NewTeam) -> Result<Team> {
    input.validate()?;
    let team = Team {
      team_id: Uuid::new_v4(),
      company_id,
      territory_id: input.territory_id,
      name: input.name.trim().to_owned(),
      leader_id: input.leader_id,
      created_at: now(),
    };

    self
      .execute(
        "INSERT INTO teams (team_id, company_id, territory_id, name, leader_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        vec![
          encode_uuid(team.team_id).into(),
          encode_uuid(company_id).into(),
          opt_text(encode_opt_uuid(team.territory_id)),
          team.name.clone().into(),
          opt_text(encode_opt_uuid(team.leader_id)),
          encode_dt(team.created_at).into(),
        ],
      )
      .await?;
    Ok(team)
  }

  async fn get_team(&self, id: Uuid) -> Result<Option<Team>> {
    let raw = self
      .select_opt(
        format!("SELECT {TEAM_COLUMNS} FROM teams WHERE team_id = ?1"),
        vec![encode_uuid(id).into()],
        RawTeam::from_row,
      )
      .await?;
    raw.map(RawTeam::into_team).transpose()
  }

  async fn list_teams(&self, company_id: Uuid) -> Result<Vec<Team>> {
    let raws = self
      .select(
        format!("SELECT {TEAM_COLUMNS} FROM teams WHERE company_id = ?1 ORDER BY name"),
        vec![encode_uuid(company_id).into()],
        RawTeam::from_row,
      )
      .await?;
    raws.into_iter().map(RawTeam::into_team).collect()
  }

  async fn update_team(&self, team: &Team) -> Result<()> {
    self
      .execute_one(
        "UPDATE teams SET territory_id = ?2, name = ?3, leader_id = ?4 WHERE team_id = ?1",
        vec![
          encode_uuid(team.team_id).into(),
          opt_text(encode_opt_uuid(team.territory_id)),
          team.name.clone().into(),
          opt_text(encode_opt_uuid(team.leader_id)),
        ],
        "team",
        team.team_id,
      )
      .await
  }

  async fn delete_team(&self, id: Uuid) -> Result<bool> {
    let n = self
      .execute("DELETE FROM teams WHERE team_id = ?1", vec![encode_uuid(id).into()])
      .await?;
    Ok(n > 0)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    input.validate()?;
    let at = now();
    let user = User {
      user_id:       Uuid::new_v4(),
      company_id:    input.company_id,
      username:      input.username.trim().to_owned(),
      email:         input.email.trim().to_owned(),
      full_name:     input.full_name.trim().to_owned(),
      phone:         input.phone,
      role:          input.role,
      territory_id:  input.territory_id,
      team_id:       input.team_id,
      manager_id:    input.manager_id,
      is_active:     true,
      password_hash: input.password_hash,
      created_at:    at,
      updated_at:    at,
    };

    self
      .execute(
        "INSERT INTO users (
           user_id, company_id, username, email, full_name, phone, role,
           territory_id, team_id, manager_id, is_active, password_hash,
           created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?12, ?12)",
        vec![
          encode_uuid(user.user_id).into(),
          encode_uuid(user.company_id).into(),
          user.username.clone().into(),
          user.email.clone().into(),
          user.full_name.clone().into(),
          opt_text(user.phone.clone()),
          user.role.as_str().to_owned().into(),
          opt_text(encode_opt_uuid(user.territory_id)),
          opt_text(encode_opt_uuid(user.team_id)),
          opt_text(encode_opt_uuid(user.manager_id)),
          user.password_hash.clone().into(),
          encode_dt(at).into(),
        ],
      )
      .await?;
    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let raw = self
      .select_opt(
        format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
        vec![encode_uuid(id).into()],
        RawUser::from_row,
      )
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
    let raw = self
      .select_opt(
        format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        vec![username.trim().to_owned().into()],
        RawUser::from_row,
      )
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>> {
    let raws = self
      .select(
        format!(
          "SELECT {USER_COLUMNS} FROM users
           WHERE company_id = ?1
             AND (?2 IS NULL OR role = ?2)
             AND (?3 IS NULL OR team_id = ?3)
             AND (?4 IS NULL OR territory_id = ?4)
             AND (?5 = 0 OR is_active = 1)
           ORDER BY full_name, username"
        ),
        vec![
          encode_uuid(query.company_id).into(),
          opt_text(query.role.map(|r| r.as_str().to_owned())),
          opt_text(encode_opt_uuid(query.team_id)),
          opt_text(encode_opt_uuid(query.territory_id)),
          query.active_only.into(),
        ],
        RawUser::from_row,
      )
      .await?;
    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn update_user(&self, user: &User) -> Result<()> {
    self
      .execute_one(
        "UPDATE users SET
           email = ?2, full_name = ?3, phone = ?4, role = ?5, territory_id = ?6,
           team_id = ?7, manager_id = ?8, is_active = ?9, password_hash = ?10,
           updated_at = ?11
         WHERE user_id = ?1",
        vec![
          encode_uuid(user.user_id).into(),
          user.email.clone().into(),
          user.full_name.clone().into(),
          opt_text(user.phone.clone()),
          user.role.as_str().to_owned().into(),
          opt_text(encode_opt_uuid(user.territory_id)),
          opt_text(encode_opt_uuid(user.team_id)),
          opt_text(encode_opt_uuid(user.manager_id)),
          user.is_active.into(),
          user.password_hash.clone().into(),
          encode_dt(user.updated_at).into(),
        ],
        "user",
        user.user_id,
      )
      .await
  }

  // ── Customers ─────────────────────────────────────────────────────────────

  async fn add_customer(&self, company_id: Uuid, input: NewCustomer) -> Result<Customer> {
    input.validate()?;
    let at = now();
    let customer = Customer {
      customer_id:     Uuid::new_v4(),
      company_id,
      territory_id:    input.territory_id,
      code:            input.code.trim().to_owned(),
      name:            input.name.trim().to_owned(),
      address:         input.address,
      location:        input.location,
      monthly_revenue: input.monthly_revenue,
      class:           AbcClass::from_monthly_revenue(input.monthly_revenue),
      created_at:      at,
      updated_at:      at,
    };

    self
      .execute(
        "INSERT INTO customers (
           customer_id, company_id, territory_id, code, name, address,
           lat, lng, monthly_revenue, class, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        vec![
          encode_uuid(customer.customer_id).into(),
          encode_uuid(company_id).into(),
          opt_text(encode_opt_uuid(customer.territory_id)),
          customer.code.clone().into(),
          customer.name.clone().into(),
          opt_text(customer.address.clone()),
          opt_real(customer.location.map(|p| p.lat)),
          opt_real(customer.location.map(|p| p.lng)),
          customer.monthly_revenue.into(),
          customer.class.as_str().to_owned().into(),
          encode_dt(at).into(),
        ],
      )
      .await?;
    Ok(customer)
  }

  async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>> {
    let raw = self
      .select_opt(
        format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE customer_id = ?1"),
        vec![encode_uuid(id).into()],
        RawCustomer::from_row,
      )
      .await?;
    raw.map(RawCustomer::into_customer).transpose()
  }

  async fn find_customer_by_code(&self, company_id: Uuid, code: &str) -> Result<Option<Customer>> {
    let raw = self
      .select_opt(
        format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE company_id = ?1 AND code = ?2"),
        vec![encode_uuid(company_id).into(), code.trim().to_owned().into()],
        RawCustomer::from_row,
      )
      .await?;
    raw.map(RawCustomer::into_customer).transpose()
  }

  async fn list_customers(&self, query: &CustomerQuery) -> Result<Vec<Customer>> {
    let pattern = query
      .text
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(like_pattern);

    let raws = self
      .select(
        format!(
          r"SELECT {CUSTOMER_COLUMNS} FROM customers
           WHERE company_id = ?1
             AND (?2 IS NULL OR territory_id = ?2)
             AND (?3 IS NULL OR class = ?3)
             AND (?4 IS NULL OR name LIKE ?4 ESCAPE '\' OR code LIKE ?4 ESCAPE '\')
           ORDER BY name, code
           LIMIT ?5 OFFSET ?6"
        ),
        vec![
          encode_uuid(query.company_id).into(),
          opt_text(encode_opt_uuid(query.territory_id)),
          opt_text(query.class.map(|c| c.as_str().to_owned())),
          opt_text(pattern),
          limit_value(query.limit),
          Value::Integer(query.offset.map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX))),
        ],
        RawCustomer::from_row,
      )
      .await?;
    raws.into_iter().map(RawCustomer::into_customer).collect()
  }

  async fn update_customer(&self, customer: &Customer) -> Result<()> {
    self
      .execute_one(
        "UPDATE customers SET
           territory_id = ?2, code = ?3, name = ?4, address = ?5, lat = ?6, lng = ?7,
           monthly_revenue = ?8, class = ?9, updated_at = ?10
         WHERE customer_id = ?1",
        vec![
          encode_uuid(customer.customer_id).into(),
          opt_text(encode_opt_uuid(customer.territory_id)),
          customer.code.clone().into(),
          customer.name.clone().into(),
          opt_text(customer.address.clone()),
          opt_real(customer.location.map(|p| p.lat)),
          opt_real(customer.location.map(|p| p.lng)),
          customer.monthly_revenue.into(),
          AbcClass::from_monthly_revenue(customer.monthly_revenue).as_str().to_owned().into(),
          encode_dt(customer.updated_at).into(),
        ],
        "customer",
        customer.customer_id,
      )
      .await
  }

  async fn count_customer_refs(&self, id: Uuid) -> Result<u64> {
    self
      .count(
        "SELECT (SELECT COUNT(*) FROM pre_call_plans WHERE customer_id = ?1)
              + (SELECT COUNT(*) FROM call_reports   WHERE customer_id = ?1)",
        vec![encode_uuid(id).into()],
      )
      .await
  }

  async fn delete_customer(&self, id: Uuid) -> Result<bool> {
    let n = self
      .execute("DELETE FROM customers WHERE customer_id = ?1", vec![encode_uuid(id).into()])
      .await?;
    Ok(n > 0)
  }

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn add_contact(&self, customer: &Customer, input: NewContact) -> Result<Contact> {
    input.validate()?;
    let at = now();
    let mut contact = Contact {
      contact_id:  Uuid::new_v4(),
      customer_id: customer.customer_id,
      company_id:  customer.company_id,
      name:        input.name.trim().to_owned(),
      position:    input.position,
      phone:       input.phone,
      email:       input.email,
      is_primary:  input.is_primary,
      created_at:  at,
      updated_at:  at,
    };

    let id_str       = encode_uuid(contact.contact_id);
    let customer_str = encode_uuid(contact.customer_id);
    let company_str  = encode_uuid(contact.company_id);
    let at_str       = encode_dt(at);
    let name         = contact.name.clone();
    let position     = contact.position.clone();
    let phone        = contact.phone.clone();
    let email        = contact.email.clone();
    let wants_primary = contact.is_primary;

    let is_primary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let siblings: i64 = tx.query_row(
          "SELECT COUNT(*) FROM contacts WHERE customer_id = ?1",
          params![customer_str],
          |r| r.get(0),
        )?;
        let is_primary = wants_primary || siblings == 0;
        if is_primary {
          tx.execute(
            "UPDATE contacts SET is_primary = 0, updated_at = ?2
             WHERE customer_id = ?1 AND is_primary = 1",
            params![customer_str, at_str],
          )?;
        }
        tx.execute(
          "INSERT INTO contacts (
             contact_id, customer_id, company_id, name, position, phone, email,
             is_primary, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
          params![id_str, customer_str, company_str, name, position, phone, email, is_primary, at_str],
        )?;
        tx.commit()?;
        Ok(is_primary)
      })
      .await?;

    contact.is_primary = is_primary;
    Ok(contact)
  }

  async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>> { self.contact_by_id(id).await }

  async fn list_contacts(&self, customer_id: Uuid) -> Result<Vec<Contact>> {
    let raws = self
      .select(
        format!(
          "SELECT {CONTACT_COLUMNS} FROM contacts WHERE customer_id = ?1
           ORDER BY is_primary DESC, created_at, contact_id"
        ),
        vec![encode_uuid(customer_id).into()],
        RawContact::from_row,
      )
      .await?;
    raws.into_iter().map(RawContact::into_contact).collect()
  }

  async fn update_contact(&self, contact: &Contact) -> Result<()> {
    let id_str       = encode_uuid(contact.contact_id);
    let customer_str = encode_uuid(contact.customer_id);
    let at_str       = encode_dt(contact.updated_at);
    let name         = contact.name.clone();
    let position     = contact.position.clone();
    let phone        = contact.phone.clone();
    let email        = contact.email.clone();
    let is_primary   = contact.is_primary;

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if is_primary {
          tx.execute(
            "UPDATE contacts SET is_primary = 0, updated_at = ?3
             WHERE customer_id = ?1 AND contact_id != ?2 AND is_primary = 1",
            params![customer_str, id_str, at_str],
          )?;
        }
        let changed = tx.execute(
          "UPDATE contacts SET
             name = ?2, position = ?3, phone = ?4, email = ?5, is_primary = ?6, updated_at = ?7
           WHERE contact_id = ?1",
          params![id_str, name, position, phone, email, is_primary, at_str],
        )?;
        if changed > 0 {
          tx.commit()?;
        }
        Ok(changed)
      })
      .await?;

    match changed {
      0 => Err(Error::NotFound { entity: "contact", id: contact.contact_id }),
      _ => Ok(()),
    }
  }

  async fn set_primary_contact(&self, id: Uuid) -> Result<Option<Contact>> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(now());

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let customer: Option<String> = tx
          .query_row(
            "SELECT customer_id FROM contacts WHERE contact_id = ?1",
            params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(customer) = customer else {
          return Ok(false);
        };
        tx.execute(
          "UPDATE contacts SET is_primary = 0, updated_at = ?3
           WHERE customer_id = ?1 AND contact_id != ?2 AND is_primary = 1",
          params![customer, id_str, at_str],
        )?;
        tx.execute(
          "UPDATE contacts SET is_primary = 1, updated_at = ?2
           WHERE contact_id = ?1 AND is_primary = 0",
          params![id_str, at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Ok(None);
    }
    self.contact_by_id(id).await
  }

  async fn delete_contact(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(now());

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let row: Option<(String, bool)> = tx
          .query_row(
            "SELECT customer_id, is_primary FROM contacts WHERE contact_id = ?1",
            params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((customer, was_primary)) = row else {
          return Ok(false);
        };
        tx.execute("DELETE FROM contacts WHERE contact_id = ?1", params![id_str])?;
        if was_primary {
          tx.execute(
            "UPDATE contacts SET is_primary = 1, updated_at = ?2
             WHERE contact_id = (
               SELECT contact_id FROM contacts WHERE customer_id = ?1
               ORDER BY created_at, contact_id LIMIT 1
             )",
            params![customer, at_str],
          )?;
        }
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(deleted)
  }

  // ── Pre-call plans ────────────────────────────────────────────────────────

  async fn add_plan(&self, company_id: Uuid, sr_id: Uuid, input: NewPlan) -> Result<PreCallPlan> {
    input.validate()?;
    let at = now();
    let plan = PreCallPlan {
      plan_id: Uuid::new_v4(),
      company_id,
      sr_id,
      customer_id: input.customer_id,
      scheduled_at: input.scheduled_at,
      objectives: input.objectives.trim().to_owned(),
      notes: input.notes,
      status: PlanStatus::Draft,
      submitted_at: None,
      reviewer_id: None,
      reviewed_at: None,
      review_comment: None,
      created_at: at,
      updated_at: at,
    };

    self
      .execute(
        "INSERT INTO pre_call_plans (
           plan_id, company_id, sr_id, customer_id, scheduled_at, objectives, notes,
           status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        vec![
          encode_uuid(plan.plan_id).into(),
          encode_uuid(company_id).into(),
          encode_uuid(sr_id).into(),
          encode_uuid(plan.customer_id).into(),
          encode_dt(plan.scheduled_at).into(),
          plan.objectives.clone().into(),
          opt_text(plan.notes.clone()),
          plan.status.as_str().to_owned().into(),
          encode_dt(at).into(),
        ],
      )
      .await?;
    Ok(plan)
  }

  async fn get_plan(&self, id: Uuid) -> Result<Option<PreCallPlan>> {
    let raw = self
      .select_opt(
        format!("SELECT {PLAN_COLUMNS} FROM pre_call_plans WHERE plan_id = ?1"),
        vec![encode_uuid(id).into()],
        RawPlan::from_row,
      )
      .await?;
    raw.map(RawPlan::into_plan).transpose()
  }

  async fn list_plans(&self, query: &PlanQuery) -> Result<Vec<PreCallPlan>> {
    let raws = self
      .select(
        format!(
          "SELECT {PLAN_COLUMNS} FROM pre_call_plans
           WHERE company_id = ?1
             AND (?2 IS NULL OR sr_id = ?2)
             AND (?3 IS NULL OR sr_id IN (SELECT value FROM json_each(?3)))
             AND (?4 IS NULL OR customer_id = ?4)
             AND (?5 IS NULL OR status = ?5)
             AND (?6 IS NULL OR scheduled_at >= ?6)
             AND (?7 IS NULL OR scheduled_at < ?7)
           ORDER BY scheduled_at, plan_id"
        ),
        vec![
          encode_uuid(query.company_id).into(),
          opt_text(encode_opt_uuid(query.sr_id)),
          opt_text(encode_uuid_list(query.sr_ids.as_deref())?),
          opt_text(encode_opt_uuid(query.customer_id)),
          opt_text(query.status.map(|s| s.as_str().to_owned())),
          opt_text(encode_opt_dt(query.scheduled_after)),
          opt_text(encode_opt_dt(query.scheduled_before)),
        ],
        RawPlan::from_row,
      )
      .await?;
    raws.into_iter().map(RawPlan::into_plan).collect()
  }

  async fn update_plan(&self, plan: &PreCallPlan, loaded: Revision<PlanStatus>) -> Result<()> {
    self
      .execute_guarded(
        "UPDATE pre_call_plans SET
           customer_id = ?2, scheduled_at = ?3, objectives = ?4, notes = ?5, status = ?6,
           submitted_at = ?7, reviewer_id = ?8, reviewed_at = ?9, review_comment = ?10,
           updated_at = ?11
         WHERE plan_id = ?1 AND status = ?12 AND updated_at = ?13",
        vec![
          encode_uuid(plan.plan_id).into(),
          encode_uuid(plan.customer_id).into(),
          encode_dt(plan.scheduled_at).into(),
          plan.objectives.clone().into(),
          opt_text(plan.notes.clone()),
          plan.status.as_str().to_owned().into(),
          opt_text(encode_opt_dt(plan.submitted_at)),
          opt_text(encode_opt_uuid(plan.reviewer_id)),
          opt_text(encode_opt_dt(plan.reviewed_at)),
          opt_text(plan.review_comment.clone()),
          encode_dt(plan.updated_at).into(),
          loaded.status.as_str().to_owned().into(),
          encode_dt(loaded.updated_at).into(),
        ],
        "plan",
        plan.plan_id,
      )
      .await
  }

  async fn delete_plan(&self, id: Uuid) -> Result<bool> {
    let n = self
      .execute(
        "DELETE FROM pre_call_plans WHERE plan_id = ?1 AND status = ?2",
        vec![encode_uuid(id).into(), PlanStatus::Draft.as_str().to_owned().into()],
      )
      .await?;
    Ok(n > 0)
  }

  // ── Call reports ──────────────────────────────────────────────────────────

  async fn add_report(&self, company_id: Uuid, sr_id: Uuid, input: NewReport) -> Result<CallReport> {
    let at = now();
    let report = CallReport {
      report_id: Uuid::new_v4(),
      company_id,
      sr_id,
      customer_id: input.customer_id,
      plan_id: input.plan_id,
      summary: input.summary,
      outcome: input.outcome,
      next_steps: input.next_steps,
      check_in: None,
      check_out: None,
      status: ReportStatus::Draft,
      submitted_at: None,
      created_at: at,
      updated_at: at,
    };

    self
      .execute(
        "INSERT INTO call_reports (
           report_id, company_id, sr_id, customer_id, plan_id, summary, outcome,
           next_steps, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        vec![
          encode_uuid(report.report_id).into(),
          encode_uuid(company_id).into(),
          encode_uuid(sr_id).into(),
          encode_uuid(report.customer_id).into(),
          opt_text(encode_opt_uuid(report.plan_id)),
          report.summary.clone().into(),
          opt_text(report.outcome.clone()),
          opt_text(report.next_steps.clone()),
          report.status.as_str().to_owned().into(),
          encode_dt(at).into(),
        ],
      )
      .await?;
    Ok(report)
  }

  async fn get_report(&self, id: Uuid) -> Result<Option<CallReport>> {
    let raw = self
      .select_opt(
        format!("SELECT {REPORT_COLUMNS} FROM call_reports WHERE report_id = ?1"),
        vec![encode_uuid(id).into()],
        RawReport::from_row,
      )
      .await?;
    raw.map(RawReport::into_report).transpose()
  }

  async fn list_reports(&self, query: &ReportQuery) -> Result<Vec<CallReport>> {
    let raws = self
      .select(
        format!(
          "SELECT {REPORT_COLUMNS} FROM call_reports
           WHERE company_id = ?1
             AND (?2 IS NULL OR sr_id = ?2)
             AND (?3 IS NULL OR sr_id IN (SELECT value FROM json_each(?3)))
             AND (?4 IS NULL OR customer_id = ?4)
             AND (?5 IS NULL OR plan_id = ?5)
             AND (?6 IS NULL OR status = ?6)
             AND (?7 IS NULL OR created_at >= ?7)
             AND (?8 IS NULL OR created_at < ?8)
           ORDER BY created_at DESC, report_id"
        ),
        vec![
          encode_uuid(query.company_id).into(),
          opt_text(encode_opt_uuid(query.sr_id)),
          opt_text(encode_uuid_list(query.sr_ids.as_deref())?),
          opt_text(encode_opt_uuid(query.customer_id)),
          opt_text(encode_opt_uuid(query.plan_id)),
          opt_text(query.status.map(|s| s.as_str().to_owned())),
          opt_text(encode_opt_dt(query.created_after)),
          opt_text(encode_opt_dt(query.created_before)),
        ],
        RawReport::from_row,
      )
      .await?;
    raws.into_iter().map(RawReport::into_report).collect()
  }

  async fn update_report(
    &self,
    report: &CallReport,
    loaded: Revision<ReportStatus>,
  ) -> Result<()> {
    let check_in = report.check_in;
    let check_out = report.check_out;
    self
      .execute_guarded(
        "UPDATE call_reports SET
           summary = ?2, outcome = ?3, next_steps = ?4,
           check_in_at = ?5, check_in_lat = ?6, check_in_lng = ?7,
           check_out_at = ?8, check_out_lat = ?9, check_out_lng = ?10,
           status = ?11, submitted_at = ?12, updated_at = ?13
         WHERE report_id = ?1 AND status = ?14 AND updated_at = ?15",
        vec![
          encode_uuid(report.report_id).into(),
          report.summary.clone().into(),
          opt_text(report.outcome.clone()),
          opt_text(report.next_steps.clone()),
          opt_text(check_in.map(|s| encode_dt(s.at))),
          opt_real(check_in.map(|s| s.point.lat)),
          opt_real(check_in.map(|s| s.point.lng)),
          opt_text(check_out.map(|s| encode_dt(s.at))),
          opt_real(check_out.map(|s| s.point.lat)),
          opt_real(check_out.map(|s| s.point.lng)),
          report.status.as_str().to_owned().into(),
          opt_text(encode_opt_dt(report.submitted_at)),
          encode_dt(report.updated_at).into(),
          loaded.status.as_str().to_owned().into(),
          encode_dt(loaded.updated_at).into(),
        ],
        "report",
        report.report_id,
      )
      .await
  }

  async fn delete_report(&self, id: Uuid) -> Result<bool> {
    let n = self
      .execute(
        "DELETE FROM call_reports WHERE report_id = ?1 AND status = ?2",
        vec![encode_uuid(id).into(), ReportStatus::Draft.as_str().to_owned().into()],
      )
      .await?;
    Ok(n > 0)
  }

  // ── Photos ────────────────────────────────────────────────────────────────

  async fn add_photo(&self, photo: &Photo) -> Result<()> {
    self
      .execute_guarded(
        "INSERT INTO photos (
           photo_id, report_id, company_id, path, content_hash, media_type,
           size_bytes, uploaded_by, uploaded_at
         )
         SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
         WHERE EXISTS (SELECT 1 FROM call_reports WHERE report_id = ?2 AND status = ?10)",
        vec![
          encode_uuid(photo.photo_id).into(),
          encode_uuid(photo.report_id).into(),
          encode_uuid(photo.company_id).into(),
          photo.path.clone().into(),
          photo.content_hash.clone().into(),
          photo.media_type.clone().into(),
          Value::Integer(i64::try_from(photo.size_bytes).unwrap_or(i64::MAX)),
          encode_uuid(photo.uploaded_by).into(),
          encode_dt(photo.uploaded_at).into(),
          ReportStatus::Draft.as_str().to_owned().into(),
        ],
        "report",
        photo.report_id,
      )
      .await
  }

  async fn get_photo(&self, id: Uuid) -> Result<Option<Photo>> {
    let raw = self
      .select_opt(
        format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE photo_id = ?1"),
        vec![encode_uuid(id).into()],
        RawPhoto::from_row,
      )
      .await?;
    raw.map(RawPhoto::into_photo).transpose()
  }

  async fn list_photos(&self, report_id: Uuid) -> Result<Vec<Photo>> {
    let raws = self
      .select(
        format!(
          "SELECT {PHOTO_COLUMNS} FROM photos WHERE report_id = ?1
           ORDER BY uploaded_at, photo_id"
        ),
        vec![encode_uuid(report_id).into()],
        RawPhoto::from_row,
      )
      .await?;
    raws.into_iter().map(RawPhoto::into_photo).collect()
  }

  async fn count_photos_with_hash(&self, content_hash: &str) -> Result<u64> {
    self
      .count(
        "SELECT COUNT(*) FROM photos WHERE content_hash = ?1",
        vec![content_hash.to_owned().into()],
      )
      .await
  }

  async fn delete_photo(&self, id: Uuid) -> Result<bool> {
    let n = self
      .execute("DELETE FROM photos WHERE photo_id = ?1", vec![encode_uuid(id).into()])
      .await?;
    Ok(n > 0)
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn add_notification(&self, input: NewNotification) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      user_id:         input.user_id,
      kind:            input.kind,
      title:           input.title,
      body:            input.body,
      subject_id:      input.subject_id,
      is_read:         false,
      read_at:         None,
      created_at:      now(),
    };

    self
      .execute(
        "INSERT INTO notifications (
           notification_id, user_id, kind, title, body, subject_id, is_read, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        vec![
          encode_uuid(notification.notification_id).into(),
          encode_uuid(notification.user_id).into(),
          notification.kind.as_str().to_owned().into(),
          notification.title.clone().into(),
          notification.body.clone().into(),
          opt_text(encode_opt_uuid(notification.subject_id)),
          encode_dt(notification.created_at).into(),
        ],
      )
      .await?;
    Ok(notification)
  }

  async fn list_notifications(
    &self,
    user_id: Uuid,
    unread_only: bool,
    limit: usize,
  ) -> Result<Vec<Notification>> {
    let raws = self
      .select(
        format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
           ORDER BY created_at DESC, notification_id
           LIMIT ?3"
        ),
        vec![encode_uuid(user_id).into(), unread_only.into(), limit_value(Some(limit))],
        RawNotification::from_row,
      )
      .await?;
    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn count_unread(&self, user_id: Uuid) -> Result<u64> {
    self
      .count(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        vec![encode_uuid(user_id).into()],
      )
      .await
  }

  async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Option<Notification>> {
    self
      .execute(
        "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?3)
         WHERE notification_id = ?1 AND user_id = ?2",
        vec![encode_uuid(id).into(), encode_uuid(user_id).into(), encode_dt(now()).into()],
      )
      .await?;

    let raw = self
      .select_opt(
        format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE notification_id = ?1 AND user_id = ?2"
        ),
        vec![encode_uuid(id).into(), encode_uuid(user_id).into()],
        RawNotification::from_row,
      )
      .await?;
    raw.map(RawNotification::into_notification).transpose()
  }

  async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
    let n = self
      .execute(
        "UPDATE notifications SET is_read = 1, read_at = ?2 WHERE user_id = ?1 AND is_read = 0",
        vec![encode_uuid(user_id).into(), encode_dt(now()).into()],
      )
      .await?;
    Ok(n as u64)
  }

  async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
    let n = self
      .execute(
        "DELETE FROM notifications WHERE notification_id = ?1 AND user_id = ?2",
        vec![encode_uuid(id).into(), encode_uuid(user_id).into()],
      )
      .await?;
    Ok(n > 0)
  }

  async fn get_preferences(&self, user_id: Uuid) -> Result<NotificationPreferences> {
    let defaults = NotificationPreferences::defaults_for(user_id, now());
    self
      .execute(
        "INSERT OR IGNORE INTO notification_preferences (
           user_id, plan_submitted, plan_reviewed, report_submitted, email_digest, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        vec![
          encode_uuid(user_id).into(),
          defaults.plan_submitted.into(),
          defaults.plan_reviewed.into(),
          defaults.report_submitted.into(),
          defaults.email_digest.into(),
          encode_dt(defaults.updated_at).into(),
        ],
      )
      .await?;

    let raw = self
      .select_opt(
        format!("SELECT {PREFERENCES_COLUMNS} FROM notification_preferences WHERE user_id = ?1"),
        vec![encode_uuid(user_id).into()],
        RawPreferences::from_row,
      )
      .await?;
    match raw {
      Some(raw) => raw.into_preferences(),
      None => Ok(defaults),
    }
  }

  async fn update_preferences(&self, prefs: &NotificationPreferences) -> Result<()> {
    self
      .execute(
        "INSERT INTO notification_preferences (
           user_id, plan_submitted, plan_reviewed, report_submitted, email_digest, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (user_id) DO UPDATE SET
           plan_submitted   = excluded.plan_submitted,
           plan_reviewed    = excluded.plan_reviewed,
           report_submitted = excluded.report_submitted,
           email_digest     = excluded.email_digest,
           updated_at       = excluded.updated_at",
        vec![
          encode_uuid(prefs.user_id).into(),
          prefs.plan_submitted.into(),
          prefs.plan_reviewed.into(),
          prefs.report_submitted.into(),
          prefs.email_digest.into(),
          encode_dt(prefs.updated_at).into(),
        ],
      )
      .await?;
    Ok(())
  }
}
