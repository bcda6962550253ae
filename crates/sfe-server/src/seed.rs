//! `sfe seed`: a small demo organisation for trying the API.

use anyhow::{Context as _, bail};
use sfe_core::{
  customer::{NewContact, NewCustomer},
  geo::GeoPoint,
  org::{NewCompany, NewTeam, NewTerritory, NewUser, Role, User},
  store::SalesStore,
};
use tracing::info;

/// Sample accounts around central Bangkok: (code, name, lat, lng, revenue, buyer).
const CUSTOMERS: &[(&str, &str, f64, f64, f64, &str)] = &[
  ("BKK-001", "Siam Health Pharmacy", 13.7462, 100.5347, 750_000.0, "Khun Malee"),
  ("BKK-002", "Silom Medical Clinic", 13.7286, 100.5340, 280_000.0, "Dr. Anan"),
  ("BKK-003", "Ari Neighbourhood Drugstore", 13.7797, 100.5445, 45_000.0, "Khun Somchai"),
];

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
  Created { users: Vec<String> },
  AlreadySeeded,
}

/// Username prefix for a company: its name lowercased, with every run of
/// other characters turned into a single `-`. Falls back to `demo` for names
/// without ASCII letters or digits.
fn username_prefix(company_name: &str) -> String {
  let mut prefix = String::new();
  for c in company_name.chars() {
    if c.is_ascii_alphanumeric() {
      prefix.push(c.to_ascii_lowercase());
    } else if !prefix.is_empty() && !prefix.ends_with('-') {
      prefix.push('-');
    }
  }
  prefix.truncate(48);
  let prefix = prefix.trim_end_matches('-');
  if prefix.is_empty() { "demo".to_owned() } else { prefix.to_owned() }
}

/// Create the demo company unless one with `company_name` exists.
/// Usernames are `<prefix>.ceo`, `<prefix>.sm` and `<prefix>.sr` (see
/// [`username_prefix`]), all sharing `password_hash`.
///
/// Every username is checked before anything is written, so a clash leaves
/// the store untouched.
pub async fn run<S>(store: &S, company_name: &str, password_hash: &str) -> anyhow::Result<Outcome>
where
  S: SalesStore,
{
  let prefix = username_prefix(company_name);
  let [ceo_name, sm_name, sr_name] = ["ceo", "sm", "sr"].map(|role| format!("{prefix}.{role}"));

  if let Some(existing) = store
    .find_company_by_name(company_name)
    .await
    .context("looking up company")?
  {
    let ceo = store.find_user_by_username(&ceo_name).await.context("looking up users")?;
    if ceo.is_some_and(|u| u.company_id == existing.company_id) {
      info!(company = company_name, "demo data already present");
      return Ok(Outcome::AlreadySeeded);
    }
    bail!("company {company_name:?} already exists but has no demo users");
  }

  for username in [&ceo_name, &sm_name, &sr_name] {
    if store
      .find_user_by_username(username)
      .await
      .context("looking up users")?
      .is_some()
    {
      bail!("username {username:?} is already taken; pick another company name");
    }
  }

  let company = store
    .add_company(NewCompany::new(company_name))
    .await
    .context("creating company")?;
  let territory = store
    .add_territory(company.company_id, NewTerritory {
      code:        "BKK".into(),
      name:        "Bangkok Metropolitan".into(),
      description: Some("Central Bangkok accounts".into()),
    })
    .await
    .context("creating territory")?;
  let mut team = store
    .add_team(company.company_id, NewTeam {
      name:         "Bangkok Field Team".into(),
      territory_id: Some(territory.territory_id),
      leader_id:    None,
    })
    .await
    .context("creating team")?;

  let user = |username: &str, full_name: &str, role: Role, manager: Option<&User>| NewUser {
    company_id:    company.company_id,
    username:      username.into(),
    email:         format!("{username}@demo.example"),
    full_name:     full_name.into(),
    phone:         None,
    role,
    territory_id:  Some(territory.territory_id),
    team_id:       (role != Role::Ceo).then_some(team.team_id),
    manager_id:    manager.map(|m| m.user_id),
    password_hash: password_hash.to_owned(),
  };
  let ceo = store
    .add_user(user(&ceo_name, "Khun Prasert (CEO)", Role::Ceo, None))
    .await
    .context("creating CEO")?;
  let sm = store
    .add_user(user(&sm_name, "Khun Wanida (Sales Manager)", Role::Sm, Some(&ceo)))
    .await
    .context("creating sales manager")?;
  let sr = store
    .add_user(user(&sr_name, "Khun Nattapong (Sales Rep)", Role::Sr, Some(&sm)))
    .await
    .context("creating sales rep")?;

  team.leader_id = Some(sm.user_id);
  store.update_team(&team).await.context("assigning team leader")?;

  for &(code, name, lat, lng, revenue, buyer) in CUSTOMERS {
    let customer = store
      .add_customer(company.company_id, NewCustomer {
        territory_id:    Some(territory.territory_id),
        code:            code.into(),
        name:            name.into(),
        address:         Some("Bangkok, Thailand".into()),
        location:        Some(GeoPoint::new(lat, lng)?),
        monthly_revenue: revenue,
      })
      .await
      .with_context(|| format!("creating customer {code}"))?;
    store
      .add_contact(&customer, NewContact {
        name:       buyer.into(),
        position:   Some("Purchasing".into()),
        phone:      None,
        email:      None,
        is_primary: true,
      })
      .await
      .with_context(|| format!("creating contact for {code}"))?;
  }

  info!(
    company_id = %company.company_id,
    customers = CUSTOMERS.len(),
    "demo data created"
  );
  Ok(Outcome::Created { users: vec![ceo.username, sm.username, sr.username] })
}

#[cfg(test)]
mod tests {
  use sfe_core::store::{CustomerQuery, UserQuery};
  use sfe_store_sqlite::SqliteStore;

  use super::*;

  #[tokio::test]
  async fn seeding_is_idempotent() {
    let store = SqliteStore::open_in_memory().await.unwrap();

    let first = run(&store, "Demo Pharma", "$argon2id$placeholder").await.unwrap();
    assert_eq!(first, Outcome::Created {
      users: vec!["demo-pharma.ceo".into(), "demo-pharma.sm".into(), "demo-pharma.sr".into()],
    });
    let second = run(&store, "Demo Pharma", "$argon2id$placeholder").await.unwrap();
    assert_eq!(second, Outcome::AlreadySeeded);

    let company = store.find_company_by_name("Demo Pharma").await.unwrap().unwrap();
    let users = store.list_users(&UserQuery::company(company.company_id)).await.unwrap();
    assert_eq!(users.len(), 3);
    let rep = users.iter().find(|u| u.role == Role::Sr).unwrap();
    let manager = users.iter().find(|u| u.role == Role::Sm).unwrap();
    assert_eq!(rep.manager_id, Some(manager.user_id));

    let customers =
      store.list_customers(&CustomerQuery::company(company.company_id)).await.unwrap();
    assert_eq!(customers.len(), 3);
    for customer in &customers {
      let contacts = store.list_contacts(customer.customer_id).await.unwrap();
      assert_eq!(contacts.len(), 1);
      assert!(contacts[0].is_primary);
    }
  }

  #[test]
  fn prefixes_follow_the_company_name() {
    assert_eq!(username_prefix("Demo Pharma"), "demo-pharma");
    assert_eq!(username_prefix("  Siam & Co. Ltd "), "siam-co-ltd");
    assert_eq!(username_prefix("บริษัท"), "demo");
  }

  #[tokio::test]
  async fn two_companies_can_be_seeded() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    run(&store, "Demo Pharma", "$argon2id$placeholder").await.unwrap();

    let second = run(&store, "Other Pharma", "$argon2id$placeholder").await.unwrap();
    assert_eq!(second, Outcome::Created {
      users: vec!["other-pharma.ceo".into(), "other-pharma.sm".into(), "other-pharma.sr".into()],
    });

    let other = store.find_company_by_name("Other Pharma").await.unwrap().unwrap();
    let users = store.list_users(&UserQuery::company(other.company_id)).await.unwrap();
    assert_eq!(users.len(), 3);
  }

  #[tokio::test]
  async fn username_clash_writes_nothing() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    run(&store, "Demo Pharma", "$argon2id$placeholder").await.unwrap();

    // Same prefix, different company name.
    let err = run(&store, "Demo-Pharma", "$argon2id$placeholder").await.unwrap_err();
    assert!(err.to_string().contains("demo-pharma.ceo"), "{err}");
    assert!(store.find_company_by_name("Demo-Pharma").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn existing_company_without_demo_users_is_reported() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.add_company(NewCompany::new("Acme Pharma")).await.unwrap();

    let err = run(&store, "Acme Pharma", "$argon2id$placeholder").await.unwrap_err();
    assert!(err.to_string().contains("no demo users"), "{err}");
  }
}
