//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, TimeZone as _, Utc};
use sfe_core::{
  customer::{AbcClass, Customer, NewContact, NewCustomer},
  geo::GeoPoint,
  notification::{NewNotification, NotificationKind},
  org::{Company, NewCompany, NewTeam, NewTerritory, NewUser, Role, User},
  store::{CustomerQuery, PlanQuery, ReportQuery, SalesStore, StoreError as _, UserQuery},
  visit::{
    CallReport, GpsStamp, NewPlan, NewReport, Photo, PlanStatus, ReportPatch, ReportStatus,
    ReviewDecision,
  },
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn company(s: &SqliteStore, name: &str) -> Company {
  s.add_company(NewCompany::new(name)).await.unwrap()
}

fn new_user(company_id: Uuid, username: &str, role: Role) -> NewUser {
  NewUser {
    company_id,
    username: username.into(),
    email: format!("{username}@example.com"),
    full_name: format!("User {username}"),
    phone: None,
    role,
    territory_id: None,
    team_id: None,
    manager_id: None,
    password_hash: "$argon2id$test".into(),
  }
}

fn new_customer(code: &str, revenue: f64) -> NewCustomer {
  NewCustomer {
    territory_id:    None,
    code:            code.into(),
    name:            format!("Customer {code}"),
    address:         None,
    location:        Some(GeoPoint { lat: 13.7563, lng: 100.5018 }),
    monthly_revenue: revenue,
  }
}

fn new_contact(name: &str, is_primary: bool) -> NewContact {
  NewContact {
    name: name.into(),
    position: None,
    phone: None,
    email: None,
    is_primary,
  }
}

fn new_plan(customer: &Customer, days_ahead: i64) -> NewPlan {
  NewPlan {
    customer_id:  customer.customer_id,
    scheduled_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::days(days_ahead),
    objectives:   "Introduce the new product line".into(),
    notes:        None,
  }
}

// ─── Companies ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_find_company() {
  let s = store().await;
  let acme = company(&s, "Acme Pharma").await;
  assert_eq!(acme.currency, "THB");

  let fetched = s.get_company(acme.company_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Acme Pharma");
  assert_eq!(fetched.created_at, acme.created_at);

  let by_name = s.find_company_by_name("Acme Pharma").await.unwrap();
  assert_eq!(by_name.map(|c| c.company_id), Some(acme.company_id));
  assert!(s.find_company_by_name("Nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn update_missing_company_is_not_found() {
  let s = store().await;
  let mut acme = company(&s, "Acme").await;
  acme.company_id = Uuid::new_v4();
  let err = s.update_company(&acme).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: "company", .. }));
}

// ─── Territories and teams ───────────────────────────────────────────────────

#[tokio::test]
async fn territory_codes_are_unique_per_company() {
  let s = store().await;
  let a = company(&s, "A").await;
  let b = company(&s, "B").await;
  let input = NewTerritory { code: "BKK".into(), name: "Bangkok".into(), description: None };

  s.add_territory(a.company_id, input.clone()).await.unwrap();
  s.add_territory(b.company_id, input.clone()).await.unwrap();
  let err = s.add_territory(a.company_id, input).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)), "{err:?}");
  assert!(err.is_conflict());

  let found = s.find_territory_by_code(a.company_id, "BKK").await.unwrap();
  assert!(found.is_some());
  assert_eq!(s.list_territories(b.company_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn territory_refs_count_customers_users_and_teams() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let t = s
    .add_territory(c.company_id, NewTerritory {
      code:        "N1".into(),
      name:        "North".into(),
      description: None,
    })
    .await
    .unwrap();
  assert_eq!(s.count_territory_refs(t.territory_id).await.unwrap(), 0);

  let mut cust = new_customer("C1", 0.0);
  cust.territory_id = Some(t.territory_id);
  s.add_customer(c.company_id, cust).await.unwrap();
  let mut user = new_user(c.company_id, "rep1", Role::Sr);
  user.territory_id = Some(t.territory_id);
  s.add_user(user).await.unwrap();
  s.add_team(c.company_id, NewTeam {
    name:         "North A".into(),
    territory_id: Some(t.territory_id),
    leader_id:    None,
  })
  .await
  .unwrap();

  assert_eq!(s.count_territory_refs(t.territory_id).await.unwrap(), 3);
}

#[tokio::test]
async fn delete_empty_territory() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let t = s
    .add_territory(c.company_id, NewTerritory {
      code:        "S1".into(),
      name:        "South".into(),
      description: Some("Coastal provinces".into()),
    })
    .await
    .unwrap();
  assert!(s.delete_territory(t.territory_id).await.unwrap());
  assert!(!s.delete_territory(t.territory_id).await.unwrap());
  assert!(s.get_territory(t.territory_id).await.unwrap().is_none());
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn usernames_are_globally_unique() {
  let s = store().await;
  let a = company(&s, "A").await;
  let b = company(&s, "B").await;
  s.add_user(new_user(a.company_id, "somchai", Role::Sr)).await.unwrap();
  let err = s.add_user(new_user(b.company_id, "somchai", Role::Sr)).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)), "{err:?}");

  let found = s.find_user_by_username("somchai").await.unwrap().unwrap();
  assert_eq!(found.company_id, a.company_id);
  assert_eq!(found.role, Role::Sr);
  assert!(found.is_active);
}

#[tokio::test]
async fn list_users_filters_role_and_activity() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let mut rep: User = s.add_user(new_user(c.company_id, "rep1", Role::Sr)).await.unwrap();
  s.add_user(new_user(c.company_id, "rep2", Role::Sr)).await.unwrap();
  s.add_user(new_user(c.company_id, "boss", Role::Sm)).await.unwrap();

  rep.is_active = false;
  s.update_user(&rep).await.unwrap();

  let mut q = UserQuery::company(c.company_id);
  assert_eq!(s.list_users(&q).await.unwrap().len(), 3);

  q.role = Some(Role::Sr);
  assert_eq!(s.list_users(&q).await.unwrap().len(), 2);

  q.active_only = true;
  let active = s.list_users(&q).await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].username, "rep2");
}

// ─── Customers ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn customer_class_follows_revenue() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let mut cust = s.add_customer(c.company_id, new_customer("H1", 600_000.0)).await.unwrap();
  assert_eq!(cust.class, AbcClass::A);

  cust.monthly_revenue = 100_000.0;
  s.update_customer(&cust).await.unwrap();
  let fetched = s.get_customer(cust.customer_id).await.unwrap().unwrap();
  assert_eq!(fetched.class, AbcClass::B);
  assert_eq!(fetched.location, Some(GeoPoint { lat: 13.7563, lng: 100.5018 }));
}

#[tokio::test]
async fn list_customers_filters_and_pages() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  s.add_customer(c.company_id, new_customer("H1", 900_000.0)).await.unwrap();
  s.add_customer(c.company_id, new_customer("H2", 200_000.0)).await.unwrap();
  s.add_customer(c.company_id, new_customer("X_9", 10.0)).await.unwrap();

  let mut q = CustomerQuery::company(c.company_id);
  assert_eq!(s.list_customers(&q).await.unwrap().len(), 3);

  q.class = Some(AbcClass::A);
  assert_eq!(s.list_customers(&q).await.unwrap().len(), 1);

  q.class = None;
  q.text = Some("h".into());
  assert_eq!(s.list_customers(&q).await.unwrap().len(), 2);

  // `_` is matched literally, not as a wildcard.
  q.text = Some("X_".into());
  assert_eq!(s.list_customers(&q).await.unwrap().len(), 1);
  q.text = Some("H_".into());
  assert_eq!(s.list_customers(&q).await.unwrap().len(), 0);

  q.text = None;
  q.limit = Some(2);
  q.offset = Some(2);
  assert_eq!(s.list_customers(&q).await.unwrap().len(), 1);
}

// ─── Contacts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_contact_becomes_primary() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();

  let first = s.add_contact(&cust, new_contact("Dr. Anan", false)).await.unwrap();
  assert!(first.is_primary);
  let second = s.add_contact(&cust, new_contact("Nurse Ploy", false)).await.unwrap();
  assert!(!second.is_primary);
}

#[tokio::test]
async fn primary_contact_is_exclusive() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();

  let a = s.add_contact(&cust, new_contact("A", false)).await.unwrap();
  let b = s.add_contact(&cust, new_contact("B", true)).await.unwrap();
  assert!(b.is_primary);

  let contacts = s.list_contacts(cust.customer_id).await.unwrap();
  assert_eq!(contacts.iter().filter(|c| c.is_primary).count(), 1);
  assert_eq!(contacts[0].contact_id, b.contact_id);

  let promoted = s.set_primary_contact(a.contact_id).await.unwrap().unwrap();
  assert!(promoted.is_primary);
  let b = s.get_contact(b.contact_id).await.unwrap().unwrap();
  assert!(!b.is_primary);

  assert!(s.set_primary_contact(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn update_contact_to_primary_demotes_siblings() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();
  let a = s.add_contact(&cust, new_contact("A", false)).await.unwrap();
  let mut b = s.add_contact(&cust, new_contact("B", false)).await.unwrap();

  b.is_primary = true;
  b.phone = Some("+66 2 000 0000".into());
  s.update_contact(&b).await.unwrap();

  assert!(!s.get_contact(a.contact_id).await.unwrap().unwrap().is_primary);
  let b = s.get_contact(b.contact_id).await.unwrap().unwrap();
  assert!(b.is_primary);
  assert_eq!(b.phone.as_deref(), Some("+66 2 000 0000"));
}

#[tokio::test]
async fn deleting_primary_promotes_oldest_remaining() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();
  let a = s.add_contact(&cust, new_contact("A", false)).await.unwrap();
  let b = s.add_contact(&cust, new_contact("B", false)).await.unwrap();
  s.add_contact(&cust, new_contact("C", false)).await.unwrap();

  assert!(s.delete_contact(a.contact_id).await.unwrap());
  let remaining = s.list_contacts(cust.customer_id).await.unwrap();
  assert_eq!(remaining.len(), 2);
  assert_eq!(remaining[0].contact_id, b.contact_id);
  assert!(remaining[0].is_primary);
  assert!(!remaining[1].is_primary);
}

#[tokio::test]
async fn deleting_customer_removes_contacts() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();
  let a = s.add_contact(&cust, new_contact("A", false)).await.unwrap();

  assert!(s.delete_customer(cust.customer_id).await.unwrap());
  assert!(s.get_contact(a.contact_id).await.unwrap().is_none());
}

// ─── Plans ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn plan_round_trips_review_fields() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let rep = s.add_user(new_user(c.company_id, "rep", Role::Sr)).await.unwrap();
  let boss = s.add_user(new_user(c.company_id, "boss", Role::Sup)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();

  let mut plan = s.add_plan(c.company_id, rep.user_id, new_plan(&cust, 0)).await.unwrap();
  assert_eq!(plan.status, PlanStatus::Draft);
  let loaded = plan.revision();

  let at = Utc.with_ymd_and_hms(2025, 2, 20, 8, 30, 0).unwrap();
  plan.submit(at).unwrap();
  plan
    .review(boss.user_id, ReviewDecision::Reject, Some("Too vague".into()), at)
    .unwrap();
  s.update_plan(&plan, loaded).await.unwrap();

  let fetched = s.get_plan(plan.plan_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, PlanStatus::Rejected);
  assert_eq!(fetched.reviewer_id, Some(boss.user_id));
  assert_eq!(fetched.review_comment.as_deref(), Some("Too vague"));
  assert_eq!(fetched.submitted_at, Some(at));
}

#[tokio::test]
async fn list_plans_filters() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let r1 = s.add_user(new_user(c.company_id, "rep1", Role::Sr)).await.unwrap();
  let r2 = s.add_user(new_user(c.company_id, "rep2", Role::Sr)).await.unwrap();
  let r3 = s.add_user(new_user(c.company_id, "rep3", Role::Sr)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();

  s.add_plan(c.company_id, r1.user_id, new_plan(&cust, 2)).await.unwrap();
  s.add_plan(c.company_id, r2.user_id, new_plan(&cust, 1)).await.unwrap();
  s.add_plan(c.company_id, r3.user_id, new_plan(&cust, 0)).await.unwrap();

  let all = s.list_plans(&PlanQuery::company(c.company_id)).await.unwrap();
  assert_eq!(all.len(), 3);
  assert!(all.windows(2).all(|w| w[0].scheduled_at <= w[1].scheduled_at));

  let mut q = PlanQuery::company(c.company_id);
  q.sr_ids = Some(vec![r1.user_id, r2.user_id]);
  assert_eq!(s.list_plans(&q).await.unwrap().len(), 2);

  q.sr_ids = Some(Vec::new());
  assert!(s.list_plans(&q).await.unwrap().is_empty());

  let mut q = PlanQuery::company(c.company_id);
  q.scheduled_after = Some(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap());
  q.scheduled_before = Some(Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap());
  let window = s.list_plans(&q).await.unwrap();
  assert_eq!(window.len(), 1);
  assert_eq!(window[0].sr_id, r2.user_id);

  let mut q = PlanQuery::company(c.company_id);
  q.status = Some(PlanStatus::Approved);
  assert!(s.list_plans(&q).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_plan_review_is_rejected() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let rep = s.add_user(new_user(c.company_id, "rep", Role::Sr)).await.unwrap();
  let sup = s.add_user(new_user(c.company_id, "sup", Role::Sup)).await.unwrap();
  let sm = s.add_user(new_user(c.company_id, "sm", Role::Sm)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();

  let mut plan = s.add_plan(c.company_id, rep.user_id, new_plan(&cust, 0)).await.unwrap();
  let loaded = plan.revision();
  plan.submit(Utc.with_ymd_and_hms(2025, 2, 20, 8, 0, 0).unwrap()).unwrap();
  s.update_plan(&plan, loaded).await.unwrap();

  // Two managers open the same pending plan.
  let mut first = s.get_plan(plan.plan_id).await.unwrap().unwrap();
  let mut second = first.clone();
  let at = Utc.with_ymd_and_hms(2025, 2, 20, 9, 0, 0).unwrap();

  let loaded = first.revision();
  first.review(sup.user_id, ReviewDecision::Approve, None, at).unwrap();
  s.update_plan(&first, loaded).await.unwrap();

  let loaded = second.revision();
  second
    .review(sm.user_id, ReviewDecision::Reject, Some("Wrong week".into()), at + Duration::minutes(1))
    .unwrap();
  let err = s.update_plan(&second, loaded).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)), "{err:?}");

  let stored = s.get_plan(plan.plan_id).await.unwrap().unwrap();
  assert_eq!(stored.status, PlanStatus::Approved);
  assert_eq!(stored.reviewer_id, Some(sup.user_id));
}

// ─── Reports and photos ──────────────────────────────────────────────────────

async fn draft_report(s: &SqliteStore, c: &Company, rep: &User, cust: &Customer) -> CallReport {
  s.add_report(c.company_id, rep.user_id, NewReport {
    customer_id: cust.customer_id,
    plan_id:     None,
    summary:     String::new(),
    outcome:     None,
    next_steps:  None,
  })
  .await
  .unwrap()
}

#[tokio::test]
async fn stale_report_edit_cannot_undo_submit() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let rep = s.add_user(new_user(c.company_id, "rep", Role::Sr)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();
  let report = draft_report(&s, &c, &rep, &cust).await;

  let mut submitting = s.get_report(report.report_id).await.unwrap().unwrap();
  let mut editing = submitting.clone();

  let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
  let point = GeoPoint { lat: 13.7563, lng: 100.5018 };
  let loaded = submitting.revision();
  submitting.check_in(point, cust.location, 200.0, at).unwrap();
  submitting.check_out(point, at + Duration::minutes(30)).unwrap();
  submitting.summary = "Agreed on a trial order".into();
  submitting.submit(at + Duration::minutes(31)).unwrap();
  s.update_report(&submitting, loaded).await.unwrap();

  let loaded = editing.revision();
  editing
    .apply(
      ReportPatch { summary: Some("edited".into()), ..ReportPatch::default() },
      at + Duration::minutes(32),
    )
    .unwrap();
  let err = s.update_report(&editing, loaded).await.unwrap_err();
  assert!(err.is_conflict());

  let stored = s.get_report(report.report_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReportStatus::Submitted);
  assert_eq!(stored.summary, "Agreed on a trial order");

  // Deletes are limited to drafts as well.
  assert!(!s.delete_report(report.report_id).await.unwrap());
  assert!(s.get_report(report.report_id).await.unwrap().is_some());
}

#[tokio::test]
async fn only_one_of_two_racing_check_ins_is_stored() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let rep = s.add_user(new_user(c.company_id, "rep", Role::Sr)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();
  let report = draft_report(&s, &c, &rep, &cust).await;

  let mut a = s.get_report(report.report_id).await.unwrap().unwrap();
  let mut b = a.clone();
  let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

  let loaded = a.revision();
  a.check_in(GeoPoint { lat: 13.7563, lng: 100.5018 }, None, 200.0, at).unwrap();
  s.update_report(&a, loaded).await.unwrap();

  let loaded = b.revision();
  b.check_in(GeoPoint { lat: 13.7570, lng: 100.5020 }, None, 200.0, at + Duration::seconds(5))
    .unwrap();
  assert!(matches!(s.update_report(&b, loaded).await, Err(Error::Conflict(_))));

  let stored = s.get_report(report.report_id).await.unwrap().unwrap();
  assert_eq!(stored.check_in, a.check_in);
}

#[tokio::test]
async fn photos_cannot_attach_to_submitted_report() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let rep = s.add_user(new_user(c.company_id, "rep", Role::Sr)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();
  let mut report = draft_report(&s, &c, &rep, &cust).await;

  let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
  let point = GeoPoint { lat: 13.7563, lng: 100.5018 };
  let loaded = report.revision();
  report.check_in(point, None, 200.0, at).unwrap();
  report.check_out(point, at + Duration::minutes(20)).unwrap();
  report.summary = "Restocked samples".into();
  report.submit(at + Duration::minutes(21)).unwrap();
  s.update_report(&report, loaded).await.unwrap();

  let photo = Photo {
    photo_id:     Uuid::new_v4(),
    report_id:    report.report_id,
    company_id:   c.company_id,
    path:         "cd/cdef.png".into(),
    content_hash: "cdef".into(),
    media_type:   "image/png".into(),
    size_bytes:   64,
    uploaded_by:  rep.user_id,
    uploaded_at:  at + Duration::minutes(22),
  };
  let err = s.add_photo(&photo).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)), "{err:?}");
  assert!(s.list_photos(report.report_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn customer_refs_count_plans_and_reports() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let rep = s.add_user(new_user(c.company_id, "rep", Role::Sr)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();
  let idle = s.add_customer(c.company_id, new_customer("H2", 0.0)).await.unwrap();

  s.add_plan(c.company_id, rep.user_id, new_plan(&cust, 0)).await.unwrap();
  draft_report(&s, &c, &rep, &cust).await;

  assert_eq!(s.count_customer_refs(cust.customer_id).await.unwrap(), 2);
  assert_eq!(s.count_customer_refs(idle.customer_id).await.unwrap(), 0);
}

#[tokio::test]
async fn report_gps_stamps_round_trip() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let rep = s.add_user(new_user(c.company_id, "rep", Role::Sr)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();

  let mut report = s
    .add_report(c.company_id, rep.user_id, NewReport {
      customer_id: cust.customer_id,
      plan_id:     None,
      summary:     String::new(),
      outcome:     None,
      next_steps:  None,
    })
    .await
    .unwrap();
  assert_eq!(report.status, ReportStatus::Draft);
  assert!(report.check_in.is_none());
  let loaded = report.revision();

  let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
  let point = GeoPoint { lat: 13.7564, lng: 100.5019 };
  report.check_in = Some(GpsStamp { at, point });
  report.check_out = Some(GpsStamp { at: at + Duration::minutes(45), point });
  report.summary = "Discussed Q2 order".into();
  report.updated_at = at;
  s.update_report(&report, loaded).await.unwrap();

  let fetched = s.get_report(report.report_id).await.unwrap().unwrap();
  assert_eq!(fetched.check_in, report.check_in);
  assert_eq!(fetched.visit_minutes(), Some(45.0));

  let mut q = ReportQuery::company(c.company_id);
  q.sr_id = Some(rep.user_id);
  assert_eq!(s.list_reports(&q).await.unwrap().len(), 1);
  q.status = Some(ReportStatus::Submitted);
  assert!(s.list_reports(&q).await.unwrap().is_empty());
}

#[tokio::test]
async fn photos_share_hashes_and_cascade_with_report() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let rep = s.add_user(new_user(c.company_id, "rep", Role::Sr)).await.unwrap();
  let cust = s.add_customer(c.company_id, new_customer("H1", 0.0)).await.unwrap();
  let report = s
    .add_report(c.company_id, rep.user_id, NewReport {
      customer_id: cust.customer_id,
      plan_id:     None,
      summary:     String::new(),
      outcome:     None,
      next_steps:  None,
    })
    .await
    .unwrap();

  let photo = |id: Uuid| Photo {
    photo_id:     id,
    report_id:    report.report_id,
    company_id:   c.company_id,
    path:         "ab/abcdef.jpg".into(),
    content_hash: "abcdef".into(),
    media_type:   "image/jpeg".into(),
    size_bytes:   1024,
    uploaded_by:  rep.user_id,
    uploaded_at:  Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
  };
  let first = photo(Uuid::new_v4());
  s.add_photo(&first).await.unwrap();
  s.add_photo(&photo(Uuid::new_v4())).await.unwrap();

  assert_eq!(s.count_photos_with_hash("abcdef").await.unwrap(), 2);
  assert_eq!(s.list_photos(report.report_id).await.unwrap().len(), 2);
  assert_eq!(s.get_photo(first.photo_id).await.unwrap().unwrap().size_bytes, 1024);

  assert!(s.delete_photo(first.photo_id).await.unwrap());
  assert_eq!(s.count_photos_with_hash("abcdef").await.unwrap(), 1);

  assert!(s.delete_report(report.report_id).await.unwrap());
  assert_eq!(s.count_photos_with_hash("abcdef").await.unwrap(), 0);
}

// ─── Notifications ───────────────────────────────────────────────────────────

fn note(user_id: Uuid, title: &str) -> NewNotification {
  NewNotification {
    user_id,
    kind: NotificationKind::PlanSubmitted,
    title: title.into(),
    body: String::new(),
    subject_id: None,
  }
}

#[tokio::test]
async fn notification_feed_and_read_state() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let me = s.add_user(new_user(c.company_id, "me", Role::Sup)).await.unwrap();
  let other = s.add_user(new_user(c.company_id, "other", Role::Sup)).await.unwrap();

  let n1 = s.add_notification(note(me.user_id, "one")).await.unwrap();
  s.add_notification(note(me.user_id, "two")).await.unwrap();
  s.add_notification(note(other.user_id, "theirs")).await.unwrap();

  assert_eq!(s.count_unread(me.user_id).await.unwrap(), 2);
  assert_eq!(s.list_notifications(me.user_id, false, 1).await.unwrap().len(), 1);

  // Someone else's notification is invisible.
  assert!(s.mark_read(other.user_id, n1.notification_id).await.unwrap().is_none());

  let read = s.mark_read(me.user_id, n1.notification_id).await.unwrap().unwrap();
  assert!(read.is_read);
  assert!(read.read_at.is_some());
  assert_eq!(s.list_notifications(me.user_id, true, 50).await.unwrap().len(), 1);

  assert_eq!(s.mark_all_read(me.user_id).await.unwrap(), 1);
  assert_eq!(s.count_unread(me.user_id).await.unwrap(), 0);
  assert_eq!(s.count_unread(other.user_id).await.unwrap(), 1);

  assert!(!s.delete_notification(other.user_id, n1.notification_id).await.unwrap());
  assert!(s.delete_notification(me.user_id, n1.notification_id).await.unwrap());
}

#[tokio::test]
async fn preferences_are_created_lazily() {
  let s = store().await;
  let c = company(&s, "Acme").await;
  let me = s.add_user(new_user(c.company_id, "me", Role::Sr)).await.unwrap();

  let mut prefs = s.get_preferences(me.user_id).await.unwrap();
  assert!(prefs.plan_submitted && prefs.plan_reviewed && prefs.report_submitted);

  prefs.plan_reviewed = false;
  s.update_preferences(&prefs).await.unwrap();

  let again = s.get_preferences(me.user_id).await.unwrap();
  assert!(!again.plan_reviewed);
  assert!(!again.allows(NotificationKind::PlanApproved));
  assert!(again.allows(NotificationKind::PlanSubmitted));
}
