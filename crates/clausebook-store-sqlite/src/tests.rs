//! Integration tests for `SqliteStore` against an in-memory database.

use std::path::{Path, PathBuf};

use clausebook_core::{
  Classify, ErrorKind,
  clause::{ClauseEdit, ClauseRecord, NOTE_EDITED, NOTE_INITIAL_IMPORT, NOTE_LIBRARY_IMPORT},
  policy::{ClauseSelection, InfoRow, InfoSection, LiabilityItem, NewPolicy, PolicyDetails},
  session::Session,
  store::{ClauseQuery, ClauseStore, ImportSummary},
  tabular,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn record(uuid: Uuid, title: &str, body: &str) -> ClauseRecord {
  ClauseRecord {
    clause_uuid:       uuid,
    title:             title.into(),
    body:              body.into(),
    phonetic_full:     String::new(),
    phonetic_initials: String::new(),
    insurance_type:    "property".into(),
    company:           "Acme Mutual".into(),
    library_tag:       "2024".into(),
  }
}

/// Import one clause and return its uuid.
async fn seed(s: &SqliteStore, title: &str, body: &str) -> Uuid {
  let uuid = Uuid::new_v4();
  s.import_clauses(vec![record(uuid, title, body)]).await.unwrap();
  uuid
}

// ─── Import ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn import_creates_clause_with_first_version() {
  let s = store().await;
  let uuid = Uuid::new_v4();

  let summary = s
    .import_clauses(vec![record(uuid, "Flood", "Covers flood.")])
    .await
    .unwrap();
  assert_eq!(summary, ImportSummary { created: 1, updated: 0, unchanged: 0 });

  let clause = s.get_clause(uuid).await.unwrap().unwrap();
  assert_eq!(clause.version_number, 1);
  assert_eq!(clause.body, "Covers flood.");

  let versions = s.get_versions(uuid).await.unwrap();
  assert_eq!(versions.len(), 1);
  assert_eq!(versions[0].version_number, 1);
  assert_eq!(versions[0].note, NOTE_INITIAL_IMPORT);
}

#[tokio::test]
async fn reimporting_same_library_changes_nothing() {
  let s = store().await;
  let rows = vec![
    record(Uuid::new_v4(), "Flood", "Covers flood."),
    record(Uuid::new_v4(), "Fire", "Covers fire."),
  ];

  s.import_clauses(rows.clone()).await.unwrap();
  let before = s.export_all().await.unwrap();

  let summary = s.import_clauses(rows).await.unwrap();
  assert_eq!(summary, ImportSummary { created: 0, updated: 0, unchanged: 2 });

  let after = s.export_all().await.unwrap();
  assert_eq!(before, after, "an unchanged import must not touch any row");
  for clause in &after {
    assert_eq!(s.get_versions(clause.clause_uuid).await.unwrap().len(), 1);
  }
}

#[tokio::test]
async fn import_with_new_content_appends_and_promotes() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;

  let summary = s
    .import_clauses(vec![record(uuid, "Flood", "V2")])
    .await
    .unwrap();
  assert_eq!(summary.updated, 1);

  let clause = s.get_clause(uuid).await.unwrap().unwrap();
  assert_eq!(clause.version_number, 2);
  assert_eq!(clause.body, "V2");

  let v2 = s.get_version(uuid, 2).await.unwrap().unwrap();
  assert_eq!(v2.body, "V2");
  assert_eq!(v2.note, NOTE_LIBRARY_IMPORT);
  assert_eq!(s.get_version(uuid, 1).await.unwrap().unwrap().body, "V1");
}

#[tokio::test]
async fn import_with_same_content_refreshes_tags_only() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "Covers flood.").await;

  let mut row = record(uuid, "Flood", "Covers flood.");
  row.company = "Beta Insurance".into();
  row.library_tag = "2025".into();
  let summary = s.import_clauses(vec![row]).await.unwrap();
  assert_eq!(summary.unchanged, 1);

  let clause = s.get_clause(uuid).await.unwrap().unwrap();
  assert_eq!(clause.company, "Beta Insurance");
  assert_eq!(clause.library_tag, "2025");
  assert_eq!(clause.version_number, 1);
  assert_eq!(s.get_versions(uuid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_row_rejects_whole_batch() {
  let s = store().await;
  let existing = seed(&s, "Flood", "V1").await;

  let rows = vec![
    record(existing, "Flood", "V2"),
    record(Uuid::new_v4(), "", "No title"),
  ];
  let err = s.import_clauses(rows).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  let clause = s.get_clause(existing).await.unwrap().unwrap();
  assert_eq!(clause.body, "V1", "the valid row must not have been applied");
  assert_eq!(s.export_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_uuid_in_batch_is_rejected() {
  let s = store().await;
  let uuid = Uuid::new_v4();
  let err = s
    .import_clauses(vec![record(uuid, "A", "a"), record(uuid, "B", "b")])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(s.get_clause(uuid).await.unwrap().is_none());
}

// ─── Queries & export ────────────────────────────────────────────────────────

#[tokio::test]
async fn get_clause_missing_returns_none() {
  let s = store().await;
  assert!(s.get_clause(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_clauses_keeps_library_order_and_filters() {
  let s = store().await;
  let mut marine = record(Uuid::new_v4(), "Cargo", "Covers goods in transit.");
  marine.insurance_type = "marine".into();
  marine.phonetic_initials = "hy".into();
  let rows = vec![
    record(Uuid::new_v4(), "Flood", "Covers flood."),
    marine.clone(),
    record(Uuid::new_v4(), "Fire", "Covers 100% of fire damage."),
  ];
  s.import_clauses(rows.clone()).await.unwrap();

  let all = s.list_clauses(ClauseQuery::default()).await.unwrap();
  let titles: Vec<_> = all.iter().map(|c| c.title.as_str()).collect();
  assert_eq!(titles, ["Flood", "Cargo", "Fire"]);

  let by_type = s
    .list_clauses(ClauseQuery { insurance_type: Some("marine".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_type.len(), 1);
  assert_eq!(by_type[0].clause_uuid, marine.clause_uuid);

  let by_text = s
    .list_clauses(ClauseQuery { text: Some("FIRE".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_text.len(), 1);
  assert_eq!(by_text[0].title, "Fire");

  let by_phonetic = s
    .list_clauses(ClauseQuery { text: Some("hy".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_phonetic.len(), 1);

  let literal_percent = s
    .list_clauses(ClauseQuery { text: Some("100%".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(literal_percent.len(), 1);
  let wildcard = s
    .list_clauses(ClauseQuery { text: Some("%".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(wildcard.len(), 1, "% must match literally");

  let page = s
    .list_clauses(ClauseQuery { limit: Some(1), offset: Some(1), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].title, "Cargo");
}

#[tokio::test]
async fn oversized_page_bounds_are_rejected() {
  let s = store().await;
  seed(&s, "Flood", "V1").await;

  let err = s
    .list_clauses(ClauseQuery { limit: Some(usize::MAX), ..Default::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(err.to_string().contains("limit"));

  let err = s
    .list_clauses(ClauseQuery { offset: Some(i64::MAX as usize + 1), ..Default::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  let all = s
    .list_clauses(ClauseQuery { limit: Some(i64::MAX as usize), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn export_selected_keeps_requested_order() {
  let s = store().await;
  let a = seed(&s, "A", "a").await;
  let b = seed(&s, "B", "b").await;

  let out = s.export_selected(vec![b, a]).await.unwrap();
  let ids: Vec<_> = out.iter().map(|c| c.clause_uuid).collect();
  assert_eq!(ids, [b, a]);

  let err = s.export_selected(vec![a, Uuid::new_v4()]).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn csv_export_reimports_without_changes() {
  let s = store().await;
  seed(&s, "Flood", "Covers flood.\nIncluding \"flash\" floods, rivers, etc.").await;
  seed(&s, "Fire", "Covers fire.").await;

  let mut buf = Vec::new();
  tabular::write_records(&mut buf, &s.export_all().await.unwrap()).unwrap();
  let rows = tabular::read_records(buf.as_slice()).unwrap();
  assert_eq!(rows.len(), 2);

  let summary = s.import_clauses(rows).await.unwrap();
  assert_eq!(summary, ImportSummary { created: 0, updated: 0, unchanged: 2 });
}

#[tokio::test]
async fn clear_wipes_everything() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  s.bind_clauses(policy.policy_id, vec![ClauseSelection::current(uuid)])
    .await
    .unwrap();

  s.clear().await.unwrap();

  assert!(s.export_all().await.unwrap().is_empty());
  assert!(s.list_policies().await.unwrap().is_empty());
  assert!(s.get_version(uuid, 1).await.unwrap().is_none());
}

// ─── Edits ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_edit_is_a_noop() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "Covers flood.").await;
  let before = s.get_clause(uuid).await.unwrap().unwrap();

  let outcome = s
    .update_clause(uuid, ClauseEdit::body("Covers flood."))
    .await
    .unwrap();
  assert!(!outcome.is_versioned());
  assert_eq!(outcome.clause(), &before);
  assert_eq!(s.get_versions(uuid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn edit_creates_version_and_makes_it_current() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;

  let outcome = s
    .update_clause(
      uuid,
      ClauseEdit { title: Some("Flood damage".into()), body: "V2".into(), note: None },
    )
    .await
    .unwrap();
  assert!(outcome.is_versioned());
  assert_eq!(outcome.clause().version_number, 2);
  assert_eq!(outcome.clause().title, "Flood damage");

  let v2 = s.get_version(uuid, 2).await.unwrap().unwrap();
  assert_eq!(v2.body, "V2");
  assert_eq!(v2.note, NOTE_EDITED);
}

#[tokio::test]
async fn title_only_change_is_versioned() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "Body").await;
  let outcome = s
    .update_clause(
      uuid,
      ClauseEdit { title: Some("Flooding".into()), body: "Body".into(), note: Some("rename".into()) },
    )
    .await
    .unwrap();
  assert!(outcome.is_versioned());
  assert_eq!(s.get_version(uuid, 2).await.unwrap().unwrap().note, "rename");
}

#[tokio::test]
async fn edit_rejects_empty_body_and_unknown_clause() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "Body").await;

  let err = s.update_clause(uuid, ClauseEdit::body("  ")).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  let err = s
    .update_clause(Uuid::new_v4(), ClauseEdit::body("x"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Version lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn versions_are_listed_newest_first() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();
  s.update_clause(uuid, ClauseEdit::body("V3")).await.unwrap();

  let numbers: Vec<_> = s
    .get_versions(uuid)
    .await
    .unwrap()
    .iter()
    .map(|v| v.version_number)
    .collect();
  assert_eq!(numbers, [3, 2, 1]);

  let err = s.get_versions(Uuid::new_v4()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deleted_version_numbers_are_never_reused() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();
  s.update_clause(uuid, ClauseEdit::body("V3")).await.unwrap();

  s.delete_version(uuid, 2).await.unwrap();
  let outcome = s.update_clause(uuid, ClauseEdit::body("V4")).await.unwrap();
  assert_eq!(outcome.clause().version_number, 4);

  // Deleting the newest non-current version still doesn't free its number.
  s.activate_version(uuid, 1).await.unwrap();
  s.delete_version(uuid, 4).await.unwrap();
  let outcome = s.update_clause(uuid, ClauseEdit::body("V5")).await.unwrap();
  assert_eq!(outcome.clause().version_number, 5);
}

#[tokio::test]
async fn activate_then_delete_scenario() {
  let s = store().await;
  let uuid = Uuid::new_v4();
  s.import_clauses(vec![record(uuid, "Flood", "V1")]).await.unwrap();
  s.import_clauses(vec![record(uuid, "Flood", "V2")]).await.unwrap();
  assert_eq!(s.get_clause(uuid).await.unwrap().unwrap().version_number, 2);

  let clause = s.activate_version(uuid, 1).await.unwrap();
  assert_eq!(clause.version_number, 1);
  assert_eq!(clause.body, "V1");
  assert_eq!(s.get_versions(uuid).await.unwrap().len(), 2, "activation creates no version");

  s.delete_version(uuid, 2).await.unwrap();
  let err = s.delete_version(uuid, 1).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidOperation);
  assert_eq!(s.get_versions(uuid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn activating_current_version_is_a_noop() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  let before = s.get_clause(uuid).await.unwrap().unwrap();
  let after = s.activate_version(uuid, 1).await.unwrap();
  assert_eq!(before, after);
}

#[tokio::test]
async fn activate_unknown_version_is_not_found() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  let err = s.activate_version(uuid, 7).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn current_version_cannot_be_deleted() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();

  let err = s.delete_version(uuid, 2).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidOperation);

  let err = s.delete_version(uuid, 9).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Policies & bindings ─────────────────────────────────────────────────────

#[tokio::test]
async fn policy_names_are_unique_and_required() {
  let s = store().await;
  s.create_policy(NewPolicy::named("Home")).await.unwrap();

  let err = s.create_policy(NewPolicy::named("Home")).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  let err = s.create_policy(NewPolicy::named("  ")).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  assert!(s.find_policy_by_name("Home".into()).await.unwrap().is_some());
  assert!(s.find_policy_by_name("Auto".into()).await.unwrap().is_none());
}

fn sample_details() -> PolicyDetails {
  PolicyDetails {
    policyholder: "Acme Logistics Ltd".into(),
    liability: vec![LiabilityItem {
      limit_name: "Per occurrence".into(),
      limit:      Some(1_000_000.0),
      premium:    Some(1200.0),
    }],
    other_info: vec![InfoSection {
      name: "Special agreements".into(),
      rows: vec![InfoRow { item: "Claims".into(), description: "Report within 48h".into() }],
    }],
    ..Default::default()
  }
}

#[tokio::test]
async fn policy_details_are_stored_and_replaced() {
  let s = store().await;
  let policy = s
    .create_policy(NewPolicy { details: sample_details(), ..NewPolicy::named("Warehouse") })
    .await
    .unwrap();
  assert_eq!(policy.details, sample_details());

  let loaded = s.get_policy(policy.policy_id).await.unwrap().unwrap();
  assert_eq!(loaded.details, sample_details());

  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  let mut details = sample_details();
  details.policyholder = "Acme Holdings".into();
  details.liability.clear();
  let updated = s
    .update_policy_details(policy.policy_id, details.clone())
    .await
    .unwrap();
  assert_eq!(updated.details, details);
  assert!(updated.updated_at > policy.updated_at);
  assert_eq!(
    s.find_policy_by_name("Warehouse".into()).await.unwrap().unwrap().details,
    details
  );

  let plain = s.create_policy(NewPolicy::named("Plain")).await.unwrap();
  assert!(plain.details.is_empty());

  let err = s
    .update_policy_details(Uuid::new_v4(), PolicyDetails::default())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn policies_list_most_recently_updated_first() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  let home = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  let auto = s.create_policy(NewPolicy::named("Auto")).await.unwrap();

  let names: Vec<_> = s.list_policies().await.unwrap().into_iter().map(|p| p.name).collect();
  assert_eq!(names, ["Auto", "Home"]);

  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  s.bind_clauses(home.policy_id, vec![ClauseSelection::current(uuid)])
    .await
    .unwrap();
  let names: Vec<_> = s.list_policies().await.unwrap().into_iter().map(|p| p.name).collect();
  assert_eq!(names, ["Home", "Auto"]);
  assert!(s.get_policy(auto.policy_id).await.unwrap().is_some());
}

#[tokio::test]
async fn binding_holds_wording_across_edits() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  s.bind_clauses(policy.policy_id, vec![ClauseSelection::current(uuid)])
    .await
    .unwrap();

  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();
  s.import_clauses(vec![record(uuid, "Flood", "V3")]).await.unwrap();

  let bound = s.bound_version(policy.policy_id, uuid).await.unwrap().unwrap();
  assert_eq!(bound.version_number, 1);
  assert_eq!(bound.body, "V1");

  let selected = s.bound_clauses(policy.policy_id).await.unwrap();
  assert_eq!(selected[0].body, "V1");
  assert!(!selected[0].pinned);
}

#[tokio::test]
async fn bind_reconciles_to_exact_selection() {
  let s = store().await;
  let a = seed(&s, "A", "a").await;
  let b = seed(&s, "B", "b").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  let pid = policy.policy_id;

  let summary = s
    .bind_clauses(pid, vec![ClauseSelection::current(a), ClauseSelection::current(b)])
    .await
    .unwrap();
  assert_eq!(summary.bound, 2);

  let summary = s
    .bind_clauses(pid, vec![ClauseSelection::current(a), ClauseSelection::current(b)])
    .await
    .unwrap();
  assert!(summary.is_noop());
  assert_eq!(summary.unchanged, 2);

  let summary = s
    .bind_clauses(pid, vec![ClauseSelection::current(b), ClauseSelection::current(a)])
    .await
    .unwrap();
  assert_eq!(summary.rebound, 2);
  assert_eq!(s.bound_clause_uuids(pid).await.unwrap(), [b, a]);

  let summary = s
    .bind_clauses(pid, vec![ClauseSelection::current(b)])
    .await
    .unwrap();
  assert_eq!(summary.unchanged, 1);
  assert_eq!(summary.removed, 1);
  assert_eq!(s.bound_clause_uuids(pid).await.unwrap(), [b]);
}

#[tokio::test]
async fn bind_pinned_version() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();

  s.bind_clauses(policy.policy_id, vec![ClauseSelection::pinned(uuid, 1)])
    .await
    .unwrap();
  let selected = s.bound_clauses(policy.policy_id).await.unwrap();
  assert_eq!(selected[0].version_number, 1);
  assert!(selected[0].pinned);

  let err = s
    .bind_clauses(policy.policy_id, vec![ClauseSelection::pinned(uuid, 5)])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn failed_bind_applies_nothing() {
  let s = store().await;
  let a = seed(&s, "A", "a").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  s.bind_clauses(policy.policy_id, vec![ClauseSelection::current(a)])
    .await
    .unwrap();

  let err = s
    .bind_clauses(policy.policy_id, vec![ClauseSelection::current(Uuid::new_v4())])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = s
    .bind_clauses(policy.policy_id, vec![ClauseSelection::current(a), ClauseSelection::current(a)])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  assert_eq!(s.bound_clause_uuids(policy.policy_id).await.unwrap(), [a]);

  let err = s.bound_clauses(Uuid::new_v4()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn bound_version_cannot_be_deleted_until_policy_is() {
  let s = store().await;
  let uuid = seed(&s, "Flood", "V1").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  s.bind_clauses(policy.policy_id, vec![ClauseSelection::current(uuid)])
    .await
    .unwrap();
  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();

  let err = s.delete_version(uuid, 1).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidOperation);
  assert!(err.to_string().contains("Home"));

  s.delete_policy(policy.policy_id).await.unwrap();
  s.delete_version(uuid, 1).await.unwrap();
  assert!(s.get_policy(policy.policy_id).await.unwrap().is_none());
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_follows_current_unless_pinned() {
  let s = store().await;
  let a = seed(&s, "A", "a1").await;
  let b = seed(&s, "B", "b1").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();

  let mut session = Session::open(&s, policy.policy_id).await.unwrap();
  session.select(&s, vec![a, b]).await.unwrap();
  session.pin(&s, b, 1).await.unwrap();

  session.update_clause(&s, a, ClauseEdit::body("a2")).await.unwrap();
  session.update_clause(&s, b, ClauseEdit::body("b2")).await.unwrap();

  let bodies: Vec<_> = session.selection().iter().map(|c| c.body.as_str()).collect();
  assert_eq!(bodies, ["a2", "b1"]);

  session.unpin(&s, b).await.unwrap();
  let bodies: Vec<_> = session.selection().iter().map(|c| c.body.as_str()).collect();
  assert_eq!(bodies, ["a2", "b2"]);
}

#[tokio::test]
async fn session_reopens_with_pins_and_order() {
  let s = store().await;
  let a = seed(&s, "A", "a1").await;
  let b = seed(&s, "B", "b1").await;
  s.update_clause(b, ClauseEdit::body("b2")).await.unwrap();
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();

  let mut session = Session::open(&s, policy.policy_id).await.unwrap();
  session.select(&s, vec![b, a]).await.unwrap();
  session.pin(&s, b, 1).await.unwrap();

  let reopened = Session::open(&s, policy.policy_id).await.unwrap();
  assert_eq!(reopened.selected_uuids(), [b, a]);
  assert_eq!(reopened.pins().get(&b), Some(&1));
  assert_eq!(reopened.selection()[0].body, "b1");

  let err = Session::open(&s, Uuid::new_v4()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn session_pin_requires_selection_and_drops_on_deselect() {
  let s = store().await;
  let a = seed(&s, "A", "a1").await;
  let b = seed(&s, "B", "b1").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  let mut session = Session::open(&s, policy.policy_id).await.unwrap();

  let err = session.pin(&s, a, 1).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  session.add(&s, a).await.unwrap();
  session.add(&s, b).await.unwrap();
  session.pin(&s, a, 1).await.unwrap();
  session.remove(&s, a).await.unwrap();
  assert!(session.pins().is_empty());
  assert_eq!(session.selected_uuids(), [b]);
}

#[tokio::test]
async fn session_reconciles_after_import_and_activate() {
  let s = store().await;
  let a = seed(&s, "A", "a1").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  let mut session = Session::open(&s, policy.policy_id).await.unwrap();
  session.select(&s, vec![a]).await.unwrap();

  let mut row = record(a, "A", "a2");
  row.company = "Beta Insurance".into();
  session.import_clauses(&s, vec![row]).await.unwrap();
  assert_eq!(session.selection()[0].body, "a2");
  assert_eq!(session.selection()[0].company, "Beta Insurance");

  session.activate_version(&s, a, 1).await.unwrap();
  assert_eq!(session.selection()[0].body, "a1");

  // v2 is no longer bound, so it can go.
  session.delete_version(&s, a, 2).await.unwrap();
}

#[tokio::test]
async fn reopened_session_catches_up_with_changes_made_outside_it() {
  let s = store().await;
  let a = seed(&s, "A", "a1").await;
  let b = seed(&s, "B", "b1").await;
  let policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  let mut session = Session::open(&s, policy.policy_id).await.unwrap();
  session.select(&s, vec![a, b]).await.unwrap();
  session.pin(&s, b, 1).await.unwrap();
  drop(session);

  s.update_clause(a, ClauseEdit::body("a2")).await.unwrap();
  s.update_clause(b, ClauseEdit::body("b2")).await.unwrap();

  let reopened = Session::open(&s, policy.policy_id).await.unwrap();
  let first = &reopened.selection()[0];
  assert_eq!((first.version_number, first.body.as_str(), first.pinned), (2, "a2", false));
  assert_eq!(reopened.selection()[1].body, "b1");
  let doc = reopened.document(&policy);
  assert!(doc.contains("   a2\n") && !doc.contains("   a1\n"), "{doc}");

  // The catch-up is persisted: v1 of A is no longer bound.
  let bound = s.bound_clauses(policy.policy_id).await.unwrap();
  assert_eq!(bound[0].version_number, 2);
  s.delete_version(a, 1).await.unwrap();

  // Activation and import outside a session are picked up the same way.
  s.activate_version(a, 2).await.unwrap();
  s.import_clauses(vec![record(a, "A", "a3")]).await.unwrap();
  let reopened = Session::open(&s, policy.policy_id).await.unwrap();
  assert_eq!(reopened.selection()[0].body, "a3");
}

#[tokio::test]
async fn session_document_lists_bound_bodies() {
  let s = store().await;
  let a = seed(&s, "Flood", "Covers flood.").await;
  let mut policy = s.create_policy(NewPolicy::named("Home")).await.unwrap();
  policy.description = "Standard home cover".into();
  let mut session = Session::open(&s, policy.policy_id).await.unwrap();
  session.select(&s, vec![a]).await.unwrap();

  let doc = session.document(&policy);
  assert!(doc.starts_with("# Home\n\nStandard home cover\n\n## Special provisions\n\n"));
  assert!(doc.contains("1. **Flood**\n   Covers flood.\n"));
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

fn scratch_dir() -> PathBuf {
  let dir = std::env::temp_dir().join(format!("clausebook-test-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  dir
}

#[tokio::test]
async fn snapshot_import_restores_exported_state() {
  let dir = scratch_dir();
  let mut s = SqliteStore::open(dir.join("clauses.db")).await.unwrap();
  let uuid = seed(&s, "Flood", "V1").await;
  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();
  s.create_policy(NewPolicy::named("Home")).await.unwrap();

  let snapshot = s.export_snapshot().await.unwrap();
  s.clear().await.unwrap();
  seed(&s, "Other", "Other").await;

  s.import_snapshot(snapshot).await.unwrap();

  let clauses = s.export_all().await.unwrap();
  assert_eq!(clauses.len(), 1);
  assert_eq!(clauses[0].clause_uuid, uuid);
  assert_eq!(clauses[0].body, "V2");
  assert_eq!(s.get_versions(uuid).await.unwrap().len(), 2);
  assert!(s.find_policy_by_name("Home".into()).await.unwrap().is_some());
  assert!(!dir.join("clauses.db.bak").exists());
  assert!(!dir.join("clauses.db.incoming").exists());

  let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn corrupt_snapshot_leaves_store_untouched() {
  let dir = scratch_dir();
  let mut s = SqliteStore::open(dir.join("clauses.db")).await.unwrap();
  let uuid = seed(&s, "Flood", "V1").await;

  let err = s
    .import_snapshot(b"definitely not a database file, just some bytes".repeat(100))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  // An empty file opens as a database with schema version 0.
  let err = s.import_snapshot(Vec::new()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  assert_eq!(s.get_clause(uuid).await.unwrap().unwrap().body, "V1");
  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();
  assert!(!dir.join("clauses.db.incoming").exists());

  let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn in_memory_store_refuses_snapshot_import() {
  let mut s = store().await;
  let snapshot = s.export_snapshot().await.unwrap();
  let err = s.import_snapshot(snapshot).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

/// Write a database built from `ddl` and return its bytes.
fn candidate(dir: &Path, ddl: &str) -> Vec<u8> {
  let path = dir.join(format!("candidate-{}.db", Uuid::new_v4()));
  let conn = rusqlite::Connection::open(&path).unwrap();
  conn.execute_batch(ddl).unwrap();
  drop(conn);
  std::fs::read(&path).unwrap()
}

#[tokio::test]
async fn snapshot_with_foreign_layout_is_rejected() {
  let dir = scratch_dir();
  let mut s = SqliteStore::open(dir.join("clauses.db")).await.unwrap();
  let uuid = seed(&s, "Flood", "V1").await;

  // Right table names, wrong columns.
  let wrong_columns = candidate(
    &dir,
    "CREATE TABLE clauses (x TEXT);
     CREATE TABLE clause_versions (y TEXT);
     CREATE TABLE policies (z TEXT);
     CREATE TABLE policy_clause_versions (w TEXT);
     PRAGMA user_version = 2;",
  );
  let err = s.import_snapshot(wrong_columns).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(err.to_string().contains("clauses"), "{err}");

  // Our layout, but stamped by a newer build.
  let newer = candidate(&dir, &format!("{}\nPRAGMA user_version = 99;", crate::schema::SCHEMA));
  let err = s.import_snapshot(newer).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(err.to_string().contains("99"), "{err}");

  assert_eq!(s.get_clause(uuid).await.unwrap().unwrap().body, "V1");
  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();
  assert!(!dir.join("clauses.db.bak").exists());
  assert!(!dir.join("clauses.db.incoming").exists());

  let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn snapshot_failing_to_open_after_swap_restores_previous_database() {
  let dir = scratch_dir();
  let path = dir.join("clauses.db");
  let mut s = SqliteStore::open(&path).await.unwrap();
  let uuid = seed(&s, "Flood", "V1").await;

  // Passes verification, but a table squats on an index name the schema
  // creates, so opening it fails.
  let other = SqliteStore::open(dir.join("other.db")).await.unwrap();
  let stray = seed(&other, "Other", "Other").await;
  other
    .conn
    .call(|conn| {
      conn.execute_batch(
        "DROP INDEX versions_clause_idx; CREATE TABLE versions_clause_idx (x TEXT);",
      )?;
      Ok(())
    })
    .await
    .unwrap();
  let snapshot = other.export_snapshot().await.unwrap();

  let err = s.import_snapshot(snapshot).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Storage);

  assert_eq!(s.get_clause(uuid).await.unwrap().unwrap().body, "V1");
  assert!(s.get_clause(stray).await.unwrap().is_none());
  assert!(!dir.join("clauses.db.bak").exists());
  assert!(!dir.join("clauses.db.incoming").exists());

  s.update_clause(uuid, ClauseEdit::body("V2")).await.unwrap();
  let fresh = SqliteStore::open(&path).await.unwrap();
  assert_eq!(fresh.get_clause(uuid).await.unwrap().unwrap().body, "V2");

  let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn first_revision_database_gains_policy_details_on_open() {
  let dir = scratch_dir();
  let path = dir.join("clauses.db");
  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.create_policy(NewPolicy::named("Home")).await.unwrap();
    s.conn
      .call(|conn| {
        conn.execute_batch("ALTER TABLE policies DROP COLUMN details; PRAGMA user_version = 1;")?;
        Ok(())
      })
      .await
      .unwrap();
    s.conn.clone().close().await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let home = s.find_policy_by_name("Home".into()).await.unwrap().unwrap();
  assert!(home.details.is_empty());
  let updated = s
    .update_policy_details(home.policy_id, sample_details())
    .await
    .unwrap();
  assert_eq!(updated.details, sample_details());

  // A first-revision snapshot still imports.
  let mut s = s;
  let old = SqliteStore::open(dir.join("old.db")).await.unwrap();
  old.create_policy(NewPolicy::named("Legacy")).await.unwrap();
  old
    .conn
    .call(|conn| {
      conn.execute_batch("ALTER TABLE policies DROP COLUMN details; PRAGMA user_version = 1;")?;
      Ok(())
    })
    .await
    .unwrap();
  let snapshot = old.export_snapshot().await.unwrap();
  s.import_snapshot(snapshot).await.unwrap();
  let legacy = s.find_policy_by_name("Legacy".into()).await.unwrap().unwrap();
  assert!(legacy.details.is_empty());

  let _ = std::fs::remove_dir_all(&dir);
}
