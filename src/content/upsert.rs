/// Upsert engine
///
/// Merges a canonical payload into storage inside one transaction. Every entity is
/// looked up by its natural key and then either inserted or fully overwritten;
/// fields are never merged. Steps are shared between flows, so the last upload to
/// mention a step decides its name and description. Links missing from a new
/// upload are left in place.

use crate::content::{
    error::ContentResult,
    storage::{self, ContentStorage, FlowRow, FlowStepLinkRow, JobRoleRow, StepRow},
    types::{JobRole, ProcessFlow, ProcessStep, UploadPayload},
};
use serde::Serialize;
use sqlx::SqliteConnection;

/// What happened to a single entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    Inserted,
    Updated,
}

/// Insert/update counters for one entity kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertCounts {
    fn record(&mut self, written: Written) {
        match written {
            Written::Inserted => self.inserted += 1,
            Written::Updated => self.updated += 1,
        }
    }
}

/// Summary of one committed upload
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub job_roles: UpsertCounts,
    pub flows: UpsertCounts,
    pub steps: UpsertCounts,
    pub links: UpsertCounts,
}

/// Apply the whole payload and commit once
///
/// Any error drops the transaction before commit, discarding every write made
/// for this payload.
pub async fn apply_payload(storage: &ContentStorage, payload: &UploadPayload) -> ContentResult<UpsertReport> {
    let mut tx = storage.begin_write().await?;
    let mut report = UpsertReport::default();

    for role in payload.job_roles() {
        report.job_roles.record(upsert_job_role(&mut tx, role).await?);
    }

    for flow in payload.process_flows() {
        report.flows.record(upsert_flow(&mut tx, flow).await?);

        for step in &flow.steps {
            report.steps.record(upsert_step(&mut tx, step).await?);
            report.links.record(upsert_link(&mut tx, &flow.id, step).await?);
        }
    }

    tx.commit().await?;

    tracing::info!(
        job_roles_inserted = report.job_roles.inserted,
        job_roles_updated = report.job_roles.updated,
        flows_inserted = report.flows.inserted,
        flows_updated = report.flows.updated,
        steps_inserted = report.steps.inserted,
        steps_updated = report.steps.updated,
        links_inserted = report.links.inserted,
        links_updated = report.links.updated,
        "Upload committed"
    );

    Ok(report)
}

pub async fn upsert_job_role(conn: &mut SqliteConnection, role: &JobRole) -> ContentResult<Written> {
    let row = JobRoleRow::from_role(role)?;

    match storage::fetch_job_role(conn, &row.id).await? {
        None => {
            storage::insert_job_role(conn, &row).await?;
            Ok(Written::Inserted)
        }
        Some(_) => {
            storage::update_job_role(conn, &row).await?;
            Ok(Written::Updated)
        }
    }
}

/// Flow metadata only; embedded steps are handled by the caller
pub async fn upsert_flow(conn: &mut SqliteConnection, flow: &ProcessFlow) -> ContentResult<Written> {
    let row = FlowRow {
        id: flow.id.clone(),
        name: flow.name.clone(),
        owner: flow.owner.clone(),
        updated_at: flow.updated_at.clone(),
    };

    match storage::fetch_flow(conn, &row.id).await? {
        None => {
            storage::insert_flow(conn, &row).await?;
            Ok(Written::Inserted)
        }
        Some(_) => {
            storage::update_flow(conn, &row).await?;
            Ok(Written::Updated)
        }
    }
}

pub async fn upsert_step(conn: &mut SqliteConnection, step: &ProcessStep) -> ContentResult<Written> {
    let row = StepRow::from(step);

    match storage::fetch_step(conn, &row.id).await? {
        None => {
            storage::insert_step(conn, &row).await?;
            Ok(Written::Inserted)
        }
        Some(existing) => {
            if existing.name != row.name || existing.description != row.description {
                tracing::debug!(step_id = %row.id, "Overwriting shared step content");
            }
            storage::update_step(conn, &row).await?;
            Ok(Written::Updated)
        }
    }
}

pub async fn upsert_link(conn: &mut SqliteConnection, flow_id: &str, step: &ProcessStep) -> ContentResult<Written> {
    let row = FlowStepLinkRow::new(flow_id, step)?;

    match storage::fetch_link(conn, &row.flow_id, &row.step_id).await? {
        None => {
            storage::insert_link(conn, &row).await?;
            Ok(Written::Inserted)
        }
        Some(_) => {
            storage::update_link(conn, &row).await?;
            Ok(Written::Updated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::storage::temp_storage;

    fn role(id: &str, title: &str, skills: &[&str]) -> JobRole {
        JobRole {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{} description", title),
            department: Some("Engineering".to_string()),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            level: None,
            updated_at: None,
        }
    }

    fn step(id: &str, name: &str, depends_on: &[&str]) -> ProcessStep {
        ProcessStep {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn flow(id: &str, steps: Vec<ProcessStep>) -> ProcessFlow {
        ProcessFlow {
            id: id.to_string(),
            name: format!("Flow {}", id),
            owner: None,
            updated_at: None,
            steps,
        }
    }

    #[tokio::test]
    async fn test_job_role_upsert_overwrites_by_id() {
        let (_dir, storage) = temp_storage().await;

        let first = apply_payload(&storage, &UploadPayload::with_job_roles(vec![role("jr1", "A", &["go"])]))
            .await
            .unwrap();
        assert_eq!(first.job_roles, UpsertCounts { inserted: 1, updated: 0 });

        let mut replacement = role("jr1", "B", &[]);
        replacement.department = None;
        let second = apply_payload(&storage, &UploadPayload::with_job_roles(vec![replacement]))
            .await
            .unwrap();
        assert_eq!(second.job_roles, UpsertCounts { inserted: 0, updated: 1 });

        let mut conn = storage.acquire().await.unwrap();
        let rows = storage::list_job_roles(&mut conn).await.unwrap();
        assert_eq!(rows.len(), 1);
        let stored = rows[0].clone().into_role().unwrap();
        assert_eq!(stored.title, "B");
        // Full replacement: cleared fields do not survive from the first upload
        assert_eq!(stored.department, None);
        assert!(stored.skills.is_empty());
    }

    #[tokio::test]
    async fn test_shared_step_is_stored_once_with_last_write() {
        let (_dir, storage) = temp_storage().await;

        let payload = UploadPayload::with_process_flows(vec![
            flow("f1", vec![step("s1", "Review", &[])]),
            flow("f2", vec![step("s0", "Draft", &[]), step("s1", "Final review", &["s0"])]),
        ]);
        let report = apply_payload(&storage, &payload).await.unwrap();

        assert_eq!(report.flows.inserted, 2);
        assert_eq!(report.steps, UpsertCounts { inserted: 2, updated: 1 });
        assert_eq!(report.links.inserted, 3);

        let mut conn = storage.acquire().await.unwrap();
        let steps = storage::list_steps(&mut conn).await.unwrap();
        assert_eq!(steps.len(), 2);
        let s1 = storage::fetch_step(&mut conn, "s1").await.unwrap().unwrap();
        assert_eq!(s1.name, "Final review");

        let f1_link = storage::fetch_link(&mut conn, "f1", "s1").await.unwrap().unwrap();
        let f2_link = storage::fetch_link(&mut conn, "f2", "s1").await.unwrap().unwrap();
        assert!(f1_link.depends_on().unwrap().is_empty());
        assert_eq!(f2_link.depends_on().unwrap(), vec!["s0"]);
    }

    #[tokio::test]
    async fn test_reupload_with_fewer_steps_keeps_old_links() {
        let (_dir, storage) = temp_storage().await;

        apply_payload(
            &storage,
            &UploadPayload::with_process_flows(vec![flow("f1", vec![step("s1", "One", &[]), step("s2", "Two", &["s1"])])]),
        )
        .await
        .unwrap();

        let report = apply_payload(
            &storage,
            &UploadPayload::with_process_flows(vec![flow("f1", vec![step("s1", "One", &["s9"])])]),
        )
        .await
        .unwrap();
        assert_eq!(report.links, UpsertCounts { inserted: 0, updated: 1 });

        let mut conn = storage.acquire().await.unwrap();
        let links = storage::list_links(&mut conn).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].depends_on().unwrap(), vec!["s9"]);
        assert_eq!(links[1].step_id, "s2");
    }

    #[tokio::test]
    async fn test_same_payload_twice_is_idempotent() {
        let (_dir, storage) = temp_storage().await;
        let payload = UploadPayload {
            job_roles: Some(vec![role("jr1", "Engineer", &["rust", "sql"])]),
            process_flows: Some(vec![flow("f1", vec![step("s1", "Start", &[])])]),
        };

        apply_payload(&storage, &payload).await.unwrap();
        let second = apply_payload(&storage, &payload).await.unwrap();

        assert_eq!(second.job_roles.inserted + second.flows.inserted + second.steps.inserted, 0);
        assert_eq!(second.links.updated, 1);

        let mut conn = storage.acquire().await.unwrap();
        assert_eq!(storage::list_job_roles(&mut conn).await.unwrap().len(), 1);
        assert_eq!(storage::list_flows(&mut conn).await.unwrap().len(), 1);
        assert_eq!(storage::list_links(&mut conn).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_uploads_all_commit() {
        let (_dir, storage) = temp_storage().await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    let payload = UploadPayload {
                        job_roles: Some(vec![role(&format!("jr{}", i), "Engineer", &["rust"])]),
                        process_flows: Some(vec![flow(
                            &format!("f{}", i),
                            vec![step("shared", "Review", &[]), step(&format!("s{}", i), "Own", &["shared"])],
                        )]),
                    };
                    apply_payload(&storage, &payload).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut conn = storage.acquire().await.unwrap();
        assert_eq!(storage::list_job_roles(&mut conn).await.unwrap().len(), 8);
        assert_eq!(storage::list_flows(&mut conn).await.unwrap().len(), 8);
        assert_eq!(storage::list_steps(&mut conn).await.unwrap().len(), 9);
        assert_eq!(storage::list_links(&mut conn).await.unwrap().len(), 16);
    }
}
