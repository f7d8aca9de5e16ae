/// Query projector
///
/// Reassembles normalized rows into the nested views served by the read endpoints.

use crate::content::{
    error::ContentResult,
    storage::{self, ContentStorage, FlowRow, FlowStepLinkRow, JobRoleRow, StepRow},
    types::{JobRoleListing, ProcessFlow, ProcessFlowListing, ProcessStep},
};
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;

/// Every job role plus the time this listing was generated
pub async fn list_job_roles(storage: &ContentStorage) -> ContentResult<JobRoleListing> {
    let mut conn = storage.acquire().await?;
    let rows = storage::list_job_roles(&mut conn).await?;

    let data = rows
        .into_iter()
        .map(JobRoleRow::into_role)
        .collect::<ContentResult<Vec<_>>>()?;

    Ok(JobRoleListing {
        data,
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    })
}

/// Every flow with its linked steps and per-flow dependencies
pub async fn list_process_flows(storage: &ContentStorage) -> ContentResult<ProcessFlowListing> {
    // One read transaction so the three selects see the same snapshot
    let mut tx = storage.begin().await?;
    let flows = storage::list_flows(&mut tx).await?;
    let links = storage::list_links(&mut tx).await?;
    let steps = storage::list_steps(&mut tx).await?;
    drop(tx);

    let data = assemble_flows(flows, links, steps)?;
    Ok(ProcessFlowListing { data })
}

/// Join flows to their links and resolve each link's step
///
/// A link whose step row is gone is skipped with a warning instead of failing the
/// whole listing.
fn assemble_flows(
    flows: Vec<FlowRow>,
    links: Vec<FlowStepLinkRow>,
    steps: Vec<StepRow>,
) -> ContentResult<Vec<ProcessFlow>> {
    let steps: HashMap<String, StepRow> = steps.into_iter().map(|s| (s.id.clone(), s)).collect();
    let mut steps_by_flow: HashMap<String, Vec<ProcessStep>> = HashMap::new();

    for link in links {
        let Some(step) = steps.get(&link.step_id) else {
            tracing::warn!(
                flow_id = %link.flow_id,
                step_id = %link.step_id,
                "Skipping flow step link that references a missing step"
            );
            continue;
        };

        let depends_on = link.depends_on()?;
        steps_by_flow.entry(link.flow_id).or_default().push(ProcessStep {
            id: step.id.clone(),
            name: step.name.clone(),
            description: step.description.clone(),
            depends_on,
        });
    }

    Ok(flows
        .into_iter()
        .map(|flow| ProcessFlow {
            steps: steps_by_flow.remove(&flow.id).unwrap_or_default(),
            id: flow.id,
            name: flow.name,
            owner: flow.owner,
            updated_at: flow.updated_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{storage::temp_storage, types::UploadPayload, upsert::apply_payload};

    fn step(id: &str, depends_on: &[&str]) -> ProcessStep {
        ProcessStep {
            id: id.to_string(),
            name: format!("Step {}", id),
            description: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn flow(id: &str, steps: Vec<ProcessStep>) -> ProcessFlow {
        ProcessFlow {
            id: id.to_string(),
            name: format!("Flow {}", id),
            owner: Some("ops".to_string()),
            updated_at: None,
            steps,
        }
    }

    #[tokio::test]
    async fn test_each_flow_sees_its_own_dependencies_for_a_shared_step() {
        let (_dir, storage) = temp_storage().await;
        let payload = UploadPayload::with_process_flows(vec![
            flow("f1", vec![step("s0", &[]), step("s1", &["s0"])]),
            flow("f2", vec![step("s1", &[])]),
        ]);
        apply_payload(&storage, &payload).await.unwrap();

        let listing = list_process_flows(&storage).await.unwrap();
        assert_eq!(listing.data, payload.process_flows().to_vec());
    }

    #[tokio::test]
    async fn test_flow_without_steps_projects_empty_list() {
        let (_dir, storage) = temp_storage().await;
        apply_payload(&storage, &UploadPayload::with_process_flows(vec![flow("empty", vec![])]))
            .await
            .unwrap();

        let listing = list_process_flows(&storage).await.unwrap();
        assert_eq!(listing.data.len(), 1);
        assert!(listing.data[0].steps.is_empty());
    }

    #[tokio::test]
    async fn test_dangling_link_is_skipped() {
        let (_dir, storage) = temp_storage().await;
        apply_payload(
            &storage,
            &UploadPayload::with_process_flows(vec![flow("f1", vec![step("s1", &[]), step("s2", &["s1"])])]),
        )
        .await
        .unwrap();

        {
            let mut conn = storage.acquire().await.unwrap();
            sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *conn).await.unwrap();
            sqlx::query("DELETE FROM process_steps WHERE id = 's2'")
                .execute(&mut *conn)
                .await
                .unwrap();
        }

        let listing = list_process_flows(&storage).await.unwrap();
        let steps: Vec<&str> = listing.data[0].steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(steps, vec!["s1"]);
    }

    #[tokio::test]
    async fn test_job_role_listing_round_trips_skills() {
        let (_dir, storage) = temp_storage().await;
        let payload: UploadPayload = serde_json::from_value(serde_json::json!({
            "job_roles": [{
                "id": "jr1",
                "title": "Engineer",
                "description": "",
                "skills": ["python", "go", "rust"]
            }]
        }))
        .unwrap();
        apply_payload(&storage, &payload).await.unwrap();

        let listing = list_job_roles(&storage).await.unwrap();
        assert_eq!(listing.data[0].skills, vec!["python", "go", "rust"]);
        assert!(chrono::DateTime::parse_from_rfc3339(&listing.generated_at).is_ok());
    }
}
