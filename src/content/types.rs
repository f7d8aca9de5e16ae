/// Core content type definitions
///
/// Defines the canonical payload shared by the JSON and CSV upload paths, and the
/// nested views returned by the read endpoints. Views reuse the canonical shapes,
/// so whatever is uploaded as JSON reads back in the same form.

use crate::content::error::IngestError;
use serde::{Deserialize, Serialize};

/// A job role, keyed by its caller-supplied `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRole {
    /// Natural key (e.g., "jr-backend-eng")
    pub id: String,
    pub title: String,
    pub description: String,
    pub department: Option<String>,
    /// Ordered skill list, duplicates preserved
    #[serde(default)]
    pub skills: Vec<String>,
    pub level: Option<String>,
    /// Opaque timestamp string supplied by the uploader
    pub updated_at: Option<String>,
}

/// A process step as it appears inside one flow
///
/// `id`, `name` and `description` live on the shared step record; `depends_on`
/// belongs to the (flow, step) link and may differ between flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A process flow with its embedded steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFlow {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub updated_at: Option<String>,
    pub steps: Vec<ProcessStep>,
}

/// Canonical upload payload
///
/// Both collections are optional; an upload may carry either or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPayload {
    #[serde(default)]
    pub job_roles: Option<Vec<JobRole>>,
    #[serde(default)]
    pub process_flows: Option<Vec<ProcessFlow>>,
}

impl UploadPayload {
    /// Payload carrying job roles only
    pub fn with_job_roles(job_roles: Vec<JobRole>) -> Self {
        Self {
            job_roles: Some(job_roles),
            process_flows: None,
        }
    }

    /// Payload carrying process flows only
    pub fn with_process_flows(process_flows: Vec<ProcessFlow>) -> Self {
        Self {
            job_roles: None,
            process_flows: Some(process_flows),
        }
    }

    pub fn job_roles(&self) -> &[JobRole] {
        self.job_roles.as_deref().unwrap_or_default()
    }

    pub fn process_flows(&self) -> &[ProcessFlow] {
        self.process_flows.as_deref().unwrap_or_default()
    }

    /// Check that every natural key and display name is present
    ///
    /// Runs before any storage mutation so a rejected upload leaves no trace.
    pub fn validate(&self) -> Result<(), IngestError> {
        for (i, role) in self.job_roles().iter().enumerate() {
            let location = format!("job_roles[{}]", i);
            require(&role.id, &location, "id")?;
            require(&role.title, &location, "title")?;
        }

        for (i, flow) in self.process_flows().iter().enumerate() {
            let location = format!("process_flows[{}]", i);
            require(&flow.id, &location, "id")?;
            require(&flow.name, &location, "name")?;

            for (j, step) in flow.steps.iter().enumerate() {
                let location = format!("process_flows[{}].steps[{}]", i, j);
                require(&step.id, &location, "id")?;
                require(&step.name, &location, "name")?;
            }
        }

        Ok(())
    }
}

fn require(value: &str, location: &str, field: &'static str) -> Result<(), IngestError> {
    if value.trim().is_empty() {
        return Err(IngestError::MissingField {
            location: location.to_string(),
            field,
        });
    }
    Ok(())
}

/// Response body for `GET /api/job-roles`
#[derive(Debug, Serialize, Deserialize)]
pub struct JobRoleListing {
    pub data: Vec<JobRole>,
    /// Time the response was assembled, not an entity timestamp
    pub generated_at: String,
}

/// Response body for `GET /api/process-flows`
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessFlowListing {
    pub data: Vec<ProcessFlow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_defaults_missing_lists() {
        let payload: UploadPayload = serde_json::from_value(json!({
            "job_roles": [{ "id": "jr1", "title": "Engineer", "description": "" }],
            "process_flows": [{
                "id": "f1",
                "name": "Onboarding",
                "steps": [{ "id": "s1", "name": "Sign contract" }]
            }]
        }))
        .unwrap();

        let role = &payload.job_roles()[0];
        assert!(role.skills.is_empty());
        assert_eq!(role.department, None);

        let flow = &payload.process_flows()[0];
        assert_eq!(flow.owner, None);
        assert!(flow.steps[0].depends_on.is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_empty_payload_is_valid() {
        let payload: UploadPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.job_roles().is_empty());
        assert!(payload.process_flows().is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_blank_step_name() {
        let payload = UploadPayload::with_process_flows(vec![ProcessFlow {
            id: "f1".to_string(),
            name: "Flow".to_string(),
            owner: None,
            updated_at: None,
            steps: vec![
                ProcessStep {
                    id: "s1".to_string(),
                    name: "First".to_string(),
                    description: None,
                    depends_on: vec![],
                },
                ProcessStep {
                    id: "s2".to_string(),
                    name: "  ".to_string(),
                    description: None,
                    depends_on: vec![],
                },
            ],
        }]);

        match payload.validate() {
            Err(IngestError::MissingField { location, field }) => {
                assert_eq!(location, "process_flows[0].steps[1]");
                assert_eq!(field, "name");
            }
            other => panic!("expected missing field error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_reports_blank_role_id() {
        let payload = UploadPayload::with_job_roles(vec![JobRole {
            id: String::new(),
            title: "Engineer".to_string(),
            description: String::new(),
            department: None,
            skills: vec![],
            level: None,
            updated_at: None,
        }]);

        let err = payload.validate().unwrap_err();
        assert_eq!(err.to_string(), "job_roles[0]: missing required value for `id`");
    }
}
