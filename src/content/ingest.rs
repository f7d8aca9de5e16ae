/// Ingestion normalizer
///
/// Turns raw uploads into the canonical [`UploadPayload`]. CSV uploads are flat:
/// job-role rows map 1:1 to roles, process-flow rows are (flow, step) pairs that
/// get regrouped into nested flows. JSON uploads already have the canonical shape
/// and are only validated.

use crate::content::{
    error::IngestError,
    types::{JobRole, ProcessFlow, ProcessStep, UploadPayload},
};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Which table a CSV upload describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    JobRoles,
    ProcessFlows,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::JobRoles => "job_roles",
            UploadKind::ProcessFlows => "process_flows",
        }
    }
}

impl FromStr for UploadKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job_roles" => Ok(UploadKind::JobRoles),
            "process_flows" => Ok(UploadKind::ProcessFlows),
            other => Err(IngestError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of normalizing a CSV upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUpload {
    pub payload: UploadPayload,
    /// Data rows read from the file, before any grouping
    pub rows: usize,
}

/// One row of a `job_roles` CSV
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobRoleRecord {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    department: Option<String>,
    skills: Option<String>,
    level: Option<String>,
    updated_at: Option<String>,
}

/// One (flow, step) row of a `process_flows` CSV
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlowStepRecord {
    flow_id: Option<String>,
    flow_name: Option<String>,
    owner: Option<String>,
    flow_updated_at: Option<String>,
    step_id: Option<String>,
    step_name: Option<String>,
    step_description: Option<String>,
    depends_on: Option<String>,
}

/// A flow being assembled from its rows; steps keyed by id keep first-seen order
struct FlowGroup {
    flow: ProcessFlow,
    steps: IndexMap<String, ProcessStep>,
}

/// Decode upload bytes as UTF-8, silently dropping invalid sequences
pub fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Parse and validate a JSON body in the canonical payload shape
pub fn parse_json_payload(body: &[u8]) -> Result<UploadPayload, IngestError> {
    let payload: UploadPayload = serde_json::from_slice(body)?;
    payload.validate()?;
    Ok(payload)
}

/// Normalize a CSV upload of the given kind
///
/// Fails on the first row missing a required value; nothing is returned for a
/// partially valid file.
pub fn normalize_csv(kind: UploadKind, bytes: &[u8]) -> Result<NormalizedUpload, IngestError> {
    let text = decode_lossy(bytes);

    match kind {
        UploadKind::JobRoles => {
            let records: Vec<(u64, JobRoleRecord)> = read_records(&text)?;
            let rows = records.len();
            let job_roles = records
                .into_iter()
                .map(|(line, record)| job_role_from_record(line, record))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(NormalizedUpload {
                payload: UploadPayload::with_job_roles(job_roles),
                rows,
            })
        }
        UploadKind::ProcessFlows => {
            let records: Vec<(u64, FlowStepRecord)> = read_records(&text)?;
            let rows = records.len();
            let process_flows = group_flows(records)?;

            Ok(NormalizedUpload {
                payload: UploadPayload::with_process_flows(process_flows),
                rows,
            })
        }
    }
}

/// Read every data row with its line number in the source text
fn read_records<T: DeserializeOwned>(text: &str) -> Result<Vec<(u64, T)>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        records.push((line, record.deserialize(Some(&headers))?));
    }

    Ok(records)
}

fn job_role_from_record(line: u64, record: JobRoleRecord) -> Result<JobRole, IngestError> {
    Ok(JobRole {
        id: required(record.id, line, "id")?,
        title: required(record.title, line, "title")?,
        description: optional(record.description).unwrap_or_default(),
        department: optional(record.department),
        skills: split_pipes(record.skills),
        level: optional(record.level),
        updated_at: optional(record.updated_at),
    })
}

/// Regroup (flow, step) rows into nested flows
///
/// Flow metadata is rewritten by every row of that flow, so the last row wins.
/// A repeated step id within one flow keeps its first position and takes the
/// content of its last row.
fn group_flows(records: Vec<(u64, FlowStepRecord)>) -> Result<Vec<ProcessFlow>, IngestError> {
    let mut groups: IndexMap<String, FlowGroup> = IndexMap::new();

    for (line, record) in records {
        let flow_id = required(record.flow_id, line, "flow_id")?;
        let flow_name = required(record.flow_name, line, "flow_name")?;
        let step_id = required(record.step_id, line, "step_id")?;
        let step_name = required(record.step_name, line, "step_name")?;

        let group = groups.entry(flow_id.clone()).or_insert_with(|| FlowGroup {
            flow: ProcessFlow {
                id: flow_id,
                name: String::new(),
                owner: None,
                updated_at: None,
                steps: Vec::new(),
            },
            steps: IndexMap::new(),
        });

        group.flow.name = flow_name;
        group.flow.owner = optional(record.owner);
        group.flow.updated_at = optional(record.flow_updated_at);

        group.steps.insert(
            step_id.clone(),
            ProcessStep {
                id: step_id,
                name: step_name,
                description: optional(record.step_description),
                depends_on: split_pipes(record.depends_on),
            },
        );
    }

    Ok(groups
        .into_values()
        .map(|group| ProcessFlow {
            steps: group.steps.into_values().collect(),
            ..group.flow
        })
        .collect())
}

fn required(value: Option<String>, line: u64, column: &'static str) -> Result<String, IngestError> {
    optional(value).ok_or_else(|| IngestError::MissingField {
        location: format!("line {}", line),
        field: column,
    })
}

/// Empty or whitespace-only cells are absent
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a `a|b|c` cell into its non-empty, trimmed items
fn split_pipes(value: Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
