//! # JSON-Lines RPC
//!
//! One request object per line in, one response object per line out.
//!
//! ```text
//! → {"id":1,"method":"getProjectState","params":{"projectId":"P1"}}
//! ← {"id":1,"ok":{...}}
//! ← {"id":1,"error":{"kind":"ProjectNotFound","message":"project P1 not found"}}
//! ```

use bc_01_hierarchy::{AssignMode, Permissions};
use bc_04_project_workflow::SubmitProject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{ErrorKind, LinkId, OrgId, ProjectId, SignedAction, SignerIdentity};

use crate::service::{OrgRegistration, RegistryError, RegistryResult, RegistryService};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum RpcRequest {
    SubmitProject(SubmitProject),
    ProposeTransition(SignedAction),
    #[serde(rename_all = "camelCase")]
    GetProjectState {
        project_id: ProjectId,
    },
    #[serde(rename_all = "camelCase")]
    GetHistory {
        project_id: ProjectId,
    },
    #[serde(rename_all = "camelCase")]
    ListProjects {
        #[serde(default)]
        subject: Option<OrgId>,
    },
    #[serde(rename_all = "camelCase")]
    GetIssuanceCertificate {
        project_id: ProjectId,
    },
    #[serde(rename_all = "camelCase")]
    AssignSubjectToVerifier {
        by: SignerIdentity,
        subject: OrgId,
        verifier: OrgId,
        #[serde(default)]
        permissions: Permissions,
        #[serde(default)]
        mode: AssignMode,
    },
    #[serde(rename_all = "camelCase")]
    RevokeLink {
        link_id: LinkId,
        by: SignerIdentity,
    },
    RegisterOrganization(OrgRegistration),
    #[serde(rename_all = "camelCase")]
    RegisterMember {
        signer: SignerIdentity,
        org: OrgId,
    },
    #[serde(rename_all = "camelCase")]
    ReconcilePending {
        project_id: ProjectId,
    },
    Reconcile,
    Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RegistryError>,
}

impl RpcResponse {
    fn from_result(id: Option<Value>, result: RegistryResult<Value>) -> Self {
        match result {
            Ok(value) => Self {
                id,
                ok: Some(value),
                error: None,
            },
            Err(error) => Self {
                id,
                ok: None,
                error: Some(error),
            },
        }
    }
}

fn malformed(message: impl Into<String>) -> RegistryError {
    RegistryError::new(ErrorKind::InvalidAction, message)
}

fn to_value<T: Serialize>(value: T) -> RegistryResult<Value> {
    serde_json::to_value(value).map_err(|e| malformed(format!("unencodable result: {e}")))
}

/// Parses one request line, runs it and renders the response line.
pub async fn handle_line(service: &RegistryService, line: &str) -> String {
    let response = match parse(line) {
        Ok((id, request)) => RpcResponse::from_result(id, dispatch(service, request).await),
        Err((id, error)) => RpcResponse::from_result(id, Err(error)),
    };
    serde_json::to_string(&response).unwrap_or_else(|e| {
        format!(r#"{{"error":{{"kind":"InvalidAction","message":"unencodable response: {e}"}}}}"#)
    })
}

fn parse(line: &str) -> Result<(Option<Value>, RpcRequest), (Option<Value>, RegistryError)> {
    let mut value: Value = serde_json::from_str(line)
        .map_err(|e| (None, malformed(format!("malformed request: {e}"))))?;
    let id = value.as_object_mut().and_then(|object| object.remove("id"));
    let request = serde_json::from_value(value)
        .map_err(|e| (id.clone(), malformed(format!("malformed request: {e}"))))?;
    Ok((id, request))
}

pub async fn dispatch(service: &RegistryService, request: RpcRequest) -> RegistryResult<Value> {
    match request {
        RpcRequest::SubmitProject(submission) => to_value(service.submit_project(submission).await?),
        RpcRequest::ProposeTransition(signed) => {
            to_value(service.propose_transition(signed).await?)
        }
        RpcRequest::GetProjectState { project_id } => {
            to_value(service.get_project_state(&project_id)?)
        }
        RpcRequest::GetHistory { project_id } => to_value(service.get_history(&project_id).await?),
        RpcRequest::ListProjects { subject } => to_value(service.list_projects(subject.as_ref())),
        RpcRequest::GetIssuanceCertificate { project_id } => {
            to_value(service.issuance_certificate(&project_id).await?)
        }
        RpcRequest::AssignSubjectToVerifier {
            by,
            subject,
            verifier,
            permissions,
            mode,
        } => to_value(
            service
                .assign_subject_to_verifier(&by, &subject, &verifier, permissions, mode)
                .await?,
        ),
        RpcRequest::RevokeLink { link_id, by } => to_value(service.revoke_link(&link_id, &by).await?),
        RpcRequest::RegisterOrganization(registration) => {
            to_value(service.register_organization(registration)?)
        }
        RpcRequest::RegisterMember { signer, org } => {
            service.register_member(signer, &org)?;
            Ok(Value::Bool(true))
        }
        RpcRequest::ReconcilePending { project_id } => {
            to_value(service.reconcile_pending(&project_id).await?)
        }
        RpcRequest::Reconcile => to_value(service.reconcile_all().await?),
        RpcRequest::Metrics => {
            let text = carbon_telemetry::gather_metrics()
                .map_err(|e| RegistryError::new(ErrorKind::StorageUnavailable, e.to_string()))?;
            Ok(Value::String(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{RegistryConfig, RegistryContainer};
    use std::sync::Arc;

    fn service() -> RegistryService {
        let container = RegistryContainer::new(RegistryConfig::default()).unwrap();
        RegistryService::new(Arc::new(container))
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_action() {
        let out: Value = serde_json::from_str(&handle_line(&service(), "{not json").await).unwrap();
        assert_eq!(out["error"]["kind"], "InvalidAction");
        assert!(out.get("ok").is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_keeps_id() {
        let line = r#"{"id":7,"method":"dropTables","params":{}}"#;
        let out: Value = serde_json::from_str(&handle_line(&service(), line).await).unwrap();
        assert_eq!(out["id"], 7);
        assert_eq!(out["error"]["kind"], "InvalidAction");
    }

    #[tokio::test]
    async fn test_registration_round() {
        let svc = service();
        let line = r#"{"id":"a","method":"registerOrganization","params":{"kind":"root","id":"NCCR","name":"NCCR"}}"#;
        let out: Value = serde_json::from_str(&handle_line(&svc, line).await).unwrap();
        assert_eq!(out["ok"]["id"], "NCCR");

        let line = r#"{"id":"b","method":"getProjectState","params":{"projectId":"P1"}}"#;
        let out: Value = serde_json::from_str(&handle_line(&svc, line).await).unwrap();
        assert_eq!(out["error"]["kind"], "ProjectNotFound");
    }

    #[tokio::test]
    async fn test_unit_method_without_params() {
        let out: Value =
            serde_json::from_str(&handle_line(&service(), r#"{"method":"reconcile"}"#).await)
                .unwrap();
        assert_eq!(out["ok"]["auditAppended"], 0);
    }
}
