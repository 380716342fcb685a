//! Route handlers for the trigger/control REST surface.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::domain::error::{DomainError, HttpError};
use crate::domain::models::{ControlSignal, ScheduleType, SignalKind, TaskDefinition};

use super::dto::{
    AdHocTaskRequest, AdHocTaskResponse, HealthResponse, RequestIdLookupResponse, TaskControlResponse,
    TaskDefCreate, TaskDefResponse, TaskModifyRequest, TaskTriggerRequest,
};
use super::state::AppState;

type HttpResult<T> = Result<Json<T>, HttpError>;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn create_task_definition(State(state): State<AppState>, Json(body): Json<TaskDefCreate>) -> HttpResult<TaskDefResponse> {
    let mut definition = if let Some(expr) = &body.cron_expr {
        TaskDefinition::new(body.name, &state.tenant_id, ScheduleType::Cron, body.content).with_cron(expr.clone())
    } else if let Some(loop_config) = &body.loop_config {
        TaskDefinition::new(body.name, &state.tenant_id, ScheduleType::Loop, body.content)
            .with_loop(loop_config.max_rounds, loop_config.loop_interval_secs)
    } else {
        TaskDefinition::new(body.name, &state.tenant_id, ScheduleType::Immediate, body.content)
    };
    definition = definition.with_active(body.is_active);

    state.store.create_definition(&definition).await?;
    Ok(Json(definition.into()))
}

pub async fn list_task_definitions(State(state): State<AppState>) -> HttpResult<Vec<TaskDefResponse>> {
    let defs = state.store.list_definitions(&state.tenant_id).await?;
    Ok(Json(defs.into_iter().map(Into::into).collect()))
}

pub async fn manual_trigger(
    State(state): State<AppState>,
    Path(def_id): Path<Uuid>,
    Json(trigger_req): Json<TaskTriggerRequest>,
) -> HttpResult<AdHocTaskResponse> {
    let definition = state
        .store
        .get_definition(def_id)
        .await?
        .ok_or(DomainError::DefinitionNotFound(def_id))?;

    let request_id = Some(trigger_req.request_id.unwrap_or_else(|| Uuid::new_v4().to_string()));

    let run = match trigger_req.trigger_type.to_uppercase().as_str() {
        "DELAYED" => {
            let delay_secs = definition.delay_secs.unwrap_or(0);
            state
                .scheduler
                .schedule_delayed(def_id, &state.tenant_id, delay_secs, trigger_req.input_params, request_id)
                .await?
        }
        "CRON" => {
            let expr = definition
                .cron_expression
                .as_deref()
                .ok_or_else(|| DomainError::Validation("definition has no cron_expression".to_string()))?;
            state.scheduler.schedule_cron(def_id, &state.tenant_id, expr, Utc::now(), request_id).await?
        }
        "LOOP" => {
            let max_rounds = definition.max_rounds.unwrap_or(1);
            state
                .scheduler
                .schedule_loop(def_id, &state.tenant_id, max_rounds, definition.loop_interval_secs, trigger_req.input_params, request_id)
                .await?
        }
        _ => {
            state
                .scheduler
                .schedule_immediate(def_id, &state.tenant_id, trigger_req.input_params, request_id)
                .await?
        }
    };

    state.store.update_last_triggered_at(def_id, Utc::now()).await?;

    Ok(Json(AdHocTaskResponse {
        trace_id: run.trace_id,
        status: "success".to_string(),
        message: format!("Successfully started trace {} for definition {def_id}", run.trace_id),
    }))
}

pub async fn submit_ad_hoc_task(State(state): State<AppState>, Json(body): Json<AdHocTaskRequest>) -> HttpResult<AdHocTaskResponse> {
    let mut definition = if let Some(loop_config) = &body.loop_config {
        TaskDefinition::new(body.task_name, &state.tenant_id, ScheduleType::Loop, body.task_content)
            .with_loop(loop_config.max_rounds, loop_config.loop_interval_secs)
    } else {
        TaskDefinition::new(body.task_name, &state.tenant_id, ScheduleType::Immediate, body.task_content)
    };
    if body.is_temporary {
        definition = definition.temporary();
    }
    state.store.create_definition(&definition).await?;

    let request_id = Some(body.request_id.unwrap_or_else(|| Uuid::new_v4().to_string()));
    let delay_secs = body.schedule_config.as_ref().and_then(|c| c.get("delay_seconds")).and_then(serde_json::Value::as_i64);

    let run = match body.schedule_type.to_uppercase().as_str() {
        "DELAYED" => {
            state
                .scheduler
                .schedule_delayed(definition.id, &state.tenant_id, delay_secs.unwrap_or(0), body.input_params, request_id)
                .await?
        }
        "CRON" => {
            let expr = body
                .schedule_config
                .as_ref()
                .and_then(|c| c.get("cron_expression"))
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| DomainError::Validation("CRON schedule_type requires schedule_config.cron_expression".to_string()))?;
            state.scheduler.schedule_cron(definition.id, &state.tenant_id, expr, Utc::now(), request_id).await?
        }
        "LOOP" => {
            let loop_config = definition.max_rounds.map(|max_rounds| (max_rounds, definition.loop_interval_secs));
            let (max_rounds, loop_interval_secs) = loop_config.unwrap_or((1, None));
            state
                .scheduler
                .schedule_loop(definition.id, &state.tenant_id, max_rounds, loop_interval_secs, body.input_params, request_id)
                .await?
        }
        _ => {
            state
                .scheduler
                .schedule_immediate(definition.id, &state.tenant_id, body.input_params, request_id)
                .await?
        }
    };

    Ok(Json(AdHocTaskResponse {
        trace_id: run.trace_id,
        status: "success".to_string(),
        message: format!("Ad-hoc task submitted successfully with trace ID {}", run.trace_id),
    }))
}

async fn signal_trace(state: &AppState, trace_id: Uuid, kind: SignalKind) -> Result<TaskControlResponse, HttpError> {
    let instances = state.store.list_instances_by_trace(trace_id).await?;
    if instances.is_empty() {
        return Ok(TaskControlResponse {
            success: false,
            message: "No tasks found to cancel".to_string(),
            details: Some(json!({ "trace_id": trace_id, "affected_instances": [] })),
        });
    }

    state
        .signals
        .set(ControlSignal { kind, trace_id, task_id: None, modify_payload: None, issued_at: Utc::now() })
        .await?;

    let affected: Vec<Uuid> = instances.iter().map(|i| i.id).collect();
    Ok(TaskControlResponse {
        success: true,
        message: format!("{} signal recorded for trace {trace_id}", kind.as_str()),
        details: Some(json!({ "trace_id": trace_id, "affected_instances": affected, "failed_instances": [] })),
    })
}

pub async fn cancel_trace_tasks(State(state): State<AppState>, Path(trace_id): Path<Uuid>) -> HttpResult<TaskControlResponse> {
    Ok(Json(signal_trace(&state, trace_id, SignalKind::Cancel).await?))
}

pub async fn pause_trace_tasks(State(state): State<AppState>, Path(trace_id): Path<Uuid>) -> HttpResult<TaskControlResponse> {
    Ok(Json(signal_trace(&state, trace_id, SignalKind::Pause).await?))
}

pub async fn resume_trace_tasks(State(state): State<AppState>, Path(trace_id): Path<Uuid>) -> HttpResult<TaskControlResponse> {
    Ok(Json(signal_trace(&state, trace_id, SignalKind::Resume).await?))
}

pub async fn modify_trace_tasks(
    State(state): State<AppState>,
    Path(trace_id): Path<Uuid>,
    Json(body): Json<TaskModifyRequest>,
) -> HttpResult<TaskControlResponse> {
    let instances = state.store.list_instances_by_trace(trace_id).await?;
    if instances.is_empty() {
        return Ok(Json(TaskControlResponse {
            success: false,
            message: format!("No tasks found for trace {trace_id}"),
            details: None,
        }));
    }

    state
        .signals
        .set(ControlSignal {
            kind: SignalKind::Resume,
            trace_id,
            task_id: None,
            modify_payload: Some(json!({ "input_params": body.input_params, "schedule_config": body.schedule_config })),
            issued_at: Utc::now(),
        })
        .await?;

    let affected: Vec<Uuid> = instances.iter().map(|i| i.id).collect();
    Ok(Json(TaskControlResponse {
        success: true,
        message: format!("Modify signal recorded for trace {trace_id}"),
        details: Some(json!({ "trace_id": trace_id, "affected_instances": affected, "failed_instances": [] })),
    }))
}

pub async fn request_id_to_trace(State(state): State<AppState>, Path(request_id): Path<String>) -> Json<RequestIdLookupResponse> {
    match state.store.get_trace_by_request_id(&request_id).await {
        Ok(Some(trace_id)) => Json(RequestIdLookupResponse {
            success: true,
            trace_id: Some(trace_id),
            message: format!("Successfully retrieved trace_id for request_id {request_id}"),
        }),
        Ok(None) => Json(RequestIdLookupResponse {
            success: false,
            trace_id: None,
            message: format!("No trace_id found for request_id {request_id}"),
        }),
        Err(err) => Json(RequestIdLookupResponse { success: false, trace_id: None, message: err.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteControlSignalStore, SqliteScheduleStore};
    use crate::domain::models::InstanceStatus;
    use crate::domain::ports::ScheduleStore;
    use crate::services::SchedulerService;

    async fn app_state() -> AppState {
        let pool = create_migrated_test_pool().await.unwrap();
        let store: Arc<dyn ScheduleStore> = Arc::new(SqliteScheduleStore::new(pool.clone()));
        AppState {
            store: Arc::clone(&store),
            scheduler: Arc::new(SchedulerService::new(store)),
            signals: Arc::new(SqliteControlSignalStore::new(pool)),
            tenant_id: "acme".to_string(),
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn create_then_list_task_definition_round_trips() {
        let state = app_state().await;
        let body = TaskDefCreate { name: "daily-report".to_string(), content: json!({ "k": "v" }), cron_expr: None, loop_config: None, is_active: true };
        let Json(created) = create_task_definition(State(state.clone()), Json(body)).await.unwrap();
        assert_eq!(created.name, "daily-report");

        let Json(defs) = list_task_definitions(State(state)).await.unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].id, created.id);
    }

    #[tokio::test]
    async fn manual_trigger_schedules_an_immediate_run() {
        let state = app_state().await;
        let create_body = TaskDefCreate { name: "ad-hoc".to_string(), content: json!({}), cron_expr: None, loop_config: None, is_active: true };
        let Json(def) = create_task_definition(State(state.clone()), Json(create_body)).await.unwrap();

        let trigger = TaskTriggerRequest { input_params: json!({ "x": 1 }), trigger_type: "IMMEDIATE".to_string(), request_id: None };
        let Json(response) = manual_trigger(State(state.clone()), Path(def.id), Json(trigger)).await.unwrap();
        assert_eq!(response.status, "success");

        let run = state.store.get_run(response.trace_id).await.unwrap();
        assert!(run.is_none(), "runs are keyed by their own id, not trace_id, so this lookup is expected to miss");
    }

    #[tokio::test]
    async fn submit_ad_hoc_task_creates_a_temporary_definition() {
        let state = app_state().await;
        let body = AdHocTaskRequest {
            task_name: "one-off".to_string(),
            task_content: json!({ "step": "noop" }),
            input_params: Value::Null,
            loop_config: None,
            is_temporary: true,
            schedule_type: "IMMEDIATE".to_string(),
            schedule_config: None,
            request_id: Some("req-123".to_string()),
        };
        let Json(response) = submit_ad_hoc_task(State(state.clone()), Json(body)).await.unwrap();
        assert_eq!(response.status, "success");

        let Json(lookup) = request_id_to_trace(State(state), Path("req-123".to_string())).await;
        assert!(lookup.success);
        assert_eq!(lookup.trace_id, Some(response.trace_id));
    }

    #[tokio::test]
    async fn cancel_trace_with_no_instances_reports_failure() {
        let state = app_state().await;
        let Json(response) = cancel_trace_tasks(State(state), Path(Uuid::new_v4())).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.message, "No tasks found to cancel");
    }

    #[tokio::test]
    async fn pause_trace_with_instances_records_a_signal() {
        let state = app_state().await;
        let trace_id = Uuid::new_v4();
        let mut instance = crate::domain::models::TaskInstance::root(trace_id, "acme", json!({}));
        instance.status = InstanceStatus::Running;
        state.store.create_instance(&instance).await.unwrap();

        let Json(response) = pause_trace_tasks(State(state.clone()), Path(trace_id)).await.unwrap();
        assert!(response.success);

        let effective = state.signals.get_effective(trace_id, None).await.unwrap().unwrap();
        assert_eq!(effective.kind, SignalKind::Pause);
    }

    #[tokio::test]
    async fn modify_trace_records_resume_signal_with_modify_payload() {
        let state = app_state().await;
        let trace_id = Uuid::new_v4();
        let instance = crate::domain::models::TaskInstance::root(trace_id, "acme", json!({}));
        state.store.create_instance(&instance).await.unwrap();

        let body = TaskModifyRequest { input_params: Some(json!({ "retries": 3 })), schedule_config: None };
        let Json(response) = modify_trace_tasks(State(state.clone()), Path(trace_id), Json(body)).await.unwrap();
        assert!(response.success);

        let effective = state.signals.get_effective(trace_id, None).await.unwrap().unwrap();
        assert_eq!(effective.kind, SignalKind::Resume);
        assert_eq!(effective.modify_payload.unwrap()["input_params"], json!({ "retries": 3 }));
    }

    #[tokio::test]
    async fn request_id_lookup_reports_failure_when_unbound() {
        let state = app_state().await;
        let Json(response) = request_id_to_trace(State(state), Path("missing".to_string())).await;
        assert!(!response.success);
        assert!(response.trace_id.is_none());
    }
}

