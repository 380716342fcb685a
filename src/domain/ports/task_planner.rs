//! Port for the pluggable task planner an Agent Actor consults when
//! building its Task-Group Request (`_plan_task_execution` in the
//! original). Not baked into the core: the default `SingleStepPlanner`
//! exists only so the system runs out of the box.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::{AggregationStrategy, SubtaskKind, TaskRequest, TaskSpec};

/// A concrete execution plan for one incoming task: a flat set of steps
/// plus the strategy to run them under.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub strategy: AggregationStrategy,
    pub steps: Vec<TaskSpec>,
}

#[async_trait]
pub trait TaskPlanner: Send + Sync {
    async fn plan(&self, request: &TaskRequest) -> ExecutionPlan;
}

/// Default planner: wraps the whole task content into a single step,
/// sequential strategy -- the original's documented fallback ("return
/// None, let the caller build a simple plan").
pub struct SingleStepPlanner;

#[async_trait]
impl TaskPlanner for SingleStepPlanner {
    async fn plan(&self, request: &TaskRequest) -> ExecutionPlan {
        ExecutionPlan {
            strategy: AggregationStrategy::Sequential,
            steps: vec![TaskSpec {
                task_id: Uuid::new_v4(),
                task_path: request.task_path.clone(),
                kind: SubtaskKind::Mcp,
                capability: request.capability.clone(),
                agent_type: None,
                content: request.content.clone(),
                params: request.input_params.clone(),
                default_timeout_secs: request.default_timeout_secs,
            }],
        }
    }
}
