//! Orbital Core: a multi-tenant task orchestration engine covering
//! trigger/scheduling, actor routing and lifecycle, and agent planning
//! with NEED_INPUT pause/resume.
//!
//! - Schedule Store (C3) persists Task Definitions, Scheduled Runs, and
//!   Task Instances
//! - Schedule Scanner/Dispatcher (C5/C6) turn due runs into execution
//! - Router/Session/Agent/Aggregator/Leaf/Execution actors (C7-C11) carry
//!   a task request through planning, routing, and capability dispatch
//! - A REST API mirrors the trigger service's ad-hoc/control surface

pub mod actors;
pub mod adapters;
pub mod domain;
pub mod http;
pub mod infrastructure;
pub mod services;
