//! HTTP server module.
//!
//! Serves the task REST API, the insights endpoint and the embedded browser
//! client.

mod server;
pub mod templates;

pub use server::{
    CreateTaskRequest, DashboardServer, InsightsParams, TaskListParams, UpdateTaskRequest,
    build_router, start_server,
};
