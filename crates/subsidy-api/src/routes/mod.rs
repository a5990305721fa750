//! Route handlers grouped by resource.

pub mod contract;
pub mod health;
pub mod subsidy;

use std::sync::Arc;

use axum::Json;
use ledger_gateway::{ConnectionManager, ContractAdminService, SubsidyService};
use serde::Serialize;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub subsidies: SubsidyService,
    pub admin: ContractAdminService,
    /// Cap for the events `limit` query parameter
    pub max_events_limit: usize,
}

impl AppState {
    pub fn new(connections: Arc<ConnectionManager>, max_events_limit: usize) -> Self {
        Self {
            subsidies: SubsidyService::new(connections.clone()),
            admin: ContractAdminService::new(connections.clone()),
            connections,
            max_events_limit,
        }
    }
}

/// Success body
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data,
    })
}

pub fn ok_with<T: Serialize>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message),
        data,
    })
}
