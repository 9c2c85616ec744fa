use innkeep_approval::ApprovalService;
use innkeep_store::Telemetry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub approvals: Arc<ApprovalService>,
    pub telemetry: Arc<Telemetry>,
}
