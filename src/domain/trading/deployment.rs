use rust_decimal::Decimal;

use super::algo::Algo;

/// `NEW → RUNNING → {FINISHED, STOPPED, ERROR}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeploymentStatus {
    New,
    Running,
    Finished,
    Stopped,
    Error,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::New => "new",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Finished => "finished",
            DeploymentStatus::Stopped => "stopped",
            DeploymentStatus::Error => "error",
        }
    }
}

/// A running instance of an [`Algo`]. Exactly one Strategy Worker exists per
/// deployment while its status is `Running`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Deployment {
    pub id: uuid::Uuid,
    pub owner: String,
    pub algo: Algo,
    pub status: DeploymentStatus,
    pub amount: Decimal,
    pub num_cycles: u32,
}
