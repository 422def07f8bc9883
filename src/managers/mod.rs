// Managers Module
//
// Focused manager types wired together by the gesture engine.
//
// Each manager handles one specific concern:
// - CalibrationManager: Calibration session guard and reference persistence
// - BroadcastChannelManager: Tokio broadcast channels for engine events

pub mod broadcast_manager;
pub mod calibration_manager;

pub use broadcast_manager::{BroadcastChannelManager, Subscription};
pub use calibration_manager::CalibrationManager;
