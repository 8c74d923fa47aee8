// Managers Module
//
// - BroadcastChannelManager: Tokio broadcast channel management for UI subscribers

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;
