// ============================================
// Background Jobs Module (後台任務模組)
// ============================================
//
// Contains background job runners for:
// 1. Reclaiming expired rate-limit, dedup and recency state
//
// Session ids are unbounded, so windowed state has to be swept even for
// sessions that never come back.

pub mod state_sweeper;

pub use state_sweeper::{spawn_state_sweeper, StateSweeperConfig};
