//! # ecs-runtime
//!
//! シングルスレッドのECSランタイム。
//!
//! - `ecs`: Entity / Component / インデックス / クエリキャッシュ
//! - `schedule`: 優先度順のSystem登録と before/after 配置
//! - `runtime`: 固定タイムステップのシミュレーションループ

pub mod error;
pub mod ecs;
pub mod schedule;
pub mod runtime;

// Re-exports
pub use error::{EcsError, EcsResult};
pub use ecs::{Component, ComponentDefault, ComponentId, ComponentType, EntityId, Query, World};
pub use schedule::{Phase, Placement, Scheduler, System, SystemId};
pub use runtime::{FrameTime, LoopClock, LoopConfig, Simulation, TickReport};
