//! シミュレーション本体
//!
//! World・Scheduler・LoopClock をまとめ、tick / frame ごとにフェーズを実行する。
//!
//! ```text
//! tick(now):  earlyUpdate(全System) → calculus × サブステップ数(全System) → update(全System)
//! frame(now): draw(全System)
//! ```

use tracing::info;

use super::clock::{FrameTime, LoopClock, TickReport};
use super::config::LoopConfig;
use crate::ecs::World;
use crate::error::EcsResult;
use crate::schedule::{Scheduler, System, SystemId};

/// World + Scheduler + ループ時刻
pub struct Simulation {
    world: World,
    scheduler: Scheduler,
    clock: LoopClock,
    config: LoopConfig,
}

impl Simulation {
    /// 空のWorldでシミュレーションを作成
    pub fn new(config: LoopConfig) -> EcsResult<Self> {
        Self::with_world(World::new(), config)
    }

    /// 既存のWorldでシミュレーションを作成
    pub fn with_world(world: World, config: LoopConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self {
            world,
            scheduler: Scheduler::new(),
            clock: LoopClock::new(&config),
            config,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    // ========================================================================
    // Systems
    // ========================================================================

    /// Systemを登録して有効化する
    ///
    /// 優先度の導出とクエリ作成に失敗した場合は何も登録しない
    pub fn add_system(&mut self, system: System) -> EcsResult<SystemId> {
        let priority = self.scheduler.resolve_priority(system.placement())?;
        let query = if system.query().is_empty() {
            None
        } else {
            Some(self.world.create_query(system.query().iter().copied())?)
        };

        let id = self.scheduler.register(system, priority, query);
        self.scheduler.activate(id)?;
        Ok(id)
    }

    pub fn activate(&mut self, id: SystemId) -> EcsResult<bool> {
        self.scheduler.activate(id)
    }

    pub fn deactivate(&mut self, id: SystemId) -> EcsResult<bool> {
        self.scheduler.deactivate(id)
    }

    /// Systemを登録解除し、クエリを解放する
    pub fn remove_system(&mut self, id: SystemId) -> EcsResult<()> {
        if let Some(query) = self.scheduler.remove(id)? {
            self.world.destroy_query(query)?;
        }
        Ok(())
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// 両駆動の時刻をリセットして開始
    pub fn start(&mut self, now: f64) {
        self.clock.start(now);
        info!(now, systems = self.scheduler.order().len(), "simulation started");
    }

    /// 停止。開始前や停止済みでも安全
    pub fn stop(&mut self) {
        if self.clock.stop() {
            info!("simulation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// update駆動: earlyUpdate → calculus（サブステップ） → update。停止中はNone
    pub fn tick(&mut self, now: f64) -> Option<TickReport> {
        let report = self.clock.tick(now)?;

        self.scheduler.run_early_update(&mut self.world, report.time);
        for _ in 0..report.substeps {
            self.scheduler.run_calculus(&mut self.world, report.substep_dt);
        }
        self.scheduler.run_update(&mut self.world, report.time);

        Some(report)
    }

    /// draw駆動: draw。停止中はNone
    pub fn frame(&mut self, now: f64) -> Option<FrameTime> {
        let time = self.clock.frame(now)?;
        self.scheduler.run_draw(&mut self.world, time);
        Some(time)
    }
}
