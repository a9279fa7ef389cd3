//! System登録と実行順管理
//!
//! - 優先度の昇順に実行（小さいほど先）
//! - 同じ優先度は有効化された順（後から有効化したものが後ろ）
//! - `before` / `after` は参照先Systemの優先度から数値優先度を導出する

use std::collections::HashMap;

use tracing::debug;

use super::system::{PhaseFn, Placement, System, SystemId};
use crate::ecs::{EntityId, Query, World};
use crate::error::{EcsError, EcsResult};
use crate::runtime::FrameTime;

/// 相対配置で参照先からずらす量
pub const ORDERING_EPSILON: f64 = 0.1;

/// 登録済みSystem
struct Entry {
    system: System,
    priority: f64,
    query: Option<Query>,
    active: bool,
}

/// System登録簿と実行順リスト
#[derive(Default)]
pub struct Scheduler {
    entries: HashMap<SystemId, Entry>,
    /// 有効なSystemの実行順
    order: Vec<SystemId>,
    next_id: u32,
    /// エンティティスナップショット用の再利用バッファ
    scratch: Vec<EntityId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 配置指定から数値優先度を導出
    ///
    /// - `after`: 下限 = 参照先の最小優先度 - ε
    /// - `before`: 上限 = 参照先の最大優先度 + ε
    /// - 両方: 中点（下限 > 上限ならエラー）
    /// - どちらもなし: 0
    pub fn resolve_priority(&self, placement: &Placement) -> EcsResult<f64> {
        let priority = match placement {
            Placement::Priority(priority) => *priority,
            Placement::Relative { before, after } => self.derive_priority(before, after)?,
        };
        // NaN / 無限大は昇順リストの位置が決まらない
        if !priority.is_finite() {
            return Err(EcsError::InvalidPriority(priority));
        }
        Ok(priority)
    }

    fn derive_priority(&self, before: &[SystemId], after: &[SystemId]) -> EcsResult<f64> {
        let lower = self
            .bound(after, f64::min)?
            .map(|priority| priority - ORDERING_EPSILON);
        let upper = self
            .bound(before, f64::max)?
            .map(|priority| priority + ORDERING_EPSILON);

        match (lower, upper) {
            (Some(lower), Some(upper)) if lower > upper => {
                Err(EcsError::InconsistentOrdering { lower, upper })
            }
            (Some(lower), Some(upper)) => Ok((lower + upper) / 2.0),
            (Some(bound), None) | (None, Some(bound)) => Ok(bound),
            (None, None) => Ok(0.0),
        }
    }

    fn bound(&self, systems: &[SystemId], pick: fn(f64, f64) -> f64) -> EcsResult<Option<f64>> {
        systems.iter().try_fold(None, |acc: Option<f64>, &id| {
            let priority = self.priority(id).ok_or(EcsError::UnknownSystem(id))?;
            Ok(Some(acc.map_or(priority, |acc| pick(acc, priority))))
        })
    }

    /// Systemを登録する（有効化はしない）
    pub(crate) fn register(&mut self, system: System, priority: f64, query: Option<Query>) -> SystemId {
        let id = SystemId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                system,
                priority,
                query,
                active: false,
            },
        );
        id
    }

    /// 実行順リストに挿入。既に有効ならfalse
    pub fn activate(&mut self, id: SystemId) -> EcsResult<bool> {
        let entry = self.entries.get_mut(&id).ok_or(EcsError::UnknownSystem(id))?;
        if entry.active {
            return Ok(false);
        }
        entry.active = true;
        let priority = entry.priority;

        // 末尾から走査し、優先度が大きいものの前に挿入（同値は後ろに付く）
        let mut position = self.order.len();
        while position > 0 && self.entries[&self.order[position - 1]].priority > priority {
            position -= 1;
        }
        self.order.insert(position, id);

        debug!(system = %id, name = self.entries[&id].system.name(), priority, position, "system activated");
        Ok(true)
    }

    /// 実行順リストから取り除く。有効でなければfalse
    pub fn deactivate(&mut self, id: SystemId) -> EcsResult<bool> {
        let entry = self.entries.get_mut(&id).ok_or(EcsError::UnknownSystem(id))?;
        if !entry.active {
            return Ok(false);
        }
        entry.active = false;
        self.order.retain(|&other| other != id);

        debug!(system = %id, name = entry.system.name(), "system deactivated");
        Ok(true)
    }

    /// Systemを登録解除し、保持していたクエリを返す
    pub(crate) fn remove(&mut self, id: SystemId) -> EcsResult<Option<Query>> {
        self.deactivate(id)?;
        let entry = self.entries.remove(&id).ok_or(EcsError::UnknownSystem(id))?;
        Ok(entry.query)
    }

    /// 導出済みの優先度
    pub fn priority(&self, id: SystemId) -> Option<f64> {
        self.entries.get(&id).map(|entry| entry.priority)
    }

    pub fn is_active(&self, id: SystemId) -> bool {
        self.entries.get(&id).is_some_and(|entry| entry.active)
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn system(&self, id: SystemId) -> Option<&System> {
        self.entries.get(&id).map(|entry| &entry.system)
    }

    /// Systemに紐づくクエリ
    pub fn query(&self, id: SystemId) -> Option<&Query> {
        self.entries.get(&id)?.query.as_ref()
    }

    /// 有効なSystemの実行順
    pub fn order(&self) -> &[SystemId] {
        &self.order
    }

    /// 登録済みSystem数（無効なものを含む）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub(crate) fn run_early_update(&mut self, world: &mut World, time: FrameTime) {
        self.run_timed(world, time, |system| system.early_update.as_mut());
    }

    pub(crate) fn run_update(&mut self, world: &mut World, time: FrameTime) {
        self.run_timed(world, time, |system| system.update.as_mut());
    }

    pub(crate) fn run_draw(&mut self, world: &mut World, time: FrameTime) {
        self.run_timed(world, time, |system| system.draw.as_mut());
    }

    /// 全Systemのcalculusを1サブステップ分実行
    pub(crate) fn run_calculus(&mut self, world: &mut World, dt: f64) {
        for id in &self.order {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            let Some(callback) = entry.system.calculus.as_mut() else {
                continue;
            };
            snapshot(&mut self.scratch, world, entry.query.as_ref());
            callback(world, &self.scratch, dt);
        }
    }

    fn run_timed(
        &mut self,
        world: &mut World,
        time: FrameTime,
        select: impl Fn(&mut System) -> Option<&mut PhaseFn>,
    ) {
        for id in &self.order {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            let Some(callback) = select(&mut entry.system) else {
                continue;
            };
            snapshot(&mut self.scratch, world, entry.query.as_ref());
            callback(world, &self.scratch, time);
        }
    }
}

/// 呼び出し直前のクエリ結果を `buffer` に写す
fn snapshot(buffer: &mut Vec<EntityId>, world: &World, query: Option<&Query>) {
    buffer.clear();
    if let Some(query) = query {
        buffer.extend(world.query_entities(query).iter().copied());
    }
}
