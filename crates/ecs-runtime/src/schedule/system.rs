use std::fmt;

use crate::ecs::{ComponentId, EntityId, World};
use crate::runtime::FrameTime;

/// earlyUpdate / update / draw のコールバック
pub type PhaseFn = Box<dyn FnMut(&mut World, &[EntityId], FrameTime)>;

/// calculus（固定サブステップ）のコールバック。引数はサブステップ秒数
pub type CalculusFn = Box<dyn FnMut(&mut World, &[EntityId], f64)>;

/// System識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub(crate) u32);

impl SystemId {
    /// 生の値を取得
    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

/// ライフサイクルフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    EarlyUpdate,
    Calculus,
    Update,
    Draw,
}

impl Phase {
    /// 実行順の全フェーズ
    pub const ALL: [Phase; 4] = [Phase::EarlyUpdate, Phase::Calculus, Phase::Update, Phase::Draw];

    /// ログ用の名前
    pub fn name(&self) -> &'static str {
        match self {
            Phase::EarlyUpdate => "early_update",
            Phase::Calculus => "calculus",
            Phase::Update => "update",
            Phase::Draw => "draw",
        }
    }
}

/// 実行順の指定方法
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// 数値優先度（小さいほど先に実行）
    Priority(f64),
    /// 他Systemに対する相対配置
    Relative {
        before: Vec<SystemId>,
        after: Vec<SystemId>,
    },
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Priority(0.0)
    }
}

/// System定義
///
/// ```ignore
/// let system = System::new()
///     .named("integrate")
///     .with_query([position.id(), velocity.id()])
///     .after([input])
///     .on_calculus(|world, entities, dt| { /* ... */ });
/// ```
#[derive(Default)]
pub struct System {
    name: Option<String>,
    query: Vec<ComponentId>,
    placement: Placement,
    pub(crate) early_update: Option<PhaseFn>,
    pub(crate) calculus: Option<CalculusFn>,
    pub(crate) update: Option<PhaseFn>,
    pub(crate) draw: Option<PhaseFn>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    /// ログ用の名前を付ける
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 対象クエリを設定
    pub fn with_query(mut self, components: impl IntoIterator<Item = ComponentId>) -> Self {
        self.query = components.into_iter().collect();
        self
    }

    /// 数値優先度を設定（相対配置を上書き）
    pub fn priority(mut self, priority: f64) -> Self {
        self.placement = Placement::Priority(priority);
        self
    }

    /// 指定Systemより前に配置
    pub fn before(mut self, systems: impl IntoIterator<Item = SystemId>) -> Self {
        match &mut self.placement {
            Placement::Relative { before, .. } => before.extend(systems),
            Placement::Priority(_) => {
                self.placement = Placement::Relative {
                    before: systems.into_iter().collect(),
                    after: Vec::new(),
                }
            }
        }
        self
    }

    /// 指定Systemより後に配置
    pub fn after(mut self, systems: impl IntoIterator<Item = SystemId>) -> Self {
        match &mut self.placement {
            Placement::Relative { after, .. } => after.extend(systems),
            Placement::Priority(_) => {
                self.placement = Placement::Relative {
                    before: Vec::new(),
                    after: systems.into_iter().collect(),
                }
            }
        }
        self
    }

    pub fn on_early_update(
        mut self,
        f: impl FnMut(&mut World, &[EntityId], FrameTime) + 'static,
    ) -> Self {
        self.early_update = Some(Box::new(f));
        self
    }

    pub fn on_calculus(mut self, f: impl FnMut(&mut World, &[EntityId], f64) + 'static) -> Self {
        self.calculus = Some(Box::new(f));
        self
    }

    pub fn on_update(mut self, f: impl FnMut(&mut World, &[EntityId], FrameTime) + 'static) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    pub fn on_draw(mut self, f: impl FnMut(&mut World, &[EntityId], FrameTime) + 'static) -> Self {
        self.draw = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn query(&self) -> &[ComponentId] {
        &self.query
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// フェーズのコールバックを持つか
    pub fn has_phase(&self, phase: Phase) -> bool {
        match phase {
            Phase::EarlyUpdate => self.early_update.is_some(),
            Phase::Calculus => self.calculus.is_some(),
            Phase::Update => self.update.is_some(),
            Phase::Draw => self.draw.is_some(),
        }
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phases: Vec<&str> = Phase::ALL
            .iter()
            .filter(|phase| self.has_phase(**phase))
            .map(Phase::name)
            .collect();
        f.debug_struct("System")
            .field("name", &self.name)
            .field("query", &self.query)
            .field("placement", &self.placement)
            .field("phases", &phases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_placement_is_zero_priority() {
        let system = System::new();
        assert_eq!(system.placement(), &Placement::Priority(0.0));
        assert!(Phase::ALL.iter().all(|phase| !system.has_phase(*phase)));
    }

    #[test]
    fn test_before_and_after_accumulate() {
        let system = System::new()
            .after([SystemId(1)])
            .before([SystemId(2)])
            .after([SystemId(3)]);
        assert_eq!(
            system.placement(),
            &Placement::Relative {
                before: vec![SystemId(2)],
                after: vec![SystemId(1), SystemId(3)],
            }
        );
    }

    #[test]
    fn test_priority_overrides_relative() {
        let system = System::new().after([SystemId(1)]).priority(7.0);
        assert_eq!(system.placement(), &Placement::Priority(7.0));
    }

    #[test]
    fn test_phase_presence() {
        let system = System::new()
            .named("physics")
            .on_calculus(|_, _, _| {})
            .on_draw(|_, _, _| {});
        assert!(system.has_phase(Phase::Calculus));
        assert!(system.has_phase(Phase::Draw));
        assert!(!system.has_phase(Phase::Update));
        assert_eq!(system.name(), Some("physics"));
        assert!(format!("{system:?}").contains("calculus"));
    }
}
