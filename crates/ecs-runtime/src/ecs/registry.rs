//! コンポーネント型レジストリ
//!
//! 名前の一意性はレジストリ単位で保証する（プロセス全体の名前空間は持たない）。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use super::component::ComponentId;
use crate::error::{EcsError, EcsResult};

/// クエリキーの区切り文字。コンポーネント型名には使えない
pub const KEY_SEPARATOR: char = ',';

/// レジストリごとのタグ発行用カウンタ
static NEXT_REGISTRY_TAG: AtomicU32 = AtomicU32::new(1);

/// 登録済みコンポーネント型の情報
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    name: String,
    type_name: &'static str,
}

impl ComponentInfo {
    /// 登録名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust側の型名（デバッグ用）
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// コンポーネント型の登録簿
#[derive(Debug)]
pub struct ComponentRegistry {
    tag: u32,
    infos: Vec<ComponentInfo>,
    by_name: HashMap<String, ComponentId>,
}

impl ComponentRegistry {
    /// 新しいレジストリを作成
    pub fn new() -> Self {
        Self {
            tag: NEXT_REGISTRY_TAG.fetch_add(1, Ordering::Relaxed),
            infos: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// 名前が登録可能か検証する（登録はしない）
    pub fn check_available(&self, name: &str) -> EcsResult<()> {
        if name.is_empty() {
            return Err(EcsError::InvalidName {
                name: name.to_string(),
                reason: "name must not be empty",
            });
        }
        if name.contains(KEY_SEPARATOR) {
            return Err(EcsError::InvalidName {
                name: name.to_string(),
                reason: "name must not contain ','",
            });
        }
        if self.by_name.contains_key(name) {
            return Err(EcsError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// 名前を登録して識別子を発行
    pub(crate) fn register(&mut self, name: &str, type_name: &'static str) -> EcsResult<ComponentId> {
        self.check_available(name)?;

        let id = ComponentId::new(self.tag, self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            name: name.to_string(),
            type_name,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// このレジストリが発行した識別子か検証
    pub fn check(&self, id: ComponentId) -> EcsResult<()> {
        if self.owns(id) {
            Ok(())
        } else {
            Err(EcsError::TypeMismatch {
                expected: "component type defined in this world",
            })
        }
    }

    /// このレジストリが発行した識別子か
    pub fn owns(&self, id: ComponentId) -> bool {
        id.registry() == self.tag && id.index() < self.infos.len()
    }

    /// 識別子から情報を取得
    pub fn info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        if !self.owns(id) {
            return None;
        }
        self.infos.get(id.index())
    }

    /// 識別子から登録名を取得
    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.info(id).map(ComponentInfo::name)
    }

    /// 登録名から識別子を検索
    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// 登録済みの型数
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// 登録が空かどうか
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// 登録順にイテレート
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &ComponentInfo)> {
        self.infos
            .iter()
            .enumerate()
            .map(|(index, info)| (ComponentId::new(self.tag, index as u32), info))
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ComponentRegistry::new();
        let pos = registry.register("position", "Position").unwrap();
        let vel = registry.register("velocity", "Velocity").unwrap();

        assert_ne!(pos, vel);
        assert_eq!(registry.lookup("position"), Some(pos));
        assert_eq!(registry.name(vel), Some("velocity"));
        assert_eq!(registry.info(pos).map(ComponentInfo::type_name), Some("Position"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_name() {
        let mut registry = ComponentRegistry::new();
        registry.register("position", "Position").unwrap();

        let err = registry.register("position", "Other").unwrap_err();
        assert_eq!(err, EcsError::DuplicateName("position".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_names() {
        let mut registry = ComponentRegistry::new();

        assert!(matches!(
            registry.register("a,b", "T"),
            Err(EcsError::InvalidName { .. })
        ));
        assert!(matches!(
            registry.register("", "T"),
            Err(EcsError::InvalidName { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_foreign_id_rejected() {
        let mut a = ComponentRegistry::new();
        let mut b = ComponentRegistry::new();
        let id_a = a.register("position", "Position").unwrap();
        b.register("position", "Position").unwrap();

        assert!(a.owns(id_a));
        assert!(!b.owns(id_a));
        assert!(matches!(b.check(id_a), Err(EcsError::TypeMismatch { .. })));
        assert_eq!(b.name(id_a), None);
    }

    #[test]
    fn test_iter_in_registration_order() {
        let mut registry = ComponentRegistry::new();
        registry.register("b", "B").unwrap();
        registry.register("a", "A").unwrap();

        let names: Vec<_> = registry.iter().map(|(_, info)| info.name().to_string()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
