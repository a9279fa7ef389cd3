//! Query system for ECS
//!
//! 複数コンポーネント型の組み合わせに一致するEntity集合をキャッシュする。
//!
//! - 単一型のクエリはキャッシュせず、型別インデックスをそのまま読む
//! - 2型以上のクエリはキー（型名をソートして `,` で連結）単位で参照カウント付きで共有
//! - コンポーネントの追加・削除のたびに、その型に依存するキャッシュだけを再評価する

use std::collections::{BTreeSet, HashMap};

use super::component::ComponentId;
use super::entity::EntityId;
use super::index::EMPTY_SET;
use super::registry::{ComponentRegistry, KEY_SEPARATOR};
use crate::error::{EcsError, EcsResult};

// ============================================================================
// Query - クエリハンドル
// ============================================================================

/// クエリハンドル
///
/// `World::create_query` で作成し、`World::destroy_query` で破棄する。
/// ハンドル1つがキャッシュの参照カウント1つに対応するため `Clone` は実装しない。
#[derive(Debug)]
pub struct Query {
    components: Vec<ComponentId>,
    key: String,
}

impl Query {
    /// コンポーネント型集合からクエリを構築（キャッシュへの登録はしない）
    pub(crate) fn build(
        registry: &ComponentRegistry,
        components: impl IntoIterator<Item = ComponentId>,
    ) -> EcsResult<Self> {
        let mut components: Vec<ComponentId> = components.into_iter().collect();
        for &id in &components {
            registry.check(id)?;
        }
        components.sort();
        components.dedup();

        if components.is_empty() {
            return Err(EcsError::TypeMismatch {
                expected: "at least one component type",
            });
        }

        let mut names: Vec<&str> = components
            .iter()
            .filter_map(|&id| registry.name(id))
            .collect();
        names.sort_unstable();
        let key = names.join(&KEY_SEPARATOR.to_string());

        Ok(Self { components, key })
    }

    /// 正規化キー（型名を辞書順に `,` で連結）
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 対象コンポーネント型（重複なし）
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// キャッシュ対象（2型以上）かどうか
    pub fn is_cached(&self) -> bool {
        self.components.len() > 1
    }
}

// ============================================================================
// QueryCache - 参照カウント付きキャッシュ
// ============================================================================

#[derive(Debug)]
struct CacheEntry {
    components: Vec<ComponentId>,
    refs: usize,
    entities: BTreeSet<EntityId>,
}

impl CacheEntry {
    fn matches(&self, has: &impl Fn(ComponentId) -> bool) -> bool {
        self.components.iter().all(|&id| has(id))
    }
}

/// 複数型クエリのEntity集合キャッシュ
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<String, CacheEntry>,
    /// コンポーネント型 -> それを含むキャッシュキー
    dependents: HashMap<ComponentId, Vec<String>>,
}

impl QueryCache {
    /// 空のキャッシュを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// キャッシュエントリを取得または作成し、参照カウントを1増やす。
    /// 新規作成時は `seed` で初期集合を計算する。新規作成ならtrue
    pub(crate) fn acquire(
        &mut self,
        query: &Query,
        seed: impl FnOnce() -> BTreeSet<EntityId>,
    ) -> bool {
        if let Some(entry) = self.entries.get_mut(query.key()) {
            entry.refs += 1;
            return false;
        }

        for &id in query.components() {
            self.dependents
                .entry(id)
                .or_default()
                .push(query.key().to_string());
        }
        self.entries.insert(
            query.key().to_string(),
            CacheEntry {
                components: query.components().to_vec(),
                refs: 1,
                entities: seed(),
            },
        );
        true
    }

    /// 参照カウントを1減らし、0になったらエントリを破棄する。破棄したらtrue
    pub(crate) fn release(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return false;
        }

        if let Some(entry) = self.entries.remove(key) {
            for id in entry.components {
                if let Some(keys) = self.dependents.get_mut(&id) {
                    keys.retain(|k| k != key);
                    if keys.is_empty() {
                        self.dependents.remove(&id);
                    }
                }
            }
        }
        true
    }

    /// `changed` 型が追加/削除されたEntityの所属を、依存するキャッシュについて再評価する
    pub(crate) fn refresh(
        &mut self,
        entity: EntityId,
        changed: ComponentId,
        has: impl Fn(ComponentId) -> bool,
    ) {
        let Some(keys) = self.dependents.get(&changed) else {
            return;
        };
        for key in keys {
            let Some(entry) = self.entries.get_mut(key) else {
                continue;
            };
            if entry.matches(&has) {
                entry.entities.insert(entity);
            } else {
                entry.entities.remove(&entity);
            }
        }
    }

    /// Entityを全キャッシュから取り除く
    pub(crate) fn purge(&mut self, entity: EntityId) {
        for entry in self.entries.values_mut() {
            entry.entities.remove(&entity);
        }
    }

    /// キーに対応するEntity集合。未キャッシュなら空集合
    pub fn entities(&self, key: &str) -> &BTreeSet<EntityId> {
        self.entries
            .get(key)
            .map(|entry| &entry.entities)
            .unwrap_or(&EMPTY_SET)
    }

    /// キーの参照カウント（未キャッシュなら0）
    pub fn ref_count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, |entry| entry.refs)
    }

    /// キャッシュ中のキー数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// キャッシュが空かどうか
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn id(index: u32) -> EntityId {
        EntityId::new(index, NonZeroU32::MIN)
    }

    fn registry() -> (ComponentRegistry, ComponentId, ComponentId, ComponentId) {
        let mut registry = ComponentRegistry::new();
        let vel = registry.register("velocity", "Velocity").unwrap();
        let pos = registry.register("position", "Position").unwrap();
        let mass = registry.register("mass", "Mass").unwrap();
        (registry, pos, vel, mass)
    }

    #[test]
    fn test_key_is_sorted_names() {
        let (registry, pos, vel, mass) = registry();
        let query = Query::build(&registry, [vel, pos, mass]).unwrap();
        assert_eq!(query.key(), "mass,position,velocity");
        assert!(query.is_cached());

        let same = Query::build(&registry, [mass, pos, vel, pos]).unwrap();
        assert_eq!(same.key(), query.key());
        assert_eq!(same.components().len(), 3);
    }

    #[test]
    fn test_single_type_not_cached() {
        let (registry, pos, ..) = registry();
        let query = Query::build(&registry, [pos]).unwrap();
        assert_eq!(query.key(), "position");
        assert!(!query.is_cached());
    }

    #[test]
    fn test_empty_query_rejected() {
        let (registry, ..) = registry();
        let err = Query::build(&registry, Vec::new()).unwrap_err();
        assert!(matches!(err, EcsError::TypeMismatch { .. }));
    }

    #[test]
    fn test_foreign_component_rejected() {
        let (registry, ..) = registry();
        let (_, other_pos, ..) = self::registry();
        assert!(matches!(
            Query::build(&registry, [other_pos]),
            Err(EcsError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_acquire_and_release_refcount() {
        let (registry, pos, vel, _) = registry();
        let query = Query::build(&registry, [pos, vel]).unwrap();
        let mut cache = QueryCache::new();

        assert!(cache.acquire(&query, || BTreeSet::from([id(1)])));
        // 2回目は seed を呼ばずに共有
        assert!(!cache.acquire(&query, || unreachable!()));
        assert_eq!(cache.ref_count(query.key()), 2);
        assert!(cache.entities(query.key()).contains(&id(1)));

        assert!(!cache.release(query.key()));
        assert_eq!(cache.ref_count(query.key()), 1);
        assert!(cache.release(query.key()));
        assert!(cache.is_empty());
        assert!(cache.entities(query.key()).is_empty());
        assert!(!cache.release(query.key()));
    }

    #[test]
    fn test_refresh_only_touches_dependents() {
        let (registry, pos, vel, mass) = registry();
        let moving = Query::build(&registry, [pos, vel]).unwrap();
        let heavy = Query::build(&registry, [pos, mass]).unwrap();
        let mut cache = QueryCache::new();
        cache.acquire(&moving, BTreeSet::new);
        cache.acquire(&heavy, BTreeSet::new);

        let components = [pos, vel];
        let has = |c: ComponentId| components.contains(&c);

        cache.refresh(id(0), vel, has);
        assert!(cache.entities(moving.key()).contains(&id(0)));
        assert!(!cache.entities(heavy.key()).contains(&id(0)));

        cache.refresh(id(0), vel, |c| c == pos);
        assert!(cache.entities(moving.key()).is_empty());
    }

    #[test]
    fn test_purge_removes_everywhere() {
        let (registry, pos, vel, mass) = registry();
        let a = Query::build(&registry, [pos, vel]).unwrap();
        let b = Query::build(&registry, [pos, mass]).unwrap();
        let mut cache = QueryCache::new();
        cache.acquire(&a, || BTreeSet::from([id(0), id(1)]));
        cache.acquire(&b, || BTreeSet::from([id(0)]));

        cache.purge(id(0));
        assert_eq!(cache.entities(a.key()).len(), 1);
        assert!(cache.entities(b.key()).is_empty());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_release_cleans_dependents() {
        let (registry, pos, vel, _) = registry();
        let query = Query::build(&registry, [pos, vel]).unwrap();
        let mut cache = QueryCache::new();
        cache.acquire(&query, BTreeSet::new);
        cache.release(query.key());

        assert!(cache.dependents.is_empty());
        // 依存がなければrefreshは何もしない
        cache.refresh(id(0), pos, |_| true);
        assert!(cache.is_empty());
    }
}
