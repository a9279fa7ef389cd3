//! キー -> Entity集合 のインデックス
//!
//! コンポーネント型別・名前別の逆引きに使う。

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use super::entity::EntityId;

/// 空集合。存在しないキーの読み出しで返す
pub(crate) static EMPTY_SET: BTreeSet<EntityId> = BTreeSet::new();

/// キーごとにEntity集合を持つインデックス
/// - 挿入は冪等
/// - 最後の要素を削除するとキーごと消える
#[derive(Debug)]
pub struct SetIndex<K> {
    sets: HashMap<K, BTreeSet<EntityId>>,
}

impl<K: Hash + Eq> SetIndex<K> {
    /// 空のインデックスを作成
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
        }
    }

    /// Entityをキーの集合に追加。新規追加ならtrue
    pub fn insert(&mut self, key: K, entity: EntityId) -> bool {
        self.sets.entry(key).or_default().insert(entity)
    }

    /// Entityをキーの集合から削除。削除できたらtrue
    pub fn remove<Q>(&mut self, key: &Q, entity: EntityId) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(set) = self.sets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(&entity);
        if set.is_empty() {
            self.sets.remove(key);
        }
        removed
    }

    /// キーの集合を取得。存在しない場合は空集合
    pub fn get<Q>(&self, key: &Q) -> &BTreeSet<EntityId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.sets.get(key).unwrap_or(&EMPTY_SET)
    }

    /// キーの集合にEntityが含まれるか
    pub fn contains<Q>(&self, key: &Q, entity: EntityId) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.sets.get(key).is_some_and(|set| set.contains(&entity))
    }

    /// 保持しているキー数
    pub fn key_count(&self) -> usize {
        self.sets.len()
    }
}

impl<K: Hash + Eq> Default for SetIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}
