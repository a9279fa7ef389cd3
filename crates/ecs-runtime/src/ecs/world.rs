use std::any::Any;
use std::collections::BTreeSet;
use std::num::NonZeroU32;

use tracing::{debug, trace};

use super::component::{Component, ComponentDefault, ComponentId, ComponentType};
use super::entity::EntityId;
use super::index::{SetIndex, EMPTY_SET};
use super::query::{Query, QueryCache};
use super::registry::ComponentRegistry;
use super::storage::ComponentStorage;
use crate::error::{EcsError, EcsResult};

/// Entity生存情報
struct EntityMeta {
    /// 現在の世代番号
    generation: NonZeroU32,
    /// 生存フラグ
    alive: bool,
    /// 表示名（任意）
    name: Option<String>,
    /// 保持しているコンポーネント型（クエリ判定用）
    components: BTreeSet<ComponentId>,
}

/// 型消去された列のトレイト
trait AnyColumn {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn remove(&mut self, entity: EntityId) -> bool;
}

/// コンポーネント型1つ分の列
/// - default: 値省略時のデフォルトポリシー
/// - values: `None` は未構築スロット（デフォルトなしで追加された）
struct Column<T> {
    default: ComponentDefault<T>,
    values: ComponentStorage<Option<T>>,
}

impl<T: Component> AnyColumn for Column<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn remove(&mut self, entity: EntityId) -> bool {
        self.values.remove(entity).is_some()
    }
}

const FOREIGN_COMPONENT: EcsError = EcsError::TypeMismatch {
    expected: "component type defined in this world",
};

/// ECSのメインコンテナ
/// 全てのEntity/Component/インデックス/クエリキャッシュを管理する
pub struct World {
    /// コンポーネント型レジストリ
    registry: ComponentRegistry,
    /// ComponentId.index -> 列
    columns: Vec<Box<dyn AnyColumn>>,
    /// Entity生存情報
    entities: Vec<EntityMeta>,
    /// 再利用可能なインデックス
    free_list: Vec<u32>,
    /// 生存Entity集合
    alive: BTreeSet<EntityId>,
    /// コンポーネント型 -> Entity集合
    by_type: SetIndex<ComponentId>,
    /// 名前 -> Entity集合
    by_name: SetIndex<String>,
    /// 複数型クエリのキャッシュ
    queries: QueryCache,
}

impl World {
    /// 新しいWorldを作成
    pub fn new() -> Self {
        Self {
            registry: ComponentRegistry::new(),
            columns: Vec::new(),
            entities: Vec::new(),
            free_list: Vec::new(),
            alive: BTreeSet::new(),
            by_type: SetIndex::new(),
            by_name: SetIndex::new(),
            queries: QueryCache::new(),
        }
    }

    // ========================================================================
    // Component Types
    // ========================================================================

    /// コンポーネント型を定義
    ///
    /// 名前の重複・不正な名前・可変状態を共有する静的デフォルトはエラー
    pub fn define<T: Component + Clone>(
        &mut self,
        name: &str,
        default: ComponentDefault<T>,
    ) -> EcsResult<ComponentType<T>> {
        self.registry.check_available(name)?;
        if let ComponentDefault::Static(value) = &default {
            if value.aliases_state() {
                return Err(EcsError::InvalidDefault(name.to_string()));
            }
        }

        let id = self.registry.register(name, std::any::type_name::<T>())?;
        self.columns.push(Box::new(Column {
            default,
            values: ComponentStorage::<Option<T>>::new(),
        }));
        debug!(component = name, index = id.index(), "component type defined");

        Ok(ComponentType::new(id))
    }

    /// コンポーネント型レジストリ
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// コンポーネント型名を取得
    pub fn component_name(&self, id: impl Into<ComponentId>) -> Option<&str> {
        self.registry.name(id.into())
    }

    // ========================================================================
    // Entities
    // ========================================================================

    /// 新規Entityを生成
    pub fn spawn(&mut self) -> EntityId {
        let entity = if let Some(index) = self.free_list.pop() {
            // 再利用: 世代番号をインクリメント
            let meta = &mut self.entities[index as usize];
            meta.generation = meta.generation.saturating_add(1);
            meta.alive = true;
            EntityId::new(index, meta.generation)
        } else {
            // 新規割り当て
            let index = self.entities.len() as u32;
            self.entities.push(EntityMeta {
                generation: NonZeroU32::MIN,
                alive: true,
                name: None,
                components: BTreeSet::new(),
            });
            EntityId::new(index, NonZeroU32::MIN)
        };

        self.alive.insert(entity);
        entity
    }

    /// 名前付きEntityを生成
    pub fn spawn_named(&mut self, name: &str) -> EcsResult<EntityId> {
        check_entity_name(name)?;
        let entity = self.spawn();
        self.entities[entity.index() as usize].name = Some(name.to_string());
        self.by_name.insert(name.to_string(), entity);
        Ok(entity)
    }

    /// Entityの名前を変更（`None` で名前を外す）
    /// 生存していないEntityの場合false
    pub fn rename(&mut self, entity: EntityId, name: Option<&str>) -> EcsResult<bool> {
        if let Some(name) = name {
            check_entity_name(name)?;
        }
        let Some(meta) = self.meta_mut(entity) else {
            return Ok(false);
        };

        let old = std::mem::replace(&mut meta.name, name.map(str::to_string));
        if let Some(old) = old {
            self.by_name.remove(old.as_str(), entity);
        }
        if let Some(name) = name {
            self.by_name.insert(name.to_string(), entity);
        }
        Ok(true)
    }

    /// Entityの名前を取得
    pub fn name(&self, entity: EntityId) -> Option<&str> {
        self.meta(entity)?.name.as_deref()
    }

    /// 指定した名前を持つEntity集合
    pub fn named(&self, name: &str) -> &BTreeSet<EntityId> {
        self.by_name.get(name)
    }

    /// Entityを破棄する
    ///
    /// 全ストレージ・型別インデックス・名前インデックス・クエリキャッシュから取り除く。
    /// 既に破棄済みまたは無効なEntityの場合false
    pub fn die(&mut self, entity: EntityId) -> bool {
        let Some(meta) = self.meta_mut(entity) else {
            return false;
        };

        meta.alive = false;
        let name = meta.name.take();
        let components = std::mem::take(&mut meta.components);
        // 世代を使い切ったスロットは再利用しない
        if meta.generation != NonZeroU32::MAX {
            self.free_list.push(entity.index());
        }

        self.alive.remove(&entity);
        if let Some(name) = name {
            self.by_name.remove(name.as_str(), entity);
        }
        for id in components {
            self.columns[id.index()].remove(entity);
            self.by_type.remove(&id, entity);
        }
        self.queries.purge(entity);
        trace!(%entity, "entity destroyed");

        true
    }

    /// Entityが生存しているか確認
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.meta(entity).is_some()
    }

    /// 生存Entity集合
    pub fn entities(&self) -> &BTreeSet<EntityId> {
        &self.alive
    }

    /// 生存Entity数を取得
    pub fn entity_count(&self) -> usize {
        self.alive.len()
    }

    /// Entityが保持しているコンポーネント型
    pub fn component_ids(&self, entity: EntityId) -> Option<&BTreeSet<ComponentId>> {
        self.meta(entity).map(|meta| &meta.components)
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// コンポーネントを追加
    ///
    /// 既に保持している場合はfalse。`value` 省略時は型のデフォルトを使う
    /// （デフォルトなしの型は未構築スロットになる）
    pub fn add_component<T: Component + Clone>(
        &mut self,
        entity: EntityId,
        ty: &ComponentType<T>,
        value: Option<T>,
    ) -> EcsResult<bool> {
        let id = ty.id();
        self.registry.check(id)?;
        if !self.is_alive(entity) || self.has_component(entity, id) {
            return Ok(false);
        }

        let column = self.column_mut::<T>(id)?;
        let value = value.or_else(|| column.default.instantiate());
        column.values.insert(entity, value);

        let index = entity.index() as usize;
        self.entities[index].components.insert(id);
        self.by_type.insert(id, entity);
        let components = &self.entities[index].components;
        self.queries
            .refresh(entity, id, |c| components.contains(&c));

        Ok(true)
    }

    /// コンポーネントを削除
    /// 保持していない場合はfalse
    pub fn delete_component(
        &mut self,
        entity: EntityId,
        id: impl Into<ComponentId>,
    ) -> EcsResult<bool> {
        let id = id.into();
        self.registry.check(id)?;
        if !self.has_component(entity, id) {
            return Ok(false);
        }

        self.columns[id.index()].remove(entity);

        let index = entity.index() as usize;
        self.entities[index].components.remove(&id);
        self.by_type.remove(&id, entity);
        let components = &self.entities[index].components;
        self.queries
            .refresh(entity, id, |c| components.contains(&c));

        Ok(true)
    }

    /// コンポーネントを保持しているか
    pub fn has_component(&self, entity: EntityId, id: impl Into<ComponentId>) -> bool {
        let id = id.into();
        self.meta(entity)
            .is_some_and(|meta| meta.components.contains(&id))
    }

    /// コンポーネントを取得（不変参照）
    /// 未構築スロットの場合もNone
    pub fn get_component<T: Component>(&self, entity: EntityId, ty: &ComponentType<T>) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.column::<T>(ty.id())?.values.get(entity)?.as_ref()
    }

    /// コンポーネントを取得（可変参照）
    pub fn get_component_mut<T: Component>(
        &mut self,
        entity: EntityId,
        ty: &ComponentType<T>,
    ) -> Option<&mut T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.column_mut::<T>(ty.id())
            .ok()?
            .values
            .get_mut(entity)?
            .as_mut()
    }

    /// コンポーネントの値を置き換える
    ///
    /// 保持していない場合、または未構築スロットの場合はfalse
    pub fn set_component<T: Component>(
        &mut self,
        entity: EntityId,
        ty: &ComponentType<T>,
        value: T,
    ) -> EcsResult<bool> {
        let id = ty.id();
        self.registry.check(id)?;
        if !self.is_alive(entity) {
            return Ok(false);
        }

        match self.column_mut::<T>(id)?.values.get_mut(entity) {
            Some(slot) if slot.is_some() => {
                *slot = Some(value);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// 指定したコンポーネントを持つEntityと値をイテレート（未構築スロットは除く）
    pub fn iter_component<T: Component>(
        &self,
        ty: &ComponentType<T>,
    ) -> impl Iterator<Item = (EntityId, &T)> {
        self.column::<T>(ty.id())
            .into_iter()
            .flat_map(|column| column.values.iter())
            .filter_map(|(entity, value)| value.as_ref().map(|value| (entity, value)))
    }

    /// 指定したコンポーネント型を持つEntity集合（型別インデックス）
    pub fn with_component(&self, id: impl Into<ComponentId>) -> &BTreeSet<EntityId> {
        self.by_type.get(&id.into())
    }

    // ========================================================================
    // Query System
    // ========================================================================

    /// クエリを作成
    ///
    /// 2型以上のクエリは同じキーのキャッシュを共有し、参照カウントを増やす
    pub fn create_query(
        &mut self,
        components: impl IntoIterator<Item = ComponentId>,
    ) -> EcsResult<Query> {
        let query = Query::build(&self.registry, components)?;
        if !query.is_cached() {
            return Ok(query);
        }

        let entities = &self.entities;
        let alive = &self.alive;
        let created = self.queries.acquire(&query, || {
            alive
                .iter()
                .copied()
                .filter(|entity| {
                    let meta = &entities[entity.index() as usize];
                    query.components().iter().all(|c| meta.components.contains(c))
                })
                .collect()
        });

        if created {
            debug!(key = query.key(), "query cache entry created");
        } else {
            trace!(key = query.key(), refs = self.queries.ref_count(query.key()), "query cache entry shared");
        }
        Ok(query)
    }

    /// クエリに一致する現在のEntity集合
    /// 別Worldで作成したクエリの場合は空集合
    pub fn query_entities(&self, query: &Query) -> &BTreeSet<EntityId> {
        if !self.owns_query(query) {
            return &EMPTY_SET;
        }
        match query.components() {
            [single] => self.by_type.get(single),
            _ => self.queries.entities(query.key()),
        }
    }

    /// クエリを破棄。キャッシュエントリが解放されたらtrue
    /// 別Worldで作成したクエリはエラー（このWorldの参照カウントは変えない）
    pub fn destroy_query(&mut self, query: Query) -> EcsResult<bool> {
        if !self.owns_query(&query) {
            return Err(FOREIGN_COMPONENT);
        }
        if !query.is_cached() {
            return Ok(false);
        }
        let evicted = self.queries.release(query.key());
        if evicted {
            debug!(key = query.key(), "query cache entry evicted");
        }
        Ok(evicted)
    }

    /// クエリキャッシュ（観測用）
    pub fn query_cache(&self) -> &QueryCache {
        &self.queries
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// このWorldのレジストリで作成したクエリか
    fn owns_query(&self, query: &Query) -> bool {
        query.components().iter().all(|&id| self.registry.owns(id))
    }

    fn meta(&self, entity: EntityId) -> Option<&EntityMeta> {
        self.entities
            .get(entity.index() as usize)
            .filter(|meta| meta.alive && meta.generation.get() == entity.generation())
    }

    fn meta_mut(&mut self, entity: EntityId) -> Option<&mut EntityMeta> {
        self.entities
            .get_mut(entity.index() as usize)
            .filter(|meta| meta.alive && meta.generation.get() == entity.generation())
    }

    /// 型に対応する列を取得（不変）
    fn column<T: Component>(&self, id: ComponentId) -> Option<&Column<T>> {
        if !self.registry.owns(id) {
            return None;
        }
        self.columns
            .get(id.index())?
            .as_any()
            .downcast_ref::<Column<T>>()
    }

    /// 型に対応する列を取得（可変）
    fn column_mut<T: Component>(&mut self, id: ComponentId) -> EcsResult<&mut Column<T>> {
        self.registry.check(id)?;
        self.columns
            .get_mut(id.index())
            .and_then(|column| column.as_any_mut().downcast_mut::<Column<T>>())
            .ok_or(FOREIGN_COMPONENT)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

fn check_entity_name(name: &str) -> EcsResult<()> {
    if name.is_empty() {
        return Err(EcsError::TypeMismatch {
            expected: "non-empty entity name",
        });
    }
    Ok(())
}
