use super::entity::EntityId;

/// SparseSetベースのコンポーネントストレージ
/// - dense: 実際のデータ配列（連続メモリでキャッシュ効率が良い）
/// - sparse: EntityId.index -> denseのインデックスへのマッピング
/// - entities: denseと対応するEntityIdの配列（イテレーション・世代チェック用）
pub struct ComponentStorage<T> {
    dense: Vec<T>,
    entities: Vec<EntityId>,
    sparse: Vec<Option<usize>>,
}

impl<T> ComponentStorage<T> {
    /// 新しいストレージを作成
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            entities: Vec::new(),
            sparse: Vec::new(),
        }
    }

    /// 値を挿入。既存の場合は上書きし、古い値を返す
    pub fn insert(&mut self, entity: EntityId, component: T) -> Option<T> {
        let index = entity.index() as usize;

        // sparse配列を必要に応じて拡張
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, None);
        }

        if let Some(dense_index) = self.sparse[index] {
            if self.entities[dense_index] == entity {
                return Some(std::mem::replace(&mut self.dense[dense_index], component));
            }
            // 同じindexの古い世代が残っている場合は置き換える
            self.entities[dense_index] = entity;
            self.dense[dense_index] = component;
            return None;
        }

        let dense_index = self.dense.len();
        self.dense.push(component);
        self.entities.push(entity);
        self.sparse[index] = Some(dense_index);
        None
    }

    /// denseインデックスを取得（世代が一致する場合のみ）
    fn dense_index(&self, entity: EntityId) -> Option<usize> {
        let dense_index = (*self.sparse.get(entity.index() as usize)?)?;
        (self.entities[dense_index] == entity).then_some(dense_index)
    }

    /// 値を取得（不変参照）
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.dense_index(entity).map(|dense_index| &self.dense[dense_index])
    }

    /// 値を取得（可変参照）
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.dense_index(entity)
            .map(move |dense_index| &mut self.dense[dense_index])
    }

    /// 値を削除
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let dense_index = self.dense_index(entity)?;
        self.sparse[entity.index() as usize] = None;

        // 最後の要素と交換して削除（O(1)削除）
        let last_index = self.dense.len() - 1;
        if dense_index != last_index {
            let last_entity = self.entities[last_index];
            self.sparse[last_entity.index() as usize] = Some(dense_index);
        }

        self.entities.swap_remove(dense_index);
        Some(self.dense.swap_remove(dense_index))
    }

    /// 全要素をイテレート
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    /// 全要素を可変イテレート
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.entities.iter().copied().zip(self.dense.iter_mut())
    }

    /// ストレージ内の要素数
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// ストレージが空かどうか
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// 指定Entityが値を持つか
    pub fn contains(&self, entity: EntityId) -> bool {
        self.dense_index(entity).is_some()
    }
}

impl<T> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}
