use std::fmt;
use std::num::NonZeroU32;

/// Entity識別子（世代番号付き）
/// - index: Entity配列のインデックス
/// - generation: 再利用時の世代番号（削除済みEntityとの区別用）
///
/// 順序は (index, generation) の辞書順。インデックス集合の反復順を決定的にする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    generation: NonZeroU32,
}

impl EntityId {
    /// 新しいEntityIdを作成
    pub(crate) fn new(index: u32, generation: NonZeroU32) -> Self {
        Self { index, generation }
    }

    /// インデックスを取得
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// 世代番号を取得
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation.get()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}
