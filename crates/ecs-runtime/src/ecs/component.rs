use std::fmt;
use std::marker::PhantomData;

/// 全コンポーネントが実装すべきトレイト
/// - `'static`: コンポーネントは参照を持たない
///
/// ランタイムはシングルスレッド前提のため `Send + Sync` は要求しない。
pub trait Component: 'static {
    /// この値を静的デフォルトとして複数Entityに配ると、
    /// 可変状態を共有しているとみなされるか。
    ///
    /// `true` を返す値は `ComponentDefault::Static` に使えず、
    /// ファクトリ経由で毎回生成する必要がある。
    fn aliases_state(&self) -> bool {
        false
    }
}

macro_rules! impl_scalar_component {
    ($($ty:ty),* $(,)?) => {
        $(impl Component for $ty {})*
    };
}

impl_scalar_component!(bool, i32, i64, u32, u64, f32, f64, String);

/// `null` デフォルトは `Static(None)` で表す
impl<T: Component> Component for Option<T> {
    fn aliases_state(&self) -> bool {
        self.as_ref().is_some_and(Component::aliases_state)
    }
}

/// スクリプト側から渡されるスキーマレスな値。
/// オブジェクトと配列は静的デフォルトにできない。
impl Component for serde_json::Value {
    fn aliases_state(&self) -> bool {
        matches!(
            self,
            serde_json::Value::Object(_) | serde_json::Value::Array(_)
        )
    }
}

/// 型消去されたコンポーネント型識別子
/// - registry: 発行元レジストリのタグ（別Worldのハンドル検出用）
/// - index: レジストリ内の登録順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId {
    registry: u32,
    index: u32,
}

impl ComponentId {
    pub(crate) fn new(registry: u32, index: u32) -> Self {
        Self { registry, index }
    }

    #[inline]
    pub(crate) fn registry(&self) -> u32 {
        self.registry
    }

    /// レジストリ内のインデックス
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// 型付きコンポーネント型ハンドル
///
/// `World::define` が返す。値の取得・設定はこのハンドル経由で行うため、
/// 実行時の型チェックなしに `T` として取り出せる。
pub struct ComponentType<T> {
    id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ComponentType<T> {
    pub(crate) fn new(id: ComponentId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// 型消去された識別子を取得
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }
}

impl<T> Clone for ComponentType<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentType<T> {}

impl<T> PartialEq for ComponentType<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ComponentType<T> {}

impl<T> fmt::Debug for ComponentType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("id", &self.id)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> From<ComponentType<T>> for ComponentId {
    fn from(ty: ComponentType<T>) -> Self {
        ty.id
    }
}

impl<T> From<&ComponentType<T>> for ComponentId {
    fn from(ty: &ComponentType<T>) -> Self {
        ty.id
    }
}

/// コンポーネント型のデフォルト値ポリシー
pub enum ComponentDefault<T> {
    /// デフォルトなし。値なしで追加すると「未構築」スロットになる
    None,
    /// 追加のたびに複製される静的な値
    Static(T),
    /// 追加のたびに呼び出されるファクトリ
    Factory(Box<dyn Fn() -> T>),
}

impl<T> ComponentDefault<T> {
    /// ファクトリからデフォルトを作成
    pub fn factory(f: impl Fn() -> T + 'static) -> Self {
        ComponentDefault::Factory(Box::new(f))
    }

    /// デフォルトなしかどうか
    pub fn is_none(&self) -> bool {
        matches!(self, ComponentDefault::None)
    }
}

impl<T: Clone> ComponentDefault<T> {
    /// デフォルト値を1つ生成。`None` ポリシーの場合は `None`
    pub(crate) fn instantiate(&self) -> Option<T> {
        match self {
            ComponentDefault::None => None,
            ComponentDefault::Static(value) => Some(value.clone()),
            ComponentDefault::Factory(factory) => Some(factory()),
        }
    }
}

impl<T: Default + 'static> Default for ComponentDefault<T> {
    fn default() -> Self {
        ComponentDefault::factory(T::default)
    }
}

impl<T> fmt::Debug for ComponentDefault<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentDefault::None => f.write_str("None"),
            ComponentDefault::Static(_) => f.write_str("Static(..)"),
            ComponentDefault::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Health(u32);
    impl Component for Health {}

    #[test]
    fn test_static_default_is_cloned() {
        let default = ComponentDefault::Static(Health(10));
        assert_eq!(default.instantiate(), Some(Health(10)));
        assert_eq!(default.instantiate(), Some(Health(10)));
    }

    #[test]
    fn test_factory_called_per_instantiation() {
        use std::cell::Cell;
        use std::rc::Rc;

        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let default = ComponentDefault::factory(move || {
            counter.set(counter.get() + 1);
            Health(counter.get())
        });

        assert_eq!(default.instantiate(), Some(Health(1)));
        assert_eq!(default.instantiate(), Some(Health(2)));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_none_default() {
        let default: ComponentDefault<Health> = ComponentDefault::None;
        assert!(default.is_none());
        assert_eq!(default.instantiate(), None);
    }

    #[test]
    fn test_default_uses_type_default() {
        let default: ComponentDefault<Health> = ComponentDefault::default();
        assert_eq!(default.instantiate(), Some(Health(0)));
    }

    #[test]
    fn test_json_aliases_state() {
        assert!(json!({ "x": 1 }).aliases_state());
        assert!(json!([1, 2]).aliases_state());
        assert!(!json!(3).aliases_state());
        assert!(!json!(null).aliases_state());
        assert!(Some(json!({})).aliases_state());
        assert!(!Option::<serde_json::Value>::None.aliases_state());
    }

    #[test]
    fn test_handle_converts_to_id() {
        let ty: ComponentType<Health> = ComponentType::new(ComponentId::new(3, 1));
        let id: ComponentId = ty.into();
        assert_eq!(id.index(), 1);
        assert_eq!(ComponentId::from(&ty), ty.id());
    }
}
