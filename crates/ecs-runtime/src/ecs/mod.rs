pub mod entity;
pub mod component;
pub mod registry;
pub mod storage;
pub mod index;
pub mod query;
pub mod world;

pub use entity::EntityId;
pub use component::{Component, ComponentDefault, ComponentId, ComponentType};
pub use registry::{ComponentInfo, ComponentRegistry};
pub use storage::ComponentStorage;
pub use index::SetIndex;
pub use query::{Query, QueryCache};
pub use world::World;
