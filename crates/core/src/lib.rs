pub mod jsonl;
pub mod model;
pub mod timeline;

pub use model::*;
pub use timeline::{CallItem, GroupItem, RenderItem, ToolEntry, build};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
