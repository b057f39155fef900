pub mod anchor;
pub mod paging;
pub mod viewport;
pub mod window;

pub use anchor::ScrollAnchor;
pub use paging::{BufferedPager, HistoryPager};
pub use viewport::{ScrollMetrics, Viewport};
pub use window::RenderWindow;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
