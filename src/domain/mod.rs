pub mod blog;
pub mod detection;
pub mod state;

pub use blog::BlogTarget;
pub use detection::DetectionResult;
pub use state::{is_cache_fresh, BlogState, CheckHistory};
