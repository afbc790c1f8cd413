//! Camera platform module.

pub mod directory;
pub mod mock;
pub mod traits;

pub use directory::DirectoryPlatform;
pub use mock::MockPlatform;
pub use traits::{CameraPlatform, PlatformError};
