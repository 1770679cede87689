pub mod error;
pub mod greenhouse;
pub mod loader;
pub mod models;
pub mod tpl;
pub mod value;

pub use error::{CompileError, TemplateError};
pub use greenhouse::Greenhouse;
pub use greenhouse_macros::template_assets;
pub use loader::{FsLoader, MemoryLoader, TemplateLoader};
pub use models::options::GreenhouseOptions;
pub use tpl::Outcome;
pub use tpl::hook::{Hook, HookCall, HookRegistry, Next};
pub use tpl::render_context::{Frame, IncludeSet};
pub use value::{Value, to_value};

#[doc(hidden)]
pub use async_trait::async_trait;
