pub mod ast;
pub(crate) mod engine;
pub mod eval;
pub mod hook;
pub mod parser;
pub mod path;
pub(crate) mod render;
pub mod render_context;

pub use engine::Outcome;
