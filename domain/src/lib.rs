pub mod chunking;
pub mod error;
pub mod models;
pub mod prompt;
pub mod services;

pub use error::{RagError, Result};
