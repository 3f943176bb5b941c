pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod session;
pub mod storage;
pub mod store;
pub mod text;

pub use app::{Action, MutationOutcome, Notepad};
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{NotepadError, NotepadResult, PersistenceError};
pub use store::{Note, NoteId, NoteStore};
pub use text::{DocumentStats, TransformOp};
