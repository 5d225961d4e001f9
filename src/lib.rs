//! Turq: a programmable mock HTTP/1.1 origin server. The mock engine is a
//! self-contained library — `turq-cli` (`src/main.rs`) is a thin wrapper
//! over what's exported here, so the whole server can also be driven
//! in-process from an integration test.

pub mod chunked;
pub mod cli;
pub mod codec;
pub mod conn;
pub mod editor;
pub mod enums;
pub mod error;
pub mod event;
pub mod forward;
pub mod headers;
pub mod logging;
pub mod model;
pub mod rules;

pub use conn::ConnCounter;
pub use editor::EditorAuth;
pub use error::{CompileError, ForwardError, ProtocolError};
pub use model::{Request, Response};
pub use rules::store::{Program, RulesStore, DEFAULT_RULES};
