#![forbid(unsafe_code)]

//! Shared data access layer for Lodestone: schema bootstrap and the task
//! repository.

pub mod error;
pub mod model;
pub mod store;

pub use error::{DataError, Result as DataResult};
pub use model::{NewTaskFile, ProgressUpdate, Task, TaskFile, TaskStatus};
pub use store::TaskStore;
