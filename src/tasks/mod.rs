//! Named tasks the parent can invoke over HTTP
//!
//! ## Key Components
//!
//! - [`Task`] - Trait implemented by every runnable task
//! - [`FnTask`] / [`EchoTask`] - Closure adapter and a built-in echo task
//! - [`TaskRegistry`] - Name-keyed set of tasks, fixed once serving starts
//! - [`TaskDispatcher`] - Lists tasks and runs them with panic containment
//! - [`router`] - `GET {prefix}` index and `{prefix}/{name}` invocation routes
//!
//! ## Example
//!
//! ```rust,ignore
//! use devworker::tasks::{EchoTask, TaskDispatcher, TaskInvocation, TaskRegistry};
//!
//! let registry = TaskRegistry::new().with_task("echo", Arc::new(EchoTask))?;
//! let dispatcher = TaskDispatcher::new(registry);
//!
//! let result = dispatcher.invoke(TaskInvocation::new("echo", payload)).await?;
//! ```

mod builtin;
mod dispatcher;
mod error;
mod registry;
mod routes;
mod traits;
mod types;

pub use builtin::{EchoTask, FnTask};
pub use dispatcher::TaskDispatcher;
pub use error::{TaskError, TaskErrorResponse};
pub use registry::{RegistryError, TaskRegistry};
pub use routes::{decode_body, decode_query, router};
pub use traits::{Task, TaskFailure};
pub use types::{Payload, TaskDescriptor, TaskEvent, TaskInvocation, TaskList, TaskSummary};
