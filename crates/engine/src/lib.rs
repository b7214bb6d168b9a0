//! `engine` crate: graph store, dependency resolution, task dispatch and the
//! workflow execution engine.

pub mod models;
pub mod error;
pub mod graph;
pub mod resolver;
pub mod dispatcher;
pub mod log;
pub mod tasks;
pub mod workflows;
pub mod executor;

pub use models::{
    ClosureEntry, ExecutionLogEntry, LogStatus, NewTask, Node, NodeTask, NodeType, Task, TaskStatus,
    Workflow, WorkflowStatus,
};
pub use error::EngineError;
pub use graph::GraphStore;
pub use resolver::DependencyResolver;
pub use dispatcher::{TaskDispatcher, TaskOutcome};
pub use log::ExecutionLog;
pub use tasks::TaskCatalog;
pub use workflows::WorkflowStore;
pub use executor::{ExecutionReport, ExecutorConfig, WorkflowExecutor};
