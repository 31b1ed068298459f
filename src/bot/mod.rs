pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod embed;
pub mod handlers;
pub mod messenger;
pub mod registry;
pub mod session;
pub mod wizard;

#[cfg(test)]
pub mod testing;

pub type HandlerResult = anyhow::Result<()>;

pub use context::AppContext;
pub use dispatcher::CommandDispatcher;
pub use handlers::build_schema;
