//! Agent driver adapter (C6): translates the opaque agent executor's native
//! event vocabulary into `CoreEvent`s and owns per-turn cancellation.

mod cost;
mod driver;
mod executor;
mod scripted;
mod translate;

pub use cost::{estimate_cost, estimate_tokens};
pub use driver::AgentDriver;
pub use executor::{AgentExecutor, ExecutionRequest, NativeEvent, NativeEventStream};
pub use scripted::ScriptedExecutor;
pub use translate::EventTranslator;
