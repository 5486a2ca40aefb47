//! uigen core: turns natural-language UI requests into validated A2UI
//! messages, repairing model output within a bounded retry budget.

pub mod config;
pub mod executor;
pub mod generation;
pub mod io;
pub mod prompt;
pub mod protocol;
pub mod routing;
pub mod schema;
pub mod session;
pub mod types;

pub use executor::UiAgent;
