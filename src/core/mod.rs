pub mod bootstrap;
pub mod flows;
pub mod llm;
pub mod schema;
pub mod store;
pub mod terminal;
