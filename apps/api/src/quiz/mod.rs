// Quiz generation: request shape, prompts, output contract, validation,
// and the orchestrator that ties them to the provider.
// All provider calls go through llm_client; nothing here speaks HTTP to the model.

pub mod generator;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod schema;
pub mod validation;

pub use generator::QuizGenerator;
