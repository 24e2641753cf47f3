//! Text generator backend implementations.

mod openai;

pub use openai::OpenAiGenerator;
