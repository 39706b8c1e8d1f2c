pub mod prompt;
pub mod providers;
pub mod resolver;

pub use prompt::tutoring_prompt;
pub use providers::gemini::GeminiProvider;
pub use providers::mock::MockProvider;
pub use resolver::SolveResolver;

/// Reasoning-token budget granted to the model per problem.
pub const THINKING_BUDGET: u32 = 2048;

/// Low sampling temperature keeps worked solutions deterministic.
pub const TEMPERATURE: f32 = 0.2;
