pub mod generator;
pub mod parse;
pub mod provider;


pub use generator::IdeaGenerator;
pub use parse::{clamp_score, parse_json_reply, strip_code_fences};
pub use provider::{provider_from_config, LlmProvider, OpenAiProvider, UnconfiguredProvider};
