//! AI summarization: a Gemini client, prompt construction, tolerant output
//! parsing and the batch pipeline that walks unsummarized articles.

pub mod gemini;
pub mod parse;
pub mod pipeline;
pub mod prompt;

pub use gemini::{GeminiModel, SummaryModel, DEFAULT_MODEL};
pub use parse::{confidence, parse_model_output, ModelSummary};
pub use pipeline::{SummarizeStats, Summarizer};
pub use prompt::build_prompt;
