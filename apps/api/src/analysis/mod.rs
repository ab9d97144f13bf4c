pub mod client;
pub mod display;
pub mod extract;
pub mod handlers;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod report;
pub mod schema;
pub mod validation;
