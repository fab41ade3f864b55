pub mod ai;
pub mod formats;
pub mod generator;

pub use ai::NewsletterAi;
pub use generator::NewsletterGenerator;
