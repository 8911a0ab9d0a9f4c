//! HTTP adapters for the model-serving API and the training data generator.

mod client;
mod generator;
mod serving;
pub mod wire;

pub use generator::HttpDataGenerator;
pub use serving::HttpServingClient;
