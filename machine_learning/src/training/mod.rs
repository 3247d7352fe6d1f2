mod builder;
mod settings;
mod trainer;

pub use builder::{DefaultTrainer, TrainerBuilder};
pub use settings::TrainSettings;
pub use trainer::Trainer;
