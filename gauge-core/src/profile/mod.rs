//! Learner profile synthesis

mod generator;
mod types;

pub use generator::ProfileGenerator;
pub use types::{LearnerProfile, LearningStyle, ProficiencyLevel};
