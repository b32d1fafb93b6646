pub mod profile;
pub mod rating;

pub use profile::ProfessorProfileService;
pub use rating::RatingAggregator;
