pub mod quiz_service;
pub mod scoring;
pub mod selection;

pub use quiz_service::QuizService;
