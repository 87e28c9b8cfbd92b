pub mod attempt_repository;
pub mod memory;
pub mod question_repository;
pub mod quiz_repository;

pub use attempt_repository::{AttemptRepository, PgAttemptRepository};
pub use memory::MemoryStore;
pub use question_repository::{PgQuestionStore, QuestionStore};
pub use quiz_repository::{PgQuizRepository, QuizRepository};
