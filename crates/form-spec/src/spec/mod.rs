pub mod document;
pub mod option;
pub mod question;

pub use document::{DependencyIssue, Document, Group, Page, QuestionIndex, Section};
pub use option::ChoiceOption;
pub use question::{AnswerType, Question, QuestionId, ShowWhen, ValidationSpec};
