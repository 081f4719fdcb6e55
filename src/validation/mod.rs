pub mod rules;
pub mod validator;

pub use rules::ValidationRule;
pub use validator::{RuleOutcome, Validator};
