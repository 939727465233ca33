pub mod types;
pub mod validator;

pub use types::{BindingIssue, BindingPolicy, BindingResult};
pub use validator::{RATIO_SCALE, bind, correct_to_ratio};
