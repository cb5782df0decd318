pub mod error;
pub mod logger;
pub mod tools;
pub mod validation;
