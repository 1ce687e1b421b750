pub mod code_generator;
pub mod jwt;

pub use code_generator::{CODE_ALPHABET, generate_redemption_code};
pub use jwt::*;
