pub mod codegen;
pub mod enhancer;
pub mod errors;
pub mod fallback;
pub mod pipeline;
pub mod render;
pub mod sanitize;
pub mod schema;
pub mod validator;
