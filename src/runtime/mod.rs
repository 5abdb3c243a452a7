pub mod address;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod platform;
pub mod resolver;
pub mod session;
pub mod value;

pub use interpreter::Interpreter;
