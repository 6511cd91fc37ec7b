pub mod cli;
pub mod config;
pub mod protocol;
pub mod value;

pub use cli::{CliError, Command, prompt};
pub use config::ClientConfig;
pub use value::{Atom, Dictionary, Table, Value, ValueError, Vector};
