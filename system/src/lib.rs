pub extern crate serde;
pub extern crate serde_json;

mod history;
mod message;
mod types;

pub use history::*;
pub use message::*;
pub use types::*;
