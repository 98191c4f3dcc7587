pub mod hash;
mod store;

pub use store::{name_matches, Directory};
