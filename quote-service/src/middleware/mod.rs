pub mod actor;

pub use actor::{authorities, ActorContext};
