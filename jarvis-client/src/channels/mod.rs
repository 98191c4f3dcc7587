mod control;
mod hotword;
mod status;

pub use control::ControlChannel;
pub use hotword::HotwordChannel;
pub use status::StatusChannel;
