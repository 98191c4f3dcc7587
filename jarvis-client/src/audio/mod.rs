pub mod resample;
pub mod streamer;
pub mod utterance;
pub mod vad;
pub mod wav;

pub use streamer::HotwordStreamer;
