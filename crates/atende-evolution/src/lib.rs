//! Evolution API integration: the outbound gateway client and the Whisper
//! transcription adapter.

pub mod client;
pub mod transcribe;

pub use client::EvolutionClient;
pub use transcribe::Transcriber;
