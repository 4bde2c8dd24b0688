//! Dance practice trainer.
//!
//! Plays background music, waits out a warm-up, then calls out randomly
//! chosen dance elements by voice at a fixed interval until stopped.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod media;
pub mod speech;
pub mod training;
