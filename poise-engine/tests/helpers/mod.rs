//! Test Helper Utilities
//!
//! Shared utilities for testing poise-engine

#![allow(dead_code)]

pub mod audio_generator;
pub mod mocks;

pub use audio_generator::{generate_test_wav, AudioConfig};
pub use mocks::{
    confident_pose, model_cache, BrokenStreamDecoder, ErroringAnalyzer, FailingAudioExtractor, GeneratedAudioExtractor,
    MockModels, MockVideoDecoder, PanickingAnalyzer, ScriptedSpeechModel, UnreadableVideoDecoder,
};

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialise tracing once per test binary (RUST_LOG controls verbosity)
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
