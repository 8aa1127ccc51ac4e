//! Shared fixtures for the playback integration tests.
#![allow(dead_code)]

use platform::mocks::{MemorySettings, MockDecoder, MockNetwork, MockStorage, MockTuner};
use playback::config::EngineConfig;
use playback::{AudioEngine, Peripherals};

pub type Engine = AudioEngine<MockDecoder, MockTuner, MockStorage, MockNetwork, MemorySettings>;

/// Route engine logs to the test output (only visible with `--features tracing`).
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// `len` bytes starting with an MPEG-1 layer III frame sync, then a counter
/// pattern so offsets are recognizable in the decoder output.
pub fn mp3(len: usize) -> Vec<u8> {
    let mut v: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    if len >= 2 {
        v[0] = 0xFF;
        v[1] = 0xFB;
    }
    v
}

/// `len` bytes with a RIFF/WAVE header carrying `tag` at offset 20.
pub fn wav(tag: u16, len: usize) -> Vec<u8> {
    let mut v = vec![0u8; len.max(44)];
    v[0..4].copy_from_slice(b"RIFF");
    v[8..12].copy_from_slice(b"WAVE");
    v[20..22].copy_from_slice(&tag.to_le_bytes());
    v
}

pub async fn engine_with(storage: MockStorage, network: MockNetwork) -> Engine {
    engine_full(storage, network, MemorySettings::blank(), EngineConfig::default()).await
}

pub async fn engine_full(
    storage: MockStorage,
    network: MockNetwork,
    settings: MemorySettings,
    config: EngineConfig,
) -> Engine {
    init_logging();
    AudioEngine::new(
        Peripherals {
            decoder: MockDecoder::new(),
            tuner: MockTuner::new(),
            storage,
            network,
            settings,
        },
        config,
    )
    .await
}

/// Step `n` times.
pub async fn steps(engine: &mut Engine, n: usize) {
    for _ in 0..n {
        engine.step().await;
    }
}
