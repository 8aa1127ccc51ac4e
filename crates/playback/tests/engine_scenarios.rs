//! End-to-end behaviour of the playback state machine against the platform
//! mocks: source switching, announcements, resume, test mode and volume.

mod common;

use common::{engine_full, engine_with, mp3, steps, wav};
use embassy_time::{Duration, Timer};
use platform::mocks::{MemorySettings, MockNetwork, MockStorage};
use platform::settings::{RetriggerMode, SavedSource, Settings};
use platform::{FmFrequency, NativeVolume, ToneControl, VolumePercent};
use playback::command::text;
use playback::config::EngineConfig;
use playback::volume::to_native;
use playback::{AudioFormat, Command, Mode, PlayState, PlaybackSnapshot, PlaybackType};

fn play(path: &str) -> Command {
    Command::PlayFile(text(path).unwrap())
}

fn announce(path: &str) -> Command {
    Command::PlayAnnouncement(text(path).unwrap())
}

fn stream(url: &str) -> Command {
    Command::PlayStream(text(url).unwrap())
}

fn native(v: u8) -> NativeVolume {
    to_native(VolumePercent::new(v))
}

/// IMA-ADPCM WAV with a recognizable byte pattern after the header.
fn ima_wav(len: usize) -> Vec<u8> {
    let mut v = wav(0x0011, len);
    for (i, b) in v.iter_mut().enumerate().skip(44) {
        *b = (i % 251) as u8;
    }
    v
}

fn two_track_card() -> MockStorage {
    MockStorage::new()
        .with_file("/a.mp3", &mp3(200))
        .with_file("/b.mp3", &mp3(100))
}

// ─── file playback ─────────────────────────────────────────────────────────

#[tokio::test]
async fn play_file_opens_and_feeds_in_chunks() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.begin().await;
    assert_eq!(engine.playlist().len(), 2);

    engine.dispatch(play("/a.mp3")).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);
    assert_eq!(engine.playback_type(), PlaybackType::File);

    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
    assert_eq!(engine.active_format(), Some(AudioFormat::Mp3));
    assert!(engine.has_open_source());
    assert_eq!(engine.peripherals().storage.open_handles(), 1);

    steps(&mut engine, 4).await;
    let decoder = &engine.peripherals().decoder;
    assert_eq!(decoder.chunk_sizes(), &[64, 64, 64, 8]);
    assert_eq!(decoder.written(), mp3(200).as_slice());
    assert_eq!(engine.current_state().file_position(), 200);
}

#[tokio::test]
async fn end_of_file_advances_and_wraps() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.begin().await;
    engine.dispatch(play("/a.mp3")).await;

    // init + 4 feeds + end of file
    steps(&mut engine, 6).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);
    assert_eq!(engine.peripherals().storage.open_handles(), 0);

    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/b.mp3");
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);

    // b: 2 feeds + end of file, then the successor wraps to a
    steps(&mut engine, 4).await;
    assert_eq!(engine.current_state().file_path(), "/a.mp3");
    assert_eq!(engine.current_state().file_position(), 0);
    assert!(engine.peripherals().storage.open_handles() <= 1);
}

#[tokio::test]
async fn decoder_backpressure_holds_position() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.dispatch(play("/a.mp3")).await;
    engine.step().await;

    engine.peripherals_mut().decoder.set_ready(false);
    steps(&mut engine, 10).await;
    assert!(engine.peripherals().decoder.written().is_empty());
    assert_eq!(engine.current_state().file_position(), 0);
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);

    engine.peripherals_mut().decoder.set_ready(true);
    engine.step().await;
    assert_eq!(engine.current_state().file_position(), 64);
}

#[tokio::test]
async fn missing_file_goes_idle() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.dispatch(play("/nope.mp3")).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(!engine.has_open_source());
    assert_eq!(engine.peripherals().storage.open_handles(), 0);
}

#[tokio::test]
async fn skip_moves_through_the_playlist() {
    let storage = two_track_card().with_file("/c.mp3", &mp3(100));
    let mut engine = engine_with(storage, MockNetwork::new()).await;
    engine.begin().await;

    engine.dispatch(play("/b.mp3")).await;
    engine.step().await;
    engine.dispatch(Command::NextTrack).await;
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/c.mp3");

    engine.dispatch(Command::NextTrack).await;
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/a.mp3");

    engine.dispatch(Command::PrevTrack).await;
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/c.mp3");
    assert_eq!(engine.peripherals().storage.open_handles(), 1);
}

#[tokio::test]
async fn skip_is_ignored_for_radio() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.begin().await;
    engine.dispatch(Command::PlayRadio(text("98.5").unwrap())).await;
    engine.step().await;
    engine.dispatch(Command::NextTrack).await;
    assert_eq!(engine.playback_type(), PlaybackType::Radio);
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
}

// ─── resume ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ima_resume_aligns_to_block() {
    let data = ima_wav(4000);
    let storage = MockStorage::new().with_file("/talk.wav", &data);
    let mut engine = engine_with(storage, MockNetwork::new()).await;

    engine.dispatch(play("/talk.wav")).await;
    engine.step().await;
    assert_eq!(engine.active_format(), Some(AudioFormat::WavImaAdpcm));
    steps(&mut engine, 21).await;
    assert_eq!(engine.current_state().file_position(), 1344);

    engine.dispatch(Command::Pause).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    engine.dispatch(Command::Resume).await;
    engine.step().await;
    assert_eq!(engine.current_state().file_position(), 1024);

    engine.peripherals_mut().decoder.clear_written();
    engine.step().await;
    assert_eq!(engine.peripherals().decoder.written(), &data[1024..1088]);
    assert_eq!(engine.peripherals().storage.open_handles(), 1);
}

#[tokio::test]
async fn compressed_resume_rewinds_2048() {
    let data = mp3(8000);
    let storage = MockStorage::new().with_file("/song.mp3", &data);
    let mut engine = engine_with(storage, MockNetwork::new()).await;

    engine.dispatch(play("/song.mp3")).await;
    steps(&mut engine, 1 + 78).await;
    assert_eq!(engine.current_state().file_position(), 4992);

    engine.dispatch(Command::Pause).await;
    engine.dispatch(Command::Resume).await;
    engine.step().await;
    assert_eq!(engine.current_state().file_position(), 4992 - 2048);

    engine.peripherals_mut().decoder.clear_written();
    engine.step().await;
    assert_eq!(engine.peripherals().decoder.written(), &data[2944..3008]);
}

#[tokio::test]
async fn resume_near_start_restarts() {
    let storage = MockStorage::new().with_file("/song.mp3", &mp3(8000));
    let mut engine = engine_with(storage, MockNetwork::new()).await;
    engine.dispatch(play("/song.mp3")).await;
    steps(&mut engine, 1 + 15).await;
    assert_eq!(engine.current_state().file_position(), 960);

    engine.dispatch(Command::Pause).await;
    engine.dispatch(Command::Resume).await;
    engine.step().await;
    assert_eq!(engine.current_state().file_position(), 0);
}

#[tokio::test]
async fn pause_is_file_only() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.dispatch(Command::PlayRadio(text("101.1").unwrap())).await;
    engine.step().await;
    engine.dispatch(Command::Pause).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
    engine.dispatch(Command::Resume).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
}

// ─── announcements ─────────────────────────────────────────────────────────

#[tokio::test]
async fn announcement_interrupts_file_and_restores_it() {
    let data = mp3(8000);
    let storage = MockStorage::new()
        .with_file("/song.mp3", &data)
        .with_file("/spiffs/chime.mp3", &mp3(100));
    let mut engine = engine_with(storage, MockNetwork::new()).await;
    engine.dispatch(Command::SetAnnouncementVolume(40)).await;

    engine.dispatch(play("/song.mp3")).await;
    steps(&mut engine, 1 + 50).await;
    assert_eq!(engine.current_state().file_position(), 3200);

    engine.dispatch(announce("/spiffs/chime.mp3")).await;
    assert_eq!(engine.play_state(), PlayState::AnnouncementInit);
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::AnnouncementPlay);
    assert_eq!(engine.playback_type(), PlaybackType::Announcement);
    assert_eq!(engine.peripherals().decoder.volume(), Some(native(40)));
    assert_eq!(engine.peripherals().storage.open_handles(), 1);

    // the saved position does not move while the announcement plays
    steps(&mut engine, 2).await;
    assert_eq!(engine.current_state().file_position(), 3200);

    // end of announcement, then reopen the song at the rewound offset
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);
    assert_eq!(engine.playback_type(), PlaybackType::File);
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/song.mp3");
    assert_eq!(engine.current_state().file_position(), 3200 - 2048);
    assert_eq!(engine.peripherals().decoder.volume(), Some(native(90)));
}

#[tokio::test]
async fn announcement_during_stream_restores_same_url() {
    let mut response = b"ICY 200 OK\r\nicy-name: x\r\n\r\n".to_vec();
    response.extend_from_slice(&mp3(100));
    let storage = MockStorage::new().with_file("/spiffs/ann.mp3", &mp3(100));
    let mut engine = engine_with(storage, MockNetwork::new().with_response(&response)).await;

    engine.dispatch(stream("http://x")).await;
    steps(&mut engine, 4).await; // init, connect, headers, one body chunk
    assert_eq!(engine.playback_type(), PlaybackType::Stream);
    assert_eq!(engine.peripherals().decoder.written(), &mp3(100)[..64]);

    engine.dispatch(announce("/spiffs/ann.mp3")).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::AnnouncementPlay);
    assert_eq!(engine.peripherals().network.closes(), 1);

    steps(&mut engine, 3).await;
    assert_eq!(engine.playback_type(), PlaybackType::Stream);
    assert_eq!(engine.current_state().stream_url(), "http://x");

    steps(&mut engine, 2).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
    assert_eq!(engine.peripherals().network.connects().len(), 2);
}

#[tokio::test]
async fn announcement_during_radio_retunes_afterwards() {
    let storage = MockStorage::new().with_file("/spiffs/ann.mp3", &mp3(10));
    let mut engine = engine_with(storage, MockNetwork::new()).await;
    engine.dispatch(Command::PlayRadio(text("98.5").unwrap())).await;
    engine.step().await;
    assert!(engine.peripherals().decoder.passthrough());

    engine.dispatch(announce("/spiffs/ann.mp3")).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::AnnouncementPlay);
    assert!(!engine.peripherals().decoder.passthrough());

    // feed, end of announcement, reopen the radio
    steps(&mut engine, 2).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);
    assert_eq!(engine.playback_type(), PlaybackType::Radio);
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
    let station = FmFrequency::from_hundredths(9_850).unwrap();
    assert_eq!(engine.peripherals().tuner.tuned(), &[station, station]);
    assert!(engine.peripherals().decoder.passthrough());
    assert_eq!(engine.peripherals().decoder.volume(), Some(native(90)));
}

#[tokio::test]
async fn announcement_during_auto_advance_resumes_the_successor() {
    let storage = two_track_card().with_file("/spiffs/ann.mp3", &mp3(10));
    let mut engine = engine_with(storage, MockNetwork::new()).await;
    engine.begin().await;
    engine.dispatch(play("/b.mp3")).await;
    // b: init, 2 feeds, end of file queues a
    steps(&mut engine, 4).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);

    engine.dispatch(announce("/spiffs/ann.mp3")).await;
    // announcement: init, feed, end
    steps(&mut engine, 3).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/a.mp3");
    assert_eq!(engine.current_state().file_position(), 0);
}

#[tokio::test]
async fn announcement_from_idle_returns_to_idle() {
    let storage = MockStorage::new().with_file("/spiffs/ann.mp3", &mp3(10));
    let mut engine = engine_with(storage, MockNetwork::new()).await;
    engine.dispatch(announce("/spiffs/ann.mp3")).await;
    steps(&mut engine, 3).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert_eq!(engine.playback_type(), PlaybackType::None);
    assert_eq!(engine.peripherals().decoder.written(), mp3(10).as_slice());
}

#[tokio::test]
async fn failed_announcement_keeps_snapshot() {
    let storage = MockStorage::new().with_file("/song.mp3", &mp3(8000));
    let mut engine = engine_with(storage, MockNetwork::new()).await;
    engine.dispatch(play("/song.mp3")).await;
    steps(&mut engine, 1 + 3).await;

    engine.dispatch(announce("/spiffs/missing.mp3")).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert_eq!(engine.playback_type(), PlaybackType::File);
    assert_eq!(
        engine.current_state(),
        &PlaybackSnapshot::File {
            path: text("/song.mp3").unwrap(),
            position: 192,
        }
    );
    assert_eq!(engine.peripherals().storage.open_handles(), 0);

    // nothing restores automatically, a manual resume does
    steps(&mut engine, 3).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    engine.dispatch(Command::Resume).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
}

#[tokio::test]
async fn play_command_supersedes_announcement() {
    let storage = two_track_card().with_file("/spiffs/ann.mp3", &mp3(500));
    let mut engine = engine_with(storage, MockNetwork::new()).await;
    engine.begin().await;
    engine.dispatch(play("/a.mp3")).await;
    engine.step().await;
    engine.dispatch(announce("/spiffs/ann.mp3")).await;
    engine.step().await;

    engine.dispatch(play("/b.mp3")).await;
    // b: init, 2 feeds, end of file, successor a
    steps(&mut engine, 4).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/a.mp3");
    assert_eq!(engine.playback_type(), PlaybackType::File);
}

// ─── streams ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_sends_get_and_feeds_body_only() {
    let body = mp3(40);
    let mut response = b"HTTP/1.0 200 OK\r\ncontent-type: audio/mpeg\r\n\r\n".to_vec();
    response.extend_from_slice(&body);
    let net = MockNetwork::new().with_response(&response).hang_up_at_end();
    let mut engine = engine_with(MockStorage::new(), net).await;

    engine.dispatch(stream("http://radio.example:8000/live")).await;
    steps(&mut engine, 2).await;
    let request = core::str::from_utf8(engine.peripherals().network.sent()).unwrap();
    assert!(request.starts_with("GET /live HTTP/1.1\r\n"));
    assert!(request.contains("Host: radio.example\r\n"));
    assert!(request.ends_with("\r\n\r\n"));
    assert_eq!(
        engine.peripherals().network.connects(),
        &[("radio.example".to_string(), 8000)]
    );

    steps(&mut engine, 2).await;
    assert_eq!(engine.peripherals().decoder.written(), body.as_slice());

    // peer hung up
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(!engine.has_open_source());
    assert_eq!(engine.peripherals().network.closes(), 1);
    assert_eq!(engine.settings().last_stream_url.as_str(), "http://radio.example:8000/live");
}

#[tokio::test]
async fn refused_connection_goes_idle() {
    let mut net = MockNetwork::new();
    net.refuse_connections(true);
    let mut engine = engine_with(MockStorage::new(), net).await;
    engine.dispatch(stream("http://x/")).await;
    steps(&mut engine, 2).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(!engine.has_open_source());
    assert_eq!(engine.peripherals().network.closes(), 1);
}

#[tokio::test]
async fn hanging_connect_times_out() {
    let mut net = MockNetwork::new();
    net.hang_on_connect(true);
    let config = EngineConfig {
        stream_timeout: Duration::from_millis(50),
    };
    let mut engine = engine_full(MockStorage::new(), net, MemorySettings::blank(), config).await;
    engine.dispatch(stream("http://x/")).await;
    steps(&mut engine, 2).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(engine.peripherals().network.connects().is_empty());
}

#[tokio::test]
async fn unterminated_headers_time_out() {
    let net = MockNetwork::new().with_response(b"HTTP/1.0 200 OK\r\n");
    let config = EngineConfig {
        stream_timeout: Duration::from_millis(30),
    };
    let mut engine = engine_full(MockStorage::new(), net, MemorySettings::blank(), config).await;
    engine.dispatch(stream("http://x/")).await;
    steps(&mut engine, 3).await;
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);

    Timer::after_millis(40).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(engine.peripherals().decoder.written().is_empty());
}

#[tokio::test]
async fn https_url_is_rejected() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.dispatch(stream("https://x/")).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(engine.peripherals().network.connects().is_empty());
}

// ─── radio ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn radio_tunes_and_routes_analog() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.dispatch(Command::PlayRadio(text("101.1").unwrap())).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
    assert_eq!(
        engine.peripherals().tuner.tuned(),
        &[FmFrequency::from_hundredths(10110).unwrap()]
    );
    assert!(engine.peripherals().decoder.passthrough());
    assert_eq!(engine.settings().last_frequency.hundredths(), 10110);

    engine.dispatch(Command::Stop).await;
    assert!(!engine.peripherals().decoder.passthrough());
}

#[tokio::test]
async fn out_of_band_frequency_goes_idle() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.dispatch(Command::PlayRadio(text("120.0").unwrap())).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(engine.peripherals().tuner.tuned().is_empty());

    engine.dispatch(Command::PlayRadio(text("fm").unwrap())).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
}

#[tokio::test]
async fn tuner_failure_goes_idle() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.peripherals_mut().tuner.fail(true);
    engine.dispatch(Command::PlayRadio(text("98").unwrap())).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(!engine.has_open_source());
}

// ─── stop and test mode ────────────────────────────────────────────────────

#[tokio::test]
async fn stop_clears_everything() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.dispatch(play("/a.mp3")).await;
    steps(&mut engine, 2).await;

    engine.dispatch(Command::Stop).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert_eq!(engine.playback_type(), PlaybackType::None);
    assert!(engine.current_state().is_empty());
    assert_eq!(engine.peripherals().storage.open_handles(), 0);
    assert_eq!(engine.peripherals().decoder.stops(), 1);

    engine.dispatch(Command::Resume).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
}

#[tokio::test]
async fn test_mode_filters_and_restores() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.begin().await;
    engine.dispatch(play("/a.mp3")).await;
    steps(&mut engine, 1 + 2).await;

    // entering test mode leaves the running source alone
    engine.dispatch(Command::StartTest).await;
    assert_eq!(engine.mode(), Mode::Test);
    assert_eq!(engine.playback_type(), PlaybackType::File);
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
    assert_eq!(engine.current_state().file_path(), "/a.mp3");
    assert_eq!(engine.current_state().file_position(), 128);
    assert_eq!(engine.peripherals().storage.open_handles(), 1);
    assert_eq!(engine.peripherals().decoder.stops(), 0);

    let before = (
        engine.mode(),
        engine.playback_type(),
        engine.play_state(),
        engine.current_state().clone(),
    );
    for cmd in [
        play("/b.mp3"),
        stream("http://x/"),
        Command::PlayRadio(text("98").unwrap()),
        announce("/spiffs/ann.mp3"),
        Command::NextTrack,
        Command::PrevTrack,
        Command::Pause,
        Command::Resume,
        Command::Stop,
    ] {
        engine.dispatch(cmd).await;
        let after = (
            engine.mode(),
            engine.playback_type(),
            engine.play_state(),
            engine.current_state().clone(),
        );
        assert_eq!(after, before);
    }
    assert_eq!(engine.peripherals().decoder.stops(), 0);

    // still fed until a test source takes over
    engine.step().await;
    assert_eq!(engine.current_state().file_position(), 192);

    // dot-less payload is read as hundredths of a MHz
    engine.dispatch(Command::PlayTestSource(text("9850").unwrap())).await;
    engine.step().await;
    assert_eq!(engine.playback_type(), PlaybackType::Radio);
    assert_eq!(engine.peripherals().storage.open_handles(), 0);
    assert_eq!(
        engine.peripherals().tuner.tuned(),
        &[FmFrequency::from_hundredths(9850).unwrap()]
    );
    assert!(engine.peripherals().decoder.passthrough());
    // test sources are not remembered
    assert_eq!(engine.settings().last_frequency, FmFrequency::default());

    engine.dispatch(Command::StopTest).await;
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(engine.peripherals().decoder.stops(), 1);
    assert!(!engine.peripherals().decoder.passthrough());
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);
    assert_eq!(engine.playback_type(), PlaybackType::File);
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/a.mp3");
    assert_eq!(engine.play_state(), PlayState::PlaybackPlay);
}

#[tokio::test]
async fn test_mode_toggles_are_idempotent() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.dispatch(Command::StopTest).await;
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(engine.peripherals().decoder.stops(), 0);

    engine.dispatch(play("/a.mp3")).await;
    steps(&mut engine, 2).await;
    engine.dispatch(Command::StartTest).await;
    engine.dispatch(Command::PlayTestSource(text("/b.mp3").unwrap())).await;
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/b.mp3");

    // a repeated start keeps the first restore point
    engine.dispatch(Command::StartTest).await;
    assert_eq!(engine.peripherals().decoder.stops(), 0);

    engine.dispatch(Command::StopTest).await;
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(engine.peripherals().decoder.stops(), 1);
    engine.step().await;
    assert_eq!(engine.current_state().file_path(), "/a.mp3");

    engine.dispatch(Command::StopTest).await;
    assert_eq!(engine.peripherals().decoder.stops(), 1);
}

#[tokio::test]
async fn test_mode_from_idle_returns_to_idle() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.dispatch(Command::StartTest).await;
    engine.dispatch(Command::PlayTestSource(text("/a.mp3").unwrap())).await;
    engine.step().await;
    engine.dispatch(Command::StopTest).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert_eq!(engine.playback_type(), PlaybackType::None);
    assert_eq!(engine.peripherals().storage.open_handles(), 0);
}

#[tokio::test]
async fn failed_test_source_reports_test_type() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.dispatch(Command::StartTest).await;
    engine.dispatch(Command::PlayTestSource(text("/missing.mp3").unwrap())).await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert_eq!(engine.playback_type(), PlaybackType::Test);
}

#[tokio::test]
async fn test_mode_ends_its_file_without_advancing() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.begin().await;
    engine.dispatch(Command::StartTest).await;
    engine.dispatch(Command::PlayTestSource(text("/b.mp3").unwrap())).await;
    // init, 2 feeds, end of file
    steps(&mut engine, 4).await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert_eq!(engine.mode(), Mode::Test);
}

// ─── volume and settings ───────────────────────────────────────────────────

#[tokio::test]
async fn mute_round_trip_and_volume_while_muted() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.dispatch(Command::SetMusicVolume(60)).await;
    assert_eq!(engine.peripherals().decoder.volume(), Some(native(60)));

    engine.dispatch(Command::MuteToggle).await;
    assert!(engine.is_muted());
    assert_eq!(engine.peripherals().decoder.volume(), Some(NativeVolume::SILENT));

    engine.dispatch(Command::SetMusicVolume(20)).await;
    assert_eq!(engine.peripherals().decoder.volume(), Some(NativeVolume::SILENT));
    assert_eq!(engine.music_volume(), VolumePercent::new(20));

    engine.dispatch(Command::MuteToggle).await;
    assert!(!engine.is_muted());
    assert_eq!(engine.peripherals().decoder.volume(), Some(native(20)));

    engine.flush_settings().await;
    assert_eq!(
        engine.peripherals().settings.stored().music_volume,
        VolumePercent::new(20)
    );
}

#[tokio::test]
async fn volume_is_clamped() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.dispatch(Command::SetMusicVolume(250)).await;
    assert_eq!(engine.music_volume(), VolumePercent::MAX);
    assert_eq!(engine.peripherals().decoder.volume(), Some(native(100)));
}

#[tokio::test]
async fn settings_are_loaded_and_applied_at_begin() {
    let mut stored = Settings::default();
    stored.music_volume = VolumePercent::new(40);
    stored.announcement_volume = VolumePercent::new(70);
    stored.retrigger_mode = RetriggerMode::NextTrackOnRelease;
    stored.eq_preset = 1;
    let mut engine = engine_full(
        MockStorage::new(),
        MockNetwork::new(),
        MemorySettings::with(&stored),
        EngineConfig::default(),
    )
    .await;

    assert_eq!(engine.music_volume(), VolumePercent::new(40));
    assert_eq!(engine.announcement_volume(), VolumePercent::new(70));
    assert_eq!(engine.retrigger_mode(), RetriggerMode::NextTrackOnRelease);
    assert_eq!(engine.peripherals().decoder.tone(), None);
    engine.begin().await;
    assert_eq!(engine.peripherals().decoder.volume(), Some(native(40)));
    assert_eq!(engine.peripherals().decoder.tone(), Some(ToneControl::preset(1)));
    // nothing was saved, so nothing starts
    assert_eq!(engine.play_state(), PlayState::Idle);
}

#[tokio::test]
async fn eq_preset_change_is_applied_and_persisted() {
    let mut engine = engine_with(MockStorage::new(), MockNetwork::new()).await;
    engine.begin().await;
    assert_eq!(engine.peripherals().decoder.tone(), Some(ToneControl::FLAT));

    engine.set_eq_preset(3).await;
    assert_eq!(engine.peripherals().decoder.tone(), Some(ToneControl::preset(3)));
    engine.flush_settings().await;
    assert_eq!(engine.peripherals().settings.stored().eq_preset, 3);

    engine.set_eq_preset(7).await;
    assert_eq!(engine.peripherals().decoder.tone(), Some(ToneControl::FLAT));
    assert_eq!(engine.settings().eq_preset, 0);
}

#[tokio::test]
async fn saved_file_is_reopened_at_begin() {
    let mut stored = Settings::default();
    stored.remember_file("/b.mp3");
    let mut engine = engine_full(
        two_track_card(),
        MockNetwork::new(),
        MemorySettings::with(&stored),
        EngineConfig::default(),
    )
    .await;
    assert_eq!(engine.play_state(), PlayState::Idle);

    engine.begin().await;
    assert_eq!(engine.play_state(), PlayState::PlaybackInit);
    assert_eq!(engine.playback_type(), PlaybackType::File);
    steps(&mut engine, 2).await;
    assert_eq!(engine.current_state().file_path(), "/b.mp3");
    assert_eq!(engine.peripherals().decoder.written(), &mp3(100)[..64]);
}

#[tokio::test]
async fn saved_radio_is_retuned_at_begin() {
    let mut stored = Settings::default();
    stored.remember_stream("http://x/");
    stored.remember_frequency(FmFrequency::from_hundredths(9_850).unwrap());
    let mut engine = engine_full(
        MockStorage::new(),
        MockNetwork::new(),
        MemorySettings::with(&stored),
        EngineConfig::default(),
    )
    .await;

    engine.begin().await;
    engine.step().await;
    assert_eq!(engine.playback_type(), PlaybackType::Radio);
    assert_eq!(
        engine.peripherals().tuner.tuned(),
        &[FmFrequency::from_hundredths(9_850).unwrap()]
    );
    assert!(engine.peripherals().decoder.passthrough());
    assert!(engine.peripherals().network.connects().is_empty());
}

#[tokio::test]
async fn missing_saved_file_leaves_engine_idle() {
    let mut stored = Settings::default();
    stored.remember_file("/gone.mp3");
    let mut engine = engine_full(
        MockStorage::new(),
        MockNetwork::new(),
        MemorySettings::with(&stored),
        EngineConfig::default(),
    )
    .await;
    engine.begin().await;
    engine.step().await;
    assert_eq!(engine.play_state(), PlayState::Idle);
    assert!(!engine.has_open_source());
}

#[tokio::test]
async fn last_file_is_persisted_once_per_change() {
    let mut engine = engine_with(two_track_card(), MockNetwork::new()).await;
    engine.dispatch(play("/a.mp3")).await;
    engine.step().await;
    engine.flush_settings().await;
    engine.flush_settings().await;

    let settings = &engine.peripherals().settings;
    assert_eq!(settings.writes(), 1);
    assert_eq!(settings.stored().last_file.as_str(), "/a.mp3");
    assert_eq!(settings.stored().last_source, SavedSource::File);
}
