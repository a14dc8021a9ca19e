//! View integration tests
//!
//! These tests drive a PlayerView against the simulated engine from a tokio
//! run loop and check the event stream a host would see:
//! - live stream load and progress
//! - video on demand through to the end
//! - unreachable sources and superseded loads
//! - stalls and seeks

use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use playerbridge::view::SourcePhase;
use playerbridge::{ErrorKind, EventKind, PlayerView, VideoEvent};
use playerbridge_integration_tests::*;

fn view_with(script: playerbridge::engine::SimulationScript) -> (PlayerView, EventRecorder) {
    let mut view = PlayerView::new(simulated(script), fast_config());
    let recorder = EventRecorder::attach(&mut view);
    (view, recorder)
}

#[tokio::test]
async fn test_live_stream_loads_and_reports_progress() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::live());

    view.set_source(LIVE_URL);
    let loaded = pump_until(&mut view, WAIT, |_| recorder.progress_positions().len() >= 5).await;
    assert!(loaded, "no progress within {:?}: {:?}", WAIT, recorder.kinds());

    let events = recorder.events();
    match &events[0] {
        VideoEvent::LoadStart { uri, is_network } => {
            assert_eq!(uri, LIVE_URL);
            assert!(*is_network);
        }
        other => panic!("Expected LoadStart first, got {:?}", other),
    }
    match events.iter().find(|e| e.kind() == EventKind::Load) {
        Some(VideoEvent::Load { duration, is_live, natural_size, .. }) => {
            assert!(*is_live);
            assert_eq!(*duration, 0.0);
            assert_eq!(natural_size.as_ref().map(|s| (s.width, s.height)), Some((1280, 720)));
        }
        other => panic!("Expected Load, got {:?}", other),
    }

    let positions = recorder.progress_positions();
    assert!(positions.windows(2).all(|w| w[0] <= w[1]), "positions went backwards: {:?}", positions);
    assert!(recorder.contains(EventKind::ReadyForDisplay));
    assert!(recorder.error_kinds().is_empty());
    assert_eq!(view.phase(), SourcePhase::Loaded);
    assert!(view.is_playing());

    Ok(())
}

#[tokio::test]
async fn test_vod_plays_to_the_end() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::vod(Duration::from_millis(200)));

    view.set_source(VOD_URL);
    assert!(pump_until(&mut view, WAIT, |_| recorder.contains(EventKind::End)).await);
    pump_for(&mut view, Duration::from_millis(60)).await;

    assert_eq!(recorder.count(EventKind::End), 1);
    assert_eq!(view.phase(), SourcePhase::Ended);

    let kinds = recorder.kinds();
    let end = kinds.iter().position(|k| *k == EventKind::End).unwrap_or(usize::MAX);
    assert!(
        kinds[end + 1..].iter().all(|k| *k != EventKind::Progress),
        "progress after end: {:?}",
        kinds
    );
    assert!(recorder.progress_positions().iter().all(|p| *p <= 0.2 + f64::EPSILON));

    Ok(())
}

#[tokio::test]
async fn test_unreachable_source_reports_one_error() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::live());

    view.set_source(UNREACHABLE_URL);
    assert!(pump_until(&mut view, WAIT, |_| recorder.contains(EventKind::Error)).await);
    pump_for(&mut view, Duration::from_millis(50)).await;

    assert_eq!(recorder.kinds(), vec![EventKind::LoadStart, EventKind::Error]);
    assert_eq!(recorder.error_kinds(), vec![ErrorKind::SourceOpenFailure]);
    assert_eq!(view.phase(), SourcePhase::Failed);
    assert!(!view.has_engine());

    Ok(())
}

#[tokio::test]
async fn test_seek_before_unreachable_source_is_answered() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::live());

    view.set_source(UNREACHABLE_URL);
    view.set_seek(5.0);
    view.set_seek(9.0);
    assert!(pump_until(&mut view, WAIT, |_| recorder.count(EventKind::Seek) == 2).await);
    pump_for(&mut view, Duration::from_millis(50)).await;

    let seek_times: Vec<_> = recorder
        .events()
        .iter()
        .filter_map(|e| match e {
            VideoEvent::Seek { seek_time, .. } => Some(*seek_time),
            _ => None,
        })
        .collect();
    assert_eq!(seek_times, vec![5.0, 9.0]);
    assert_eq!(
        recorder.error_kinds(),
        vec![ErrorKind::OperationSuperseded, ErrorKind::SourceOpenFailure]
    );
    assert_eq!(view.configuration().pending_seek, None);

    Ok(())
}

#[tokio::test]
async fn test_unsupported_scheme_fails_without_a_handle() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::live());

    view.set_source("gopher://old.example/stream");
    view.pump();

    assert_eq!(recorder.kinds(), vec![EventKind::LoadStart, EventKind::Error]);
    assert_eq!(recorder.error_kinds(), vec![ErrorKind::SourceOpenFailure]);
    assert!(!view.has_engine());

    Ok(())
}

#[tokio::test]
async fn test_switching_source_mid_load_supersedes_first_load() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::live());

    view.set_source(LIVE_URL);
    view.set_source(VOD_URL);
    assert!(pump_until(&mut view, WAIT, |_| recorder.contains(EventKind::Load)).await);
    pump_for(&mut view, Duration::from_millis(50)).await;

    let events = recorder.events();
    let starts: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            VideoEvent::LoadStart { uri, .. } => Some(uri.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(starts, vec![LIVE_URL, VOD_URL]);
    assert_eq!(recorder.error_kinds(), vec![ErrorKind::OperationSuperseded]);
    assert_eq!(recorder.count(EventKind::Load), 1);

    let kinds = recorder.kinds();
    assert_eq!(&kinds[..3], &[EventKind::LoadStart, EventKind::Error, EventKind::LoadStart]);

    Ok(())
}

#[tokio::test]
async fn test_stall_and_recovery() -> Result<()> {
    let script = scripts::stalling_live(Duration::from_millis(60), Duration::from_millis(80));
    let (mut view, recorder) = view_with(script);

    view.set_source(LIVE_URL);
    assert!(pump_until(&mut view, WAIT, |_| recorder.contains(EventKind::PlaybackResume)).await);

    let buffering: Vec<_> = recorder
        .events()
        .iter()
        .filter_map(|e| match e {
            VideoEvent::Buffer { is_buffering } => Some(*is_buffering),
            _ => None,
        })
        .collect();
    assert_eq!(buffering, vec![true, false]);

    let kinds = recorder.kinds();
    let stalled = kinds.iter().position(|k| *k == EventKind::PlaybackStalled);
    let resumed = kinds.iter().position(|k| *k == EventKind::PlaybackResume);
    assert!(stalled < resumed, "unexpected order: {:?}", kinds);

    Ok(())
}

#[tokio::test]
async fn test_seek_buffered_until_loaded() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::vod(Duration::from_secs(30)));

    view.set_source(VOD_URL);
    view.set_seek(12.5);
    assert!(pump_until(&mut view, WAIT, |_| recorder.contains(EventKind::Seek)).await);

    let kinds = recorder.kinds();
    let load = kinds.iter().position(|k| *k == EventKind::Load);
    let seek = kinds.iter().position(|k| *k == EventKind::Seek);
    assert!(load < seek, "seek reported before load: {:?}", kinds);

    match recorder.events().iter().find(|e| e.kind() == EventKind::Seek) {
        Some(VideoEvent::Seek { current_time, seek_time }) => {
            assert_eq!(*seek_time, 12.5);
            assert!((*current_time - 12.5).abs() < 0.5, "landed at {}", current_time);
        }
        other => panic!("Expected Seek, got {:?}", other),
    }

    recorder.clear();
    assert!(pump_until(&mut view, WAIT, |_| recorder.progress_positions().len() >= 2).await);
    assert!(recorder.progress_positions().iter().all(|p| *p >= 12.5));

    Ok(())
}

#[tokio::test]
async fn test_property_batch_and_pause() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::vod(Duration::from_secs(30)));

    let props = json!({
        "source": { "uri": VOD_URL },
        "paused": true,
        "volume": 0.4,
        "resizeMode": "cover",
    });
    let props = props.as_object().cloned().unwrap_or_default();
    view.set_props(&props)?;

    assert!(pump_until(&mut view, WAIT, |_| recorder.contains(EventKind::Load)).await);
    pump_for(&mut view, Duration::from_millis(100)).await;

    assert!(!view.is_playing());
    assert_eq!(view.current_playback_time(), Duration::ZERO);
    assert!(recorder.progress_positions().len() <= 1);
    assert_eq!(view.configuration().volume, 0.4);

    view.set_paused(false);
    assert!(pump_until(&mut view, WAIT, |v| v.current_playback_time() > Duration::ZERO).await);

    Ok(())
}

#[tokio::test]
async fn test_stop_then_play_reopens_source() -> Result<()> {
    let (mut view, recorder) = view_with(scripts::live());

    view.set_source(LIVE_URL);
    assert!(pump_until(&mut view, WAIT, |_| recorder.contains(EventKind::Load)).await);

    view.stop();
    view.pump();
    assert!(!view.has_engine());

    recorder.clear();
    view.play();
    assert!(pump_until(&mut view, WAIT, |_| recorder.contains(EventKind::Load)).await);
    assert_eq!(recorder.kinds()[0], EventKind::LoadStart);
    assert!(recorder.error_kinds().is_empty());

    Ok(())
}
