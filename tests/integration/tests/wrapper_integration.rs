//! Facade integration tests
//!
//! These tests drive a PlayerWrapper against the simulated engine:
//! - setup, play, pause and stop through the delegate
//! - shutdown while a prepare is in flight
//! - restarting after stop and after a failure
//! - end of media

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use playerbridge::{BridgeError, ErrorKind, PlayerWrapper, WrapperState};
use playerbridge_integration_tests::*;

fn wrapper_with(script: playerbridge::engine::SimulationScript) -> (PlayerWrapper, Arc<RecordingDelegate>) {
    let delegate = RecordingDelegate::new();
    let player = PlayerWrapper::with_config(simulated(script), fast_config(), delegate.weak());
    (player, delegate)
}

#[tokio::test]
async fn test_setup_play_pause_stop() -> Result<()> {
    let (mut player, delegate) = wrapper_with(scripts::live());

    player.setup_player_with_url(LIVE_URL)?;
    assert_eq!(player.state(), WrapperState::Preparing);
    assert!(pump_until(&mut player, WAIT, |p| p.state() == WrapperState::Ready).await);
    assert_eq!(delegate.outcomes(), vec![DelegateCall::Prepared]);
    assert!(delegate.calls().iter().any(|c| matches!(c, DelegateCall::LoadState(s) if s.is_playable())));

    player.play()?;
    assert!(pump_until(&mut player, WAIT, |_| delegate.outcomes().contains(&DelegateCall::Started)).await);
    assert_eq!(player.state(), WrapperState::Playing);
    assert!(player.is_playing());

    player.pause()?;
    assert_eq!(player.state(), WrapperState::Paused);
    assert!(!player.is_playing());

    player.stop()?;
    assert_eq!(player.state(), WrapperState::Stopped);
    assert_eq!(player.url(), Some(LIVE_URL));
    assert!(!player.is_playing());

    // Pause is not valid without a handle
    assert!(matches!(player.pause(), Err(BridgeError::InvalidState { .. })));

    Ok(())
}

#[tokio::test]
async fn test_shutdown_during_prepare_is_silent() -> Result<()> {
    let (mut player, delegate) = wrapper_with(scripts::live());

    player.setup_player_with_url(LIVE_URL)?;
    player.shutdown()?;
    assert_eq!(player.state(), WrapperState::Disposed);

    // Give the engine thread time to reach its prepare point
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(player.pump(), 0);
    assert!(delegate.calls().is_empty());

    assert!(matches!(player.play(), Err(BridgeError::Disposed)));
    assert!(matches!(player.setup_player_with_url(VOD_URL), Err(BridgeError::Disposed)));
    assert!(matches!(player.shutdown(), Err(BridgeError::Disposed)));

    Ok(())
}

#[tokio::test]
async fn test_play_after_stop_restarts() -> Result<()> {
    let (mut player, delegate) = wrapper_with(scripts::live());

    player.setup_player_with_url(LIVE_URL)?;
    assert!(pump_until(&mut player, WAIT, |p| p.state() == WrapperState::Ready).await);
    player.stop()?;
    delegate.clear();

    player.play()?;
    assert_eq!(player.state(), WrapperState::Playing);
    assert!(pump_until(&mut player, WAIT, |_| delegate.outcomes().contains(&DelegateCall::Started)).await);
    assert_eq!(delegate.outcomes(), vec![DelegateCall::Prepared, DelegateCall::Started]);
    assert!(player.is_playing());

    Ok(())
}

#[tokio::test]
async fn test_unreachable_source_then_new_url() -> Result<()> {
    let (mut player, delegate) = wrapper_with(scripts::live());

    player.setup_player_with_url(UNREACHABLE_URL)?;
    assert!(pump_until(&mut player, WAIT, |p| p.state() == WrapperState::Failed).await);
    assert_eq!(delegate.outcomes(), vec![DelegateCall::Failed(ErrorKind::SourceOpenFailure)]);
    assert!(matches!(player.play(), Err(BridgeError::InvalidState { .. })));

    delegate.clear();
    player.setup_player_with_url(LIVE_URL)?;
    assert!(pump_until(&mut player, WAIT, |p| p.state() == WrapperState::Ready).await);
    assert_eq!(delegate.outcomes(), vec![DelegateCall::Prepared]);

    Ok(())
}

#[tokio::test]
async fn test_refused_source_fails_on_next_pump() -> Result<()> {
    let (mut player, delegate) = wrapper_with(scripts::live());

    player.setup_player_with_url("gopher://old.example/stream")?;
    assert_eq!(player.state(), WrapperState::Failed);
    assert!(delegate.calls().is_empty());

    assert_eq!(player.pump(), 1);
    assert_eq!(delegate.outcomes(), vec![DelegateCall::Failed(ErrorKind::SourceOpenFailure)]);

    Ok(())
}

#[tokio::test]
async fn test_resetup_before_pump_drops_refused_failure() -> Result<()> {
    let (mut player, delegate) = wrapper_with(scripts::live());

    player.setup_player_with_url("gopher://old.example/stream")?;
    player.setup_player_with_url(LIVE_URL)?;
    assert_eq!(player.state(), WrapperState::Preparing);

    assert!(pump_until(&mut player, WAIT, |p| p.state() == WrapperState::Ready).await);
    assert_eq!(delegate.outcomes(), vec![DelegateCall::Prepared]);

    Ok(())
}

#[tokio::test]
async fn test_end_of_media_stops() -> Result<()> {
    let (mut player, delegate) = wrapper_with(scripts::vod(Duration::from_millis(150)));

    player.setup_player_with_url(VOD_URL)?;
    assert!(pump_until(&mut player, WAIT, |p| p.state() == WrapperState::Ready).await);
    player.play()?;
    assert!(pump_until(&mut player, WAIT, |p| p.state() == WrapperState::Stopped).await);

    assert!(!player.is_playing());
    assert_eq!(delegate.outcomes(), vec![DelegateCall::Prepared, DelegateCall::Started]);

    Ok(())
}

#[tokio::test]
async fn test_dropped_delegate_is_not_called() -> Result<()> {
    let (mut player, delegate) = wrapper_with(scripts::live());

    player.setup_player_with_url(LIVE_URL)?;
    drop(delegate);

    assert!(pump_until(&mut player, WAIT, |p| p.state() == WrapperState::Ready).await);
    player.play()?;
    assert_eq!(player.state(), WrapperState::Playing);

    Ok(())
}
