//! Assistant loop tests

use tokio_util::sync::CancellationToken;

use techbot::Daemon;
use techbot::voice::Capture;

mod common;

use common::{CallLog, RecordingSpeaker, Scenario, said, stdout, test_router};

#[tokio::test]
async fn test_loop_speaks_responses_until_exit() {
    let t = test_router(Scenario {
        script: vec![
            said("run uptime"),
            Capture::NoSpeech,
            said("  EXIT "),
            said("run never"),
        ],
        command: stdout("up 3 days"),
        ..Scenario::default()
    });
    let spoken = CallLog::default();
    let speaker = RecordingSpeaker { log: spoken.clone() };

    Daemon::from_parts(t.router, Box::new(speaker), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(spoken.calls(), vec!["Command output:\nup 3 days".to_string()]);
    assert_eq!(t.calls.commands.calls(), vec!["uptime".to_string()]);
    assert_eq!(t.calls.captures.count(), 3);
}

#[tokio::test]
async fn test_loop_ends_when_input_exhausted() {
    let t = test_router(Scenario {
        script: vec![said("what is a pipe")],
        ..Scenario::default()
    });
    let spoken = CallLog::default();
    let speaker = RecordingSpeaker { log: spoken.clone() };

    Daemon::from_parts(t.router, Box::new(speaker), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(spoken.calls(), vec!["generated".to_string()]);
    assert_eq!(t.cache.len().unwrap(), 1);
}

#[tokio::test]
async fn test_cancelled_loop_returns_immediately() {
    let t = test_router(Scenario {
        script: vec![said("run uptime")],
        ..Scenario::default()
    });
    let token = CancellationToken::new();
    token.cancel();

    Daemon::from_parts(
        t.router,
        Box::new(RecordingSpeaker {
            log: CallLog::default(),
        }),
        token,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(t.calls.commands.count(), 0);
}

#[tokio::test]
async fn test_unstored_turn_is_silent_and_loop_continues() {
    let t = test_router(Scenario {
        script: vec![said("run ls"), said("run pwd")],
        read_only_cache: true,
        ..Scenario::default()
    });
    let spoken = CallLog::default();
    let speaker = RecordingSpeaker { log: spoken.clone() };

    Daemon::from_parts(t.router, Box::new(speaker), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert!(spoken.calls().is_empty());
    assert_eq!(
        t.calls.commands.calls(),
        vec!["ls".to_string(), "pwd".to_string()]
    );
}
