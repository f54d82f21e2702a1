//! Launcher behaviour through the public API.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{bounded, unbounded};
use guestloop::embed::{EmbedError, EventMessenger, UnimplementedMessenger};
use guestloop::util::config::HostConfig;
use guestloop::{Launcher, LoopContext, LoopHost, LoopPump, StartConfig, ThreadedEngine};

#[test]
fn test_start_twice_reports_already_started() {
    let embedding = guestloop::start(&HostConfig::default()).unwrap();
    assert!(embedding.launcher.is_running());
    assert!(matches!(
        embedding.launcher.start(&StartConfig::default()),
        Err(EmbedError::AlreadyStarted)
    ));

    embedding
        .host
        .enqueue_on_main(|cx: &mut LoopContext| cx.request_stop())
        .unwrap();
    assert!(embedding.launcher.wait());
    assert!(embedding.host.registry().is_empty());
}

#[test]
fn test_engine_that_exits_early() {
    let host = LoopHost::new();
    let launcher = Launcher::new(Arc::new(|_: &[String]| 2));
    launcher.start(&StartConfig::default()).unwrap();

    let err = guestloop::wait_for_main_loop(&host, &launcher, Duration::from_secs(5))
        .unwrap_err();
    assert!(err.to_string().contains("exited"));
}

#[test]
fn test_wait_for_main_loop_times_out() {
    let host = LoopHost::new();
    let (release_tx, release_rx) = bounded::<()>(0);
    let launcher = Launcher::new(Arc::new(move |_: &[String]| {
        let _ = release_rx.recv();
        0
    }));
    launcher.start(&StartConfig::default()).unwrap();

    let err = guestloop::wait_for_main_loop(&host, &launcher, Duration::from_millis(20))
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));

    release_tx.send(()).unwrap();
    assert!(launcher.wait());
}

#[test]
fn test_wait_for_main_loop_sees_late_registration() {
    let host = LoopHost::new();
    let engine_host = host.clone();
    let (started_tx, started_rx) = unbounded();
    let (release_tx, release_rx) = bounded::<()>(0);
    let launcher = Launcher::new(Arc::new(move |_: &[String]| {
        std::thread::sleep(Duration::from_millis(50));
        let pump = LoopPump::new();
        let main = engine_host.on_loop_start(&pump).unwrap();
        let _ = started_tx.send(main);
        let _ = release_rx.recv();
        pump.close();
        0
    }));
    launcher.start(&StartConfig::default()).unwrap();

    let main = guestloop::wait_for_main_loop(&host, &launcher, Duration::from_secs(5)).unwrap();
    assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), main);

    release_tx.send(()).unwrap();
    assert!(launcher.wait());
    assert!(host.registry().is_empty());
}

#[test]
fn test_wait_for_main_loop_without_launch() {
    let host = LoopHost::new();
    let launcher = Launcher::new(Arc::new(|_: &[String]| 0));
    let err = guestloop::wait_for_main_loop(&host, &launcher, Duration::from_secs(5))
        .unwrap_err();
    assert!(err.to_string().contains("not running"));
}

#[test]
fn test_restart_after_engine_exit() {
    let host = LoopHost::new();
    let launcher = Launcher::new(Arc::new(ThreadedEngine::new(host.clone())));

    for _ in 0..2 {
        launcher.start(&StartConfig::default()).unwrap();
        guestloop::wait_for_main_loop(&host, &launcher, Duration::from_secs(5)).unwrap();
        host.enqueue_on_main(|cx: &mut LoopContext| cx.request_stop())
            .unwrap();
        assert!(launcher.wait());
        assert!(host.registry().is_empty());
    }
}

#[test]
fn test_messaging_is_not_available() {
    let messenger = UnimplementedMessenger;
    assert!(matches!(
        messenger.send("ping", serde_json::Value::Null),
        Err(EmbedError::MessagingUnavailable { .. })
    ));
}
