//! engine 模块单元测试

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{bounded, unbounded};
use parking_lot::Mutex;

use crate::embed::{EnvError, Launcher, LoopEnv, LoopHost, StartConfig};
use crate::engine::{GuestEngine, LoopPump, ThreadedEngine, Wake};
use crate::runtime::activation::channel;
use crate::runtime::{LoopContext, LoopRef, NativeLoop, SignalMode};

fn wait_for_loops(
    host: &LoopHost,
    count: usize,
) -> Vec<LoopRef> {
    for _ in 0..5000 {
        let loops = host.registry().snapshot();
        if loops.len() >= count {
            return loops;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("{} loops never registered", count);
}

#[test]
fn test_pump_close_runs_hooks_newest_first() {
    let pump = LoopPump::with_native(NativeLoop::from_raw(0x100));
    let order = Arc::new(Mutex::new(Vec::new()));
    for index in 0..3 {
        let order = order.clone();
        pump.add_cleanup_hook(Box::new(move || order.lock().push(index)))
            .unwrap();
    }

    pump.close();
    pump.close();
    assert!(pump.is_closed());
    assert_eq!(*order.lock(), vec![2, 1, 0]);
}

#[test]
fn test_closed_pump_rejects_env_calls() {
    let pump = LoopPump::new();
    pump.close();

    assert_eq!(pump.native_loop(), Err(EnvError::LoopUnavailable));
    let (_handle, port) = channel("late", |_: &mut LoopContext| 0);
    assert_eq!(pump.attach_activation(port), Err(EnvError::Closing));
    assert_eq!(pump.add_cleanup_hook(Box::new(|| {})), Err(EnvError::Closing));
}

#[test]
fn test_pump_native_handles_are_unique() {
    let a = LoopPump::new();
    let b = LoopPump::new();
    assert_ne!(a.native(), b.native());
    assert_eq!(a.native_loop(), Ok(a.native()));
}

#[test]
fn test_pump_wait_reports_source() {
    let pump = LoopPump::new();
    let (handle, port) = channel("wait", |_: &mut LoopContext| 0);
    pump.attach_activation(port).unwrap();
    let (stop_tx, stop_rx) = bounded::<()>(1);

    handle.signal(SignalMode::NonBlocking);
    assert_eq!(pump.wait(&stop_rx), Wake::Activation);

    let registry = crate::runtime::LoopRegistry::new();
    let mut cx = LoopContext::new(LoopRef::new(
        registry.next_id(),
        pump.native(),
        thread::current().id(),
    ));
    pump.run_pending(&mut cx);

    stop_tx.send(()).unwrap();
    assert_eq!(pump.wait(&stop_rx), Wake::Stop);
}

#[test]
fn test_pump_drops_ports_with_dead_handles() {
    let pump = LoopPump::new();
    let (handle, port) = channel("dead", |_: &mut LoopContext| 0);
    pump.attach_activation(port).unwrap();
    assert_eq!(pump.port_count(), 1);

    drop(handle);
    let registry = crate::runtime::LoopRegistry::new();
    let mut cx = LoopContext::new(LoopRef::new(
        registry.next_id(),
        pump.native(),
        thread::current().id(),
    ));
    assert_eq!(pump.run_pending(&mut cx), 0);
    assert_eq!(pump.port_count(), 0);
}

#[test]
fn test_closure_engine() {
    let engine = |argv: &[String]| argv.len() as i32;
    assert_eq!(GuestEngine::launch(&engine, &["a".to_string()]), 1);
}

#[test]
fn test_work_runs_on_loop_thread() {
    let host = LoopHost::new();
    let launcher = Launcher::new(Arc::new(ThreadedEngine::new(host.clone())));
    launcher.start(&StartConfig::default()).unwrap();

    let main = wait_for_loops(&host, 1)[0];
    assert_ne!(main.thread_id(), thread::current().id());

    let (seen_tx, seen_rx) = unbounded();
    host.enqueue_on_main(move |cx: &mut LoopContext| {
        let current = thread::current();
        let _ = seen_tx.send((
            current.id(),
            current.name().map(str::to_string),
            *cx.loop_ref(),
        ));
        cx.request_stop();
    })
    .unwrap();

    let (thread_id, name, loop_ref) = seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(thread_id, main.thread_id());
    assert_eq!(name.as_deref(), Some("guestloop-loop-0"));
    assert_eq!(loop_ref, main);

    assert!(launcher.wait());
    assert!(host.registry().is_empty());
}

#[test]
fn test_worker_loops_run_on_their_own_threads() {
    let host = LoopHost::new();
    let engine = ThreadedEngine::new(host.clone()).with_worker_loops(2);
    assert_eq!(engine.worker_loops(), 2);
    let launcher = Launcher::new(Arc::new(engine));
    launcher.start(&StartConfig::default()).unwrap();

    let loops = wait_for_loops(&host, 3);
    assert_eq!(host.registry().main_loop(), Some(loops[0]));

    let ran = Arc::new(AtomicUsize::new(0));
    let (seen_tx, seen_rx) = unbounded();
    for loop_ref in &loops[1..] {
        let ran = ran.clone();
        let seen_tx = seen_tx.clone();
        host.enqueue_on_loop(loop_ref, move |cx: &mut LoopContext| {
            ran.fetch_add(1, Ordering::SeqCst);
            let _ = seen_tx.send((cx.thread_id(), thread::current().id()));
        })
        .unwrap();
    }
    for _ in 1..loops.len() {
        let (expected, actual) = seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(expected, actual);
    }
    assert_eq!(ran.load(Ordering::SeqCst), 2);

    let threads: HashSet<_> = loops.iter().map(|l| l.thread_id()).collect();
    assert_eq!(threads.len(), 3);

    host.enqueue_on_main(|cx: &mut LoopContext| cx.request_stop())
        .unwrap();
    assert!(launcher.wait());
    assert!(host.registry().is_empty());
}

#[test]
fn test_stopped_worker_leaves_main_running() {
    let host = LoopHost::new();
    let launcher = Launcher::new(Arc::new(
        ThreadedEngine::new(host.clone()).with_worker_loops(1),
    ));
    launcher.start(&StartConfig::default()).unwrap();

    let loops = wait_for_loops(&host, 2);
    host.enqueue_on_loop(&loops[1], |cx: &mut LoopContext| cx.request_stop())
        .unwrap();
    for _ in 0..5000 {
        if host.registry().len() == 1 {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(host.registry().snapshot(), vec![loops[0]]);
    assert!(launcher.is_running());

    host.enqueue_on_main(|cx: &mut LoopContext| cx.request_stop())
        .unwrap();
    assert!(launcher.wait());
}

#[test]
fn test_pump_wait_consumes_stop() {
    let pump = LoopPump::new();
    let (handle, port) = channel("stop", |_: &mut LoopContext| 0);
    pump.attach_activation(port).unwrap();
    let (stop_tx, stop_rx) = bounded::<()>(1);

    stop_tx.send(()).unwrap();
    assert_eq!(pump.wait(&stop_rx), Wake::Stop);
    assert!(stop_rx.is_empty());

    // Nothing left on the stop channel, so only the activation can wake us
    handle.signal(SignalMode::NonBlocking);
    assert_eq!(pump.wait(&stop_rx), Wake::Activation);

    drop(stop_tx);
    let registry = crate::runtime::LoopRegistry::new();
    let mut cx = LoopContext::new(LoopRef::new(
        registry.next_id(),
        pump.native(),
        thread::current().id(),
    ));
    pump.run_pending(&mut cx);
    assert_eq!(pump.wait(&stop_rx), Wake::Stop);
}
