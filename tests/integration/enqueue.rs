//! Cross-thread enqueue through a running engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::unbounded;
use guestloop::util::config::HostConfig;
use guestloop::LoopContext;
use parking_lot::Mutex;

#[test]
fn test_producers_reach_main_loop_in_order() {
    const PRODUCERS: usize = 4;
    const ITEMS: usize = 250;

    let embedding = guestloop::start(&HostConfig::default()).unwrap();
    let main = embedding.host.registry().main_loop().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let host = embedding.host.clone();
            let seen = seen.clone();
            thread::spawn(move || {
                for item in 0..ITEMS {
                    let seen = seen.clone();
                    host.enqueue_on_loop(&main, move |cx: &mut LoopContext| {
                        assert_eq!(cx.thread_id(), thread::current().id());
                        seen.lock().push((producer, item));
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let (done_tx, done_rx) = unbounded();
    embedding
        .host
        .enqueue_on_main(move |cx: &mut LoopContext| {
            let _ = done_tx.send(());
            cx.request_stop();
        })
        .unwrap();
    done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(embedding.launcher.wait());

    let seen = seen.lock();
    assert_eq!(seen.len(), PRODUCERS * ITEMS);
    let mut next: HashMap<usize, usize> = HashMap::new();
    for &(producer, item) in seen.iter() {
        let expected = next.entry(producer).or_insert(0);
        assert_eq!(item, *expected);
        *expected += 1;
    }
}

#[test]
fn test_work_can_fan_out_to_workers() {
    let config = HostConfig {
        worker_loops: 2,
        ..HostConfig::default()
    };
    let embedding = guestloop::start(&config).unwrap();
    let host = embedding.host.clone();

    let mut loops = embedding.host.registry().snapshot();
    for _ in 0..5000 {
        if loops.len() == 3 {
            break;
        }
        thread::sleep(Duration::from_millis(1));
        loops = embedding.host.registry().snapshot();
    }
    assert_eq!(loops.len(), 3);

    // The main loop forwards one item to each worker
    let (seen_tx, seen_rx) = unbounded();
    let workers = loops[1..].to_vec();
    embedding
        .host
        .enqueue_on_main(move |_: &mut LoopContext| {
            for worker in &workers {
                let seen_tx = seen_tx.clone();
                host.enqueue_on_loop(worker, move |cx: &mut LoopContext| {
                    let _ = seen_tx.send(*cx.loop_ref());
                })
                .unwrap();
            }
        })
        .unwrap();

    let mut reached = vec![
        seen_rx.recv_timeout(Duration::from_secs(10)).unwrap(),
        seen_rx.recv_timeout(Duration::from_secs(10)).unwrap(),
    ];
    reached.sort_by_key(|loop_ref| loop_ref.id());
    assert_eq!(reached, loops[1..].to_vec());

    embedding
        .host
        .enqueue_on_main(|cx: &mut LoopContext| cx.request_stop())
        .unwrap();
    assert!(embedding.launcher.wait());
}
