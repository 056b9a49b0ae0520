use cadenza::{Metric, SendHandle, StatsdClient};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(5);

/// Send a counter and a gauge from each thread, `iterations` times, returning
/// every handle so callers can check they all resolved.
#[allow(dead_code)]
pub fn run_arc_threaded_test(client: Arc<StatsdClient>, num_threads: u64, iterations: u64) -> Vec<SendHandle> {
    let threads: Vec<_> = (0..num_threads)
        .map(|_| {
            let local_client = Arc::clone(&client);

            thread::spawn(move || {
                let mut handles = Vec::new();
                for i in 0..iterations {
                    handles.push(local_client.send(Metric::count("some.counter", 1)));
                    handles.push(local_client.send(Metric::gauge("some.gauge", i)));
                }
                handles
            })
        })
        .collect();

    threads.into_iter().flat_map(|t| t.join().unwrap()).collect()
}

#[allow(dead_code)]
pub fn assert_all_ok(handles: &[SendHandle]) {
    for h in handles {
        match h.wait_timeout(WAIT) {
            Some(Ok(())) => {}
            Some(Err(e)) => panic!("send failed: {}", e),
            None => panic!("send was not resolved within {:?}", WAIT),
        }
    }
}
