//! Tests for utility functions and logging

use parking_lot::Mutex;
use prometheus_task_engine::config::PoolOptions;
use prometheus_task_engine::core::ElasticPool;
use prometheus_task_engine::util::panic_message;
use std::io;
use std::panic;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn test_panic_message_from_formatted_payload() {
    let code = 7;
    let payload = panic::catch_unwind(|| panic!("code {code}")).unwrap_err();
    assert_eq!(panic_message(payload.as_ref()), "code 7");
}

#[test]
fn test_scoped_subscriber_sees_pool_events() {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let pool = ElasticPool::new(PoolOptions::new().with_worker_limit(2)).unwrap();
        pool.put(|_| {}).unwrap();
        pool.stop();
    });

    let text = capture.text();
    assert!(text.contains("ElasticPool initialized"));
    assert!(text.contains("Worker spawned"));
    assert!(text.contains("Elastic pool stopped"));
}
