//! 日志管道端到端测试

use async_trait::async_trait;
use relay_log::transports::TransportResult;
use relay_log::{
    LevelDefinition, LevelProfile, LevelRegistry, LogEntry, LogManager, Rank, RelayLayer,
    RelayLogError, StandardLevel, Transport, TransportError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing_subscriber::layer::SubscriberExt;

/// 记录所有收到条目的模拟传输
#[derive(Debug, Default)]
struct MockTransport {
    name: &'static str,
    entries: Mutex<Vec<LogEntry>>,
    outputs: AtomicUsize,
    closes: AtomicUsize,
    fail_close: bool,
}

impl MockTransport {
    fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.message.render(false))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn setup(&self) -> TransportResult<()> {
        Ok(())
    }

    fn output(&self, entry: &LogEntry, _rendered: &str, _rank: Rank) -> TransportResult<()> {
        self.outputs.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn flush(&self) -> TransportResult<()> {
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "close failed",
            )));
        }
        Ok(())
    }

    fn name(&self) -> String {
        self.name.to_string()
    }
}

fn scenario_levels() -> Vec<LevelDefinition> {
    vec![
        LevelDefinition::new("error", 0).flush_trigger(),
        LevelDefinition::new("warn", 1).warn_marker(),
        LevelDefinition::new("info", 2).default_level(),
    ]
}

#[tokio::test]
async fn test_queue_drains_in_fifo_order() {
    let manager = LogManager::default();
    let logger = manager.logger().unwrap();
    let mock = Arc::new(MockTransport::named("late"));
    manager.register_transport(mock.clone());

    for message in ["E1", "E2", "E3"] {
        logger.info().message(message).emit().unwrap();
    }
    assert!(mock.messages().is_empty());

    manager.start().await.unwrap();
    assert_eq!(mock.messages(), vec!["E1", "E2", "E3"]);
}

#[tokio::test]
async fn test_below_threshold_never_reaches_transport() {
    let manager = LogManager::default();
    manager.init(LevelProfile::Standard).unwrap();
    let mock = Arc::new(MockTransport::named("plain"));
    manager.add_transport(mock.clone()).await.unwrap();
    manager.start().await.unwrap();

    let result = manager
        .logger()
        .unwrap()
        .debug()
        .message("noise")
        .emit()
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(mock.outputs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_override_never_widens_visibility() {
    let manager = LogManager::default();
    manager.init(LevelProfile::Standard).unwrap();
    manager.set_threshold("DEBUG").unwrap();
    let pinned = Arc::new(MockTransport::named("pinned"));
    let id = manager.add_transport(pinned.clone()).await.unwrap();
    manager
        .set_transport_threshold(id, Some("ERROR".into()))
        .unwrap();
    manager.start().await.unwrap();

    let logger = manager.logger().unwrap();
    logger.warn().message("not for pinned").emit().unwrap();
    logger.error().message("for pinned").emit().unwrap();
    assert_eq!(pinned.messages(), vec!["for pinned"]);
}

#[tokio::test]
async fn test_stop_closes_every_transport() {
    let manager = LogManager::default();
    let failing = Arc::new(MockTransport {
        fail_close: true,
        ..MockTransport::named("failing")
    });
    let spy = Arc::new(MockTransport::named("spy"));
    manager.add_transport(failing.clone()).await.unwrap();
    manager.add_transport(spy.clone()).await.unwrap();
    manager.start().await.unwrap();

    match manager.stop().await {
        Err(RelayLogError::TransportIo(failure)) => assert_eq!(failure.transport, "failing"),
        other => panic!("expected a transport failure, got {:?}", other),
    }
    assert_eq!(failing.closes.load(Ordering::SeqCst), 1);
    assert_eq!(spy.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_flush_only_on_flush_levels() {
    let manager = LogManager::default();
    manager.init_with_levels(scenario_levels()).unwrap();
    let mock = Arc::new(MockTransport::named("mock"));
    manager.add_transport(mock.clone()).await.unwrap();
    manager.start().await.unwrap();
    let logger = manager.logger().unwrap();

    logger.at("warn").unwrap().message("w").emit().unwrap();
    assert_eq!(mock.messages(), vec!["w"]);
    assert_eq!(manager.stats().queue_flushes, 0);

    // 注册一个未就绪的传输，使后续条目进入队列
    let late = Arc::new(MockTransport::named("late"));
    let late_id = manager.register_transport(late.clone());
    logger.at("info").unwrap().message("queued").emit().unwrap();
    assert_eq!(manager.pending(), 1);

    manager.transport_manager().setup_transport(late_id).await.unwrap();
    logger.at("error").unwrap().message("e").emit().unwrap();

    assert_eq!(manager.pending(), 0);
    assert_eq!(mock.messages(), vec!["w", "queued", "e"]);
    assert_eq!(late.messages(), vec!["queued", "e"]);
    assert_eq!(manager.stats().queue_flushes, 1);
}

#[tokio::test]
async fn test_two_transports_warn_reaches_one() {
    let manager = LogManager::default();
    manager.init_with_levels(scenario_levels()).unwrap();
    let error_only = Arc::new(MockTransport::named("error-only"));
    let open = Arc::new(MockTransport::named("open"));
    let error_id = manager.add_transport(error_only.clone()).await.unwrap();
    manager.add_transport(open.clone()).await.unwrap();
    manager
        .set_transport_threshold(error_id, Some("error".into()))
        .unwrap();
    manager.start().await.unwrap();

    manager
        .logger()
        .unwrap()
        .at("warn")
        .unwrap()
        .message("careful")
        .emit()
        .unwrap();

    let total = error_only.outputs.load(Ordering::SeqCst) + open.outputs.load(Ordering::SeqCst);
    assert_eq!(total, 1);
    assert_eq!(open.messages(), vec!["careful"]);
}

#[tokio::test]
async fn test_emitter_context_is_immutable_snapshot() {
    let manager = LogManager::default();
    let mock = Arc::new(MockTransport::named("mock"));
    manager.add_transport(mock.clone()).await.unwrap();
    manager.start().await.unwrap();

    let logger = manager
        .logger()
        .unwrap()
        .child("api")
        .with_session("s-1")
        .with_request("r-1");
    let emitter = logger.emitter(StandardLevel::Info).unwrap();

    // 之后派生的日志器不影响已捕获的上下文
    let _other = logger.with_session("s-2").with_request("r-2").child("v2");
    emitter.emit("captured");

    let entries = mock.entries.lock().unwrap();
    assert_eq!(entries[0].sid.as_deref(), Some("s-1"));
    assert_eq!(entries[0].req_id.as_deref(), Some("r-1"));
    assert_eq!(entries[0].pkg.as_deref(), Some("api"));
}

#[tokio::test]
async fn test_concurrent_emitters_keep_per_thread_order() {
    let manager = Arc::new(LogManager::default());
    let mock = Arc::new(MockTransport::named("mock"));
    let logger = manager.logger().unwrap();
    manager.register_transport(mock.clone());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let logger = logger.with_session(format!("w{}", worker));
            thread::spawn(move || {
                for i in 0..50 {
                    logger.info().message(format!("{}", i)).emit().unwrap();
                }
            })
        })
        .collect();

    // 启动与并发提交交错进行
    manager.start().await.unwrap();
    for handle in handles {
        handle.join().unwrap();
    }
    manager.flush_queue();

    let entries = mock.entries.lock().unwrap();
    assert_eq!(entries.len(), 200);
    for worker in 0..4 {
        let sid = format!("w{}", worker);
        let sequence: Vec<u32> = entries
            .iter()
            .filter(|entry| entry.sid.as_deref() == Some(sid.as_str()))
            .map(|entry| entry.message.render(false).parse().unwrap())
            .collect();
        assert_eq!(sequence, (0..50).collect::<Vec<_>>());
    }
}

#[test]
fn test_alias_name_is_deterministic() {
    let registry = LevelRegistry::from_profile(LevelProfile::Standard).unwrap();
    let rank = registry.as_rank("critical").unwrap();
    let names: Vec<&str> = (0..20).map(|_| registry.as_name(rank).unwrap()).collect();
    assert!(names.iter().all(|name| *name == "FATAL"));

    for definition in registry.definitions() {
        let rank = registry.as_rank(definition.name.as_str()).unwrap();
        assert_eq!(registry.as_rank(registry.as_name(rank).unwrap()).unwrap(), rank);
    }
}

#[test]
fn test_unknown_level_propagates() {
    let manager = LogManager::default();
    manager.init_with_levels(scenario_levels()).unwrap();
    let logger = manager.logger().unwrap();

    assert!(matches!(
        logger.at("trace"),
        Err(RelayLogError::UnknownLevel(_))
    ));
    assert!(matches!(
        manager.emit(LogEntry::new("verbose", Rank(7), "x")),
        Err(RelayLogError::UnknownLevel(_))
    ));
}

#[test]
fn test_tracing_events_flow_through_layer() {
    tokio_test::block_on(async {
        let manager = Arc::new(LogManager::default());
        let mock = Arc::new(MockTransport::named("mock"));
        manager.add_transport(mock.clone()).await.unwrap();
        manager.start().await.unwrap();

        let subscriber = tracing_subscriber::registry()
            .with(RelayLayer::new(manager.clone()))
            .with(tracing_subscriber::fmt::layer().with_test_writer());

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "billing", invoice = 42, "charge failed");
            tracing::info!(target: "billing", "charge retried");
        });

        let entries = mock.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, "ERROR");
        assert_eq!(entries[0].data.as_ref().unwrap()["invoice"], 42);
        assert_eq!(entries[1].message.render(false), "charge retried");
    });
}
