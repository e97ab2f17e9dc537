//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - e2e 测试：source → distributor → 线程池 target → 本地 TCP/UDP 接收端
//! - 配置文件 → distributor 的完整路径

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(contracts::DisconnectCode::default(), contracts::DisconnectCode::SHUTDOWN);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Read;
    use std::net::{TcpListener, UdpSocket};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DistributionSource, DistributionTarget};
    use distributor::{
        create_distributor, DistributorBuilder, DistributorConfig, DistributorState,
        GraphiteTarget, TcpTarget, UdpTarget, WorkerPoolConfig,
    };
    use ingestion::{ChannelSource, TcpLineSource};

    const ALERT: &str = r#"{"name":"S","symbol":"EX:SYM","direction":"buy","price":1.5,"timestamp":"2024-01-01T00:00:00Z"}"#;

    fn config() -> DistributorConfig {
        DistributorConfig {
            pacing_delay: Duration::ZERO,
            queue_capacity: 64,
            ..Default::default()
        }
    }

    /// Accept one connection and read until the peer closes it
    fn tcp_receiver() -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).unwrap();
            received
        });
        (addr, handle)
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// ChannelSource → Distributor → pooled TCP target (one worker)
    ///
    /// 单线程池保证按提交顺序完成。
    #[tokio::test]
    async fn test_e2e_tcp_target_preserves_order_with_single_worker() {
        let (addr, receiver) = tcp_receiver();
        let source = Arc::new(ChannelSource::new("alerts"));
        let target = Arc::new(TcpTarget::tcp("tcp", addr, WorkerPoolConfig::new(1)));

        let distributor = DistributorBuilder::new(config())
            .source(source.clone())
            .target(target.clone())
            .build()
            .unwrap();
        distributor.connect().await.unwrap();

        let run = distributor.run_until(async {
            for line in ["one\n", "two\n", "three\n"] {
                assert!(source.push(line));
            }
            wait_until(|| target.pool().stats().completed == 3).await;
        });
        run.await.unwrap();

        assert_eq!(distributor.state(), DistributorState::Idle);
        assert_eq!(receiver.join().unwrap(), "one\ntwo\nthree\n");

        let outcomes = target.outcome_stats().unwrap();
        assert_eq!(outcomes.submitted, 3);
        assert_eq!(outcomes.completed, 3);
        assert_eq!(outcomes.pending(), 0);
    }

    /// TcpLineSource → Distributor → Graphite target
    #[tokio::test]
    async fn test_e2e_line_source_to_graphite() {
        let (addr, receiver) = tcp_receiver();
        let source = Arc::new(TcpLineSource::new("lines", "127.0.0.1:0"));
        let target = Arc::new(GraphiteTarget::alerts(
            "graphite",
            addr,
            Some("ns"),
            WorkerPoolConfig::new(2),
        ));

        let distributor = DistributorBuilder::new(config())
            .source(source.clone())
            .target(target.clone())
            .build()
            .unwrap();
        distributor.connect().await.unwrap();

        let source_addr = source.local_addr().unwrap();
        let run = distributor.run_until(async {
            let client = tokio::task::spawn_blocking(move || {
                use std::io::Write;
                let mut stream = std::net::TcpStream::connect(source_addr).unwrap();
                stream.write_all(format!("{ALERT}\r\n").as_bytes()).unwrap();
            });
            client.await.unwrap();
            wait_until(|| target.pool().stats().resolved() == 1).await;
        });
        run.await.unwrap();

        assert!(!source.is_open());
        assert_eq!(
            receiver.join().unwrap(),
            "ns.S.EX.SYM.direction 1 1704067200\nns.S.EX.SYM.price 1.5 1704067200\n"
        );
        assert_eq!(target.pool().stats().completed, 1);
    }

    /// 格式化失败只影响该任务，distributor 继续工作
    #[tokio::test]
    async fn test_e2e_malformed_alert_is_errored_not_fatal() {
        let (addr, receiver) = tcp_receiver();
        let source = Arc::new(ChannelSource::new("alerts"));
        let target = Arc::new(GraphiteTarget::alerts("graphite", addr, None, WorkerPoolConfig::new(1)));

        let distributor = DistributorBuilder::new(config())
            .source(source.clone())
            .target(target.clone())
            .build()
            .unwrap();
        distributor.connect().await.unwrap();

        distributor
            .run_until(async {
                source.push("not json");
                source.push(ALERT);
                wait_until(|| target.pool().stats().resolved() == 2).await;
            })
            .await
            .unwrap();

        let outcomes = target.pool().stats();
        assert_eq!(outcomes.errored, 1);
        assert_eq!(outcomes.completed, 1);
        assert!(receiver.join().unwrap().starts_with("tvt_agents.S.EX.SYM.direction 1 "));
    }

    /// 同一条消息按注册顺序投递到每个 target
    #[tokio::test]
    async fn test_e2e_fan_out_to_tcp_and_udp() {
        let (tcp_addr, tcp_receiver) = tcp_receiver();
        let udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        udp.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let udp_addr = udp.local_addr().unwrap().to_string();

        let source = Arc::new(ChannelSource::new("alerts"));
        let tcp = Arc::new(TcpTarget::tcp("tcp", tcp_addr, WorkerPoolConfig::new(2)));
        let udp_target = Arc::new(UdpTarget::udp("udp", udp_addr, WorkerPoolConfig::new(2)));

        let distributor = DistributorBuilder::new(config())
            .source(source.clone())
            .target(tcp.clone())
            .target(udp_target.clone())
            .build()
            .unwrap();
        distributor.connect().await.unwrap();

        distributor
            .run_until(async {
                source.push("fan-out");
                wait_until(|| {
                    tcp.pool().stats().completed == 1 && udp_target.pool().stats().completed == 1
                })
                .await;
            })
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let n = udp.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"fan-out");
        assert_eq!(tcp_receiver.join().unwrap(), "fan-out");

        let stats = distributor.stats();
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.delivery_failures, 0);
    }

    /// 关闭时队列中剩余的消息会先被投递
    #[tokio::test]
    async fn test_e2e_shutdown_flushes_queue() {
        let (addr, receiver) = tcp_receiver();
        let source = Arc::new(ChannelSource::new("alerts"));
        let target = Arc::new(TcpTarget::tcp("tcp", addr, WorkerPoolConfig::new(1)));

        let distributor = DistributorBuilder::new(config())
            .source(source.clone())
            .target(target.clone())
            .build()
            .unwrap();
        distributor.connect().await.unwrap();

        // No run loop: everything pushed is still queued at shutdown
        for n in 0..5 {
            source.push(format!("{n};"));
        }
        wait_until(|| distributor.queue_len() == 5).await;
        distributor.shutdown().await.unwrap();

        assert_eq!(receiver.join().unwrap(), "0;1;2;3;4;");
        assert_eq!(target.pool().stats().completed, 5);
        assert_eq!(distributor.stats().queue_len, 0);
        assert!(!source.push("late"));
    }

    /// 配置文件 → ConfigLoader → create_distributor
    #[tokio::test]
    async fn test_e2e_config_to_distributor() {
        let (addr, receiver) = tcp_receiver();
        let toml = format!(
            r#"
[distributor]
queue_capacity = 8
delivery_timeout_ms = 1000

[[sources]]
name = "ignored-here"
source_type = "mock"
params = {{ count = "1" }}

[[targets]]
name = "debug"
target_type = "log"

[[targets]]
name = "graphite"
target_type = "graphite"
pool_size = 1
task_timeout_ms = 2000
params = {{ addr = "{addr}", format = "raw" }}
"#
        );
        let blueprint = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();

        let mut distributor =
            create_distributor(&blueprint.distributor, &blueprint.targets).unwrap();
        let source = Arc::new(ChannelSource::new("alerts"));
        distributor.add_source(source.clone()).unwrap();
        assert_eq!(distributor.target_count(), 2);
        assert_eq!(distributor.config().queue_capacity, 8);

        distributor.connect().await.unwrap();
        distributor
            .run_until(async {
                source.push("alerts.raw 1 1704067200");
                wait_until(|| distributor.stats().dispatched == 1).await;
            })
            .await
            .unwrap();

        assert_eq!(receiver.join().unwrap(), "alerts.raw 1 1704067200\n");

        let targets = distributor.target_stats();
        assert_eq!(targets[0].0, "debug");
        assert!(targets[0].1.is_none());
        assert_eq!(targets[1].1.unwrap().completed, 1);
    }

    /// 分发统计可以发布到 metrics facade
    #[tokio::test]
    async fn test_e2e_stats_publish() {
        let source = Arc::new(ChannelSource::new("alerts"));
        let distributor = DistributorBuilder::new(config())
            .source(source.clone())
            .target(Arc::new(distributor::LogTarget::new("debug")))
            .build()
            .unwrap();
        distributor.connect().await.unwrap();
        source.push("x");
        wait_until(|| distributor.queue_len() == 1).await;
        distributor.shutdown().await.unwrap();

        let stats = distributor.stats();
        assert_eq!(stats.dispatched, 1);
        observability::record_distributor_stats(&stats);
    }
}
