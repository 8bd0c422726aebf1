use async_trait::async_trait;
use mbpoll_bus::{
    BusChannel, BusError, BusRegistry, ModbusTransport, Request, Response, RtuBusManager,
    SerialSettings, TcpEndpointConfig, TransportFactory,
};
use mbpoll_telemetry::endpoint_statistics;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Tally {
    connects: AtomicUsize,
    closes: AtomicUsize,
    in_flight: AtomicUsize,
    overlaps: AtomicUsize,
    transactions: AtomicUsize,
    fail_next_connect: AtomicBool,
}

struct MockTransport {
    tally: Arc<Tally>,
    connected: bool,
}

impl MockTransport {
    fn new(tally: Arc<Tally>) -> Self {
        Self {
            tally,
            connected: false,
        }
    }

    async fn enter(&self) -> Result<(), BusError> {
        if !self.connected {
            return Err(BusError::Connection("not connected".to_string()));
        }
        if self.tally.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.tally.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.tally.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.tally.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ModbusTransport for MockTransport {
    async fn connect(&mut self) -> Result<(), BusError> {
        if self.tally.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(BusError::Connection("port busy".to_string()));
        }
        self.tally.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) {
        if self.connected {
            self.tally.closes.fetch_add(1, Ordering::SeqCst);
            self.connected = false;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn read_coils(&mut self, _: u8, _: u16, count: u16) -> Result<Vec<bool>, BusError> {
        self.enter().await?;
        Ok(vec![true; usize::from(count)])
    }

    async fn read_discrete_inputs(
        &mut self,
        _: u8,
        _: u16,
        count: u16,
    ) -> Result<Vec<bool>, BusError> {
        self.enter().await?;
        Ok(vec![false; usize::from(count)])
    }

    async fn read_holding_registers(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, BusError> {
        self.enter().await?;
        Ok((0..count).map(|i| u16::from(unit) * 1000 + address + i).collect())
    }

    async fn read_input_registers(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, BusError> {
        self.read_holding_registers(unit, address, count).await
    }

    async fn write_register(&mut self, _: u8, _: u16, _: u16) -> Result<(), BusError> {
        self.enter().await?;
        Err(BusError::Exception("IllegalDataAddress".to_string()))
    }

    async fn write_registers(&mut self, _: u8, _: u16, _: &[u16]) -> Result<(), BusError> {
        self.enter().await
    }

    async fn write_coil(&mut self, _: u8, _: u16, _: bool) -> Result<(), BusError> {
        self.enter().await
    }

    async fn write_coils(&mut self, _: u8, _: u16, _: &[bool]) -> Result<(), BusError> {
        self.enter().await
    }
}

struct MockFactory {
    tally: Arc<Tally>,
}

impl TransportFactory for MockFactory {
    fn rtu(&self, _: &SerialSettings) -> Box<dyn ModbusTransport> {
        Box::new(MockTransport::new(self.tally.clone()))
    }

    fn tcp(&self, _: &TcpEndpointConfig) -> Box<dyn ModbusTransport> {
        Box::new(MockTransport::new(self.tally.clone()))
    }
}

fn registry() -> (BusRegistry, Arc<Tally>) {
    let tally = Arc::new(Tally::default());
    let registry = BusRegistry::with_factory(Arc::new(MockFactory {
        tally: tally.clone(),
    }));
    (registry, tally)
}

fn read(address: u16, count: u16) -> Request {
    Request::ReadHoldingRegisters { address, count }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transactions_on_one_port_never_overlap() {
    let (registry, tally) = registry();
    let settings = SerialSettings::new("/dev/ttyTEST0");
    let a: Arc<dyn BusChannel> = Arc::new(registry.rtu_channel(&settings, "a").expect("attach a"));
    let b: Arc<dyn BusChannel> = Arc::new(registry.rtu_channel(&settings, "b").expect("attach b"));

    let mut handles = Vec::new();
    for (unit, channel) in [(1u8, a.clone()), (2u8, b.clone())] {
        handles.push(tokio::spawn(async move {
            for i in 0..5 {
                let response = channel
                    .transact(unit, read(10 * i, 2))
                    .await
                    .expect("transact");
                assert_eq!(
                    response,
                    Response::Registers(vec![
                        u16::from(unit) * 1000 + 10 * i,
                        u16::from(unit) * 1000 + 10 * i + 1
                    ])
                );
            }
        }));
    }
    for handle in handles {
        handle.await.expect("task");
    }

    assert_eq!(tally.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(tally.transactions.load(Ordering::SeqCst), 10);
    assert_eq!(tally.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn last_detach_closes_port_once() {
    let (registry, tally) = registry();
    let settings = SerialSettings::new("/dev/ttyTEST1");
    let a = registry.rtu_channel(&settings, "a").expect("attach a");
    let b = registry.rtu_channel(&settings, "b").expect("attach b");
    let manager = registry.rtu_manager("/dev/ttyTEST1").expect("manager");
    assert_eq!(manager.user_count(), 2);

    a.transact(1, read(0, 1)).await.expect("transact");
    assert!(manager.is_open().await);
    assert_eq!(manager.users(), vec!["a".to_string(), "b".to_string()]);
    let stats = manager.statistics();
    assert_eq!(stats.tx_packets, 1);
    assert_eq!(stats.tx_bits, 8 * 8);
    assert_eq!(stats.rx_bits, (4 + 3) * 8);

    a.close().await;
    assert!(manager.is_open().await);
    assert_eq!(tally.closes.load(Ordering::SeqCst), 0);

    b.close().await;
    assert!(!manager.is_open().await);
    assert_eq!(tally.closes.load(Ordering::SeqCst), 1);

    // 重复 detach 无副作用
    b.close().await;
    assert_eq!(tally.closes.load(Ordering::SeqCst), 1);

    assert_eq!(registry.prune(), 1);
    assert!(registry.rtu_manager("/dev/ttyTEST1").is_none());
}

#[tokio::test]
async fn attach_is_idempotent_per_owner() {
    let (registry, _) = registry();
    let settings = SerialSettings::new("/dev/ttyTEST2");
    let _first = registry.rtu_channel(&settings, "a").expect("attach");
    let _again = registry.rtu_channel(&settings, "a").expect("attach again");
    let manager = registry.rtu_manager("/dev/ttyTEST2").expect("manager");
    assert_eq!(manager.user_count(), 1);
    assert!(manager.has_user("a"));
}

#[tokio::test]
async fn mismatched_serial_settings_are_rejected() {
    let (registry, _) = registry();
    let settings = SerialSettings::new("/dev/ttyTEST3");
    let _a = registry.rtu_channel(&settings, "a").expect("attach a");

    let mut other = settings.clone();
    other.baud_rate = 19200;
    let err = registry
        .rtu_channel(&other, "b")
        .err()
        .expect("mismatch must fail");
    assert!(matches!(err, BusError::ConfigMismatch { .. }));

    let manager = registry.rtu_manager("/dev/ttyTEST3").expect("manager");
    assert_eq!(manager.user_count(), 1);
    assert!(!manager.has_user("b"));
}

#[tokio::test]
async fn connect_failure_surfaces_and_next_execute_retries() {
    let tally = Arc::new(Tally::default());
    tally.fail_next_connect.store(true, Ordering::SeqCst);
    let manager = RtuBusManager::with_transport(
        SerialSettings::new("/dev/ttyTEST4"),
        Box::new(MockTransport::new(tally.clone())),
    );

    let err = manager
        .execute(|t| Box::pin(async move { t.dispatch(1, &read(0, 1)).await }))
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::Connection(_)));
    assert!(!manager.is_open().await);

    let response = manager
        .execute(|t| Box::pin(async move { t.dispatch(1, &read(0, 1)).await }))
        .await
        .expect("retry");
    assert_eq!(response, Response::Registers(vec![1000]));
    assert_eq!(tally.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exception_keeps_bus_open() {
    let (registry, tally) = registry();
    let settings = SerialSettings::new("/dev/ttyTEST5");
    let channel = registry.rtu_channel(&settings, "a").expect("attach");

    let err = channel
        .transact(
            1,
            Request::WriteSingleRegister {
                address: 3,
                value: 7,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_exception());
    assert!(channel.manager().is_open().await);
    assert_eq!(tally.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tcp_endpoint_aggregates_traffic() {
    let (registry, tally) = registry();
    let config = TcpEndpointConfig::new("10.9.8.7", 1502);
    let a = registry.tcp_channel(&config, "a");
    let b = registry.tcp_channel(&config, "b");

    a.transact(1, read(10, 6)).await.expect("a");
    b.transact(2, read(0, 1)).await.expect("b");
    // 每个设备独立连接
    assert_eq!(tally.connects.load(Ordering::SeqCst), 2);

    let manager = registry.tcp_manager("10.9.8.7:1502").expect("manager");
    let stats = manager.statistics();
    assert_eq!(stats.tx_packets, 2);
    assert_eq!(stats.rx_packets, 2);
    assert_eq!(stats.tx_bits, (12 + 12) * 8);
    assert_eq!(stats.rx_bits, ((8 + 13) + (8 + 3)) * 8);

    let totals = endpoint_statistics().get("10.9.8.7:1502");
    assert_eq!(totals.transactions, 2);
    assert_eq!(totals.sent_bytes, 24);

    a.close().await;
    assert_eq!(manager.user_count(), 1);
    b.close().await;
    assert_eq!(manager.user_count(), 0);
    assert_eq!(registry.prune(), 1);
}
