use mbpoll_bus::{ModbusTransport, TcpEndpointConfig, TokioModbusTransport};
use std::time::Duration;

#[tokio::test]
async fn cancelled_transaction_discards_connection() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    // 接受连接但从不应答
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let mut config = TcpEndpointConfig::new("127.0.0.1", port);
    config.timeout_ms = 2000;
    let mut transport = TokioModbusTransport::tcp(config);
    transport.connect().await.expect("connect");
    assert!(transport.is_connected());

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        transport.read_holding_registers(1, 0, 2),
    )
    .await;
    assert!(cancelled.is_err());
    // 请求已发出，迟到的响应可能错配给下一次事务
    assert!(!transport.is_connected());

    server.abort();
}

#[tokio::test]
async fn unconnected_transport_rejects_transactions() {
    let mut transport = TokioModbusTransport::tcp(TcpEndpointConfig::new("127.0.0.1", 1));
    assert!(!transport.is_connected());
    let err = transport
        .read_holding_registers(1, 0, 1)
        .await
        .expect_err("no connection");
    assert!(matches!(err, mbpoll_bus::BusError::Connection(_)));
    assert!(!transport.is_connected());
}
