//! WebSocket connections on a live relay server, driven by raw client sockets.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use block_relay::block::{codec, BlockProcessor};
use block_relay::config::ListenerConfig;
use block_relay::driver::Driver;
use block_relay::http::{RelayServer, CLOSE_TIMEOUT};

mod common;
use common::{block_args, engine, wait_until, within, RecordingObserver};

const LONG: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Relay {
    driver: Arc<Driver>,
    observer: Arc<RecordingObserver>,
    addr: String,
}

impl Relay {
    async fn start() -> Self {
        let listener = ListenerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let (engine, observer) = engine();
        let server = RelayServer::new(listener, engine.clone()).spawn().await.unwrap();
        let addr = server.local_addr().to_string();

        let driver = Driver::builder()
            .data_handler(Arc::new(BlockProcessor::new()))
            .engine(engine)
            .transport(Box::new(server))
            .build()
            .unwrap();
        Self {
            driver: Arc::new(driver),
            observer,
            addr,
        }
    }

    async fn connect(&self, route: &str) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}{}", self.addr, route))
            .await
            .unwrap();
        socket
    }

    /// Wait until the server has installed `count` connections in total.
    async fn installed(&self, count: u64) {
        let observer = self.observer.clone();
        assert!(
            wait_until(LONG, || RecordingObserver::count(&observer.replaced) >= count).await,
            "server never installed connection #{}",
            count
        );
    }

    fn save(&self, number: u64) -> tokio::task::JoinHandle<u64> {
        let driver = self.driver.clone();
        tokio::spawn(async move { driver.save_block(&block_args(number)).await.unwrap().attempts })
    }
}

/// Next data frame on `socket`, decoded, returning the block hash to ack with.
async fn next_block_hash(socket: &mut Socket) -> Vec<u8> {
    loop {
        match within(LONG, socket.next()).await {
            Some(Ok(Message::Binary(data))) => return codec::decode(&data).unwrap().block.hash,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("expected a block payload, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_new_ack_connection_takes_over_a_pending_read() {
    let relay = Relay::start().await;
    let mut blocks = relay.connect("/block").await;
    let _idle_acks = relay.connect("/acknowledge").await;
    relay.installed(2).await;

    let save = relay.save(7);
    let hash = next_block_hash(&mut blocks).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!save.is_finished(), "nothing has acknowledged yet");

    let mut acks = relay.connect("/acknowledge").await;
    acks.send(Message::Binary(hash.into())).await.unwrap();

    let attempts = within(LONG, save).await.unwrap();
    assert!(attempts >= 2);
    assert!(RecordingObserver::count(&relay.observer.read_failures) >= 1);

    within(LONG, relay.driver.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_reconnecting_consumer_while_old_sockets_stay_open() {
    let relay = Relay::start().await;
    let _old_blocks = relay.connect("/block").await;
    let _old_acks = relay.connect("/acknowledge").await;
    relay.installed(2).await;

    let save = relay.save(3);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!save.is_finished());

    let mut blocks = relay.connect("/block").await;
    relay.installed(3).await;
    let mut acks = relay.connect("/acknowledge").await;
    relay.installed(4).await;

    let hash = next_block_hash(&mut blocks).await;
    acks.send(Message::Binary(hash.into())).await.unwrap();

    within(LONG, save).await.unwrap();
    within(LONG, relay.driver.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_replacement_finishes_within_close_timeout() {
    let relay = Relay::start().await;
    let _blocks = relay.connect("/block").await;
    let _idle_acks = relay.connect("/acknowledge").await;
    relay.installed(2).await;

    let _save = relay.save(1);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = tokio::time::Instant::now();
    let _acks = relay.connect("/acknowledge").await;
    relay.installed(3).await;
    assert!(started.elapsed() < CLOSE_TIMEOUT + Duration::from_secs(1));

    let status = within(LONG, relay.driver.engine().status()).await;
    assert!(status.receiver_connected);

    within(LONG, relay.driver.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_ping_and_text_frames_never_acknowledge() {
    let relay = Relay::start().await;
    let mut blocks = relay.connect("/block").await;
    let mut acks = relay.connect("/acknowledge").await;
    relay.installed(2).await;

    acks.send(Message::Ping(b"hb".to_vec().into())).await.unwrap();
    acks.send(Message::text("not an ack")).await.unwrap();

    let save = relay.save(9);
    let first = next_block_hash(&mut blocks).await;
    let second = next_block_hash(&mut blocks).await;
    assert_eq!(first, second, "text frame must trigger a resend");

    acks.send(Message::Binary(first.into())).await.unwrap();

    let attempts = within(LONG, save).await.unwrap();
    assert_eq!(attempts, 2);
    assert_eq!(RecordingObserver::count(&relay.observer.mismatches), 1);
    assert_eq!(RecordingObserver::count(&relay.observer.read_failures), 0);

    within(LONG, relay.driver.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_block_route_answers_pings() {
    let relay = Relay::start().await;
    let mut blocks = relay.connect("/block").await;
    relay.installed(1).await;

    blocks.send(Message::Ping(b"hb".to_vec().into())).await.unwrap();

    match within(LONG, blocks.next()).await {
        Some(Ok(Message::Pong(data))) => assert_eq!(&data[..], b"hb"),
        other => panic!("expected a pong, got {:?}", other),
    }

    within(LONG, relay.driver.shutdown()).await.unwrap();
}
