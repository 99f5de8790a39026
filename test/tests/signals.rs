use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use tether_client::{ChannelError as ClientChannelError, ClientSignal, DirectoryError};
use tether_server::{
    shared::{ChannelId, Delivery, SessionId},
    ChannelError, RemoteSignal, Server, ServerConfig,
};
use tether_shared::LinkConditionerConfig;
use tether_test::{
    eventually, init_logging,
    test_services::{ChatLine, ScoreService},
    TestClient, TestServer, SETTLE,
};

fn start_score_server() -> TestServer {
    let mut server = Server::new(ServerConfig::default());
    server.add_service(ScoreService::new()).unwrap();
    TestServer::start(server).unwrap()
}

fn chat_of(client: &TestClient) -> ClientSignal<ChatLine> {
    client
        .handle
        .service(ScoreService::NAME)
        .unwrap()
        .signal::<ChatLine>("Chat")
        .unwrap()
}

fn line(from: u64, text: &str) -> ChatLine {
    ChatLine {
        from,
        text: text.to_string(),
    }
}

/// Connects a recording listener to a client's chat signal
fn record(signal: &ClientSignal<ChatLine>) -> Arc<Mutex<Vec<ChatLine>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    signal.connect(move |line| log.lock().push(line.clone()));
    seen
}

#[tokio::test]
async fn client_fire_reaches_server_listeners_with_its_session() {
    init_logging();

    let server = start_score_server();
    let service = server.handle.service::<ScoreService>().unwrap();
    let client = server.connect().await.unwrap();

    let chat = chat_of(&client);
    assert_eq!(chat.delivery(), Delivery::Reliable);
    assert_eq!(chat.channel(), &ChannelId::new(ScoreService::NAME, "Chat"));
    chat.fire(&line(0, "hello")).unwrap();
    chat.fire(&line(0, "again")).unwrap();

    assert!(eventually(SETTLE, || service.heard.lock().len() == 2).await);
    assert_eq!(
        *service.heard.lock(),
        vec![
            (client.session, line(0, "hello")),
            (client.session, line(0, "again"))
        ]
    );
}

#[tokio::test]
async fn server_fire_reaches_only_the_target() {
    init_logging();

    let server = start_score_server();
    let service = server.handle.service::<ScoreService>().unwrap();
    let first = server.connect().await.unwrap();
    let second = server.connect().await.unwrap();
    let first_seen = record(&chat_of(&first));
    let second_seen = record(&chat_of(&second));

    service.chat.fire(first.session, &line(1, "just you")).unwrap();
    service.chat.fire_all(&line(1, "everyone")).unwrap();

    assert!(eventually(SETTLE, || second_seen.lock().len() == 1).await);
    assert!(eventually(SETTLE, || first_seen.lock().len() == 2).await);
    assert_eq!(
        *first_seen.lock(),
        vec![line(1, "just you"), line(1, "everyone")]
    );
    assert_eq!(*second_seen.lock(), vec![line(1, "everyone")]);
}

#[tokio::test]
async fn fire_variants_select_their_targets() {
    init_logging();

    let server = start_score_server();
    let service = server.handle.service::<ScoreService>().unwrap();
    let clients = vec![
        server.connect().await.unwrap(),
        server.connect().await.unwrap(),
        server.connect().await.unwrap(),
    ];
    let seen: Vec<_> = clients.iter().map(|client| record(&chat_of(client))).collect();

    service
        .chat
        .fire_except(clients[0].session, &line(2, "except"))
        .unwrap();
    let last = clients[2].session;
    service
        .chat
        .fire_filter(|session| session == last, &line(2, "filter"))
        .unwrap();
    service
        .chat
        .fire_for([clients[0].session, clients[1].session], &line(2, "for"))
        .unwrap();
    // marks the end of the batch for every client
    service.chat.fire_all(&line(2, "done")).unwrap();

    for log in &seen {
        assert!(eventually(SETTLE, || log.lock().last() == Some(&line(2, "done"))).await);
    }
    let texts = |index: usize| -> Vec<String> {
        seen[index]
            .lock()
            .iter()
            .map(|line| line.text.clone())
            .collect()
    };
    assert_eq!(texts(0), vec!["for", "done"]);
    assert_eq!(texts(1), vec!["except", "for", "done"]);
    assert_eq!(texts(2), vec!["except", "filter", "done"]);
}

#[tokio::test]
async fn fire_to_unknown_session_fails_while_fire_for_skips_it() {
    init_logging();

    let server = start_score_server();
    let service = server.handle.service::<ScoreService>().unwrap();
    let client = server.connect().await.unwrap();
    let seen = record(&chat_of(&client));
    let stranger = SessionId::from_u64(9_999);

    assert_eq!(
        service.chat.fire(stranger, &line(3, "nobody")),
        Err(ChannelError::SessionNotConnected { session: stranger })
    );

    service
        .chat
        .fire_for([stranger, client.session], &line(3, "somebody"))
        .unwrap();
    assert!(eventually(SETTLE, || seen.lock().len() == 1).await);
}

#[tokio::test]
async fn unexposed_signal_cannot_fire() {
    init_logging();

    let signal = RemoteSignal::<u32>::new();
    assert_eq!(signal.channel(), None);
    assert_eq!(signal.fire_all(&1), Err(ChannelError::Unbound));
}

#[tokio::test]
async fn handles_are_checked_against_the_manifest() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();
    let service = client.handle.service(ScoreService::NAME).unwrap();

    assert!(matches!(
        service.signal::<u32>("Score"),
        Err(DirectoryError::WrongKind {
            expected: "Signal",
            found: "Property",
            ..
        })
    ));
    assert!(matches!(
        service.signal::<u32>("Missing"),
        Err(DirectoryError::UnknownChannel { .. })
    ));
    assert!(matches!(
        client.handle.service("MissingService"),
        Err(DirectoryError::UnknownService { .. })
    ));
}

#[tokio::test]
async fn client_fire_after_disconnect_reports_session_gone() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();
    let chat = chat_of(&client);

    server.disconnect(&client);
    tether_test::within(SETTLE, client.handle.closed()).await;

    assert_eq!(
        chat.fire(&line(4, "too late")),
        Err(ClientChannelError::SessionGone)
    );
}

#[tokio::test]
async fn unreliable_signal_arrives_on_a_lossless_link() {
    init_logging();

    let mut server = Server::new(ServerConfig::default());
    server.add_service(ScoreService::new()).unwrap();
    let server =
        TestServer::start_with(server, LinkConditionerConfig::new(Duration::from_millis(5), 0.0))
            .unwrap();
    let service = server.handle.service::<ScoreService>().unwrap();
    let client = server.connect().await.unwrap();

    let ping = client
        .handle
        .service(ScoreService::NAME)
        .unwrap()
        .signal::<u32>("Ping")
        .unwrap();
    assert_eq!(ping.delivery(), Delivery::Unreliable);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    ping.connect(move |value| log.lock().push(*value));

    for value in 0..10 {
        service.ping.fire(client.session, &value).unwrap();
    }
    assert!(eventually(SETTLE, || seen.lock().len() == 10).await);
}

#[tokio::test]
async fn lossy_link_drops_only_unreliable_traffic() {
    init_logging();

    let mut server = Server::new(ServerConfig::default());
    server.add_service(ScoreService::new()).unwrap();
    let server =
        TestServer::start_with(server, LinkConditionerConfig::new(Duration::ZERO, 1.0)).unwrap();
    let service = server.handle.service::<ScoreService>().unwrap();
    let client = server.connect().await.unwrap();
    let handle = client.handle.service(ScoreService::NAME).unwrap();

    let pings = Arc::new(Mutex::new(0usize));
    let counter = pings.clone();
    handle
        .signal::<u32>("Ping")
        .unwrap()
        .connect(move |_| *counter.lock() += 1);
    let chats = record(&handle.signal::<ChatLine>("Chat").unwrap());

    for value in 0..20 {
        service.ping.fire(client.session, &value).unwrap();
    }
    service.chat.fire(client.session, &line(5, "reliable")).unwrap();

    assert!(eventually(SETTLE, || chats.lock().len() == 1).await);
    assert_eq!(*pings.lock(), 0);
}
