use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use proptest::prelude::*;

use tether_server::{
    shared::{Delivery, SessionId},
    transport::PacketSender,
    Server, ServerConfig,
};
use tether_shared::{LinkConditionerConfig, Packet, TransportError};
use tether_test::{
    eventually,
    test_services::{ChatLine, ScoreService},
    TestServer, SETTLE,
};

// Property overrides

#[derive(Clone, Debug)]
enum Op {
    Set(u32),
    SetTop(u32),
    SetFor(usize, u32),
    ClearFor(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u32>().prop_map(Op::Set),
        any::<u32>().prop_map(Op::SetTop),
        (0..3usize, any::<u32>()).prop_map(|(session, value)| Op::SetFor(session, value)),
        (0..3usize).prop_map(Op::ClearFor),
    ]
}

/// Keeps the last Score value pushed to each session
#[derive(Clone, Default)]
struct LastPushed {
    values: Arc<Mutex<HashMap<SessionId, u32>>>,
}

impl PacketSender for LastPushed {
    fn send(
        &self,
        session: &SessionId,
        _delivery: Delivery,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if let Ok(Packet::Property { args, .. }) = Packet::from_bytes(payload) {
            if let Ok(value) = args.decode::<u32>() {
                self.values.lock().insert(*session, value);
            }
        }
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_session_is_last_told_its_effective_value(ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _entered = runtime.enter();

        let mut server = Server::new(ServerConfig::default());
        server.add_service(ScoreService::new()).unwrap();
        let pushed = LastPushed::default();
        let handle = server.start(pushed.clone()).unwrap();
        let service = handle.service::<ScoreService>().unwrap();

        let sessions: Vec<SessionId> = (1..=3).map(SessionId::from_u64).collect();
        for session in &sessions {
            handle.connect(*session).unwrap();
        }

        let mut top = 0u32;
        let mut overrides: HashMap<SessionId, u32> = HashMap::new();
        for op in ops {
            match op {
                Op::Set(value) => {
                    service.score.set(value).unwrap();
                    top = value;
                    overrides.clear();
                }
                Op::SetTop(value) => {
                    service.score.set_top(value).unwrap();
                    top = value;
                }
                Op::SetFor(index, value) => {
                    service.score.set_for(sessions[index], value).unwrap();
                    overrides.insert(sessions[index], value);
                }
                Op::ClearFor(index) => {
                    service.score.clear_for(sessions[index]).unwrap();
                    overrides.remove(&sessions[index]);
                }
            }

            prop_assert_eq!(service.score.get(), top);
            for session in &sessions {
                let expected = overrides.get(session).copied().unwrap_or(top);
                prop_assert_eq!(service.score.get_for(*session), expected);
                prop_assert_eq!(pushed.values.lock().get(session).copied(), Some(expected));
            }
        }
    }
}

// Lossy links

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn reliable_traffic_survives_any_loss_rate(
        loss in 0.0f32..=1.0,
        texts in prop::collection::vec("[a-z]{1,8}", 1..20),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (received, pings) = runtime.block_on(async {
            let mut server = Server::new(ServerConfig::default());
            server.add_service(ScoreService::new()).unwrap();
            let config = LinkConditionerConfig::new(Duration::from_millis(1), loss);
            let server = TestServer::start_with(server, config).unwrap();
            let service = server.handle.service::<ScoreService>().unwrap();
            let client = server.connect().await.unwrap();
            let handle = client.handle.service(ScoreService::NAME).unwrap();

            let received = Arc::new(Mutex::new(Vec::new()));
            let log = received.clone();
            handle
                .signal::<ChatLine>("Chat")
                .unwrap()
                .connect(move |line| log.lock().push(line.text.clone()));
            let pings = Arc::new(Mutex::new(0usize));
            let counter = pings.clone();
            handle
                .signal::<u32>("Ping")
                .unwrap()
                .connect(move |_| *counter.lock() += 1);

            for (index, text) in texts.iter().enumerate() {
                service.ping.fire(client.session, &(index as u32)).unwrap();
                let line = ChatLine { from: 0, text: text.clone() };
                service.chat.fire(client.session, &line).unwrap();
            }
            eventually(SETTLE, || received.lock().len() == texts.len()).await;

            let received = received.lock().clone();
            let pings = *pings.lock();
            (received, pings)
        });

        prop_assert_eq!(received, texts.clone());
        prop_assert!(pings <= texts.len());
    }
}
