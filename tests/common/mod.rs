//! Shared harness for integration tests: a recording event sink and
//! helpers to drive a two-player game through the public dispatch API.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use roshambo::domain::{Card, ConnId};
use roshambo::protocol::{
    ClientMsg, CreateLobbyPayload, EventSink, JoinLobbyPayload, ServerMsg,
};
use roshambo::GameServer;
use uuid::Uuid;

/// Captures every outbound event so tests can assert on delivery order.
#[derive(Default)]
pub struct TestSink {
    events: Mutex<Vec<(ConnId, ServerMsg)>>,
}

impl TestSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<(ConnId, ServerMsg)> {
        self.events.lock().unwrap().clone()
    }

    pub fn for_conn(&self, conn: ConnId) -> Vec<ServerMsg> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == conn)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for TestSink {
    fn send(&self, conn: ConnId, event: ServerMsg) {
        self.events.lock().unwrap().push((conn, event));
    }
}

pub struct Duel {
    pub server: GameServer,
    pub sink: Arc<TestSink>,
    pub lobby_id: String,
    pub conns: [ConnId; 2],
    pub player_ids: [String; 2],
    pub hands: [Vec<Card>; 2],
}

pub fn new_server() -> (GameServer, Arc<TestSink>) {
    let sink = TestSink::new();
    let server = GameServer::new(sink.clone());
    (server, sink)
}

pub fn create_lobby(server: &GameServer, sink: &TestSink, conn: ConnId, name: &str) -> (String, String) {
    server
        .handle_message(
            conn,
            ClientMsg::CreateLobby(CreateLobbyPayload::Name(name.to_string())),
        )
        .expect("create lobby");
    let created = sink
        .for_conn(conn)
        .into_iter()
        .rev()
        .find_map(|e| match e {
            ServerMsg::LobbyCreated {
                lobby_id,
                player_id,
                ..
            } => Some((lobby_id, player_id)),
            _ => None,
        })
        .expect("lobbyCreated event");
    created
}

pub fn join_lobby(
    server: &GameServer,
    sink: &TestSink,
    conn: ConnId,
    lobby_id: &str,
    name: &str,
) -> String {
    server
        .handle_message(
            conn,
            ClientMsg::JoinLobby(JoinLobbyPayload {
                lobby_id: lobby_id.to_string(),
                player_name: name.to_string(),
                player_id: None,
            }),
        )
        .expect("join lobby");
    sink.for_conn(conn)
        .into_iter()
        .rev()
        .find_map(|e| match e {
            ServerMsg::LobbyJoined { player_id, .. } => Some(player_id),
            _ => None,
        })
        .expect("lobbyJoined event")
}

/// Latest preview hand delivered to a connection.
pub fn preview_hand(sink: &TestSink, conn: ConnId) -> Vec<Card> {
    sink.for_conn(conn)
        .into_iter()
        .rev()
        .find_map(|e| match e {
            ServerMsg::CardsPreview { your_cards, .. } => Some(your_cards),
            _ => None,
        })
        .expect("cardsPreview event")
}

/// Create a lobby, seat a second player, and return the started duel.
pub fn start_duel(name1: &str, name2: &str) -> Duel {
    let (server, sink) = new_server();
    let conn1 = Uuid::new_v4();
    let conn2 = Uuid::new_v4();

    let (lobby_id, p1) = create_lobby(&server, &sink, conn1, name1);
    let p2 = join_lobby(&server, &sink, conn2, &lobby_id, name2);

    let hands = [preview_hand(&sink, conn1), preview_hand(&sink, conn2)];
    Duel {
        server,
        sink,
        lobby_id,
        conns: [conn1, conn2],
        player_ids: [p1, p2],
        hands,
    }
}

impl Duel {
    pub fn send(&self, idx: usize, msg: ClientMsg) {
        self.server
            .handle_message(self.conns[idx], msg)
            .expect("dispatch");
    }

    /// Both players acknowledge the preview.
    pub fn finish_preview(&self) {
        self.send(0, ClientMsg::PreviewReady);
        self.send(1, ClientMsg::PreviewReady);
    }

    /// Commit both hands in dealt order.
    pub fn commit_dealt_order(&self) {
        self.send(0, ClientMsg::SetSequence(self.hands[0].clone()));
        self.send(1, ClientMsg::SetSequence(self.hands[1].clone()));
    }

    pub fn events(&self, idx: usize) -> Vec<ServerMsg> {
        self.sink.for_conn(self.conns[idx])
    }

    pub fn last_game_end(&self, idx: usize) -> Option<ServerMsg> {
        self.events(idx)
            .into_iter()
            .rev()
            .find(|e| matches!(e, ServerMsg::GameEnd { .. }))
    }
}
