//! Closed tagged unions for the wire protocol.
//!
//! Inbound events use adjacent tagging (`{"type": ..., "data": ...}`) so
//! payloads stay well-typed; outbound events use internal tagging with
//! camelCase names, which is what clients switch on.

use serde::{Deserialize, Serialize};

use crate::domain::{Card, ConnId, PlayerId};
use crate::session::snapshot::ReconnectSnapshot;

/// Inbound, client → server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    CreateLobby(CreateLobbyPayload),
    JoinLobby(JoinLobbyPayload),
    PreviewReady,
    SetSequence(Vec<Card>),
    SwapCards(SwapPayload),
    SkipSwap,
    ContinueRound,
    LeaveLobby,
    PlayAgain,
    Reconnect(ReconnectPayload),
}

/// `createLobby` accepts either a bare name or the full object form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreateLobbyPayload {
    Name(String),
    #[serde(rename_all = "camelCase")]
    Full {
        player_name: String,
        #[serde(default)]
        player_id: Option<String>,
    },
}

impl CreateLobbyPayload {
    pub fn into_parts(self) -> (String, Option<String>) {
        match self {
            CreateLobbyPayload::Name(name) => (name, None),
            CreateLobbyPayload::Full {
                player_name,
                player_id,
            } => (player_name, player_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyPayload {
    pub lobby_id: String,
    pub player_name: String,
    #[serde(default)]
    pub player_id: Option<String>,
}

/// Positions are in the remaining-cards frame (0 = next card to play).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapPayload {
    pub pos1: i64,
    pub pos2: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPayload {
    pub lobby_id: String,
    pub player_id: String,
}

/// Outbound, server → client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    #[serde(rename_all = "camelCase")]
    LobbyCreated {
        lobby_id: String,
        player_id: PlayerId,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    LobbyJoined {
        lobby_id: String,
        player_id: PlayerId,
        name: String,
        players: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: PlayerId,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    CardsPreview {
        your_cards: Vec<Card>,
        opponent_cards: Vec<Card>,
        time_limit: u64,
    },
    PreviewTimerUpdate {
        remaining: u64,
    },
    OpponentPreviewReady,
    #[serde(rename_all = "camelCase")]
    GameStart {
        time_limit: u64,
    },
    SequenceConfirmed,
    #[serde(rename_all = "camelCase")]
    RoundStart {
        round: usize,
        time_limit: u64,
        your_cards: Vec<Card>,
        swaps_left: u8,
    },
    TimerUpdate {
        remaining: u64,
    },
    #[serde(rename_all = "camelCase")]
    SwapConfirmed {
        your_cards: Vec<Card>,
        swaps_left: u8,
    },
    SwapError {
        message: String,
    },
    SkipConfirmed,
    OpponentSwapped,
    #[serde(rename_all = "camelCase")]
    RoundResult {
        round: usize,
        your_card: Card,
        opponent_card: Card,
        winner_id: Option<PlayerId>,
        explanation: String,
        your_score: u8,
        opponent_score: u8,
    },
    ContinueCountdown {
        remaining: u64,
    },
    OpponentContinued,
    #[serde(rename_all = "camelCase")]
    GameEnd {
        your_score: u8,
        opponent_score: u8,
        winner_id: Option<PlayerId>,
        you_won: bool,
        by_disconnect: bool,
    },
    #[serde(rename_all = "camelCase")]
    OpponentDisconnected {
        reconnect_timeout: u64,
    },
    OpponentReconnected,
    OpponentLeft,
    GameResumed,
    Reconnected {
        snapshot: ReconnectSnapshot,
    },
    Error {
        message: String,
    },
}

/// Outbound delivery seam. The websocket hub implements this in
/// production; tests plug in a recording sink.
pub trait EventSink: Send + Sync {
    fn send(&self, conn: ConnId, event: ServerMsg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_msgs_parse_from_the_wire() {
        let create: ClientMsg =
            serde_json::from_str(r#"{"type":"createLobby","data":"Alice"}"#).unwrap();
        assert!(matches!(
            create,
            ClientMsg::CreateLobby(CreateLobbyPayload::Name(_))
        ));

        let create_full: ClientMsg = serde_json::from_str(
            r#"{"type":"createLobby","data":{"playerName":"Bob","playerId":"player_ab_12"}}"#,
        )
        .unwrap();
        match create_full {
            ClientMsg::CreateLobby(payload) => {
                let (name, id) = payload.into_parts();
                assert_eq!(name, "Bob");
                assert_eq!(id.as_deref(), Some("player_ab_12"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let join: ClientMsg = serde_json::from_str(
            r#"{"type":"joinLobby","data":{"lobbyId":"ABCDEF","playerName":"Eve"}}"#,
        )
        .unwrap();
        assert!(matches!(join, ClientMsg::JoinLobby(_)));

        let ready: ClientMsg = serde_json::from_str(r#"{"type":"previewReady"}"#).unwrap();
        assert!(matches!(ready, ClientMsg::PreviewReady));

        let swap: ClientMsg =
            serde_json::from_str(r#"{"type":"swapCards","data":{"pos1":0,"pos2":1}}"#).unwrap();
        match swap {
            ClientMsg::SwapCards(p) => {
                assert_eq!((p.pos1, p.pos2), (0, 1));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"dropTables"}"#).is_err());
    }

    #[test]
    fn server_msgs_are_internally_tagged_camel_case() {
        let json = serde_json::to_string(&ServerMsg::OpponentDisconnected {
            reconnect_timeout: 118,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"opponentDisconnected","reconnectTimeout":118}"#
        );

        let json = serde_json::to_string(&ServerMsg::OpponentContinued).unwrap();
        assert_eq!(json, r#"{"type":"opponentContinued"}"#);
    }
}
