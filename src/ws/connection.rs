//! One websocket connection: heartbeat, inbound parsing, outbound frames.

use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::ConnId;
use crate::protocol::{ClientMsg, ServerMsg};
use crate::state::AppState;
use crate::ws::hub::OutboundFrame;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(40);

pub async fn upgrade(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let conn_id = Uuid::new_v4();
    let session = WsConnection::new(conn_id, app_state.into_inner().as_ref().clone());
    ws::start(session, &req, stream)
}

pub struct WsConnection {
    conn_id: ConnId,
    state: AppState,
    last_heartbeat: Instant,
}

impl WsConnection {
    fn new(conn_id: ConnId, state: AppState) -> Self {
        Self {
            conn_id,
            state,
            last_heartbeat: Instant::now(),
        }
    }

    fn send_json(&self, ctx: &mut ws::WebsocketContext<Self>, msg: &ServerMsg) {
        match serde_json::to_string(msg) {
            Ok(payload) => ctx.text(payload),
            Err(err) => warn!(
                conn_id = %self.conn_id,
                error = %err,
                "failed to serialize outbound message"
            ),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |actor, ctx| {
            if Instant::now().duration_since(actor.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(conn_id = %actor.conn_id, "websocket heartbeat timed out");
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Normal)));
                ctx.stop();
                return;
            }
            ctx.ping(b"keepalive");
        });
    }
}

impl Actor for WsConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(conn_id = %self.conn_id, "websocket session started");
        self.state
            .hub
            .register(self.conn_id, ctx.address().recipient());
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.state.hub.unregister(self.conn_id);
        self.state.server.handle_disconnect(self.conn_id);
        info!(conn_id = %self.conn_id, "websocket session stopped");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();

                let parsed: Result<ClientMsg, _> = serde_json::from_str(&text);
                let Ok(event) = parsed else {
                    warn!(conn_id = %self.conn_id, "malformed inbound message");
                    self.send_json(
                        ctx,
                        &ServerMsg::Error {
                            message: "Malformed message".into(),
                        },
                    );
                    return;
                };

                if let Err(err) = self.state.server.handle_message(self.conn_id, event) {
                    // Only programmer errors surface here: log and close.
                    error!(conn_id = %self.conn_id, error = %err, "fatal core error");
                    ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
                    ctx.stop();
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.last_heartbeat = Instant::now();
                self.send_json(
                    ctx,
                    &ServerMsg::Error {
                        message: "Binary not supported".into(),
                    },
                );
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {
                self.last_heartbeat = Instant::now();
            }
            Err(err) => {
                warn!(conn_id = %self.conn_id, error = %err, "websocket protocol error");
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
                ctx.stop();
            }
        }
    }
}

impl Handler<OutboundFrame> for WsConnection {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) -> Self::Result {
        self.send_json(ctx, &msg.0);
    }
}
