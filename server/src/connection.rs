use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_http::ws::Item;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use system::SessionId;

use crate::admission::{admit, Admission};
use crate::config::Config;
use crate::connection_tx::{Client, ConnectionEvent, ConnectionHandle, ConnectionRx, Frame, IncomingTx};
use crate::registry::SessionRegistry;

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    Admitting,
    Joined {
        session_id: SessionId,
        incoming: IncomingTx,
    },
    Closed,
}

/// A fragmented message being reassembled from continuation frames.
struct Fragments {
    binary: bool,
    buf: Vec<u8>,
}

struct ConnectionActor {
    state: ConnectionState,
    fragments: Option<Fragments>,
    handle: ConnectionHandle,
    rx: Option<ConnectionRx>,
    registry: SessionRegistry,
    config: Config,
}

impl ConnectionActor {
    fn new(registry: SessionRegistry, config: Config) -> Self {
        let (handle, rx) = ConnectionHandle::channel();
        Self {
            state: ConnectionState::Admitting,
            fragments: None,
            handle,
            rx: Some(rx),
            registry,
            config,
        }
    }

    fn ingress(&mut self, frame: Frame, ctx: &mut ws::WebsocketContext<Self>) {
        match &self.state {
            ConnectionState::Admitting => self.admit(frame),
            ConnectionState::Joined { incoming, .. } => {
                if incoming.send(frame).is_err() {
                    // session is gone
                    ctx.stop();
                }
            }
            ConnectionState::Closed => {}
        }
    }

    fn admit(&mut self, frame: Frame) {
        let first_message = match frame {
            Frame::Text(text) => text,
            Frame::Binary(bin) => match String::from_utf8(bin) {
                Ok(text) => text,
                Err(_) => return,
            },
        };
        let (client, incoming) = Client::new(self.handle.clone());
        match admit(
            &self.registry,
            &first_message,
            client,
            self.config.create_attempts,
        ) {
            Admission::Created(session) | Admission::Joined(session) => {
                self.state = ConnectionState::Joined {
                    session_id: session.id().clone(),
                    incoming,
                };
            }
            Admission::Pending => {
                log::debug!("Connection {} is still waiting for a session", self.handle.id());
            }
        }
    }

    fn continuation(&mut self, item: Item, ctx: &mut ws::WebsocketContext<Self>) {
        let (chunk, last) = match item {
            Item::FirstText(chunk) => {
                self.fragments = Some(Fragments {
                    binary: false,
                    buf: Vec::new(),
                });
                (chunk, false)
            }
            Item::FirstBinary(chunk) => {
                self.fragments = Some(Fragments {
                    binary: true,
                    buf: Vec::new(),
                });
                (chunk, false)
            }
            Item::Continue(chunk) => (chunk, false),
            Item::Last(chunk) => (chunk, true),
        };

        let fragments = match self.fragments.as_mut() {
            Some(fragments) => fragments,
            None => {
                log::debug!("Connection {} sent a stray continuation", self.handle.id());
                return;
            }
        };
        if fragments.buf.len() + chunk.len() > self.config.max_frame_size {
            log::warn!(
                "Connection {} dropped a fragmented message over {} bytes",
                self.handle.id(),
                self.config.max_frame_size
            );
            self.fragments = None;
            return;
        }
        fragments.buf.extend_from_slice(&chunk);
        if !last {
            return;
        }

        if let Some(Fragments { binary, buf }) = self.fragments.take() {
            log::debug!("Ingress reassembled size: {}", buf.len());
            let frame = if binary {
                Frame::Binary(buf)
            } else {
                match String::from_utf8(buf) {
                    Ok(text) => Frame::Text(text),
                    Err(_) => {
                        log::debug!("Connection {} sent invalid utf-8 text", self.handle.id());
                        return;
                    }
                }
            };
            self.ingress(frame, ctx);
        }
    }

    fn close(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        // dropping the incoming side makes the session see us leave
        self.state = ConnectionState::Closed;
        ctx.stop();
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let addr = ctx.address();
        if let Some(mut rx) = self.rx.take() {
            tokio::spawn(async move {
                log::debug!("connection green thread - started");
                while let Some(event) = rx.recv().await {
                    addr.do_send(ConnectionActorMessage(event));
                }
                log::debug!("connection green thread - terminated");
            });
        }

        if let Some(timeout) = self.config.admission_timeout {
            ctx.run_later(timeout, |act, ctx| {
                if let ConnectionState::Admitting = act.state {
                    log::info!("Connection {} never joined a session", act.handle.id());
                    ctx.close(Some(CloseReason {
                        code: CloseCode::Policy,
                        description: Some("no session".into()),
                    }));
                    act.close(ctx);
                }
            });
        }
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Joined { session_id, .. } = &self.state {
            log::info!("Connection {} leaving session {}", self.handle.id(), session_id);
        }
        self.state = ConnectionState::Closed;
        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => {
                log::debug!("Ingress text size: {}", text.len());
                self.ingress(Frame::Text(text.to_string()), ctx);
            }
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ingress binary size: {}", bin.len());
                self.ingress(Frame::Binary(bin.to_vec()), ctx);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                self.close(ctx);
            }
            Err(err) => {
                log::debug!("Connection {} protocol error: {}", self.handle.id(), err);
                self.close(ctx);
            }
            Ok(ws::Message::Continuation(item)) => self.continuation(item, ctx),
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Frame(Frame::Text(text)) => ctx.text(text),
            ConnectionEvent::Frame(Frame::Binary(bin)) => ctx.binary(bin),
            ConnectionEvent::Close => {
                ctx.close(None);
                self.close(ctx);
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    registry: web::Data<SessionRegistry>,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    let actor = ConnectionActor::new(registry.get_ref().clone(), config.get_ref().clone());
    ws::WsResponseBuilder::new(actor, &req, stream)
        .frame_size(config.max_frame_size)
        .start()
}
