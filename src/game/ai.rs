//! AI move provider: a random mover and a remote search engine client.
//!
//! Search mode talks to an external engine over HTTP or a WebSocket. The
//! remote service is untrusted: every reply is checked against the variant's
//! legal move set, and any failure degrades that call to a random move. The
//! first search request runs a connectivity self-test (plain, retry after a
//! second, then through the CORS proxy if one is configured); if all attempts
//! fail, search is disabled for the lifetime of the provider and the caller
//! gets a one-time notice to surface to the player.

use std::cell::{Cell, RefCell};
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;

use actix_rt::time::{sleep, timeout};
use awc::error::WsProtocolError;
use awc::ws;
use chess::Board;
use futures::channel::oneshot;
use futures::{Sink, SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::game::error::AiServiceError;
use crate::game::{piece_letter, variant, Move};
use crate::models::settings::AiStrength;

const FALLBACK_NOTICE: &str =
    "The chess engine is unreachable; switching to random moves for this session.";

/// Extra slack on top of the engine's thinking budget before a request is
/// abandoned.
const REPLY_GRACE_MS: u64 = 3_000;

/// After a socket engine's first reply, keep listening this long for an
/// improved line before committing to the latest one.
const IMPROVE_WINDOW_MS: u64 = 300;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EngineRequest {
    fen: String,
    max_thinking_time: u32,
    depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    searchmoves: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EngineReply {
    from: String,
    to: String,
    #[serde(default)]
    promotion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SocketReply {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    promotion: Option<String>,
}

/// What a move request produced: possibly a move, possibly a notice the
/// caller should show the player once.
pub struct AiMoveOutcome {
    pub mv: Option<Move>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchState {
    Untested,
    Ready,
    FallbackActive,
}

/// Cheaply clonable handle; all clones share the engine connection state, so
/// a failed self-test stays sticky for the connection that owns the provider.
#[derive(Clone)]
pub struct AiMoveProvider {
    inner: Rc<Inner>,
}

struct Inner {
    engine_url: RefCell<String>,
    uses_socket: bool,
    cors_proxy_url: Option<String>,
    ai_move_delay_ms: u64,
    max_thinking_time_ms: u32,
    search_depth: u32,
    state: Cell<SearchState>,
    socket: RefCell<Option<EngineSocket>>,
}

impl AiMoveProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                engine_url: RefCell::new(config.engine_url.clone()),
                uses_socket: config.engine_uses_socket,
                cors_proxy_url: config.cors_proxy_url.clone(),
                ai_move_delay_ms: config.ai_move_delay_ms,
                max_thinking_time_ms: config.max_thinking_time_ms,
                search_depth: config.search_depth,
                state: Cell::new(SearchState::Untested),
                socket: RefCell::new(None),
            }),
        }
    }

    /// Computes a move for the side to move on `board`. Never fails: search
    /// problems degrade to a random move and are reported via the notice.
    pub async fn get_move(&self, strength: AiStrength, board: Board, is_last: bool) -> AiMoveOutcome {
        match strength {
            AiStrength::Random => AiMoveOutcome {
                mv: self.random_move(board, is_last).await,
                notice: None,
            },
            AiStrength::Search => {
                let notice = self.ensure_ready().await;
                if self.inner.state.get() != SearchState::Ready {
                    return AiMoveOutcome {
                        mv: self.random_move(board, is_last).await,
                        notice,
                    };
                }
                match self.search_move(board, is_last).await {
                    Ok(mv) => AiMoveOutcome { mv: Some(mv), notice },
                    Err(e) => {
                        warn!("engine request failed ({}), playing a random move", e);
                        AiMoveOutcome {
                            mv: self.random_move(board, is_last).await,
                            notice,
                        }
                    }
                }
            }
        }
    }

    /// Picks a uniformly random variant-legal move after a short "thinking"
    /// pause.
    async fn random_move(&self, board: Board, is_last: bool) -> Option<Move> {
        let base = self.inner.ai_move_delay_ms.max(1);
        let pause = rand::thread_rng().gen_range(base..=base * 3);
        sleep(Duration::from_millis(pause)).await;
        let moves = variant::legal_moves(&board, is_last);
        if moves.is_empty() {
            return None;
        }
        let pick = rand::thread_rng().gen_range(0..moves.len());
        Some(Move::from_chess_move(moves[pick]))
    }

    /// Runs the one-time connectivity self-test. Returns the player-facing
    /// notice on the call that flips the provider into fallback mode.
    async fn ensure_ready(&self) -> Option<String> {
        if self.inner.state.get() != SearchState::Untested {
            return None;
        }
        if self.probe().await {
            self.inner.state.set(SearchState::Ready);
            return None;
        }
        sleep(Duration::from_secs(1)).await;
        if self.probe().await {
            self.inner.state.set(SearchState::Ready);
            return None;
        }
        if !self.inner.uses_socket {
            if let Some(proxy) = &self.inner.cors_proxy_url {
                let proxied = format!("{}{}", proxy, self.inner.engine_url.borrow());
                info!("retrying the engine through the proxy at {}", proxied);
                *self.inner.engine_url.borrow_mut() = proxied;
                if self.probe().await {
                    self.inner.state.set(SearchState::Ready);
                    return None;
                }
            }
        }
        warn!("engine self-test failed, search disabled for this session");
        self.inner.state.set(SearchState::FallbackActive);
        Some(FALLBACK_NOTICE.to_string())
    }

    async fn probe(&self) -> bool {
        if self.inner.uses_socket {
            match EngineSocket::connect(&self.inner.engine_url.borrow()).await {
                Ok(socket) => {
                    *self.inner.socket.borrow_mut() = Some(socket);
                    true
                }
                Err(e) => {
                    warn!("engine socket probe failed: {}", e);
                    false
                }
            }
        } else {
            let request = EngineRequest {
                fen: Board::default().to_string(),
                max_thinking_time: 1,
                depth: 1,
                searchmoves: None,
            };
            match self.post(&request).await {
                Ok(_) => true,
                Err(e) => {
                    warn!("engine probe failed: {}", e);
                    false
                }
            }
        }
    }

    async fn search_move(&self, board: Board, is_last: bool) -> Result<Move, AiServiceError> {
        let allowed = variant::legal_moves(&board, is_last);
        if allowed.is_empty() {
            return Err(AiServiceError::InvalidReply(
                "no legal moves to search".to_string(),
            ));
        }
        let request = self.engine_request(&board, is_last);
        let mv = if self.inner.uses_socket {
            let socket = self.inner.socket.borrow().clone();
            match socket {
                Some(socket) => {
                    socket
                        .request(&request, self.inner.max_thinking_time_ms as u64 + REPLY_GRACE_MS)
                        .await?
                }
                None => return Err(AiServiceError::Request("socket not connected".to_string())),
            }
        } else {
            let reply = self.post(&request).await?;
            Move::from_wire(&reply.from, &reply.to, reply.promotion.as_deref())
                .map_err(|e| AiServiceError::InvalidReply(e.to_string()))?
        };
        validate_reply(&allowed, mv)
    }

    /// A search request for `board`. The final move of a turn searches the
    /// full legal set; mid-turn the engine must be steered away from checking
    /// moves and non-queen promotions, so those requests carry an allowlist.
    fn engine_request(&self, board: &Board, is_last: bool) -> EngineRequest {
        EngineRequest {
            fen: board.to_string(),
            max_thinking_time: self.inner.max_thinking_time_ms,
            depth: self.inner.search_depth,
            searchmoves: if is_last {
                None
            } else {
                variant::san_allowlist(board, false)
            },
        }
    }

    async fn post(&self, request: &EngineRequest) -> Result<EngineReply, AiServiceError> {
        let url = self.inner.engine_url.borrow().clone();
        let mut response = awc::Client::default()
            .post(url)
            .send_json(request)
            .await
            .map_err(|e| AiServiceError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AiServiceError::Request(format!(
                "engine answered {}",
                response.status()
            )));
        }
        response
            .json::<EngineReply>()
            .await
            .map_err(|e| AiServiceError::InvalidReply(e.to_string()))
    }
}

/// Checks an engine reply against the variant-legal set and returns the
/// canonical legal move, normalizing a missing promotion piece to the queen.
fn validate_reply(allowed: &[chess::ChessMove], mv: Move) -> Result<Move, AiServiceError> {
    let mut candidates = allowed
        .iter()
        .filter(|m| m.get_source() == mv.from && m.get_dest() == mv.to);
    let chosen = match mv.promotion {
        Some(piece) => candidates.find(|m| m.get_promotion() == Some(piece)),
        None => candidates
            .clone()
            .find(|m| m.get_promotion().is_none())
            .or_else(|| candidates.find(|m| m.get_promotion() == Some(chess::Piece::Queen))),
    };
    match chosen {
        Some(&m) => Ok(Move::from_chess_move(m)),
        None => Err(AiServiceError::InvalidReply(format!(
            "move {}{}{} is not allowed here",
            mv.from,
            mv.to,
            mv.promotion.map(piece_letter).unwrap_or(' ')
        ))),
    }
}

/// A persistent WebSocket to the engine. One request may be in flight at a
/// time (the busy flag); the reader task stores every incoming move and the
/// last one wins, so progressive engine updates improve the final answer.
#[derive(Clone)]
struct EngineSocket {
    shared: Rc<SocketShared>,
}

struct SocketShared {
    sink: RefCell<Pin<Box<dyn Sink<ws::Message, Error = WsProtocolError>>>>,
    busy: Cell<bool>,
    latest: Rc<RefCell<Option<Move>>>,
    waker: Rc<RefCell<Option<oneshot::Sender<()>>>>,
}

impl EngineSocket {
    async fn connect(url: &str) -> Result<Self, AiServiceError> {
        let (_, framed) = awc::Client::new()
            .ws(url)
            .connect()
            .await
            .map_err(|e| AiServiceError::Request(e.to_string()))?;
        let (sink, mut stream) = framed.split();
        let latest: Rc<RefCell<Option<Move>>> = Rc::new(RefCell::new(None));
        let waker: Rc<RefCell<Option<oneshot::Sender<()>>>> = Rc::new(RefCell::new(None));

        let reader_latest = Rc::clone(&latest);
        let reader_waker = Rc::clone(&waker);
        actix_rt::spawn(async move {
            while let Some(Ok(frame)) = stream.next().await {
                let bytes = match frame {
                    ws::Frame::Text(bytes) => bytes,
                    _ => continue,
                };
                let reply: SocketReply = match serde_json::from_slice(&bytes) {
                    Ok(reply) => reply,
                    Err(e) => {
                        debug!("ignoring unparsable engine frame: {}", e);
                        continue;
                    }
                };
                if reply.kind != "move" {
                    continue;
                }
                match Move::from_wire(&reply.from, &reply.to, reply.promotion.as_deref()) {
                    Ok(mv) => {
                        *reader_latest.borrow_mut() = Some(mv);
                        if let Some(tx) = reader_waker.borrow_mut().take() {
                            let _ = tx.send(());
                        }
                    }
                    Err(e) => warn!("engine socket sent a malformed move: {}", e),
                }
            }
            debug!("engine socket closed");
        });

        Ok(Self {
            shared: Rc::new(SocketShared {
                sink: RefCell::new(Box::pin(sink)),
                busy: Cell::new(false),
                latest,
                waker,
            }),
        })
    }

    /// Sends one search request and waits for the engine's answer, then a
    /// short improvement window for a better line.
    async fn request(
        &self,
        request: &EngineRequest,
        deadline_ms: u64,
    ) -> Result<Move, AiServiceError> {
        if self.shared.busy.get() {
            return Err(AiServiceError::Busy);
        }
        self.shared.busy.set(true);
        let result = self.request_inner(request, deadline_ms).await;
        self.shared.busy.set(false);
        result
    }

    async fn request_inner(
        &self,
        request: &EngineRequest,
        deadline_ms: u64,
    ) -> Result<Move, AiServiceError> {
        *self.shared.latest.borrow_mut() = None;
        let (tx, rx) = oneshot::channel();
        *self.shared.waker.borrow_mut() = Some(tx);

        let text =
            serde_json::to_string(request).map_err(|e| AiServiceError::Request(e.to_string()))?;
        self.shared
            .sink
            .borrow_mut()
            .send(ws::Message::Text(text.into()))
            .await
            .map_err(|e| AiServiceError::Request(e.to_string()))?;

        if timeout(Duration::from_millis(deadline_ms), rx).await.is_err() {
            self.shared.waker.borrow_mut().take();
            return Err(AiServiceError::TimedOut);
        }
        sleep(Duration::from_millis(IMPROVE_WINDOW_MS)).await;
        self.shared
            .latest
            .borrow_mut()
            .take()
            .ok_or_else(|| AiServiceError::InvalidReply("empty engine answer".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{Piece, Square};
    use std::str::FromStr;

    #[actix_rt::test]
    async fn random_move_is_variant_legal() {
        let config = AppConfig {
            ai_move_delay_ms: 1,
            ..AppConfig::default()
        };
        let provider = AiMoveProvider::new(&config);
        let board = Board::default();
        let outcome = provider.get_move(AiStrength::Random, board, false).await;
        let mv = outcome.mv.unwrap();
        assert!(variant::legal_moves(&board, false)
            .iter()
            .any(|m| m.get_source() == mv.from && m.get_dest() == mv.to));
        assert!(outcome.notice.is_none());
    }

    #[test]
    fn replies_outside_the_allowed_set_are_rejected() {
        let board = Board::default();
        let allowed = variant::legal_moves(&board, true);
        let bogus = Move::new(Square::E2, Square::E5, None).unwrap();
        assert!(matches!(
            validate_reply(&allowed, bogus),
            Err(AiServiceError::InvalidReply(_))
        ));
        let fine = Move::new(Square::E2, Square::E4, None).unwrap();
        assert_eq!(validate_reply(&allowed, fine).unwrap(), fine);
    }

    #[test]
    fn missing_promotion_piece_defaults_to_queen() {
        let board = Board::from_str("8/P6k/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let allowed = variant::legal_moves(&board, true);
        let bare = Move::new(Square::A7, Square::A8, None).unwrap();
        let normalized = validate_reply(&allowed, bare).unwrap();
        assert_eq!(normalized.promotion, Some(Piece::Queen));
        let knight = Move::new(Square::A7, Square::A8, Some(Piece::Knight)).unwrap();
        assert_eq!(validate_reply(&allowed, knight).unwrap().promotion, Some(Piece::Knight));
    }

    #[test]
    fn allowlist_is_sent_only_for_mid_turn_searches() {
        let provider = AiMoveProvider::new(&AppConfig::default());
        let board = Board::default();
        assert!(provider.engine_request(&board, true).searchmoves.is_none());
        let mid = provider.engine_request(&board, false).searchmoves;
        assert!(mid.is_some());
    }

    #[test]
    fn engine_request_wire_shape() {
        let request = EngineRequest {
            fen: "fen".to_string(),
            max_thinking_time: 100,
            depth: 18,
            searchmoves: Some("e2e4".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"maxThinkingTime\":100"));
        assert!(json.contains("\"searchmoves\":\"e2e4\""));
    }
}
