//! オファー/アンサー交換の状態機械
//!
//! 手順は固定で、各記述は送出前に一度だけ書き換えられる。
//! 1. 開始側がオファーを作成し、映像向けに書き換えてローカル記述に設定
//! 2. 書き換え済みオファーを応答側のリモート記述に設定
//! 3. 応答側がアンサーを作成し、既定の種別で書き換えてローカル記述に設定
//! 4. 書き換え済みアンサーを開始側のリモート記述に設定
//!
//! 途中で失敗しても巻き戻しはしない。端点の後始末は切断処理に任せる。
mod error;

use std::fmt;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::BandwidthPolicy;
use crate::endpoint::{EndpointError, EndpointPair, Role};
use crate::media::MediaKind;
use crate::sdp::DescriptorRewriter;

pub use error::NegotiationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    /// 開始側のローカル記述（書き換え済みオファー）が設定済み
    OfferCreated,
    /// `Role` 側が作った記述が相手側のリモート記述として設定済み
    RemoteSet(Role),
    /// 応答側のローカル記述（書き換え済みアンサー）が設定済み
    AnswerCreated,
    Established,
    Failed(NegotiationStep),
    Closed,
}

impl NegotiationState {
    /// 正常系で次に来る状態
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::OfferCreated),
            Self::OfferCreated => Some(Self::RemoteSet(Role::Initiator)),
            Self::RemoteSet(Role::Initiator) => Some(Self::AnswerCreated),
            Self::AnswerCreated => Some(Self::Established),
            Self::RemoteSet(Role::Responder)
            | Self::Established
            | Self::Failed(_)
            | Self::Closed => None,
        }
    }

    pub fn is_established(self) -> bool {
        self == Self::Established
    }

    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    CreateOffer,
    SetInitiatorLocal,
    DeliverOffer,
    CreateAnswer,
    SetResponderLocal,
    DeliverAnswer,
}

impl fmt::Display for NegotiationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateOffer => "create offer",
            Self::SetInitiatorLocal => "set initiator local description",
            Self::DeliverOffer => "deliver offer to responder",
            Self::CreateAnswer => "create answer",
            Self::SetResponderLocal => "set responder local description",
            Self::DeliverAnswer => "deliver answer to initiator",
        };
        f.write_str(name)
    }
}

/// 交渉状態の保持と購読
#[derive(Debug)]
pub struct NegotiationTracker {
    tx: watch::Sender<NegotiationState>,
}

impl Default for NegotiationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NegotiationTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(NegotiationState::Idle);
        Self { tx }
    }

    pub fn current(&self) -> NegotiationState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NegotiationState> {
        self.tx.subscribe()
    }

    fn advance(&self, to: NegotiationState) -> Result<(), NegotiationError> {
        let mut from = NegotiationState::Idle;
        let advanced = self.tx.send_if_modified(|state| {
            from = *state;
            if state.next() == Some(to) {
                *state = to;
                true
            } else {
                false
            }
        });
        if advanced {
            debug!(?from, ?to, "negotiation advanced");
            Ok(())
        } else {
            Err(NegotiationError::OutOfOrder { from, to })
        }
    }

    fn fail(&self, step: NegotiationStep) {
        self.tx.send_if_modified(|state| {
            if state.is_closed() {
                return false;
            }
            *state = NegotiationState::Failed(step);
            true
        });
    }

    /// 切断開始。以降は状態遷移しない
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_closed() {
                return false;
            }
            *state = NegotiationState::Closed;
            true
        })
    }
}

/// 2つの端点間でオファー/アンサーを交換する
pub async fn negotiate(
    endpoints: &EndpointPair,
    rewriter: &dyn DescriptorRewriter,
    policy: &BandwidthPolicy,
    tracker: &NegotiationTracker,
) -> Result<(), NegotiationError> {
    let result = exchange(endpoints, rewriter, policy, tracker).await;
    if let Err(NegotiationError::Step { step, .. }) = &result {
        tracker.fail(*step);
    }
    result
}

async fn exchange(
    endpoints: &EndpointPair,
    rewriter: &dyn DescriptorRewriter,
    policy: &BandwidthPolicy,
    tracker: &NegotiationTracker,
) -> Result<(), NegotiationError> {
    let initiator = endpoints.get(Role::Initiator);
    let responder = endpoints.get(Role::Responder);

    let offer = initiator
        .create_offer()
        .await
        .map_err(at(NegotiationStep::CreateOffer))?;
    let rewritten = rewriter.rewrite(&offer.sdp, Some(MediaKind::Video), policy);
    let offer = offer.with_sdp(rewritten);
    initiator
        .set_local_description(offer.clone())
        .await
        .map_err(at(NegotiationStep::SetInitiatorLocal))?;
    tracker.advance(NegotiationState::OfferCreated)?;

    responder
        .set_remote_description(offer)
        .await
        .map_err(at(NegotiationStep::DeliverOffer))?;
    tracker.advance(NegotiationState::RemoteSet(Role::Initiator))?;

    let answer = responder
        .create_answer()
        .await
        .map_err(at(NegotiationStep::CreateAnswer))?;
    let rewritten = rewriter.rewrite(&answer.sdp, None, policy);
    let answer = answer.with_sdp(rewritten);
    responder
        .set_local_description(answer.clone())
        .await
        .map_err(at(NegotiationStep::SetResponderLocal))?;
    tracker.advance(NegotiationState::AnswerCreated)?;

    initiator
        .set_remote_description(answer)
        .await
        .map_err(at(NegotiationStep::DeliverAnswer))?;
    tracker.advance(NegotiationState::Established)?;

    info!("descriptor exchange complete");
    Ok(())
}

fn at(step: NegotiationStep) -> impl Fn(EndpointError) -> NegotiationError {
    move |source| NegotiationError::Step { step, source }
}
