use andro_llm::StreamSessionId;

/// Lifecycle of the single turn a controller may have in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Sending(StreamSessionId),
    Streaming(StreamSessionId),
    Cancelled(StreamSessionId),
    Error {
        session_id: StreamSessionId,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransition {
    Begin(StreamSessionId),
    StreamOpened(StreamSessionId),
    Complete(StreamSessionId),
    Cancel(StreamSessionId),
    Fail {
        session_id: StreamSessionId,
        message: String,
    },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnRejection {
    AlreadyInFlight {
        active: StreamSessionId,
        attempted: StreamSessionId,
    },
    NotSettled,
    NoActiveTurn,
    SessionMismatch {
        active: StreamSessionId,
        attempted: StreamSessionId,
    },
}

pub type TurnTransitionResult = Result<TurnState, TurnRejection>;

impl TurnState {
    pub fn active_session(&self) -> Option<StreamSessionId> {
        match self {
            Self::Sending(session_id) | Self::Streaming(session_id) => Some(*session_id),
            Self::Idle | Self::Cancelled(_) | Self::Error { .. } => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Applies one transition.
    ///
    /// A new turn may only begin from `Idle`; terminal states must be reset
    /// first. Every other transition must name the active session.
    pub fn apply(&self, transition: TurnTransition) -> TurnTransitionResult {
        match transition {
            TurnTransition::Begin(session_id) => self.apply_begin(session_id),
            TurnTransition::StreamOpened(session_id) => self.apply_opened(session_id),
            TurnTransition::Complete(session_id) => {
                self.settle(session_id, |_| Self::Idle, true)
            }
            TurnTransition::Cancel(session_id) => {
                self.settle(session_id, Self::Cancelled, true)
            }
            TurnTransition::Fail {
                session_id,
                message,
            } => self.settle(
                session_id,
                |session_id| Self::Error {
                    session_id,
                    message,
                },
                false,
            ),
            TurnTransition::Reset => Ok(Self::Idle),
        }
    }

    fn apply_begin(&self, attempted: StreamSessionId) -> TurnTransitionResult {
        match self {
            Self::Idle => Ok(Self::Sending(attempted)),
            Self::Sending(active) | Self::Streaming(active) => {
                Err(TurnRejection::AlreadyInFlight {
                    active: *active,
                    attempted,
                })
            }
            Self::Cancelled(_) | Self::Error { .. } => Err(TurnRejection::NotSettled),
        }
    }

    fn apply_opened(&self, attempted: StreamSessionId) -> TurnTransitionResult {
        match self {
            Self::Sending(active) if *active == attempted => Ok(Self::Streaming(attempted)),
            Self::Sending(active) | Self::Streaming(active) => {
                Err(TurnRejection::SessionMismatch {
                    active: *active,
                    attempted,
                })
            }
            Self::Idle | Self::Cancelled(_) | Self::Error { .. } => {
                Err(TurnRejection::NoActiveTurn)
            }
        }
    }

    /// Completion and cancellation need an open stream; failure may also
    /// happen while the request is still being sent.
    fn settle(
        &self,
        attempted: StreamSessionId,
        next: impl FnOnce(StreamSessionId) -> Self,
        requires_stream: bool,
    ) -> TurnTransitionResult {
        match self {
            Self::Streaming(active) if *active == attempted => Ok(next(attempted)),
            Self::Sending(active) if *active == attempted && !requires_stream => {
                Ok(next(attempted))
            }
            Self::Sending(active) if *active == attempted => Err(TurnRejection::NoActiveTurn),
            Self::Sending(active) | Self::Streaming(active) => {
                Err(TurnRejection::SessionMismatch {
                    active: *active,
                    attempted,
                })
            }
            Self::Idle | Self::Cancelled(_) | Self::Error { .. } => {
                Err(TurnRejection::NoActiveTurn)
            }
        }
    }
}
