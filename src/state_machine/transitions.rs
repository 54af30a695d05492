use super::states::{FsmState, Stage, SubState, SystemState};

/// What firing a transition means for the engine.
///
/// Create transitions carry the provisioning after-effect; Finish transitions
/// are guarded by stage-data validation; everything else moves state only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// System bootstrap edge (`init`, `start`).
    System,
    /// `create_<stage>`: lands in IN_PROGRESS and fires the provisioning callback.
    Create(Stage),
    /// `finish_<stage>`: IN_PROGRESS -> CREATED, guarded by stage-data validity.
    Finish(Stage),
    /// `fail_<stage>`: IN_PROGRESS -> FAILED, unconditional.
    Fail(Stage),
    /// Terminal edge from the last stage's CREATED state.
    Complete,
    /// Universal escapes available from any state.
    Reset,
    FailMachine,
}

/// Where a transition may be fired from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    Any,
    State(FsmState),
}

impl TransitionSource {
    pub fn matches(&self, state: FsmState) -> bool {
        match self {
            TransitionSource::Any => true,
            TransitionSource::State(source) => *source == state,
        }
    }
}

/// One named edge of the machine. Plain data; the engine interprets it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub trigger: String,
    pub source: TransitionSource,
    pub dest: FsmState,
    pub kind: TransitionKind,
}

/// The full transition table derived from the stage catalog.
///
/// Rebuilt on every attach of a persisted machine, so the build must be
/// deterministic: same catalog, same table, every time.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    transitions: Vec<Transition>,
}

impl TransitionTable {
    pub fn build() -> TransitionTable {
        let mut transitions = vec![
            Transition {
                trigger: "init".to_string(),
                source: TransitionSource::State(FsmState::UNSTARTED),
                dest: FsmState::STARTING,
                kind: TransitionKind::System,
            },
            Transition {
                trigger: "start".to_string(),
                source: TransitionSource::State(FsmState::STARTING),
                dest: FsmState::STARTED,
                kind: TransitionKind::System,
            },
        ];

        for stage in Stage::ALL {
            let create_source = match stage.index() {
                0 => FsmState::STARTED,
                i => FsmState::created(Stage::ALL[i - 1]),
            };
            transitions.push(Transition {
                trigger: format!("create_{}", stage.name()),
                source: TransitionSource::State(create_source),
                dest: FsmState::in_progress(stage),
                kind: TransitionKind::Create(stage),
            });
            transitions.push(Transition {
                trigger: format!("finish_{}", stage.name()),
                source: TransitionSource::State(FsmState::in_progress(stage)),
                dest: FsmState::created(stage),
                kind: TransitionKind::Finish(stage),
            });
            transitions.push(Transition {
                trigger: format!("fail_{}", stage.name()),
                source: TransitionSource::State(FsmState::in_progress(stage)),
                dest: FsmState::failed(stage),
                kind: TransitionKind::Fail(stage),
            });
        }

        // The last stage's CREATED state wires to an explicit terminal state
        // rather than dangling with no further trigger.
        let last = Stage::ALL[Stage::ALL.len() - 1];
        transitions.push(Transition {
            trigger: "complete".to_string(),
            source: TransitionSource::State(FsmState::created(last)),
            dest: FsmState::System(SystemState::Completed),
            kind: TransitionKind::Complete,
        });

        transitions.push(Transition {
            trigger: "reset".to_string(),
            source: TransitionSource::Any,
            dest: FsmState::UNSTARTED,
            kind: TransitionKind::Reset,
        });
        transitions.push(Transition {
            trigger: "fail".to_string(),
            source: TransitionSource::Any,
            dest: FsmState::System(SystemState::Failed),
            kind: TransitionKind::FailMachine,
        });

        TransitionTable { transitions }
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Look up the transition for `trigger` legal from `from`, if any.
    pub fn find(&self, trigger: &str, from: FsmState) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.trigger == trigger && t.source.matches(from))
    }

    /// All trigger names legal from `state`, in table order.
    pub fn triggers_from(&self, state: FsmState) -> Vec<&str> {
        self.transitions
            .iter()
            .filter(|t| t.source.matches(state))
            .map(|t| t.trigger.as_str())
            .collect()
    }

    /// The single `create_*` trigger wired out of `state`, if one exists.
    ///
    /// The builder wires each CREATED state (and STARTED) to exactly one
    /// next create trigger, or none when the pipeline is complete.
    pub fn next_create_trigger(&self, state: FsmState) -> Option<&str> {
        self.transitions
            .iter()
            .find(|t| {
                t.source == TransitionSource::State(state)
                    && matches!(t.kind, TransitionKind::Create(_))
            })
            .map(|t| t.trigger.as_str())
    }

    /// The terminal trigger out of `state`, if one exists.
    pub fn complete_trigger(&self, state: FsmState) -> Option<&str> {
        self.transitions
            .iter()
            .find(|t| {
                t.source == TransitionSource::State(state) && t.kind == TransitionKind::Complete
            })
            .map(|t| t.trigger.as_str())
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::build()
    }
}
