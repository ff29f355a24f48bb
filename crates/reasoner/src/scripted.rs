//! A deterministic scripted reasoner for tests and offline demos.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use innkeeper_core::{Constraints, Interpretation, Reasoner, ReasonerError};

/// Replays a fixed sequence of interpretations, one per `interpret` call.
/// Once the script runs out it returns the fallback (default: `other`).
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<Interpretation>>,
    fallback: Interpretation,
}

impl ScriptedReasoner {
    pub fn new(steps: Vec<Interpretation>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fallback: Interpretation::other(),
        }
    }

    /// Always answers with the same interpretation.
    pub fn always(interpretation: Interpretation) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: interpretation,
        }
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn interpret(
        &self,
        _message: &str,
        _constraints: &Constraints,
    ) -> Result<Interpretation, ReasonerError> {
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeeper_core::{ConstraintDelta, Intent};

    #[tokio::test]
    async fn replays_script_then_falls_back() {
        let reasoner = ScriptedReasoner::new(vec![
            Interpretation::provide_info(ConstraintDelta {
                city: Some("Austin".into()),
                ..Default::default()
            }),
            Interpretation::cancel(),
        ]);

        let constraints = Constraints::default();
        let first = reasoner.interpret("austin", &constraints).await.unwrap();
        assert_eq!(first.delta.city.as_deref(), Some("Austin"));
        let second = reasoner.interpret("cancel", &constraints).await.unwrap();
        assert_eq!(second.intent, Intent::Cancel);
        let third = reasoner.interpret("??", &constraints).await.unwrap();
        assert_eq!(third.intent, Intent::Other);
    }

    #[tokio::test]
    async fn always_repeats_the_same_answer() {
        let reasoner = ScriptedReasoner::always(Interpretation::select_offer("o123"));
        let constraints = Constraints::default();
        for _ in 0..3 {
            let interp = reasoner.interpret("pick", &constraints).await.unwrap();
            assert_eq!(interp.selected_offer_id.as_deref(), Some("o123"));
        }
    }
}
