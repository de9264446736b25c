//! Analyst capability.
//!
//! The workflow engine only knows the [`Analyst`] trait. Concrete analysts
//! are an Ollama-backed tool-calling client and an offline analyst that
//! composes answers from the mocked fact lookups.

pub mod capabilities;
pub mod offline;
pub mod ollama;

use crate::errors::CapabilityError;
use crate::models::{CapabilitySet, Role};
use async_trait::async_trait;
use std::sync::Arc;

pub use capabilities::FactLookups;
pub use offline::OfflineAnalyst;
pub use ollama::{OllamaAnalyst, OllamaConfig};

/// Opaque reasoning capability invoked by the workflow nodes.
///
/// Invocations may be slow and may fail; callers invoke at most once per
/// logical need and recover from every error locally.
#[async_trait]
pub trait Analyst: Send + Sync {
    /// Run a task as `role`, permitted to use the lookups in `capabilities`.
    async fn invoke(
        &self,
        role: Role,
        task: &str,
        capabilities: CapabilitySet,
    ) -> Result<String, CapabilityError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// The four role-specific analyst clients shared by every node of a run.
#[derive(Clone)]
pub struct AnalystPanel {
    pub fundamental: Arc<dyn Analyst>,
    pub technical: Arc<dyn Analyst>,
    pub risk: Arc<dyn Analyst>,
    pub senior: Arc<dyn Analyst>,
}

impl AnalystPanel {
    /// Use the same analyst client for every role.
    pub fn uniform(analyst: Arc<dyn Analyst>) -> Self {
        Self {
            fundamental: analyst.clone(),
            technical: analyst.clone(),
            risk: analyst.clone(),
            senior: analyst,
        }
    }

    /// The client that answers for `role`.
    pub fn for_role(&self, role: Role) -> Arc<dyn Analyst> {
        match role {
            Role::Fundamental => self.fundamental.clone(),
            Role::Technical => self.technical.clone(),
            Role::Risk => self.risk.clone(),
            Role::Senior => self.senior.clone(),
        }
    }
}

impl std::fmt::Debug for AnalystPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalystPanel")
            .field("fundamental", &self.fundamental.name())
            .field("technical", &self.technical.name())
            .field("risk", &self.risk.name())
            .field("senior", &self.senior.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted analysts shared by node and engine tests.

    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers every task with a canned reply and records each call.
    pub struct ScriptedAnalyst {
        reply: Box<dyn Fn(Role, &str) -> String + Send + Sync>,
        failing: HashSet<Role>,
        calls: AtomicUsize,
        log: Mutex<Vec<(Role, String, CapabilitySet)>>,
    }

    impl ScriptedAnalyst {
        pub fn replying(reply: impl Fn(Role, &str) -> String + Send + Sync + 'static) -> Self {
            Self {
                reply: Box::new(reply),
                failing: HashSet::new(),
                calls: AtomicUsize::new(0),
                log: Mutex::new(Vec::new()),
            }
        }

        /// Replies with `"<role> says: ..."` padded to `len` characters.
        pub fn with_len(len: usize) -> Self {
            Self::replying(move |role, _| {
                let mut text = format!("{} says: ", role);
                while text.len() < len {
                    text.push('x');
                }
                text
            })
        }

        pub fn failing_for(mut self, role: Role) -> Self {
            self.failing.insert(role);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn calls_for(&self, role: Role) -> usize {
            self.log.lock().unwrap().iter().filter(|(r, _, _)| *r == role).count()
        }

        pub fn tasks(&self) -> Vec<(Role, String, CapabilitySet)> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Analyst for ScriptedAnalyst {
        async fn invoke(
            &self,
            role: Role,
            task: &str,
            capabilities: CapabilitySet,
        ) -> Result<String, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log
                .lock()
                .unwrap()
                .push((role, task.to_string(), capabilities));

            if self.failing.contains(&role) {
                return Err(CapabilityError::Unavailable(format!("{} analyst is down", role)));
            }
            Ok((self.reply)(role, task))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
