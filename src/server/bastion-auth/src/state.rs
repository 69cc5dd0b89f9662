//! Registration state.
//!
//! Tracks which pieces of shared security infrastructure have already been
//! wired. A flag goes from unset to set exactly once and is never cleared;
//! every check-then-set happens inside one critical section so that two
//! concurrent first callers cannot both perform the guarded work.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::provider::Provider;

/// One piece of once-only security wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationFlag {
    /// Bearer token validation scheme configured.
    TokenScheme,
    /// API documentation marked as requiring a bearer token.
    Documentation,
    /// Authentication activated on the request pipeline.
    PipelineActivated,
    /// Default (id/password) authenticator registered.
    DefaultProvider,
    /// Custom user-model authenticator registered.
    CustomProvider,
    /// Built-in provider registered.
    Provider(Provider),
}

/// Result of a guarded registration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The step ran and its flag is now set.
    Ran(T),
    /// A guarding flag was already set; nothing ran.
    AlreadySet {
        /// The flag that was found set.
        flag: RegistrationFlag,
        /// What that flag is bound to (authenticator type or scheme name).
        binding: &'static str,
    },
}

impl<T> Guarded<T> {
    /// Whether the step ran.
    pub fn ran(&self) -> bool {
        matches!(self, Guarded::Ran(_))
    }
}

/// Process-scoped registration flags, passed explicitly to the builder.
#[derive(Debug, Default)]
pub struct RegistrationState {
    flags: Mutex<HashMap<RegistrationFlag, &'static str>>,
}

impl RegistrationState {
    /// Creates a state with every flag unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `flag` is set.
    pub fn is_set(&self, flag: RegistrationFlag) -> bool {
        self.flags.lock().contains_key(&flag)
    }

    /// What `flag` is bound to, if set.
    pub fn binding(&self, flag: RegistrationFlag) -> Option<&'static str> {
        self.flags.lock().get(&flag).copied()
    }

    /// Sets `flag` if unset. Returns `true` if this call set it.
    pub fn try_set(&self, flag: RegistrationFlag, binding: &'static str) -> bool {
        let mut flags = self.flags.lock();
        if flags.contains_key(&flag) {
            return false;
        }
        flags.insert(flag, binding);
        true
    }

    /// Runs `step` unless `flag` is set, then sets `flag`.
    ///
    /// The flag is set only if `step` succeeds. `step` runs while the state is
    /// locked and must not call back into this state.
    pub fn run_once<T, E>(
        &self,
        flag: RegistrationFlag,
        binding: &'static str,
        step: impl FnOnce() -> Result<T, E>,
    ) -> Result<Guarded<T>, E> {
        self.run_exclusive(&[flag], flag, binding, step)
    }

    /// Runs `step` unless any of `guards` is set, then sets `flag`.
    ///
    /// Used for mutually exclusive registrations where setting one flag
    /// blocks the others.
    pub fn run_exclusive<T, E>(
        &self,
        guards: &[RegistrationFlag],
        flag: RegistrationFlag,
        binding: &'static str,
        step: impl FnOnce() -> Result<T, E>,
    ) -> Result<Guarded<T>, E> {
        let mut flags = self.flags.lock();

        let existing = guards
            .iter()
            .chain(std::iter::once(&flag))
            .find_map(|guard| flags.get(guard).map(|bound| (*guard, *bound)));
        if let Some((set, bound)) = existing {
            return Ok(Guarded::AlreadySet {
                flag: set,
                binding: bound,
            });
        }

        let value = step()?;
        flags.insert(flag, binding);
        Ok(Guarded::Ran(value))
    }
}
