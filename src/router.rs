//! Target routing
//!
//! Maps a target id to the command interpreter bound to it. The router owns
//! every interpreter and hands out borrowed references; callers never take
//! ownership. It performs identity lookup only: LUN validation is the
//! interpreter's job, but a target with no interpreter bound at all is
//! rejected here, before interpretation (a fatal condition, distinct from an
//! unsupported LUN).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{EmulatorError, ScsiResult};
use crate::scsi::CommandInterpreter;

/// Identifies a target on the emulated bus
pub type TargetId = u32;

/// Highest target id the emulated bus supports
pub const MAX_TARGET_ID: TargetId = 256;

/// Owns the interpreters for every bound target
#[derive(Default)]
pub struct TargetRouter {
    targets: HashMap<TargetId, Mutex<CommandInterpreter>>,
}

impl TargetRouter {
    pub fn new() -> Self {
        TargetRouter::default()
    }

    /// Bind an interpreter to a target id
    pub fn bind(&mut self, target: TargetId, interpreter: CommandInterpreter) -> ScsiResult<()> {
        if target > MAX_TARGET_ID {
            return Err(EmulatorError::Config(format!(
                "target id {} exceeds maximum {}",
                target, MAX_TARGET_ID
            )));
        }
        if self.targets.contains_key(&target) {
            return Err(EmulatorError::Config(format!(
                "target {} is already bound",
                target
            )));
        }
        self.targets.insert(target, Mutex::new(interpreter));
        Ok(())
    }

    /// Look up the interpreter bound to `target`
    ///
    /// Each interpreter sits behind its own mutex so that concurrent
    /// producers serialize per target: one task runs to completion against a
    /// store before the next begins.
    pub fn route(&self, target: TargetId) -> Option<&Mutex<CommandInterpreter>> {
        self.targets.get(&target)
    }

    /// Number of bound targets
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BlockStore;

    fn interpreter() -> CommandInterpreter {
        CommandInterpreter::new(BlockStore::new(4096).unwrap())
    }

    #[test]
    fn test_bind_and_route() {
        let mut router = TargetRouter::new();
        router.bind(0, interpreter()).unwrap();
        router.bind(3, interpreter()).unwrap();
        assert_eq!(router.target_count(), 2);
        assert!(router.route(0).is_some());
        assert!(router.route(3).is_some());
    }

    #[test]
    fn test_unbound_target_is_rejected() {
        let mut router = TargetRouter::new();
        router.bind(0, interpreter()).unwrap();
        assert!(router.route(1).is_none());
    }

    #[test]
    fn test_double_bind_is_rejected() {
        let mut router = TargetRouter::new();
        router.bind(0, interpreter()).unwrap();
        assert!(router.bind(0, interpreter()).is_err());
    }

    #[test]
    fn test_target_id_bound() {
        let mut router = TargetRouter::new();
        assert!(router.bind(MAX_TARGET_ID + 1, interpreter()).is_err());
    }
}
