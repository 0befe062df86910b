//! Programs and the closed entry-point registry
//!
//! Callbacks are routed by `(program id, discriminator)`. The registry only
//! knows pairs that programs declared up front; anything else fails with
//! `UnknownTarget` instead of being dispatched blindly.

use loyal_core::{Discriminator, Instruction, LoyalError, ProgramId, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::InvokeContext;

/// A named entry point of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    /// Entry point name
    pub name: &'static str,
    /// Selector derived from the name
    pub discriminator: Discriminator,
}

impl EntryPoint {
    /// Entry point whose selector is `sha256("global:<name>")[..8]`
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            discriminator: Discriminator::for_instruction(name),
        }
    }
}

/// An on-ledger program
pub trait Program: Send + Sync {
    /// Program address
    fn id(&self) -> ProgramId;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    /// Every entry point this program accepts
    fn entry_points(&self) -> Vec<EntryPoint>;

    /// Execute one instruction addressed to `entry`
    fn process(
        &self,
        ctx: &mut InvokeContext<'_>,
        entry: &EntryPoint,
        instruction: &Instruction,
    ) -> Result<()>;
}

struct RegisteredProgram {
    program: Arc<dyn Program>,
    entry_points: BTreeMap<Discriminator, EntryPoint>,
}

/// Registry mapping `(program id, discriminator)` to entry points
#[derive(Default)]
pub struct ProgramRegistry {
    programs: BTreeMap<ProgramId, RegisteredProgram>,
}

impl std::fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.programs
                    .iter()
                    .map(|(id, registered)| (id, registered.program.name())),
            )
            .finish()
    }
}

impl ProgramRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a program and its entry points.
    ///
    /// Fails on duplicate program ids or on two entry points sharing a selector.
    pub fn register(&mut self, program: Arc<dyn Program>) -> Result<()> {
        let id = program.id();
        if self.programs.contains_key(&id) {
            return Err(LoyalError::config(format!(
                "program {} registered twice",
                program.name()
            )));
        }

        let mut entry_points = BTreeMap::new();
        for entry in program.entry_points() {
            if entry_points.insert(entry.discriminator, entry).is_some() {
                return Err(LoyalError::config(format!(
                    "program {} declares selector {} twice",
                    program.name(),
                    entry.discriminator
                )));
            }
        }

        tracing::debug!(
            program = program.name(),
            id = %id.short(),
            entry_points = entry_points.len(),
            "program registered"
        );
        self.programs.insert(
            id,
            RegisteredProgram {
                program,
                entry_points,
            },
        );
        Ok(())
    }

    /// Whether a program is registered
    pub fn contains(&self, program_id: &ProgramId) -> bool {
        self.programs.contains_key(program_id)
    }

    /// Resolve the handler for a `(program, selector)` pair
    pub fn resolve(
        &self,
        program_id: &ProgramId,
        discriminator: &Discriminator,
    ) -> Result<(Arc<dyn Program>, EntryPoint)> {
        let unknown = || LoyalError::UnknownTarget {
            program: *program_id,
            discriminator: *discriminator,
        };
        let registered = self.programs.get(program_id).ok_or_else(unknown)?;
        let entry = registered
            .entry_points
            .get(discriminator)
            .copied()
            .ok_or_else(unknown)?;
        Ok((Arc::clone(&registered.program), entry))
    }
}
