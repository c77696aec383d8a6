//! Local variable bookkeeping for the single-pass compiler.
//!
//! Locals live on the runtime stack in declaration order, so a local's index in
//! [`ScopeTracker`] is also its stack slot.

/// The depth a local was declared at, or `Uninitialized` while its initializer is still being
/// compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Uninitialized,
    At(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local<'src> {
    pub name: &'src str,
    pub depth: Depth,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Already a variable with this name in this scope.")]
    Redeclared,
    #[error("Too many local variables in function.")]
    TooManyLocals,
    #[error("Can't read local variable in its own initializer.")]
    ReadInOwnInitializer,
}

#[derive(Debug, Clone)]
pub struct ScopeTracker<'src> {
    locals: Vec<Local<'src>>,
    depth: usize,
    max_locals: usize,
}

impl<'src> ScopeTracker<'src> {
    /// `max_locals` is clamped to 256, the number of slots a one-byte operand can address.
    pub fn new(max_locals: usize) -> Self {
        Self {
            locals: Vec::new(),
            depth: 0,
            max_locals: max_locals.min(usize::from(u8::MAX) + 1),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_global(&self) -> bool {
        self.depth == 0
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    pub fn locals(&self) -> &[Local<'src>] {
        &self.locals
    }

    pub fn begin_scope(&mut self) {
        self.depth += 1;
        tracing::trace!(depth = self.depth, "begin scope");
    }

    /// Closes the innermost scope and returns how many locals went out of scope.
    ///
    /// The caller emits one pop per discarded local.
    pub fn end_scope(&mut self) -> usize {
        self.depth = self.depth.saturating_sub(1);
        let keep = self
            .locals
            .iter()
            .rposition(|local| match local.depth {
                Depth::At(depth) => depth <= self.depth,
                Depth::Uninitialized => false,
            })
            .map_or(0, |index| index + 1);
        let popped = self.locals.len() - keep;
        self.locals.truncate(keep);
        tracing::trace!(depth = self.depth, popped, "end scope");
        popped
    }

    /// Adds a local in the current scope, uninitialized until [`Self::mark_initialized`].
    pub fn declare(&mut self, name: &'src str) -> Result<(), ScopeError> {
        let redeclared = self
            .locals
            .iter()
            .rev()
            .take_while(|local| match local.depth {
                Depth::At(depth) => depth >= self.depth,
                Depth::Uninitialized => true,
            })
            .any(|local| local.name == name);
        if redeclared {
            return Err(ScopeError::Redeclared);
        }
        if self.locals.len() >= self.max_locals {
            return Err(ScopeError::TooManyLocals);
        }
        self.locals.push(Local {
            name,
            depth: Depth::Uninitialized,
        });
        Ok(())
    }

    pub fn mark_initialized(&mut self) {
        if let Some(local) = self.locals.last_mut() {
            local.depth = Depth::At(self.depth);
        }
    }

    /// Finds the innermost local called `name`. `Ok(None)` means the name is a global.
    pub fn resolve(&self, name: &str) -> Result<Option<u8>, ScopeError> {
        let Some((slot, local)) = self
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name == name)
        else {
            return Ok(None);
        };
        if local.depth == Depth::Uninitialized {
            return Err(ScopeError::ReadInOwnInitializer);
        }
        // declare() never lets the slot count past u8::MAX + 1
        Ok(u8::try_from(slot).ok())
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::{Depth, ScopeError, ScopeTracker};

    fn declare_init<'src>(scope: &mut ScopeTracker<'src>, name: &'src str) {
        let_assert!(Ok(()) = scope.declare(name));
        scope.mark_initialized();
    }

    #[test]
    fn redeclaring_in_one_scope_fails() {
        let mut scope = ScopeTracker::new(256);
        scope.begin_scope();
        declare_init(&mut scope, "a");
        check!(scope.declare("a") == Err(ScopeError::Redeclared));
    }

    #[test]
    fn shadowing_resolves_innermost() {
        let mut scope = ScopeTracker::new(256);
        scope.begin_scope();
        declare_init(&mut scope, "a");
        declare_init(&mut scope, "b");
        scope.begin_scope();
        declare_init(&mut scope, "a");

        check!(scope.resolve("a") == Ok(Some(2)));
        check!(scope.resolve("b") == Ok(Some(1)));
        check!(scope.resolve("c") == Ok(None));

        check!(scope.end_scope() == 1);
        check!(scope.resolve("a") == Ok(Some(0)));
    }

    #[test]
    fn own_initializer_is_rejected() {
        let mut scope = ScopeTracker::new(256);
        scope.begin_scope();
        let_assert!(Ok(()) = scope.declare("a"));
        check!(scope.locals()[0].depth == Depth::Uninitialized);
        check!(scope.resolve("a") == Err(ScopeError::ReadInOwnInitializer));
        scope.mark_initialized();
        check!(scope.resolve("a") == Ok(Some(0)));
    }

    #[test]
    fn end_scope_counts_only_inner_locals() {
        let mut scope = ScopeTracker::new(256);
        scope.begin_scope();
        declare_init(&mut scope, "outer");
        scope.begin_scope();
        scope.begin_scope();
        declare_init(&mut scope, "x");
        declare_init(&mut scope, "y");
        declare_init(&mut scope, "z");

        check!(scope.depth() == 3);
        check!(scope.end_scope() == 3);
        check!(scope.end_scope() == 0);
        check!(scope.len() == 1);
        check!(scope.depth() == 1);
        check!(scope.end_scope() == 1);
        check!(scope.depth() == 0);
        check!(scope.is_global());
        check!(scope.is_empty());
    }

    #[test]
    fn local_limit() {
        let mut scope = ScopeTracker::new(2);
        scope.begin_scope();
        declare_init(&mut scope, "a");
        declare_init(&mut scope, "b");
        check!(scope.declare("c") == Err(ScopeError::TooManyLocals));
    }

    #[test]
    fn slots_fit_in_a_byte() {
        let names = (0..300).map(|i| format!("v{i}")).collect::<Vec<_>>();
        let mut scope = ScopeTracker::new(usize::MAX);
        scope.begin_scope();
        for name in &names[..256] {
            declare_init(&mut scope, name);
        }
        check!(scope.declare(&names[256]) == Err(ScopeError::TooManyLocals));
        check!(scope.resolve("v255") == Ok(Some(255)));
    }
}
