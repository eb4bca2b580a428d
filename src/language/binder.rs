use std::collections::HashMap;
use std::rc::Rc;

/// Storage slot inside a function's activation record. Every distinct
/// identifier written anywhere in one function owns exactly one slot,
/// regardless of how many nested blocks assign it.
#[derive(Clone, Debug)]
pub struct Slot {
    name: Rc<str>,
    index: usize,
    argument: Option<usize>,
}

impl Slot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shared_name(&self) -> Rc<str> {
        self.name.clone()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Position in the caller's argument list when this slot was created
    /// for a parameter, `None` for ordinary locals.
    pub fn argument(&self) -> Option<usize> {
        self.argument
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Slot {}

/// The activation-record layout of one function. Grows while the function
/// is being bound and is frozen once parsing finishes.
#[derive(Clone, Debug, Default)]
pub struct SlotTable {
    slots: Vec<Slot>,
    by_name: HashMap<Rc<str>, usize>,
}

impl SlotTable {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.by_name.get(name).map(|index| &self.slots[*index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    fn find_or_add(&mut self, name: &str, argument: Option<usize>) -> Slot {
        if let Some(index) = self.by_name.get(name) {
            return self.slots[*index].clone();
        }
        let shared: Rc<str> = name.into();
        let slot = Slot {
            name: shared.clone(),
            index: self.slots.len(),
            argument,
        };
        log::trace!("allocated slot {} for `{}`", slot.index, name);
        self.by_name.insert(shared, slot.index);
        self.slots.push(slot.clone());
        slot
    }
}

/// How an identifier read resolves: a slot of the current function, or a
/// reference to a globally registered function looked up at call time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Local(Slot),
    Global,
}

struct BinderScope {
    locals: HashMap<Rc<str>, Slot>,
    loop_body: bool,
}

/// Compile-time name resolution for a single function. Each syntactic
/// block pushes a scope that snapshots everything visible so far; writes
/// land in the innermost scope only, so visibility ends with the block.
pub struct Binder {
    scopes: Vec<BinderScope>,
    slots: SlotTable,
}

impl Binder {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            slots: SlotTable::default(),
        }
    }

    pub fn enter_block(&mut self, loop_body: bool) {
        let locals = self
            .scopes
            .last()
            .map(|scope| scope.locals.clone())
            .unwrap_or_default();
        self.scopes.push(BinderScope { locals, loop_body });
        log::trace!("entered block scope (depth {})", self.scopes.len());
    }

    pub fn leave_block(&mut self) {
        self.scopes.pop();
        log::trace!("left block scope (depth {})", self.scopes.len());
    }

    /// Resolves an assignment target. Idempotent per identifier: the slot
    /// allocated by the first write is returned for every later one.
    pub fn bind_write(&mut self, name: &str) -> Slot {
        self.bind(name, None)
    }

    /// Binds a parameter before the body block is parsed. Reads resolve it
    /// like any local; the argument index survives on the slot for
    /// positional access by the inspection layer.
    pub fn bind_parameter(&mut self, name: &str, index: usize) -> Slot {
        self.bind(name, Some(index))
    }

    fn bind(&mut self, name: &str, argument: Option<usize>) -> Slot {
        let slot = self.slots.find_or_add(name, argument);
        if let Some(scope) = self.scopes.last_mut() {
            scope.locals.insert(slot.shared_name(), slot.clone());
        }
        slot
    }

    /// A name that is not a visible local is assumed to denote a global
    /// function; whether one exists is decided at call time, not here.
    pub fn resolve_read(&self, name: &str) -> Resolution {
        match self.scopes.last().and_then(|scope| scope.locals.get(name)) {
            Some(slot) => Resolution::Local(slot.clone()),
            None => Resolution::Global,
        }
    }

    pub fn in_loop(&self) -> bool {
        self.scopes.iter().any(|scope| scope.loop_body)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn finish(self) -> SlotTable {
        self.slots
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_writes_reuse_the_slot() {
        let mut binder = Binder::new();
        binder.enter_block(false);
        let first = binder.bind_write("x");
        binder.enter_block(false);
        let nested = binder.bind_write("x");
        binder.leave_block();
        let again = binder.bind_write("x");
        binder.leave_block();

        assert_eq!(first, nested);
        assert_eq!(first, again);
        assert_eq!(binder.finish().len(), 1);
    }

    #[test]
    fn block_bindings_are_invisible_after_leave() {
        let mut binder = Binder::new();
        binder.enter_block(false);
        binder.bind_write("outer");
        binder.enter_block(false);
        binder.bind_write("inner");
        assert!(matches!(binder.resolve_read("outer"), Resolution::Local(_)));
        assert!(matches!(binder.resolve_read("inner"), Resolution::Local(_)));
        binder.leave_block();
        assert!(matches!(binder.resolve_read("inner"), Resolution::Global));
    }

    #[test]
    fn parameters_carry_their_argument_index() {
        let mut binder = Binder::new();
        binder.enter_block(false);
        let a = binder.bind_parameter("a", 0);
        let b = binder.bind_parameter("b", 1);
        assert_eq!(a.argument(), Some(0));
        assert_eq!(b.argument(), Some(1));
        match binder.resolve_read("b") {
            Resolution::Local(slot) => assert_eq!(slot.index(), b.index()),
            Resolution::Global => panic!("parameter should resolve as a local"),
        }
    }

    #[test]
    fn loop_membership_follows_the_scope_stack() {
        let mut binder = Binder::new();
        binder.enter_block(false);
        assert!(!binder.in_loop());
        binder.enter_block(true);
        binder.enter_block(false);
        assert!(binder.in_loop());
        binder.leave_block();
        binder.leave_block();
        assert!(!binder.in_loop());
    }
}
