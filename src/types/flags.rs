/// Compile-time flags carried by the scoping context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Literals and scalar built-ins also accept their string encoding.
    FromString,
    /// Structures must not carry undeclared keys.
    Strict,
    /// `void` was asserted on the current node.
    Optional,
    /// `required` was asserted on the current node.
    Required,
    /// "Is array" has already been emitted for the current value.
    Array,
}

impl Flag {
    const ALL: [Flag; 5] = [
        Flag::FromString,
        Flag::Strict,
        Flag::Optional,
        Flag::Required,
        Flag::Array,
    ];

    fn slot(self) -> usize {
        match self {
            Flag::FromString => 0,
            Flag::Strict => 1,
            Flag::Optional => 2,
            Flag::Required => 3,
            Flag::Array => 4,
        }
    }
}

/// How far a flag propagates when the context enters a new scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strength {
    #[default]
    No,
    /// Current node only; cleared by the next scope.
    Yes,
    /// Survives scopes over the same value; cleared when descending into a
    /// sub-value.
    Inherit,
    /// Survives every scope, including sub-values at any depth.
    ElementInherit,
}

/// The live flag map of one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    values: [Strength; 5],
}

impl Flags {
    #[must_use]
    pub fn get(&self, flag: Flag) -> Strength {
        self.values[flag.slot()]
    }

    #[must_use]
    pub fn is_set(&self, flag: Flag) -> bool {
        self.get(flag) != Strength::No
    }

    pub fn set(&mut self, flag: Flag, strength: Strength) {
        self.values[flag.slot()] = strength;
    }

    /// The flags a child scope starts with.
    #[must_use]
    pub fn inherited(&self, subject_changed: bool) -> Self {
        let mut next = Flags::default();
        for flag in Flag::ALL {
            let strength = match self.get(flag) {
                Strength::ElementInherit => Strength::ElementInherit,
                Strength::Inherit if !subject_changed => Strength::Inherit,
                _ => Strength::No,
            };
            next.set(flag, strength);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no() {
        let flags = Flags::default();
        assert!(!flags.is_set(Flag::Strict));
        assert_eq!(flags.get(Flag::Array), Strength::No);
    }

    #[test]
    fn yes_is_cleared_by_any_scope() {
        let mut flags = Flags::default();
        flags.set(Flag::Required, Strength::Yes);
        assert!(!flags.inherited(false).is_set(Flag::Required));
        assert!(!flags.inherited(true).is_set(Flag::Required));
    }

    #[test]
    fn inherit_survives_same_subject_only() {
        let mut flags = Flags::default();
        flags.set(Flag::Strict, Strength::Inherit);
        assert_eq!(flags.inherited(false).get(Flag::Strict), Strength::Inherit);
        assert!(!flags.inherited(true).is_set(Flag::Strict));
    }

    #[test]
    fn element_inherit_survives_descent() {
        let mut flags = Flags::default();
        flags.set(Flag::FromString, Strength::ElementInherit);
        let deep = flags.inherited(true).inherited(true).inherited(false);
        assert_eq!(deep.get(Flag::FromString), Strength::ElementInherit);
    }
}
