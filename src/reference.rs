use std::fmt::{Display, Formatter};

/// Public handle to a node of a [`Bdd`][crate::bdd::Bdd] manager.
///
/// A handle is an index into the node table paired with the generation of
/// that slot. Freeing a slot bumps its generation, so a handle that outlived
/// its node is detected instead of silently aliasing a newer node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Ref {
    index: u32,
    generation: u32,
}

impl Ref {
    /// The constant false function.
    pub const ZERO: Ref = Ref::new(0, 0);
    /// The constant true function.
    pub const ONE: Ref = Ref::new(1, 0);

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Return the index of the node in the node table.
    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub const fn is_zero(self) -> bool {
        self.index == 0
    }
    pub const fn is_one(self) -> bool {
        self.index == 1
    }
    pub const fn is_terminal(self) -> bool {
        self.index < 2
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.generation == 0 {
            write!(f, "@{}", self.index)
        } else {
            write!(f, "@{}#{}", self.index, self.generation)
        }
    }
}
