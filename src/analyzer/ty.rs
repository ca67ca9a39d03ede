use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of value types, combined by union and compared by intersection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Ty(u8);

impl Ty {
    pub const NONE: Ty = Ty(0);
    pub const INT: Ty = Ty(1 << 0);
    pub const FLOAT: Ty = Ty(1 << 1);
    pub const STRING: Ty = Ty(1 << 2);
    pub const NULL: Ty = Ty(1 << 3);
    pub const VOID: Ty = Ty(1 << 4);
    pub const ANY: Ty = Ty(1 << 5);

    const NAMES: [(Ty, &'static str); 6] = [
        (Ty::INT, "int"),
        (Ty::FLOAT, "float"),
        (Ty::STRING, "string"),
        (Ty::NULL, "null"),
        (Ty::VOID, "void"),
        (Ty::ANY, "any"),
    ];

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Ty) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_subset_of(self, other: Ty) -> bool {
        other.contains(self)
    }

    pub fn nullable(self) -> Ty {
        self | Ty::NULL
    }

    /// `any` is compatible with every non-void type.
    pub fn intersects(self, other: Ty) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if self.contains(Ty::ANY) {
            return other != Ty::VOID;
        }
        if other.contains(Ty::ANY) {
            return self != Ty::VOID;
        }
        self.0 & other.0 != 0
    }

    pub fn is_void(self) -> bool {
        self == Ty::VOID
    }

    /// True when the only non-null value this type can hold is a string.
    pub fn is_string_only(self) -> bool {
        self.contains(Ty::STRING) && self.is_subset_of(Ty::STRING | Ty::NULL)
    }

    /// Numeric representations a value of this type can have at runtime,
    /// reading null as int 0.
    fn numeric_kinds(self) -> Ty {
        let mut kinds = Ty::NONE;
        if self.0 & (Ty::INT | Ty::NULL | Ty::ANY).0 != 0 {
            kinds |= Ty::INT;
        }
        if self.0 & (Ty::FLOAT | Ty::ANY).0 != 0 {
            kinds |= Ty::FLOAT;
        }
        kinds
    }

    /// Result type of `+`, `-` or `*`: int when both operands may be ints,
    /// float when either may be a float. `int|float` is decided at runtime.
    pub fn arithmetic(self, other: Ty) -> Ty {
        let (a, b) = (self.numeric_kinds(), other.numeric_kinds());
        let mut ty = Ty::NONE;
        if a.contains(Ty::INT) && b.contains(Ty::INT) {
            ty |= Ty::INT;
        }
        if (a | b).contains(Ty::FLOAT) {
            ty |= Ty::FLOAT;
        }
        if ty.is_empty() {
            Ty::INT
        } else {
            ty
        }
    }

    /// Common type two operands are converted to before a comparison.
    pub fn widen(self, other: Ty) -> Ty {
        if (self | other).is_subset_of(Ty::INT | Ty::NULL) {
            Ty::INT
        } else {
            Ty::FLOAT
        }
    }
}

impl BitOr for Ty {
    type Output = Ty;

    fn bitor(self, rhs: Ty) -> Ty {
        Ty(self.0 | rhs.0)
    }
}

impl BitOrAssign for Ty {
    fn bitor_assign(&mut self, rhs: Ty) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "never");
        }
        let names: Vec<_> = Ty::NAMES
            .iter()
            .filter(|(ty, _)| self.contains(*ty))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}
