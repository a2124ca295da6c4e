/// Whether a built-in describes a leaf value or a composite one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Elemental,
    Constructed,
}

/// Static metadata of a built-in type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinType {
    pub name: &'static str,
    pub shape: Shape,
    /// Participates in `$.string` coercion.
    pub string_coercible: bool,
    /// A number type; usable as a filter target and takes range arguments.
    pub numeric: bool,
    /// Takes length arguments.
    pub has_length: bool,
}

const fn elemental(name: &'static str, string_coercible: bool, numeric: bool) -> BuiltinType {
    BuiltinType {
        name,
        shape: Shape::Elemental,
        string_coercible,
        numeric,
        has_length: false,
    }
}

const fn text(name: &'static str) -> BuiltinType {
    BuiltinType {
        name,
        shape: Shape::Elemental,
        string_coercible: false,
        numeric: false,
        has_length: true,
    }
}

const BUILTINS: &[BuiltinType] = &[
    elemental("any", false, false),
    elemental("null", true, false),
    elemental("void", false, false),
    elemental("optional", false, false),
    elemental("undefined", false, false),
    elemental("required", false, false),
    elemental("boolean", true, false),
    elemental("true", true, false),
    elemental("false", true, false),
    elemental("true_value", false, false),
    elemental("false_value", false, false),
    elemental("numeric", false, false),
    elemental("int", true, true),
    elemental("int8", true, true),
    elemental("int16", true, true),
    elemental("int32", true, true),
    elemental("int64", true, true),
    elemental("safe_int", true, true),
    elemental("uint", true, true),
    elemental("uint8", true, true),
    elemental("uint16", true, true),
    elemental("uint32", true, true),
    elemental("uint64", true, true),
    elemental("safe_uint", true, true),
    elemental("number", true, true),
    elemental("float", true, true),
    elemental("ufloat", true, true),
    elemental("decimal", false, false),
    elemental("udecimal", false, false),
    text("string"),
    text("ascii_string"),
    text("latin_string"),
    text("hex_string"),
    BuiltinType {
        name: "struct",
        shape: Shape::Constructed,
        string_coercible: false,
        numeric: false,
        has_length: false,
    },
    BuiltinType {
        name: "array",
        shape: Shape::Constructed,
        string_coercible: false,
        numeric: false,
        has_length: true,
    },
];

impl BuiltinType {
    /// Look up a built-in type by name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<&'static BuiltinType> {
        BUILTINS.iter().find(|b| b.name == name)
    }

    /// Whether the type accepts numeric or length arguments at all.
    #[must_use]
    pub fn takes_arguments(&self) -> bool {
        self.numeric || self.has_length || matches!(self.name, "decimal" | "udecimal")
    }

    #[must_use]
    pub fn is_elemental(&self) -> bool {
        self.shape == Shape::Elemental
    }
}
