use std::fmt;

use crate::util::intern::{Name, Names};

/// A schema type directly representable by the target language.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Bool,
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    /// Integers wider than 64 bits.
    BigInt,
}

impl Primitive {
    pub const ALL: &[Primitive] = &[
        Primitive::String,
        Primitive::Bool,
        Primitive::Float32,
        Primitive::Float64,
        Primitive::Int8,
        Primitive::Int16,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::BigInt,
    ];

    pub const fn canonical_name(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Bool => "bool",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::BigInt => "BigInt",
        }
    }

    /// Collapses an `intN` bit width onto the smallest machine integer which
    /// holds it.
    fn of_int_width(bits: u64) -> Primitive {
        match bits {
            0 => unreachable!("int0 is not a primitive"),
            1..=8 => Primitive::Int8,
            9..=16 => Primitive::Int16,
            17..=32 => Primitive::Int32,
            33..=64 => Primitive::Int64,
            _ => Primitive::BigInt,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// The resolved descriptor of a named type reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    Primitive(Primitive),
    /// A reference to a user definition, resolved through the scope tables.
    User(Name),
}

impl Normalized {
    pub fn is_primitive(self) -> bool {
        matches!(self, Normalized::Primitive(_))
    }

    /// For user references, this is the source identifier.
    pub fn canonical_name(self, names: &Names) -> &str {
        match self {
            Normalized::Primitive(primitive) => primitive.canonical_name(),
            Normalized::User(name) => names.get(name),
        }
    }
}

/// Maps a type identifier onto a primitive, if it spells one.
///
/// `intN` with `N >= 1` is primitive for any decimal `N`; it is widened to 8,
/// 16, 32 or 64 bits, or to [`Primitive::BigInt`] past 64.
pub fn normalize(ident: &str) -> Option<Primitive> {
    match ident {
        "string" => return Some(Primitive::String),
        "bool" => return Some(Primitive::Bool),
        "float32" => return Some(Primitive::Float32),
        "float64" => return Some(Primitive::Float64),
        _ => (),
    }
    let digits = ident.strip_prefix("int")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<u64>() {
        Ok(0) => None,
        Ok(bits) => Some(Primitive::of_int_width(bits)),
        // Only overflow is possible here, and such a width is certainly
        // wider than 64 bits.
        Err(_) => Some(Primitive::BigInt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_named_primitives() {
        assert_eq!(normalize("string"), Some(Primitive::String));
        assert_eq!(normalize("bool"), Some(Primitive::Bool));
        assert_eq!(normalize("float32"), Some(Primitive::Float32));
        assert_eq!(normalize("float64"), Some(Primitive::Float64));
        assert_eq!(normalize("float16"), None);
        assert_eq!(normalize("String"), None);
    }

    #[test]
    fn test_int_widths_round_up() {
        let expected = |bits: u64| match bits {
            1..=8 => Primitive::Int8,
            9..=16 => Primitive::Int16,
            17..=32 => Primitive::Int32,
            _ => Primitive::Int64,
        };
        for bits in 1..=64 {
            let ident = format!("int{bits}");
            assert_eq!(normalize(&ident), Some(expected(bits)), "{ident}");
        }
        assert_eq!(normalize("int9"), Some(Primitive::Int16));
        assert_eq!(normalize("int008"), Some(Primitive::Int8));
    }

    #[test]
    fn test_wide_ints_are_big() {
        assert_eq!(normalize("int65"), Some(Primitive::BigInt));
        assert_eq!(normalize("int128"), Some(Primitive::BigInt));
        assert_eq!(
            normalize("int99999999999999999999999"),
            Some(Primitive::BigInt)
        );
        assert_eq!(Primitive::BigInt.canonical_name(), "BigInt");
    }

    #[test]
    fn test_normalized_descriptors() {
        let mut names = Names::new();
        let user = Normalized::User(names.intern("Data"));
        assert!(!user.is_primitive());
        assert_eq!(user.canonical_name(&names), "Data");

        let int = Normalized::Primitive(normalize("int17").unwrap());
        assert!(int.is_primitive());
        assert_eq!(int.canonical_name(&names), "int32");
    }

    #[test]
    fn test_non_primitives_pass_through() {
        for ident in ["int", "int0", "intXYZ", "int8x", "int+8", "integer", "Data", ""] {
            assert_eq!(normalize(ident), None, "{ident}");
        }
    }
}
