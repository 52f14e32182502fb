//! Dalvik typing informations data structures.

use crate::errors::{DexError, DexResult};
use crate::strings::StringIdItem;
use crate::{Dex, DexIndex, Index, PrettyPrint};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// The Dalvik type descriptor to be used for referencing it from other Dex data items.
#[derive(Debug)]
pub struct TypeIdItem {
    pub(crate) index: Index<TypeIdItem>,
    pub(crate) descriptor_idx: Index<StringIdItem>,
}

impl DexIndex for Index<TypeIdItem> {
    type T = TypeIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.type_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound(format!("TypeIdItem #{self}")))
    }
}

impl TypeIdItem {
    pub(crate) const SIZE: usize = 4;

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<Self> {
        self.index
    }

    /// Returns the raw descriptor string, e.g. `[Ljava/lang/String;`.
    pub fn descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        dex.string(self.descriptor_idx)
    }

    /// Returns the concrete Dalvik [`Type`] designated by the descriptor.
    pub fn to_type(&self, dex: &Dex) -> DexResult<Type> {
        Type::try_from(self.descriptor(dex)?)
    }
}

impl PrettyPrint for TypeIdItem {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        write!(f, "{}", self.descriptor(dex)?)?;
        Ok(())
    }
}

/// The Dalvik prototype descriptor to be used for referencing it from other Dex data items.
///
/// The parameters type list is decoded at parsing time.
#[derive(Debug)]
pub struct ProtoIdItem {
    pub(crate) index: Index<ProtoIdItem>,
    pub(crate) shorty_idx: Index<StringIdItem>,
    pub(crate) return_type_idx: Index<TypeIdItem>,
    pub(crate) parameters_off: Option<usize>,
    pub(crate) parameters: Vec<Index<TypeIdItem>>,
}

impl DexIndex for Index<ProtoIdItem> {
    type T = ProtoIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.proto_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound(format!("ProtoIdItem #{self}")))
    }
}

impl ProtoIdItem {
    pub(crate) const SIZE: usize = 12;

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<Self> {
        self.index
    }

    /// Returns the short form descriptor of the prototype, e.g. `VLI`.
    pub fn shorty<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        dex.string(self.shorty_idx)
    }

    /// Returns the return type of the prototype.
    pub fn return_type(&self, dex: &Dex) -> DexResult<Type> {
        dex.type_(self.return_type_idx)
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Index<TypeIdItem>] {
        &self.parameters
    }

    /// Returns the parameters types of the prototype.
    pub fn parameters_types(&self, dex: &Dex) -> DexResult<Vec<Type>> {
        self.parameters.iter().map(|idx| dex.type_(*idx)).collect()
    }

    /// Returns the concatenated raw descriptors of the parameters.
    pub fn parameters_descriptors(&self, dex: &Dex) -> DexResult<String> {
        self.parameters
            .iter()
            .try_fold(String::new(), |mut acc, idx| {
                acc.push_str(dex.type_name(*idx)?);
                Ok(acc)
            })
    }
}

impl PrettyPrint for ProtoIdItem {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        let return_ = dex.type_name(self.return_type_idx)?;
        write!(f, "({}){return_}", self.parameters_descriptors(dex)?)?;
        Ok(())
    }
}

/// Dalvik concrete type descriptor type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    /// `void` type, only valid for return types.
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    /// Array of the given type descriptor, with its number of dimensions
    /// (at most 255).
    Array(usize, Box<Self>),
    /// Type of a fully-qualified class, in its slash-separated form.
    Class(String),
}

impl Type {
    /// Returns a java-like representation of the type.
    ///
    /// Its result differs from the `Display` implementation, which produces
    /// strings in the Dalvik format.
    #[must_use]
    pub fn to_java_string(&self) -> String {
        match self {
            Self::Void => "void".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Byte => "byte".to_string(),
            Self::Short => "short".to_string(),
            Self::Char => "char".to_string(),
            Self::Int => "int".to_string(),
            Self::Long => "long".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Array(n, sub) => {
                let mut s = sub.to_java_string();
                for _ in 0..*n {
                    s.push_str("[]");
                }
                s
            }
            Self::Class(name) => name.replace('/', "."),
        }
    }

    pub fn as_class_name(&self) -> DexResult<&str> {
        if let Self::Class(name) = self {
            Ok(name)
        } else {
            Err(DexError::InvalidType)
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => write!(f, "V"),
            Self::Boolean => write!(f, "Z"),
            Self::Byte => write!(f, "B"),
            Self::Short => write!(f, "S"),
            Self::Char => write!(f, "C"),
            Self::Int => write!(f, "I"),
            Self::Long => write!(f, "J"),
            Self::Float => write!(f, "F"),
            Self::Double => write!(f, "D"),
            Self::Array(n, inner) => write!(f, "{}{inner}", "[".repeat(*n)),
            Self::Class(classname) => write!(f, "L{classname};"),
        }
    }
}

impl TryFrom<&str> for Type {
    type Error = DexError;

    fn try_from(s: &str) -> DexResult<Self> {
        let conversion_error = || DexError::Conversion {
            from: format!("&str ({s:?})"),
            to: "Type".to_string(),
        };

        if s == "V" {
            return Ok(Self::Void);
        }

        let dims = s.bytes().take_while(|b| *b == b'[').count();
        if dims > 255 {
            return Err(conversion_error());
        }

        let t = match &s[dims..] {
            "Z" => Self::Boolean,
            "B" => Self::Byte,
            "S" => Self::Short,
            "C" => Self::Char,
            "I" => Self::Int,
            "J" => Self::Long,
            "F" => Self::Float,
            "D" => Self::Double,
            sub if sub.len() > 2 && sub.starts_with('L') && sub.ends_with(';') => {
                Self::Class(sub[1..sub.len() - 1].to_string())
            }
            _ => return Err(conversion_error()),
        };
        if dims == 0 {
            Ok(t)
        } else {
            Ok(Self::Array(dims, Box::new(t)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors() {
        assert_eq!(Type::try_from("I").unwrap(), Type::Int);
        assert_eq!(
            Type::try_from("Lokio/Buffer;").unwrap(),
            Type::Class("okio/Buffer".to_string())
        );
        assert_eq!(
            Type::try_from("[[J").unwrap(),
            Type::Array(2, Box::new(Type::Long))
        );
        assert!(Type::try_from("").is_err());
        assert!(Type::try_from("[V").is_err());
        assert!(Type::try_from("L;").is_err());
        assert!(Type::try_from("Lfoo").is_err());
        assert!(Type::try_from("[").is_err());
    }

    #[test]
    fn display_round_trips() {
        for desc in ["V", "Z", "[B", "Ljava/lang/String;", "[[Ljava/lang/Object;"] {
            assert_eq!(Type::try_from(desc).unwrap().to_string(), desc);
        }
    }

    #[test]
    fn java_names() {
        let t = Type::try_from("[Ljava/lang/String;").unwrap();
        assert_eq!(t.to_java_string(), "java.lang.String[]");
        assert!(t.as_class_name().is_err());
    }
}
