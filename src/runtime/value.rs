//! Cached values and the type classification shared by the rewriter and
//! the runtime model.
//!
//! Primitive field values are held as 64-bit patterns: every JVM primitive
//! widens into an `i64`-shaped slot exactly as the interpreter does it
//! (sign extension for the integral types, `to_bits` for the floating
//! types). Comparing bit patterns instead of numeric values makes the
//! write guard exact for `NaN` and for negative zero.

use std::{any::Any, fmt, sync::Arc};

use strum::{Display, EnumIter};

/// A cached reference slot. `None` models the JVM `null`.
pub type RefSlot = Option<Arc<dyn Any + Send + Sync>>;

/// Identity comparison for reference slots, the reference analogue of the
/// bit-pattern comparison used for primitives.
#[must_use]
pub fn same_ref(a: &RefSlot, b: &RefSlot) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Classification of a field's type, derived from its descriptor.
///
/// Every object and array type collapses into [`TypeKind::Reference`]; the
/// cache treats all references uniformly and never inspects the pointee.
#[derive(Debug, Display, EnumIter, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `L...;` and `[...`
    Reference,
}

impl TypeKind {
    /// Classify a field descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty or unrecognized
    /// descriptor.
    pub fn from_descriptor(descriptor: &str) -> crate::Result<Self> {
        match descriptor.as_bytes().first() {
            Some(b'Z') => Ok(TypeKind::Boolean),
            Some(b'B') => Ok(TypeKind::Byte),
            Some(b'C') => Ok(TypeKind::Char),
            Some(b'S') => Ok(TypeKind::Short),
            Some(b'I') => Ok(TypeKind::Int),
            Some(b'J') => Ok(TypeKind::Long),
            Some(b'F') => Ok(TypeKind::Float),
            Some(b'D') => Ok(TypeKind::Double),
            Some(b'L' | b'[') => Ok(TypeKind::Reference),
            _ => Err(malformed_error!(
                "Unrecognized field descriptor '{}'",
                descriptor
            )),
        }
    }

    /// The accessor method stem for this kind (`getStaticInt`,
    /// `setFieldObject`, ...).
    #[must_use]
    pub fn method_stem(self) -> &'static str {
        match self {
            TypeKind::Boolean => "Boolean",
            TypeKind::Byte => "Byte",
            TypeKind::Char => "Char",
            TypeKind::Short => "Short",
            TypeKind::Int => "Int",
            TypeKind::Long => "Long",
            TypeKind::Float => "Float",
            TypeKind::Double => "Double",
            TypeKind::Reference => "Object",
        }
    }

    /// The descriptor fragment the accessor methods use for this kind.
    /// References pass through the accessors as `java/lang/Object`.
    #[must_use]
    pub fn accessor_descriptor(self) -> &'static str {
        match self {
            TypeKind::Boolean => "Z",
            TypeKind::Byte => "B",
            TypeKind::Char => "C",
            TypeKind::Short => "S",
            TypeKind::Int => "I",
            TypeKind::Long => "J",
            TypeKind::Float => "F",
            TypeKind::Double => "D",
            TypeKind::Reference => "Ljava/lang/Object;",
        }
    }

    /// `true` for `long` and `double`, which occupy two stack slots.
    #[must_use]
    pub fn is_wide(self) -> bool {
        matches!(self, TypeKind::Long | TypeKind::Double)
    }

    /// The default value a freshly allocated field of this kind holds.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            TypeKind::Reference => Value::Ref(None),
            _ => Value::Prim(0),
        }
    }
}

/// One cached field value: a widened primitive bit pattern or a reference.
#[derive(Clone)]
pub enum Value {
    /// Any primitive, widened to its 64-bit interpreter representation.
    Prim(u64),
    /// A reference, compared by identity.
    Ref(RefSlot),
}

impl Value {
    /// Widen an `i32` (also used for `boolean`, `byte`, `char`, `short`).
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        Value::Prim(i64::from(value) as u64)
    }

    /// Store an `i64`.
    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Value::Prim(value as u64)
    }

    /// Store an `f32` by bit pattern, sign-extended the way the
    /// interpreter widens a category-1 value into a 64-bit slot.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Value::Prim(i64::from(value.to_bits() as i32) as u64)
    }

    /// Store an `f64` by bit pattern.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Value::Prim(value.to_bits())
    }

    /// Wrap a reference.
    #[must_use]
    pub fn from_ref(value: RefSlot) -> Self {
        Value::Ref(value)
    }

    /// Read back an `i32`.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            Value::Prim(bits) => *bits as i32,
            Value::Ref(_) => 0,
        }
    }

    /// Read back an `i64`.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Prim(bits) => *bits as i64,
            Value::Ref(_) => 0,
        }
    }

    /// Read back an `f32` from its stored bit pattern.
    #[must_use]
    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.as_i32() as u32)
    }

    /// Read back an `f64` from its stored bit pattern.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Prim(bits) => f64::from_bits(*bits),
            Value::Ref(_) => 0.0,
        }
    }

    /// Read back a reference slot. Primitives yield `null`.
    #[must_use]
    pub fn as_ref_slot(&self) -> RefSlot {
        match self {
            Value::Ref(slot) => slot.clone(),
            Value::Prim(_) => None,
        }
    }

    /// The cache's equality: bit patterns for primitives, identity for
    /// references. This is what the write guard and the flush compare
    /// with, so `NaN == NaN` here and `0.0 != -0.0`.
    #[must_use]
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Prim(a), Value::Prim(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => same_ref(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Prim(bits) => write!(f, "Prim(0x{bits:016X})"),
            Value::Ref(None) => write!(f, "Ref(null)"),
            Value::Ref(Some(arc)) => write!(f, "Ref({:p})", Arc::as_ptr(arc)),
        }
    }
}
