//! Mapping between foreign class tags and host element types.

use matlink_abi::MxClassId;
use matlink_value::NumericClass;

/// Host-side kind of a foreign array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Numeric(NumericClass),
    Logical,
    Char,
    Cell,
    Struct,
}

const NUMERIC: [(MxClassId, NumericClass); 10] = [
    (MxClassId::Double, NumericClass::F64),
    (MxClassId::Single, NumericClass::F32),
    (MxClassId::Int8, NumericClass::I8),
    (MxClassId::UInt8, NumericClass::U8),
    (MxClassId::Int16, NumericClass::I16),
    (MxClassId::UInt16, NumericClass::U16),
    (MxClassId::Int32, NumericClass::I32),
    (MxClassId::UInt32, NumericClass::U32),
    (MxClassId::Int64, NumericClass::I64),
    (MxClassId::UInt64, NumericClass::U64),
];

/// Element type for a class tag, or `None` when the tag has no host
/// counterpart (function handles, objects, void).
pub fn element_type_for(class: MxClassId) -> Option<ElementType> {
    match class {
        MxClassId::Logical => Some(ElementType::Logical),
        MxClassId::Char => Some(ElementType::Char),
        MxClassId::Cell => Some(ElementType::Cell),
        MxClassId::Struct => Some(ElementType::Struct),
        other => NUMERIC
            .iter()
            .find(|(id, _)| *id == other)
            .map(|(_, numeric)| ElementType::Numeric(*numeric)),
    }
}

/// Class tag used to allocate an array of the given element type.
pub fn class_id_for(numeric: NumericClass) -> MxClassId {
    NUMERIC
        .iter()
        .find(|(_, n)| *n == numeric)
        .map(|(id, _)| *id)
        .unwrap_or(MxClassId::Unknown)
}
