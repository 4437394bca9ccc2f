use super::PlyError;

/// Storage encoding of the PLY body.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlyEncoding {
    /// Whitespace separated text.
    Ascii,
    /// Packed little endian binary.
    BinaryLittleEndian,
}

/// Scalar types allowed in PLY properties.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlyDataType {
    /// 32 bit float.
    Float32,
    /// 64 bit float.
    Float64,
    /// Signed 8 bit integer.
    Int8,
    /// Unsigned 8 bit integer.
    UInt8,
    /// Signed 16 bit integer.
    Int16,
    /// Unsigned 16 bit integer.
    UInt16,
    /// Signed 32 bit integer.
    Int32,
    /// Unsigned 32 bit integer.
    UInt32,
}

impl PlyDataType {
    /// Parse a PLY type name, both the classic and the sized spellings.
    pub fn parse(type_str: &str) -> Result<Self, PlyError> {
        match type_str {
            "float" | "float32" => Ok(PlyDataType::Float32),
            "double" | "float64" => Ok(PlyDataType::Float64),
            "char" | "int8" => Ok(PlyDataType::Int8),
            "uchar" | "uint8" => Ok(PlyDataType::UInt8),
            "short" | "int16" => Ok(PlyDataType::Int16),
            "ushort" | "uint16" => Ok(PlyDataType::UInt16),
            "int" | "int32" => Ok(PlyDataType::Int32),
            "uint" | "uint32" => Ok(PlyDataType::UInt32),
            other => Err(PlyError::UnsupportedProperty(other.to_string())),
        }
    }

    /// Size in bytes of the binary encoding.
    pub fn size(&self) -> usize {
        match self {
            PlyDataType::Float32 | PlyDataType::Int32 | PlyDataType::UInt32 => 4,
            PlyDataType::Float64 => 8,
            PlyDataType::Int16 | PlyDataType::UInt16 => 2,
            PlyDataType::Int8 | PlyDataType::UInt8 => 1,
        }
    }

    /// Decode a little endian value of this type; `bytes` must hold at least `size()` bytes.
    pub fn decode_le(&self, bytes: &[u8]) -> Result<f64, PlyError> {
        let short = || PlyError::InvalidData("truncated value".to_string());
        let value = match self {
            PlyDataType::Float32 => f32::from_le_bytes(take(bytes).ok_or_else(short)?) as f64,
            PlyDataType::Float64 => f64::from_le_bytes(take(bytes).ok_or_else(short)?),
            PlyDataType::Int8 => i8::from_le_bytes(take(bytes).ok_or_else(short)?) as f64,
            PlyDataType::UInt8 => u8::from_le_bytes(take(bytes).ok_or_else(short)?) as f64,
            PlyDataType::Int16 => i16::from_le_bytes(take(bytes).ok_or_else(short)?) as f64,
            PlyDataType::UInt16 => u16::from_le_bytes(take(bytes).ok_or_else(short)?) as f64,
            PlyDataType::Int32 => i32::from_le_bytes(take(bytes).ok_or_else(short)?) as f64,
            PlyDataType::UInt32 => u32::from_le_bytes(take(bytes).ok_or_else(short)?) as f64,
        };
        Ok(value)
    }
}

fn take<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}

/// A property of a PLY element.
#[derive(Debug, PartialEq, Clone)]
pub enum PlyProperty {
    /// A single scalar value.
    Scalar {
        /// Property name.
        name: String,
        /// Value type.
        data_type: PlyDataType,
    },
    /// A length prefixed list of values.
    List {
        /// Property name.
        name: String,
        /// Type of the length prefix.
        count_type: PlyDataType,
        /// Type of the list items.
        item_type: PlyDataType,
    },
}

impl PlyProperty {
    /// Name of the property.
    pub fn name(&self) -> &str {
        match self {
            PlyProperty::Scalar { name, .. } | PlyProperty::List { name, .. } => name,
        }
    }
}

/// An element declaration of the PLY header.
#[derive(Debug, PartialEq, Clone)]
pub struct PlyElement {
    /// Element name, e.g. `vertex` or `face`.
    pub name: String,
    /// Number of records.
    pub count: usize,
    /// Properties of each record, in file order.
    pub properties: Vec<PlyProperty>,
}

impl PlyElement {
    /// Index of the property called `name`.
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name() == name)
    }
}
