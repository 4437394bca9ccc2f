use std::io::{BufRead, Read};
use std::path::Path;

use super::{PlyDataType, PlyElement, PlyEncoding, PlyError, PlyProperty};
use crate::mesh::Mesh;

/// Parsed PLY header.
#[derive(Debug, PartialEq, Clone)]
pub struct PlyHeader {
    /// Body encoding.
    pub encoding: PlyEncoding,
    /// Element declarations in file order.
    pub elements: Vec<PlyElement>,
}

/// Parse a PLY header up to and including `end_header`.
pub fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut encoding = None;
    let mut is_ply = false;
    let mut elements: Vec<PlyElement> = Vec::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::InvalidHeader("missing end_header".to_string()));
        }
        let trimmed = line.trim();
        let parts = trimmed.split_whitespace().collect::<Vec<_>>();

        match parts.as_slice() {
            ["ply"] => is_ply = true,
            ["end_header"] => break,
            ["format", "ascii", _] => encoding = Some(PlyEncoding::Ascii),
            ["format", "binary_little_endian", _] => {
                encoding = Some(PlyEncoding::BinaryLittleEndian)
            }
            ["format", other, ..] => {
                return Err(PlyError::UnsupportedProperty(format!("format {other}")))
            }
            ["comment", ..] | ["obj_info", ..] => {}
            ["element", name, count] => {
                let count = count
                    .parse()
                    .map_err(|_| PlyError::InvalidHeader(trimmed.to_string()))?;
                elements.push(PlyElement {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            ["property", "list", count_type, item_type, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| PlyError::InvalidHeader(trimmed.to_string()))?;
                element.properties.push(PlyProperty::List {
                    name: name.to_string(),
                    count_type: PlyDataType::parse(count_type)?,
                    item_type: PlyDataType::parse(item_type)?,
                });
            }
            ["property", data_type, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| PlyError::InvalidHeader(trimmed.to_string()))?;
                element.properties.push(PlyProperty::Scalar {
                    name: name.to_string(),
                    data_type: PlyDataType::parse(data_type)?,
                });
            }
            [] => {}
            _ => return Err(PlyError::InvalidHeader(trimmed.to_string())),
        }
    }

    if !is_ply {
        return Err(PlyError::InvalidHeader("missing ply magic".to_string()));
    }
    let encoding =
        encoding.ok_or_else(|| PlyError::InvalidHeader("missing format line".to_string()))?;

    Ok(PlyHeader { encoding, elements })
}

/// Source of property values for one record at a time.
trait ValueSource {
    fn next_value(&mut self, data_type: PlyDataType) -> Result<f64, PlyError>;
}

struct BinarySource<'a, R: Read> {
    reader: &'a mut R,
    buffer: [u8; 8],
}

impl<R: Read> ValueSource for BinarySource<'_, R> {
    fn next_value(&mut self, data_type: PlyDataType) -> Result<f64, PlyError> {
        let bytes = &mut self.buffer[..data_type.size()];
        self.reader.read_exact(bytes)?;
        data_type.decode_le(bytes)
    }
}

struct AsciiSource<'a, R: BufRead> {
    reader: &'a mut R,
    tokens: std::vec::IntoIter<String>,
}

impl<R: BufRead> ValueSource for AsciiSource<'_, R> {
    fn next_value(&mut self, _data_type: PlyDataType) -> Result<f64, PlyError> {
        loop {
            if let Some(token) = self.tokens.next() {
                return token
                    .parse::<f64>()
                    .map_err(|_| PlyError::InvalidData(format!("not a number: {token}")));
            }
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(PlyError::InvalidData("unexpected end of file".to_string()));
            }
            self.tokens = line
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
                .into_iter();
        }
    }
}

fn color_from_value(value: f64, data_type: PlyDataType) -> f32 {
    match data_type {
        PlyDataType::Float32 | PlyDataType::Float64 => value as f32,
        PlyDataType::UInt16 => (value / 65535.0) as f32,
        _ => (value / 255.0) as f32,
    }
}

fn read_body<S: ValueSource>(source: &mut S, header: &PlyHeader) -> Result<Mesh, PlyError> {
    let mut mesh = Mesh::default();

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => read_vertices(source, element, &mut mesh)?,
            "face" => read_faces(source, element, &mut mesh)?,
            _ => skip_element(source, element)?,
        }
    }

    mesh.validate()
        .map_err(|e| PlyError::InvalidData(e.to_string()))?;
    Ok(mesh)
}

fn read_vertices<S: ValueSource>(
    source: &mut S,
    element: &PlyElement,
    mesh: &mut Mesh,
) -> Result<(), PlyError> {
    let xyz = ["x", "y", "z"].map(|n| element.property_index(n));
    let [Some(ix), Some(iy), Some(iz)] = xyz else {
        return Err(PlyError::InvalidHeader(
            "vertex element without x y z".to_string(),
        ));
    };
    let normal_idx = match ["nx", "ny", "nz"].map(|n| element.property_index(n)) {
        [Some(a), Some(b), Some(c)] => Some([a, b, c]),
        _ => None,
    };
    let color_idx = match ["red", "green", "blue"].map(|n| element.property_index(n)) {
        [Some(a), Some(b), Some(c)] => Some([a, b, c]),
        _ => None,
    };

    let mut normals = Vec::new();
    let mut colors = Vec::new();
    let mut values = vec![0.0; element.properties.len()];
    let mut types = vec![PlyDataType::Float64; element.properties.len()];

    for _ in 0..element.count {
        for (k, property) in element.properties.iter().enumerate() {
            match property {
                PlyProperty::Scalar { data_type, .. } => {
                    values[k] = source.next_value(*data_type)?;
                    types[k] = *data_type;
                }
                PlyProperty::List {
                    count_type,
                    item_type,
                    ..
                } => {
                    let count = source.next_value(*count_type)? as usize;
                    for _ in 0..count {
                        source.next_value(*item_type)?;
                    }
                }
            }
        }
        mesh.vertices.push([values[ix], values[iy], values[iz]]);
        if let Some(idx) = normal_idx {
            normals.push(idx.map(|k| values[k]));
        }
        if let Some(idx) = color_idx {
            colors.push(idx.map(|k| color_from_value(values[k], types[k])));
        }
    }

    mesh.vertex_normals = normal_idx.map(|_| normals);
    mesh.vertex_colors = color_idx.map(|_| colors);
    Ok(())
}

fn read_faces<S: ValueSource>(
    source: &mut S,
    element: &PlyElement,
    mesh: &mut Mesh,
) -> Result<(), PlyError> {
    let list_idx = element
        .property_index("vertex_indices")
        .or_else(|| element.property_index("vertex_index"))
        .ok_or_else(|| PlyError::InvalidHeader("face element without indices".to_string()))?;

    let mut polygon = Vec::new();
    for _ in 0..element.count {
        for (k, property) in element.properties.iter().enumerate() {
            match property {
                PlyProperty::Scalar { data_type, .. } => {
                    source.next_value(*data_type)?;
                }
                PlyProperty::List {
                    count_type,
                    item_type,
                    ..
                } => {
                    let count = source.next_value(*count_type)? as usize;
                    polygon.clear();
                    for _ in 0..count {
                        polygon.push(source.next_value(*item_type)? as usize);
                    }
                    if k == list_idx {
                        // fan triangulation of polygons
                        for j in 1..polygon.len().saturating_sub(1) {
                            mesh.triangles
                                .push([polygon[0], polygon[j], polygon[j + 1]]);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn skip_element<S: ValueSource>(source: &mut S, element: &PlyElement) -> Result<(), PlyError> {
    for _ in 0..element.count {
        for property in &element.properties {
            match property {
                PlyProperty::Scalar { data_type, .. } => {
                    source.next_value(*data_type)?;
                }
                PlyProperty::List {
                    count_type,
                    item_type,
                    ..
                } => {
                    let count = source.next_value(*count_type)? as usize;
                    for _ in 0..count {
                        source.next_value(*item_type)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Read a triangle mesh from an ASCII or binary little endian PLY stream.
///
/// Polygons with more than three vertices are fan triangulated. Integer colors are scaled to
/// `[0, 1]`.
pub fn read_ply_mesh_from<R: BufRead>(reader: &mut R) -> Result<Mesh, PlyError> {
    let header = parse_header(reader)?;
    match header.encoding {
        PlyEncoding::BinaryLittleEndian => {
            let mut source = BinarySource {
                reader,
                buffer: [0u8; 8],
            };
            read_body(&mut source, &header)
        }
        PlyEncoding::Ascii => {
            let mut source = AsciiSource {
                reader,
                tokens: Vec::new().into_iter(),
            };
            read_body(&mut source, &header)
        }
    }
}

/// Read a triangle mesh from a PLY file.
pub fn read_ply_mesh(path: impl AsRef<Path>) -> Result<Mesh, PlyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    read_ply_mesh_from(&mut reader)
}
