/// STL decoding for binary and ASCII files
use nom::{
    bytes::complete::{tag, take},
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::{count, many0},
    number::complete::{float, le_f32, le_u16, le_u32},
    sequence::{preceded, tuple},
    IResult,
};

use crate::error::LoadError;
use crate::geometry::{Mesh, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, LoadError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(LoadError::Decode("file too small to be a valid STL".to_string()));
    }

    let (body, triangle_count) = binary_header(data).map_err(nom_error)?;
    let triangle_count = triangle_count as usize;

    // Check before allocating: the count comes straight from the file.
    let needed = triangle_count.checked_mul(FACET_LEN);
    if needed.map_or(true, |n| n > body.len()) {
        return Err(LoadError::Decode(format!(
            "STL declares {} triangles but holds {} bytes of facet data",
            triangle_count,
            body.len()
        )));
    }

    let (_, triangles) = count(binary_facet, triangle_count)(body).map_err(nom_error)?;

    let mut mesh = Mesh::with_capacity(triangles.len());
    for triangle in triangles {
        mesh.add_triangle(triangle);
    }
    Ok(mesh)
}

fn binary_header(input: &[u8]) -> IResult<&[u8], u32> {
    preceded(take(HEADER_LEN), le_u32)(input)
}

fn binary_vector3(input: &[u8]) -> IResult<&[u8], (f32, f32, f32)> {
    tuple((le_f32, le_f32, le_f32))(input)
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], Triangle> {
    let (input, normal) = binary_vector3(input)?;
    let (input, (a, b, c)) = tuple((binary_vector3, binary_vector3, binary_vector3))(input)?;
    // Attribute byte count, unused
    let (input, _) = le_u16(input)?;
    Ok((input, facet(normal, [a, b, c])))
}

/// Build a triangle, deriving the normal from the winding when the file
/// stores a zero normal (common in exporter output).
fn facet(normal: (f32, f32, f32), corners: [(f32, f32, f32); 3]) -> Triangle {
    let vertex = |(x, y, z): (f32, f32, f32), n: (f32, f32, f32)| Vertex::new(x, y, z, n.0, n.1, n.2);
    let mut triangle = Triangle::new(
        vertex(corners[0], normal),
        vertex(corners[1], normal),
        vertex(corners[2], normal),
    );

    let stored = normal.0 * normal.0 + normal.1 * normal.1 + normal.2 * normal.2;
    if stored < 1e-12 {
        if let Some(n) = triangle.calculate_normal() {
            for v in &mut triangle.vertices {
                v.normal = n;
            }
        }
    }
    triangle
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, LoadError> {
    match ascii_solid(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(LoadError::Decode(format!("failed to parse ASCII STL: {:?}", e))),
    }
}

fn ascii_solid(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = not_line_ending(input)?; // optional solid name
    let (input, triangles) = many0(ascii_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;

    let mut mesh = Mesh::with_capacity(triangles.len());
    for triangle in triangles {
        mesh.add_triangle(triangle);
    }

    Ok((input, mesh))
}

fn ascii_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = ascii_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, a) = ascii_vertex(input)?;
    let (input, b) = ascii_vertex(input)?;
    let (input, c) = ascii_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, facet(normal, [a, b, c])))
}

fn ascii_vertex(input: &str) -> IResult<&str, (f32, f32, f32)> {
    preceded(preceded(multispace0, tag("vertex")), ascii_vector3)(input)
}

fn ascii_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

fn nom_error(e: nom::Err<nom::error::Error<&[u8]>>) -> LoadError {
    let detail = match e {
        nom::Err::Incomplete(_) => "unexpected end of file".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => format!("{:?} at {} bytes from end", e.code, e.input.len()),
    };
    LoadError::Decode(format!("malformed binary STL: {}", detail))
}

/// Detect and parse an STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<Mesh, LoadError> {
    // Binary files may also start with "solid", so fall back on failure
    if data.starts_with(b"solid") {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(mesh) = parse_ascii_stl(text) {
                return Ok(mesh);
            }
        }
    }

    parse_binary_stl(data)
}
