/// Texture mapping for one triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleTexture {
    /// Per-vertex UVs, in vertex order.
    pub uvs: [[f32; 2]; 3],
    /// Layer in the bound texture array.
    pub layer: f32,
}

/// One face as produced by the geometry layer.
///
/// `color` is an opaque key (normally `#RRGGBB`); it doubles as the colour
/// cache key, so equal keys must mean equal colours.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub vertices: [[f32; 3]; 3],
    /// Face normal, replicated to all three vertices when packed.
    pub normal: [f32; 3],
    pub color: String,
    pub texture: Option<TriangleTexture>,
}

impl Triangle {
    pub fn new(vertices: [[f32; 3]; 3], normal: [f32; 3], color: impl Into<String>) -> Self {
        Self { vertices, normal, color: color.into(), texture: None }
    }

    #[must_use]
    pub fn with_texture(mut self, texture: TriangleTexture) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Unit normal from the winding `v0 → v1 → v2` (counter-clockwise front).
    ///
    /// Degenerate triangles yield `[0, 0, 0]`.
    pub fn face_normal(vertices: &[[f32; 3]; 3]) -> [f32; 3] {
        let [a, b, c] = vertices;
        let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let n = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len <= f32::EPSILON {
            [0.0; 3]
        } else {
            [n[0] / len, n[1] / len, n[2] / len]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_normal_follows_winding() {
        let v = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        assert_eq!(Triangle::face_normal(&v), [0.0, 0.0, 1.0]);
        let flipped = [v[0], v[2], v[1]];
        assert_eq!(Triangle::face_normal(&flipped), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn degenerate_face_has_zero_normal() {
        let v = [[1.0, 1.0, 1.0]; 3];
        assert_eq!(Triangle::face_normal(&v), [0.0; 3]);
    }
}
