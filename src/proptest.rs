//! Proptest strategies for geometries, operators and simple cell shapes.
use crate::element::FiniteElementType;
use crate::geometry::ElementGeometry;
use crate::operator::FunctionOperator;
use ::proptest::prelude::*;

/// Any element geometry, including the vertex.
pub fn element_geometry() -> impl Strategy<Value = ElementGeometry> {
    use ElementGeometry::*;
    prop_oneof![
        Just(Vertex0D),
        Just(Edge1D),
        Just(Triangle2D),
        Just(Quadrilateral2D),
        Just(Tetrahedron3D),
        Just(Hexahedron3D),
    ]
}

/// Geometries that may serve as cells of a mesh.
pub fn cell_geometry() -> impl Strategy<Value = ElementGeometry> {
    element_geometry().prop_filter("vertices are not cells", |geometry| geometry.dim() > 0)
}

/// Operators without reconstruction.
pub fn plain_operator() -> impl Strategy<Value = FunctionOperator> {
    use FunctionOperator::*;
    prop_oneof![
        Just(Identity),
        (0..3usize).prop_map(IdentityComponent),
        Just(Gradient),
        Just(Divergence),
        Just(NormalFlux),
        Just(TangentFlux),
        Just(SymmetricGradient),
        Just(Curl),
        Just(Trace),
        Just(Deviator),
        Just(TangentialGradient),
        Just(Laplacian),
        Just(Hessian),
    ]
}

/// Scalar element types with a single component.
pub fn scalar_element() -> impl Strategy<Value = FiniteElementType> {
    use FiniteElementType::*;
    prop_oneof![
        Just(H1P1 { ncomponents: 1 }),
        Just(H1P2 { ncomponents: 1 }),
        Just(H1Q1 { ncomponents: 1 }),
        Just(L2P0 { ncomponents: 1 }),
        Just(H1CR { ncomponents: 1 }),
    ]
}

fn point2() -> impl Strategy<Value = [f64; 2]> {
    // Coordinates far from the origin only add cancellation
    let range = -10.0..10.0;
    [range.clone(), range]
}

/// Triangles with the given minimum area, with corners in arbitrary order.
pub fn triangle_corners(min_area: f64) -> impl Strategy<Value = [[f64; 2]; 3]> {
    [point2(), point2(), point2()].prop_filter("triangle is too small", move |[a, b, c]| {
        let signed_area = 0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]));
        signed_area.abs() >= min_area
    })
}

/// A point in the reference domain of the given geometry.
pub fn reference_point(geometry: ElementGeometry) -> impl Strategy<Value = Vec<f64>> {
    let dim = geometry.dim();
    ::proptest::collection::vec(0.0..1.0, dim).prop_map(move |mut xi: Vec<f64>| {
        if geometry.is_simplex() {
            let sum: f64 = xi.iter().sum();
            if sum > 1.0 {
                for x in &mut xi {
                    *x /= sum;
                }
            }
        }
        xi
    })
}
