use crate::ObjectPoints;
use nalgebra::{Matrix3, Matrix3x4, Point2, Rotation3, Unit, Vector3};

/// `fx = fy = 800`, `cx = 640`, `cy = 480`, looking down at the plane from `(0, -0.2, 1)`.
pub fn reference_camera() -> Matrix3x4<f64> {
    let k = Matrix3::new(800.0, 0.0, 640.0, 0.0, 800.0, 480.0, 0.0, 0.0, 1.0);
    let rotation = Rotation3::from_axis_angle(
        &Unit::new_normalize(Vector3::new(1.0, 1.0, 0.0)),
        165f64.to_radians(),
    );
    let t = -(rotation * Vector3::new(0.0, -0.2, 1.0));
    let mut rt = Matrix3x4::zeros();
    rt.fixed_columns_mut::<3>(0).copy_from(rotation.matrix());
    rt.set_column(3, &t);
    k * rt
}

pub fn square() -> ObjectPoints {
    ObjectPoints::from_points([
        Point2::new(1.0, 1.0),
        Point2::new(-1.0, 1.0),
        Point2::new(1.0, -1.0),
        Point2::new(-1.0, -1.0),
    ])
}
