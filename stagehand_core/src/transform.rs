//! Local transform of a scene object.

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Point3, Quaternion, Rotation3, Translation3, UnitQuaternion,
    Vector3,
};
use serde::{Deserialize, Serialize};

/// Local position, rotation, and scale relative to the object's reference frame.
///
/// The transforms are performed in this order: scale, then rotation, then translation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformData", into = "TransformData")]
pub struct Transform {
    iso: Isometry3<f32>,
    scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            iso: Isometry3::identity(),
            scale: Vector3::from_element(1.0),
        }
    }
}

impl Transform {
    /// Create a new Transform.
    ///
    /// ```rust
    /// # use stagehand_core::Transform;
    /// # use nalgebra::{Translation3, UnitQuaternion, Vector3};
    /// let position = Translation3::new(0.0, 2.0, 4.0);
    /// let rotation = UnitQuaternion::from_euler_angles(0.4, 0.2, 0.0);
    /// let scale = Vector3::new(1.0, 1.0, 1.0);
    ///
    /// let t = Transform::new(position, rotation, scale);
    ///
    /// assert_eq!(t.translation().y, 2.0);
    /// ```
    pub fn new(position: Translation3<f32>, rotation: UnitQuaternion<f32>, scale: Vector3<f32>) -> Self {
        Transform {
            iso: Isometry3::from_parts(position, rotation),
            scale,
        }
    }

    /// A transform that only translates.
    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Transform {
            iso: Isometry3::translation(translation.x, translation.y, translation.z),
            ..Default::default()
        }
    }

    /// Decomposes an affine matrix into a transform.
    ///
    /// Shear is discarded. A zero-length basis column keeps unit scale on that axis.
    pub fn from_matrix(m: &Matrix4<f32>) -> Self {
        let linear: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let mut scale = Vector3::from_element(1.0);
        let mut basis = Matrix3::identity();
        for i in 0..3 {
            let column = linear.column(i);
            let norm = column.norm();
            if norm > f32::EPSILON {
                scale[i] = norm;
                basis.set_column(i, &(column / norm));
            }
        }
        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis));
        let translation = Translation3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);

        Transform {
            iso: Isometry3::from_parts(translation, rotation),
            scale,
        }
    }

    /// Returns the local object matrix for the transform.
    ///
    /// Combined with the world matrix of the reference frame it gives the world matrix of the
    /// object.
    #[inline]
    pub fn matrix(&self) -> Matrix4<f32> {
        self.iso
            .to_homogeneous()
            .prepend_nonuniform_scaling(&self.scale)
    }

    /// Translation + rotation value.
    pub fn isometry(&self) -> &Isometry3<f32> {
        &self.iso
    }

    /// Returns a reference to the translation vector.
    #[inline]
    pub fn translation(&self) -> &Vector3<f32> {
        &self.iso.translation.vector
    }

    /// Returns a mutable reference to the translation vector.
    #[inline]
    pub fn translation_mut(&mut self) -> &mut Vector3<f32> {
        &mut self.iso.translation.vector
    }

    /// The translation as a point.
    pub fn position(&self) -> Point3<f32> {
        Point3::from(self.iso.translation.vector)
    }

    /// Returns a reference to the rotation quaternion.
    #[inline]
    pub fn rotation(&self) -> &UnitQuaternion<f32> {
        &self.iso.rotation
    }

    /// Returns a reference to the scale vector.
    #[inline]
    pub fn scale(&self) -> &Vector3<f32> {
        &self.scale
    }

    /// Sets the translation.
    #[inline]
    pub fn set_translation(&mut self, position: Vector3<f32>) -> &mut Self {
        self.iso.translation.vector = position;
        self
    }

    /// Sets the translation from its components.
    #[inline]
    pub fn set_translation_xyz(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.set_translation(Vector3::new(x, y, z))
    }

    /// Sets the rotation.
    #[inline]
    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) -> &mut Self {
        self.iso.rotation = rotation;
        self
    }

    /// Sets the scale.
    #[inline]
    pub fn set_scale(&mut self, scale: Vector3<f32>) -> &mut Self {
        self.scale = scale;
        self
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct TransformData {
    translation: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
}

impl From<TransformData> for Transform {
    fn from(data: TransformData) -> Self {
        let [x, y, z] = data.translation;
        let [i, j, k, w] = data.rotation;
        Transform::new(
            Translation3::new(x, y, z),
            UnitQuaternion::new_normalize(Quaternion::new(w, i, j, k)),
            Vector3::from(data.scale),
        )
    }
}

impl From<Transform> for TransformData {
    fn from(transform: Transform) -> Self {
        let q = transform.iso.rotation.quaternion().coords;
        TransformData {
            translation: transform.iso.translation.vector.into(),
            rotation: [q.x, q.y, q.z, q.w],
            scale: transform.scale.into(),
        }
    }
}
