// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Surfcast Team.

//! Parameterized camera model and projection transforms
//!
//! Coordinate systems:
//! * OECS - eye space. Origin at the pinhole, X right, Y up, camera facing -Z.
//! * ITCS - image tangent space. Origin at the principal point, units are the
//!   tangent of the view angle, X right, Y down.
//! * IUCS - unit image space, [0,1]^2 over the whole image, Y down.
//! * IPCS - pixel space, [0,dims]^2, continuous (pixel centres at N+0.5).

use crate::geometry::BoundingBox;
use nalgebra::{Isometry3, Matrix4, Point2, Point3, Translation3, UnitQuaternion, Vector2};

/// Axis-aligned 2D affine: per-axis scale followed by translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxAffine2 {
    pub scales: Vector2<f64>,
    pub trans: Vector2<f64>,
}

impl AxAffine2 {
    pub fn new(scales: Vector2<f64>, trans: Vector2<f64>) -> Self {
        Self { scales, trans }
    }

    pub fn identity() -> Self {
        Self {
            scales: Vector2::new(1.0, 1.0),
            trans: Vector2::zeros(),
        }
    }

    pub fn transform(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::from(p.coords.component_mul(&self.scales) + self.trans)
    }

    /// self after inner: (self * inner)(p) == self(inner(p))
    pub fn compose(&self, inner: &AxAffine2) -> Self {
        Self {
            scales: self.scales.component_mul(&inner.scales),
            trans: self.scales.component_mul(&inner.trans) + self.trans,
        }
    }

    /// Scales must be non-zero
    pub fn inverse(&self) -> Self {
        let scales = Vector2::new(1.0 / self.scales.x, 1.0 / self.scales.y);
        Self {
            scales,
            trans: -scales.component_mul(&self.trans),
        }
    }
}

/// ITCS to IUCS given the half field-of-view tangent values of each axis,
/// assuming the principal point at image centre
pub fn itcs_to_iucs(half_fov_itcs: Vector2<f64>) -> AxAffine2 {
    AxAffine2::new(
        Vector2::new(0.5 / half_fov_itcs.x, 0.5 / half_fov_itcs.y),
        Vector2::new(0.5, 0.5),
    )
}

/// IUCS to IPCS for the given image pixel dimensions
pub fn iucs_to_ipcs(dims: [u32; 2]) -> AxAffine2 {
    AxAffine2::new(
        Vector2::new(dims[0] as f64, dims[1] as f64),
        Vector2::zeros(),
    )
}

/// View frustum with principal point at centre
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub near_half_width: f64,  // > 0
    pub near_half_height: f64, // > 0
    pub near_dist: f64,        // > 0
    pub far_dist: f64,         // > near_dist
}

/// A fully specified view of the world
#[derive(Debug, Clone)]
pub struct Camera {
    /// World to OECS
    pub modelview: Isometry3<f64>,
    pub frustum: Frustum,
    /// Projection for ray casting
    pub itcs_to_iucs: AxAffine2,
}

impl Camera {
    /// Homogeneous projection from world coordinates to IPCS with inverse
    /// depth in the Z slot after perspective division. Far objects get
    /// smaller output depth values; points behind the camera get negative
    /// inverse depth.
    pub fn project_ipcs(&self, dims: [u32; 2]) -> Matrix4<f64> {
        // OECS division by -Z, with the Y flip from Y-up to Y-down
        #[rustfmt::skip]
        let projection = Matrix4::new(
            1.0,  0.0,  0.0, 0.0,
            0.0, -1.0,  0.0, 0.0,
            0.0,  0.0,  0.0, 1.0,
            0.0,  0.0, -1.0, 0.0,
        );
        let itcs_to_ipcs = iucs_to_ipcs(dims).compose(&self.itcs_to_iucs);
        let mut itcs_to_ipcs_h = Matrix4::zeros();
        itcs_to_ipcs_h[(0, 0)] = itcs_to_ipcs.scales.x;
        itcs_to_ipcs_h[(1, 1)] = itcs_to_ipcs.scales.y;
        itcs_to_ipcs_h[(0, 3)] = itcs_to_ipcs.trans.x;
        itcs_to_ipcs_h[(1, 3)] = itcs_to_ipcs.trans.y;
        itcs_to_ipcs_h[(2, 2)] = 1.0;
        itcs_to_ipcs_h[(3, 3)] = 1.0;
        itcs_to_ipcs_h * projection * self.modelview.to_homogeneous()
    }
}

/// High-level camera specification from which a `Camera` is solved for any
/// viewport size
#[derive(Debug, Clone)]
pub struct CameraParams {
    /// Model bounds to be framed. Invalid (empty) bounds are handled.
    pub model_bounds: BoundingBox,
    /// Model rotation around the centre of the model bounds
    pub pose: UnitQuaternion<f64>,
    /// Model translation parallel to the image plane, relative to half the
    /// max model bound
    pub rel_trans: Vector2<f64>,
    /// Log scale relative to the automatically determined framing. The
    /// default leaves a margin plus room for perspective enlargement of parts
    /// nearer than the median plane.
    pub log_rel_scale: f64,
    /// Field of view of the larger image dimension in degrees. Clamped to
    /// [0.01,120]; values near the bottom of the range approximate an
    /// orthographic projection.
    pub fov_max_deg: f64,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            model_bounds: BoundingBox::empty(),
            pose: UnitQuaternion::identity(),
            rel_trans: Vector2::zeros(),
            log_rel_scale: -0.1,
            fov_max_deg: 17.0,
        }
    }
}

impl CameraParams {
    pub fn new(model_bounds: BoundingBox) -> Self {
        Self {
            model_bounds,
            ..Default::default()
        }
    }

    /// Solve the camera for the given viewport pixel size. Zero dimensions
    /// are bumped to 1 to avoid NaNs.
    pub fn camera(&self, mut dims: [u32; 2]) -> Camera {
        let (max_dim, centre) = if self.model_bounds.is_valid() {
            let max_dim = self.model_bounds.max_dim() as f64;
            // Degenerate bounds (single point) get a nominal size
            let max_dim = if max_dim == 0.0 { 2.0 } else { max_dim };
            let c = self.model_bounds.center();
            (max_dim, Point3::new(c.x as f64, c.y as f64, c.z as f64))
        } else {
            (2.0, Point3::origin())
        };
        if dims[0] == 0 || dims[1] == 0 {
            dims = [1, 1];
        }
        // Orthographic is approximated by a very narrow FOV; below 0.01
        // degrees depth precision breaks down
        let fov_deg_clamp = self.fov_max_deg.clamp(0.01, 120.0);
        let model_half_dim_max = max_dim * 0.5;
        let img_dim_max = dims[0].max(dims[1]) as f64;
        let rel_scale = self.log_rel_scale.exp();
        let half_fov_max_itcs = (fov_deg_clamp.to_radians() * 0.5).tan();
        // Place the model at the distance where its max dim just fills the
        // FOV, then adjust for the relative scale
        let z_centre_fill_image = model_half_dim_max / half_fov_max_itcs;
        let z_centre = z_centre_fill_image / rel_scale;
        let aspect = Vector2::new(dims[0] as f64 / img_dim_max, dims[1] as f64 / img_dim_max);
        // sqrt(3) ~= 1.7 is the distance to a bound corner relative to the
        // distance to its plane
        let z_far = z_centre + model_half_dim_max * 1.7;
        let z_near_raw = z_centre - model_half_dim_max * 1.7;
        let z_min = z_far * 0.01; // precision issues below this
        let z_near = z_near_raw.max(z_min);
        let frustum_near_half_width = model_half_dim_max * z_near / z_centre_fill_image;
        let trans = Translation3::new(
            self.rel_trans.x * model_half_dim_max,
            self.rel_trans.y * model_half_dim_max,
            -z_centre,
        );
        let modelview = Isometry3::from_parts(trans, UnitQuaternion::identity())
            * Isometry3::from_parts(Translation3::identity(), self.pose)
            * Isometry3::translation(-centre.x, -centre.y, -centre.z);
        let half_fov_itcs = aspect * half_fov_max_itcs;
        Camera {
            modelview,
            frustum: Frustum {
                near_half_width: frustum_near_half_width * aspect.x,
                near_half_height: frustum_near_half_width * aspect.y,
                near_dist: z_near,
                far_dist: z_far,
            },
            itcs_to_iucs: itcs_to_iucs(half_fov_itcs),
        }
    }
}
