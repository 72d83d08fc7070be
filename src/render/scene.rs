//! Offscreen three-d scene: the isomap point cloud, x/y/z reference axes and
//! a black-edged marker on the current record.
//!
//! Renders into a colour + depth texture pair on a headless GL context and
//! reads the pixels back for the encoder.

use anyhow::{Context as _, Result};
use image::RgbaImage;
use three_d::*;
use tracing::{debug, info};

use super::palette::LabelPalette;
use crate::config::RenderConfig;
use crate::planner::CameraPose;
use crate::trajectory::TrajectoryRecord;

/// Elevation kept strictly inside the poles so the view basis stays defined
const MAX_ELEVATION: f64 = 89.9;

/// Edge sphere radius relative to the marker body
const MARKER_EDGE: f32 = 1.3;

/// x red, y green, z blue
const AXIS_COLORS: [[u8; 3]; 3] = [[214, 39, 40], [44, 160, 44], [31, 119, 180]];

pub struct SceneRenderer {
    // owns the GL surface the textures live on
    _context: HeadlessContext,
    camera: Camera,
    color_texture: Texture2D,
    depth_texture: DepthTexture2D,
    cloud: Option<Gm<InstancedMesh, ColorMaterial>>,
    axes: Option<Gm<InstancedMesh, ColorMaterial>>,
    marker_edge: Gm<Mesh, ColorMaterial>,
    marker: Gm<Mesh, ColorMaterial>,
    marker_visible: bool,
    background: [u8; 3],
    width: u32,
    height: u32,
}

impl SceneRenderer {
    /// Build the scene for `records`; the view is `render.width x height` pixels
    pub fn new(
        records: &[TrajectoryRecord],
        palette: &LabelPalette,
        render: &RenderConfig,
        height: u32,
    ) -> Result<Self> {
        let width = render.width;
        let context = HeadlessContext::new().context("creating headless GL context")?;

        let color_texture = Texture2D::new_empty::<[u8; 4]>(
            &context,
            width,
            height,
            Interpolation::Nearest,
            Interpolation::Nearest,
            None,
            Wrapping::ClampToEdge,
            Wrapping::ClampToEdge,
        );
        let depth_texture =
            DepthTexture2D::new::<f32>(&context, width, height, Wrapping::ClampToEdge, Wrapping::ClampToEdge);

        let camera = Camera::new_perspective(
            Viewport::new_at_origo(width, height),
            vec3(0.0, -2.0, 0.0),
            vec3(0.0, 0.0, 0.0),
            vec3(0.0, 0.0, 1.0),
            degrees(render.fov_degrees),
            0.01,
            1000.0,
        );

        let cloud = build_cloud(
            &context,
            records,
            palette,
            render.point_radius,
            render.point_alpha,
        );
        let axes = render
            .show_axes
            .then(|| build_axes(&context, axis_length(records), render.point_radius * 0.5));

        // drawn over the cloud: the black edge first, then the coloured body
        let marker_material = |color: Srgba| ColorMaterial {
            color,
            render_states: RenderStates {
                depth_test: DepthTest::Always,
                ..Default::default()
            },
            ..Default::default()
        };
        let sphere = CpuMesh::sphere(16);
        let marker_edge = Gm::new(Mesh::new(&context, &sphere), marker_material(Srgba::BLACK));
        let marker = Gm::new(Mesh::new(&context, &sphere), marker_material(Srgba::WHITE));

        info!(
            "Scene ready: {} points, {}x{} view",
            records.len(),
            width,
            height
        );

        Ok(Self {
            _context: context,
            camera,
            color_texture,
            depth_texture,
            cloud,
            axes,
            marker_edge,
            marker,
            marker_visible: false,
            background: render.background,
            width,
            height,
        })
    }

    /// Place the camera on the turntable sphere around the origin
    pub fn set_pose(&mut self, pose: CameraPose) {
        let eye = eye_position(pose);
        self.camera
            .set_view(vec3(eye[0], eye[1], eye[2]), vec3(0.0, 0.0, 0.0), vec3(0.0, 0.0, 1.0));
    }

    /// Move the marker onto a point and paint it in `color`
    pub fn highlight(&mut self, position: [f64; 3], color: [u8; 3], radius: f32) {
        let p = vec3(position[0] as f32, position[1] as f32, position[2] as f32);
        self.marker_edge
            .set_transformation(Mat4::from_translation(p) * Mat4::from_scale(radius * MARKER_EDGE));
        self.marker
            .set_transformation(Mat4::from_translation(p) * Mat4::from_scale(radius));
        self.marker.material.color = Srgba::new(color[0], color[1], color[2], 255);
        self.marker_visible = true;
    }

    pub fn render(&mut self) -> Result<RgbaImage> {
        let [r, g, b] = self.background;
        let clear = ClearState::color_and_depth(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            1.0,
            1.0,
        );

        let target = RenderTarget::new(
            self.color_texture.as_color_target(None),
            self.depth_texture.as_depth_target(),
        );
        target.clear(clear);
        if let Some(axes) = &self.axes {
            target.render(&self.camera, axes, &[]);
        }
        if let Some(cloud) = &self.cloud {
            target.render(&self.camera, cloud, &[]);
        }
        if self.marker_visible {
            target.render(&self.camera, &self.marker_edge, &[]);
            target.render(&self.camera, &self.marker, &[]);
        }

        let pixels: Vec<[u8; 4]> = target.read_color();
        let flat: Vec<u8> = pixels.iter().flat_map(|p| p.iter().copied()).collect();
        RgbaImage::from_raw(self.width, self.height, flat)
            .context("scene read-back does not match the view size")
    }
}

fn build_cloud(
    context: &Context,
    records: &[TrajectoryRecord],
    palette: &LabelPalette,
    radius: f32,
    alpha: f32,
) -> Option<Gm<InstancedMesh, ColorMaterial>> {
    if records.is_empty() {
        return None;
    }
    let point_alpha = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;

    let mut instances = Instances {
        transformations: Vec::with_capacity(records.len()),
        colors: Some(Vec::with_capacity(records.len())),
        ..Default::default()
    };
    for record in records {
        let [x, y, z] = record.position;
        instances.transformations.push(
            Mat4::from_translation(vec3(x as f32, y as f32, z as f32)) * Mat4::from_scale(radius),
        );
        let [r, g, b] = palette.colors(&record.label).point;
        if let Some(colors) = instances.colors.as_mut() {
            colors.push(Srgba::new(r, g, b, point_alpha));
        }
    }
    debug!("Point cloud: {} instances", instances.transformations.len());

    let material = ColorMaterial {
        render_states: RenderStates {
            blend: Blend::TRANSPARENCY,
            ..Default::default()
        },
        is_transparent: point_alpha < 255,
        ..Default::default()
    };
    let sphere = CpuMesh::sphere(8);
    Some(Gm::new(
        InstancedMesh::new(context, &instances, &sphere),
        material,
    ))
}

fn build_axes(context: &Context, length: f32, radius: f32) -> Gm<InstancedMesh, ColorMaterial> {
    let instances = Instances {
        transformations: axis_transforms(length, radius).to_vec(),
        colors: Some(
            AXIS_COLORS
                .iter()
                .map(|&[r, g, b]| Srgba::new_opaque(r, g, b))
                .collect(),
        ),
        ..Default::default()
    };
    Gm::new(
        InstancedMesh::new(context, &instances, &CpuMesh::cylinder(12)),
        ColorMaterial::default(),
    )
}

/// Axes reach the farthest point from the origin
fn axis_length(records: &[TrajectoryRecord]) -> f32 {
    let farthest = records
        .iter()
        .map(|r| {
            let [x, y, z] = r.position;
            (x * x + y * y + z * z).sqrt()
        })
        .fold(0.0f64, f64::max);
    if farthest > 0.0 {
        farthest as f32
    } else {
        1.0
    }
}

/// Unit cylinders (along +x from the origin) stretched onto x, y and z
fn axis_transforms(length: f32, radius: f32) -> [Mat4; 3] {
    let shaft = Mat4::from_nonuniform_scale(length, radius, radius);
    [
        shaft,
        Mat4::from_angle_z(degrees(90.0)) * shaft,
        Mat4::from_angle_y(degrees(-90.0)) * shaft,
    ]
}

/// Camera position for a pose: azimuth 0 looks from −y, z is up
pub fn eye_position(pose: CameraPose) -> [f32; 3] {
    let azimuth = pose.azimuth.to_radians();
    let elevation = pose
        .elevation
        .clamp(-MAX_ELEVATION, MAX_ELEVATION)
        .to_radians();
    let d = pose.distance;
    [
        (d * azimuth.sin() * elevation.cos()) as f32,
        (-d * azimuth.cos() * elevation.cos()) as f32,
        (d * elevation.sin()) as f32,
    ]
}
