#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pixel-accurate sprite collision testing.
//!
//! Sprites are opaque-pixel masks placed in world space by a pose (position,
//! rotation, uniform scale, origin at the mask center). Collision runs in two
//! stages: a cheap axis-aligned pre-filter over the world-space bounds of
//! each mask's trimmed opaque region, then a per-pixel walk over the overlap
//! rectangle sampling both masks through their inverse transforms. The first
//! opaque/opaque pixel pair declares the hit.

use std::collections::HashMap;

use glam::{Affine2, Vec2};
use petal_defence_core::WorldPoint;

/// Alpha value strictly above which a pixel counts as opaque.
pub const ALPHA_THRESHOLD: u8 = 10;

/// Axis-aligned rectangle in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    /// Lower-left corner.
    pub min: Vec2,
    /// Upper-right corner.
    pub max: Vec2,
}

impl Bounds {
    /// Smallest axis-aligned rectangle containing the given points.
    #[must_use]
    pub fn enclosing(points: &[Vec2]) -> Self {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for point in points {
            min = min.min(*point);
            max = max.max(*point);
        }
        Self { min, max }
    }

    /// Overlap of two rectangles, if their interiors intersect.
    #[must_use]
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min.x < max.x && min.y < max.y {
            Some(Bounds { min, max })
        } else {
            None
        }
    }
}

/// Opaque-pixel mask of one sprite texture.
#[derive(Clone, Debug)]
pub struct SpriteMask {
    width: u32,
    height: u32,
    opaque: Vec<bool>,
    // Trimmed opaque region in local pixel coordinates; None when the
    // texture is fully transparent.
    trimmed: Option<(u32, u32, u32, u32)>,
}

impl SpriteMask {
    /// Builds a mask from a tightly packed RGBA8 pixel buffer.
    ///
    /// # Panics
    ///
    /// Panics when the buffer length does not match `width * height * 4`;
    /// masks are built from static assets at startup, so a mismatch is a
    /// broken asset, not a runtime condition.
    #[must_use]
    pub fn from_rgba(width: u32, height: u32, pixels: &[u8]) -> Self {
        let expected = width as usize * height as usize * 4;
        assert_eq!(
            pixels.len(),
            expected,
            "pixel buffer is {} bytes, mask {width}x{height} needs {expected}",
            pixels.len()
        );
        let opaque: Vec<bool> = pixels
            .chunks_exact(4)
            .map(|px| px[3] > ALPHA_THRESHOLD)
            .collect();
        Self::from_opaque(width, height, opaque)
    }

    /// Builds a fully opaque disc mask with the given pixel diameter.
    ///
    /// Headless runs have no textures; entities use disc masks sized from
    /// their attribute tables instead.
    #[must_use]
    pub fn disc(diameter: u32) -> Self {
        let radius = diameter as f32 / 2.0;
        let center = Vec2::splat(radius);
        let opaque = (0..diameter * diameter)
            .map(|index| {
                let x = (index % diameter) as f32 + 0.5;
                let y = (index / diameter) as f32 + 0.5;
                Vec2::new(x, y).distance_squared(center) <= radius * radius
            })
            .collect();
        Self::from_opaque(diameter, diameter, opaque)
    }

    fn from_opaque(width: u32, height: u32, opaque: Vec<bool>) -> Self {
        let mut trimmed = None;
        for y in 0..height {
            for x in 0..width {
                if opaque[(y * width + x) as usize] {
                    trimmed = Some(match trimmed {
                        None => (x, y, x, y),
                        Some((min_x, min_y, max_x, max_y)) => (
                            x.min(min_x),
                            y.min(min_y),
                            x.max(max_x),
                            y.max(max_y),
                        ),
                    });
                }
            }
        }
        Self {
            width,
            height,
            opaque,
            trimmed,
        }
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bounding rectangle of the opaque pixels in local pixel coordinates.
    ///
    /// Fully transparent masks report a zero-sized rectangle at the origin.
    #[must_use]
    pub fn trimmed_bounds(&self) -> Bounds {
        match self.trimmed {
            None => Bounds {
                min: Vec2::ZERO,
                max: Vec2::ZERO,
            },
            Some((min_x, min_y, max_x, max_y)) => Bounds {
                min: Vec2::new(min_x as f32, min_y as f32),
                max: Vec2::new((max_x + 1) as f32, (max_y + 1) as f32),
            },
        }
    }

    fn opaque_at(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.opaque[(y as u32 * self.width + x as u32) as usize]
    }
}

/// World-space placement of a sprite, origin at the mask center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpritePose {
    /// Position of the sprite center in world units.
    pub position: Vec2,
    /// Rotation in radians.
    pub rotation: f32,
    /// Uniform scale from pixels to world units.
    pub scale: f32,
}

impl SpritePose {
    /// Creates an unrotated pose at a world point.
    #[must_use]
    pub fn at(position: WorldPoint, scale: f32) -> Self {
        Self {
            position: Vec2::new(position.x, position.y),
            rotation: 0.0,
            scale,
        }
    }

    /// Local-pixel to world transform for the given mask.
    #[must_use]
    pub fn transform(&self, mask: &SpriteMask) -> Affine2 {
        let origin = Vec2::new(mask.width as f32 / 2.0, mask.height as f32 / 2.0);
        Affine2::from_scale_angle_translation(
            Vec2::splat(self.scale),
            self.rotation,
            self.position,
        ) * Affine2::from_translation(-origin)
    }
}

/// World-space bounds of a posed mask's trimmed opaque region.
#[must_use]
pub fn world_bounds(mask: &SpriteMask, pose: &SpritePose) -> Bounds {
    let local = mask.trimmed_bounds();
    let transform = pose.transform(mask);
    Bounds::enclosing(&[
        transform.transform_point2(local.min),
        transform.transform_point2(Vec2::new(local.max.x, local.min.y)),
        transform.transform_point2(Vec2::new(local.min.x, local.max.y)),
        transform.transform_point2(local.max),
    ])
}

/// Tests two posed masks for an opaque-pixel overlap.
#[must_use]
pub fn collide(
    mask_a: &SpriteMask,
    pose_a: &SpritePose,
    mask_b: &SpriteMask,
    pose_b: &SpritePose,
) -> bool {
    let bounds_a = world_bounds(mask_a, pose_a);
    let bounds_b = world_bounds(mask_b, pose_b);
    let Some(overlap) = bounds_a.intersection(&bounds_b) else {
        return false;
    };

    let inverse_a = pose_a.transform(mask_a).inverse();
    let inverse_b = pose_b.transform(mask_b).inverse();

    let x_range = overlap.min.x.floor() as i32..(overlap.max.x.ceil() as i32);
    let y_range = overlap.min.y.floor() as i32..(overlap.max.y.ceil() as i32);
    for i in x_range {
        for j in y_range.clone() {
            // Sample at the pixel center of the shared world grid.
            let point = Vec2::new(i as f32 + 0.5, j as f32 + 0.5);
            let local_a = inverse_a.transform_point2(point);
            let local_b = inverse_b.transform_point2(point);
            let opaque_a =
                mask_a.opaque_at(local_a.x.floor() as i32, local_a.y.floor() as i32);
            let opaque_b =
                mask_b.opaque_at(local_b.x.floor() as i32, local_b.y.floor() as i32);
            if opaque_a && opaque_b {
                return true;
            }
        }
    }
    false
}

/// Cache of masks keyed by sprite name, built once at startup.
#[derive(Debug, Default)]
pub struct MaskCache {
    masks: HashMap<String, SpriteMask>,
}

impl MaskCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mask under a sprite name, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, mask: SpriteMask) {
        let _ = self.masks.insert(name.into(), mask);
    }

    /// Mask registered under a sprite name.
    ///
    /// # Panics
    ///
    /// Panics when the name was never registered; sprite names come from
    /// static entity definitions, so a miss is a programming error.
    #[must_use]
    pub fn get(&self, name: &str) -> &SpriteMask {
        match self.masks.get(name) {
            Some(mask) => mask,
            None => panic!("sprite mask {name:?} was never registered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_square(size: u32, opaque_region: impl Fn(u32, u32) -> bool) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let alpha = if opaque_region(x, y) { 255 } else { 0 };
                pixels.extend_from_slice(&[255, 255, 255, alpha]);
            }
        }
        pixels
    }

    #[test]
    fn trimmed_bounds_drop_the_transparent_border() {
        let pixels = rgba_square(8, |x, y| (2..6).contains(&x) && (3..5).contains(&y));
        let mask = SpriteMask::from_rgba(8, 8, &pixels);
        let bounds = mask.trimmed_bounds();
        assert_eq!(bounds.min, Vec2::new(2.0, 3.0));
        assert_eq!(bounds.max, Vec2::new(6.0, 5.0));
    }

    #[test]
    fn alpha_at_threshold_is_transparent() {
        let mut pixels = rgba_square(2, |_, _| false);
        pixels[3] = ALPHA_THRESHOLD;
        pixels[7] = ALPHA_THRESHOLD + 1;
        let mask = SpriteMask::from_rgba(2, 2, &pixels);
        assert!(!mask.opaque_at(0, 0));
        assert!(mask.opaque_at(1, 0));
    }

    #[test]
    fn overlapping_discs_collide() {
        let mask = SpriteMask::disc(10);
        let a = SpritePose::at(WorldPoint::new(0.0, 0.0), 1.0);
        let b = SpritePose::at(WorldPoint::new(6.0, 0.0), 1.0);
        assert!(collide(&mask, &a, &mask, &b));
    }

    #[test]
    fn distant_discs_do_not_collide() {
        let mask = SpriteMask::disc(10);
        let a = SpritePose::at(WorldPoint::new(0.0, 0.0), 1.0);
        let b = SpritePose::at(WorldPoint::new(30.0, 0.0), 1.0);
        assert!(!collide(&mask, &a, &mask, &b));
    }

    #[test]
    fn bounds_overlap_without_opaque_overlap_is_not_a_hit() {
        // Two opposing diagonal triangles: world AABBs of the trimmed
        // regions overlap in a corner area, opaque pixels never do.
        let pixels_a = rgba_square(8, |x, y| x + y < 4);
        let pixels_b = rgba_square(8, |x, y| x + y > 10);
        let mask_a = SpriteMask::from_rgba(8, 8, &pixels_a);
        let mask_b = SpriteMask::from_rgba(8, 8, &pixels_b);
        let pose_a = SpritePose::at(WorldPoint::new(4.0, 4.0), 1.0);
        let pose_b = SpritePose::at(WorldPoint::new(3.0, 3.0), 1.0);
        let overlap = world_bounds(&mask_a, &pose_a)
            .intersection(&world_bounds(&mask_b, &pose_b));
        assert!(overlap.is_some(), "pre-filter must see an overlap");
        assert!(!collide(&mask_a, &pose_a, &mask_b, &pose_b));
    }

    #[test]
    fn scaled_mask_reaches_further() {
        let mask = SpriteMask::disc(10);
        let a = SpritePose::at(WorldPoint::new(0.0, 0.0), 2.0);
        let b = SpritePose::at(WorldPoint::new(14.0, 0.0), 1.0);
        assert!(collide(&mask, &a, &mask, &b));
    }

    #[test]
    fn mask_cache_returns_registered_masks() {
        let mut cache = MaskCache::new();
        cache.insert("bee", SpriteMask::disc(4));
        assert_eq!(cache.get("bee").width(), 4);
    }
}
