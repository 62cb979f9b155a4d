//! Horizontal support surfaces of a mesh
//!
//! Finds the planes a mesh offers for resting other objects on (table tops,
//! shelf boards) and splits them into child-sized slots.

use rand::Rng;

use crate::geometry::{Mesh, Vec2, Vec3, EPSILON};

/// Surface samples drawn per mesh
pub const SAMPLE_COUNT: usize = 50_000;

/// Minimum `normal . up` for a sample to count as upward facing
const UP_THRESHOLD: f64 = 0.98;

/// Samples at or below this height are floor contact, not support
const GROUND_CLEARANCE: f64 = 0.2;

const CLUSTERS: usize = 4;
const MAX_KMEANS_ITERATIONS: usize = 100;

/// Clusters holding a smaller share of the samples are noise
const MIN_CLUSTER_SHARE: f64 = 0.05;

/// Inset applied to a plane's rectangle on every side
const EDGE_MARGIN: f64 = 0.1;

/// Axis-aligned rectangle on the floor plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    fn bounding(points: &[Vec2]) -> Option<Rect> {
        let first = *points.first()?;
        let (min, max) = points.iter().fold((first, first), |(lo, hi), p| {
            (
                Vec2::new(lo.x.min(p.x), lo.z.min(p.z)),
                Vec2::new(hi.x.max(p.x), hi.z.max(p.z)),
            )
        });
        Some(Rect { min, max })
    }

    /// Shrink by `margin` on every side; an axis that would invert collapses
    /// to its midpoint.
    fn inset(self, margin: f64) -> Rect {
        let axis = |lo: f64, hi: f64| {
            if hi - lo >= 2.0 * margin {
                (lo + margin, hi - margin)
            } else {
                let mid = (lo + hi) / 2.0;
                (mid, mid)
            }
        };
        let (x0, x1) = axis(self.min.x, self.max.x);
        let (z0, z1) = axis(self.min.z, self.max.z);
        Rect {
            min: Vec2::new(x0, z0),
            max: Vec2::new(x1, z1),
        }
    }

    pub fn area(&self) -> f64 {
        (self.max.x - self.min.x) * (self.max.z - self.min.z)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }

    /// Centres of a grid of cells at least `w` x `d` in size
    fn cell_centers(&self, w: f64, d: f64) -> Vec<Vec2> {
        let partitions = |len: f64, size: f64| {
            if size <= EPSILON {
                1
            } else {
                ((len / size).floor() as usize).max(1)
            }
        };
        let (lx, lz) = (self.max.x - self.min.x, self.max.z - self.min.z);
        let (nx, nz) = (partitions(lx, w), partitions(lz, d));
        let (sx, sz) = (lx / nx as f64, lz / nz as f64);
        let mut out = Vec::with_capacity(nx * nz);
        for i in 0..nx {
            for j in 0..nz {
                out.push(Vec2::new(
                    self.min.x + (i as f64 + 0.5) * sx,
                    self.min.z + (j as f64 + 0.5) * sz,
                ));
            }
        }
        out
    }
}

/// One detected support plane
#[derive(Debug, Clone)]
pub struct SupportPlane {
    /// Mean height of the plane's samples
    pub height: f64,
    /// Share of all support samples on this plane
    pub prob: f64,
    points: Vec<Vec2>,
}

impl SupportPlane {
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }
}

/// A candidate resting position on a support plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportSlot {
    /// Cell centre at plane height
    pub position: Vec3,
    pub prob: f64,
}

/// Upward-facing surface samples of a mesh
#[derive(Debug, Clone)]
pub struct SupportRegions {
    points: Vec<Vec3>,
}

impl SupportRegions {
    /// Sample `mesh` (in room space) and keep upward-facing points above the floor
    pub fn new<R: Rng + ?Sized>(mesh: &Mesh, rng: &mut R) -> Self {
        let points = mesh
            .sample_surface(SAMPLE_COUNT, rng)
            .into_iter()
            .filter(|s| s.normal.dot(Vec3::UP) > UP_THRESHOLD && s.point.y > GROUND_CLEARANCE)
            .map(|s| s.point)
            .collect();
        Self { points }
    }

    /// Use already filtered support points
    pub fn from_points(points: Vec<Vec3>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Support planes from highest to lowest
    pub fn planes(&self) -> Vec<SupportPlane> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let heights: Vec<f64> = self.points.iter().map(|p| p.y).collect();
        let labels = kmeans_1d(&heights, CLUSTERS);

        let total = self.points.len() as f64;
        let mut planes = Vec::new();
        for k in 0..CLUSTERS {
            let members: Vec<&Vec3> = self
                .points
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == k)
                .map(|(p, _)| p)
                .collect();
            if members.is_empty() {
                continue;
            }
            let prob = members.len() as f64 / total;
            if prob < MIN_CLUSTER_SHARE {
                continue;
            }
            let height = members.iter().map(|p| p.y).sum::<f64>() / members.len() as f64;
            planes.push(SupportPlane {
                height,
                prob,
                points: members.iter().map(|p| p.xz()).collect(),
            });
        }
        planes.sort_by(|a, b| b.height.total_cmp(&a.height));
        planes
    }

    /// Slots for `w` x `d` children on the top plane and on lower planes
    /// that stick out from under it, in randomized probability order.
    ///
    /// Empty when no plane was found; callers fall back to a naive layout.
    pub fn locations_on_top<R: Rng + ?Sized>(&self, w: f64, d: f64, rng: &mut R) -> Vec<Vec3> {
        let planes = self.planes();
        let Some(top) = planes.first() else {
            return Vec::new();
        };
        let Some(top_rect) = Rect::bounding(&top.points) else {
            return Vec::new();
        };

        let mut accepted = vec![(top_rect.inset(EDGE_MARGIN), top.height, top.prob)];
        for plane in &planes[1..] {
            let Some(&(last, _, _)) = accepted.last() else {
                break;
            };
            let remaining: Vec<Vec2> = plane
                .points
                .iter()
                .copied()
                .filter(|p| !last.contains(*p))
                .collect();
            let Some(rect) = Rect::bounding(&remaining) else {
                continue;
            };
            let rect = rect.inset(EDGE_MARGIN);
            if rect.area() < w * d {
                continue;
            }
            accepted.push((rect, plane.height, plane.prob));
        }

        probabilistic_order(slots(&accepted, w, d), rng)
    }

    /// Slots on every plane, without excluding covered areas (open shelving)
    pub fn locations_inside<R: Rng + ?Sized>(&self, w: f64, d: f64, rng: &mut R) -> Vec<Vec3> {
        let accepted: Vec<(Rect, f64, f64)> = self
            .planes()
            .iter()
            .filter_map(|p| {
                Rect::bounding(&p.points).map(|r| (r.inset(EDGE_MARGIN), p.height, p.prob))
            })
            .collect();
        probabilistic_order(slots(&accepted, w, d), rng)
    }
}

fn slots(planes: &[(Rect, f64, f64)], w: f64, d: f64) -> Vec<SupportSlot> {
    let mut out = Vec::new();
    for (rect, height, prob) in planes {
        let cells = rect.cell_centers(w, d);
        let per_cell = prob / cells.len() as f64;
        out.extend(cells.into_iter().map(|c| SupportSlot {
            position: c.at_height(*height),
            prob: per_cell,
        }));
    }
    out
}

/// Weighted random order: each slot draws `-ln(U) / p` and the smallest
/// keys come first, so likelier slots tend to lead.
fn probabilistic_order<R: Rng + ?Sized>(slots: Vec<SupportSlot>, rng: &mut R) -> Vec<Vec3> {
    let mut keyed: Vec<(f64, Vec3)> = slots
        .into_iter()
        .map(|s| {
            let u: f64 = 1.0 - rng.gen::<f64>();
            (-u.ln() / s.prob, s.position)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, p)| p).collect()
}

/// Lloyd's algorithm on scalars, seeded with centres spread evenly over the
/// value range; returns a cluster label per value.
fn kmeans_1d(values: &[f64], k: usize) -> Vec<usize> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut centers: Vec<f64> = (0..k)
        .map(|i| {
            if k > 1 {
                lo + (hi - lo) * i as f64 / (k - 1) as f64
            } else {
                lo
            }
        })
        .collect();

    let nearest = |v: f64, centers: &[f64]| {
        let mut best = 0;
        for (i, c) in centers.iter().enumerate() {
            if (v - c).abs() < (v - centers[best]).abs() {
                best = i;
            }
        }
        best
    };

    let mut labels: Vec<usize> = values.iter().map(|&v| nearest(v, &centers)).collect();
    for _ in 0..MAX_KMEANS_ITERATIONS {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (&v, &l) in values.iter().zip(&labels) {
            sums[l] += v;
            counts[l] += 1;
        }
        for i in 0..k {
            if counts[i] > 0 {
                centers[i] = sums[i] / counts[i] as f64;
            }
        }
        let next: Vec<usize> = values.iter().map(|&v| nearest(v, &centers)).collect();
        if next == labels {
            break;
        }
        labels = next;
    }
    labels
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn grid(x0: f64, x1: f64, z0: f64, z1: f64, y: f64, step: f64) -> Vec<Vec3> {
        let mut pts = Vec::new();
        let mut x = x0;
        while x <= x1 + 1e-9 {
            let mut z = z0;
            while z <= z1 + 1e-9 {
                pts.push(Vec3::new(x, y, z));
                z += step;
            }
            x += step;
        }
        pts
    }

    #[test]
    fn test_kmeans_separates_levels() {
        let values = [0.4, 0.41, 0.39, 1.2, 1.21, 1.19];
        let labels = kmeans_1d(&values, 2);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_planes_sorted_top_down() {
        let mut pts = grid(0.0, 1.0, 0.0, 1.0, 0.5, 0.05);
        pts.extend(grid(0.0, 1.0, 0.0, 1.0, 1.5, 0.05));
        let planes = SupportRegions::from_points(pts).planes();
        assert_eq!(planes.len(), 2);
        assert!((planes[0].height - 1.5).abs() < 1e-9);
        assert!((planes[1].height - 0.5).abs() < 1e-9);
        assert!((planes[0].prob - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_slots_cover_top_plane() {
        let pts = grid(0.0, 1.2, 0.0, 0.6, 0.8, 0.02);
        let regions = SupportRegions::from_points(pts);
        let mut rng = StdRng::seed_from_u64(3);
        let slots = regions.locations_on_top(0.3, 0.3, &mut rng);
        // 1.0 x 0.4 after the inset -> 3 x 1 cells
        assert_eq!(slots.len(), 3);
        for s in &slots {
            assert!((s.y - 0.8).abs() < 1e-9);
            assert!(s.x > 0.1 && s.x < 1.1);
            assert!((s.z - 0.3).abs() < 1e-9);
        }
    }

    #[test]
    fn test_lower_plane_under_top_is_skipped() {
        let mut pts = grid(0.0, 1.0, 0.0, 1.0, 1.0, 0.05);
        pts.extend(grid(0.2, 0.8, 0.2, 0.8, 0.5, 0.05));
        let regions = SupportRegions::from_points(pts);
        let mut rng = StdRng::seed_from_u64(1);
        let slots = regions.locations_on_top(0.35, 0.35, &mut rng);
        assert!(slots.iter().all(|s| (s.y - 1.0).abs() < 1e-9));
        assert_eq!(slots.len(), 4);
    }

    #[test]
    fn test_no_support_points_yields_no_slots() {
        let regions = SupportRegions::from_points(Vec::new());
        let mut rng = StdRng::seed_from_u64(0);
        assert!(regions.locations_on_top(0.2, 0.2, &mut rng).is_empty());
    }

    #[test]
    fn test_table_mesh_offers_its_top() {
        let mesh = Mesh::table(Vec3::new(1.2, 0.8, 0.6), 0.05, 0.05)
            .translated(Vec3::new(2.0, 0.4, 2.0));
        let mut rng = StdRng::seed_from_u64(11);
        let regions = SupportRegions::new(&mesh, &mut rng);
        let planes = regions.planes();
        assert_eq!(planes.len(), 1, "leg tops are too small to count");
        assert!((planes[0].height - 0.8).abs() < 1e-9);
    }
}
