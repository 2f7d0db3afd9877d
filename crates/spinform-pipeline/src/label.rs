//! Connected-component labelling of a binary mask.
//!
//! Solid pixels are grouped into 8-connected components with a
//! stack-based flood fill. Seeds are discovered in row-major order, so
//! the component order (and ids) are reproducible for a given mask.
//! Components smaller than the configured minimum area are discarded as
//! noise and do not consume an id.

use crate::types::{Mask, PixelCoord};

/// One connected foreground shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Position of this component among the retained components, in
    /// discovery order.
    pub id: usize,
    /// Every pixel of the component, in flood-fill visiting order.
    pub pixels: Vec<PixelCoord>,
    /// Inclusive top-left corner of the bounding box.
    pub min: PixelCoord,
    /// Inclusive bottom-right corner of the bounding box.
    pub max: PixelCoord,
}

impl Component {
    /// Number of pixels in the component.
    #[must_use]
    pub const fn area(&self) -> usize {
        self.pixels.len()
    }
}

/// Components found in a mask plus the count of those dropped as noise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeling {
    /// Retained components, in discovery order.
    pub components: Vec<Component>,
    /// Number of components smaller than the minimum area.
    pub discarded: usize,
}

/// Label the solid pixels of `mask`, keeping components with at least
/// `min_shape_size` pixels.
#[must_use]
pub fn label(mask: &Mask, min_shape_size: usize) -> Vec<Component> {
    label_with_stats(mask, min_shape_size).components
}

/// Like [`label`], but also reports how many components were discarded.
#[must_use]
pub fn label_with_stats(mask: &Mask, min_shape_size: usize) -> Labeling {
    let (width, height) = (mask.width(), mask.height());
    let mut visited = vec![false; width as usize * height as usize];
    let index = |p: PixelCoord| p.y as usize * width as usize + p.x as usize;

    let mut components = Vec::new();
    let mut discarded = 0;
    let mut stack = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let seed = PixelCoord::new(x, y);
            if visited[index(seed)] || !mask.is_solid(i64::from(x), i64::from(y)) {
                continue;
            }

            let mut pixels = Vec::new();
            let (mut min, mut max) = (seed, seed);
            visited[index(seed)] = true;
            stack.push(seed);

            while let Some(p) = stack.pop() {
                pixels.push(p);
                min = PixelCoord::new(min.x.min(p.x), min.y.min(p.y));
                max = PixelCoord::new(max.x.max(p.x), max.y.max(p.y));

                for n in p.neighbors(width, height) {
                    let i = index(n);
                    if !visited[i] && mask.is_solid(i64::from(n.x), i64::from(n.y)) {
                        visited[i] = true;
                        stack.push(n);
                    }
                }
            }

            if pixels.len() >= min_shape_size {
                components.push(Component {
                    id: components.len(),
                    pixels,
                    min,
                    max,
                });
            } else {
                tracing::trace!(area = pixels.len(), ?seed, "discarded small component");
                discarded += 1;
            }
        }
    }

    tracing::debug!(
        retained = components.len(),
        discarded,
        "labelled connected components"
    );

    Labeling {
        components,
        discarded,
    }
}
