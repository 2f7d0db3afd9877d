//! Background colour estimation by k-means clustering of border pixels.
//!
//! Pixels are sampled along the four image edges and grouped into `k`
//! colour clusters. The centroid of the most populated cluster is taken
//! as the background colour.
//!
//! Initial centroids are drawn at random from the samples. The RNG is
//! supplied by the caller so results can be pinned with a seed; with an
//! entropy-seeded RNG, images whose border mixes several colours in
//! similar proportions may pick a different background on each run.

use image::RgbaImage;
use rand::Rng;
use rand::seq::SliceRandom;

/// An RGB colour with floating-point channels in `0.0..=255.0`.
pub type RgbF = [f64; 3];

/// Upper bound on k-means iterations. Lloyd's algorithm always
/// converges, but float rounding can leave a centroid oscillating by
/// less than a representable step.
const MAX_ITERATIONS: usize = 256;

/// Result of a k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Final centroid of each cluster.
    pub centroids: Vec<RgbF>,
    /// Number of samples assigned to each cluster.
    pub sizes: Vec<usize>,
    /// Number of assign/update rounds performed.
    pub iterations: usize,
}

impl Clustering {
    /// Centroid of the most populated cluster. Ties go to the lowest
    /// cluster index.
    #[must_use]
    pub fn dominant(&self) -> Option<RgbF> {
        let (best, _) = self
            .sizes
            .iter()
            .enumerate()
            .fold(None::<(usize, usize)>, |acc, (i, &size)| match acc {
                Some((_, best_size)) if best_size >= size => acc,
                _ => Some((i, size)),
            })?;
        self.centroids.get(best).copied()
    }
}

/// Euclidean distance between two RGB colours.
#[must_use]
pub fn rgb_distance(a: RgbF, b: RgbF) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr.mul_add(dr, dg.mul_add(dg, db * db)).sqrt()
}

/// RGB channels of an RGBA pixel as floats.
#[must_use]
pub fn rgb_of(pixel: image::Rgba<u8>) -> RgbF {
    [
        f64::from(pixel.0[0]),
        f64::from(pixel.0[1]),
        f64::from(pixel.0[2]),
    ]
}

/// Sample pixels along the four edges of `image`.
///
/// The stride is a tenth of the shorter dimension (at least 1), so a
/// large image contributes roughly forty samples.
#[must_use]
pub fn sample_border(image: &RgbaImage) -> Vec<RgbF> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let stride = (width.min(height) / 10).max(1) as usize;

    let mut samples = Vec::new();
    for x in (0..width).step_by(stride) {
        samples.push(rgb_of(*image.get_pixel(x, 0)));
        samples.push(rgb_of(*image.get_pixel(x, height - 1)));
    }
    for y in (0..height).step_by(stride) {
        samples.push(rgb_of(*image.get_pixel(0, y)));
        samples.push(rgb_of(*image.get_pixel(width - 1, y)));
    }
    samples
}

/// Cluster `samples` into at most `k` groups.
///
/// Iterates nearest-centroid assignment and centroid-mean update until
/// every centroid moves less than `convergence` between rounds. A
/// cluster that loses all its samples keeps its previous centroid.
///
/// Returns `None` when `samples` is empty or `k` is zero.
pub fn kmeans<R: Rng + ?Sized>(
    samples: &[RgbF],
    k: usize,
    convergence: f64,
    rng: &mut R,
) -> Option<Clustering> {
    let k = k.min(samples.len());
    if k == 0 {
        return None;
    }

    let mut centroids: Vec<RgbF> = samples.choose_multiple(rng, k).copied().collect();
    let mut iterations = 0;

    loop {
        let assignment = assign(samples, &centroids);
        let mut sums = vec![[0.0; 3]; k];
        let mut counts = vec![0_usize; k];
        for (sample, &cluster) in samples.iter().zip(&assignment) {
            for (acc, v) in sums[cluster].iter_mut().zip(sample) {
                *acc += v;
            }
            counts[cluster] += 1;
        }

        let mut max_shift: f64 = 0.0;
        for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
            if count == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let n = count as f64;
            let updated = [sum[0] / n, sum[1] / n, sum[2] / n];
            max_shift = max_shift.max(rgb_distance(*centroid, updated));
            *centroid = updated;
        }

        iterations += 1;
        if max_shift < convergence {
            break;
        }
        if iterations >= MAX_ITERATIONS {
            tracing::debug!(iterations, max_shift, "k-means stopped before converging");
            break;
        }
    }

    let mut sizes = vec![0_usize; k];
    for cluster in assign(samples, &centroids) {
        sizes[cluster] += 1;
    }

    Some(Clustering {
        centroids,
        sizes,
        iterations,
    })
}

/// Index of the nearest centroid for every sample (ties go to the lower
/// index).
fn assign(samples: &[RgbF], centroids: &[RgbF]) -> Vec<usize> {
    samples
        .iter()
        .map(|&s| {
            centroids
                .iter()
                .enumerate()
                .map(|(i, &c)| (i, rgb_distance(s, c)))
                .fold((0, f64::INFINITY), |best, cur| {
                    if cur.1 < best.1 { cur } else { best }
                })
                .0
        })
        .collect()
}

/// Estimate the background colour of `image` from its border pixels.
pub fn estimate_background<R: Rng + ?Sized>(
    image: &RgbaImage,
    k: usize,
    convergence: f64,
    rng: &mut R,
) -> Option<RgbF> {
    let samples = sample_border(image);
    let clustering = kmeans(&samples, k, convergence, rng)?;
    tracing::trace!(
        samples = samples.len(),
        iterations = clustering.iterations,
        sizes = ?clustering.sizes,
        "clustered border samples"
    );
    clustering.dominant()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn empty_samples_produce_nothing() {
        assert!(kmeans(&[], 3, 1.0, &mut rng()).is_none());
    }

    #[test]
    fn k_is_capped_by_sample_count() {
        let samples = [[1.0, 2.0, 3.0], [200.0, 200.0, 200.0]];
        let clustering = kmeans(&samples, 3, 1.0, &mut rng()).unwrap();
        assert_eq!(clustering.centroids.len(), 2);
        assert_eq!(clustering.sizes.iter().sum::<usize>(), 2);
    }

    #[test]
    fn uniform_samples_converge_to_that_color() {
        let samples = vec![[255.0, 255.0, 255.0]; 40];
        let clustering = kmeans(&samples, 3, 1.0, &mut rng()).unwrap();
        assert_eq!(clustering.dominant(), Some([255.0, 255.0, 255.0]));
    }

    #[test]
    fn majority_color_wins() {
        let mut samples = vec![[250.0, 250.0, 250.0]; 30];
        samples.extend(vec![[10.0, 10.0, 200.0]; 8]);
        samples.extend(vec![[200.0, 10.0, 10.0]; 4]);
        for seed in 0..10 {
            let clustering = kmeans(&samples, 3, 1.0, &mut StdRng::seed_from_u64(seed)).unwrap();
            let bg = clustering.dominant().unwrap();
            assert!(
                rgb_distance(bg, [250.0, 250.0, 250.0]) < 1.0,
                "seed {seed}: expected white background, got {bg:?}"
            );
        }
    }

    #[test]
    fn same_seed_same_result() {
        let samples: Vec<RgbF> = (0..60)
            .map(|i| {
                let v = f64::from(i * 4);
                [v, 255.0 - v, 128.0]
            })
            .collect();
        let a = kmeans(&samples, 3, 1.0, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = kmeans(&samples, 3, 1.0, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dominant_tie_goes_to_lowest_index() {
        let clustering = Clustering {
            centroids: vec![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]],
            sizes: vec![5, 5],
            iterations: 1,
        };
        assert_eq!(clustering.dominant(), Some([1.0, 1.0, 1.0]));
    }

    #[test]
    fn border_sampling_uses_stride() {
        let img = RgbaImage::from_pixel(100, 50, image::Rgba([9, 9, 9, 255]));
        let samples = sample_border(&img);
        // stride = 50 / 10 = 5: 20 columns x 2 rows + 10 rows x 2 columns.
        assert_eq!(samples.len(), 20 * 2 + 10 * 2);
        assert!(samples.iter().all(|&s| s == [9.0, 9.0, 9.0]));
    }

    #[test]
    fn tiny_image_samples_every_border_pixel() {
        let img = RgbaImage::from_pixel(3, 3, image::Rgba([1, 2, 3, 255]));
        assert_eq!(sample_border(&img).len(), 12);
    }

    #[test]
    fn estimate_background_of_framed_image() {
        let img = RgbaImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([240, 240, 240, 255])
            }
        });
        let bg = estimate_background(&img, 3, 1.0, &mut rng()).unwrap();
        assert!(rgb_distance(bg, [240.0, 240.0, 240.0]) < 1.0);
    }
}
