use std::{cmp::Ordering, collections::BTreeMap};

use tracing::trace;

use crate::image::{palette::nearest_index, Rgb};

/// A set of histogram entries that will end up as one palette color
#[derive(Debug, Clone)]
struct ColorBox {
    entries: Vec<(Rgb, f64)>,
}

impl ColorBox {
    fn weight(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    fn mean(&self) -> [f64; 3] {
        let total = self.weight();
        let mut sum = [0.0; 3];
        for (color, w) in &self.entries {
            for (s, &c) in sum.iter_mut().zip(color) {
                *s += f64::from(c) * w;
            }
        }
        if total > 0.0 {
            sum.map(|s| s / total)
        } else {
            // all weights zero: plain average
            let n = self.entries.len() as f64;
            let mut plain = [0.0; 3];
            for (color, _) in &self.entries {
                for (p, &c) in plain.iter_mut().zip(color) {
                    *p += f64::from(c) / n;
                }
            }
            plain
        }
    }

    /// Weighted variance per channel
    fn variances(&self) -> [f64; 3] {
        let mean = self.mean();
        let mut var = [0.0; 3];
        for (color, w) in &self.entries {
            for ((v, &c), m) in var.iter_mut().zip(color).zip(mean) {
                let d = f64::from(c) - m;
                *v += w * d * d;
            }
        }
        var
    }

    /// Total weighted squared error of representing the box by its mean
    fn error(&self) -> f64 {
        self.variances().iter().sum()
    }

    fn representative(&self) -> Rgb {
        self.mean().map(to_channel)
    }

    /// Splits at the weighted median of the channel with the largest variance
    fn split(mut self) -> (Self, Self) {
        let variances = self.variances();
        let channel = (0..3)
            .max_by(|&a, &b| {
                variances[a]
                    .partial_cmp(&variances[b])
                    .unwrap_or(Ordering::Equal)
                    // prefer the lower channel on ties
                    .then(b.cmp(&a))
            })
            .unwrap_or(0);
        self.entries
            .sort_by(|(a, _), (b, _)| a[channel].cmp(&b[channel]).then(a.cmp(b)));

        let half = self.weight() / 2.0;
        let mut acc = 0.0;
        let mut cut = self.entries.len() - 1;
        for (i, (_, w)) in self.entries.iter().enumerate() {
            acc += w;
            if acc >= half {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.entries.len() - 1);
        let right = self.entries.split_off(cut);
        (self, Self { entries: right })
    }
}

fn to_channel(v: f64) -> u8 {
    // clamped to the channel range first
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let c = v.round().clamp(0.0, 255.0) as u8;
    c
}

/// Reduces a weighted color histogram to at most `max_colors` colors.
///
/// With no more distinct colors than `max_colors` the result is exactly those colors.
/// Otherwise boxes are split by weighted median cut, always splitting the box with the
/// largest weighted squared error, and the box means are refined by `passes` rounds of
/// weighted k-means. The result is sorted and free of duplicates; equal input always
/// gives equal output.
pub(crate) fn median_cut(histogram: &[(Rgb, f64)], max_colors: usize, passes: usize) -> Vec<Rgb> {
    let mut merged = BTreeMap::<Rgb, f64>::new();
    for &(color, w) in histogram {
        *merged.entry(color).or_default() += w;
    }
    if max_colors == 0 {
        return Vec::new();
    }
    if merged.len() <= max_colors {
        return merged.into_keys().collect();
    }
    let histogram = merged.into_iter().collect::<Vec<_>>();

    let mut boxes = vec![ColorBox {
        entries: histogram.clone(),
    }];
    while boxes.len() < max_colors {
        let mut worst: Option<(usize, f64)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.entries.len() < 2 {
                continue;
            }
            let err = b.error();
            if worst.map_or(true, |(_, e)| err > e) {
                worst = Some((i, err));
            }
        }
        let Some((i, _)) = worst else {
            break;
        };
        let (left, right) = boxes.remove(i).split();
        boxes.insert(i, right);
        boxes.insert(i, left);
    }
    trace!("median cut produced {} boxes", boxes.len());

    let mut palette = boxes.iter().map(ColorBox::representative).collect::<Vec<_>>();
    for pass in 0..passes {
        let refined = refine(&histogram, &palette);
        if refined == palette {
            trace!("k-means converged after {pass} passes");
            break;
        }
        palette = refined;
    }
    palette.sort_unstable();
    palette.dedup();
    palette
}

/// One weighted k-means step: every color moves to the mean of the entries closest to it
fn refine(histogram: &[(Rgb, f64)], palette: &[Rgb]) -> Vec<Rgb> {
    let mut sums = vec![([0.0f64; 3], 0.0f64); palette.len()];
    for &(color, w) in histogram {
        let Some(i) = nearest_index(palette, color) else {
            continue;
        };
        let (sum, total) = &mut sums[usize::from(i)];
        for (s, &c) in sum.iter_mut().zip(&color) {
            *s += f64::from(c) * w;
        }
        *total += w;
    }
    palette
        .iter()
        .zip(sums)
        .map(|(&old, (sum, total))| {
            if total > 0.0 {
                sum.map(|s| to_channel(s / total))
            } else {
                old
            }
        })
        .collect()
}
