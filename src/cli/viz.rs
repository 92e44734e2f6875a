//! Terminal histograms for forecast distributions

use std::fmt::Write;

use console::style;

const BAR_MAX_WIDTH: usize = 50;

/// Which side of the target counts as success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSide {
    AtMost,
    AtLeast,
}

/// Render an ASCII histogram of `samples`
///
/// With a target, bins on the success side are drawn solid and the rest
/// shaded, and the bin holding the target is marked.
pub fn render_histogram(samples: &[f64], bins: usize, target: Option<(f64, TargetSide)>) -> String {
    let mut out = String::new();
    if samples.is_empty() || bins == 0 {
        return out;
    }

    let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    // Never more bins than points; a degenerate distribution gets one
    let bins = if max > min { bins.min(samples.len()) } else { 1 };
    let bin_width = if max > min {
        (max - min) / bins as f64
    } else {
        1.0
    };

    let mut counts: Vec<usize> = vec![0; bins];
    for &sample in samples {
        let bin = ((sample - min) / bin_width) as usize;
        counts[bin.min(bins - 1)] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(1).max(1);

    let target_bin = target.and_then(|(t, _)| {
        if t < min || t > max {
            None
        } else {
            Some((((t - min) / bin_width) as usize).min(bins - 1))
        }
    });

    let _ = writeln!(
        out,
        "   {} ({} points, {} bins):",
        style("Distribution").bold(),
        samples.len(),
        bins
    );
    let _ = writeln!(out);

    for (i, &count) in counts.iter().enumerate() {
        let bar_width = count * BAR_MAX_WIDTH / max_count;
        let bin_center = min + (i as f64 + 0.5) * bin_width;

        let success = match target {
            Some((t, TargetSide::AtMost)) => bin_center <= t,
            Some((t, TargetSide::AtLeast)) => bin_center >= t,
            None => true,
        };
        let bar = if success {
            style("█".repeat(bar_width)).green()
        } else {
            style("░".repeat(bar_width)).red()
        };
        let marker = if target_bin == Some(i) { " ◄target" } else { "" };

        let _ = writeln!(
            out,
            "   {:>12.2} │{}{}│ {:>5}{}",
            bin_center,
            bar,
            " ".repeat(BAR_MAX_WIDTH - bar_width),
            count,
            style(marker).cyan()
        );
    }

    let _ = writeln!(out, "   {:>12} └{}┘", "", "─".repeat(BAR_MAX_WIDTH));
    if let Some((t, side)) = target {
        let side = match side {
            TargetSide::AtMost => "at or under",
            TargetSide::AtLeast => "at or over",
        };
        let _ = writeln!(
            out,
            "   {} target={:.2}  (█ {} target, ░ otherwise)",
            style("Legend:").dim(),
            t,
            side
        );
    }
    out
}
