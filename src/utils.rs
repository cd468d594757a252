//! Reporting helpers for planned routes.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::problem::Point;
use crate::solution::RoutePlan;

/// Format a duration as hours, minutes, and seconds.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}h {:02}m {:02}s", hours, minutes, seconds)
}

/// Save a plan to a text report.
pub fn save_plan<P: AsRef<Path>>(plan: &RoutePlan, path: P) -> std::io::Result<()> {
    let mut file = File::create(path)?;

    writeln!(file, "Route Plan")?;
    writeln!(file, "Total Length: {:.2}", plan.length)?;
    writeln!(file, "Stops: {}", plan.stop_count())?;
    writeln!(file, "Clusters: {}", plan.cluster_count())?;
    writeln!(file)?;

    for (i, (stops, length)) in plan
        .cluster_paths
        .iter()
        .zip(&plan.cluster_lengths)
        .enumerate()
    {
        write!(file, "Cluster #{}: ", i + 1)?;

        if stops.is_empty() {
            writeln!(file, "Empty")?;
            continue;
        }

        writeln!(file, "{}", stops.join(" -> "))?;
        writeln!(file, "  Length: {:.2}", length)?;
        writeln!(file)?;
    }

    writeln!(file, "Route: {}", plan.path.join(" -> "))?;

    Ok(())
}

/// Print the route as an ASCII grid, one symbol per cluster.
pub fn print_plan_visualization(plan: &RoutePlan, points: &[Point]) {
    println!("Route Visualization");
    println!("Total Length: {:.2}", plan.length);
    println!("Clusters: {}", plan.cluster_count());
    println!();

    if points.is_empty() {
        println!("(no points)");
        return;
    }

    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;

    for point in points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    let width = 80;
    let height = 25;
    let span_x = (max_x - min_x).max(f64::EPSILON);
    let span_y = (max_y - min_y).max(f64::EPSILON);
    let cell = |point: &Point| {
        let x = ((point.x - min_x) / span_x * (width as f64 - 1.0)) as usize;
        let y = ((point.y - min_y) / span_y * (height as f64 - 1.0)) as usize;
        (x.min(width - 1), y.min(height - 1))
    };

    let mut grid = vec![vec![' '; width]; height];
    let by_id: std::collections::HashMap<&str, &Point> =
        points.iter().map(|point| (point.id.as_str(), point)).collect();

    let cluster_symbols = ['*', '+', 'x', '#', '@', '&', '%', '=', '^', '$'];

    for (c_idx, stops) in plan.cluster_paths.iter().enumerate() {
        let symbol = cluster_symbols[c_idx % cluster_symbols.len()];

        for id in stops {
            if let Some(point) = by_id.get(id.as_str()) {
                let (x, y) = cell(point);
                grid[y][x] = symbol;
            }
        }
    }

    // Start of the route
    if let Some(point) = plan.path.first().and_then(|id| by_id.get(id.as_str())) {
        let (x, y) = cell(point);
        grid[y][x] = 'S';
    }

    for row in &grid {
        let line: String = row.iter().collect();
        println!("{}", line.trim_end());
    }
    println!();

    println!("Legend:");
    println!("S - Start");
    for (c_idx, _) in plan
        .cluster_paths
        .iter()
        .enumerate()
        .take(cluster_symbols.len())
    {
        println!("{} - Cluster #{}", cluster_symbols[c_idx], c_idx + 1);
    }
    println!();
}
