//! Output module for crawl reports, statistics and exports
//!
//! This module handles:
//! - Printing per-site crawl reports
//! - Recording and displaying recipe statistics
//! - Exporting stored recipes as JSON

mod export;
pub mod stats;

pub use export::{export_json, write_recipes};
pub use stats::{load_statistics, print_statistics, RecipeStatistics};

use crate::crawler::SiteReport;

/// Prints the outcome of a crawl, one line per site plus totals
pub fn print_site_reports(reports: &[SiteReport]) {
    println!("=== Crawl Summary ===\n");

    for report in reports {
        println!(
            "  {}: {} stored, {} already stored, {} without recipe, {} incomplete, {} failed ({} listing pages)",
            report.site,
            report.stored,
            report.already_stored,
            report.no_recipe,
            report.insufficient_data,
            report.failed(),
            report.listing_pages
        );
    }

    let counts = crate::crawler::run_counts(reports);
    println!();
    println!(
        "Total: {} stored, {} skipped, {} failed",
        counts.stored, counts.skipped, counts.failed
    );
}
