//! Terminal progress display

use fwstitch_core::stitch::StitchProgress;
use indicatif::{ProgressBar, ProgressStyle};

/// Create the container progress bar style
fn create_progress_bar_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-"))
}

/// Shows one bar step per stitched container
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { bar: None }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl StitchProgress for IndicatifProgress {
    fn started(&mut self, containers: usize) {
        let pb = ProgressBar::new(containers as u64);
        pb.set_style(create_progress_bar_style().unwrap_or_else(|_| ProgressStyle::default_bar()));
        pb.set_message("Stitching");
        self.bar = Some(pb);
    }

    fn container_done(&mut self, name: &str, _len: usize) {
        if let Some(pb) = &self.bar {
            pb.set_message(name.to_string());
            pb.inc(1);
        }
    }

    fn finished(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message("Stitching complete");
        }
    }
}

impl Drop for IndicatifProgress {
    // A failed build leaves the bar unfinished; clear it so the error is readable
    fn drop(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.abandon();
        }
    }
}
