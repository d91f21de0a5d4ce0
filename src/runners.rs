//! Command lines for the external imaging tools.
//!
//! * GraphicsMagick prepares page images for OCR and renders thumbnails.
//! * tesseract performs the OCR itself.
//! * pdftoppm (poppler) rasterizes PDF pages.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{config::Config, error::Result, process::ProcessRunner};

/// Resolution used when rasterizing PDF pages.
pub const RASTER_DPI: u32 = 300;

/// Bounding box for thumbnails.
pub const THUMBNAIL_GEOMETRY: &str = "120x120";

#[derive(Debug, Clone)]
pub struct GraphicsMagick {
    bin: PathBuf,
    runner: ProcessRunner,
}

impl GraphicsMagick {
    pub fn new(bin: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        Self {
            bin: bin.into(),
            runner,
        }
    }

    /// Auto-orient, grayscale, upscale and sharpen `image` in place.
    pub fn prepare_for_ocr_command(&self, image: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = vec![self.bin.clone().into()];
        argv.extend(
            [
                "convert",
                "-auto-orient",
                "-density",
                "300",
                "-depth",
                "4",
                "-colorspace",
                "gray",
                "-filter",
                "triangle",
                "-resize",
                "900%",
                "-contrast",
                "-sharpen",
                "5",
            ]
            .map(OsString::from),
        );
        argv.push(image.into());
        argv.push(image.into());
        argv
    }

    pub fn prepare_for_ocr(&self, image: &Path) -> Result<i32> {
        self.runner.run(&self.prepare_for_ocr_command(image))
    }

    /// Scale `image` into the thumbnail bounding box, stripping profiles.
    pub fn thumbnail_command(
        &self,
        image: &Path,
        thumbnail: &Path,
    ) -> Vec<OsString> {
        let mut argv: Vec<OsString> = vec![self.bin.clone().into()];
        argv.extend(["convert", "-size", THUMBNAIL_GEOMETRY].map(OsString::from));
        argv.push(image.into());
        argv.extend(
            ["-resize", THUMBNAIL_GEOMETRY, "+profile", "*"].map(OsString::from),
        );
        argv.push(thumbnail.into());
        argv
    }

    pub fn thumbnail(&self, image: &Path, thumbnail: &Path) -> Result<i32> {
        self.runner.run(&self.thumbnail_command(image, thumbnail))
    }
}

#[derive(Debug, Clone)]
pub struct Tesseract {
    bin: PathBuf,
    runner: ProcessRunner,
}

impl Tesseract {
    pub fn new(bin: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        Self {
            bin: bin.into(),
            runner,
        }
    }

    /// OCR `image`; tesseract writes the text to `output_base` + `.txt`.
    pub fn command(&self, image: &Path, output_base: &Path) -> Vec<OsString> {
        vec![
            self.bin.clone().into(),
            image.into(),
            output_base.into(),
            "--psm".into(),
            "3".into(),
        ]
    }

    pub fn run(&self, image: &Path, output_base: &Path) -> Result<i32> {
        self.runner.run(&self.command(image, output_base))
    }
}

#[derive(Debug, Clone)]
pub struct Pdftoppm {
    bin: PathBuf,
    runner: ProcessRunner,
}

impl Pdftoppm {
    pub fn new(bin: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        Self {
            bin: bin.into(),
            runner,
        }
    }

    /// Render page `page` (1-based) of `pdf` to `output_prefix` + `.png`.
    pub fn command(
        &self,
        pdf: &Path,
        page: usize,
        output_prefix: &Path,
    ) -> Vec<OsString> {
        let dpi = RASTER_DPI.to_string();
        let page = page.to_string();
        let mut argv: Vec<OsString> = vec![self.bin.clone().into()];
        argv.extend(
            [
                "-png",
                "-r",
                dpi.as_str(),
                "-f",
                page.as_str(),
                "-l",
                page.as_str(),
                "-singlefile",
            ]
            .map(OsString::from),
        );
        argv.push(pdf.into());
        argv.push(output_prefix.into());
        argv
    }

    pub fn render_page(
        &self,
        pdf: &Path,
        page: usize,
        output_prefix: &Path,
    ) -> Result<i32> {
        self.runner.run(&self.command(pdf, page, output_prefix))
    }
}

/// The three tools the PDF pipeline shells out to.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub graphicsmagick: GraphicsMagick,
    pub tesseract: Tesseract,
    pub pdftoppm: Pdftoppm,
}

impl Toolchain {
    pub fn from_config(config: &Config) -> Self {
        let runner = ProcessRunner::new(config.tool_timeout());
        Self {
            graphicsmagick: GraphicsMagick::new(
                &config.graphicsmagick_bin,
                runner,
            ),
            tesseract: Tesseract::new(&config.tesseract_bin, runner),
            pdftoppm: Pdftoppm::new(&config.pdftoppm_bin, runner),
        }
    }
}
