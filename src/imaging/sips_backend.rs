//! Thumbnail engine shelling out to macOS `sips`.
//!
//! Registered under the name `sips`. Each call is a blocking subprocess with
//! no timeout. Native dimensions are recovered by matching the two-line
//! `pixelWidth: N` / `pixelHeight: N` block in the tool's stdout; any other
//! output fails the identify step and the pipeline skips that resource.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::operations::plan_thumbnail;
use super::params::ThumbnailParams;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

static PIXEL_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pixelWidth\s*:\s*(\d+)\n\s*pixelHeight\s*:\s*(\d+)").expect("valid regex")
});

/// Extract `(pixelWidth, pixelHeight)` from `sips -g` output.
pub fn parse_pixel_size(output: &str) -> Option<Dimensions> {
    let caps = PIXEL_SIZE.captures(output)?;
    let width = caps[1].parse().ok()?;
    let height = caps[2].parse().ok()?;
    Some(Dimensions { width, height })
}

pub struct SipsBackend {
    program: PathBuf,
}

impl SipsBackend {
    pub fn new() -> Self {
        Self::with_program("sips")
    }

    /// Use a specific executable instead of `sips` from `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[String]) -> Result<String, BackendError> {
        let output = Command::new(&self.program).args(args).output()?;
        if !output.status.success() {
            return Err(BackendError::ProcessingFailed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for SipsBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ImageBackend for SipsBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let stdout = self.run(&[
            "-g".into(),
            "pixelWidth".into(),
            "-g".into(),
            "pixelHeight".into(),
            path_arg(path),
        ])?;
        parse_pixel_size(&stdout).ok_or(BackendError::UnrecognizedOutput {
            tool: "sips",
            output: stdout,
        })
    }

    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
        let native = self.identify(&params.source)?;
        let plan = plan_thumbnail(native, params)?;

        self.run(&[
            "-z".into(),
            plan.resize.height.to_string(),
            plan.resize.width.to_string(),
            path_arg(&params.source),
            "--out".into(),
            path_arg(&params.output),
            "--setProperty".into(),
            "formatOptions".into(),
            params.quality.value().to_string(),
        ])?;

        if let Some(b) = plan.crop {
            self.run(&[
                "--cropOffset".into(),
                b.top.to_string(),
                b.left.to_string(),
                "--cropToHeightWidth".into(),
                b.height().to_string(),
                b.width().to_string(),
                path_arg(&params.output),
            ])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{CropType, Quality};

    #[test]
    fn parses_sips_output() {
        let out = "/Users/me/site/content/a.jpg\n  pixelWidth: 1024\n  pixelHeight: 768\n";
        assert_eq!(parse_pixel_size(out), Some(Dimensions::new(1024, 768)));
    }

    #[test]
    fn tolerates_spacing_around_colon() {
        let out = "pixelWidth : 10\npixelHeight :20";
        assert_eq!(parse_pixel_size(out), Some(Dimensions::new(10, 20)));
    }

    #[test]
    fn rejects_unexpected_output() {
        assert_eq!(parse_pixel_size("Error: file not found"), None);
        // Height must directly follow width
        assert_eq!(parse_pixel_size("pixelHeight: 20\npixelWidth: 10\n"), None);
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let backend = SipsBackend::with_program("/nonexistent/sips-binary");
        let result = backend.identify(Path::new("/tmp/a.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn unexpected_stdout_is_unrecognized_output() {
        // `echo` succeeds but prints its arguments rather than pixel sizes
        let backend = SipsBackend::with_program("echo");
        let result = backend.identify(Path::new("/tmp/a.jpg"));
        assert!(matches!(
            result,
            Err(BackendError::UnrecognizedOutput { tool: "sips", .. })
        ));
    }

    /// Stand-in `sips` that logs its argv and reports a 200x100 image.
    #[cfg(unix)]
    fn logging_sips(dir: &Path) -> (SipsBackend, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("argv.log");
        let script = dir.join("sips");
        std::fs::write(
            &script,
            format!(
                concat!(
                    "#!/bin/sh\n",
                    "echo \"$@\" >> '{}'\n",
                    "printf 'x\\n  pixelWidth: 200\\n  pixelHeight: 100\\n'\n",
                ),
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (SipsBackend::with_program(script), log)
    }

    #[cfg(unix)]
    fn job(width: Option<u32>, height: Option<u32>) -> ThumbnailParams {
        ThumbnailParams {
            source: "/src/a.jpg".into(),
            output: "/out/t.jpg".into(),
            width,
            height,
            preserve_orientation: false,
            crop: CropType::Center,
            quality: Quality::new(75),
        }
    }

    #[cfg(unix)]
    #[test]
    fn thumbnail_resizes_then_crops() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (backend, log) = logging_sips(tmp.path());

        backend.thumbnail(&job(Some(50), Some(60))).unwrap();

        let argv = std::fs::read_to_string(log).unwrap();
        assert_eq!(
            argv.lines().collect::<Vec<_>>(),
            vec![
                "-g pixelWidth -g pixelHeight /src/a.jpg",
                "-z 60 120 /src/a.jpg --out /out/t.jpg --setProperty formatOptions 75",
                "--cropOffset 0 35 --cropToHeightWidth 60 50 /out/t.jpg",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn thumbnail_with_one_axis_skips_crop() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (backend, log) = logging_sips(tmp.path());

        backend.thumbnail(&job(Some(100), None)).unwrap();

        let argv = std::fs::read_to_string(log).unwrap();
        assert_eq!(
            argv.lines().collect::<Vec<_>>(),
            vec![
                "-g pixelWidth -g pixelHeight /src/a.jpg",
                "-z 50 100 /src/a.jpg --out /out/t.jpg --setProperty formatOptions 75",
            ]
        );
    }
}
