//! Fixed pipeline definition.
//!
//! Five stages run in order: extract, resize, stylize, smooth, reassemble.
//! Each descriptor says where the stage reads from, where it writes to, how
//! its argument list is built and which progress checkpoints surround it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::layout::JobLayout;

/// Target output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    Hd720,
    Hd1080,
}

impl Resolution {
    /// Map the form value to a resolution. Anything other than `"1080"`
    /// falls back to 720p.
    pub fn from_param(value: &str) -> Self {
        match value.trim() {
            "1080" => Self::Hd1080,
            _ => Self::Hd720,
        }
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Hd720 => (1280, 720),
            Self::Hd1080 => (1920, 1080),
        }
    }
}

/// Per-job parameters that affect stage arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParams {
    /// Style identifier, passed opaquely to the stylize stage.
    pub style: String,
    pub resolution: Resolution,
}

/// Location a stage reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePath {
    /// The uploaded input video.
    SourceVideo,
    /// Subdirectory of the job working directory.
    Dir(&'static str),
    /// The final video inside the working directory.
    FinalArtifact,
}

impl StagePath {
    pub fn resolve(&self, layout: &JobLayout, source: &Path) -> PathBuf {
        match self {
            Self::SourceVideo => source.to_path_buf(),
            Self::Dir(name) => layout.stage_dir(name),
            Self::FinalArtifact => layout.final_artifact(),
        }
    }
}

/// One element of a stage's argument template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Flag(&'static str),
    Input,
    Output,
    Width,
    Height,
    Style,
    Fps,
    /// Original upload, used as the audio track source.
    AudioSource,
}

/// Values substituted into an argument template.
#[derive(Debug, Clone, Copy)]
pub struct ArgBindings<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub source: &'a Path,
    pub params: &'a JobParams,
    pub fps: u32,
}

/// Immutable description of one pipeline stage.
#[derive(Debug, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: &'static str,
    /// Message shown while the stage runs.
    pub label: &'static str,
    /// Executable script, relative to the scripts directory.
    pub script: &'static str,
    pub input: StagePath,
    pub output: StagePath,
    pub args: &'static [Arg],
    /// Progress when the stage starts.
    pub start_progress: u8,
    /// Progress once the stage succeeded.
    pub end_progress: u8,
}

impl StageDescriptor {
    /// Build the argument list for one invocation.
    pub fn render_args(&self, bindings: &ArgBindings<'_>) -> Vec<OsString> {
        let (width, height) = bindings.params.resolution.dimensions();
        self.args
            .iter()
            .map(|arg| match arg {
                Arg::Flag(flag) => OsString::from(flag),
                Arg::Input => bindings.input.as_os_str().to_os_string(),
                Arg::Output => bindings.output.as_os_str().to_os_string(),
                Arg::Width => OsString::from(width.to_string()),
                Arg::Height => OsString::from(height.to_string()),
                Arg::Style => OsString::from(&bindings.params.style),
                Arg::Fps => OsString::from(bindings.fps.to_string()),
                Arg::AudioSource => bindings.source.as_os_str().to_os_string(),
            })
            .collect()
    }
}

pub const EXTRACT: &str = "extract";
pub const RESIZE: &str = "resize";
pub const STYLIZE: &str = "stylize";
pub const SMOOTH: &str = "smooth";
pub const REASSEMBLE: &str = "reassemble";

/// Progress reported before the first stage starts.
pub const STARTING_PROGRESS: u8 = 1;

/// The pipeline, in execution order.
pub static STAGES: [StageDescriptor; 5] = [
    StageDescriptor {
        name: EXTRACT,
        label: "Extracting frames",
        script: "extract_frames.py",
        input: StagePath::SourceVideo,
        output: StagePath::Dir("frames"),
        args: &[Arg::Flag("--video"), Arg::Input, Arg::Flag("--out"), Arg::Output],
        start_progress: 10,
        end_progress: 25,
    },
    StageDescriptor {
        name: RESIZE,
        label: "Resizing frames",
        script: "resize_frames.py",
        input: StagePath::Dir("frames"),
        output: StagePath::Dir("frames_resized"),
        args: &[
            Arg::Flag("--in_dir"),
            Arg::Input,
            Arg::Flag("--out_dir"),
            Arg::Output,
            Arg::Flag("--width"),
            Arg::Width,
            Arg::Flag("--height"),
            Arg::Height,
        ],
        start_progress: 25,
        end_progress: 40,
    },
    StageDescriptor {
        name: STYLIZE,
        label: "Applying Anime Style",
        script: "apply_animegan.py",
        input: StagePath::Dir("frames_resized"),
        output: StagePath::Dir("styled"),
        args: &[
            Arg::Flag("--frames"),
            Arg::Input,
            Arg::Flag("--out"),
            Arg::Output,
            Arg::Flag("--pretrained"),
            Arg::Style,
        ],
        start_progress: 40,
        end_progress: 80,
    },
    // Pass-through copy with the current scripts.
    StageDescriptor {
        name: SMOOTH,
        label: "Finalizing frames",
        script: "temporal_smooth.py",
        input: StagePath::Dir("styled"),
        output: StagePath::Dir("smoothed"),
        args: &[Arg::Flag("--styled"), Arg::Input, Arg::Flag("--out"), Arg::Output],
        start_progress: 80,
        end_progress: 90,
    },
    StageDescriptor {
        name: REASSEMBLE,
        label: "Creating video",
        script: "reassemble.py",
        input: StagePath::Dir("smoothed"),
        output: StagePath::FinalArtifact,
        args: &[
            Arg::Flag("--frames"),
            Arg::Input,
            Arg::Flag("--out"),
            Arg::Output,
            Arg::Flag("--fps"),
            Arg::Fps,
            Arg::Flag("--audio"),
            Arg::AudioSource,
        ],
        start_progress: 90,
        end_progress: 99,
    },
];

/// Look up a stage descriptor by name.
pub fn descriptor(name: &str) -> Option<&'static StageDescriptor> {
    STAGES.iter().find(|stage| stage.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::JobId;
    use rstest::rstest;

    fn params(resolution: Resolution) -> JobParams {
        JobParams {
            style: "hayao".to_string(),
            resolution,
        }
    }

    #[rstest]
    #[case("1080", Resolution::Hd1080)]
    #[case("720", Resolution::Hd720)]
    #[case("480", Resolution::Hd720)]
    #[case("", Resolution::Hd720)]
    #[case("4k", Resolution::Hd720)]
    fn test_resolution_from_param(#[case] value: &str, #[case] expected: Resolution) {
        assert_eq!(Resolution::from_param(value), expected);
    }

    #[test]
    fn test_resolution_dimensions() {
        assert_eq!(Resolution::Hd720.dimensions(), (1280, 720));
        assert_eq!(Resolution::Hd1080.dimensions(), (1920, 1080));
    }

    #[test]
    fn test_stage_order_and_checkpoints() {
        let names: Vec<_> = STAGES.iter().map(|s| s.name).collect();
        assert_eq!(names, [EXTRACT, RESIZE, STYLIZE, SMOOTH, REASSEMBLE]);

        let mut last = STARTING_PROGRESS;
        for stage in &STAGES {
            assert!(stage.start_progress >= last, "{} goes backwards", stage.name);
            assert!(stage.end_progress >= stage.start_progress);
            assert!(stage.end_progress < 100);
            last = stage.end_progress;
        }
    }

    #[test]
    fn test_stages_chain_outputs_to_inputs() {
        for pair in STAGES.windows(2) {
            assert_eq!(pair[0].output, pair[1].input);
        }
    }

    #[test]
    fn test_resize_args() {
        let layout = JobLayout::new("/r", &JobId::from("j"));
        let source = Path::new("/u/j_in.mp4");
        let stage = descriptor(RESIZE).unwrap();
        let input = stage.input.resolve(&layout, source);
        let output = stage.output.resolve(&layout, source);
        let params = params(Resolution::Hd1080);

        let args = stage.render_args(&ArgBindings {
            input: &input,
            output: &output,
            source,
            params: &params,
            fps: 30,
        });

        let expected: Vec<OsString> = [
            "--in_dir",
            "/r/j/frames",
            "--out_dir",
            "/r/j/frames_resized",
            "--width",
            "1920",
            "--height",
            "1080",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_reassemble_args_use_source_as_audio() {
        let layout = JobLayout::new("/r", &JobId::from("j"));
        let source = Path::new("/u/j_in.mp4");
        let stage = descriptor(REASSEMBLE).unwrap();
        let input = stage.input.resolve(&layout, source);
        let output = stage.output.resolve(&layout, source);
        let params = params(Resolution::Hd720);

        let args = stage.render_args(&ArgBindings {
            input: &input,
            output: &output,
            source,
            params: &params,
            fps: 24,
        });

        assert_eq!(args[3], OsString::from("/r/j/j_final_anime.mp4"));
        assert_eq!(args[5], OsString::from("24"));
        assert_eq!(args[7], OsString::from("/u/j_in.mp4"));
    }

    #[test]
    fn test_stylize_passes_style_opaquely() {
        let stage = descriptor(STYLIZE).unwrap();
        let params = JobParams {
            style: "face paint; v2".to_string(),
            resolution: Resolution::Hd720,
        };
        let args = stage.render_args(&ArgBindings {
            input: Path::new("in"),
            output: Path::new("out"),
            source: Path::new("src"),
            params: &params,
            fps: 30,
        });
        assert_eq!(args.last().unwrap(), &OsString::from("face paint; v2"));
    }
}
