//! FFmpeg command builder.
//!
//! Commands are built against file names relative to the session's
//! scratch storage and executed via [`EngineSession::exec`].
//!
//! [`EngineSession::exec`]: crate::session::EngineSession::exec

use hclip_models::EncodingConfig;

/// Builder for engine invocations.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file name (scratch-relative)
    input: String,
    /// Output file name (scratch-relative)
    output: String,
    /// Arguments placed before -i
    input_args: Vec<String>,
    /// Arguments placed after -i
    output_args: Vec<String>,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new command.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek position before the input (fast seek).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Limit the read duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    /// Read the input through the concat demuxer (a manifest file).
    pub fn concat_manifest(self) -> Self {
        self.input_arg("-f").input_arg("concat").input_arg("-safe").input_arg("0")
    }

    /// Set a video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Stream-copy all streams (no re-encode).
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set the audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Apply re-encoding parameters.
    pub fn encode_with(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.to_output_args())
    }

    /// Split the output into fixed-duration segments (stream copy).
    pub fn segment_every(self, seconds: f64) -> Self {
        self.stream_copy()
            .output_arg("-f")
            .output_arg("segment")
            .output_arg("-segment_time")
            .output_arg(format!("{:.3}", seconds))
    }

    /// Build the argument vector.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
        ];
        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push(self.input.clone());
        args.extend(self.output_args.clone());
        args.push(self.output.clone());
        args
    }
}

/// Scale-and-center-crop filter to exactly `width`x`height`.
///
/// Scales the short side up to cover the target, then crops the
/// overflow symmetrically, so every output frame has the target
/// resolution regardless of source aspect ratio.
pub fn scale_crop_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = width,
        h = height
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .encode_with(&EncodingConfig::default());

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"10.000".to_string()));
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp4");

        // -ss comes before -i
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i);
    }

    #[test]
    fn test_concat_manifest_args() {
        let args = FfmpegCommand::new("concat.txt", "out.mp4")
            .concat_manifest()
            .stream_copy()
            .build_args();

        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], "concat");
        assert!(args.contains(&"-safe".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-c" && w[1] == "copy"));
    }

    #[test]
    fn test_segment_every() {
        let args = FfmpegCommand::new("audio.mp3", "chunk_%03d.mp3")
            .no_video()
            .segment_every(42.5)
            .build_args();
        assert!(args.contains(&"segment".to_string()));
        assert!(args.contains(&"-segment_time".to_string()));
        assert!(args.contains(&"42.500".to_string()));
    }

    #[test]
    fn test_scale_crop_filter() {
        let filter = scale_crop_filter(1920, 1080);
        assert_eq!(
            filter,
            "scale=1920:1080:force_original_aspect_ratio=increase,crop=1920:1080"
        );
    }
}
