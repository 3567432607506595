//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::traits::Transcoder;
use super::types::{TranscodeOutput, TranscodeRequest};
use crate::probe::TargetFormat;

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

/// Maps a PCM bit depth to the ffmpeg encoder name.
pub fn pcm_codec(bits_per_sample: u16) -> Option<&'static str> {
    match bits_per_sample {
        8 => Some("pcm_u8"),
        16 => Some("pcm_s16le"),
        24 => Some("pcm_s24le"),
        32 => Some("pcm_s32le"),
        _ => None,
    }
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Builds ffmpeg arguments for a PCM re-encode.
    pub fn build_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        target: &TargetFormat,
    ) -> Result<Vec<String>, TranscodeError> {
        let codec = pcm_codec(target.bits_per_sample).ok_or_else(|| {
            TranscodeError::unsupported_target(format!(
                "no PCM encoder for {} bits per sample",
                target.bits_per_sample
            ))
        })?;

        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-acodec".to_string(),
            codec.to_string(),
            "-ar".to_string(),
            target.sample_rate_hz.to_string(),
            "-ac".to_string(),
            target.channels.to_string(),
        ];

        args.extend(self.config.extra_args.iter().cloned());

        // Temp outputs don't end in a plain .wav, so name the muxer.
        args.extend(["-f".to_string(), "wav".to_string()]);
        args.push(output_path.to_string_lossy().to_string());

        Ok(args)
    }

    fn spawn_error(&self, e: std::io::Error) -> TranscodeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            TranscodeError::ToolNotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            TranscodeError::Io(e)
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transcode(
        &self,
        request: &TranscodeRequest,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let start = Instant::now();
        let args = self.build_args(&request.input_path, &request.output_path, &request.target)?;
        debug!(ffmpeg = %self.config.ffmpeg_path.display(), ?args, "spawning transcoder");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stderr = child.stderr.take();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Some(line) = lines.next_line().await? {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }

            let status = child.wait().await?;
            let captured: Vec<String> = tail.into_iter().collect();
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, captured.join("\n")))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(TranscodeError::invocation_failed(
                        format!("ffmpeg exited with code: {:?}", status.code()),
                        status.code(),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
            }
            Ok(Err(e)) => return Err(TranscodeError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                return Err(TranscodeError::ToolTimeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        let output_meta = tokio::fs::metadata(&request.output_path)
            .await
            .map_err(|_| TranscodeError::invocation_failed("output file not created", Some(0), None))?;

        Ok(TranscodeOutput {
            output_path: request.output_path.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(TranscodeError::invocation_failed(
                "ffmpeg -version failed",
                output.status.code(),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_args_default_target() {
        let transcoder = FfmpegTranscoder::with_defaults();
        let args = transcoder
            .build_args(
                Path::new("/corpus/a.wav"),
                Path::new("/corpus/.a.tmp.wav"),
                &TargetFormat::default(),
            )
            .unwrap();

        assert_eq!(
            args,
            vec![
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "/corpus/a.wav",
                "-acodec",
                "pcm_s16le",
                "-ar",
                "22050",
                "-ac",
                "1",
                "-f",
                "wav",
                "/corpus/.a.tmp.wav",
            ]
        );
    }

    #[test]
    fn test_build_args_codec_follows_bit_depth() {
        let transcoder = FfmpegTranscoder::with_defaults();
        for (bits, codec) in [(8, "pcm_u8"), (24, "pcm_s24le"), (32, "pcm_s32le")] {
            let args = transcoder
                .build_args(
                    Path::new("in.wav"),
                    Path::new("out.wav"),
                    &TargetFormat::new(2, 48000, bits),
                )
                .unwrap();
            assert!(args.windows(2).any(|w| w[0] == "-acodec" && w[1] == codec));
            assert!(args.windows(2).any(|w| w[0] == "-ac" && w[1] == "2"));
        }
    }

    #[test]
    fn test_build_args_extra_args_before_output() {
        let transcoder = FfmpegTranscoder::new(
            TranscoderConfig::default().with_extra_args(["-threads", "1"]),
        );
        let args = transcoder
            .build_args(Path::new("in.wav"), Path::new("out.wav"), &TargetFormat::default())
            .unwrap();
        let n = args.len();
        assert_eq!(&args[n - 5..], &["-threads", "1", "-f", "wav", "out.wav"]);
    }

    #[test]
    fn test_build_args_rejects_odd_bit_depth() {
        let transcoder = FfmpegTranscoder::with_defaults();
        let err = transcoder
            .build_args(
                Path::new("in.wav"),
                Path::new("out.wav"),
                &TargetFormat::new(1, 22050, 12),
            )
            .unwrap_err();
        assert!(matches!(err, TranscodeError::UnsupportedTarget { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let transcoder = FfmpegTranscoder::new(TranscoderConfig::with_path(
            "/nonexistent/bin/ffmpeg-wavforge",
        ));
        let request = TranscodeRequest::new("in.wav", "out.wav", TargetFormat::default());

        let err = transcoder.transcode(&request).await.unwrap_err();
        assert!(matches!(err, TranscodeError::ToolNotFound { .. }));

        let err = transcoder.validate().await.unwrap_err();
        assert!(matches!(err, TranscodeError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_invocation_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = write_script(dir.path(), "fail.sh", "echo 'boom' >&2\nexit 3");
        let transcoder = FfmpegTranscoder::new(TranscoderConfig::with_path(&script));
        let request = TranscodeRequest::new(
            dir.path().join("in.wav"),
            dir.path().join("out.wav"),
            TargetFormat::default(),
        );

        match transcoder.transcode(&request).await.unwrap_err() {
            TranscodeError::ToolInvocationFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr.as_deref(), Some("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = write_script(dir.path(), "hang.sh", "exec sleep 30");
        let transcoder =
            FfmpegTranscoder::new(TranscoderConfig::with_path(&script).with_timeout(1));
        let request = TranscodeRequest::new(
            dir.path().join("in.wav"),
            dir.path().join("out.wav"),
            TargetFormat::default(),
        );

        let start = Instant::now();
        let err = transcoder.transcode(&request).await.unwrap_err();
        assert!(matches!(err, TranscodeError::ToolTimeout { timeout_secs: 1 }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_reports_output_size() {
        let dir = tempfile::TempDir::new().unwrap();
        // The output path is always the last argument.
        let script = write_script(
            dir.path(),
            "ok.sh",
            "for last; do :; done\nprintf 'RIFF' > \"$last\"",
        );
        let transcoder = FfmpegTranscoder::new(TranscoderConfig::with_path(&script));
        let output_path = dir.path().join("out.wav");
        let request = TranscodeRequest::new(
            dir.path().join("in.wav"),
            &output_path,
            TargetFormat::default(),
        );

        let output = transcoder.transcode(&request).await.unwrap();
        assert_eq!(output.output_path, output_path);
        assert_eq!(output.output_size_bytes, 4);
        transcoder.validate().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_output_is_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = write_script(dir.path(), "noop.sh", "exit 0");
        let transcoder = FfmpegTranscoder::new(TranscoderConfig::with_path(&script));
        let request = TranscodeRequest::new(
            dir.path().join("in.wav"),
            dir.path().join("out.wav"),
            TargetFormat::default(),
        );

        let err = transcoder.transcode(&request).await.unwrap_err();
        assert!(matches!(err, TranscodeError::ToolInvocationFailed { .. }));
    }
}
