use std::path::{Path, PathBuf};

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

const FALLBACK_FPS: i32 = 30;

/// Encodes frames as MPEG-4 (YUV420P) via ffmpeg-next.
///
/// When the source video has an audio stream it is remuxed into the output
/// on `close`, without re-encoding.
pub struct FfmpegWriter {
    output_path: Option<PathBuf>,
    source_path: Option<PathBuf>,
    session: Option<EncodeSession>,
    frame_count: usize,
}

struct EncodeSession {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    time_base: ffmpeg_next::Rational,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            output_path: None,
            source_path: None,
            session: None,
            frame_count: 0,
        }
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn encoder_fps(fps: f64) -> i32 {
    let rounded = fps.round() as i32;
    if rounded <= 0 {
        FALLBACK_FPS
    } else {
        rounded
    }
}

impl EncodeSession {
    /// Moves every packet the encoder has ready into the container.
    fn drain_packets(&mut self) -> Result<(), BoxError> {
        let ost_time_base = self
            .octx
            .stream(0)
            .ok_or("output video stream missing")?
            .time_base();

        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(self.time_base, ost_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(&mut self, path: &Path, metadata: &VideoMetadata) -> Result<(), BoxError> {
        ffmpeg_next::init()?;

        let mut octx = ffmpeg_next::format::output(path)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);

        let fps = encoder_fps(metadata.fps);
        let time_base = ffmpeg_next::Rational(1, fps);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);

        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            ffmpeg_next::format::Pixel::YUV420P,
            metadata.width,
            metadata.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.output_path = Some(path.to_path_buf());
        self.source_path = metadata.source_path.clone();
        self.session = Some(EncodeSession {
            octx,
            encoder,
            scaler,
            width: metadata.width,
            height: metadata.height,
            time_base,
        });
        self.frame_count = 0;

        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), BoxError> {
        let session = self.session.as_mut().ok_or("FfmpegWriter: not opened")?;

        if frame.width() != session.width || frame.height() != session.height {
            return Err(format!(
                "frame {} is {}x{}, encoder expects {}x{}",
                frame.index(),
                frame.width(),
                frame.height(),
                session.width,
                session.height
            )
            .into());
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            session.width,
            session.height,
        );

        let stride = rgb_frame.stride(0);
        let row_bytes = session.width as usize * 3;
        let dst = rgb_frame.data_mut(0);
        for (row, src_row) in frame.data().chunks_exact(row_bytes).enumerate() {
            let dst_start = row * stride;
            dst[dst_start..dst_start + row_bytes].copy_from_slice(src_row);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        session.scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count as i64));

        session.encoder.send_frame(&yuv_frame)?;
        session.drain_packets()?;

        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        session.encoder.send_eof()?;
        session.drain_packets()?;
        session.octx.write_trailer()?;
        drop(session);

        log::debug!("Encoded {} frames", self.frame_count);

        if let (Some(source_path), Some(output_path)) =
            (self.source_path.take(), self.output_path.take())
        {
            if let Err(e) = mux_audio(&source_path, &output_path) {
                log::warn!("Audio muxing failed: {e}");
            }
        }

        Ok(())
    }
}

/// Copies the audio of `source` into `video_output` by remuxing both into a
/// sibling temp file that then replaces the output. No audio means no-op.
fn mux_audio(source: &Path, video_output: &Path) -> Result<(), BoxError> {
    let mut ictx_source = ffmpeg_next::format::input(source)?;

    let has_audio = ictx_source
        .streams()
        .best(ffmpeg_next::media::Type::Audio)
        .is_some();
    if !has_audio {
        return Ok(());
    }

    let mut ictx_video = ffmpeg_next::format::input(video_output)?;

    let stem = video_output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = video_output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let temp_path = video_output.with_file_name(format!("{stem}.mux.{ext}"));

    let mut octx = ffmpeg_next::format::output(&temp_path)?;

    let video_map = map_streams(&ictx_video, &mut octx, ffmpeg_next::media::Type::Video, 0)?;
    let next_index = video_map.iter().flatten().count();
    let audio_map = map_streams(
        &ictx_source,
        &mut octx,
        ffmpeg_next::media::Type::Audio,
        next_index,
    )?;

    octx.write_header()?;
    copy_packets(&mut ictx_video, &mut octx, &video_map)?;
    copy_packets(&mut ictx_source, &mut octx, &audio_map)?;
    octx.write_trailer()?;

    std::fs::rename(&temp_path, video_output)?;
    log::debug!("Copied audio from {}", source.display());
    Ok(())
}

/// Adds an output stream for every input stream of `medium`, returning the
/// input-index → output-index map.
fn map_streams(
    ictx: &ffmpeg_next::format::context::Input,
    octx: &mut ffmpeg_next::format::context::Output,
    medium: ffmpeg_next::media::Type,
    first_index: usize,
) -> Result<Vec<Option<usize>>, BoxError> {
    let mut map = vec![None; ictx.nb_streams() as usize];
    let mut next = first_index;
    for (idx, stream) in ictx.streams().enumerate() {
        if stream.parameters().medium() != medium {
            continue;
        }
        let mut ost = octx.add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))?;
        ost.set_parameters(stream.parameters());
        // Containers reject codec tags from a different muxer.
        unsafe {
            (*ost.parameters().as_mut_ptr()).codec_tag = 0;
        }
        map[idx] = Some(next);
        next += 1;
    }
    Ok(map)
}

fn copy_packets(
    ictx: &mut ffmpeg_next::format::context::Input,
    octx: &mut ffmpeg_next::format::context::Output,
    map: &[Option<usize>],
) -> Result<(), BoxError> {
    let time_bases: Vec<_> = ictx.streams().map(|s| s.time_base()).collect();

    for (stream, mut packet) in ictx.packets() {
        let ist_idx = stream.index();
        let Some(ost_idx) = map.get(ist_idx).copied().flatten() else {
            continue;
        };
        let ost_time_base = octx
            .stream(ost_idx)
            .ok_or("remux output stream missing")?
            .time_base();
        packet.rescale_ts(time_bases[ist_idx], ost_time_base);
        packet.set_position(-1);
        packet.set_stream(ost_idx);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::video_reader::VideoReader;
    use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
    use rstest::rstest;

    fn metadata(w: u32, h: u32, fps: f64) -> VideoMetadata {
        VideoMetadata {
            width: w,
            height: h,
            fps,
            total_frames: 0,
            codec: String::new(),
            source_path: None,
        }
    }

    #[rstest]
    #[case(29.97, 30)]
    #[case(0.0, 30)]
    #[case(-5.0, 30)]
    #[case(24.0, 24)]
    fn test_encoder_fps(#[case] fps: f64, #[case] expected: i32) {
        assert_eq!(encoder_fps(fps), expected);
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        for i in 0..3 {
            writer.write(&Frame::filled(160, 120, [128; 3], i)).unwrap();
        }
        writer.close().unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_write_without_open_returns_error() {
        let mut writer = FfmpegWriter::new();
        assert!(writer.write(&Frame::filled(160, 120, [128; 3], 0)).is_err());
    }

    #[test]
    fn test_write_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        assert!(writer.write(&Frame::filled(80, 60, [0; 3], 0)).is_err());
        writer.close().unwrap();
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        writer.write(&Frame::filled(160, 120, [128; 3], 0)).unwrap();
        writer.close().unwrap();
        assert!(writer.close().is_ok());
    }

    #[test]
    fn test_roundtrip_preserves_count_and_brightness() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        for i in 0..3 {
            writer.write(&Frame::filled(160, 120, [128; 3], i)).unwrap();
        }
        writer.close().unwrap();

        let mut reader = FfmpegReader::new();
        let read_meta = reader.open(&path).unwrap();
        assert_eq!((read_meta.width, read_meta.height), (160, 120));

        let frames: Vec<_> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);

        // Lossy codec: only the overall level is stable.
        let first = &frames[0];
        let avg: f64 =
            first.data().iter().map(|&b| b as f64).sum::<f64>() / first.data().len() as f64;
        assert!((avg - 128.0).abs() < 40.0, "average {avg} should be near 128");
    }

    #[test]
    fn test_silent_source_leaves_output_alone() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.mp4");
        let output = dir.path().join("output.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&source, &metadata(64, 48, 25.0)).unwrap();
        writer.write(&Frame::filled(64, 48, [10; 3], 0)).unwrap();
        writer.close().unwrap();

        let meta = VideoMetadata {
            source_path: Some(source.clone()),
            ..metadata(64, 48, 25.0)
        };
        let mut writer = FfmpegWriter::new();
        writer.open(&output, &meta).unwrap();
        writer.write(&Frame::filled(64, 48, [200; 3], 0)).unwrap();
        writer.close().unwrap();

        assert!(output.exists());
        assert!(!dir.path().join("output.mux.mp4").exists());
    }
}
