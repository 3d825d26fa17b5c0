//! Frame sinks for the camera.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::RenderBuffer;
use crate::encode::{FrameFormat, TextChunks};
use crate::error::RenderError;

/// Receives finished frames in order.
///
/// The camera calls [`begin`](Self::begin) once before the first frame,
/// then for every frame asks for a sequence number and writes the frame
/// with it.
pub trait Output: Send {
    fn name(&self) -> String;

    /// Announce how many frames the film will have.
    fn begin(&mut self, total_frames: u64);

    fn next_sequence_number(&mut self) -> u64;

    fn write_frame(&mut self, image: &RenderBuffer, sequence: u64) -> io::Result<()>;

    /// Flush anything buffered. Called once after the last frame.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Direction of the sequence numbers handed out by an output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Numbering {
    /// `0, 1, 2, …`
    #[default]
    Ascending,
    /// `total - 1, …, 1, 0`
    Countdown,
}

/// Hands out sequence numbers according to a [`Numbering`].
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    numbering: Numbering,
    next: u64,
    total: u64,
}

impl SequenceCounter {
    pub fn new(numbering: Numbering) -> Self {
        Self {
            numbering,
            next: 0,
            total: 0,
        }
    }

    pub fn begin(&mut self, total_frames: u64) {
        self.total = total_frames;
        self.next = match self.numbering {
            Numbering::Ascending => 0,
            Numbering::Countdown => total_frames.saturating_sub(1),
        };
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn next_number(&mut self) -> u64 {
        let n = self.next;
        self.next = match self.numbering {
            Numbering::Ascending => n.saturating_add(1),
            Numbering::Countdown => n.saturating_sub(1),
        };
        n
    }
}

fn sequence_chunks(extra: &TextChunks, sequence: u64) -> TextChunks {
    let mut chunks = extra.clone();
    chunks.push(("mandelcam.Sequence".to_string(), sequence.to_string()));
    chunks
}

// ---------------------------------------------------------------------------
// Single file
// ---------------------------------------------------------------------------

/// Overwrites one file with every frame, leaving the last one.
pub struct SingleFileOutput {
    path: PathBuf,
    format: FrameFormat,
    counter: SequenceCounter,
    text: TextChunks,
}

impl SingleFileOutput {
    pub fn new(path: impl Into<PathBuf>, format: FrameFormat) -> Self {
        Self {
            path: path.into(),
            format,
            counter: SequenceCounter::default(),
            text: Vec::new(),
        }
    }

    /// Extra PNG tEXt chunks written with every frame.
    pub fn with_text(mut self, text: TextChunks) -> Self {
        self.text = text;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Output for SingleFileOutput {
    fn name(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn begin(&mut self, total_frames: u64) {
        self.counter.begin(total_frames);
    }

    fn next_sequence_number(&mut self) -> u64 {
        self.counter.next_number()
    }

    fn write_frame(&mut self, image: &RenderBuffer, sequence: u64) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(&self.path)?);
        self.format
            .write(image, &sequence_chunks(&self.text, sequence), &mut out)?;
        out.flush()?;
        debug!(path = %self.path.display(), sequence, "Wrote frame");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// One file per frame
// ---------------------------------------------------------------------------

/// Writes each frame to its own file named from a pattern.
///
/// A run of `#` in the file name is replaced by the sequence number padded
/// to the run's length (`frame_####.png` → `frame_0007.png`). Without a
/// `#`, `_<n>` is inserted before the extension, padded to the digits of
/// the total frame count.
pub struct MultiFileOutput {
    pattern: PathBuf,
    format: FrameFormat,
    counter: SequenceCounter,
    text: TextChunks,
}

impl MultiFileOutput {
    pub fn new(pattern: impl Into<PathBuf>, format: FrameFormat, numbering: Numbering) -> Self {
        Self {
            pattern: pattern.into(),
            format,
            counter: SequenceCounter::new(numbering),
            text: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: TextChunks) -> Self {
        self.text = text;
        self
    }

    /// File name for `sequence`.
    pub fn path_for(&self, sequence: u64) -> PathBuf {
        let file_name = self
            .pattern
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let name = match file_name.find('#') {
            Some(start) => {
                let run = file_name[start..].chars().take_while(|&c| c == '#').count();
                format!(
                    "{}{:0run$}{}",
                    &file_name[..start],
                    sequence,
                    &file_name[start + run..],
                )
            }
            None => {
                let width = digits(self.counter.total().saturating_sub(1));
                let stem = self
                    .pattern
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match self.pattern.extension() {
                    Some(ext) => format!("{stem}_{sequence:0width$}.{}", ext.to_string_lossy()),
                    None => format!("{stem}_{sequence:0width$}"),
                }
            }
        };
        self.pattern.with_file_name(name)
    }
}

fn digits(mut n: u64) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

impl Output for MultiFileOutput {
    fn name(&self) -> String {
        format!("files {}", self.pattern.display())
    }

    fn begin(&mut self, total_frames: u64) {
        self.counter.begin(total_frames);
        if let Some(dir) = self.pattern.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                // The first write will report the same problem per frame.
                debug!(dir = %dir.display(), error = %e, "Could not create output directory");
            }
        }
    }

    fn next_sequence_number(&mut self) -> u64 {
        self.counter.next_number()
    }

    fn write_frame(&mut self, image: &RenderBuffer, sequence: u64) -> io::Result<()> {
        let path = self.path_for(sequence);
        let mut out = BufWriter::new(File::create(&path)?);
        self.format
            .write(image, &sequence_chunks(&self.text, sequence), &mut out)?;
        out.flush()?;
        debug!(path = %path.display(), sequence, "Wrote frame");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// Concatenates raw frames into a byte stream, e.g. a pipe into a video
/// encoder.
pub struct StreamOutput<W: Write + Send> {
    name: String,
    writer: W,
    format: FrameFormat,
    counter: SequenceCounter,
}

impl<W: Write + Send> StreamOutput<W> {
    /// Only the raw formats can be streamed; anything else is rejected.
    pub fn new(name: impl Into<String>, writer: W, format: FrameFormat) -> crate::Result<Self> {
        if !format.is_raw() {
            return Err(RenderError::UnsupportedStreamFormat(format.to_string()));
        }
        Ok(Self {
            name: name.into(),
            writer,
            format,
            counter: SequenceCounter::default(),
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Output for StreamOutput<W> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn begin(&mut self, total_frames: u64) {
        self.counter.begin(total_frames);
    }

    fn next_sequence_number(&mut self) -> u64 {
        self.counter.next_number()
    }

    fn write_frame(&mut self, image: &RenderBuffer, _sequence: u64) -> io::Result<()> {
        self.format.write(image, &[], &mut self.writer)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_and_countdown_numbering() {
        let mut up = SequenceCounter::new(Numbering::Ascending);
        up.begin(3);
        let seq: Vec<_> = (0..3).map(|_| up.next_number()).collect();
        assert_eq!(seq, vec![0, 1, 2]);

        let mut down = SequenceCounter::new(Numbering::Countdown);
        down.begin(3);
        let seq: Vec<_> = (0..3).map(|_| down.next_number()).collect();
        assert_eq!(seq, vec![2, 1, 0]);
    }

    #[test]
    fn hash_run_is_replaced_with_padded_number() {
        let out = MultiFileOutput::new("out/frame_####.png", FrameFormat::Png, Numbering::Ascending);
        assert_eq!(out.path_for(7), PathBuf::from("out/frame_0007.png"));
        assert_eq!(out.path_for(12345), PathBuf::from("out/frame_12345.png"));
    }

    #[test]
    fn number_inserted_before_extension_without_hashes() {
        let mut out = MultiFileOutput::new("shots/zoom.bgr", FrameFormat::RawBgr, Numbering::Ascending);
        out.begin(120);
        assert_eq!(out.path_for(5), PathBuf::from("shots/zoom_005.bgr"));

        let mut bare = MultiFileOutput::new("zoom", FrameFormat::RawBgr, Numbering::Ascending);
        bare.begin(1);
        assert_eq!(bare.path_for(0), PathBuf::from("zoom_0"));
    }

    #[test]
    fn multi_file_output_writes_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = MultiFileOutput::new(
            dir.path().join("f_##.png"),
            FrameFormat::Png,
            Numbering::Countdown,
        );
        out.begin(2);
        let image = RenderBuffer::new(4, 4);
        for _ in 0..2 {
            let seq = out.next_sequence_number();
            out.write_frame(&image, seq).unwrap();
        }
        assert!(dir.path().join("f_00.png").exists());
        assert!(dir.path().join("f_01.png").exists());
    }

    #[test]
    fn single_file_output_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last.bgr");
        let mut out = SingleFileOutput::new(&path, FrameFormat::RawBgr);
        out.begin(2);
        out.write_frame(&RenderBuffer::new(2, 2), 0).unwrap();
        out.write_frame(&RenderBuffer::new(3, 1), 1).unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), 3 * 3);
    }

    #[test]
    fn stream_concatenates_raw_frames() {
        let mut out = StreamOutput::new("memory", Vec::new(), FrameFormat::RawArgb).unwrap();
        out.begin(2);
        for _ in 0..2 {
            let seq = out.next_sequence_number();
            out.write_frame(&RenderBuffer::new(2, 2), seq).unwrap();
        }
        out.finish().unwrap();
        assert_eq!(out.into_inner().len(), 2 * 2 * 2 * 4);
    }

    #[test]
    fn stream_rejects_container_formats() {
        assert!(matches!(
            StreamOutput::new("memory", Vec::new(), FrameFormat::Png),
            Err(RenderError::UnsupportedStreamFormat(_))
        ));
    }
}
