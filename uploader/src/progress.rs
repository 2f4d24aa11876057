//! Upload lifecycle events and their rendering as console status lines.

use std::fmt;
use std::io::Write;

/// Which of the three uploads an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Video,
    Caption,
    Thumbnail,
}

impl Asset {
    pub fn label(&self) -> &'static str {
        match self {
            Asset::Video => "Video",
            Asset::Caption => "Caption",
            Asset::Thumbnail => "Thumbnail",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A step in the lifecycle of one upload.
///
/// For a single upload, `Starting` (if emitted) comes first, followed by any number of
/// `Uploading` events with non-decreasing byte counts, and then exactly one of `Completed` or
/// `Failed`.
#[derive(Debug)]
pub enum ProgressEvent {
    Starting,
    /// `bytes_sent` is the cumulative number of bytes the server has acknowledged.
    Uploading {
        bytes_sent: u64,
    },
    Completed,
    Failed {
        cause: eyre::Report,
    },
}

/// Receives the events of every upload in a run, in order, from a single flow.
pub trait ProgressObserver {
    fn observe(&mut self, asset: Asset, event: &ProgressEvent);

    /// Called once the API has handed back the resource an upload created or updated.
    fn resource_ready(&mut self, asset: Asset, resource_id: Option<&str>) {
        let _ = (asset, resource_id);
    }
}

impl<T: ProgressObserver + ?Sized> ProgressObserver for &mut T {
    fn observe(&mut self, asset: Asset, event: &ProgressEvent) {
        (**self).observe(asset, event)
    }

    fn resource_ready(&mut self, asset: Asset, resource_id: Option<&str>) {
        (**self).resource_ready(asset, resource_id)
    }
}

/// Writes one human-readable line per event, prefixed with the asset it concerns.
#[derive(Debug)]
pub struct UploadProgressReporter<W> {
    out: W,
}

impl UploadProgressReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> UploadProgressReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(asset: Asset, event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::Starting => format!("{asset}: starting upload"),
            ProgressEvent::Uploading { bytes_sent } => format!("{asset}: {bytes_sent} bytes sent."),
            ProgressEvent::Completed => format!("{asset}: upload completed"),
            ProgressEvent::Failed { cause } => {
                format!("{asset}: an error prevented the upload from completing: {cause:#}")
            }
        }
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            tracing::warn!(error = %e, "could not write progress line");
        }
    }
}

impl<W: Write> ProgressObserver for UploadProgressReporter<W> {
    fn observe(&mut self, asset: Asset, event: &ProgressEvent) {
        let line = Self::render(asset, event);
        self.emit(&line);
    }

    fn resource_ready(&mut self, asset: Asset, resource_id: Option<&str>) {
        let line = match (asset, resource_id) {
            (Asset::Thumbnail, _) | (_, None) => format!("{asset} was successfully uploaded."),
            (_, Some(id)) => format!("{asset} id '{id}' was successfully uploaded."),
        };
        self.emit(&line);
    }
}
