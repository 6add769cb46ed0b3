//! Inbound commands and their responses.
//!
//! The HTTP routes resolve into these values; the event loop handles each
//! one synchronously inside its dispatch step and always answers with a
//! [`Response`].

use crate::settings::SettingsReport;

/// Largest upload / update chunk carried by one command.
pub const CHUNK_CAPACITY: usize = 1024;

/// One slice of a streamed transfer body.
pub type Chunk = heapless::Vec<u8, CHUNK_CAPACITY>;

/// Fixed acknowledgment payloads.
pub const RING_ACK: &str = "Ding dong";
pub const REBOOT_ACK: &str = "Rebooting";
pub const UPLOAD_ACK: &str = "Upload received";
pub const UPDATE_ACK: &str = "Update received";

/// Static identity / help text for the root route.
pub const ROOT_INFO: &str = concat!(
    "Doorbell chime firmware v",
    env!("CARGO_PKG_VERSION"),
    "\n\n",
    "GET  /ring      play the ringtone\n",
    "GET  /settings  runtime report (JSON)\n",
    "GET  /reboot    restart the device\n",
    "GET  /upload    ringtone upload form\n",
    "POST /upload    upload a new ringtone (WAV)\n",
    "POST /update    push a firmware image\n",
);

/// Minimal upload form descriptor.
pub const UPLOAD_FORM: &str = "<title>Chime</title>\
    <h1>Upload ringtone</h1>\
    <form method=POST action=/upload enctype=multipart/form-data>\
    <input type=file name=ringtone accept=.wav required><br><br>\
    <input type=submit value=Upload>\
    </form>";

/// Transfer events for the ringtone upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Start,
    Chunk(Chunk),
    End { total: u32 },
    Abort,
}

/// Transfer events for a firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Begin { size: u32 },
    Chunk(Chunk),
    Finish,
    Abort,
}

/// Commands that the control surface can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ring,
    Settings,
    Reboot,
    UploadInfo,
    Upload(UploadEvent),
    Root,
    Update(UpdateEvent),
}

/// Synchronous answer to a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Fixed acknowledgment text.
    Ack(&'static str),
    /// Static text or HTML.
    Text(&'static str),
    /// Live settings snapshot.
    Settings(SettingsReport),
    /// The command was received but could not be carried out.
    Failed(&'static str),
}
