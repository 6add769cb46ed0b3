//! HTTP control surface (ESP-IDF only).
//!
//! Every route turns into one or more [`Command`]s on the [`BUS`] and
//! waits, bounded, for the loop's [`Response`]. Upload and update bodies
//! are streamed: the handler reads the socket in chunk-sized slices and
//! forwards each slice as its own command, so neither file is buffered.
//!
//! While the provisioning portal is up the loop is blocked, so every page
//! serves the credential form instead and `/wifi` hands the credentials
//! straight to the portal.

use std::time::Duration;

use esp_idf_svc::http::server::{
    Configuration as HttpConfiguration, EspHttpConnection, EspHttpServer, Request,
};
use esp_idf_svc::http::{Headers, Method};
use esp_idf_svc::io::{Read, Write};
use log::{info, warn};

use crate::adapters::multipart::{boundary_from_content_type, MultipartExtractor};
use crate::adapters::portal::{self, PORTAL_ACK, PORTAL_FORM};
use crate::app::commands::{Chunk, Command, Response, UpdateEvent, UploadEvent, CHUNK_CAPACITY};
use crate::dispatch::BUS;
use crate::error::CommsError;

type HttpRequest<'r, 'c> = Request<&'r mut EspHttpConnection<'c>>;

/// Longest `/wifi` form body accepted.
const MAX_FORM_BODY: usize = 256;

/// Paths operating systems probe to detect a captive portal.
const CAPTIVE_PROBES: [&str; 6] = [
    "/generate_204",
    "/gen_204",
    "/hotspot-detect.html",
    "/connecttest.txt",
    "/ncsi.txt",
    "/fwlink",
];

pub fn start_server(port: u16, request_timeout: Duration) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        http_port: port,
        stack_size: 16 * 1024,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&conf)?;

    for (path, command) in [
        ("/", Command::Root),
        ("/ring", Command::Ring),
        ("/settings", Command::Settings),
        ("/reboot", Command::Reboot),
        ("/upload", Command::UploadInfo),
    ] {
        server.fn_handler::<anyhow::Error, _>(path, Method::Get, move |req| {
            if portal::is_active() {
                return write_html(req, 200, PORTAL_FORM);
            }
            respond(req, BUS.request(command.clone(), request_timeout))
        })?;
    }

    for path in CAPTIVE_PROBES {
        server.fn_handler::<anyhow::Error, _>(path, Method::Get, move |req| {
            if portal::is_active() {
                write_html(req, 200, PORTAL_FORM)
            } else {
                write_text(req, 404, "text/plain", "Not found")
            }
        })?;
    }

    server.fn_handler::<anyhow::Error, _>("/upload", Method::Post, move |mut req| {
        if portal::is_active() {
            return write_html(req, 503, PORTAL_FORM);
        }
        let result = stream_upload(&mut req, request_timeout);
        respond(req, result)
    })?;

    server.fn_handler::<anyhow::Error, _>("/update", Method::Post, move |mut req| {
        if portal::is_active() {
            return write_html(req, 503, PORTAL_FORM);
        }
        let result = stream_update(&mut req, request_timeout);
        respond(req, result)
    })?;

    server.fn_handler::<anyhow::Error, _>("/wifi", Method::Post, move |mut req| {
        if !portal::is_active() {
            return write_text(req, 409, "text/plain", "Not in setup mode");
        }
        let body = read_form_body(&mut req)?;
        match portal::parse_credentials_form(&body) {
            Ok(creds) => {
                info!("http: credentials received for '{}'", creds.ssid);
                portal::submit_credentials(creds);
                write_text(req, 200, "text/plain", PORTAL_ACK)
            }
            Err(e) => write_text(req, 400, "text/plain", &e.to_string()),
        }
    })?;

    info!("http: listening on port {port}");
    Ok(server)
}

/// Outcome of a streamed transfer that the route reports back.
enum StreamError {
    Bus(CommsError),
    BadRequest(&'static str),
    Rejected(&'static str),
}

impl From<CommsError> for StreamError {
    fn from(e: CommsError) -> Self {
        Self::Bus(e)
    }
}

fn stream_upload(req: &mut HttpRequest<'_, '_>, timeout: Duration) -> Result<Response, StreamError> {
    let boundary = req
        .header("Content-Type")
        .and_then(boundary_from_content_type)
        .map(str::to_owned)
        .ok_or(StreamError::BadRequest("expected multipart/form-data"))?;

    let started = BUS.request_or_undo(
        Command::Upload(UploadEvent::Start),
        Command::Upload(UploadEvent::Abort),
        timeout,
    )?;
    expect_ack(started)?;

    let mut extractor = MultipartExtractor::new(&boundary);
    let mut buf = [0u8; CHUNK_CAPACITY];
    let mut forward_error: Option<CommsError> = None;

    let transfer: Result<(), StreamError> = loop {
        let n = match req.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => {
                warn!("http: upload read failed: {e:?}");
                break Err(StreamError::BadRequest("connection lost"));
            }
        };
        let fed = extractor.feed(&buf[..n], &mut |bytes: &[u8]| {
            if forward_error.is_some() {
                return;
            }
            for piece in bytes.chunks(CHUNK_CAPACITY) {
                let Ok(chunk) = Chunk::from_slice(piece) else {
                    continue;
                };
                if let Err(e) = BUS.request(Command::Upload(UploadEvent::Chunk(chunk)), timeout) {
                    forward_error = Some(e);
                    return;
                }
            }
        });
        if let Some(e) = forward_error {
            break Err(StreamError::Bus(e));
        }
        if fed.is_err() {
            break Err(StreamError::BadRequest("malformed multipart body"));
        }
        if extractor.is_done() {
            break Ok(());
        }
    };

    let transfer = transfer.and_then(|()| {
        if extractor.is_done() && extractor.found_file() {
            Ok(())
        } else {
            Err(StreamError::BadRequest("no complete file part"))
        }
    });

    match transfer {
        Ok(()) => {
            let total = extractor.emitted();
            Ok(BUS.request(Command::Upload(UploadEvent::End { total }), timeout)?)
        }
        Err(e) => {
            BUS.send_best_effort(Command::Upload(UploadEvent::Abort), timeout);
            Err(e)
        }
    }
}

fn stream_update(req: &mut HttpRequest<'_, '_>, timeout: Duration) -> Result<Response, StreamError> {
    let size = req
        .content_len()
        .and_then(|len| u32::try_from(len).ok())
        .filter(|&len| len > 0)
        .ok_or(StreamError::BadRequest("Content-Length required"))?;

    let begun = BUS.request_or_undo(
        Command::Update(UpdateEvent::Begin { size }),
        Command::Update(UpdateEvent::Abort),
        timeout,
    )?;
    expect_ack(begun)?;

    let mut buf = [0u8; CHUNK_CAPACITY];
    let mut received: u32 = 0;
    let transfer: Result<(), StreamError> = loop {
        let n = match req.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => {
                warn!("http: update read failed: {e:?}");
                break Err(StreamError::BadRequest("connection lost"));
            }
        };
        let Ok(chunk) = Chunk::from_slice(&buf[..n]) else {
            break Err(StreamError::BadRequest("chunk too large"));
        };
        received += n as u32;
        let step = BUS
            .request(Command::Update(UpdateEvent::Chunk(chunk)), timeout)
            .map_err(StreamError::from)
            .and_then(expect_ack);
        if let Err(e) = step {
            break Err(e);
        }
    };

    match transfer {
        Ok(()) => {
            info!("http: update body complete ({received}/{size} bytes)");
            let resp = BUS.request(Command::Update(UpdateEvent::Finish), timeout)?;
            expect_ack(resp)
        }
        Err(e) => {
            BUS.send_best_effort(Command::Update(UpdateEvent::Abort), timeout);
            Err(e)
        }
    }
}

fn expect_ack(resp: Response) -> Result<Response, StreamError> {
    match resp {
        Response::Failed(msg) => Err(StreamError::Rejected(msg)),
        other => Ok(other),
    }
}

fn respond<E>(req: HttpRequest<'_, '_>, result: Result<Response, E>) -> anyhow::Result<()>
where
    StreamError: From<E>,
{
    match result.map_err(StreamError::from) {
        Ok(Response::Ack(text)) => write_text(req, 200, "text/plain", text),
        Ok(Response::Text(text)) if text.starts_with('<') => write_html(req, 200, text),
        Ok(Response::Text(text)) => write_text(req, 200, "text/plain", text),
        Ok(Response::Settings(report)) => match report.to_json() {
            Ok(body) => write_text(req, 200, "application/json; charset=utf-8", &body),
            Err(_) => write_text(req, 500, "text/plain", "Settings unavailable"),
        },
        Ok(Response::Failed(msg)) | Err(StreamError::Rejected(msg)) => {
            write_text(req, 500, "text/plain", msg)
        }
        Err(StreamError::BadRequest(msg)) => write_text(req, 400, "text/plain", msg),
        Err(StreamError::Bus(e)) => {
            warn!("http: {e}");
            write_text(req, 503, "text/plain", "Device busy")
        }
    }
}

fn read_form_body(req: &mut HttpRequest<'_, '_>) -> anyhow::Result<Vec<u8>> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len > MAX_FORM_BODY {
        anyhow::bail!("form body too large");
    }
    let mut body = vec![0_u8; len];
    if len > 0 {
        req.read_exact(&mut body)?;
    }
    Ok(body)
}

fn write_html(req: HttpRequest<'_, '_>, status: u16, body: &str) -> anyhow::Result<()> {
    write_text(req, status, "text/html; charset=utf-8", body)
}

fn write_text(
    req: HttpRequest<'_, '_>,
    status: u16,
    content_type: &str,
    body: &str,
) -> anyhow::Result<()> {
    req.into_response(status, None, &[("Content-Type", content_type)])?
        .write_all(body.as_bytes())?;
    Ok(())
}
