//! IP camera client for servers offering Motion JPEG streams over HTTP.
//!
//! The stream is expected to be a `multipart/x-mixed-replace` response whose parts are JPEG images.
//! Parts may or may not carry a `Content-Length` header, and the response may use chunked transfer
//! encoding, so this also consumes the `/asl_stream` endpoint of another instance of this server.

use std::{
    io::{self, prelude::*, BufReader},
    net::TcpStream,
};

use anyhow::{bail, Context};
use axum::http::Uri;

use crate::{
    image::Image,
    timer::{FpsCounter, Timer},
};

use super::Camera;

/// A client reading frames from an MJPEG-over-HTTP stream.
pub struct HttpCamera {
    parts: Parts,
    fps: FpsCounter,
    t_dequeue: Timer,
    t_decode: Timer,
}

/// The multipart body of the response.
struct Parts {
    body: Box<dyn BufRead + Send>,
    boundary: String,
    ended: bool,
}

impl HttpCamera {
    /// Connects to an `http://host[:port]/path` stream URL and waits for the first part.
    pub fn connect(url: &str) -> anyhow::Result<Self> {
        let uri: Uri = url
            .parse()
            .with_context(|| format!("invalid camera URL '{url}'"))?;
        if uri.scheme_str() != Some("http") {
            bail!("unsupported camera URL '{url}' (only `http://` is supported)");
        }
        let Some(host) = uri.host() else {
            bail!("camera URL '{url}' has no host");
        };
        let port = uri.port_u16().unwrap_or(80);
        let path = uri.path_and_query().map_or("/", |p| p.as_str());

        let mut stream = TcpStream::connect((host, port))
            .with_context(|| format!("failed to connect to {host}:{port}"))?;
        write!(
            stream,
            "GET {path} HTTP/1.1\r\nHost: {host}:{port}\r\nAccept: multipart/x-mixed-replace\r\n\r\n"
        )?;

        let mut stream = BufReader::new(stream);
        let head = read_head(&mut stream)?;
        log::debug!("connected to {url}, multipart boundary `{}`", head.boundary);

        let body: Box<dyn BufRead + Send> = if head.chunked {
            Box::new(BufReader::new(ChunkedReader::new(stream)))
        } else {
            Box::new(stream)
        };

        let mut parts = Parts {
            body,
            boundary: head.boundary,
            ended: false,
        };
        parts.skip_to_boundary()?;
        Ok(Self {
            parts,
            fps: FpsCounter::new(format!("httpcam {host}")),
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        })
    }
}

impl Parts {
    /// Reads a line including the `\n` terminator. Returns an empty buffer at end of stream.
    fn read_line(&mut self, line: &mut Vec<u8>) -> io::Result<()> {
        line.clear();
        self.body.read_until(b'\n', line)?;
        Ok(())
    }

    /// Returns whether `line` is the boundary delimiter, updating `ended` if it is the closing one.
    fn is_boundary(&mut self, line: &[u8]) -> bool {
        let line = trim_newline(line);
        let Some(rest) = line.strip_prefix(self.boundary.as_bytes()) else {
            return false;
        };
        match rest {
            b"" => true,
            b"--" => {
                self.ended = true;
                true
            }
            _ => false,
        }
    }

    fn skip_to_boundary(&mut self) -> anyhow::Result<()> {
        let mut line = Vec::new();
        loop {
            self.read_line(&mut line)?;
            if line.is_empty() {
                bail!("stream ended before the first frame");
            }
            if self.is_boundary(&line) {
                return Ok(());
            }
        }
    }

    fn read_part(&mut self) -> anyhow::Result<Vec<u8>> {
        if self.ended {
            bail!("stream has ended");
        }

        let mut length = None;
        let mut line = Vec::new();
        loop {
            self.read_line(&mut line)?;
            if line.is_empty() {
                self.ended = true;
                bail!("stream has ended");
            }
            let header = trim_newline(&line);
            if header.is_empty() {
                break;
            }

            let header = String::from_utf8_lossy(header);
            log::trace!("multipart header: {}", header);
            let Some((key, value)) = header.split_once(':') else {
                bail!("malformed multipart header '{header}'");
            };
            let value = value.trim();
            if key.eq_ignore_ascii_case("Content-Type") && !value.eq_ignore_ascii_case("image/jpeg")
            {
                bail!("unexpected Content-Type: expected image/jpeg, got {value}");
            }
            if key.eq_ignore_ascii_case("Content-Length") {
                length = Some(value.parse::<usize>().context("invalid Content-Length")?);
            }
        }

        match length {
            Some(length) => {
                let mut data = vec![0; length];
                self.body.read_exact(&mut data)?;
                // Skip the trailing line break(s) up to the next boundary. The stream may also end
                // here.
                loop {
                    self.read_line(&mut line)?;
                    if line.is_empty() {
                        self.ended = true;
                        break;
                    }
                    if self.is_boundary(&line) {
                        break;
                    }
                }
                Ok(data)
            }
            None => {
                // Everything up to the next boundary, minus the line breaks in front of it.
                let mut data = Vec::new();
                loop {
                    self.read_line(&mut line)?;
                    if line.is_empty() {
                        self.ended = true;
                        break;
                    }
                    if self.is_boundary(&line) {
                        break;
                    }
                    data.extend_from_slice(&line);
                }
                while matches!(data.last(), Some(b'\r' | b'\n')) {
                    data.pop();
                }
                Ok(data)
            }
        }
    }
}

impl Camera for HttpCamera {
    fn read(&mut self) -> anyhow::Result<Image> {
        let parts = &mut self.parts;
        let data = self.t_dequeue.time(|| parts.read_part())?;

        let image = self.t_decode.time(|| Image::decode_jpeg(&data))?;
        self.fps.tick_with([&self.t_dequeue, &self.t_decode]);
        Ok(image)
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

struct ResponseHead {
    boundary: String,
    chunked: bool,
}

/// Reads the status line and headers of the response.
fn read_head<R: BufRead>(stream: &mut R) -> anyhow::Result<ResponseHead> {
    let mut line = String::new();
    stream.read_line(&mut line)?;
    log::trace!("response: {}", line.trim());
    let status = line.split_whitespace().nth(1);
    if !line.starts_with("HTTP/1.") || status != Some("200") {
        bail!("received unexpected response: {}", line.trim());
    }

    let mut boundary = None;
    let mut chunked = false;
    loop {
        line.clear();
        if stream.read_line(&mut line)? == 0 {
            bail!("connection closed while reading response headers");
        }
        let header = line.trim();
        if header.is_empty() {
            break;
        }

        log::trace!("response header: {}", header);
        let Some((name, value)) = header.split_once(':') else {
            bail!("malformed HTTP response header '{header}'");
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("Content-Type") {
            boundary = Some(parse_boundary(value)?);
        } else if name.eq_ignore_ascii_case("Transfer-Encoding") {
            chunked = value
                .split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        }
    }

    let Some(boundary) = boundary else {
        bail!("missing `Content-Type` header");
    };
    Ok(ResponseHead { boundary, chunked })
}

/// Extracts the boundary delimiter (including the leading `--`) from a `Content-Type` value.
fn parse_boundary(content_type: &str) -> anyhow::Result<String> {
    let mut params = content_type.split(';').map(str::trim);
    let mime = params.next().unwrap_or_default();
    if !mime.eq_ignore_ascii_case("multipart/x-mixed-replace") {
        bail!("malformed Content-Type header: unexpected mime type {mime}");
    }

    let Some(bnd) = params.find_map(|param| param.strip_prefix("boundary=")) else {
        bail!("malformed Content-Type header (missing boundary)");
    };
    let bnd = bnd.trim_matches('"');
    // Some servers (Droidcam) include the `--` in the boundary parameter.
    Ok(if bnd.starts_with("--") {
        bnd.to_string()
    } else {
        format!("--{bnd}")
    })
}

/// Decodes an HTTP/1.1 `Transfer-Encoding: chunked` body.
struct ChunkedReader<R> {
    inner: R,
    /// Bytes left in the current chunk.
    remaining: usize,
    done: bool,
}

impl<R: BufRead> ChunkedReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: 0,
            done: false,
        }
    }

    fn next_chunk(&mut self) -> io::Result<()> {
        let mut line = String::new();
        if self.inner.read_line(&mut line)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        // Chunk extensions after `;` are ignored.
        let size = line.trim().split(';').next().unwrap_or_default();
        self.remaining = usize::from_str_radix(size.trim(), 16)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if self.remaining == 0 {
            self.done = true;
        }
        Ok(())
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            self.next_chunk()?;
            if self.done {
                return Ok(0);
            }
        }

        let max = buf.len().min(self.remaining);
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.remaining -= n;
        if self.remaining == 0 {
            let mut crlf = [0; 2];
            self.inner.read_exact(&mut crlf)?;
            if crlf != *b"\r\n" {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "missing CRLF after chunk data",
                ));
            }
        }
        Ok(n)
    }
}
