/**
 * RENDER/ENCODE PIPELINE - turns a dirty DisplayState into a published PNG
 *
 * STATES: Clean -> Dirty (any tracked change) -> Rendering (capture on the
 * scheduler task) -> Encoding (PNG on the blocking pool) -> Clean/Dirty.
 *
 * RULES:
 * - at most one render/encode in flight
 * - the artifact carries the version seen when capture started, never a later one
 * - on capture or encode failure the old artifact stays and the next tick retries
 * - a change during an in-flight encode is picked up once it completes
 */

use crate::encode::{self, EncodeError};
use crate::models::{Artifact, Version};
use crate::render::{RawFrame, RenderError, RenderSurface, Scene, FrameSize};
use crate::service::Service;
use crate::status::Source;
use axum::body::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Clean,
    Dirty,
    Rendering,
    Encoding,
}

/// Captured frame waiting for compression.
#[derive(Debug)]
pub struct EncodeJob {
    pub version: Version,
    pub frame: RawFrame,
}

#[derive(Debug)]
pub struct Encoded {
    pub version: Version,
    pub result: Result<Bytes, EncodeError>,
}

pub struct Pipeline {
    surface: Arc<dyn RenderSurface>,
    size: FrameSize,
    snapshot_path: Option<PathBuf>,
    in_flight: Option<Version>,
    phase: Phase,
}

impl Pipeline {
    pub fn new(surface: Arc<dyn RenderSurface>, size: FrameSize) -> Self {
        Self { surface, size, snapshot_path: None, in_flight: None, phase: Phase::Clean }
    }

    pub fn with_snapshot_path(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot_path = path;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_flight(&self) -> Option<Version> {
        self.in_flight
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Dirty -> Rendering -> Encoding. Returns the frame to compress, or `None`
    /// when clean, already busy, or the capture failed.
    pub fn begin(&mut self, service: &Service) -> Option<EncodeJob> {
        if self.in_flight.is_some() {
            return None;
        }
        let state = service.display_snapshot();
        if state.version == service.artifacts.published_version() {
            self.phase = Phase::Clean;
            return None;
        }

        self.phase = Phase::Rendering;
        let status = service.status.label();
        let started = Instant::now();
        let captured = self
            .surface
            .capture(&Scene { state: &state, status: &status }, self.size)
            .and_then(|frame| {
                if frame.size() == self.size {
                    Ok(frame)
                } else {
                    Err(RenderError::SizeMismatch { expected: self.size, got: frame.size() })
                }
            });
        let frame = match captured {
            Ok(frame) => frame,
            Err(e) => {
                warn!("render failed, keeping previous image: {e}");
                service.status.record_error(Source::Render, &e);
                self.phase = Phase::Dirty;
                return None;
            }
        };
        debug!(
            version = %state.version.to_epoch_string(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "frame captured"
        );

        self.in_flight = Some(state.version);
        self.phase = Phase::Encoding;
        Some(EncodeJob { version: state.version, frame })
    }

    /// Encoding -> Clean (or Dirty if the state moved on / the encode failed).
    pub fn complete(&mut self, service: &Service, encoded: Encoded) -> bool {
        if self.in_flight != Some(encoded.version) {
            warn!(
                version = %encoded.version.to_epoch_string(),
                "encode result does not match the in-flight render"
            );
        }
        self.in_flight = None;

        let published = match encoded.result {
            Ok(image) => {
                let bytes = image.len();
                let published = service.artifacts.publish(Artifact { image, version: encoded.version });
                if published {
                    service.status.clear(Source::Render);
                    info!(version = %encoded.version.to_epoch_string(), bytes, "published new image");
                }
                published
            }
            Err(e) => {
                warn!("encode failed, will retry: {e}");
                service.status.record_error(Source::Render, &e);
                false
            }
        };

        self.phase = if service.is_dirty() { Phase::Dirty } else { Phase::Clean };
        published
    }
}

/// Compresses the frame and writes the optional snapshot file. Blocking.
pub fn run_encode(job: EncodeJob, snapshot_path: Option<&Path>) -> Encoded {
    let started = Instant::now();
    let result = encode::encode_png(&job.frame).map(|png| {
        if let Some(path) = snapshot_path {
            if let Err(e) = encode::write_snapshot(path, &png) {
                warn!("cannot write snapshot {}: {e}", path.display());
            }
        }
        Bytes::from(png)
    });
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, ok = result.is_ok(), "encode finished");
    Encoded { version: job.version, result }
}
