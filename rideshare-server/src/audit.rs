//! Per-request audit files for route matching.
//!
//! Each match request leaves a small text file describing what was asked
//! and what was offered. Writing is best-effort: a failure is logged and the
//! request carries on.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::matching::{Classification, MatchError, MatchRequest, MatchResult};

/// Errors writing an audit file.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to create audit directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write audit file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Directory of route match audit files.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a request: `{timestamp}_{request-id}_route_match.log`.
    pub fn file_name(at: DateTime<Utc>, request_id: u64) -> String {
        format!("{}_{request_id}_route_match.log", at.format("%Y%m%d_%H%M%S%3f"))
    }

    /// Write one audit file, creating the directory if needed.
    pub async fn write(
        &self,
        request_id: u64,
        request: &MatchRequest,
        outcome: &Result<MatchResult, MatchError>,
    ) -> Result<PathBuf, AuditError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| AuditError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(Self::file_name(Utc::now(), request_id));
        tokio::fs::write(&path, render(request, outcome))
            .await
            .map_err(|source| AuditError::Write {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }

    /// Write one audit file, logging instead of failing.
    pub async fn record(
        &self,
        request_id: u64,
        request: &MatchRequest,
        outcome: &Result<MatchResult, MatchError>,
    ) {
        if let Err(e) = self.write(request_id, request, outcome).await {
            warn!(request_id, error = %e, "Failed to write route match audit file");
        }
    }
}

/// Human-readable account of one request and its outcome.
pub fn render(request: &MatchRequest, outcome: &Result<MatchResult, MatchError>) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "departure: {}", request.departure_time);
    let _ = writeln!(out, "flexibility: {} min", request.flexibility_minutes);
    let _ = writeln!(
        out,
        "origin: node {} {}",
        request.origin,
        request.origin_address.as_deref().unwrap_or("")
    );
    let _ = writeln!(
        out,
        "destination: node {} {}",
        request.destination,
        request.destination_address.as_deref().unwrap_or("")
    );
    let _ = writeln!(
        out,
        "rider direct: {} mi, {} min",
        request.rider_direct.distance_miles, request.rider_direct.duration_minutes
    );

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            let _ = writeln!(out, "error: {e}");
            return out;
        }
    };

    let _ = writeln!(out, "routes explored: {}", result.routes_explored);
    let _ = writeln!(out, "chains: {}", result.chains.len());

    let labels = [
        Classification::Primary,
        Classification::Secondary,
        Classification::Tertiary,
    ];
    for (idx, scored) in result.chains.iter().enumerate() {
        let _ = writeln!(out, "#{} efficiency {}", idx + 1, scored.efficiency);
        for (label, leg) in labels.iter().zip(scored.chain.legs()) {
            let _ = writeln!(
                out,
                "  {label}: route {} node {} rank {} at {} -> node {} rank {} at {} ({} mi, {} min)",
                leg.route().id,
                leg.board_node(),
                leg.boarding_rank(),
                leg.departure_time(),
                leg.alight_node(),
                leg.alighting_rank(),
                leg.arrival_time(),
                leg.distance_miles(),
                leg.duration_minutes(),
            );
        }
    }

    out
}
