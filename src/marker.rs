//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use num_traits::{FromPrimitive, ToPrimitive};

use crate::debug::Debug;
use crate::error::Error;
use crate::packet::tlv::GrReason;

// Name of the persistent restart marker file.
const GR_MARKER_FILENAME: &str = "graceful_restart.conf";

// Contents of the persistent restart marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MarkerRecord {
    // Wall clock at the time the marker was written.
    pub restart_time: DateTime<Utc>,
    // Graceful restart was enabled when the process went down.
    pub enabled: bool,
    // Announced restart reason.
    pub reason: GrReason,
}

// ===== global functions =====

pub fn path(sysconfdir: &Path) -> PathBuf {
    sysconfdir.join(GR_MARKER_FILENAME)
}

// Persists the restart marker for the next incarnation of the process.
pub fn write(
    sysconfdir: &Path,
    grace_enable: bool,
    reason: GrReason,
) -> Result<(), Error> {
    let path = path(sysconfdir);
    let data = format!(
        "RESTARTTIME\t{}\nGRACEFULEENABLE\t{}\nRESTARTRSN\t{}\n",
        Utc::now().timestamp(),
        grace_enable as u8,
        reason.to_u8().unwrap(),
    );

    fs::write(&path, data).map_err(Error::PersistentMarkerIo)?;
    Debug::GrMarkerWrite(path.as_path()).log();
    Ok(())
}

// Reads and consumes the restart marker left by the previous incarnation.
//
// An absent file is an ordinary cold start. A present file is removed even
// when its contents turn out to be unparsable.
pub fn read(sysconfdir: &Path) -> Result<Option<MarkerRecord>, Error> {
    let path = path(sysconfdir);
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Ok(None);
        }
        Err(error) => return Err(Error::PersistentMarkerIo(error)),
    };

    // The marker never outlives the startup that read it.
    if let Err(error) = fs::remove_file(&path) {
        Error::PersistentMarkerIo(error).log();
    }

    let record = parse(&data).ok_or_else(|| {
        Error::PersistentMarkerIo(io::Error::new(
            io::ErrorKind::InvalidData,
            "malformed restart marker",
        ))
    })?;
    Debug::GrMarkerRead(&record).log();
    Ok(Some(record))
}

// ===== helper functions =====

fn parse(data: &str) -> Option<MarkerRecord> {
    let mut restart_time = None;
    let mut enabled = None;
    let mut reason = None;

    for line in data.lines() {
        let (key, value) = line.split_once('\t')?;
        match key {
            "RESTARTTIME" => {
                let secs = value.parse::<i64>().ok()?;
                restart_time = Utc.timestamp_opt(secs, 0).single();
            }
            "GRACEFULEENABLE" => {
                enabled = Some(value.parse::<u8>().ok()? != 0);
            }
            "RESTARTRSN" => {
                reason = GrReason::from_u8(value.parse::<u8>().ok()?);
            }
            _ => return None,
        }
    }

    Some(MarkerRecord {
        restart_time: restart_time?,
        enabled: enabled?,
        reason: reason?,
    })
}
