//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use ospf_gr::error::Error;
use ospf_gr::instance::InstanceShared;
use ospf_gr::marker;
use ospf_gr::packet::tlv::GrReason;

fn tempdir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("ospf-gr-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_write_read_round_trip() {
    let dir = tempdir("round-trip");

    marker::write(&dir, true, GrReason::SoftwareRestart).unwrap();
    assert!(marker::path(&dir).exists());

    let before = Utc::now();
    let record = marker::read(&dir).unwrap().unwrap();
    assert!(record.enabled);
    assert_eq!(record.reason, GrReason::SoftwareRestart);
    assert!(record.restart_time <= before);
    assert!((before - record.restart_time).num_seconds() < 60);

    // The marker is consumed by the read.
    assert!(!marker::path(&dir).exists());
    assert!(marker::read(&dir).unwrap().is_none());
}

#[test]
fn test_read_cold_start() {
    let dir = tempdir("cold-start");
    assert!(marker::read(&dir).unwrap().is_none());
}

#[test]
fn test_read_disabled() {
    let dir = tempdir("disabled");

    marker::write(&dir, false, GrReason::Unknown).unwrap();
    let record = marker::read(&dir).unwrap().unwrap();
    assert!(!record.enabled);
    assert_eq!(record.reason, GrReason::Unknown);
}

#[test]
fn test_read_malformed() {
    let dir = tempdir("malformed");

    fs::write(marker::path(&dir), "RESTARTTIME bogus\n").unwrap();
    assert!(matches!(
        marker::read(&dir),
        Err(Error::PersistentMarkerIo(_))
    ));

    // Even an unparsable marker is consumed.
    assert!(!marker::path(&dir).exists());
}

#[test]
fn test_shared_load() {
    let dir = tempdir("shared-load");

    marker::write(&dir, true, GrReason::SoftwareUpgrade).unwrap();
    let shared = InstanceShared::load(dir.clone());
    assert!(shared.restart_in_progress.get());
    assert_eq!(shared.restart_reason.get(), GrReason::SoftwareUpgrade);
    assert!(shared.marker_time.get().is_some());

    // A subsequent startup finds nothing.
    let shared = InstanceShared::load(dir);
    assert!(!shared.restart_in_progress.get());
}
