/*!
 * Integration tests for the band-merge engine, driven against a scripted
 * stand-in for gdal_merge
 */

#![cfg(unix)]

use assert_fs::prelude::*;
use predicates::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use meander::{BandMergeEngine, GdalMerge, LandsatAcquisition, MeanderError};

/// A gdal_merge that concatenates its inputs into the -o target
fn write_fake_gdal_merge(dir: &Path) -> PathBuf {
    let script = dir.join("gdal_merge.py");
    let body = concat!(
        "#!/bin/sh\n",
        "out=\"\"\n",
        "files=\"\"\n",
        "while [ $# -gt 0 ]; do\n",
        "  case \"$1\" in\n",
        "    -o) out=\"$2\"; shift 2;;\n",
        "    -n) shift 2;;\n",
        "    *) files=\"$files $1\"; shift;;\n",
        "  esac\n",
        "done\n",
        "cat $files > \"$out\"\n",
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn make_acquisition(root: &Path, name: &str, suffixes: &[String]) -> LandsatAcquisition {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    for suffix in suffixes {
        let marker = format!("{}{};", name, suffix);
        std::fs::write(dir.join(format!("{}{}", name, suffix)), marker).unwrap();
    }
    LandsatAcquisition::from_dir(&dir).unwrap()
}

fn band_suffixes(vcid_thermal: bool) -> Vec<String> {
    (1u8..=7)
        .map(|band| {
            if band == 6 && vcid_thermal {
                "_B6_VCID_1.TIF".to_string()
            } else {
                format!("_B{}.TIF", band)
            }
        })
        .collect()
}

#[test]
fn test_merge_cohort_with_vcid_fallback() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("landsat");
    let out = temp.child("merged");

    // folderA ships its thermal band only under the VCID name
    let a = make_acquisition(src.path(), "folderA", &band_suffixes(true));
    let b = make_acquisition(src.path(), "folderB", &band_suffixes(false));

    let tool = GdalMerge::with_program(write_fake_gdal_merge(temp.path()));
    let job = BandMergeEngine::new(&tool)
        .merge(&[a, b], out.path())
        .unwrap();

    assert_eq!(job.outputs.len(), 7);
    for band in 1u8..=7 {
        out.child(format!("folderA/folderA_B{}.TIF", band))
            .assert(predicate::path::exists());
    }

    // Band 6 was assembled from folderA's VCID file and folderB's primary
    let merged = std::fs::read_to_string(out.path().join("folderA/folderA_B6.TIF")).unwrap();
    assert!(merged.contains("folderA_B6_VCID_1.TIF;"));
    assert!(merged.contains("folderB_B6.TIF;"));
}

#[test]
fn test_merge_into_source_parent_is_rejected() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("landsat");
    let a = make_acquisition(src.path(), "folderA", &band_suffixes(false));

    let tool = GdalMerge::with_program(write_fake_gdal_merge(temp.path()));
    let err = BandMergeEngine::new(&tool)
        .merge(std::slice::from_ref(&a), src.path())
        .unwrap_err();

    assert!(matches!(err, MeanderError::InvalidOutputPath { .. }));
    src.child("folderA/folderA_B1.TIF")
        .assert(predicate::str::contains("folderA_B1.TIF;"));
}

#[test]
fn test_missing_thermal_band_aborts_with_both_names() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("landsat");
    let out = temp.child("merged");

    // No B6 file under either name
    let suffixes: Vec<String> = band_suffixes(false)
        .into_iter()
        .filter(|s| s != "_B6.TIF")
        .collect();
    let a = make_acquisition(src.path(), "folderA", &suffixes);

    let tool = GdalMerge::with_program(write_fake_gdal_merge(temp.path()));
    let err = BandMergeEngine::new(&tool)
        .merge(std::slice::from_ref(&a), out.path())
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("folderA_B6.TIF"));
    assert!(msg.contains("folderA_B6_VCID_1.TIF"));

    // Bands 1..5 were already merged and stay on disk
    out.child("folderA/folderA_B5.TIF")
        .assert(predicate::path::exists());
    out.child("folderA/folderA_B6.TIF")
        .assert(predicate::path::missing());
}

#[test]
fn test_failing_tool_surfaces_band_and_diagnostic() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("landsat");
    let out = temp.child("merged");
    let a = make_acquisition(src.path(), "folderA", &band_suffixes(false));

    let script = temp.path().join("gdal_merge.py");
    std::fs::write(&script, "#!/bin/sh\necho 'projection mismatch' >&2\nexit 1\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let tool = GdalMerge::with_program(&script);
    let err = BandMergeEngine::new(&tool)
        .merge(std::slice::from_ref(&a), out.path())
        .unwrap_err();

    match err {
        MeanderError::MergeTool { band, detail } => {
            assert_eq!(band, 1);
            assert!(detail.contains("projection mismatch"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
