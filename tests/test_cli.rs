// tests/test_cli.rs
mod common;

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;

use assert_cmd::Command;
use common::{write_file, write_marker, Fixture};
use flate2::read::GzDecoder;
use predicates::prelude::*;

fn lanefind(fx: &Fixture) -> Command {
    let mut cmd = Command::cargo_bin("lanefind").unwrap();
    cmd.env_remove("RUST_LOG").arg("--database").arg(&fx.db);
    cmd
}

/// Two imported lanes with paired fastq files.
fn fastq_fixture() -> Fixture {
    let fx = Fixture::new();
    for (id, lane) in [(1, "12345_1#1"), (2, "12345_1#2")] {
        fx.add_lane(id, lane, 1, true);
        for read in [1, 2] {
            write_file(
                fx.storage_dir(lane).join(format!("{lane}_{read}.fastq.gz")),
                &format!("@{lane}/{read}\nACGT\n+\nIIII\n"),
            );
        }
    }
    fx
}

#[test]
fn data_lists_symlink_tier_paths() {
    let fx = fastq_fixture();
    let expected = fx.symlink_dir("12345_1#1").join("12345_1#1_1.fastq.gz");

    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "12345_1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.to_string_lossy().to_string()))
        .stdout(predicate::str::contains("12345_1#2_2.fastq.gz"))
        .stdout(predicate::str::contains("/storage/").not());
}

#[test]
fn unknown_lane_reports_no_files() {
    let fx = fastq_fixture();
    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "99999_9"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No files found."));
}

#[test]
fn file_type_without_file_id_type_fails_before_the_database() {
    let fx = Fixture::new();
    let ids = fx.root().join("ids.txt");
    write_file(&ids, "12345_1#1\n");

    Command::cargo_bin("lanefind")
        .unwrap()
        .args(["--database", "/nonexistent/tracking.sqlite"])
        .args(["data", "-t", "file", "-i"])
        .arg(&ids)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--file-id-type"));
}

#[test]
fn id_file_lists_every_lane() {
    let fx = fastq_fixture();
    let ids = fx.root().join("ids.txt");
    write_file(&ids, "# lanes\n12345_1#2\n\n12345_1#1\n");

    let out = lanefind(&fx)
        .args(["data", "-t", "file", "--file-id-type", "lane", "-i"])
        .arg(&ids)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listing = String::from_utf8(out).unwrap();
    assert_eq!(listing.lines().count(), 4);
    assert!(listing.lines().next().unwrap().ends_with("12345_1#2_1.fastq.gz"));
}

#[test]
fn symlinks_are_renamed_and_collisions_need_force() {
    let fx = fastq_fixture();
    let dest = fx.root().join("linked");

    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "12345_1#1", "-r", "-l"])
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 symlink(s)"));

    let link = dest.join("12345_1_1_1.fastq.gz");
    assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    assert_eq!(
        fs::read_link(&link).unwrap(),
        fx.symlink_dir("12345_1#1").join("12345_1#1_1.fastq.gz")
    );

    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "12345_1#1", "-r", "-l"])
        .arg(&dest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "12345_1#1", "-r", "-F", "-l"])
        .arg(&dest)
        .assert()
        .success();
}

#[test]
fn tar_gz_archive_holds_files_and_checksums() {
    let fx = fastq_fixture();
    let archive = fx.root().join("batch.tar.gz");

    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "12345_1", "-a"])
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 file(s) archived"));

    let mut tar = tar::Archive::new(GzDecoder::new(File::open(&archive).unwrap()));
    let mut names = BTreeSet::new();
    let mut manifest = String::new();
    for entry in tar.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().to_string();
        if name.ends_with("md5sums.txt") {
            entry.read_to_string(&mut manifest).unwrap();
        }
        names.insert(name);
    }
    assert!(names.contains("batch/12345_1#1_1.fastq.gz"));
    assert!(names.contains("batch/12345_1#2_2.fastq.gz"));
    assert!(names.contains("batch/md5sums.txt"));
    assert_eq!(names.len(), 5);

    let data = fs::read(fx.storage_dir("12345_1#1").join("12345_1#1_1.fastq.gz")).unwrap();
    let sum = format!("{:x}", md5::compute(data));
    assert!(manifest.contains(&format!("12345_1#1_1.fastq.gz\t{sum}")));
}

#[test]
fn zip_archive_is_chosen_by_flag() {
    let fx = fastq_fixture();
    let archive = fx.root().join("batch.zip");

    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "12345_1#2", "-z", "-a"])
        .arg(&archive)
        .assert()
        .success();

    let zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
    let names: BTreeSet<String> = zip.file_names().map(|n| n.to_string()).collect();
    assert_eq!(
        names,
        [
            "batch/12345_1#2_1.fastq.gz",
            "batch/12345_1#2_2.fastq.gz",
            "batch/md5sums.txt"
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    );
}

#[test]
fn status_prints_a_tab_separated_table() {
    let fx = fastq_fixture();
    write_marker(
        fx.symlink_dir("12345_1#2").join("_qc_job_status"),
        "/conf/qc.conf",
        "failed",
        1_455_105_600,
    );

    let out = lanefind(&fx)
        .args(["status", "-t", "study", "-i", "607"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "Name");
    assert_eq!(rows[0][2], "QC");
    assert_eq!(rows[1][..3], ["12345_1#1", "Done", "-"]);
    assert_eq!(rows[2][0], "12345_1#2");
    assert!(rows[2][2].starts_with("Failed ("));
}

#[test]
fn mapping_details_show_reference_mapper_and_date() {
    let fx = Fixture::new();
    fx.add_lane(1, "12345_1#1", 1 | 4, true);
    fx.add_run(10, 1, "bwa", "Ref_A", "2015-01-02 03:04:05", false);
    write_file(fx.storage_dir("12345_1#1").join("10.pe.markdup.bam"), "bam");

    lanefind(&fx)
        .args(["map", "-t", "lane", "-i", "12345_1#1", "-d", "-M", "bwa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.pe.markdup.bam\tRef_A\tbwa\t02-01-2015"));

    lanefind(&fx)
        .args(["map", "-t", "lane", "-i", "12345_1#1", "-M", "smalt"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No files found."));
}

#[test]
fn pseudogenome_without_index_or_exclusion_is_refused() {
    let fx = Fixture::new();
    lanefind(&fx)
        .env_remove("LANEFIND_REFERENCES")
        .args(["snp", "-t", "lane", "-i", "12345_1", "-p"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--reference-index"));
}

#[test]
fn same_basename_in_two_folders_is_refused_for_links() {
    let fx = Fixture::new();
    fx.add_lane(1, "12345_1#1", 1, true);
    for dir in ["a", "b"] {
        write_file(
            fx.storage_dir("12345_1#1").join(dir).join("reads.fastq.gz"),
            dir,
        );
    }
    let dest = fx.root().join("linked");

    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "12345_1#1", "--search-depth", "2", "-l"])
        .arg(&dest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("12345_1#1_reads.fastq.gz"));
    assert!(!dest.join("12345_1#1_reads.fastq.gz").exists());

    lanefind(&fx)
        .args(["data", "-t", "lane", "-i", "12345_1#1", "--search-depth", "2", "-z", "-a"])
        .arg(fx.root().join("batch.zip"))
        .assert()
        .failure();
    assert!(!fx.root().join("batch.zip").exists());
}
