// tests/test_status.rs
mod common;

use chrono::{DateTime, Local, TimeZone};
use common::{write_marker, Fixture};
use lanefind::config::{Config, PipelineKind};
use lanefind::finder::Finder;
use lanefind::lane::{DisplayStatus, LaneStatus};
use lanefind::store::{IdType, LaneFilter};

fn day(secs: u64) -> String {
    let t: DateTime<Local> = Local.timestamp_opt(secs as i64, 0).unwrap();
    t.format("%d/%m/%Y").to_string()
}

const FEB_10_2016: u64 = 1_455_105_600;
const MAR_01_2016: u64 = 1_456_833_600;

#[test]
fn status_row_mixes_processed_bits_and_markers() {
    let fx = Fixture::new();
    // imported and QC'd, mapping attempted twice, nothing else
    fx.add_lane(1, "12345_1#1", 1 | 2, true);
    let links = fx.symlink_dir("12345_1#1");
    write_marker(links.join("_mapping_a_job_status"), "/conf/mapping.conf", "failed", FEB_10_2016);
    write_marker(links.join("_mapping_b_job_status"), "/conf/mapping.conf", "running", MAR_01_2016);

    let store = fx.store();
    let config = Config::new(&fx.db);
    let lanes = Finder::new(&store, &config)
        .lanes(
            &["12345_1#1".to_string()],
            IdType::Lane,
            PipelineKind::Data,
            &LaneFilter::default(),
        )
        .unwrap();
    assert_eq!(lanes.len(), 1);

    let status = LaneStatus::new(&lanes[0]);
    assert_eq!(status.status("import"), DisplayStatus::Done);
    assert_eq!(status.status("qc"), DisplayStatus::Done);
    assert_eq!(
        status.status("mapped").to_string(),
        format!("Running ({})", day(MAR_01_2016))
    );
    assert_eq!(status.status("assembled"), DisplayStatus::Unknown);
    assert_eq!(status.status("sequencing"), DisplayStatus::NA);

    let row = status.row();
    assert_eq!(row.len(), LaneStatus::header().len());
    assert_eq!(row[0], "12345_1#1");
    assert_eq!(row[1], "Done");
    assert_eq!(row[4], "-");
}

#[test]
fn lane_without_markers_is_all_dashes_except_done_bits() {
    let fx = Fixture::new();
    fx.add_lane(1, "12345_1#1", 1, true);

    let store = fx.store();
    let config = Config::new(&fx.db);
    let lanes = Finder::new(&store, &config)
        .lanes(
            &["12345_1".to_string()],
            IdType::Lane,
            PipelineKind::Data,
            &LaneFilter::default(),
        )
        .unwrap();

    let row = LaneStatus::new(&lanes[0]).row();
    assert_eq!(row[1], "Done");
    assert!(row[2..].iter().all(|c| c == "-"));
}

#[test]
fn header_names_every_pipeline_column() {
    assert_eq!(
        LaneStatus::header(),
        vec![
            "Name",
            "Import",
            "QC",
            "Mapping",
            "Archive",
            "Improve",
            "SNP call",
            "RNASeq",
            "Assembly",
            "Annotation"
        ]
    );
}
