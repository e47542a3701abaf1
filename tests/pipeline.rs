//! Library-level tests of the reader -> detector -> joiner -> writer pipeline.

use dmap_tools::commands::{DmrCommand, RegionJoiner};
use dmap_tools::config::{DmrConfig, JoinPolicy};
use dmap_tools::coverage::{CoverageReader, DmapError};
use dmap_tools::region::Region;
use dmap_tools::streaming::RegionWriter;
use std::io::Write;
use tempfile::NamedTempFile;

fn create_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file.flush().unwrap();
    file
}

fn config() -> DmrConfig {
    DmrConfig::new()
        .with_window_size(100)
        .with_min_sites(1, 1)
        .with_min_coverage(4)
        .with_min_meth_diff(0.1)
        .with_max_pvalue(0.05)
}

#[test]
fn test_run_from_files() {
    let test = create_file(
        "# comment lines and blank lines are skipped\n\
         chr1\t10\t+\tCG\t20\t18\n\
         \n\
         chr1\t60\t+\tCG\t20\t18\n\
         chr1\t120\t+\tCG\t20\t10\n",
    );
    let control = create_file(
        "chr1\t10\t+\tCG\t20\t2\n\
         chr1\t60\t+\tCG\t20\t2\n\
         chr1\t120\t+\tCG\t20\t10\n",
    );

    let mut output = Vec::new();
    let stats = DmrCommand::new(config())
        .run(test.path(), control.path(), &mut output)
        .unwrap();

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "#Chrom\tStart\tEnd\tDiff\tPval");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("chr1\t0\t100\t"));

    assert_eq!(stats.chromosomes, 1);
    assert_eq!(stats.windows_tested, 2);
    assert_eq!(stats.candidates, 1);
    assert_eq!(stats.rejected_diff, 1);
    assert_eq!(stats.regions, 1);
}

#[test]
fn test_one_input_exhausted_early() {
    // Control ends on chr1; the test sample's chr2 windows have nothing to compare.
    let test = "chr1\t10\t+\tCG\t20\t18\nchr2\t10\t+\tCG\t20\t18\nchr2\t500\t+\tCG\t20\t18\n";
    let control = "chr1\t10\t+\tCG\t20\t2\n";

    let mut regions = Vec::<Region>::new();
    let stats = DmrCommand::new(config())
        .scan(
            CoverageReader::new(test.as_bytes()),
            CoverageReader::new(control.as_bytes()),
            &mut regions,
        )
        .unwrap();

    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].chrom, "chr1");
    assert_eq!(stats.windows_tested, 1);
}

#[test]
fn test_missing_control_file() {
    let test = create_file("chr1\t10\t+\tCG\t20\t18\n");
    let err = DmrCommand::new(config())
        .run(test.path(), "/nonexistent/control.cov", Vec::new())
        .unwrap_err();
    assert!(matches!(err, DmapError::MissingInput { .. }));
}

#[test]
fn test_joiner_into_writer() {
    let mut output = Vec::new();
    {
        let mut writer = RegionWriter::new(&mut output);
        writer.write_header().unwrap();
        let policy = JoinPolicy {
            max_distance: 0,
            cross_direction: false,
        };
        let mut joiner = RegionJoiner::new(policy, &mut writer);
        joiner.push(Region::new("chr1", 0, 100, 0.5, 0.01)).unwrap();
        joiner.push(Region::new("chr1", 100, 200, 0.25, 0.02)).unwrap();
        joiner.push(Region::new("chr1", 300, 400, 0.5, 0.01)).unwrap();
        joiner.finish().unwrap();
        assert_eq!(joiner.regions(), 2);
        joiner.into_sink().flush().unwrap();
    }

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "#Chrom\tStart\tEnd\tDiff\tPval\n\
         chr1\t0\t200\t0.375\t0.02\n\
         chr1\t300\t400\t0.5\t0.01\n"
    );
}
