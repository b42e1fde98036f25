//! # Batch Scenarios
//!
//! End-to-end jobs over the scripted transport: layout, rasterization,
//! protocol sequencing and the per-row failure policy together.

use pretty_assertions::assert_eq;

use ptlabel::batch::{Batch, Outcome, PrintResult};
use ptlabel::layout::{DataRow, FieldKind, FieldSpec, LabelSpec};
use ptlabel::printer::TapeWidth;
use ptlabel::protocol::commands;
use ptlabel::protocol::status::{ErrorFlags, MediaType, StatusType, encode_frame};
use ptlabel::protocol::{JobOptions, PrinterStatus};
use ptlabel::transport::bluetooth::{likely_match, parse_device_list};
use ptlabel::transport::mock::SIMULATED_FAILURE;
use ptlabel::transport::MockTransport;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn rows(column: &str, values: &[&str]) -> Vec<DataRow> {
    values
        .iter()
        .map(|v| [(column.to_string(), v.to_string())].into())
        .collect()
}

fn is_print(frame: &[u8]) -> bool {
    matches!(frame, [0x0C] | [0x1A])
}

fn is_raster_line(frame: &[u8]) -> bool {
    matches!(frame.first(), Some(b'G') | Some(b'Z'))
}

fn outcomes(result: &PrintResult) -> Vec<Outcome> {
    result.rows.iter().map(|r| r.outcome).collect()
}

/// Printer that answers every status request with a 12mm laminated tape.
fn healthy_printer() -> MockTransport {
    let frame = encode_frame(
        StatusType::Reply,
        12,
        MediaType::LaminatedTape,
        ErrorFlags::default(),
    );
    MockTransport::new().respond_to(&commands::status_request(), frame.to_vec())
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_bad_barcode_row_is_skipped() {
    let spec = LabelSpec::new(
        TapeWidth::Mm12,
        vec![
            FieldSpec::text("Item {{sku}}"),
            FieldSpec::new(FieldKind::Ean13, "{{sku}}"),
        ],
    );
    let data = rows(
        "sku",
        &["590123412345", "400638133393", "NOT-A-CODE", "590123412345", "400638133393"],
    );
    let mock = healthy_printer();
    let probe = mock.probe();

    let result = Batch::new(&spec, &data).run(mock, |_| {});

    assert_eq!(result.totals.total, 5);
    assert_eq!(result.totals.printed, 4);
    assert_eq!(result.totals.failed, 1);
    assert_eq!(result.rows[2].outcome, Outcome::Error);
    assert!(result.rows[2].message.as_deref().unwrap().contains("ean13"));
    assert_eq!(probe.count_frames(is_print), 4);
    assert_eq!(probe.close_calls(), 1);
    assert!(matches!(result.status, PrinterStatus::Available(_)));
}

#[test]
fn test_write_failure_fails_remaining_rows() {
    let spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("{{name}}")]);
    let data = rows("name", &["one", "two", "three", "four", "five"]);
    let mock = healthy_printer().fail_when(|frames, next| {
        is_raster_line(next) && frames.iter().filter(|f| is_print(f)).count() == 2
    });
    let probe = mock.probe();

    let mut progress = Vec::new();
    let result = Batch::new(&spec, &data).run(mock, |r| progress.push(r.index));

    assert_eq!(
        outcomes(&result),
        vec![
            Outcome::Success,
            Outcome::Success,
            Outcome::Error,
            Outcome::Error,
            Outcome::Error
        ]
    );
    let messages: Vec<&str> = result.rows[2..]
        .iter()
        .map(|r| r.message.as_deref().unwrap())
        .collect();
    assert!(messages[0].contains(SIMULATED_FAILURE));
    assert!(messages.iter().all(|m| *m == messages[0]));

    assert_eq!(progress, vec![0, 1, 2, 3, 4]);
    assert_eq!(probe.count_frames(is_print), 2);
    assert_eq!(probe.close_calls(), 1);
}

#[test]
fn test_continuous_job_cuts_once() {
    let spec = LabelSpec::new(TapeWidth::Mm24, vec![FieldSpec::new(FieldKind::Qr, "{{url}}")]);
    let data = rows("url", &["https://a.example", "https://b.example", "https://c.example"]);
    let options = JobOptions {
        continuous: true,
        ..JobOptions::default()
    };
    let mock = healthy_printer();
    let probe = mock.probe();

    let result = Batch::new(&spec, &data).options(options).run(mock, |_| {});

    assert_eq!(result.totals.printed, 3);
    let prints: Vec<Vec<u8>> = probe.frames().into_iter().filter(|f| is_print(f)).collect();
    assert_eq!(prints, vec![vec![0x0C], vec![0x0C], vec![0x1A]]);
}

#[test]
fn test_job_starts_with_reset_and_status() {
    let spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("A")]);
    let data = rows("x", &["1"]);
    let mock = healthy_printer();
    let probe = mock.probe();

    Batch::new(&spec, &data).run(mock, |_| {});

    let frames = probe.frames();
    assert_eq!(frames[0], commands::invalidate());
    assert_eq!(frames[1], commands::initialize());
    assert_eq!(frames[2], commands::status_request());
    assert_eq!(frames.last(), Some(&commands::status_request()));
}

#[test]
fn test_discovery_listing_is_stable() {
    let output = "\
Device EC:79:49:12:34:56 PT-P710BT9876
Device 00:1a:7d:da:71:13 Headphones
Device EC:79:49:12:34:56 PT-P710BT9876
[NEW] Device AA:BB:CC:DD:EE:FF
";
    let first = parse_device_list(output);
    let second = parse_device_list(output);
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);

    let hit = likely_match(&first).unwrap();
    assert!(serde_json::to_string(&first[hit]).unwrap().contains("PT-P710BT9876"));
}
