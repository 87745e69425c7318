use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rstest::rstest;

use busgate::{
    CatalogHandle, CatalogOptions, Crc16Arc, FrameCodec, FrameError, FrameHeader, Gateway,
    GatewayConfig, JsonCatalogSource, LineFrameSource, MemorySink, MessageCatalog, SignalMap,
    StatsSnapshot,
};

const CATALOG: &str = include_str!("fixtures/catalog.json");

fn catalog() -> MessageCatalog {
    let source = JsonCatalogSource::from_json("fixture", CATALOG);
    MessageCatalog::load(&source, CatalogOptions::default()).expect("fixture catalog is valid")
}

fn voltage_frame(device: u8, raw_voltage: u16) -> [u8; 12] {
    let header = FrameHeader::new(device, 100).expect("header fields in range");
    let [low, high] = raw_voltage.to_le_bytes();
    FrameCodec::encode(header, [low, high, 0, 0, 0, 0, 0, 0])
}

fn config(workers: usize) -> GatewayConfig {
    GatewayConfig::builder()
        .workers(workers)
        .queue_capacity(256)
        .output_capacity(256)
        .shutdown_grace(Duration::from_secs(2))
        .build()
}

#[test]
fn crc_matches_published_check_value() {
    assert_eq!(0xBB3D, Crc16Arc::checksum(b"123456789"));
}

#[rstest]
#[case::reference("830CA00F020000000000567D", 3, 100)]
#[case::example("013EA5B6C000000000004528", 1, 496)]
#[case::spaced("83 0C A0 0F 02 00 00 00 00 00 56 7D", 3, 100)]
fn decode_hex_reads_header_fields(#[case] text: &str, #[case] device: u8, #[case] id: u16) {
    let frame = FrameCodec::decode_hex(text).expect("reference frame is valid");
    assert_eq!(device, frame.header().device_address());
    assert_eq!(id, frame.header().message_id());
}

#[test]
fn flipped_payload_bit_fails_checksum() {
    let mut frame = voltage_frame(3, 4000);
    frame[4] ^= 0x01;
    assert_matches!(FrameCodec::decode(&frame), Err(FrameError::CrcMismatch { .. }));
}

#[rstest]
#[case::device(32, 100, "device_address")]
#[case::message(0, 1024, "message_id")]
fn header_rejects_fields_outside_their_bits(
    #[case] device: u8,
    #[case] id: u16,
    #[case] expected_field: &str,
) {
    assert_matches!(
        FrameHeader::new(device, id),
        Err(FrameError::HeaderFieldOutOfRange { field, .. }) if field == expected_field
    );
}

#[tokio::test]
async fn gateway_publishes_every_valid_frame_once() {
    let sink = MemorySink::new();
    let gateway = Gateway::start(&config(4), CatalogHandle::new(catalog()), sink.clone());
    let intake = gateway.intake();

    for raw in 0..100_u16 {
        assert!(intake.submit(format!("can{}", raw % 2), voltage_frame(2, raw * 10).to_vec()));
    }
    let stats = gateway.shutdown().await;

    assert_eq!(
        StatsSnapshot {
            total: 100,
            valid: 100,
            errors: 0,
            published: 100,
            dropped: 0,
        },
        stats
    );
    let mut voltages: Vec<u64> = sink
        .messages()
        .iter()
        .filter_map(|message| message.signal("dc_voltage"))
        .map(|voltage| voltage.round() as u64)
        .collect();
    voltages.sort_unstable();
    assert_eq!((0..100).collect::<Vec<u64>>(), voltages);
}

#[tokio::test]
async fn gateway_counts_rejected_frames_without_publishing_them() {
    let sink = MemorySink::new();
    let gateway = Gateway::start(&config(2), CatalogHandle::new(catalog()), sink.clone());
    let intake = gateway.intake();

    let mut corrupt = voltage_frame(1, 10);
    corrupt[11] ^= 0xFF;
    intake.submit("can0", corrupt.to_vec());
    intake.submit("can0", vec![0x83, 0x0C]);
    intake.submit("can0", voltage_frame(1, 10).to_vec());
    let stats = gateway.shutdown().await;

    assert_eq!(3, stats.total);
    assert_eq!(1, stats.valid);
    assert_eq!(2, stats.errors);
    assert_eq!(1, sink.len());
}

#[tokio::test]
async fn replaced_catalog_applies_to_later_frames() {
    let handle = CatalogHandle::new(catalog());
    let sink = MemorySink::new();
    let gateway = Gateway::start(&config(1), handle.clone(), sink.clone());
    let intake = gateway.intake();

    let source = JsonCatalogSource::from_json(
        "renamed",
        r#"{ "messages": [ { "id": 100, "name": "BusVoltage", "signals": [
            { "name": "raw", "start_bit": 0, "length": 16 } ] } ] }"#,
    );
    let previous = handle.replace(
        MessageCatalog::load(&source, CatalogOptions::default()).expect("replacement is valid"),
    );
    intake.submit("can0", voltage_frame(1, 1234).to_vec());
    gateway.shutdown().await;

    assert_eq!("fixture", previous.source_name());
    let messages = sink.messages();
    assert_eq!(Some("BusVoltage"), messages[0].message_name());
    assert_eq!(Some(1234.0), messages[0].signal("raw"));
}

#[tokio::test]
async fn feed_reads_labelled_lines_until_eof() {
    let sink = MemorySink::new();
    let gateway = Gateway::start(&config(2), CatalogHandle::new(catalog()), sink.clone());
    let intake = gateway.intake();
    let input = "\
        # two frames and one typo\n\
        left 830CA00F020000000000567D\n\
        right 013EA5B6C000000000004528\n\
        right 830CZZ\n";
    let mut source = LineFrameSource::new(input.as_bytes());

    let accepted = intake.feed(&mut source).await.expect("in-memory input never fails");
    let stats = gateway.shutdown().await;

    assert_eq!(2, accepted);
    assert_eq!(3, stats.total);
    assert_eq!(2, stats.published);
    let mut sources: Vec<String> = sink
        .messages()
        .iter()
        .map(|message| message.source().to_string())
        .collect();
    sources.sort();
    assert_eq!(vec!["left".to_string(), "right".to_string()], sources);
}

#[test]
fn dispatcher_encode_round_trips_through_decode() {
    let dispatcher = busgate::Dispatcher::new(CatalogHandle::new(catalog()));
    let values = SignalMap::from([
        ("Enable".to_string(), 1.0),
        ("AverageRadius".to_string(), 1.8),
        ("Temperature".to_string(), 244.14),
    ]);

    let frame = dispatcher
        .encode(1, &"ExampleMessage".parse().expect("names always parse"), &values)
        .expect("reference values encode");

    assert_eq!("013EA5B6C000000000004528", hex::encode_upper(frame));
    let message = dispatcher.process("bench", &frame).expect("encoded frame is valid");
    assert!(message.is_parsed());
    assert!(message.range_violations().is_empty());
}
