use super::*;
use crate::store::memory::MemoryStore;
use brsense_core::{parse_document, OutcomeStatus, WireFormat};
use chrono::NaiveDateTime;

const TELEMETRY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<stuMessages xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" timeStamp="15/12/2016 21:00:00 GMT" messageID="ABC123">
  <stuMessage>
    <esn>0-99990</esn>
    <unixTime>1034268516</unixTime>
    <gps>N</gps>
    <payload length="9" source="pc" encoding="hex">0x020A141E28323C4804</payload>
  </stuMessage>
</stuMessages>"#;

fn envelope(xml: &str) -> Envelope {
    let document = parse_document(xml.as_bytes(), WireFormat::Xml).unwrap();
    Envelope::from_document(document)
}

fn telemetry(messages: &[(&str, &str)]) -> Envelope {
    let body: String = messages
        .iter()
        .map(|(esn, payload)| {
            format!(
                "<stuMessage><esn>{}</esn><unixTime>1700000000</unixTime><payload>{}</payload></stuMessage>",
                esn, payload
            )
        })
        .collect();
    envelope(&format!("<stuMessages messageID=\"m\">{}</stuMessages>", body))
}

fn build_ingestor(store: &Arc<MemoryStore>) -> Ingestor {
    Ingestor::new(store.clone(), SoilProbeDecoder::default())
}

#[tokio::test]
async fn test_ingest_new_device() {
    // prepare
    let store = Arc::new(MemoryStore::new());
    let ingestor = build_ingestor(&store);

    // execute
    let outcome = ingestor.ingest(&envelope(TELEMETRY_XML)).await;

    // validate
    assert_eq!(OutcomeStatus::Ok, outcome.status);
    assert_eq!(1, outcome.messages_seen);
    assert_eq!(1, outcome.messages_processed);
    assert_eq!(6, outcome.readings_saved);
    assert!(outcome.errors.is_empty());

    let state = store.snapshot();
    assert_eq!(1, state.devices.len());
    assert_eq!("0-99990", state.devices[0].esn());
    assert_eq!(Some("Sonda 0-99990"), state.devices[0].name());

    let moisture: Vec<Option<f64>> = state.readings.iter().map(|r| r.moisture_pct).collect();
    let rain: Vec<Option<f64>> = state.readings.iter().map(|r| r.rain_cm).collect();
    assert_eq!(
        vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0), Some(50.0), Some(60.0)],
        moisture
    );
    assert_eq!(
        vec![Some(1.0), Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(0.0)],
        rain
    );
    assert!(state.readings.iter().all(|r| r.temperature_c.is_none()));
    assert!(state.readings.iter().all(|r| r.reading_kind == "H"));

    let expected_ts = NaiveDateTime::parse_from_str("2002-10-10 16:48:36", "%Y-%m-%d %H:%M:%S").unwrap();
    assert!(state.readings.iter().all(|r| r.timestamp == expected_ts));
}

#[tokio::test]
async fn test_ingest_json_float_unix_time() {
    // prepare
    let store = Arc::new(MemoryStore::new());
    let ingestor = build_ingestor(&store);
    let body = br#"{"stuMessages": {"messageID": "J-2", "stuMessage": {"esn": "0-f", "unixTime": 1034268516.0, "payload": "020A141E28323C4804"}}}"#;
    let document = parse_document(body, WireFormat::Json).unwrap();

    // execute
    let outcome = ingestor.ingest(&Envelope::from_document(document)).await;

    // validate
    assert_eq!(6, outcome.readings_saved);
    let expected_ts = NaiveDateTime::parse_from_str("2002-10-10 16:48:36", "%Y-%m-%d %H:%M:%S").unwrap();
    assert!(store
        .snapshot()
        .readings
        .iter()
        .all(|r| r.timestamp == expected_ts));
}

#[tokio::test]
async fn test_reingest_reuses_device() {
    // prepare
    let store = Arc::new(MemoryStore::new());
    let ingestor = build_ingestor(&store);
    ingestor.ingest(&envelope(TELEMETRY_XML)).await;
    let first_seen = store.snapshot().devices[0].updated_at();

    // execute
    let outcome = ingestor.ingest(&envelope(TELEMETRY_XML)).await;

    // validate
    assert!(outcome.is_ok());
    let state = store.snapshot();
    assert_eq!(1, state.devices.len());
    assert_eq!(12, state.readings.len());
    assert!(state.devices[0].updated_at() >= first_seen);
}

#[tokio::test]
async fn test_same_esn_twice_in_one_delivery() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = build_ingestor(&store);

    let outcome = ingestor
        .ingest(&telemetry(&[
            ("0-1", "020A141E28323C4804"),
            ("0-1", "020A141E28323C5404"),
        ]))
        .await;

    assert_eq!(2, outcome.messages_processed);
    assert_eq!(12, outcome.readings_saved);
    assert_eq!(1, store.snapshot().devices.len());
}

#[tokio::test]
async fn test_heartbeat_opens_no_batch() {
    // prepare
    let store = Arc::new(MemoryStore::failing_begin());
    let ingestor = build_ingestor(&store);
    let heartbeat = envelope(
        r#"<stuMessages timeStamp="15/12/2016 21:00:00 GMT" messageID="56bdca48"></stuMessages>"#,
    );

    // execute
    let outcome = ingestor.ingest(&heartbeat).await;

    // validate
    assert_eq!(IngestionOutcome::default(), outcome);
}

#[tokio::test]
async fn test_foreign_frame_counts_as_processed() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = build_ingestor(&store);

    let outcome = ingestor
        .ingest(&telemetry(&[("0-99990", "0xC0560D72DA4AB2445A")]))
        .await;

    assert!(outcome.is_ok());
    assert_eq!(1, outcome.messages_processed);
    assert_eq!(0, outcome.readings_saved);
    // the device is still provisioned and touched
    assert_eq!(1, store.snapshot().devices.len());
    assert!(store.snapshot().readings.is_empty());
}

#[tokio::test]
async fn test_message_without_payload() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = build_ingestor(&store);
    let document = serde_json::json!({
        "stuMessages": {"stuMessage": [{"esn": "0-7"}]}
    });

    let outcome = ingestor.ingest(&Envelope::from_document(document)).await;

    assert_eq!(1, outcome.messages_processed);
    assert_eq!(0, outcome.readings_saved);
    assert_eq!(1, store.snapshot().devices.len());
}

#[tokio::test]
async fn test_failing_message_is_isolated() {
    // prepare
    let store = Arc::new(MemoryStore::failing_readings_for("0-bad"));
    let ingestor = build_ingestor(&store);

    // execute
    let outcome = ingestor
        .ingest(&telemetry(&[
            ("0-good", "020A141E28323C4804"),
            ("0-bad", "020A141E28323C4804"),
            ("0-late", "02191919191919540C"),
        ]))
        .await;

    // validate
    assert_eq!(OutcomeStatus::Ok, outcome.status);
    assert_eq!(3, outcome.messages_seen);
    assert_eq!(2, outcome.messages_processed);
    assert_eq!(12, outcome.readings_saved);
    assert_eq!(1, outcome.errors.len());
    assert_eq!("0-bad", outcome.errors[0].external_id);

    let state = store.snapshot();
    let esns: Vec<&str> = state.devices.iter().map(|d| d.esn()).collect();
    // the failed message is rolled back including its device
    assert_eq!(vec!["0-good", "0-late"], esns);
    assert_eq!(12, state.readings.len());
    assert!(state
        .readings
        .iter()
        .filter(|r| r.reading_kind == "T")
        .all(|r| r.temperature_c == Some(25.0)));
}

#[tokio::test]
async fn test_commit_failure_fails_batch() {
    // prepare
    let store = Arc::new(MemoryStore::failing_commit());
    let ingestor = build_ingestor(&store);

    // execute
    let outcome = ingestor.ingest(&envelope(TELEMETRY_XML)).await;

    // validate
    assert_eq!(OutcomeStatus::Error, outcome.status);
    assert!(outcome.detail.is_some());
    assert_eq!(1, outcome.messages_seen);
    assert_eq!(0, outcome.messages_processed);
    assert_eq!(0, outcome.readings_saved);
    let state = store.snapshot();
    assert!(state.devices.is_empty());
    assert!(state.readings.is_empty());
}

#[tokio::test]
async fn test_begin_failure_fails_batch() {
    let store = Arc::new(MemoryStore::failing_begin());
    let ingestor = build_ingestor(&store);

    let outcome = ingestor.ingest(&envelope(TELEMETRY_XML)).await;

    assert_eq!(OutcomeStatus::Error, outcome.status);
    assert_eq!(1, outcome.messages_seen);
}

#[tokio::test]
async fn test_provisioning_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = build_ingestor(&store);
    let provisioning = envelope(
        r#"<prvmsgs prvMessageID="56bdca48"><prvmsg><esn>9-99998</esn><provID>1234</provID></prvmsg></prvmsgs>"#,
    );

    let outcome = ingestor.ingest(&provisioning).await;

    assert_eq!(IngestionOutcome::default(), outcome);
    assert!(store.snapshot().devices.is_empty());
}

#[test]
fn test_resolve_timestamp() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    assert_eq!(
        Utc.with_ymd_and_hms(2002, 10, 10, 16, 48, 36).unwrap(),
        resolve_timestamp(Some("1034268516"), now)
    );
    assert_eq!(now, resolve_timestamp(None, now));
    assert_eq!(now, resolve_timestamp(Some("yesterday"), now));
    assert_eq!(now, resolve_timestamp(Some("1034268516.5"), now));
    assert_eq!(now, resolve_timestamp(Some(&i64::MAX.to_string()), now));
}
