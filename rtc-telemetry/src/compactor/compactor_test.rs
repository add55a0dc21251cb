use super::*;
use serde_json::{Map, json};

fn sample(channel_id: ChannelId, timestamp: u64, subchannels: Value) -> Sample {
    let raw_fields: Map<String, Value> = subchannels
        .as_object()
        .cloned()
        .expect("subchannels must be an object");
    Sample {
        channel_id,
        client: ClientType::Webkit,
        timestamp,
        active_subchannels: raw_fields.keys().cloned().collect(),
        raw_fields,
    }
}

fn merge_all(samples: &[Sample]) -> CompactedBuffer {
    let mut compactor = TimeSeriesCompactor::new();
    for s in samples {
        compactor.merge(s, PeerMetadata::default);
    }
    compactor
        .get(samples[0].channel_id)
        .cloned()
        .expect("buffer must exist")
}

#[test]
fn test_first_sample_initializes_buffer() {
    let buffer = merge_all(&[sample(3, 1000, json!({"A": {"x": 1}}))]);

    assert_eq!(buffer.channel_id, 3);
    assert_eq!(buffer.client, ClientType::Webkit);
    assert_eq!(buffer.extra, PeerMetadata::default());
    assert_eq!(
        buffer.time,
        vec![TimeEntry {
            timestamp: 1000,
            channels: vec!["A".to_owned()],
        }]
    );
    assert_eq!(buffer.field("A", "x"), Some(&FieldValue::Scalar(json!(1))));
}

#[test]
fn test_gapped_subchannel_series() {
    // "A" is active in polls 1 and 3 only.
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"x": 10, "y": 5}})),
        sample(1, 2000, json!({})),
        sample(1, 3000, json!({"A": {"x": 10, "y": 7}})),
    ]);

    assert_eq!(buffer.time.len(), 3);
    assert!(buffer.time[1].channels.is_empty());
    assert_eq!(buffer.field("A", "x"), Some(&FieldValue::Scalar(json!(10))));
    assert_eq!(
        buffer.field("A", "y"),
        Some(&FieldValue::Series(vec![json!(5), json!(7)]))
    );
}

#[test]
fn test_late_subchannel_constant_field() {
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"x": 1}})),
        sample(1, 2000, json!({"A": {"x": 1}, "B": {"z": 1}})),
        sample(1, 3000, json!({"A": {"x": 1}, "B": {"z": 1}})),
        sample(1, 4000, json!({"A": {"x": 1}, "B": {"z": 1}})),
    ]);

    assert_eq!(buffer.first_index("B"), Some(1));
    assert_eq!(buffer.field("B", "z"), Some(&FieldValue::Scalar(json!(1))));
    assert_eq!(buffer.field("A", "x"), Some(&FieldValue::Scalar(json!(1))));
}

#[test]
fn test_promotion_back_fill_count() {
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"v": 4}})),
        sample(1, 2000, json!({"A": {"v": 4}})),
        sample(1, 3000, json!({"A": {"v": 9}})),
    ]);

    assert_eq!(
        buffer.field("A", "v"),
        Some(&FieldValue::Series(vec![json!(4), json!(4), json!(9)]))
    );
}

#[test]
fn test_back_fill_for_late_subchannel() {
    // "B" joins on the 2nd poll; promotion on its 3rd active poll back-fills 2.
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"x": 1}})),
        sample(1, 2000, json!({"A": {"x": 1}, "B": {"bytes": 10}})),
        sample(1, 3000, json!({"A": {"x": 1}, "B": {"bytes": 10}})),
        sample(1, 4000, json!({"A": {"x": 1}, "B": {"bytes": 30}})),
        sample(1, 5000, json!({"A": {"x": 1}, "B": {"bytes": 45}})),
    ]);

    assert_eq!(
        buffer.field("B", "bytes"),
        Some(&FieldValue::Series(vec![
            json!(10),
            json!(10),
            json!(30),
            json!(45)
        ]))
    );
    assert_eq!(buffer.active_count("B"), 4);
}

#[test]
fn test_series_never_reverts_to_scalar() {
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"v": 1}})),
        sample(1, 2000, json!({"A": {"v": 2}})),
        sample(1, 3000, json!({"A": {"v": 2}})),
        sample(1, 4000, json!({"A": {"v": 2}})),
    ]);

    assert_eq!(
        buffer.field("A", "v"),
        Some(&FieldValue::Series(vec![
            json!(1),
            json!(2),
            json!(2),
            json!(2)
        ]))
    );
}

#[test]
fn test_alignment_invariant() {
    // Subchannels come and go; every series must match the active count.
    let polls = vec![
        json!({"A": {"a": 1, "c": "k"}}),
        json!({"A": {"a": 2, "c": "k"}, "B": {"b": 1}}),
        json!({"B": {"b": 1}}),
        json!({"A": {"a": 2, "c": "k"}, "B": {"b": 5}}),
        json!({}),
        json!({"A": {"a": 9, "c": "k"}, "B": {"b": 5}}),
        json!({"B": {"b": 6}}),
    ];
    let samples: Vec<Sample> = polls
        .into_iter()
        .enumerate()
        .map(|(i, p)| sample(1, 1000 * (i as u64 + 1), p))
        .collect();
    let buffer = merge_all(&samples);

    assert_eq!(buffer.time.len(), 7);
    for (name, fields) in &buffer.stat {
        for (field, value) in fields {
            if let FieldValue::Series(values) = value {
                assert_eq!(
                    values.len(),
                    buffer.active_count(name),
                    "{name}.{field} is not aligned"
                );
            }
        }
    }
    assert_eq!(
        buffer.field("A", "a"),
        Some(&FieldValue::Series(vec![
            json!(1),
            json!(2),
            json!(2),
            json!(9)
        ]))
    );
    assert_eq!(
        buffer.field("B", "b"),
        Some(&FieldValue::Series(vec![
            json!(1),
            json!(1),
            json!(5),
            json!(5),
            json!(6)
        ]))
    );
    assert_eq!(buffer.field("A", "c"), Some(&FieldValue::Scalar(json!("k"))));
}

#[test]
fn test_time_is_monotonic() {
    let mut compactor = TimeSeriesCompactor::new();
    let mut previous: Vec<TimeEntry> = vec![];
    for i in 0..5u64 {
        let s = sample(1, 1000 + i, json!({"A": {"v": i}}));
        let buffer = compactor.merge(&s, PeerMetadata::default);
        assert_eq!(buffer.time.len(), previous.len() + 1);
        assert_eq!(&buffer.time[..previous.len()], &previous[..]);
        previous = buffer.time.clone();
    }
}

#[test]
fn test_missing_field_leaves_value_untouched() {
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"x": 1, "y": 1}})),
        sample(1, 2000, json!({"A": {"y": 2}})),
    ]);

    assert_eq!(buffer.field("A", "x"), Some(&FieldValue::Scalar(json!(1))));
    assert_eq!(
        buffer.field("A", "y"),
        Some(&FieldValue::Series(vec![json!(1), json!(2)]))
    );
}

#[test]
fn test_series_repeats_last_value_when_field_missing() {
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"x": 1, "y": 1}})),
        sample(1, 2000, json!({"A": {"x": 1, "y": 2}})),
        sample(1, 3000, json!({"A": {}})),
        sample(1, 4000, json!({"A": {"x": 1, "y": 5}})),
    ]);

    assert_eq!(buffer.active_count("A"), 4);
    assert_eq!(
        buffer.field("A", "y"),
        Some(&FieldValue::Series(vec![
            json!(1),
            json!(2),
            json!(2),
            json!(5)
        ]))
    );
    assert_eq!(buffer.field("A", "x"), Some(&FieldValue::Scalar(json!(1))));
}

#[test]
fn test_series_missing_field_stays_aligned_with_gaps() {
    // "A" skips poll 3 entirely and reports no "v" in poll 4.
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"v": 1}})),
        sample(1, 2000, json!({"A": {"v": 2}})),
        sample(1, 3000, json!({"B": {"w": 0}})),
        sample(1, 4000, json!({"A": {"other": true}})),
        sample(1, 5000, json!({"A": {"v": 3}})),
    ]);

    let series = buffer.field("A", "v").and_then(FieldValue::as_series);
    assert_eq!(series.map(<[Value]>::len), Some(buffer.active_count("A")));
    assert_eq!(
        series,
        Some(&[json!(1), json!(2), json!(2), json!(3)][..])
    );
}

#[test]
fn test_new_field_in_existing_subchannel_is_scalar() {
    let buffer = merge_all(&[
        sample(1, 1000, json!({"A": {"x": 1}})),
        sample(1, 2000, json!({"A": {"x": 1, "late": "yes"}})),
    ]);

    assert_eq!(
        buffer.field("A", "late"),
        Some(&FieldValue::Scalar(json!("yes")))
    );
}

#[test]
fn test_client_fixed_at_first_sample() {
    let mut compactor = TimeSeriesCompactor::new();
    compactor.merge(&sample(1, 1000, json!({"A": {"x": 1}})), PeerMetadata::default);

    let mut second = sample(1, 2000, json!({"A": {"x": 1}}));
    second.client = ClientType::Firefox;
    let buffer = compactor.merge(&second, PeerMetadata::default);

    assert_eq!(buffer.client, ClientType::Webkit);
}

#[test]
fn test_buffers_are_per_channel() {
    let mut compactor = TimeSeriesCompactor::new();
    compactor.merge(&sample(1, 1000, json!({"A": {"x": 1}})), PeerMetadata::default);
    compactor.merge(&sample(2, 1000, json!({"A": {"x": 5}})), PeerMetadata::default);
    compactor.merge(&sample(1, 2000, json!({"A": {"x": 2}})), PeerMetadata::default);

    assert_eq!(compactor.len(), 2);
    let two = compactor.get(2).expect("channel 2");
    assert_eq!(two.time.len(), 1);
    assert_eq!(two.field("A", "x"), Some(&FieldValue::Scalar(json!(5))));
    let one = compactor.get(1).expect("channel 1");
    assert_eq!(
        one.field("A", "x"),
        Some(&FieldValue::Series(vec![json!(1), json!(2)]))
    );
}

#[test]
fn test_wire_shape() {
    let buffer = merge_all(&[
        sample(7, 1000, json!({"ssrc_1_send": {"codec": "opus", "bytes": "1"}})),
        sample(7, 2000, json!({"ssrc_1_send": {"codec": "opus", "bytes": "2"}})),
    ]);

    let json = serde_json::to_value(&buffer).expect("should serialize");
    assert_eq!(
        json,
        json!({
            "channelId": 7,
            "time": [
                {"timestamp": 1000, "channels": ["ssrc_1_send"]},
                {"timestamp": 2000, "channels": ["ssrc_1_send"]}
            ],
            "stat": {
                "ssrc_1_send": {"codec": "opus", "bytes": ["1", "2"]}
            },
            "extra": {},
            "client": "webkit"
        })
    );

    let decoded: CompactedBuffer = serde_json::from_value(json).expect("should deserialize");
    assert_eq!(decoded, buffer);
}
