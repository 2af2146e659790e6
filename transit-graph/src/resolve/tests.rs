//! Unit tests for identity resolution.

use std::collections::BTreeSet;

use super::*;
use crate::domain::StationIdx;

fn resolver() -> IdentityResolver {
    IdentityResolver::new(&PipelineConfig::default())
}

fn rec(name: &str, lat: f64, lon: f64) -> RawStationRecord {
    RawStationRecord::new(name, lat, lon).with_modes([Mode::Tube])
}

/// Every station's full name set, independent of which name represents it.
fn membership(set: &StationSet) -> BTreeSet<BTreeSet<String>> {
    set.stations()
        .iter()
        .map(|s| s.names().map(str::to_string).collect())
        .collect()
}

#[test]
fn scenario_baker_street_variants_merge() {
    let records = vec![
        rec("Baker Street Underground Station", 51.5226, -0.1571),
        rec("Baker Street", 51.5226, -0.1571),
    ];

    let resolution = resolver().resolve(records).unwrap();
    let stations = resolution.stations;

    assert_eq!(stations.len(), 1);
    let station = stations.get(StationIdx(0)).unwrap();
    assert_eq!(station.name, "Baker Street Underground Station");
    assert_eq!(station.aliases, vec!["Baker Street"]);
    assert_eq!(stations.lookup("Baker Street"), Some(StationIdx(0)));
    assert_eq!(
        stations.lookup("Baker Street Underground Station"),
        Some(StationIdx(0))
    );
    assert_eq!(resolution.report.merged, 1);
    assert!(resolution.report.issues.is_empty());
}

#[test]
fn same_key_within_rounding_tolerance_merges() {
    let records = vec![
        rec("Bank Underground Station", 51.51331, -0.08901),
        rec("Bank", 51.51329, -0.08904),
    ];
    let resolution = resolver().resolve(records).unwrap();
    assert_eq!(resolution.stations.len(), 1);
}

#[test]
fn same_key_far_apart_is_ambiguous() {
    let records = vec![rec("Baker Street", 51.5226, -0.1571), rec("Baker Street", 51.6, -0.2)];

    let err = resolver().resolve(records).unwrap_err();
    match err {
        PipelineError::AmbiguousNormalization { key, first, second } => {
            assert_eq!(key.as_str(), "baker street");
            assert_eq!(first, "Baker Street");
            assert_eq!(second, "Baker Street");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn hub_id_groups_regardless_of_name() {
    let records = vec![
        rec("Bank Underground Station", 51.5133, -0.0890)
            .with_hub("HUBBAN")
            .with_lines(["central", "northern", "waterloo-city"]),
        RawStationRecord::new("Bank DLR Station", 51.5134, -0.0886)
            .with_modes([Mode::Dlr])
            .with_hub("HUBBAN")
            .with_lines(["dlr"]),
        rec("Monument Underground Station", 51.5108, -0.0863)
            .with_hub("HUBBAN")
            .with_lines(["circle", "district"]),
    ];

    let stations = resolver().resolve(records).unwrap().stations;
    assert_eq!(stations.len(), 1);

    let bank = stations.get(StationIdx(0)).unwrap();
    assert_eq!(bank.id, "HUBBAN");
    assert_eq!(bank.hub_id.as_deref(), Some("HUBBAN"));
    assert_eq!(bank.name, "Bank Underground Station");
    assert_eq!(
        bank.aliases,
        vec!["Bank DLR Station", "Monument Underground Station"]
    );
    assert_eq!(
        bank.modes,
        [Mode::Tube, Mode::Dlr].into_iter().collect::<BTreeSet<_>>()
    );
    assert_eq!(bank.lines.len(), 6);
}

#[test]
fn hub_and_parent_ids_link_groups() {
    let parent_only = rec("Paddington Underground Station", 51.5154, -0.1755)
        .with_parent("940GZZLUPAC")
        .with_lines(["bakerloo"]);
    let both = RawStationRecord::new("London Paddington", 51.5160, -0.1770)
        .with_modes([Mode::NationalRail, Mode::ElizabethLine])
        .with_hub("HUBPAD")
        .with_parent("940GZZLUPAC")
        .with_lines(["elizabeth"]);

    for records in [
        vec![parent_only.clone(), both.clone()],
        vec![both.clone(), parent_only.clone()],
    ] {
        let stations = resolver().resolve(records).unwrap().stations;
        assert_eq!(stations.len(), 1);
        let station = stations.get(StationIdx(0)).unwrap();
        assert_eq!(station.id, "HUBPAD");
        assert!(station.serves_line("bakerloo"));
        assert!(station.serves_line("elizabeth"));
    }
}

#[test]
fn fallback_record_joins_authoritative_group() {
    let records = vec![
        rec("Oxford Circus Underground Station", 51.5152, -0.1419).with_parent("940GZZLUOXC"),
        rec("Oxford Circus", 51.5152, -0.1419),
    ];

    let stations = resolver().resolve(records).unwrap().stations;
    assert_eq!(stations.len(), 1);
    assert_eq!(stations.lookup("Oxford Circus"), Some(StationIdx(0)));
}

#[test]
fn child_reattaches_by_parent_id() {
    let records = vec![
        rec("Paddington (H&C Line)-Underground", 51.5185, -0.1794)
            .with_parent("940GZZLUPAH")
            .as_child(),
        rec("Paddington Underground Station", 51.5154, -0.1755)
            .with_id("940GZZLUPAH")
            .with_parent("940GZZLUPAC")
            .with_lines(["bakerloo", "circle"]),
    ];

    let resolution = resolver().resolve(records).unwrap();
    let stations = resolution.stations;
    assert_eq!(stations.len(), 1);

    // The child came first but never represents the group
    let station = stations.get(StationIdx(0)).unwrap();
    assert_eq!(station.name, "Paddington Underground Station");
    assert_eq!(station.aliases, vec!["Paddington (H&C Line)-Underground"]);
    assert_eq!(station.id, "940GZZLUPAC");
}

#[test]
fn own_id_joins_records_naming_it_as_parent() {
    let station = rec("Bank Underground Station", 51.5133, -0.0890).with_id("940GZZLUBNK");
    let platforms = rec("Bank (Waterloo & City)", 51.5131, -0.0887)
        .with_parent("940GZZLUBNK")
        .with_lines(["waterloo-city"]);
    let entrance = RawStationRecord::new("Bank Entrance", 51.5135, -0.0893)
        .with_parent("940GZZLUBNK")
        .as_child();

    for records in [
        vec![station.clone(), platforms.clone(), entrance.clone()],
        vec![entrance.clone(), platforms.clone(), station.clone()],
    ] {
        let resolution = resolver().resolve(records).unwrap();
        let stations = resolution.stations;
        assert_eq!(stations.len(), 1);
        assert!(resolution.report.issues.is_empty());
        assert_eq!(stations.get(StationIdx(0)).unwrap().id, "940GZZLUBNK");
        for name in ["Bank Underground Station", "Bank (Waterloo & City)", "Bank Entrance"] {
            assert_eq!(stations.lookup(name), Some(StationIdx(0)), "{name}");
        }
    }
}

fn edgware_road() -> Vec<RawStationRecord> {
    vec![
        rec("Edgware Road (Circle Line) Underground Station", 51.52, -0.17).with_lines(["circle"]),
        rec("Edgware Road (Bakerloo) Underground Station", 51.52, -0.17).with_lines(["bakerloo"]),
    ]
}

#[test]
fn child_at_shared_position_is_unresolvable() {
    let entrance = RawStationRecord::new("Edgware Road Entrance", 51.52, -0.17).as_child();

    let mut forward = edgware_road();
    forward.push(entrance.clone());
    let mut backward = edgware_road();
    backward.reverse();
    backward.push(entrance);

    for records in [forward, backward] {
        let resolution = resolver().resolve(records).unwrap();
        assert_eq!(resolution.stations.len(), 2);
        assert_eq!(resolution.stations.lookup("Edgware Road Entrance"), None);
        assert_eq!(
            resolution.report.issues,
            vec![Issue::UnresolvableIdentity {
                name: "Edgware Road Entrance".to_string(),
                reason: "child entry position is shared by several stations",
            }]
        );
    }
}

#[test]
fn child_at_shared_position_follows_its_name() {
    let entrance =
        RawStationRecord::new("Edgware Road (Bakerloo) Station Entrance", 51.52, -0.17).as_child();

    let mut forward = edgware_road();
    forward.push(entrance.clone());
    let mut backward = edgware_road();
    backward.reverse();
    backward.insert(0, entrance);

    for records in [forward, backward] {
        let stations = resolver().resolve(records).unwrap().stations;
        assert_eq!(
            stations.lookup("Edgware Road (Bakerloo) Station Entrance"),
            stations.lookup("Edgware Road (Bakerloo) Underground Station")
        );
    }
}

#[test]
fn child_reattaches_by_coordinate() {
    let records = vec![
        rec("Green Park Underground Station", 51.5067, -0.1428).with_lines(["victoria"]),
        RawStationRecord::new("Green Park Station Entrance", 51.5067, -0.1428).as_child(),
    ];

    let stations = resolver().resolve(records).unwrap().stations;
    assert_eq!(stations.len(), 1);
    assert_eq!(
        stations.lookup("Green Park Station Entrance"),
        Some(StationIdx(0))
    );
}

#[test]
fn orphan_child_is_reported() {
    let records = vec![
        rec("Green Park Underground Station", 51.5067, -0.1428),
        RawStationRecord::new("Somewhere Else Entrance", 51.4, -0.3)
            .with_parent("UNKNOWN")
            .as_child(),
    ];

    let resolution = resolver().resolve(records).unwrap();
    assert_eq!(resolution.stations.len(), 1);
    assert_eq!(
        resolution.report.issues,
        vec![Issue::UnresolvableIdentity {
            name: "Somewhere Else Entrance".to_string(),
            reason: "child entry matches no parent group",
        }]
    );
}

#[test]
fn child_stations_become_aliases() {
    let records = vec![
        rec("Canary Wharf Underground Station", 51.5035, -0.0187)
            .with_child_stations(["Canary Wharf Jubilee Platforms", "Canary Wharf"]),
    ];

    let stations = resolver().resolve(records).unwrap().stations;
    let station = stations.get(StationIdx(0)).unwrap();
    assert_eq!(
        station.aliases,
        vec!["Canary Wharf Jubilee Platforms", "Canary Wharf"]
    );
}

#[test]
fn bus_lines_are_filtered() {
    let records = vec![
        RawStationRecord::new("Victoria Underground Station", 51.4965, -0.1447)
            .with_modes([Mode::Tube, Mode::Bus])
            .with_lines(["victoria", "district", "24", "N11"]),
    ];

    let stations = resolver().resolve(records).unwrap().stations;
    let station = stations.get(StationIdx(0)).unwrap();
    assert_eq!(
        station.lines,
        ["district", "victoria"]
            .into_iter()
            .map(String::from)
            .collect::<BTreeSet<_>>()
    );
    assert_eq!(station.modes, [Mode::Tube].into_iter().collect::<BTreeSet<_>>());
}

#[test]
fn bus_only_records_are_dropped() {
    let records = vec![
        rec("Victoria Underground Station", 51.4965, -0.1447).with_lines(["victoria"]),
        RawStationRecord::new("Victoria Bus Station", 51.4953, -0.1441)
            .with_modes([Mode::Bus])
            .with_lines(["11", "N2"]),
        RawStationRecord::new("Buckingham Palace Road", 51.4951, -0.1462).with_modes([Mode::Bus]),
    ];

    let resolution = resolver().resolve(records).unwrap();
    assert_eq!(resolution.stations.len(), 1);
    assert_eq!(
        resolution.report.issues,
        vec![
            Issue::BusOnlyRecord {
                name: "Victoria Bus Station".to_string()
            },
            Issue::BusOnlyRecord {
                name: "Buckingham Palace Road".to_string()
            },
        ]
    );
}

#[test]
fn record_without_id_or_coordinates_is_unresolvable() {
    let mut lost = rec("Mystery Halt", 51.0, -0.1);
    lost.lat = None;

    let records = vec![rec("Bank", 51.5133, -0.0890), lost];
    let resolution = resolver().resolve(records).unwrap();

    assert_eq!(resolution.stations.len(), 1);
    assert_eq!(
        resolution.report.issues,
        vec![Issue::UnresolvableIdentity {
            name: "Mystery Halt".to_string(),
            reason: "no authoritative id and no usable coordinates",
        }]
    );
}

#[test]
fn record_with_hub_but_no_coordinates_resolves() {
    let mut record = rec("Bank", 51.5133, -0.0890).with_hub("HUBBAN");
    record.lat = None;
    record.lon = None;

    let stations = resolver().resolve(vec![record]).unwrap().stations;
    assert_eq!(stations.len(), 1);
    assert!(stations.get(StationIdx(0)).unwrap().coordinates.is_none());
}

#[test]
fn empty_name_is_malformed() {
    let records = vec![rec("  ", 51.5, -0.1), rec("Bank", 51.5133, -0.0890)];
    let resolution = resolver().resolve(records).unwrap();
    assert_eq!(
        resolution.report.issues,
        vec![Issue::MalformedRecord {
            kind: "station",
            index: 0,
            reason: "empty name".to_string(),
        }]
    );
}

#[test]
fn no_valid_records_is_fatal() {
    let err = resolver().resolve(Vec::new()).unwrap_err();
    assert!(matches!(err, PipelineError::NoValidRecords("station")));

    let bus_only = vec![RawStationRecord::new("Stop K", 51.5, -0.1).with_lines(["25"])];
    let err = resolver().resolve(bus_only).unwrap_err();
    assert!(matches!(err, PipelineError::NoValidRecords("station")));
}

#[test]
fn alias_shared_by_two_stations_is_fatal() {
    let records = vec![
        rec("Bank", 51.5133, -0.0890).with_child_stations(["Monument"]),
        rec("Monument", 51.5108, -0.0863),
    ];

    let err = resolver().resolve(records).unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateAlias { .. }));
}

#[test]
fn station_ids_fall_back_to_key_slug() {
    let records = vec![
        rec("Tottenham Court Road Underground Station", 51.5165, -0.1310),
        rec("Holborn", 51.5174, -0.1201).with_id("940GZZLUHBN"),
    ];

    let stations = resolver().resolve(records).unwrap().stations;
    assert_eq!(stations.get(StationIdx(0)).unwrap().id, "tottenham-court-road");
    assert_eq!(stations.get(StationIdx(1)).unwrap().id, "940GZZLUHBN");
}

#[test]
fn stations_keep_first_seen_order() {
    let records = vec![
        rec("Warren Street", 51.5247, -0.1384),
        rec("Euston", 51.5282, -0.1337),
        rec("Warren Street Underground Station", 51.5247, -0.1384),
    ];

    let stations = resolver().resolve(records).unwrap().stations;
    let names: Vec<&str> = stations.stations().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Warren Street", "Euston"]);
}

#[test]
fn resolving_twice_is_identical() {
    let records = vec![
        rec("Baker Street Underground Station", 51.5226, -0.1571),
        rec("Baker Street", 51.5226, -0.1571),
        rec("Bank", 51.5133, -0.0890).with_hub("HUBBAN"),
        rec("Monument", 51.5108, -0.0863).with_hub("HUBBAN"),
    ];

    let first = resolver().resolve(records.clone()).unwrap().stations;
    let second = resolver().resolve(records).unwrap().stations;
    assert_eq!(first.stations(), second.stations());
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn sample_records() -> Vec<RawStationRecord> {
        vec![
            rec("Baker Street Underground Station", 51.5226, -0.1571),
            rec("Baker Street", 51.5226, -0.1571),
            rec("Bank Underground Station", 51.5133, -0.0890)
                .with_hub("HUBBAN")
                .with_parent("940GZZLUBNK"),
            rec("Bank", 51.5133, -0.0890).with_parent("940GZZLUBNK"),
            rec("Monument Underground Station", 51.5108, -0.0863).with_hub("HUBBAN"),
            rec("Bank Station Entrance", 51.5132, -0.0889)
                .with_parent("940GZZLUBNK")
                .as_child(),
            rec("Paddington Underground Station", 51.5154, -0.1755).with_parent("940GZZLUPAC"),
            rec("London Paddington", 51.5154, -0.1755),
            rec("Green Park Underground Station", 51.5067, -0.1428),
            RawStationRecord::new("Green Park Exit", 51.5067, -0.1428).as_child(),
            rec("Euston Square", 51.5257, -0.1357),
            rec("Oxford Circus Underground Station", 51.5152, -0.1419).with_id("940GZZLUOXC"),
            rec("Oxford Circus (Victoria)", 51.5154, -0.1415).with_parent("940GZZLUOXC"),
            rec("Edgware Road (Circle Line) Underground Station", 51.52, -0.17),
            rec("Edgware Road (Bakerloo) Underground Station", 51.52, -0.17),
            RawStationRecord::new("Edgware Road Entrance", 51.52, -0.17).as_child(),
            RawStationRecord::new("Edgware Road (Bakerloo) Station Entrance", 51.52, -0.17).as_child(),
        ]
    }

    proptest! {
        /// Membership is decided by key lookups, never by input order.
        #[test]
        fn membership_is_order_independent(shuffled in Just(sample_records()).prop_shuffle()) {
            let expected = membership(&resolver().resolve(sample_records()).unwrap().stations);
            let actual = membership(&resolver().resolve(shuffled).unwrap().stations);
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn sample_groups_as_expected() {
        let stations = resolver().resolve(sample_records()).unwrap().stations;
        assert_eq!(stations.len(), 8);
        assert_eq!(stations.lookup("Bank Station Entrance"), stations.lookup("Monument Underground Station"));
        assert_eq!(stations.lookup("London Paddington"), stations.lookup("Paddington Underground Station"));
        assert_eq!(stations.lookup("Green Park Exit"), stations.lookup("Green Park Underground Station"));
        assert_eq!(stations.lookup("Oxford Circus (Victoria)"), stations.lookup("Oxford Circus Underground Station"));
        assert_eq!(
            stations.lookup("Edgware Road (Bakerloo) Station Entrance"),
            stations.lookup("Edgware Road (Bakerloo) Underground Station")
        );
        assert_eq!(stations.lookup("Edgware Road Entrance"), None);
    }
}
