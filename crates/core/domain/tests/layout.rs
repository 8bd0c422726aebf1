use domain::{
    Datapoint, DatapointMap, LayoutOverride, ModbusMode, PollMode, UI_GROUP, Value, ValueType,
};
use std::collections::BTreeMap;

#[test]
fn json_point_table_builds_layout() {
    let json = r#"{
        "Supply Air Temperature": {"address": 6200, "scaling": 0.1},
        "Fan Speed": {"address": 6210, "type": "uint"},
        "Serial": {"address": 6000, "register_count": 8, "type": "string"}
    }"#;
    let points: BTreeMap<String, Datapoint> = serde_json::from_str(json).expect("points");

    let mut layout = DatapointMap::with_default_groups();
    let sensors = layout
        .add_group("sensors", ModbusMode::Input, PollMode::OnPoll)
        .expect("group");
    for (key, dp) in points {
        layout.insert(sensors, key, dp).expect("insert");
    }

    assert_eq!(layout.len(), 3);
    let serial = layout.lookup("sensors", "Serial").expect("serial");
    assert_eq!(serial.value_type, ValueType::String);
    assert_eq!(serial.end_address(), 6008);
    assert_eq!(layout.value(sensors, "Fan Speed"), Some(&Value::Empty));
}

#[test]
fn variant_overrides_compose_with_base() {
    let mut layout = DatapointMap::with_default_groups();
    let sensors = layout
        .add_group("sensors", ModbusMode::Input, PollMode::OnPoll)
        .expect("group");
    layout
        .insert(sensors, "Heat Exchanger", Datapoint::new(6233).scaling(0.1))
        .expect("insert");
    layout
        .insert(sensors, "Absolute Humidity", Datapoint::new(6220).scaling(0.1))
        .expect("insert");

    layout
        .apply(&[
            LayoutOverride::remove("sensors", "Heat Exchanger"),
            LayoutOverride::insert(
                "sensors",
                "Heat Exchanger RPM",
                Datapoint::new(6233).value_type(ValueType::UInt),
            ),
            LayoutOverride::set_scaling("sensors", "Absolute Humidity", 0.01),
            LayoutOverride::insert(UI_GROUP, "Efficiency", Datapoint::computed()),
        ])
        .expect("overrides");

    assert!(layout.lookup("sensors", "Heat Exchanger").is_none());
    assert_eq!(
        layout
            .lookup("sensors", "Heat Exchanger RPM")
            .map(|dp| dp.value_type),
        Some(ValueType::UInt)
    );
    assert_eq!(
        layout
            .lookup("sensors", "Absolute Humidity")
            .map(|dp| dp.scaling),
        Some(0.01)
    );
    assert!(layout.lookup(UI_GROUP, "Efficiency").is_some());
}
