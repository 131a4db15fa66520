//! Unit tests for control point command encoding and response parsing.

use ergride::control::types::{
    CommandOutcome, ControlCommand, ControlOpcode, ControlResponse, PowerEncoding, ResultCode,
};

#[test]
fn test_init_sequence_opcodes() {
    let bytes: Vec<Vec<u8>> = [
        ControlCommand::request_control(),
        ControlCommand::reset(),
        ControlCommand::start_or_resume(),
    ]
    .iter()
    .map(ControlCommand::to_bytes)
    .collect();

    assert_eq!(bytes, vec![vec![0x00], vec![0x01], vec![0x07]]);
}

#[test]
fn test_set_power_one_watt_units() {
    let command = PowerEncoding::Watts.encode(100);
    assert_eq!(command.opcode, u8::from(ControlOpcode::SetTargetPower));
    assert_eq!(command.to_bytes(), vec![0x05, 0x64, 0x00]);
}

#[test]
fn test_set_power_deci_watt_units() {
    let command = PowerEncoding::DeciWatts { opcode: 0x05 }.encode(100);
    // 1000 = 0x03E8
    assert_eq!(command.to_bytes(), vec![0x05, 0xE8, 0x03]);
    assert_eq!(command.label, "Set Power 100W");
}

#[test]
fn test_set_power_large_values_saturate() {
    let command = PowerEncoding::Watts.encode(u16::MAX);
    assert_eq!(command.payload, vec![0xFF, 0x7F]);
}

#[test]
fn test_response_result_codes() {
    let cases = [
        (0x01, ResultCode::Success),
        (0x02, ResultCode::OpCodeNotSupported),
        (0x03, ResultCode::InvalidParameter),
        (0x04, ResultCode::OperationFailed),
        (0x05, ResultCode::ControlNotPermitted),
        (0x42, ResultCode::Other(0x42)),
    ];
    for (raw, expected) in cases {
        let response = ControlResponse::parse(&[0x80, 0x05, raw]).unwrap();
        assert_eq!(response.result, expected);
    }
}

#[test]
fn test_outcome_display() {
    assert_eq!(
        CommandOutcome::Acknowledged(ResultCode::ControlNotPermitted).to_string(),
        "Control Not Permitted"
    );
    assert_eq!(CommandOutcome::TimedOut.to_string(), "Timed out");
}
