//! SMC key naming and value decoding.
//!
//! The System Management Controller exposes sensors as four-character keys.
//! Every value comes back as raw bytes tagged with a four-character type
//! code; [`decode`] turns the types used by temperature and fan keys into
//! floats.

use crate::sensors::SensorGroup;

/// A temperature key worth probing, with the label shown in the popover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorKey {
    pub key: &'static str,
    pub name: &'static str,
    pub group: SensorGroup,
}

const fn sensor(key: &'static str, name: &'static str, group: SensorGroup) -> SensorKey {
    SensorKey { key, name, group }
}

/// Temperature keys across Intel and Apple Silicon machines. Keys the
/// machine does not have fail to read and are skipped.
pub const TEMPERATURE_KEYS: &[SensorKey] = &[
    sensor("TC0P", "CPU proximity", SensorGroup::Cpu),
    sensor("TC0D", "CPU die", SensorGroup::Cpu),
    sensor("TC0E", "CPU die (virtual)", SensorGroup::Cpu),
    sensor("TC0F", "CPU die (filtered)", SensorGroup::Cpu),
    sensor("TC1C", "CPU core 1", SensorGroup::Cpu),
    sensor("TC2C", "CPU core 2", SensorGroup::Cpu),
    sensor("TC3C", "CPU core 3", SensorGroup::Cpu),
    sensor("TC4C", "CPU core 4", SensorGroup::Cpu),
    sensor("Tp09", "CPU efficiency core 1", SensorGroup::Cpu),
    sensor("Tp0T", "CPU efficiency core 2", SensorGroup::Cpu),
    sensor("Tp01", "CPU performance core 1", SensorGroup::Cpu),
    sensor("Tp05", "CPU performance core 2", SensorGroup::Cpu),
    sensor("Tp0D", "CPU performance core 3", SensorGroup::Cpu),
    sensor("Tp0H", "CPU performance core 4", SensorGroup::Cpu),
    sensor("Tp0L", "CPU performance core 5", SensorGroup::Cpu),
    sensor("Tp0P", "CPU performance core 6", SensorGroup::Cpu),
    sensor("Tp0X", "CPU performance core 7", SensorGroup::Cpu),
    sensor("Tp0b", "CPU performance core 8", SensorGroup::Cpu),
    sensor("TG0P", "GPU proximity", SensorGroup::Gpu),
    sensor("TG0D", "GPU die", SensorGroup::Gpu),
    sensor("Tg05", "GPU cluster 1", SensorGroup::Gpu),
    sensor("Tg0D", "GPU cluster 2", SensorGroup::Gpu),
    sensor("Tg0L", "GPU cluster 3", SensorGroup::Gpu),
    sensor("Tg0T", "GPU cluster 4", SensorGroup::Gpu),
    sensor("TB0T", "Battery", SensorGroup::Battery),
    sensor("TB1T", "Battery cell 1", SensorGroup::Battery),
    sensor("TB2T", "Battery cell 2", SensorGroup::Battery),
    sensor("TA0P", "Ambient", SensorGroup::Ambient),
    sensor("TA1P", "Ambient 2", SensorGroup::Ambient),
    sensor("Ts0P", "Palm rest", SensorGroup::System),
    sensor("Ts1P", "Palm rest 2", SensorGroup::System),
    sensor("TH0P", "Drive", SensorGroup::System),
    sensor("TW0P", "Wireless module", SensorGroup::System),
    sensor("Tm0P", "Mainboard", SensorGroup::System),
    sensor("TPCD", "Platform controller hub", SensorGroup::System),
];

/// Number of fans
pub const FAN_COUNT_KEY: &str = "FNum";

/// Actual, minimum and maximum speed keys of fan `index`
pub fn fan_keys(index: u8) -> [String; 3] {
    [format!("F{}Ac", index), format!("F{}Mn", index), format!("F{}Mx", index)]
}

/// Packs a four-character key or type into the big-endian integer the SMC
/// expects. `None` unless the input is exactly four ASCII bytes.
pub fn four_char_code(key: &str) -> Option<u32> {
    let bytes: [u8; 4] = key.as_bytes().try_into().ok()?;
    bytes.is_ascii().then(|| u32::from_be_bytes(bytes))
}

/// Inverse of [`four_char_code`]
pub fn code_to_string(code: u32) -> String {
    code.to_be_bytes().iter().map(|b| *b as char).collect()
}

/// Decodes a raw SMC value of type `data_type`
///
/// Returns `None` for types that are not numeric sensor readings or when
/// fewer bytes than the type needs were returned.
pub fn decode(data_type: u32, bytes: &[u8]) -> Option<f64> {
    let be16 = || bytes.get(..2).map(|b| [b[0], b[1]]);
    match &code_to_string(data_type)[..] {
        // signed fixed point, 7 integer bits and 8 fraction bits
        "sp78" => be16().map(|b| f64::from(i16::from_be_bytes(b)) / 256.0),
        // unsigned fixed point, 14 integer bits and 2 fraction bits
        "fpe2" => be16().map(|b| f64::from(u16::from_be_bytes(b)) / 4.0),
        // Apple Silicon reports little-endian floats
        "flt " => bytes
            .get(..4)
            .map(|b| f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))),
        "ui8 " => bytes.first().map(|b| f64::from(*b)),
        "ui16" => be16().map(|b| f64::from(u16::from_be_bytes(b))),
        "ui32" => bytes
            .get(..4)
            .map(|b| f64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> u32 {
        four_char_code(s).unwrap()
    }

    #[test]
    fn test_four_char_code() {
        assert_eq!(code("TC0P"), 0x5443_3050);
        assert_eq!(code_to_string(code("Tp09")), "Tp09");
        assert!(four_char_code("TC0").is_none());
        assert!(four_char_code("TC0PX").is_none());
    }

    #[test]
    fn test_decode_sensor_types() {
        assert_eq!(decode(code("sp78"), &[0x2d, 0x80]), Some(45.5));
        assert_eq!(decode(code("sp78"), &[0xff, 0x00]), Some(-1.0));
        assert_eq!(decode(code("fpe2"), &[0x1f, 0x40]), Some(2000.0));
        assert_eq!(decode(code("flt "), &42.25f32.to_le_bytes()), Some(42.25));
        assert_eq!(decode(code("ui8 "), &[3]), Some(3.0));
        assert_eq!(decode(code("ui16"), &[0x01, 0x00]), Some(256.0));
        assert_eq!(decode(code("ui32"), &[0, 0, 0x10, 0]), Some(4096.0));
    }

    #[test]
    fn test_decode_rejects_short_and_unknown() {
        assert_eq!(decode(code("sp78"), &[0x2d]), None);
        assert_eq!(decode(code("flag"), &[1]), None);
    }

    #[test]
    fn test_key_table_is_well_formed() {
        for sensor in TEMPERATURE_KEYS {
            assert!(four_char_code(sensor.key).is_some(), "bad key {}", sensor.key);
        }
        assert_eq!(fan_keys(1), ["F1Ac".to_string(), "F1Mn".to_string(), "F1Mx".to_string()]);
    }
}
